//! Device simulation components for the charging hub.

/// Stationary battery storage model.
pub mod battery;
/// Pool of EV charging sockets grouped by vehicle class.
pub mod charger_pool;
pub mod series;
/// Building demand and per-socket demand profiles.
pub mod sink;
/// Solar generation profile.
pub mod source;
pub mod types;

// Re-export the main types for convenience
pub use battery::{AppliedEnergy, BatteryMetrics, BatteryMode, BatteryStore};
pub use charger_pool::{
    ChargerMetrics, ChargerPool, ChargingResult, ClassMetrics, SocketState, VehicleClass,
};
pub use series::SeriesStats;
pub use sink::LoadSink;
pub use source::EnergySource;
pub use types::Device;
