//! Energy dispatch simulator for a solar and battery powered EV charging hub.

pub mod config;
pub mod devices;
pub mod error;
/// Dispatcher, orchestrator, metrics, and KPI modules.
pub mod sim;

pub use error::SimError;
