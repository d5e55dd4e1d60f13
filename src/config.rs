//! TOML-based hub configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;

pub use crate::error::ConfigError;

/// Top-level hub configuration parsed from TOML.
///
/// All fields have defaults matching the baseline hub. Load from TOML with
/// [`SystemConfig::from_toml_file`] or use [`SystemConfig::baseline`] for the
/// built-in default. Nothing here changes once a simulation is running.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Simulation timing parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Dispatcher thresholds and pool limits.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Stationary battery parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Charging sockets grouped by vehicle class.
    #[serde(default)]
    pub chargers: ChargersConfig,
    /// Grid import accounting.
    #[serde(default)]
    pub grid: GridConfig,
}

/// Simulation timing parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of timesteps per simulated day (must be > 0).
    pub steps_per_day: usize,
    /// First hour of the evening peak window (inclusive).
    pub peak_start_hour: usize,
    /// End of the evening peak window (exclusive).
    pub peak_end_hour: usize,
    /// Seed for vehicle arrival SOC sampling.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps_per_day: 24,
            peak_start_hour: 18,
            peak_end_hour: 22,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Duration of one timestep in hours, derived as `24.0 / steps_per_day`.
    pub fn dt_hours(&self) -> f64 {
        24.0 / self.steps_per_day.max(1) as f64
    }
}

/// Dispatcher thresholds and pool limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Solar power at or above which it is considered daytime (kW).
    pub pv_day_threshold_kw: f64,
    /// Solar power below which it is considered nighttime (kW).
    pub pv_night_threshold_kw: f64,
    /// SOC at or above which the battery no longer takes solar (%).
    pub soc_saturated_percent: f64,
    /// SOC at or below which the battery no longer feeds EVs (%).
    pub soc_depleted_percent: f64,
    /// Aggregate power cap of the charger pool (kW).
    pub ev_power_limit_kw: f64,
    /// Maximum power the building can take from local sources (kW).
    pub building_power_max_kw: f64,
    /// Insert the battery → building stage during peak hours.
    pub battery_to_building_at_peak: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pv_day_threshold_kw: 0.5,
            pv_night_threshold_kw: 0.1,
            soc_saturated_percent: 95.0,
            soc_depleted_percent: 20.0,
            ev_power_limit_kw: 150.0,
            building_power_max_kw: 500.0,
            battery_to_building_at_peak: false,
        }
    }
}

/// Stationary battery parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Total energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Symmetric charge/discharge power limit (kW).
    pub max_power_kw: f64,
    /// SOC at episode start (0–100 %).
    pub initial_soc_percent: f64,
    /// Charge efficiency (0.0–1.0].
    pub eta_charge: f64,
    /// Discharge efficiency (0.0–1.0].
    pub eta_discharge: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 2000.0,
            max_power_kw: 1200.0,
            initial_soc_percent: 50.0,
            eta_charge: 0.975,
            eta_discharge: 0.975,
        }
    }
}

/// Socket group for one vehicle class.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocketClassConfig {
    /// Number of sockets of this class.
    pub sockets: usize,
    /// Rated power of each socket (kW).
    pub rated_power_kw: f64,
    /// Battery capacity of a vehicle of this class (kWh).
    pub battery_kwh: f64,
}

/// Charging sockets grouped by vehicle class.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChargersConfig {
    /// Upper bound of the uniform arrival SOC draw (%).
    pub arrival_soc_max_percent: f64,
    /// Electric motorcycles.
    pub two_wheeler: SocketClassConfig,
    /// Electric moto-taxis.
    pub three_wheeler: SocketClassConfig,
}

impl Default for ChargersConfig {
    fn default() -> Self {
        Self {
            arrival_soc_max_percent: 5.0,
            two_wheeler: SocketClassConfig {
                sockets: 30,
                rated_power_kw: 2.0,
                battery_kwh: 2.0,
            },
            three_wheeler: SocketClassConfig {
                sockets: 8,
                rated_power_kw: 3.0,
                battery_kwh: 4.0,
            },
        }
    }
}

impl ChargersConfig {
    /// Total number of sockets across both classes.
    pub fn total_sockets(&self) -> usize {
        self.two_wheeler.sockets + self.three_wheeler.sockets
    }
}

/// Grid import accounting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Emission factor of imported energy (kg CO2 / kWh).
    pub co2_kg_per_kwh: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            co2_kg_per_kwh: 0.4521,
        }
    }
}

impl SystemConfig {
    /// Returns the baseline hub: 2 MWh store, 38 sockets, hourly steps.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the compact-store preset: smaller battery with a tighter power limit.
    pub fn compact_bess() -> Self {
        Self {
            battery: BatteryConfig {
                capacity_kwh: 940.0,
                max_power_kw: 342.0,
                ..BatteryConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the peak-shaving preset: half-hourly steps, battery feeds the
    /// building during the evening peak.
    pub fn peak_shaving() -> Self {
        Self {
            simulation: SimulationConfig {
                steps_per_day: 48,
                ..SimulationConfig::default()
            },
            dispatch: DispatchConfig {
                battery_to_building_at_peak: true,
                ..DispatchConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "compact_bess", "peak_shaving"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "compact_bess" => Ok(Self::compact_bess()),
            "peak_shaving" => Ok(Self::peak_shaving()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Duration of one timestep in hours.
    pub fn dt_hours(&self) -> f64 {
        self.simulation.dt_hours()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        let s = &self.simulation;
        check(s.steps_per_day > 0, "simulation.steps_per_day", "must be > 0");
        check(s.peak_end_hour <= 24, "simulation.peak_end_hour", "must be <= 24");
        check(
            s.peak_start_hour < s.peak_end_hour,
            "simulation.peak_start_hour",
            "must be < simulation.peak_end_hour",
        );

        let d = &self.dispatch;
        check(
            d.pv_night_threshold_kw >= 0.0,
            "dispatch.pv_night_threshold_kw",
            "must be >= 0",
        );
        check(
            d.pv_night_threshold_kw <= d.pv_day_threshold_kw,
            "dispatch.pv_night_threshold_kw",
            "must be <= dispatch.pv_day_threshold_kw",
        );
        check(
            (0.0..=100.0).contains(&d.soc_saturated_percent),
            "dispatch.soc_saturated_percent",
            "must be in [0, 100]",
        );
        check(
            d.soc_depleted_percent >= 0.0 && d.soc_depleted_percent < d.soc_saturated_percent,
            "dispatch.soc_depleted_percent",
            "must be in [0, dispatch.soc_saturated_percent)",
        );
        check(d.ev_power_limit_kw > 0.0, "dispatch.ev_power_limit_kw", "must be > 0");
        check(
            d.building_power_max_kw > 0.0,
            "dispatch.building_power_max_kw",
            "must be > 0",
        );

        let b = &self.battery;
        check(b.capacity_kwh > 0.0, "battery.capacity_kwh", "must be > 0");
        check(b.max_power_kw > 0.0, "battery.max_power_kw", "must be > 0");
        check(
            (0.0..=100.0).contains(&b.initial_soc_percent),
            "battery.initial_soc_percent",
            "must be in [0, 100]",
        );
        check(
            b.eta_charge > 0.0 && b.eta_charge <= 1.0,
            "battery.eta_charge",
            "must be in (0, 1]",
        );
        check(
            b.eta_discharge > 0.0 && b.eta_discharge <= 1.0,
            "battery.eta_discharge",
            "must be in (0, 1]",
        );

        let c = &self.chargers;
        check(
            (0.0..=100.0).contains(&c.arrival_soc_max_percent),
            "chargers.arrival_soc_max_percent",
            "must be in [0, 100]",
        );
        check(c.total_sockets() > 0, "chargers", "at least one socket is required");
        for (name, class) in [("two_wheeler", &c.two_wheeler), ("three_wheeler", &c.three_wheeler)] {
            check(
                class.rated_power_kw > 0.0,
                &format!("chargers.{name}.rated_power_kw"),
                "must be > 0",
            );
            check(
                class.battery_kwh > 0.0,
                &format!("chargers.{name}.battery_kwh"),
                "must be > 0",
            );
        }

        check(self.grid.co2_kg_per_kwh >= 0.0, "grid.co2_kg_per_kwh", "must be >= 0");

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = SystemConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn baseline_matches_hub_sizing() {
        let cfg = SystemConfig::baseline();
        assert_eq!(cfg.battery.capacity_kwh, 2000.0);
        assert_eq!(cfg.battery.max_power_kw, 1200.0);
        assert_eq!(cfg.chargers.total_sockets(), 38);
        assert_eq!(cfg.dt_hours(), 1.0);
    }

    #[test]
    fn from_preset_unknown() {
        let err = SystemConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in SystemConfig::PRESETS {
            let cfg = SystemConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(SystemConfig::validate).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn peak_shaving_uses_half_hour_steps() {
        let cfg = SystemConfig::peak_shaving();
        assert_eq!(cfg.dt_hours(), 0.5);
        assert!(cfg.dispatch.battery_to_building_at_peak);
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
steps_per_day = 96
peak_start_hour = 17
peak_end_hour = 21
seed = 7

[dispatch]
pv_day_threshold_kw = 1.0
pv_night_threshold_kw = 0.2
soc_saturated_percent = 90.0
soc_depleted_percent = 15.0
ev_power_limit_kw = 120.0
building_power_max_kw = 400.0
battery_to_building_at_peak = true

[battery]
capacity_kwh = 1700.0
max_power_kw = 400.0
initial_soc_percent = 60.0
eta_charge = 0.95
eta_discharge = 0.95

[chargers]
arrival_soc_max_percent = 10.0
two_wheeler = { sockets = 20, rated_power_kw = 2.0, battery_kwh = 2.0 }
three_wheeler = { sockets = 4, rated_power_kw = 3.0, battery_kwh = 4.0 }

[grid]
co2_kg_per_kwh = 0.5
"#;
        let cfg = SystemConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.simulation.steps_per_day), Some(96));
        assert_eq!(cfg.as_ref().map(|c| c.chargers.total_sockets()), Some(24));
        assert_eq!(cfg.as_ref().map(|c| c.dt_hours()), Some(0.25));
        assert_eq!(cfg.map(|c| c.validate().len()), Some(0));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[battery]
capacity_kwh = 100.0
chemistry = "lfp"
"#;
        assert!(SystemConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[battery]
capacity_kwh = 500.0
"#;
        let cfg = SystemConfig::from_toml_str(toml).ok();
        assert_eq!(cfg.as_ref().map(|c| c.battery.capacity_kwh), Some(500.0));
        assert_eq!(cfg.as_ref().map(|c| c.battery.max_power_kw), Some(1200.0));
        assert_eq!(cfg.map(|c| c.dispatch.ev_power_limit_kw), Some(150.0));
    }

    #[test]
    fn validation_catches_zero_capacity_and_power() {
        let mut cfg = SystemConfig::baseline();
        cfg.battery.capacity_kwh = 0.0;
        cfg.battery.max_power_kw = -5.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.capacity_kwh"));
        assert!(errors.iter().any(|e| e.field == "battery.max_power_kw"));
    }

    #[test]
    fn validation_catches_inverted_thresholds() {
        let mut cfg = SystemConfig::baseline();
        cfg.dispatch.pv_night_threshold_kw = 1.0;
        cfg.dispatch.pv_day_threshold_kw = 0.5;
        cfg.dispatch.soc_depleted_percent = 96.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "dispatch.pv_night_threshold_kw"));
        assert!(errors.iter().any(|e| e.field == "dispatch.soc_depleted_percent"));
    }

    #[test]
    fn validation_catches_bad_socket_class() {
        let mut cfg = SystemConfig::baseline();
        cfg.chargers.three_wheeler.battery_kwh = 0.0;
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "chargers.three_wheeler.battery_kwh"));
    }

    #[test]
    fn validation_requires_a_socket() {
        let mut cfg = SystemConfig::baseline();
        cfg.chargers.two_wheeler.sockets = 0;
        cfg.chargers.three_wheeler.sockets = 0;
        assert!(cfg.validate().iter().any(|e| e.field == "chargers"));
    }
}
