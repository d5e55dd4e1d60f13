use serde::Serialize;

use crate::config::BatteryConfig;
use crate::error::{ConfigError, SimError};

/// Operating state of the store for the last applied timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum BatteryMode {
    #[default]
    Idle,
    Charging,
    Discharging,
}

/// Energy actually moved by one [`BatteryStore::apply`] call.
///
/// Callers must use these values, not the requested ones, for downstream
/// bookkeeping: the store clamps requests against its own limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AppliedEnergy {
    /// Charge power accepted at the terminals (kW).
    pub charge_kw: f64,
    /// Discharge power delivered at the terminals (kW).
    pub discharge_kw: f64,
    /// Energy taken in over the step, before losses (kWh).
    pub charged_kwh: f64,
    /// Energy delivered over the step, after losses (kWh).
    pub discharged_kwh: f64,
    /// Change in stored energy (kWh).
    pub stored_delta_kwh: f64,
    /// Mode the store ended the step in.
    pub mode: BatteryMode,
}

/// Lifetime counters for one store, reset at episode boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryMetrics {
    pub timesteps: usize,
    pub total_charged_kwh: f64,
    pub total_discharged_kwh: f64,
    /// Number of times the store entered charging after discharging (or at first charge).
    pub charge_cycles: usize,
    /// Number of times the store entered discharging after charging (or at first discharge).
    pub discharge_cycles: usize,
    pub peak_charge_kw: f64,
    pub peak_discharge_kw: f64,
    pub min_soc_percent: f64,
    pub max_soc_percent: f64,
    pub avg_soc_percent: f64,
    /// Steps ending at or above 99 % SOC.
    pub steps_full: usize,
    /// Steps ending at or below 1 % SOC.
    pub steps_empty: usize,
    /// Throughput divided by twice the capacity.
    pub equivalent_full_cycles: f64,
}

impl Default for BatteryMetrics {
    fn default() -> Self {
        Self {
            timesteps: 0,
            total_charged_kwh: 0.0,
            total_discharged_kwh: 0.0,
            charge_cycles: 0,
            discharge_cycles: 0,
            peak_charge_kw: 0.0,
            peak_discharge_kw: 0.0,
            min_soc_percent: 100.0,
            max_soc_percent: 0.0,
            avg_soc_percent: 0.0,
            steps_full: 0,
            steps_empty: 0,
            equivalent_full_cycles: 0.0,
        }
    }
}

/// Stationary battery energy storage system.
///
/// The only component carrying physical state across timesteps. `apply` is
/// called exactly once per step by the orchestrator; it clamps each request
/// to the power limit and to the energy (or headroom) available, so the state
/// of charge stays within `[0, 100]` %.
///
/// Efficiency is applied inside the store: charging `P` kW for `dt` hours
/// stores `P · dt · eta_charge`, delivering `P` kW drains `P · dt / eta_discharge`.
#[derive(Debug, Clone)]
pub struct BatteryStore {
    capacity_kwh: f64,
    max_power_kw: f64,
    eta_charge: f64,
    eta_discharge: f64,
    dt_hours: f64,
    initial_soc_percent: f64,
    stored_kwh: f64,
    mode: BatteryMode,
    last_direction: Option<BatteryMode>,
    soc_sum: f64,
    metrics: BatteryMetrics,
}

impl BatteryStore {
    /// Creates a store from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if capacity or power is not
    /// positive, the initial SOC is outside `[0, 100]`, an efficiency is
    /// outside `(0, 1]`, or `dt_hours` is not positive.
    pub fn new(config: &BatteryConfig, dt_hours: f64) -> Result<Self, SimError> {
        let mut errors = Vec::new();
        if !(config.capacity_kwh > 0.0) {
            errors.push(ConfigError::new("battery.capacity_kwh", "must be > 0"));
        }
        if !(config.max_power_kw > 0.0) {
            errors.push(ConfigError::new("battery.max_power_kw", "must be > 0"));
        }
        if !(0.0..=100.0).contains(&config.initial_soc_percent) {
            errors.push(ConfigError::new(
                "battery.initial_soc_percent",
                "must be in [0, 100]",
            ));
        }
        for (field, eta) in [
            ("battery.eta_charge", config.eta_charge),
            ("battery.eta_discharge", config.eta_discharge),
        ] {
            if !(eta > 0.0 && eta <= 1.0) {
                errors.push(ConfigError::new(field, "must be in (0, 1]"));
            }
        }
        if !(dt_hours > 0.0) {
            errors.push(ConfigError::new("simulation.steps_per_day", "timestep must be > 0 h"));
        }
        if !errors.is_empty() {
            return Err(SimError::InvalidConfig(errors));
        }

        Ok(Self {
            capacity_kwh: config.capacity_kwh,
            max_power_kw: config.max_power_kw,
            eta_charge: config.eta_charge,
            eta_discharge: config.eta_discharge,
            dt_hours,
            initial_soc_percent: config.initial_soc_percent,
            stored_kwh: config.capacity_kwh * config.initial_soc_percent / 100.0,
            mode: BatteryMode::Idle,
            last_direction: None,
            soc_sum: 0.0,
            metrics: BatteryMetrics::default(),
        })
    }

    /// Applies one timestep of charge and discharge requests.
    ///
    /// Both requests are clamped against the state at the start of the step:
    /// charge to `min(requested, max_power, headroom)`, discharge to
    /// `min(requested, max_power, stored energy)`, with headroom and energy
    /// converted to power over the timestep and adjusted for efficiency.
    /// Negative or non-finite requests count as zero. Never fails.
    pub fn apply(&mut self, charge_kw: f64, discharge_kw: f64) -> AppliedEnergy {
        let charge_req = non_negative(charge_kw);
        let discharge_req = non_negative(discharge_kw);

        let headroom_kwh = (self.capacity_kwh - self.stored_kwh).max(0.0);
        let max_charge_kw = headroom_kwh / (self.eta_charge * self.dt_hours);
        let charge_kw = charge_req.min(self.max_power_kw).min(max_charge_kw);

        let max_discharge_kw = self.stored_kwh * self.eta_discharge / self.dt_hours;
        let discharge_kw = discharge_req.min(self.max_power_kw).min(max_discharge_kw);

        let charged_kwh = charge_kw * self.dt_hours;
        let discharged_kwh = discharge_kw * self.dt_hours;
        let before = self.stored_kwh;
        self.stored_kwh = (before + charged_kwh * self.eta_charge
            - discharged_kwh / self.eta_discharge)
            .clamp(0.0, self.capacity_kwh);
        let stored_delta_kwh = self.stored_kwh - before;

        self.mode = if charge_kw > 0.0 && discharge_kw == 0.0 {
            BatteryMode::Charging
        } else if discharge_kw > 0.0 && charge_kw == 0.0 {
            BatteryMode::Discharging
        } else if stored_delta_kwh > 0.0 {
            BatteryMode::Charging
        } else if stored_delta_kwh < 0.0 {
            BatteryMode::Discharging
        } else {
            BatteryMode::Idle
        };

        self.record(charge_kw, discharge_kw, charged_kwh, discharged_kwh);

        AppliedEnergy {
            charge_kw,
            discharge_kw,
            charged_kwh,
            discharged_kwh,
            stored_delta_kwh,
            mode: self.mode,
        }
    }

    fn record(&mut self, charge_kw: f64, discharge_kw: f64, charged_kwh: f64, discharged_kwh: f64) {
        if self.mode != BatteryMode::Idle && self.last_direction != Some(self.mode) {
            match self.mode {
                BatteryMode::Charging => self.metrics.charge_cycles += 1,
                BatteryMode::Discharging => self.metrics.discharge_cycles += 1,
                BatteryMode::Idle => {}
            }
            self.last_direction = Some(self.mode);
        }

        let soc = self.soc_percent();
        let m = &mut self.metrics;
        m.timesteps += 1;
        m.total_charged_kwh += charged_kwh;
        m.total_discharged_kwh += discharged_kwh;
        m.peak_charge_kw = m.peak_charge_kw.max(charge_kw);
        m.peak_discharge_kw = m.peak_discharge_kw.max(discharge_kw);
        m.min_soc_percent = m.min_soc_percent.min(soc);
        m.max_soc_percent = m.max_soc_percent.max(soc);
        self.soc_sum += soc;
        m.avg_soc_percent = self.soc_sum / m.timesteps as f64;
        if soc >= 99.0 {
            m.steps_full += 1;
        }
        if soc <= 1.0 {
            m.steps_empty += 1;
        }
        m.equivalent_full_cycles =
            (m.total_charged_kwh + m.total_discharged_kwh) / (2.0 * self.capacity_kwh);
    }

    /// Restores the configured initial SOC and clears all counters.
    pub fn reset(&mut self) {
        self.stored_kwh = self.capacity_kwh * self.initial_soc_percent / 100.0;
        self.mode = BatteryMode::Idle;
        self.last_direction = None;
        self.soc_sum = 0.0;
        self.metrics = BatteryMetrics::default();
    }

    pub fn soc_percent(&self) -> f64 {
        (self.stored_kwh / self.capacity_kwh * 100.0).clamp(0.0, 100.0)
    }

    pub fn stored_kwh(&self) -> f64 {
        self.stored_kwh
    }

    pub fn capacity_kwh(&self) -> f64 {
        self.capacity_kwh
    }

    pub fn max_power_kw(&self) -> f64 {
        self.max_power_kw
    }

    pub fn mode(&self) -> BatteryMode {
        self.mode
    }

    pub fn metrics(&self) -> &BatteryMetrics {
        &self.metrics
    }
}

fn non_negative(kw: f64) -> f64 {
    if kw.is_finite() { kw.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn config(capacity_kwh: f64, soc: f64, max_power_kw: f64, eta: f64) -> BatteryConfig {
        BatteryConfig {
            capacity_kwh,
            max_power_kw,
            initial_soc_percent: soc,
            eta_charge: eta,
            eta_discharge: eta,
        }
    }

    fn ideal(capacity_kwh: f64, soc: f64, max_power_kw: f64) -> BatteryStore {
        BatteryStore::new(&config(capacity_kwh, soc, max_power_kw, 1.0), 1.0).unwrap()
    }

    #[test]
    fn test_new_battery() {
        let battery = ideal(2000.0, 60.0, 1200.0);
        assert_eq!(battery.capacity_kwh(), 2000.0);
        assert_eq!(battery.soc_percent(), 60.0);
        assert_eq!(battery.stored_kwh(), 1200.0);
        assert_eq!(battery.mode(), BatteryMode::Idle);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(BatteryStore::new(&config(0.0, 50.0, 10.0, 1.0), 1.0).is_err());
        assert!(BatteryStore::new(&config(10.0, 50.0, -1.0, 1.0), 1.0).is_err());
        assert!(BatteryStore::new(&config(10.0, 101.0, 10.0, 1.0), 1.0).is_err());
        assert!(BatteryStore::new(&config(10.0, 50.0, 10.0, 1.2), 1.0).is_err());
        assert!(BatteryStore::new(&config(10.0, 50.0, 10.0, 1.0), 0.0).is_err());
    }

    #[test]
    fn test_charge_power_limit() {
        let mut battery = ideal(2000.0, 10.0, 1200.0);
        let applied = battery.apply(3000.0, 0.0);
        assert_eq!(applied.charge_kw, 1200.0);
        assert_eq!(applied.mode, BatteryMode::Charging);
        assert_abs_diff_eq!(battery.soc_percent(), 70.0, epsilon = 1e-9);
    }

    #[test]
    fn test_charge_headroom_limit() {
        let mut battery = ideal(100.0, 90.0, 50.0);
        let applied = battery.apply(50.0, 0.0);
        assert_abs_diff_eq!(applied.charge_kw, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(battery.soc_percent(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_discharge_energy_limit() {
        let mut battery = ideal(100.0, 10.0, 50.0);
        let applied = battery.apply(0.0, 40.0);
        assert_abs_diff_eq!(applied.discharge_kw, 10.0, epsilon = 1e-9);
        assert_eq!(applied.mode, BatteryMode::Discharging);
        assert!(battery.soc_percent().abs() < 1e-9);
    }

    #[test]
    fn test_sub_hour_timestep_scales_energy() {
        // 15-minute steps: 40 kW for 0.25 h moves 10 kWh
        let mut battery =
            BatteryStore::new(&config(100.0, 50.0, 40.0, 1.0), 0.25).unwrap();
        let applied = battery.apply(40.0, 0.0);
        assert_abs_diff_eq!(applied.charged_kwh, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(battery.soc_percent(), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_efficiency_losses() {
        let mut battery = BatteryStore::new(&config(100.0, 0.0, 100.0, 0.9), 1.0).unwrap();
        battery.apply(10.0, 0.0);
        assert_abs_diff_eq!(battery.stored_kwh(), 9.0, epsilon = 1e-9);

        // Delivering 4.5 kWh drains 5 kWh
        battery.apply(0.0, 4.5);
        assert_abs_diff_eq!(battery.stored_kwh(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_efficiency_caps_deliverable_energy() {
        let mut battery = BatteryStore::new(&config(100.0, 10.0, 100.0, 0.8), 1.0).unwrap();
        let applied = battery.apply(0.0, 100.0);
        assert_abs_diff_eq!(applied.discharge_kw, 8.0, epsilon = 1e-9);
        assert!(battery.stored_kwh().abs() < 1e-9);
    }

    #[test]
    fn test_invalid_requests_are_ignored() {
        let mut battery = ideal(100.0, 50.0, 50.0);
        let applied = battery.apply(f64::NAN, -5.0);
        assert_eq!(applied, AppliedEnergy::default());
        assert_eq!(battery.soc_percent(), 50.0);
    }

    #[test]
    fn test_simultaneous_charge_and_discharge_nets_out() {
        let mut battery = ideal(100.0, 50.0, 50.0);
        let applied = battery.apply(0.05, 20.0);
        assert_abs_diff_eq!(applied.stored_delta_kwh, -19.95, epsilon = 1e-9);
        assert_eq!(applied.mode, BatteryMode::Discharging);
    }

    #[test]
    fn test_cycle_counters_count_direction_flips() {
        let mut battery = ideal(100.0, 50.0, 10.0);
        battery.apply(5.0, 0.0); // charge: cycle 1
        battery.apply(5.0, 0.0); // still charging
        battery.apply(0.0, 0.0); // idle does not break the run
        battery.apply(5.0, 0.0);
        battery.apply(0.0, 5.0); // discharge: cycle 1
        battery.apply(5.0, 0.0); // charge: cycle 2
        let m = battery.metrics();
        assert_eq!(m.charge_cycles, 2);
        assert_eq!(m.discharge_cycles, 1);
        assert_eq!(m.timesteps, 6);
    }

    #[test]
    fn test_soc_statistics() {
        let mut battery = ideal(100.0, 50.0, 10.0);
        battery.apply(10.0, 0.0); // 60
        battery.apply(0.0, 10.0); // 50
        battery.apply(0.0, 10.0); // 40
        let m = battery.metrics();
        assert_abs_diff_eq!(m.max_soc_percent, 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.min_soc_percent, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.avg_soc_percent, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.equivalent_full_cycles, 0.15, epsilon = 1e-9);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut battery = ideal(100.0, 50.0, 10.0);
        battery.apply(10.0, 0.0);
        battery.reset();
        assert_eq!(battery.soc_percent(), 50.0);
        assert_eq!(battery.mode(), BatteryMode::Idle);
        assert_eq!(battery.metrics(), &BatteryMetrics::default());
    }

    #[test]
    fn test_complete_charge_discharge_cycle() {
        let mut battery = BatteryStore::new(&config(10.0, 50.0, 2.0, 0.9), 1.0).unwrap();

        while battery.soc_percent() < 99.9 {
            battery.apply(2.0, 0.0);
        }

        let mut energy_delivered = 0.0;
        while battery.soc_percent() > 0.01 {
            energy_delivered += battery.apply(0.0, 2.0).discharged_kwh;
        }

        // ~10 kWh stored × 0.9 discharge efficiency
        assert!((energy_delivered - 9.0).abs() < 0.1);
    }
}
