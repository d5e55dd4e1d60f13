//! Reward-shaping terms attached to each dispatched step.

use serde::Serialize;

use super::types::{PowerFlows, TimestepContext};

/// Bonus per kW of solar delivered straight to vehicles.
pub const DIRECT_SOLAR_BONUS_PER_KW: f64 = 0.01;
/// Bonus per kW of solar stored when no solar reached vehicles.
pub const BATTERY_CHARGE_BONUS_PER_KW: f64 = 0.005;
/// Scale of the grid import penalty (per kg CO2).
pub const GRID_PENALTY_SCALE: f64 = 1e-4;
/// Multiplier applied to the grid penalty during peak hours.
pub const PEAK_PENALTY_MULTIPLIER: f64 = 2.0;

/// Fixed-field shaping terms for an external reward function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DispatchBonus {
    pub direct_solar: f64,
    pub battery_charge: f64,
    /// Always `<= 0`.
    pub grid_penalty: f64,
    pub total: f64,
}

impl DispatchBonus {
    /// Scores a set of flows.
    ///
    /// # Arguments
    ///
    /// * `flows` - Flows of the step (planned or realised)
    /// * `context` - Step position, for the peak multiplier
    /// * `co2_kg_per_kwh` - Grid emission factor
    pub fn compute(flows: &PowerFlows, context: &TimestepContext, co2_kg_per_kwh: f64) -> Self {
        let direct_solar = flows.pv_to_ev * DIRECT_SOLAR_BONUS_PER_KW;
        let battery_charge = if flows.pv_to_ev == 0.0 {
            flows.pv_to_battery * BATTERY_CHARGE_BONUS_PER_KW
        } else {
            0.0
        };
        let multiplier = if context.is_peak { PEAK_PENALTY_MULTIPLIER } else { 1.0 };
        let grid_penalty = -flows.grid_import * co2_kg_per_kwh * GRID_PENALTY_SCALE * multiplier;

        Self {
            direct_solar,
            battery_charge,
            grid_penalty,
            total: direct_solar + battery_charge + grid_penalty,
        }
    }
}
