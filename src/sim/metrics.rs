//! Cumulative per-component flow metrics.
//!
//! Updated once per step by the orchestrator from the realised flows and
//! exposed read-only through [`Orchestrator::metrics`](super::orchestrator::Orchestrator::metrics).
//! The dispatcher never reads them.

use serde::Serialize;

use crate::devices::{BatteryMetrics, ChargerMetrics, SeriesStats};

use super::types::StepMetrics;

/// Where the solar generation went.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SolarMetrics {
    pub total_generation_kwh: f64,
    pub to_ev_kwh: f64,
    pub to_battery_kwh: f64,
    pub to_building_kwh: f64,
    pub curtailed_kwh: f64,
    pub peak_kw: f64,
    pub average_kw: f64,
    /// Share of generation used on site (0–1).
    pub self_consumption_ratio: f64,
    timesteps: usize,
}

impl SolarMetrics {
    pub fn record(&mut self, step: &StepMetrics, dt_hours: f64) {
        self.timesteps += 1;
        self.total_generation_kwh += step.solar_kw * dt_hours;
        self.to_ev_kwh += step.flows.pv_to_ev * dt_hours;
        self.to_battery_kwh += step.flows.pv_to_battery * dt_hours;
        self.to_building_kwh += step.flows.pv_to_building * dt_hours;
        self.curtailed_kwh += step.pv_curtailed_kw * dt_hours;
        self.peak_kw = self.peak_kw.max(step.solar_kw);
        self.average_kw = self.total_generation_kwh / (self.timesteps as f64 * dt_hours);
        self.self_consumption_ratio = ratio(
            self.to_ev_kwh + self.to_battery_kwh + self.to_building_kwh,
            self.total_generation_kwh,
        );
    }
}

/// How the building demand was covered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildingMetrics {
    pub total_demand_kwh: f64,
    pub from_solar_kwh: f64,
    pub from_battery_kwh: f64,
    pub from_grid_kwh: f64,
    pub peak_kw: f64,
    pub average_kw: f64,
    /// Share of demand met by solar (0–1).
    pub solar_penetration: f64,
    /// Share of demand met by the battery (0–1).
    pub battery_penetration: f64,
    timesteps: usize,
}

impl BuildingMetrics {
    pub fn record(&mut self, step: &StepMetrics, dt_hours: f64) {
        self.timesteps += 1;
        self.total_demand_kwh += step.building_demand_kw * dt_hours;
        self.from_solar_kwh += step.flows.pv_to_building * dt_hours;
        self.from_battery_kwh += step.flows.battery_to_building * dt_hours;
        self.from_grid_kwh += step.grid_to_building_kw * dt_hours;
        self.peak_kw = self.peak_kw.max(step.building_demand_kw);
        self.average_kw = self.total_demand_kwh / (self.timesteps as f64 * dt_hours);
        self.solar_penetration = ratio(self.from_solar_kwh, self.total_demand_kwh);
        self.battery_penetration = ratio(self.from_battery_kwh, self.total_demand_kwh);
    }
}

/// Grid import totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridMetrics {
    pub total_import_kwh: f64,
    pub to_ev_kwh: f64,
    pub to_building_kwh: f64,
    pub peak_import_kw: f64,
    /// Import during the evening peak window.
    pub peak_hour_import_kwh: f64,
    pub co2_kg: f64,
}

impl GridMetrics {
    pub fn record(&mut self, step: &StepMetrics, dt_hours: f64, co2_kg_per_kwh: f64) {
        let kwh = step.flows.grid_import * dt_hours;
        self.total_import_kwh += kwh;
        self.to_ev_kwh += step.grid_to_ev_kw * dt_hours;
        self.to_building_kwh += step.grid_to_building_kw * dt_hours;
        self.peak_import_kw = self.peak_import_kw.max(step.flows.grid_import);
        if step.context.is_peak {
            self.peak_hour_import_kwh += kwh;
        }
        self.co2_kg += kwh * co2_kg_per_kwh;
    }
}

/// Snapshot of every component's metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    pub timesteps: usize,
    pub solar: SolarMetrics,
    pub building: BuildingMetrics,
    pub grid: GridMetrics,
    pub battery: BatteryMetrics,
    pub chargers: ChargerMetrics,
    /// Raw profile statistics, including clamped anomalies.
    pub solar_profile: SeriesStats,
    pub building_profile: SeriesStats,
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole } else { 0.0 }
}
