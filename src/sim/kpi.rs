//! Post-hoc KPI computation from simulation results.

use std::fmt;

use serde::Serialize;

use super::types::StepMetrics;

/// Aggregate key performance indicators derived from a complete episode.
///
/// Computed post-hoc from `&[StepMetrics]` so the report always agrees with
/// the step records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    /// Total solar generation (kWh).
    pub solar_generation_kwh: f64,
    /// Percentage of solar used on site.
    pub self_consumption_pct: f64,
    /// Percentage of solar curtailed.
    pub curtailment_pct: f64,
    /// Total grid import (kWh).
    pub grid_import_kwh: f64,
    /// Peak grid import power (kW).
    pub peak_grid_import_kw: f64,
    /// Grid import inside the evening peak window (kWh).
    pub peak_hour_import_kwh: f64,
    /// Emissions of the imported energy (kg CO2).
    pub co2_kg: f64,
    /// Energy delivered to vehicles (kWh).
    pub ev_delivered_kwh: f64,
    /// Percentage of vehicle energy that came directly from solar.
    pub ev_solar_coverage_pct: f64,
    /// Percentage of vehicle energy that came from the battery.
    pub ev_battery_coverage_pct: f64,
    /// Vehicles charged to full.
    pub vehicles_completed: usize,
    /// Battery energy throughput, charged plus discharged (kWh).
    pub battery_throughput_kwh: f64,
    /// Battery equivalent full cycles (throughput / 2·capacity).
    pub battery_equivalent_full_cycles: f64,
    /// Sum of the per-step dispatch bonus.
    pub total_bonus: f64,
    /// Largest solar conservation residual seen (kW).
    pub max_solar_residual_kw: f64,
}

impl KpiReport {
    /// Computes all KPIs from the complete step record vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Step records of one episode
    /// * `dt_hours` - Timestep duration in hours
    /// * `battery_capacity_kwh` - Battery capacity for cycle calculation
    /// * `co2_kg_per_kwh` - Grid emission factor
    pub fn from_results(
        results: &[StepMetrics],
        dt_hours: f64,
        battery_capacity_kwh: f64,
        co2_kg_per_kwh: f64,
    ) -> Self {
        let mut solar = 0.0;
        let mut solar_used = 0.0;
        let mut curtailed = 0.0;
        let mut grid = 0.0;
        let mut peak_grid = 0.0_f64;
        let mut peak_hour_grid = 0.0;
        let mut ev = 0.0;
        let mut ev_solar = 0.0;
        let mut ev_battery = 0.0;
        let mut completed = 0;
        let mut throughput = 0.0;
        let mut bonus = 0.0;
        let mut max_residual = 0.0_f64;

        for r in results {
            solar += r.solar_kw * dt_hours;
            solar_used += r.flows.solar_used() * dt_hours;
            curtailed += r.pv_curtailed_kw * dt_hours;
            grid += r.flows.grid_import * dt_hours;
            peak_grid = peak_grid.max(r.flows.grid_import);
            if r.context.is_peak {
                peak_hour_grid += r.flows.grid_import * dt_hours;
            }
            ev += r.ev_delivered_kw * dt_hours;
            ev_solar += r.flows.pv_to_ev * dt_hours;
            ev_battery += r.flows.battery_to_ev * dt_hours;
            completed += r.completed_vehicles;
            throughput += r.battery.charged_kwh + r.battery.discharged_kwh;
            bonus += r.bonus.total;
            max_residual = max_residual.max(r.solar_residual_kw().abs());
        }

        let pct = |part: f64, whole: f64| if whole > 0.0 { 100.0 * part / whole } else { 0.0 };
        let cycles = if battery_capacity_kwh > 0.0 {
            throughput / (2.0 * battery_capacity_kwh)
        } else {
            0.0
        };

        Self {
            solar_generation_kwh: solar,
            self_consumption_pct: pct(solar_used, solar),
            curtailment_pct: pct(curtailed, solar),
            grid_import_kwh: grid,
            peak_grid_import_kw: peak_grid,
            peak_hour_import_kwh: peak_hour_grid,
            co2_kg: grid * co2_kg_per_kwh,
            ev_delivered_kwh: ev,
            ev_solar_coverage_pct: pct(ev_solar, ev),
            ev_battery_coverage_pct: pct(ev_battery, ev),
            vehicles_completed: completed,
            battery_throughput_kwh: throughput,
            battery_equivalent_full_cycles: cycles,
            total_bonus: bonus,
            max_solar_residual_kw: max_residual,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(
            f,
            "Solar generation:      {:.2} kWh ({:.1}% self-consumed, {:.1}% curtailed)",
            self.solar_generation_kwh, self.self_consumption_pct, self.curtailment_pct
        )?;
        writeln!(
            f,
            "Grid import:           {:.2} kWh (peak {:.2} kW, {:.2} kWh in peak hours)",
            self.grid_import_kwh, self.peak_grid_import_kw, self.peak_hour_import_kwh
        )?;
        writeln!(f, "Grid CO2:              {:.2} kg", self.co2_kg)?;
        writeln!(
            f,
            "EV energy:             {:.2} kWh ({:.1}% solar, {:.1}% battery, {} full)",
            self.ev_delivered_kwh,
            self.ev_solar_coverage_pct,
            self.ev_battery_coverage_pct,
            self.vehicles_completed
        )?;
        writeln!(
            f,
            "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.battery_throughput_kwh, self.battery_equivalent_full_cycles
        )?;
        writeln!(f, "Dispatch bonus:        {:.4}", self.total_bonus)?;
        write!(f, "Max solar residual:    {:.2e} kW", self.max_solar_residual_kw)
    }
}
