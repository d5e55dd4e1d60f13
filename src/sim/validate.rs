//! Independent audit of a dispatch plan.
//!
//! Re-derives every plan invariant from the state and the priorities without
//! reusing the stage code. Nothing at runtime depends on it; tests and audits
//! call it to catch dispatcher defects.

use super::dispatcher::DispatchPriorities;
use super::types::{DispatchPlan, DispatchState};

const TOLERANCE: f64 = 1e-9;

fn close_enough(value: f64, bound: f64) -> bool {
    value <= bound + TOLERANCE * (1.0 + bound.abs())
}

/// Checks `plan` against `state` and `priorities`.
///
/// # Errors
///
/// Returns one message per violated invariant.
pub fn validate_plan(
    plan: &DispatchPlan,
    state: &DispatchState,
    priorities: &DispatchPriorities,
) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();
    let f = &plan.flows;
    let dt = priorities.step_hours;

    for (name, value) in f.named() {
        if !value.is_finite() || value < 0.0 {
            violations.push(format!("{name} must be finite and >= 0, got {value}"));
        }
    }

    let solar = state.solar_kw.max(0.0);
    if !close_enough(f.solar_used(), solar) {
        violations.push(format!(
            "solar flows {:.6} kW exceed available solar {solar:.6} kW",
            f.solar_used()
        ));
    }

    let max_discharge = state.max_power_kw.min(state.stored_kwh() / dt);
    if !close_enough(f.battery_discharge(), max_discharge) {
        violations.push(format!(
            "battery discharge {:.6} kW exceeds dischargeable {max_discharge:.6} kW",
            f.battery_discharge()
        ));
    }

    let max_charge = state.max_power_kw.min(state.headroom_kwh() / dt);
    if !close_enough(f.pv_to_battery, max_charge) {
        violations.push(format!(
            "battery charge {:.6} kW exceeds limit {max_charge:.6} kW",
            f.pv_to_battery
        ));
    }

    let ev_demand = state.ev_demand_kw.min(priorities.ev_power_limit_kw);
    if !close_enough(f.ev_local(), ev_demand) {
        violations.push(format!(
            "local EV supply {:.6} kW exceeds capped demand {ev_demand:.6} kW",
            f.ev_local()
        ));
    }

    let building_cap = state.building_demand_kw.min(priorities.building_power_max_kw);
    if !close_enough(f.building_local(), building_cap) {
        violations.push(format!(
            "local building supply {:.6} kW exceeds {building_cap:.6} kW",
            f.building_local()
        ));
    }

    let expected_grid =
        (ev_demand - f.ev_local()).max(0.0) + (state.building_demand_kw - f.building_local()).max(0.0);
    if (f.grid_import - expected_grid).abs() > TOLERANCE * (1.0 + expected_grid) {
        violations.push(format!(
            "grid import {:.6} kW != unmet demand {expected_grid:.6} kW",
            f.grid_import
        ));
    }

    if plan.battery_charging != (f.pv_to_battery > 0.0) {
        violations.push("battery_charging flag disagrees with solar->battery flow".to_string());
    }
    if plan.battery_discharging != (f.battery_discharge() > 0.0) {
        violations.push("battery_discharging flag disagrees with battery outflows".to_string());
    }

    // Stage gating
    if f.pv_to_ev > 0.0 && solar < priorities.pv_day_threshold_kw {
        violations.push("solar->ev outside daytime".to_string());
    }
    if f.battery_to_ev > 0.0
        && (solar >= priorities.pv_night_threshold_kw
            || state.soc_percent <= priorities.soc_depleted_percent)
    {
        violations.push("battery->ev outside night or below depletion floor".to_string());
    }
    if f.pv_to_battery > 0.0 && state.soc_percent >= priorities.soc_saturated_percent {
        violations.push("solar->battery while saturated".to_string());
    }
    if f.pv_to_building > 0.0 && state.soc_percent < priorities.soc_saturated_percent {
        violations.push("solar->building while battery not saturated".to_string());
    }
    if f.battery_to_building > 0.0
        && !(priorities.battery_to_building_at_peak && state.context.is_peak)
    {
        violations.push("battery->building outside an enabled peak window".to_string());
    }

    // EV demand is served by solar before the battery gets any
    if f.pv_to_battery > 0.0
        && solar >= priorities.pv_day_threshold_kw
        && ev_demand > 0.0
        && f.pv_to_ev + TOLERANCE < ev_demand
    {
        violations.push(format!(
            "solar->battery {:.6} kW while EV demand {ev_demand:.6} kW got only {:.6} kW of solar",
            f.pv_to_battery, f.pv_to_ev
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::dispatcher::PriorityDispatcher;
    use crate::sim::types::TimestepContext;

    fn state() -> DispatchState {
        DispatchState {
            solar_kw: 300.0,
            soc_percent: 50.0,
            capacity_kwh: 2000.0,
            max_power_kw: 1200.0,
            ev_demand_kw: 100.0,
            building_demand_kw: 250.0,
            context: TimestepContext::new(10, 10, false),
        }
    }

    #[test]
    fn dispatcher_output_is_valid() {
        let s = state();
        let p = DispatchPriorities::default();
        let plan = PriorityDispatcher::new(p.clone()).dispatch(&s);
        assert_eq!(validate_plan(&plan, &s, &p), Ok(()));
    }

    #[test]
    fn catches_overdrawn_solar_and_negative_flow() {
        let s = state();
        let p = DispatchPriorities::default();
        let mut plan = PriorityDispatcher::new(p.clone()).dispatch(&s);
        plan.flows.pv_to_battery += 500.0;
        plan.flows.pv_to_building = -1.0;
        let errors = validate_plan(&plan, &s, &p).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("exceed available solar")));
        assert!(errors.iter().any(|e| e.starts_with("pv_to_building")));
    }

    #[test]
    fn catches_wrong_grid_import() {
        let s = state();
        let p = DispatchPriorities::default();
        let mut plan = PriorityDispatcher::new(p.clone()).dispatch(&s);
        plan.flows.grid_import += 1.0;
        let errors = validate_plan(&plan, &s, &p).unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("grid import")));
    }

    #[test]
    fn catches_battery_fed_before_evs() {
        let s = state();
        let p = DispatchPriorities::default();
        let mut plan = PriorityDispatcher::new(p.clone()).dispatch(&s);
        plan.flows.pv_to_ev = 0.0;
        plan.flows.grid_import += 100.0;
        let errors = validate_plan(&plan, &s, &p).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("got only")));
    }
}
