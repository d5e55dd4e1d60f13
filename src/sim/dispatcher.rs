//! Pure priority-waterfall dispatcher.

use crate::config::DispatchConfig;

use super::stages::{
    BatteryToBuilding, BatteryToEv, GridImport, Remaining, SolarToBattery, SolarToBuilding,
    SolarToEv, Stage,
};
use super::types::{DispatchPlan, DispatchState, PowerFlows, StageFired};

/// Thresholds and limits the waterfall runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPriorities {
    /// Solar at or above this is daytime (kW).
    pub pv_day_threshold_kw: f64,
    /// Solar below this is nighttime (kW).
    pub pv_night_threshold_kw: f64,
    /// At or above this SOC the battery takes no more solar (%).
    pub soc_saturated_percent: f64,
    /// At or below this SOC the battery stops discharging (%).
    pub soc_depleted_percent: f64,
    /// Pool-wide EV power cap (kW).
    pub ev_power_limit_kw: f64,
    /// Cap on local supply to the building (kW).
    pub building_power_max_kw: f64,
    /// Add the battery → building stage for peak hours.
    pub battery_to_building_at_peak: bool,
    /// Timestep length used to turn energy budgets into power (h).
    pub step_hours: f64,
}

impl DispatchPriorities {
    pub fn from_config(config: &DispatchConfig, step_hours: f64) -> Self {
        Self {
            pv_day_threshold_kw: config.pv_day_threshold_kw,
            pv_night_threshold_kw: config.pv_night_threshold_kw,
            soc_saturated_percent: config.soc_saturated_percent,
            soc_depleted_percent: config.soc_depleted_percent,
            ev_power_limit_kw: config.ev_power_limit_kw,
            building_power_max_kw: config.building_power_max_kw,
            battery_to_building_at_peak: config.battery_to_building_at_peak,
            step_hours: if step_hours > 0.0 { step_hours } else { 1.0 },
        }
    }
}

impl Default for DispatchPriorities {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default(), 1.0)
    }
}

/// Allocates supply to demand through an ordered list of stages.
///
/// Holds no mutable state: [`dispatch`](Self::dispatch) depends only on its
/// input and the configured priorities, so identical states yield identical
/// plans.
///
/// # Examples
///
/// ```
/// use ev_hub_sim::sim::dispatcher::PriorityDispatcher;
/// use ev_hub_sim::sim::types::{DispatchState, TimestepContext};
///
/// let dispatcher = PriorityDispatcher::default();
/// let plan = dispatcher.dispatch(&DispatchState {
///     solar_kw: 100.0,
///     soc_percent: 60.0,
///     capacity_kwh: 2000.0,
///     max_power_kw: 1200.0,
///     ev_demand_kw: 120.0,
///     building_demand_kw: 200.0,
///     context: TimestepContext::new(12, 12, false),
/// });
/// assert_eq!(plan.flows.pv_to_ev, 100.0);
/// assert_eq!(plan.flows.grid_import, 220.0);
/// ```
#[derive(Debug)]
pub struct PriorityDispatcher {
    priorities: DispatchPriorities,
    stages: Vec<Box<dyn Stage>>,
}

impl Default for PriorityDispatcher {
    fn default() -> Self {
        Self::new(DispatchPriorities::default())
    }
}

impl PriorityDispatcher {
    /// Builds the standard waterfall: solar → EV, solar → battery,
    /// battery → EV, solar → building, then grid. With
    /// `battery_to_building_at_peak` the battery → building stage runs just
    /// before the grid.
    pub fn new(priorities: DispatchPriorities) -> Self {
        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(SolarToEv),
            Box::new(SolarToBattery),
            Box::new(BatteryToEv),
            Box::new(SolarToBuilding),
        ];
        if priorities.battery_to_building_at_peak {
            stages.push(Box::new(BatteryToBuilding));
        }
        stages.push(Box::new(GridImport));
        Self { priorities, stages }
    }

    /// Builds a dispatcher running `stages` in the given order.
    ///
    /// Without a trailing [`GridImport`] unmet demand is left unserved and the
    /// plan will not pass [`validate_plan`](super::validate::validate_plan).
    pub fn with_stages(priorities: DispatchPriorities, stages: Vec<Box<dyn Stage>>) -> Self {
        Self { priorities, stages }
    }

    pub fn priorities(&self) -> &DispatchPriorities {
        &self.priorities
    }

    /// Runs the waterfall once.
    ///
    /// Inputs are sanitised first (non-finite or negative values read as
    /// zero, SOC clamped to `[0, 100]`), so this never panics.
    pub fn dispatch(&self, state: &DispatchState) -> DispatchPlan {
        let state = sanitize(state);
        let mut remaining = Remaining::initial(&state, &self.priorities);
        let mut flows = PowerFlows::default();
        let mut stages = Vec::new();

        for stage in &self.stages {
            let (kw, next) = stage.allocate(&state, &self.priorities, remaining);
            remaining = next;
            if kw > 0.0 {
                flows.add(stage.kind(), kw);
                stages.push(StageFired {
                    stage: stage.kind(),
                    allocated_kw: kw,
                });
            }
        }

        DispatchPlan {
            battery_charging: flows.pv_to_battery > 0.0,
            battery_discharging: flows.battery_discharge() > 0.0,
            flows,
            stages,
        }
    }
}

fn sanitize(state: &DispatchState) -> DispatchState {
    let kw = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
    DispatchState {
        solar_kw: kw(state.solar_kw),
        soc_percent: if state.soc_percent.is_finite() {
            state.soc_percent.clamp(0.0, 100.0)
        } else {
            0.0
        },
        capacity_kwh: kw(state.capacity_kwh),
        max_power_kw: kw(state.max_power_kw),
        ev_demand_kw: kw(state.ev_demand_kw),
        building_demand_kw: kw(state.building_demand_kw),
        context: state.context,
    }
}
