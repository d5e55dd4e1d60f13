//! Core simulation types: per-step inputs, dispatch plans, and step records.

use std::fmt;

use serde::Serialize;

use crate::devices::{AppliedEnergy, BatteryMode};

use super::bonus::DispatchBonus;

/// Position of one timestep in the horizon and in the day.
///
/// Derived by the [`Calendar`](super::clock::Calendar), immutable per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimestepContext {
    /// Timestep index (0..H-1).
    pub index: usize,
    /// Hour of the day this step starts in (0..24).
    pub hour_of_day: usize,
    /// Whether the step falls in the configured evening peak window.
    pub is_peak: bool,
}

impl TimestepContext {
    pub fn new(index: usize, hour_of_day: usize, is_peak: bool) -> Self {
        Self {
            index,
            hour_of_day,
            is_peak,
        }
    }
}

/// Snapshot handed to the dispatcher, built fresh every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DispatchState {
    /// Solar power available this step (kW).
    pub solar_kw: f64,
    /// Battery state of charge (0–100 %).
    pub soc_percent: f64,
    /// Battery energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Battery power limit for this step (kW).
    pub max_power_kw: f64,
    /// Aggregate charging demand of the pool (kW).
    pub ev_demand_kw: f64,
    /// Building demand (kW).
    pub building_demand_kw: f64,
    pub context: TimestepContext,
}

impl DispatchState {
    /// Energy currently stored (kWh).
    pub fn stored_kwh(&self) -> f64 {
        self.soc_percent.clamp(0.0, 100.0) / 100.0 * self.capacity_kwh.max(0.0)
    }

    /// Energy the battery can still take in (kWh).
    pub fn headroom_kwh(&self) -> f64 {
        (self.capacity_kwh.max(0.0) - self.stored_kwh()).max(0.0)
    }
}

/// The six power flows of one step, all in kW and never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PowerFlows {
    pub pv_to_ev: f64,
    pub pv_to_battery: f64,
    pub pv_to_building: f64,
    pub battery_to_ev: f64,
    pub battery_to_building: f64,
    /// Unmet EV and building demand covered by the grid.
    pub grid_import: f64,
}

impl PowerFlows {
    /// Solar consumed by all sinks.
    pub fn solar_used(&self) -> f64 {
        self.pv_to_ev + self.pv_to_battery + self.pv_to_building
    }

    /// Power drawn out of the battery.
    pub fn battery_discharge(&self) -> f64 {
        self.battery_to_ev + self.battery_to_building
    }

    /// EV demand covered locally (solar and battery).
    pub fn ev_local(&self) -> f64 {
        self.pv_to_ev + self.battery_to_ev
    }

    /// Building demand covered locally (solar and battery).
    pub fn building_local(&self) -> f64 {
        self.pv_to_building + self.battery_to_building
    }

    /// Named view of every flow, in waterfall order.
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("pv_to_ev", self.pv_to_ev),
            ("pv_to_battery", self.pv_to_battery),
            ("battery_to_ev", self.battery_to_ev),
            ("pv_to_building", self.pv_to_building),
            ("battery_to_building", self.battery_to_building),
            ("grid_import", self.grid_import),
        ]
    }

    pub(crate) fn add(&mut self, kind: StageKind, kw: f64) {
        let flow = match kind {
            StageKind::SolarToEv => &mut self.pv_to_ev,
            StageKind::SolarToBattery => &mut self.pv_to_battery,
            StageKind::BatteryToEv => &mut self.battery_to_ev,
            StageKind::SolarToBuilding => &mut self.pv_to_building,
            StageKind::BatteryToBuilding => &mut self.battery_to_building,
            StageKind::GridImport => &mut self.grid_import,
        };
        *flow += kw;
    }
}

/// Allocation stage of the priority waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageKind {
    SolarToEv,
    SolarToBattery,
    BatteryToEv,
    SolarToBuilding,
    BatteryToBuilding,
    GridImport,
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::SolarToEv => "solar->ev",
            Self::SolarToBattery => "solar->battery",
            Self::BatteryToEv => "battery->ev",
            Self::SolarToBuilding => "solar->building",
            Self::BatteryToBuilding => "battery->building",
            Self::GridImport => "grid",
        }
    }
}

/// A stage that allocated a non-zero amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageFired {
    pub stage: StageKind,
    pub allocated_kw: f64,
}

/// Output of [`PriorityDispatcher::dispatch`](super::dispatcher::PriorityDispatcher::dispatch).
///
/// Advisory until applied through the battery and the charger pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchPlan {
    pub flows: PowerFlows,
    pub battery_charging: bool,
    pub battery_discharging: bool,
    /// Stages that fired, in execution order.
    pub stages: Vec<StageFired>,
}

impl DispatchPlan {
    /// Human-readable record of the stages that fired.
    pub fn trace(&self) -> String {
        if self.stages.is_empty() {
            return "idle".to_string();
        }
        self.stages
            .iter()
            .map(|s| format!("{} {:.2} kW", s.stage.label(), s.allocated_kw))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Per-step command from the external policy.
///
/// `battery_power_fraction` scales the battery power limit handed to the
/// dispatcher; `socket_fractions` scales each socket's request. Values are
/// clamped to `[0, 1]` on use. An empty `socket_fractions` means every socket
/// at full request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub battery_power_fraction: f64,
    pub socket_fractions: Vec<f64>,
}

impl Default for Action {
    fn default() -> Self {
        Self {
            battery_power_fraction: 1.0,
            socket_fractions: Vec::new(),
        }
    }
}

impl Action {
    /// Full battery power, full socket requests.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Battery fraction clamped to `[0, 1]`, NaN read as zero.
    pub fn battery_fraction(&self) -> f64 {
        if self.battery_power_fraction.is_nan() {
            0.0
        } else {
            self.battery_power_fraction.clamp(0.0, 1.0)
        }
    }
}

/// Complete record of one orchestrated timestep.
///
/// `flows` are the flows actually realised after the battery and charger
/// pool applied the plan; `planned` is the dispatcher's advisory plan.
#[derive(Debug, Clone, Serialize)]
pub struct StepMetrics {
    pub context: TimestepContext,
    /// Simulation time at step start (h).
    pub time_hr: f64,
    /// Solar generation after sanitising (kW).
    pub solar_kw: f64,
    /// Building demand after sanitising (kW).
    pub building_demand_kw: f64,
    /// Pool demand handed to the dispatcher (kW).
    pub ev_demand_kw: f64,
    /// Power the pool actually delivered (kW).
    pub ev_delivered_kw: f64,
    pub planned: PowerFlows,
    pub flows: PowerFlows,
    pub grid_to_ev_kw: f64,
    pub grid_to_building_kw: f64,
    pub pv_curtailed_kw: f64,
    pub battery: AppliedEnergy,
    /// Battery SOC after this step (%).
    pub battery_soc_percent: f64,
    pub active_sockets: usize,
    pub completed_vehicles: usize,
    pub bonus: DispatchBonus,
    pub trace: String,
}

impl StepMetrics {
    /// Solar conservation residual: `generation - used - curtailed` (kW).
    pub fn solar_residual_kw(&self) -> f64 {
        self.solar_kw - self.flows.solar_used() - self.pv_curtailed_kw
    }

    pub fn battery_mode(&self) -> BatteryMode {
        self.battery.mode
    }
}

impl fmt::Display for StepMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>5} ({:>2}h{}) | pv={:>8.2} kW  ev={:>7.2}/{:>7.2} kW  bldg={:>7.2} kW | \
             grid={:>7.2} kW  curtailed={:>7.2} kW | bess={:?} (SoC={:.1}%) | {}",
            self.context.index,
            self.context.hour_of_day,
            if self.context.is_peak { " peak" } else { "" },
            self.solar_kw,
            self.ev_delivered_kw,
            self.ev_demand_kw,
            self.building_demand_kw,
            self.flows.grid_import,
            self.pv_curtailed_kw,
            self.battery.mode,
            self.battery_soc_percent,
            self.trace,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_helpers_sum_components() {
        let flows = PowerFlows {
            pv_to_ev: 1.0,
            pv_to_battery: 2.0,
            pv_to_building: 3.0,
            battery_to_ev: 4.0,
            battery_to_building: 5.0,
            grid_import: 6.0,
        };
        assert_eq!(flows.solar_used(), 6.0);
        assert_eq!(flows.battery_discharge(), 9.0);
        assert_eq!(flows.ev_local(), 5.0);
        assert_eq!(flows.building_local(), 8.0);
        assert_eq!(flows.named().iter().map(|(_, v)| v).sum::<f64>(), 21.0);
    }

    #[test]
    fn dispatch_state_energy_views() {
        let state = DispatchState {
            solar_kw: 0.0,
            soc_percent: 60.0,
            capacity_kwh: 2000.0,
            max_power_kw: 1200.0,
            ev_demand_kw: 0.0,
            building_demand_kw: 0.0,
            context: TimestepContext::new(0, 0, false),
        };
        assert_eq!(state.stored_kwh(), 1200.0);
        assert_eq!(state.headroom_kwh(), 800.0);
    }

    #[test]
    fn action_fraction_is_clamped() {
        let mut action = Action::neutral();
        assert_eq!(action.battery_fraction(), 1.0);
        action.battery_power_fraction = 3.0;
        assert_eq!(action.battery_fraction(), 1.0);
        action.battery_power_fraction = -1.0;
        assert_eq!(action.battery_fraction(), 0.0);
        action.battery_power_fraction = f64::NAN;
        assert_eq!(action.battery_fraction(), 0.0);
    }

    #[test]
    fn trace_lists_fired_stages() {
        let plan = DispatchPlan {
            stages: vec![
                StageFired {
                    stage: StageKind::SolarToEv,
                    allocated_kw: 100.0,
                },
                StageFired {
                    stage: StageKind::GridImport,
                    allocated_kw: 220.0,
                },
            ],
            ..DispatchPlan::default()
        };
        assert_eq!(plan.trace(), "solar->ev 100.00 kW | grid 220.00 kW");
        assert_eq!(DispatchPlan::default().trace(), "idle");
    }
}
