//! Per-timestep orchestration of devices, dispatcher, and metrics.

use tracing::{debug, info};

use crate::config::SystemConfig;
use crate::devices::{BatteryStore, ChargerPool, Device, EnergySource, LoadSink};
use crate::error::SimError;

use super::bonus::DispatchBonus;
use super::clock::{Calendar, Clock};
use super::controller::{ActionPolicy, NeutralPolicy};
use super::dispatcher::{DispatchPriorities, PriorityDispatcher};
use super::metrics::{BuildingMetrics, GridMetrics, SolarMetrics, SystemMetrics};
use super::power_balance::{curtailed_kw, grid_split_kw};
use super::types::{Action, DispatchState, PowerFlows, StepMetrics};

/// Building demand below this counts as an idle step (kW).
const BUILDING_IDLE_KW: f64 = 0.1;

/// Preloaded exogenous series for one horizon.
///
/// All series must share the horizon length `H`; `socket_demand_kw` holds one
/// series per socket, in [`ChargerPool`] socket order.
#[derive(Debug, Clone, Default)]
pub struct SimulationInputs {
    pub solar_kw: Vec<f64>,
    pub building_kw: Vec<f64>,
    pub socket_demand_kw: Vec<Vec<f64>>,
}

/// Owns every stateful component of one episode and drives the step sequence.
///
/// Each step reads the profiles, asks the pool for its requests, asks the
/// dispatcher for a plan, applies the plan to the battery and the pool, and
/// records what actually happened. Only the values returned by
/// [`BatteryStore::apply`] and [`ChargerPool::step`] feed the metrics.
///
/// Instances share nothing; run one per episode to simulate in parallel.
#[derive(Debug)]
pub struct Orchestrator {
    config: SystemConfig,
    calendar: Calendar,
    dispatcher: PriorityDispatcher,
    solar: EnergySource,
    building: LoadSink,
    socket_demand: Vec<LoadSink>,
    battery: BatteryStore,
    pool: ChargerPool,
    horizon: usize,
    next_t: usize,
    solar_metrics: SolarMetrics,
    building_metrics: BuildingMetrics,
    grid_metrics: GridMetrics,
}

impl Orchestrator {
    /// Validates `config` against `inputs` and builds a fresh episode.
    ///
    /// # Errors
    ///
    /// * [`SimError::InvalidConfig`] - `config.validate()` reported problems
    /// * [`SimError::EmptyHorizon`] - the solar series is empty
    /// * [`SimError::LengthMismatch`] - a series differs from the solar length
    /// * [`SimError::SocketCountMismatch`] - one demand series per socket is required
    pub fn new(config: &SystemConfig, inputs: SimulationInputs) -> Result<Self, SimError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(SimError::InvalidConfig(errors));
        }

        let horizon = inputs.solar_kw.len();
        if horizon == 0 {
            return Err(SimError::EmptyHorizon {
                series: "solar".to_string(),
            });
        }
        if inputs.building_kw.len() != horizon {
            return Err(SimError::LengthMismatch {
                series: "building".to_string(),
                expected: horizon,
                actual: inputs.building_kw.len(),
            });
        }
        let sockets = config.chargers.total_sockets();
        if inputs.socket_demand_kw.len() != sockets {
            return Err(SimError::SocketCountMismatch {
                expected: sockets,
                actual: inputs.socket_demand_kw.len(),
            });
        }
        if let Some((i, series)) = inputs
            .socket_demand_kw
            .iter()
            .enumerate()
            .find(|(_, s)| s.len() != horizon)
        {
            return Err(SimError::LengthMismatch {
                series: format!("socket[{i}]"),
                expected: horizon,
                actual: series.len(),
            });
        }

        let dt = config.dt_hours();
        let socket_demand = inputs
            .socket_demand_kw
            .into_iter()
            .enumerate()
            .map(|(i, series)| LoadSink::new(format!("socket[{i}]"), series, 0.0))
            .collect::<Result<Vec<_>, _>>()?;

        let orchestrator = Self {
            config: config.clone(),
            calendar: Calendar::new(&config.simulation),
            dispatcher: PriorityDispatcher::new(DispatchPriorities::from_config(
                &config.dispatch,
                dt,
            )),
            solar: EnergySource::new(inputs.solar_kw, config.dispatch.pv_night_threshold_kw)?,
            building: LoadSink::new("building", inputs.building_kw, BUILDING_IDLE_KW)?,
            socket_demand,
            battery: BatteryStore::new(&config.battery, dt)?,
            pool: ChargerPool::new(&config.chargers, dt, config.simulation.seed)?,
            horizon,
            next_t: 0,
            solar_metrics: SolarMetrics::default(),
            building_metrics: BuildingMetrics::default(),
            grid_metrics: GridMetrics::default(),
        };

        info!(
            horizon,
            sockets,
            dt_hours = dt,
            battery_kwh = config.battery.capacity_kwh,
            battery_kw = config.battery.max_power_kw,
            "orchestrator ready"
        );
        Ok(orchestrator)
    }

    /// Runs timestep `t` under `action`.
    ///
    /// # Errors
    ///
    /// * [`SimError::TimestepOutOfRange`] - `t` is past the horizon
    /// * [`SimError::OutOfOrder`] - `t` is not the next unprocessed step
    /// * [`SimError::ActionLength`] - `action.socket_fractions` is neither
    ///   empty nor one entry per socket
    ///
    /// Nothing is mutated when an error is returned.
    pub fn step(&mut self, t: usize, action: &Action) -> Result<StepMetrics, SimError> {
        if t >= self.horizon {
            return Err(SimError::TimestepOutOfRange {
                series: "horizon".to_string(),
                timestep: t,
                len: self.horizon,
            });
        }
        if t != self.next_t {
            return Err(SimError::OutOfOrder {
                expected: self.next_t,
                got: t,
            });
        }
        let fractions = &action.socket_fractions;
        if !fractions.is_empty() && fractions.len() != self.pool.len() {
            return Err(SimError::ActionLength {
                expected: self.pool.len(),
                actual: fractions.len(),
            });
        }

        let context = self.calendar.context(t);
        let dt = self.calendar.dt_hours();

        // 1. Read profiles
        let solar_kw = self.solar.power_kw(&context)?;
        let building_kw = self.building.power_kw(&context)?;
        let demand_kw = self
            .socket_demand
            .iter_mut()
            .map(|sink| sink.power_kw(&context))
            .collect::<Result<Vec<_>, _>>()?;

        // 2. Pool requests
        self.pool.sync_occupancy(&demand_kw);
        let requests = self.pool.requested_power_kw(&demand_kw, fractions);
        let ev_demand_kw = requests
            .iter()
            .sum::<f64>()
            .min(self.config.dispatch.ev_power_limit_kw);

        // 3. Plan
        let state = DispatchState {
            solar_kw,
            soc_percent: self.battery.soc_percent(),
            capacity_kwh: self.battery.capacity_kwh(),
            max_power_kw: self.battery.max_power_kw() * action.battery_fraction(),
            ev_demand_kw,
            building_demand_kw: building_kw,
            context,
        };
        let plan = self.dispatcher.dispatch(&state);

        // 4. Apply; the pool and the battery have the final say
        let charging = self.pool.step(&requests, ev_demand_kw);
        let ev_delivered_kw = charging.total_kw();
        let pv_to_ev = plan.flows.pv_to_ev.min(ev_delivered_kw);
        let battery_to_ev_req = plan.flows.battery_to_ev.min(ev_delivered_kw - pv_to_ev).max(0.0);
        let applied = self.battery.apply(
            plan.flows.pv_to_battery,
            battery_to_ev_req + plan.flows.battery_to_building,
        );
        let battery_to_ev = applied.discharge_kw.min(battery_to_ev_req);

        let mut flows = PowerFlows {
            pv_to_ev,
            pv_to_battery: applied.charge_kw,
            pv_to_building: plan.flows.pv_to_building,
            battery_to_ev,
            battery_to_building: (applied.discharge_kw - battery_to_ev).max(0.0),
            grid_import: 0.0,
        };
        let (grid_to_ev_kw, grid_to_building_kw) =
            grid_split_kw(ev_delivered_kw, building_kw, &flows);
        flows.grid_import = grid_to_ev_kw + grid_to_building_kw;

        // 5. Record
        let co2 = self.config.grid.co2_kg_per_kwh;
        let metrics = StepMetrics {
            context,
            time_hr: self.calendar.time_hr(t),
            solar_kw,
            building_demand_kw: building_kw,
            ev_demand_kw,
            ev_delivered_kw,
            planned: plan.flows,
            grid_to_ev_kw,
            grid_to_building_kw,
            pv_curtailed_kw: curtailed_kw(solar_kw, &flows),
            battery: applied,
            battery_soc_percent: self.battery.soc_percent(),
            active_sockets: charging.active_sockets,
            completed_vehicles: charging.completed_this_step,
            bonus: DispatchBonus::compute(&flows, &context, co2),
            trace: plan.trace(),
            flows,
        };

        self.solar_metrics.record(&metrics, dt);
        self.building_metrics.record(&metrics, dt);
        self.grid_metrics.record(&metrics, dt, co2);
        self.next_t += 1;

        debug!(
            timestep = t,
            solar_kw,
            ev_kw = ev_delivered_kw,
            grid_kw = metrics.flows.grid_import,
            soc = metrics.battery_soc_percent,
            stages = %metrics.trace,
            "step"
        );
        Ok(metrics)
    }

    /// Runs the rest of the horizon with full-power actions.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`step`](Self::step).
    pub fn run(&mut self) -> Result<Vec<StepMetrics>, SimError> {
        self.run_with(&mut NeutralPolicy)
    }

    /// Runs the rest of the horizon, asking `policy` for each step's action.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`step`](Self::step).
    pub fn run_with<P: ActionPolicy + ?Sized>(
        &mut self,
        policy: &mut P,
    ) -> Result<Vec<StepMetrics>, SimError> {
        let start = self.next_t;
        let mut results = Vec::with_capacity(self.horizon - start);
        let mut clock = Clock::new(self.horizon - start);
        clock.try_run(|i| -> Result<(), SimError> {
            let t = start + i;
            let context = self.calendar.context(t);
            let action = policy.act(&context, self.battery.soc_percent());
            results.push(self.step(t, &action)?);
            Ok(())
        })?;
        Ok(results)
    }

    /// Returns to the episode start: initial SOC, empty sockets, reseeded
    /// arrivals and cleared metrics.
    pub fn reset(&mut self) {
        self.battery.reset();
        self.pool.reset();
        self.solar.reset();
        self.building.reset();
        for sink in &mut self.socket_demand {
            sink.reset();
        }
        self.solar_metrics = SolarMetrics::default();
        self.building_metrics = BuildingMetrics::default();
        self.grid_metrics = GridMetrics::default();
        self.next_t = 0;
        info!(horizon = self.horizon, "episode reset");
    }

    /// Snapshot of every component's cumulative metrics.
    pub fn metrics(&self) -> SystemMetrics {
        SystemMetrics {
            timesteps: self.next_t,
            solar: self.solar_metrics.clone(),
            building: self.building_metrics.clone(),
            grid: self.grid_metrics.clone(),
            battery: self.battery.metrics().clone(),
            chargers: self.pool.metrics().clone(),
            solar_profile: self.solar.stats().clone(),
            building_profile: self.building.stats().clone(),
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Index of the next step [`step`](Self::step) will accept.
    pub fn next_timestep(&self) -> usize {
        self.next_t
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn dt_hours(&self) -> f64 {
        self.calendar.dt_hours()
    }

    pub fn battery(&self) -> &BatteryStore {
        &self.battery
    }

    pub fn pool(&self) -> &ChargerPool {
        &self.pool
    }

    pub fn dispatcher(&self) -> &PriorityDispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(h: usize, sockets: usize) -> SimulationInputs {
        SimulationInputs {
            solar_kw: vec![100.0; h],
            building_kw: vec![50.0; h],
            socket_demand_kw: vec![vec![2.0; h]; sockets],
        }
    }

    #[test]
    fn rejects_mismatched_series() {
        let cfg = SystemConfig::baseline();
        let mut bad = inputs(4, 38);
        bad.building_kw.pop();
        assert!(matches!(
            Orchestrator::new(&cfg, bad),
            Err(SimError::LengthMismatch { .. })
        ));

        assert!(matches!(
            Orchestrator::new(&cfg, inputs(4, 37)),
            Err(SimError::SocketCountMismatch {
                expected: 38,
                actual: 37
            })
        ));

        let mut bad = inputs(4, 38);
        bad.socket_demand_kw[5].push(1.0);
        assert!(matches!(
            Orchestrator::new(&cfg, bad),
            Err(SimError::LengthMismatch { .. })
        ));

        assert!(matches!(
            Orchestrator::new(&cfg, inputs(0, 38)),
            Err(SimError::EmptyHorizon { .. })
        ));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = SystemConfig::baseline();
        cfg.battery.capacity_kwh = 0.0;
        assert!(matches!(
            Orchestrator::new(&cfg, inputs(4, 38)),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn steps_must_be_sequential() {
        let mut orch = Orchestrator::new(&SystemConfig::baseline(), inputs(3, 38)).unwrap();
        assert!(matches!(
            orch.step(1, &Action::neutral()),
            Err(SimError::OutOfOrder {
                expected: 0,
                got: 1
            })
        ));
        orch.step(0, &Action::neutral()).unwrap();
        assert!(matches!(
            orch.step(0, &Action::neutral()),
            Err(SimError::OutOfOrder { .. })
        ));
        assert!(matches!(
            orch.step(3, &Action::neutral()),
            Err(SimError::TimestepOutOfRange { .. })
        ));
        assert_eq!(orch.next_timestep(), 1);
    }

    #[test]
    fn wrong_action_length_is_rejected_without_side_effects() {
        let mut orch = Orchestrator::new(&SystemConfig::baseline(), inputs(2, 38)).unwrap();
        let action = Action {
            battery_power_fraction: 1.0,
            socket_fractions: vec![1.0; 3],
        };
        assert!(matches!(
            orch.step(0, &action),
            Err(SimError::ActionLength {
                expected: 38,
                actual: 3
            })
        ));
        assert_eq!(orch.next_timestep(), 0);
        assert_eq!(orch.metrics().solar_profile.count, 0);
    }

    #[test]
    fn run_covers_the_remaining_horizon() {
        let mut orch = Orchestrator::new(&SystemConfig::baseline(), inputs(5, 38)).unwrap();
        orch.step(0, &Action::neutral()).unwrap();
        let rest = orch.run().unwrap();
        assert_eq!(rest.len(), 4);
        assert_eq!(rest[0].context.index, 1);
        assert_eq!(orch.metrics().timesteps, 5);
        assert!(orch.run().unwrap().is_empty());
    }

    #[test]
    fn zero_battery_fraction_keeps_battery_idle() {
        let mut orch = Orchestrator::new(&SystemConfig::baseline(), inputs(3, 38)).unwrap();
        let mut policy = crate::sim::controller::FixedPolicy::new(Action {
            battery_power_fraction: 0.0,
            socket_fractions: Vec::new(),
        });
        let results = orch.run_with(&mut policy).unwrap();
        assert!(results.iter().all(|r| r.flows.pv_to_battery == 0.0));
        assert_eq!(orch.battery().soc_percent(), 50.0);
    }
}
