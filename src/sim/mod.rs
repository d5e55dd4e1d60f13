/// Reward-shaping terms for dispatched steps.
pub mod bonus;
/// Simulation clock and step calendar.
pub mod clock;
pub mod controller;
pub mod dispatcher;
pub mod kpi;
pub mod metrics;
pub mod orchestrator;
pub mod power_balance;
/// Waterfall allocation stages.
pub mod stages;
pub mod types;
pub mod validate;

pub use controller::{ActionPolicy, FixedPolicy, NeutralPolicy};
pub use dispatcher::{DispatchPriorities, PriorityDispatcher};
pub use kpi::KpiReport;
pub use orchestrator::{Orchestrator, SimulationInputs};
pub use types::{Action, DispatchPlan, DispatchState, PowerFlows, StepMetrics, TimestepContext};
pub use validate::validate_plan;
