//! Allocation stages of the priority waterfall.
//!
//! Each stage sees the original [`DispatchState`] (for its activation
//! conditions) and the pool of supply and demand left by earlier stages. It
//! returns the amount it allocated and the pool it leaves behind; it never
//! revisits earlier allocations.

use std::fmt;

use super::dispatcher::DispatchPriorities;
use super::types::{DispatchState, StageKind};

/// Supply and demand not yet allocated, in kW.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Remaining {
    pub solar_kw: f64,
    /// Power the battery can still accept this step.
    pub battery_charge_kw: f64,
    /// Power the battery can still deliver this step.
    pub battery_discharge_kw: f64,
    /// Unserved EV demand.
    pub ev_kw: f64,
    /// Unused part of the pool-wide EV power limit.
    pub ev_pool_kw: f64,
    /// Unserved building demand.
    pub building_kw: f64,
    /// Unused part of the building's local supply cap.
    pub building_local_kw: f64,
}

impl Remaining {
    /// Starting pool for a (sanitised) state.
    ///
    /// The battery budgets are the power limit and the stored energy (or
    /// headroom) spread over one timestep, whichever is smaller.
    pub fn initial(state: &DispatchState, priorities: &DispatchPriorities) -> Self {
        let dt = priorities.step_hours;
        Self {
            solar_kw: state.solar_kw,
            battery_charge_kw: state.max_power_kw.min(state.headroom_kwh() / dt),
            battery_discharge_kw: state.max_power_kw.min(state.stored_kwh() / dt),
            ev_kw: state.ev_demand_kw.min(priorities.ev_power_limit_kw),
            ev_pool_kw: priorities.ev_power_limit_kw,
            building_kw: state.building_demand_kw,
            building_local_kw: priorities.building_power_max_kw,
        }
    }
}

/// One step of the waterfall.
pub trait Stage: fmt::Debug + Send + Sync {
    /// Which flow this stage feeds.
    fn kind(&self) -> StageKind;

    /// Allocates from `remaining`, returning the amount and the new pool.
    fn allocate(
        &self,
        state: &DispatchState,
        priorities: &DispatchPriorities,
        remaining: Remaining,
    ) -> (f64, Remaining);
}

/// Solar to vehicles, in daylight only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarToEv;

impl Stage for SolarToEv {
    fn kind(&self) -> StageKind {
        StageKind::SolarToEv
    }

    fn allocate(
        &self,
        state: &DispatchState,
        p: &DispatchPriorities,
        mut r: Remaining,
    ) -> (f64, Remaining) {
        if state.solar_kw < p.pv_day_threshold_kw || r.ev_kw <= 0.0 {
            return (0.0, r);
        }
        let kw = r.solar_kw.min(r.ev_kw).min(r.ev_pool_kw);
        r.solar_kw -= kw;
        r.ev_kw -= kw;
        r.ev_pool_kw -= kw;
        (kw, r)
    }
}

/// Leftover solar into the battery while it is below saturation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarToBattery;

impl Stage for SolarToBattery {
    fn kind(&self) -> StageKind {
        StageKind::SolarToBattery
    }

    fn allocate(
        &self,
        state: &DispatchState,
        p: &DispatchPriorities,
        mut r: Remaining,
    ) -> (f64, Remaining) {
        if r.solar_kw <= 0.0 || state.soc_percent >= p.soc_saturated_percent {
            return (0.0, r);
        }
        let kw = r.solar_kw.min(r.battery_charge_kw);
        r.solar_kw -= kw;
        r.battery_charge_kw -= kw;
        (kw, r)
    }
}

/// Battery to vehicles at night, above the depletion floor.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryToEv;

impl Stage for BatteryToEv {
    fn kind(&self) -> StageKind {
        StageKind::BatteryToEv
    }

    fn allocate(
        &self,
        state: &DispatchState,
        p: &DispatchPriorities,
        mut r: Remaining,
    ) -> (f64, Remaining) {
        if state.solar_kw >= p.pv_night_threshold_kw
            || r.ev_kw <= 0.0
            || state.soc_percent <= p.soc_depleted_percent
        {
            return (0.0, r);
        }
        let kw = r.ev_kw.min(r.ev_pool_kw).min(r.battery_discharge_kw);
        r.ev_kw -= kw;
        r.ev_pool_kw -= kw;
        r.battery_discharge_kw -= kw;
        (kw, r)
    }
}

/// Solar the saturated battery cannot take goes to the building.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarToBuilding;

impl Stage for SolarToBuilding {
    fn kind(&self) -> StageKind {
        StageKind::SolarToBuilding
    }

    fn allocate(
        &self,
        state: &DispatchState,
        p: &DispatchPriorities,
        mut r: Remaining,
    ) -> (f64, Remaining) {
        if state.soc_percent < p.soc_saturated_percent || r.solar_kw <= 0.0 {
            return (0.0, r);
        }
        let kw = r.solar_kw.min(r.building_kw).min(r.building_local_kw);
        r.solar_kw -= kw;
        r.building_kw -= kw;
        r.building_local_kw -= kw;
        (kw, r)
    }
}

/// Peak-hour battery support for the building.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryToBuilding;

impl Stage for BatteryToBuilding {
    fn kind(&self) -> StageKind {
        StageKind::BatteryToBuilding
    }

    fn allocate(
        &self,
        state: &DispatchState,
        p: &DispatchPriorities,
        mut r: Remaining,
    ) -> (f64, Remaining) {
        if !state.context.is_peak
            || r.building_kw <= 0.0
            || state.soc_percent <= p.soc_depleted_percent
        {
            return (0.0, r);
        }
        let kw = r
            .building_kw
            .min(r.building_local_kw)
            .min(r.battery_discharge_kw);
        r.building_kw -= kw;
        r.building_local_kw -= kw;
        r.battery_discharge_kw -= kw;
        (kw, r)
    }
}

/// Residual: whatever demand is left comes from the grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridImport;

impl Stage for GridImport {
    fn kind(&self) -> StageKind {
        StageKind::GridImport
    }

    fn allocate(
        &self,
        _state: &DispatchState,
        _p: &DispatchPriorities,
        mut r: Remaining,
    ) -> (f64, Remaining) {
        let kw = r.ev_kw.max(0.0) + r.building_kw.max(0.0);
        r.ev_kw = 0.0;
        r.building_kw = 0.0;
        (kw, r)
    }
}
