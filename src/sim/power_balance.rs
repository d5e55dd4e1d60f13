//! Reconciling realised flows with the energy actually available.

use super::types::PowerFlows;

/// Solar that was neither consumed nor stored (kW, never negative).
pub fn curtailed_kw(solar_kw: f64, flows: &PowerFlows) -> f64 {
    (solar_kw - flows.solar_used()).max(0.0)
}

/// Demand left for the grid once local supply is counted.
///
/// # Returns
///
/// `(grid_to_ev, grid_to_building)` in kW, both `>= 0`.
pub fn grid_split_kw(ev_kw: f64, building_kw: f64, flows: &PowerFlows) -> (f64, f64) {
    (
        (ev_kw - flows.ev_local()).max(0.0),
        (building_kw - flows.building_local()).max(0.0),
    )
}

/// `generation - used - curtailed`; zero when solar is conserved.
pub fn solar_residual_kw(solar_kw: f64, flows: &PowerFlows, curtailed_kw: f64) -> f64 {
    solar_kw - flows.solar_used() - curtailed_kw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_solar_is_curtailed() {
        let flows = PowerFlows {
            pv_to_ev: 40.0,
            pv_to_building: 400.0,
            ..PowerFlows::default()
        };
        let curtailed = curtailed_kw(2500.0, &flows);
        assert_eq!(curtailed, 2060.0);
        assert_eq!(solar_residual_kw(2500.0, &flows, curtailed), 0.0);
    }

    #[test]
    fn grid_covers_the_rest() {
        let flows = PowerFlows {
            pv_to_ev: 100.0,
            battery_to_building: 50.0,
            ..PowerFlows::default()
        };
        assert_eq!(grid_split_kw(120.0, 200.0, &flows), (20.0, 150.0));
    }

    #[test]
    fn oversupply_never_goes_negative() {
        let flows = PowerFlows {
            pv_to_ev: 10.0,
            ..PowerFlows::default()
        };
        assert_eq!(grid_split_kw(5.0, 0.0, &flows), (0.0, 0.0));
        assert_eq!(curtailed_kw(5.0, &flows), 0.0);
    }
}
