//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::f64::consts::PI;

use ev_hub_sim::config::SystemConfig;
use ev_hub_sim::sim::{DispatchState, Orchestrator, SimulationInputs, TimestepContext};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Peak solar output of the synthetic profile (kW).
pub const SOLAR_PEAK_KW: f64 = 1500.0;

fn hour_of(config: &SystemConfig, t: usize) -> f64 {
    let spd = config.simulation.steps_per_day;
    (t % spd) as f64 * config.dt_hours()
}

/// Half-sine solar day between 06:00 and 18:00.
pub fn solar_profile(config: &SystemConfig, days: usize) -> Vec<f64> {
    let h = config.simulation.steps_per_day * days;
    (0..h)
        .map(|t| {
            let hour = hour_of(config, t);
            if (6.0..18.0).contains(&hour) {
                SOLAR_PEAK_KW * (PI * (hour - 6.0) / 12.0).sin()
            } else {
                0.0
            }
        })
        .collect()
}

/// Mall load: 250 kW base, busier during opening hours, busiest in the evening.
pub fn building_profile(config: &SystemConfig, days: usize) -> Vec<f64> {
    let h = config.simulation.steps_per_day * days;
    (0..h)
        .map(|t| match hour_of(config, t) {
            hour if (18.0..22.0).contains(&hour) => 450.0,
            hour if (9.0..18.0).contains(&hour) => 350.0,
            _ => 250.0,
        })
        .collect()
}

/// One charging session per socket per day at a random hour, at rated power.
pub fn socket_demand(config: &SystemConfig, days: usize, seed: u64) -> Vec<Vec<f64>> {
    let spd = config.simulation.steps_per_day;
    let mut rng = StdRng::seed_from_u64(seed);
    let chargers = &config.chargers;
    let rated = std::iter::repeat_n(chargers.two_wheeler.rated_power_kw, chargers.two_wheeler.sockets)
        .chain(std::iter::repeat_n(
            chargers.three_wheeler.rated_power_kw,
            chargers.three_wheeler.sockets,
        ));

    rated
        .map(|kw| {
            let mut series = vec![0.0; spd * days];
            for day in 0..days {
                let arrival = rng.random_range(0..spd);
                let dwell = rng.random_range(1..=spd / 4);
                for step in arrival..(arrival + dwell).min(spd) {
                    series[day * spd + step] = kw;
                }
            }
            series
        })
        .collect()
}

pub fn inputs(config: &SystemConfig, days: usize) -> SimulationInputs {
    SimulationInputs {
        solar_kw: solar_profile(config, days),
        building_kw: building_profile(config, days),
        socket_demand_kw: socket_demand(config, days, 99),
    }
}

pub fn orchestrator(config: &SystemConfig, days: usize) -> Orchestrator {
    Orchestrator::new(config, inputs(config, days)).unwrap()
}

/// Dispatcher input with the baseline 2000 kWh / 1200 kW battery.
pub fn state(solar_kw: f64, soc_percent: f64, ev_kw: f64, building_kw: f64) -> DispatchState {
    DispatchState {
        solar_kw,
        soc_percent,
        capacity_kwh: 2000.0,
        max_power_kw: 1200.0,
        ev_demand_kw: ev_kw,
        building_demand_kw: building_kw,
        context: TimestepContext::new(0, 12, false),
    }
}

/// Random but reproducible dispatcher input covering the edge regions.
pub fn random_state(rng: &mut StdRng) -> DispatchState {
    let solar_kw = match rng.random_range(0..4) {
        0 => 0.0,
        1 => rng.random_range(0.0..0.6),
        _ => rng.random_range(0.0..3000.0),
    };
    let soc_percent = match rng.random_range(0..5) {
        0 => 0.0,
        1 => 100.0,
        _ => rng.random_range(0.0..=100.0),
    };
    let hour = rng.random_range(0..24);
    DispatchState {
        solar_kw,
        soc_percent,
        capacity_kwh: rng.random_range(1.0..3000.0),
        max_power_kw: rng.random_range(0.0..1500.0),
        ev_demand_kw: rng.random_range(0.0..300.0),
        building_demand_kw: rng.random_range(0.0..800.0),
        context: TimestepContext::new(hour, hour, (18..22).contains(&hour)),
    }
}
