use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::config::{ChargersConfig, SocketClassConfig};
use crate::error::{ConfigError, SimError};

/// Category of vehicle a socket is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VehicleClass {
    /// Electric motorcycle.
    TwoWheeler,
    /// Electric moto-taxi.
    ThreeWheeler,
}

impl VehicleClass {
    pub fn label(self) -> &'static str {
        match self {
            Self::TwoWheeler => "two_wheeler",
            Self::ThreeWheeler => "three_wheeler",
        }
    }
}

/// One charging point and the vehicle currently plugged into it, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketState {
    pub vehicle_class: VehicleClass,
    /// Maximum power the socket can deliver (kW).
    pub rated_power_kw: f64,
    /// Battery size of a vehicle of this class (kWh).
    pub battery_kwh: f64,
    /// SOC of the plugged-in vehicle (0–100 %). Meaningless while vacant.
    pub current_soc_percent: f64,
    pub occupied: bool,
    /// Vehicles that reached 100 % on this socket.
    pub completions: usize,
}

impl SocketState {
    fn new(vehicle_class: VehicleClass, class: &SocketClassConfig) -> Self {
        Self {
            vehicle_class,
            rated_power_kw: class.rated_power_kw,
            battery_kwh: class.battery_kwh,
            current_soc_percent: 0.0,
            occupied: false,
            completions: 0,
        }
    }

    /// Energy the plugged-in vehicle can still take (kWh).
    pub fn headroom_kwh(&self) -> f64 {
        ((100.0 - self.current_soc_percent) / 100.0 * self.battery_kwh).max(0.0)
    }
}

/// Outcome of one [`ChargerPool::step`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargingResult {
    /// Power actually delivered per socket (kW).
    pub allocated_kw: Vec<f64>,
    /// Energy delivered across all sockets (kWh).
    pub delivered_kwh: f64,
    /// Energy requested across all sockets (kWh).
    pub requested_kwh: f64,
    /// Common factor applied to every request; 1.0 when supply sufficed.
    pub scale_factor: f64,
    /// Sockets that received power this step.
    pub active_sockets: usize,
    /// Vehicles that crossed 100 % this step.
    pub completed_this_step: usize,
}

impl ChargingResult {
    /// Sum of [`allocated_kw`](Self::allocated_kw).
    pub fn total_kw(&self) -> f64 {
        self.allocated_kw.iter().sum()
    }
}

/// Per-class aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub sockets: usize,
    pub occupied: usize,
    /// Mean SOC over occupied sockets of this class (0 when none).
    pub avg_soc_percent: f64,
    pub delivered_kwh: f64,
    pub completions: usize,
}

/// Lifetime aggregates for the whole pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargerMetrics {
    pub timesteps: usize,
    pub total_requested_kwh: f64,
    pub total_delivered_kwh: f64,
    pub peak_power_kw: f64,
    /// Steps in which requests had to be scaled down.
    pub steps_scaled: usize,
    /// Sockets that drew power in the most recent step.
    pub active_sockets: usize,
    pub vehicles_arrived: usize,
    pub completions: usize,
    pub two_wheeler: ClassMetrics,
    pub three_wheeler: ClassMetrics,
}

/// Fixed set of charging sockets grouped by vehicle class.
///
/// Sockets are laid out two-wheelers first, then three-wheelers; that index
/// order is the order of every per-socket slice the pool accepts or returns.
/// When supply is short, every request is scaled by the same factor
/// (proportional fair share, no priority inside the pool).
#[derive(Debug, Clone)]
pub struct ChargerPool {
    sockets: Vec<SocketState>,
    dt_hours: f64,
    arrival_soc_max_percent: f64,
    seed: u64,
    rng: StdRng,
    metrics: ChargerMetrics,
}

impl ChargerPool {
    /// Creates a pool of vacant sockets.
    ///
    /// # Arguments
    ///
    /// * `config` - Socket classes and the arrival SOC range
    /// * `dt_hours` - Timestep length (must be > 0)
    /// * `seed` - Seed for arrival SOC sampling
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if there are no sockets, a class
    /// with sockets has non-positive power or battery size, or `dt_hours` is
    /// not positive.
    pub fn new(config: &ChargersConfig, dt_hours: f64, seed: u64) -> Result<Self, SimError> {
        let classes = [
            (VehicleClass::TwoWheeler, &config.two_wheeler),
            (VehicleClass::ThreeWheeler, &config.three_wheeler),
        ];

        let mut errors = Vec::new();
        if config.total_sockets() == 0 {
            errors.push(ConfigError::new("chargers", "at least one socket is required"));
        }
        for (class, cfg) in classes {
            if cfg.sockets > 0 && !(cfg.rated_power_kw > 0.0 && cfg.battery_kwh > 0.0) {
                errors.push(ConfigError::new(
                    format!("chargers.{}", class.label()),
                    "rated_power_kw and battery_kwh must be > 0",
                ));
            }
        }
        if !(0.0..=100.0).contains(&config.arrival_soc_max_percent) {
            errors.push(ConfigError::new(
                "chargers.arrival_soc_max_percent",
                "must be in [0, 100]",
            ));
        }
        if !(dt_hours > 0.0) {
            errors.push(ConfigError::new("simulation.steps_per_day", "timestep must be > 0 h"));
        }
        if !errors.is_empty() {
            return Err(SimError::InvalidConfig(errors));
        }

        let sockets = classes
            .iter()
            .flat_map(|&(class, cfg)| (0..cfg.sockets).map(move |_| SocketState::new(class, cfg)))
            .collect();

        let mut pool = Self {
            sockets,
            dt_hours,
            arrival_soc_max_percent: config.arrival_soc_max_percent,
            seed,
            rng: StdRng::seed_from_u64(seed),
            metrics: ChargerMetrics::default(),
        };
        pool.refresh_class_metrics();
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub fn sockets(&self) -> &[SocketState] {
        &self.sockets
    }

    pub fn metrics(&self) -> &ChargerMetrics {
        &self.metrics
    }

    /// Plugs a vehicle arriving at `arrival_soc_percent` into `socket`.
    ///
    /// Returns `false` if the index is out of range. An occupied socket gets
    /// the new vehicle.
    pub fn occupy(&mut self, socket: usize, arrival_soc_percent: f64) -> bool {
        let Some(s) = self.sockets.get_mut(socket) else {
            return false;
        };
        s.occupied = true;
        s.current_soc_percent = if arrival_soc_percent.is_finite() {
            arrival_soc_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.metrics.vehicles_arrived += 1;
        true
    }

    /// Unplugs whatever vehicle is on `socket`. Returns `false` if out of range.
    pub fn release(&mut self, socket: usize) -> bool {
        let Some(s) = self.sockets.get_mut(socket) else {
            return false;
        };
        s.occupied = false;
        s.current_soc_percent = 0.0;
        true
    }

    /// Brings occupancy in line with this step's per-socket demand.
    ///
    /// Vehicles that finished or whose demand dropped to zero leave; a vacant
    /// socket with demand gets a new vehicle with a random arrival SOC.
    pub fn sync_occupancy(&mut self, demand_kw: &[f64]) {
        for i in 0..self.sockets.len() {
            let wants = demand_kw.get(i).is_some_and(|d| *d > 0.0);
            let s = &self.sockets[i];
            if s.occupied && (!wants || s.current_soc_percent >= 100.0) {
                self.release(i);
            }
            if wants && !self.sockets[i].occupied {
                let soc = self.sample_arrival_soc();
                self.occupy(i, soc);
            }
        }
        self.refresh_class_metrics();
    }

    fn sample_arrival_soc(&mut self) -> f64 {
        if self.arrival_soc_max_percent > 0.0 {
            self.rng.random_range(0.0..=self.arrival_soc_max_percent)
        } else {
            0.0
        }
    }

    /// Per-socket request for this step.
    ///
    /// Each occupied socket asks for `min(demand, rated_power) × fraction`,
    /// capped by what its vehicle can still absorb in one timestep. Vacant
    /// sockets ask for nothing. Fractions are clamped to `[0, 1]` (NaN → 0); a
    /// missing fraction counts as 1.0.
    pub fn requested_power_kw(&self, demand_kw: &[f64], fractions: &[f64]) -> Vec<f64> {
        self.sockets
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if !s.occupied {
                    return 0.0;
                }
                let demand = demand_kw.get(i).copied().filter(|d| d.is_finite()).unwrap_or(0.0);
                let fraction = fractions.get(i).copied().map(clamp_fraction).unwrap_or(1.0);
                (demand.min(s.rated_power_kw) * fraction)
                    .min(s.headroom_kwh() / self.dt_hours)
                    .max(0.0)
            })
            .collect()
    }

    /// Delivers up to `available_kw` across the sockets.
    ///
    /// If the requests sum to more than `available_kw`, all of them are
    /// scaled by `available_kw / sum`. Each socket's SOC rises by the energy it
    /// received, clamped to 100 %, and a completion is counted when it crosses
    /// 100 %. Negative or non-finite requests count as zero; requests beyond
    /// the socket count are ignored. Never fails.
    pub fn step(&mut self, requested_kw: &[f64], available_kw: f64) -> ChargingResult {
        let available_kw = if available_kw.is_finite() { available_kw.max(0.0) } else { 0.0 };
        let requests: Vec<f64> = (0..self.sockets.len())
            .map(|i| {
                let r = requested_kw.get(i).copied().unwrap_or(0.0);
                if r.is_finite() { r.max(0.0) } else { 0.0 }
            })
            .collect();

        let total_requested: f64 = requests.iter().sum();
        let scale_factor = if total_requested > available_kw && total_requested > 0.0 {
            available_kw / total_requested
        } else {
            1.0
        };

        let mut result = ChargingResult {
            allocated_kw: Vec::with_capacity(requests.len()),
            requested_kwh: total_requested * self.dt_hours,
            scale_factor,
            ..ChargingResult::default()
        };

        for (socket, request) in self.sockets.iter_mut().zip(&requests) {
            let allocated = (request * scale_factor).min(socket.headroom_kwh() / self.dt_hours);
            result.allocated_kw.push(allocated);
            if allocated <= 0.0 {
                continue;
            }

            let energy_kwh = allocated * self.dt_hours;
            let before = socket.current_soc_percent;
            socket.current_soc_percent =
                (before + energy_kwh / socket.battery_kwh * 100.0).min(100.0);
            if before < 100.0 && socket.current_soc_percent >= 100.0 {
                socket.completions += 1;
                result.completed_this_step += 1;
            }

            result.delivered_kwh += energy_kwh;
            result.active_sockets += 1;
            let class = match socket.vehicle_class {
                VehicleClass::TwoWheeler => &mut self.metrics.two_wheeler,
                VehicleClass::ThreeWheeler => &mut self.metrics.three_wheeler,
            };
            class.delivered_kwh += energy_kwh;
        }

        let m = &mut self.metrics;
        m.timesteps += 1;
        m.total_requested_kwh += result.requested_kwh;
        m.total_delivered_kwh += result.delivered_kwh;
        m.peak_power_kw = m.peak_power_kw.max(result.total_kw());
        m.active_sockets = result.active_sockets;
        m.completions += result.completed_this_step;
        if scale_factor < 1.0 {
            m.steps_scaled += 1;
        }
        self.refresh_class_metrics();

        result
    }

    /// Empties every socket, clears counters and reseeds the arrival sampler.
    pub fn reset(&mut self) {
        for s in &mut self.sockets {
            s.occupied = false;
            s.current_soc_percent = 0.0;
            s.completions = 0;
        }
        self.rng = StdRng::seed_from_u64(self.seed);
        self.metrics = ChargerMetrics::default();
        self.refresh_class_metrics();
    }

    fn refresh_class_metrics(&mut self) {
        for class in [VehicleClass::TwoWheeler, VehicleClass::ThreeWheeler] {
            let mut sockets = 0;
            let mut occupied = 0;
            let mut soc_sum = 0.0;
            let mut completions = 0;
            for s in self.sockets.iter().filter(|s| s.vehicle_class == class) {
                sockets += 1;
                completions += s.completions;
                if s.occupied {
                    occupied += 1;
                    soc_sum += s.current_soc_percent;
                }
            }
            let m = match class {
                VehicleClass::TwoWheeler => &mut self.metrics.two_wheeler,
                VehicleClass::ThreeWheeler => &mut self.metrics.three_wheeler,
            };
            m.sockets = sockets;
            m.occupied = occupied;
            m.completions = completions;
            m.avg_soc_percent = if occupied > 0 { soc_sum / occupied as f64 } else { 0.0 };
        }
    }
}

fn clamp_fraction(f: f64) -> f64 {
    if f.is_nan() { 0.0 } else { f.clamp(0.0, 1.0) }
}
