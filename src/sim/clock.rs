use crate::config::SimulationConfig;

use super::types::TimestepContext;

/// A simulation clock that tracks steps over a fixed horizon.
///
/// # Examples
///
/// ```
/// use ev_hub_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut steps = Vec::new();
///
/// clock.run(|step| steps.push(step));
/// assert_eq!(steps, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    current: usize,
    total: usize,
}

impl Clock {
    /// Creates a clock that will yield `total` steps.
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(step)` - The step number (starting from 0) before advancing
    /// * `None` - If the horizon is exhausted
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some(step)
        } else {
            None
        }
    }

    /// Runs `f` for each remaining step.
    pub fn run(&mut self, mut f: impl FnMut(usize)) {
        while let Some(step) = self.tick() {
            f(step);
        }
    }

    /// Like [`run`](Self::run), stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_run<E>(&mut self, mut f: impl FnMut(usize) -> Result<(), E>) -> Result<(), E> {
        while let Some(step) = self.tick() {
            f(step)?;
        }
        Ok(())
    }

    /// Steps not yet yielded.
    pub fn remaining(&self) -> usize {
        self.total - self.current
    }
}

/// Maps timestep indices to hour of day and peak-window membership.
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    steps_per_day: usize,
    dt_hours: f64,
    peak_start_hour: usize,
    peak_end_hour: usize,
}

impl Calendar {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            steps_per_day: config.steps_per_day.max(1),
            dt_hours: config.dt_hours(),
            peak_start_hour: config.peak_start_hour,
            peak_end_hour: config.peak_end_hour,
        }
    }

    pub fn dt_hours(&self) -> f64 {
        self.dt_hours
    }

    /// Context for timestep `t`; the peak window is `[start, end)`.
    pub fn context(&self, t: usize) -> TimestepContext {
        let step_in_day = t % self.steps_per_day;
        let hour_of_day = ((step_in_day as f64 * self.dt_hours).floor() as usize).min(23);
        let is_peak = (self.peak_start_hour..self.peak_end_hour).contains(&hour_of_day);
        TimestepContext::new(t, hour_of_day, is_peak)
    }

    /// Simulation time at the start of step `t` (h).
    pub fn time_hr(&self, t: usize) -> f64 {
        t as f64 * self.dt_hours
    }
}
