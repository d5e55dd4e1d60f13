use crate::devices::series::{ProfileSeries, SeriesStats};
use crate::devices::types::Device;
use crate::error::SimError;
use crate::sim::types::TimestepContext;

/// Read-only cursor over a precomputed demand profile.
///
/// Used for the building load and, one per socket, for vehicle charging
/// demand. Returns **positive** kW (consumption). Samples below
/// `idle_threshold_kw` are counted as idle steps.
#[derive(Debug, Clone)]
pub struct LoadSink {
    series: ProfileSeries,
}

impl LoadSink {
    /// Creates a demand sink named `name` over `demand_kw`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyHorizon`] if the profile is empty.
    pub fn new(
        name: impl Into<String>,
        demand_kw: Vec<f64>,
        idle_threshold_kw: f64,
    ) -> Result<Self, SimError> {
        Ok(Self {
            series: ProfileSeries::new(name, demand_kw, idle_threshold_kw)?,
        })
    }

    /// Sanitized demand at `t` without recording it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimestepOutOfRange`] past the end of the profile.
    pub fn value_at(&self, t: usize) -> Result<f64, SimError> {
        self.series.value_at(t)
    }

    /// Reads demand at `t` and updates the running totals.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimestepOutOfRange`] past the end of the profile.
    pub fn read(&mut self, t: usize) -> Result<f64, SimError> {
        self.series.read(t)
    }

    pub fn name(&self) -> &str {
        self.series.name()
    }

    /// Horizon length.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn stats(&self) -> &SeriesStats {
        self.series.stats()
    }

    pub fn reset(&mut self) {
        self.series.reset();
    }
}

impl Device for LoadSink {
    fn power_kw(&mut self, context: &TimestepContext) -> Result<f64, SimError> {
        self.read(context.index)
    }

    fn device_type(&self) -> &'static str {
        "Load"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_peak_and_average_demand() {
        let mut mall = LoadSink::new("building", vec![200.0, 400.0, 300.0], 0.0).unwrap();
        for t in 0..3 {
            mall.power_kw(&TimestepContext::new(t, t, false)).unwrap();
        }
        assert_eq!(mall.stats().peak, 400.0);
        assert_eq!(mall.stats().average, 300.0);
        assert_eq!(mall.name(), "building");
    }

    #[test]
    fn negative_demand_is_clamped() {
        let mut mall = LoadSink::new("building", vec![-10.0], 0.0).unwrap();
        assert_eq!(mall.read(0).unwrap(), 0.0);
        assert_eq!(mall.stats().anomalies_clamped, 1);
    }
}
