use crate::devices::series::{ProfileSeries, SeriesStats};
use crate::devices::types::Device;
use crate::error::SimError;
use crate::sim::types::TimestepContext;

/// Read-only cursor over a precomputed solar generation profile.
///
/// Returns **positive** kW (generation available to the hub). Samples below
/// `dark_threshold_kw` are counted as dark steps in the statistics.
///
/// # Examples
///
/// ```
/// use ev_hub_sim::devices::EnergySource;
///
/// let mut pv = EnergySource::new(vec![0.0, 120.0, 300.0], 0.1).unwrap();
/// assert_eq!(pv.value_at(2).unwrap(), 300.0);
/// pv.read(0).unwrap();
/// assert_eq!(pv.stats().count_below_threshold, 1);
/// ```
#[derive(Debug, Clone)]
pub struct EnergySource {
    series: ProfileSeries,
}

impl EnergySource {
    /// Creates a solar source over `generation_kw`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyHorizon`] if the profile is empty.
    pub fn new(generation_kw: Vec<f64>, dark_threshold_kw: f64) -> Result<Self, SimError> {
        Ok(Self {
            series: ProfileSeries::new("solar", generation_kw, dark_threshold_kw)?,
        })
    }

    /// Sanitized generation at `t` without recording it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimestepOutOfRange`] past the end of the profile.
    pub fn value_at(&self, t: usize) -> Result<f64, SimError> {
        self.series.value_at(t)
    }

    /// Reads generation at `t` and updates the running totals.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimestepOutOfRange`] past the end of the profile.
    pub fn read(&mut self, t: usize) -> Result<f64, SimError> {
        self.series.read(t)
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

impl Device for EnergySource {
    fn power_kw(&mut self, context: &TimestepContext) -> Result<f64, SimError> {
        self.read(context.index)
    }

    fn device_type(&self) -> &'static str {
        "SolarPV"
    }
}
