use serde::Serialize;
use tracing::warn;

use crate::devices::types::sanitize_kw;
use crate::error::SimError;

/// Running statistics over the samples read from a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    /// Number of samples read so far.
    pub count: usize,
    /// Sum of samples (kW × steps).
    pub total: f64,
    /// Largest sample seen (kW).
    pub peak: f64,
    /// Mean of the samples read (kW).
    pub average: f64,
    /// Samples strictly below the profile's threshold.
    pub count_below_threshold: usize,
    /// Samples that were NaN, infinite, or negative and got clamped to zero.
    pub anomalies_clamped: usize,
}

/// Fixed-length power profile with a read cursor and cumulative statistics.
///
/// Shared by [`EnergySource`](super::EnergySource) and
/// [`LoadSink`](super::LoadSink).
#[derive(Debug, Clone)]
pub struct ProfileSeries {
    name: String,
    values: Vec<f64>,
    threshold_kw: f64,
    stats: SeriesStats,
}

impl ProfileSeries {
    /// Wraps a preloaded series.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyHorizon`] if `values` is empty.
    pub fn new(
        name: impl Into<String>,
        values: Vec<f64>,
        threshold_kw: f64,
    ) -> Result<Self, SimError> {
        let name = name.into();
        if values.is_empty() {
            return Err(SimError::EmptyHorizon { series: name });
        }
        Ok(Self {
            name,
            values,
            threshold_kw,
            stats: SeriesStats::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn threshold_kw(&self) -> f64 {
        self.threshold_kw
    }

    /// Sanitized sample at `t`, without touching the statistics.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimestepOutOfRange`] if `t >= len()`.
    pub fn value_at(&self, t: usize) -> Result<f64, SimError> {
        self.raw_at(t).map(|raw| sanitize_kw(raw).0)
    }

    /// Reads the sample at `t` and folds it into the running statistics.
    ///
    /// Anomalous samples are clamped to zero and logged.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimestepOutOfRange`] if `t >= len()`.
    pub fn read(&mut self, t: usize) -> Result<f64, SimError> {
        let raw = self.raw_at(t)?;
        let (value, clamped) = sanitize_kw(raw);
        if clamped {
            warn!(
                series = %self.name,
                timestep = t,
                raw,
                "clamped anomalous sample to zero"
            );
            self.stats.anomalies_clamped += 1;
        }

        let s = &mut self.stats;
        s.count += 1;
        s.total += value;
        s.peak = s.peak.max(value);
        s.average = s.total / s.count as f64;
        if value < self.threshold_kw {
            s.count_below_threshold += 1;
        }
        Ok(value)
    }

    pub fn stats(&self) -> &SeriesStats {
        &self.stats
    }

    /// Clears the statistics; the series itself is immutable.
    pub fn reset(&mut self) {
        self.stats = SeriesStats::default();
    }

    fn raw_at(&self, t: usize) -> Result<f64, SimError> {
        self.values
            .get(t)
            .copied()
            .ok_or_else(|| SimError::TimestepOutOfRange {
                series: self.name.clone(),
                timestep: t,
                len: self.values.len(),
            })
    }
}
