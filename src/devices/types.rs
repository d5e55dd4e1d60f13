//! Common types and traits for device simulation components.

use crate::error::SimError;
use crate::sim::types::TimestepContext;

/// Trait defining a device that reports power at a timestep.
///
/// This trait provides a common interface for the read-only profile devices
/// (generation and demand), so the orchestrator can sample them uniformly.
pub trait Device {
    /// Returns the power value at the timestep in `context`.
    ///
    /// Values are always finite and non-negative; anomalous samples are
    /// clamped to zero and counted by the device.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TimestepOutOfRange`] when the timestep lies past the
    /// end of the underlying series.
    fn power_kw(&mut self, context: &TimestepContext) -> Result<f64, SimError>;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Maps a raw sample onto the domain every consumer expects.
///
/// NaN, infinities, and negative values become `0.0`; the second element
/// reports whether the sample was altered.
pub fn sanitize_kw(raw: f64) -> (f64, bool) {
    if raw.is_finite() && raw >= 0.0 {
        (raw, false)
    } else {
        (0.0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_kw;

    #[test]
    fn passes_valid_samples_through() {
        assert_eq!(sanitize_kw(0.0), (0.0, false));
        assert_eq!(sanitize_kw(12.5), (12.5, false));
    }

    #[test]
    fn clamps_anomalies_to_zero() {
        assert_eq!(sanitize_kw(f64::NAN), (0.0, true));
        assert_eq!(sanitize_kw(-3.0), (0.0, true));
        assert_eq!(sanitize_kw(f64::INFINITY), (0.0, true));
    }
}
