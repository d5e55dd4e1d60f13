//! Policy seam: where per-step actions come from.

use super::types::{Action, TimestepContext};

/// Produces the action for each step.
///
/// Implemented by external policies (learned or rule-based). The orchestrator
/// calls it once per step before dispatch.
pub trait ActionPolicy {
    /// Returns the action for the step described by `context`.
    ///
    /// `soc_percent` is the battery SOC at the start of the step.
    fn act(&mut self, context: &TimestepContext, soc_percent: f64) -> Action;
}

/// Full battery power and full socket requests every step.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralPolicy;

impl ActionPolicy for NeutralPolicy {
    fn act(&mut self, _context: &TimestepContext, _soc_percent: f64) -> Action {
        Action::neutral()
    }
}

/// Replays the same action every step.
#[derive(Debug, Clone)]
pub struct FixedPolicy {
    action: Action,
}

impl FixedPolicy {
    pub fn new(action: Action) -> Self {
        Self { action }
    }
}

impl ActionPolicy for FixedPolicy {
    fn act(&mut self, _context: &TimestepContext, _soc_percent: f64) -> Action {
        self.action.clone()
    }
}

impl<F> ActionPolicy for F
where
    F: FnMut(&TimestepContext, f64) -> Action,
{
    fn act(&mut self, context: &TimestepContext, soc_percent: f64) -> Action {
        self(context, soc_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_policy_is_full_power() {
        let action = NeutralPolicy.act(&TimestepContext::new(0, 0, false), 50.0);
        assert_eq!(action.battery_fraction(), 1.0);
        assert!(action.socket_fractions.is_empty());
    }

    #[test]
    fn fixed_policy_repeats_its_action() {
        let mut policy = FixedPolicy::new(Action {
            battery_power_fraction: 0.25,
            socket_fractions: vec![0.5; 3],
        });
        for t in 0..3 {
            let action = policy.act(&TimestepContext::new(t, t, false), 50.0);
            assert_eq!(action.battery_power_fraction, 0.25);
            assert_eq!(action.socket_fractions.len(), 3);
        }
    }

    #[test]
    fn closures_are_policies() {
        let mut policy = |ctx: &TimestepContext, _soc: f64| Action {
            battery_power_fraction: if ctx.is_peak { 1.0 } else { 0.0 },
            socket_fractions: Vec::new(),
        };
        assert_eq!(
            policy
                .act(&TimestepContext::new(19, 19, true), 50.0)
                .battery_power_fraction,
            1.0
        );
        assert_eq!(
            policy
                .act(&TimestepContext::new(3, 3, false), 50.0)
                .battery_power_fraction,
            0.0
        );
    }
}
