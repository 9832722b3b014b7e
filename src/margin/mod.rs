//! Margin engine (spec.md §4.8).
//!
//! Grounded directly on the teacher's `core/demand/takerate.rs`
//! (`markdown_bid`/`markup_floor`, a single global percentage take-rate)
//! generalized to the spec's per-`(publisher_id, bidder_code)` policy
//! lookup with a `fixed_cpm` alternative and a configurable
//! margin-infeasible resolution strategy.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginKind {
    Percentage,
    FixedCpm,
}

#[derive(Debug, Clone, Copy)]
pub struct MarginPolicy {
    pub kind: MarginKind,
    pub value: f64,
    pub min_floor_after_margin: f64,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self { kind: MarginKind::Percentage, value: 0.0, min_floor_after_margin: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfeasiblePolicy {
    ReduceMargin,
    DropBid,
}

pub struct MarginEngine {
    policies: HashMap<(String, String), MarginPolicy>,
    default_policy: MarginPolicy,
    infeasible_policy: InfeasiblePolicy,
}

impl MarginEngine {
    pub fn new(default_policy: MarginPolicy, infeasible_policy: InfeasiblePolicy) -> Self {
        Self { policies: HashMap::new(), default_policy, infeasible_policy }
    }

    pub fn set_policy(&mut self, publisher_id: &str, bidder_code: &str, policy: MarginPolicy) {
        self.policies
            .insert((publisher_id.to_lowercase(), bidder_code.to_lowercase()), policy);
    }

    fn policy_for(&self, publisher_id: &str, bidder_code: &str) -> MarginPolicy {
        self.policies
            .get(&(publisher_id.to_lowercase(), bidder_code.to_lowercase()))
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// `platform_margin` computed from the policy, with
    /// `publisher_payout = clearing_price - platform_margin`. When the
    /// floor would be violated, either reduces the margin to satisfy it
    /// (default) or signals the bid should be dropped as
    /// margin-infeasible, per the configured [`InfeasiblePolicy`].
    pub fn apply(&self, publisher_id: &str, bidder_code: &str, clearing_price: f64) -> Option<MarginOutcome> {
        let policy = self.policy_for(publisher_id, bidder_code);

        let raw_margin = match policy.kind {
            MarginKind::Percentage => clearing_price * policy.value,
            MarginKind::FixedCpm => policy.value,
        };

        let raw_payout = clearing_price - raw_margin;

        if raw_payout >= policy.min_floor_after_margin {
            return Some(MarginOutcome {
                publisher_payout: raw_payout,
                platform_margin: raw_margin,
            });
        }

        match self.infeasible_policy {
            InfeasiblePolicy::ReduceMargin => {
                let adjusted_margin = clearing_price - policy.min_floor_after_margin;
                Some(MarginOutcome {
                    publisher_payout: policy.min_floor_after_margin,
                    platform_margin: adjusted_margin,
                })
            }
            InfeasiblePolicy::DropBid => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarginOutcome {
    pub publisher_payout: f64,
    pub platform_margin: f64,
}

impl MarginOutcome {
    /// Invariant check per spec.md §4.8/§8 property 2.
    pub fn balances(&self, clearing_price: f64) -> bool {
        (self.publisher_payout + self.platform_margin - clearing_price).abs() < 1e-4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_margin_splits_clearing_price() {
        let engine = MarginEngine::new(
            MarginPolicy { kind: MarginKind::Percentage, value: 0.20, min_floor_after_margin: 0.0 },
            InfeasiblePolicy::ReduceMargin,
        );

        let outcome = engine.apply("pub1", "acme", 10.0).unwrap();
        assert!((outcome.platform_margin - 2.0).abs() < 1e-9);
        assert!((outcome.publisher_payout - 8.0).abs() < 1e-9);
        assert!(outcome.balances(10.0));
    }

    #[test]
    fn fixed_cpm_margin_subtracts_flat_amount() {
        let engine = MarginEngine::new(
            MarginPolicy { kind: MarginKind::FixedCpm, value: 0.30, min_floor_after_margin: 0.0 },
            InfeasiblePolicy::ReduceMargin,
        );

        let outcome = engine.apply("pub1", "acme", 1.0).unwrap();
        assert!((outcome.platform_margin - 0.30).abs() < 1e-9);
        assert!(outcome.balances(1.0));
    }

    #[test]
    fn reduces_margin_to_satisfy_floor_by_default() {
        let engine = MarginEngine::new(
            MarginPolicy { kind: MarginKind::Percentage, value: 0.50, min_floor_after_margin: 0.9 },
            InfeasiblePolicy::ReduceMargin,
        );

        let outcome = engine.apply("pub1", "acme", 1.0).unwrap();
        assert!((outcome.publisher_payout - 0.9).abs() < 1e-9);
        assert!(outcome.balances(1.0));
    }

    #[test]
    fn drops_bid_when_configured_infeasible() {
        let engine = MarginEngine::new(
            MarginPolicy { kind: MarginKind::Percentage, value: 0.50, min_floor_after_margin: 0.9 },
            InfeasiblePolicy::DropBid,
        );

        assert!(engine.apply("pub1", "acme", 1.0).is_none());
    }

    #[test]
    fn per_publisher_bidder_override_takes_precedence() {
        let mut engine = MarginEngine::new(
            MarginPolicy { kind: MarginKind::Percentage, value: 0.10, min_floor_after_margin: 0.0 },
            InfeasiblePolicy::ReduceMargin,
        );
        engine.set_policy("pub1", "acme", MarginPolicy { kind: MarginKind::Percentage, value: 0.30, min_floor_after_margin: 0.0 });

        let outcome = engine.apply("pub1", "acme", 10.0).unwrap();
        assert!((outcome.platform_margin - 3.0).abs() < 1e-9);
    }
}
