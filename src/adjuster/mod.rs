//! Bid adjustment pipeline (spec.md §4.7).
//!
//! Generalizes the teacher's single global take-rate knob
//! (`core::demand::takerate::markdown_bid`) into an ordered rule engine,
//! matching the teacher's preference for `Builder`-derived config structs
//! (`app/config.rs`) and explicit bounds-clamping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjusterRuleType {
    Multiplier,
    Cpm,
    Static,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMatch {
    pub bidder: Option<String>,
    pub media_type: Option<String>,
    pub deal_id: Option<String>,
    pub publisher_id: Option<String>,
}

impl RuleMatch {
    fn field_matches(rule_value: &Option<String>, actual: Option<&str>) -> bool {
        match rule_value {
            None => true,
            Some(expected) => actual.map(|a| a.eq_ignore_ascii_case(expected)).unwrap_or(false),
        }
    }

    pub fn matches(&self, ctx: &MatchContext) -> bool {
        Self::field_matches(&self.bidder, Some(ctx.bidder))
            && Self::field_matches(&self.media_type, Some(ctx.media_type))
            && Self::field_matches(&self.deal_id, ctx.deal_id)
            && Self::field_matches(&self.publisher_id, Some(ctx.publisher_id))
    }
}

pub struct MatchContext<'a> {
    pub bidder: &'a str,
    pub media_type: &'a str,
    pub deal_id: Option<&'a str>,
    pub publisher_id: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjusterRule {
    #[serde(rename = "match")]
    pub rule_match: RuleMatch,
    #[serde(rename = "type")]
    pub rule_type: AdjusterRuleType,
    pub value: f64,
    pub priority: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct AdjusterBounds {
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    pub allow_negative: bool,
}

impl Default for AdjusterBounds {
    fn default() -> Self {
        Self {
            min_multiplier: 0.1,
            max_multiplier: 5.0,
            allow_negative: false,
        }
    }
}

pub struct BidAdjuster {
    rules: Vec<AdjusterRule>,
    bounds: AdjusterBounds,
}

impl BidAdjuster {
    pub fn new(mut rules: Vec<AdjusterRule>, bounds: AdjusterBounds) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules, bounds }
    }

    /// Applies all matching enabled rules, highest priority first, each
    /// to the output of the previous, then clamps to
    /// `[original * min_multiplier, original * max_multiplier]` and,
    /// unless negative prices are allowed, floors the result at zero.
    pub fn apply(&self, original_price: f64, ctx: &MatchContext) -> f64 {
        let mut price = original_price;

        for rule in &self.rules {
            if !rule.enabled || !rule.rule_match.matches(ctx) {
                continue;
            }

            price = match rule.rule_type {
                AdjusterRuleType::Multiplier => price * rule.value,
                AdjusterRuleType::Cpm => price + rule.value,
                AdjusterRuleType::Static => rule.value,
            };
        }

        let lower = original_price * self.bounds.min_multiplier;
        let upper = original_price * self.bounds.max_multiplier;
        price = price.clamp(lower.min(upper), lower.max(upper));

        if !self.bounds.allow_negative && price < 0.0 {
            price = 0.0;
        }

        price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>() -> MatchContext<'a> {
        MatchContext {
            bidder: "acme",
            media_type: "banner",
            deal_id: None,
            publisher_id: "pub1",
        }
    }

    #[test]
    fn multiplier_rule_applies() {
        let adjuster = BidAdjuster::new(
            vec![AdjusterRule {
                rule_match: RuleMatch::default(),
                rule_type: AdjusterRuleType::Multiplier,
                value: 1.5,
                priority: 0,
                enabled: true,
            }],
            AdjusterBounds::default(),
        );

        assert_eq!(adjuster.apply(2.0, &ctx()), 3.0);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let adjuster = BidAdjuster::new(
            vec![AdjusterRule {
                rule_match: RuleMatch::default(),
                rule_type: AdjusterRuleType::Static,
                value: 100.0,
                priority: 0,
                enabled: false,
            }],
            AdjusterBounds::default(),
        );

        assert_eq!(adjuster.apply(2.0, &ctx()), 2.0);
    }

    #[test]
    fn priority_order_chains_rules() {
        let adjuster = BidAdjuster::new(
            vec![
                AdjusterRule {
                    rule_match: RuleMatch::default(),
                    rule_type: AdjusterRuleType::Cpm,
                    value: 1.0,
                    priority: 1,
                    enabled: true,
                },
                AdjusterRule {
                    rule_match: RuleMatch::default(),
                    rule_type: AdjusterRuleType::Multiplier,
                    value: 2.0,
                    priority: 10,
                    enabled: true,
                },
            ],
            AdjusterBounds {
                min_multiplier: 0.0,
                max_multiplier: 100.0,
                allow_negative: false,
            },
        );

        // priority 10 (multiplier) runs first: 2.0 * 2.0 = 4.0, then +1.0 = 5.0
        assert_eq!(adjuster.apply(2.0, &ctx()), 5.0);
    }

    #[test]
    fn bounds_clamp_any_rule_list() {
        // Property 8: for any rule list and p > 0, final price in
        // [p*min_multiplier, p*max_multiplier].
        let adjuster = BidAdjuster::new(
            vec![AdjusterRule {
                rule_match: RuleMatch::default(),
                rule_type: AdjusterRuleType::Multiplier,
                value: 1000.0,
                priority: 0,
                enabled: true,
            }],
            AdjusterBounds::default(),
        );

        let p = 4.0;
        let out = adjuster.apply(p, &ctx());
        assert!(out <= p * 5.0 + 1e-9);
        assert!(out >= p * 0.1 - 1e-9);
    }

    #[test]
    fn negative_disallowed_floors_at_zero() {
        let adjuster = BidAdjuster::new(
            vec![AdjusterRule {
                rule_match: RuleMatch::default(),
                rule_type: AdjusterRuleType::Cpm,
                value: -100.0,
                priority: 0,
                enabled: true,
            }],
            AdjusterBounds {
                min_multiplier: -10.0,
                max_multiplier: 5.0,
                allow_negative: false,
            },
        );

        assert_eq!(adjuster.apply(2.0, &ctx()), 0.0);
    }

    #[test]
    fn match_filters_by_bidder() {
        let rule = AdjusterRule {
            rule_match: RuleMatch { bidder: Some("other".to_string()), ..Default::default() },
            rule_type: AdjusterRuleType::Static,
            value: 9.0,
            priority: 0,
            enabled: true,
        };
        let adjuster = BidAdjuster::new(vec![rule], AdjusterBounds::default());
        assert_eq!(adjuster.apply(2.0, &ctx()), 2.0);
    }
}
