//! Auction resolver: per-impression winner selection, clearing price,
//! price bucketing (spec.md §4.5).
//!
//! Grounded on the teacher's `bid_settlement.rs` sorting helpers
//! (`sort_bids_by_price` via `f64::total_cmp`, matching spec.md §8
//! property 6's determinism requirement without relying on a `PartialOrd`
//! impl for `f64`).

use crate::adapter::TypedBid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionType {
    FirstPrice,
    SecondPrice,
}

#[derive(Debug, Clone, Copy)]
pub struct GranularityBand {
    pub max: f64,
    pub increment: f64,
}

#[derive(Debug, Clone)]
pub struct PriceGranularity {
    pub bands: Vec<GranularityBand>,
}

impl Default for PriceGranularity {
    fn default() -> Self {
        // spec.md §4.5 default ladder.
        Self {
            bands: vec![
                GranularityBand { max: 3.0, increment: 0.01 },
                GranularityBand { max: 8.0, increment: 0.05 },
                GranularityBand { max: 20.0, increment: 0.50 },
                GranularityBand { max: 50.0, increment: 1.00 },
                GranularityBand { max: f64::INFINITY, increment: 1.00 },
            ],
        }
    }
}

impl PriceGranularity {
    pub fn increment_for(&self, price: f64) -> f64 {
        self.bands
            .iter()
            .find(|b| price <= b.max)
            .map(|b| b.increment)
            .unwrap_or_else(|| self.bands.last().map(|b| b.increment).unwrap_or(1.0))
    }

    /// Rounds `price` down to the nearest increment for its band, i.e.
    /// toward zero (spec.md §4.5 "Bucket rounding is toward zero").
    pub fn round_down(&self, price: f64) -> f64 {
        let increment = self.increment_for(price);
        if increment <= 0.0 {
            return price;
        }
        (price / increment).floor() * increment
    }

    pub fn bucket_label(&self, price: f64) -> String {
        let bucketed = self.round_down(price.max(0.0));
        let increment = self.increment_for(price);
        let decimals = decimals_for_increment(increment);
        format!("{:.*}", decimals, bucketed)
    }
}

fn decimals_for_increment(increment: f64) -> usize {
    if increment >= 1.0 {
        2
    } else if increment >= 0.1 {
        2
    } else {
        2
    }
}

/// A single bid candidate fed into the resolver, carrying the ordering
/// tie-break inputs spec.md §4.5 requires (deal-backed, arrival order).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bidder_code: String,
    pub typed_bid: TypedBid,
    pub effective_price: f64,
    pub has_deal: bool,
    pub arrival_order: u64,
}

#[derive(Debug, Clone)]
pub struct Winner {
    pub imp_id: String,
    pub bidder_code: String,
    pub typed_bid: TypedBid,
    pub clearing_price: f64,
    pub price_bucket: String,
}

pub struct AuctionResolver {
    pub auction_type: AuctionType,
    pub granularity: PriceGranularity,
}

impl AuctionResolver {
    pub fn new(auction_type: AuctionType, granularity: PriceGranularity) -> Self {
        Self { auction_type, granularity }
    }

    /// Deterministic comparator (spec.md §4.5 step 2): effective price
    /// descending, then deal-backed first, then earlier arrival, then
    /// lexicographically smaller bid id.
    fn sort_candidates(candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| {
            b.effective_price
                .total_cmp(&a.effective_price)
                .then_with(|| b.has_deal.cmp(&a.has_deal))
                .then_with(|| a.arrival_order.cmp(&b.arrival_order))
                .then_with(|| a.typed_bid.bid.id.cmp(&b.typed_bid.bid.id))
        });
    }

    /// Resolves the winner (if any) for one impression's candidate bids.
    /// `floor` is that impression's effective floor in the auction
    /// currency; candidates are assumed already floor-validated by the
    /// caller (spec.md §4.3.2), but the clearing-price formula still
    /// needs `floor` to bound the result.
    pub fn resolve_imp(
        &self,
        imp_id: &str,
        mut candidates: Vec<Candidate>,
        floor: f64,
    ) -> Option<Winner> {
        if candidates.is_empty() {
            return None;
        }

        Self::sort_candidates(&mut candidates);

        let winner_candidate = candidates[0].clone();
        let runner_up_price = candidates.get(1).map(|c| c.effective_price);

        let clearing_price = match self.auction_type {
            AuctionType::FirstPrice => self.granularity.round_down(winner_candidate.effective_price),
            AuctionType::SecondPrice => {
                let granularity_step = self.granularity.increment_for(winner_candidate.effective_price);
                let candidate = match runner_up_price {
                    Some(runner_up) => (runner_up + granularity_step).max(floor),
                    None => (floor + granularity_step).max(floor),
                };
                candidate.min(winner_candidate.effective_price)
            }
        };

        Some(Winner {
            imp_id: imp_id.to_string(),
            bidder_code: winner_candidate.bidder_code,
            typed_bid: winner_candidate.typed_bid,
            clearing_price,
            price_bucket: self.granularity.bucket_label(clearing_price),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetingKeys {
    pub hb_pb: String,
    pub hb_bidder: String,
    pub hb_size: Option<String>,
    pub hb_deal: Option<String>,
}

pub fn targeting_keys(winner: &Winner) -> TargetingKeys {
    let hb_size = match winner.typed_bid.bid_type {
        Some(crate::rtb::BidType::Banner) | Some(crate::rtb::BidType::Video) => {
            match (winner.typed_bid.bid.w, winner.typed_bid.bid.h) {
                (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
                _ => None,
            }
        }
        _ => None,
    };

    TargetingKeys {
        hb_pb: winner.price_bucket.clone(),
        hb_bidder: winner.bidder_code.clone(),
        hb_size,
        hb_deal: winner.typed_bid.bid.deal_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtb::BidBuilder;

    fn candidate(bidder: &str, bid_id: &str, price: f64, arrival: u64, has_deal: bool) -> Candidate {
        Candidate {
            bidder_code: bidder.to_string(),
            typed_bid: TypedBid {
                bid: BidBuilder::default().id(bid_id.to_string()).imp_id("i1".to_string()).price(price).build().unwrap(),
                bid_type: Some(crate::rtb::BidType::Banner),
                video_cache_id: None,
                deal_tier: None,
            },
            effective_price: price,
            has_deal,
            arrival_order: arrival,
        }
    }

    #[test]
    fn scenario_a_second_price_happy_path() {
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        let candidates = vec![
            candidate("A", "a1", 1.50, 0, false),
            candidate("B", "b1", 1.20, 1, false),
        ];

        let winner = resolver.resolve_imp("i1", candidates, 0.50).unwrap();

        assert_eq!(winner.bidder_code, "A");
        assert!((winner.clearing_price - 1.21).abs() < 1e-9);
        assert_eq!(winner.price_bucket, "1.21");
        assert!(winner.clearing_price <= 1.50);
    }

    #[test]
    fn scenario_c_single_bidder_second_price_floor_plus_granularity() {
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        let candidates = vec![candidate("B", "b1", 1.00, 0, false)];

        let winner = resolver.resolve_imp("i1", candidates, 0.50).unwrap();

        assert!((winner.clearing_price - 0.51).abs() < 1e-9);
    }

    #[test]
    fn no_candidates_no_winner() {
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        assert!(resolver.resolve_imp("i1", vec![], 0.5).is_none());
    }

    #[test]
    fn first_price_winner_pays_own_bucketed_price() {
        let resolver = AuctionResolver::new(AuctionType::FirstPrice, PriceGranularity::default());
        let candidates = vec![candidate("A", "a1", 2.347, 0, false)];
        let winner = resolver.resolve_imp("i1", candidates, 0.1).unwrap();
        assert!((winner.clearing_price - 2.34).abs() < 1e-9);
    }

    #[test]
    fn clearing_price_never_exceeds_winning_bid() {
        // Property 3.
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        for (w, floor) in [(1.0, 0.9), (5.0, 0.1), (0.3, 0.25)] {
            let candidates = vec![candidate("A", "a1", w, 0, false)];
            let winner = resolver.resolve_imp("i1", candidates, floor).unwrap();
            assert!(winner.clearing_price <= w + 1e-9);
        }
    }

    #[test]
    fn deal_backed_bid_wins_tie_over_equal_price() {
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        let candidates = vec![
            candidate("A", "a1", 1.0, 0, false),
            candidate("B", "b1", 1.0, 1, true),
        ];
        let winner = resolver.resolve_imp("i1", candidates, 0.1).unwrap();
        assert_eq!(winner.bidder_code, "B");
    }

    #[test]
    fn earlier_arrival_wins_tie_over_equal_price_and_deal() {
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        let candidates = vec![
            candidate("A", "a1", 1.0, 1, false),
            candidate("B", "b1", 1.0, 0, false),
        ];
        let winner = resolver.resolve_imp("i1", candidates, 0.1).unwrap();
        assert_eq!(winner.bidder_code, "B");
    }

    #[test]
    fn determinism_same_inputs_same_winner() {
        // Property 6.
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        let build = || vec![candidate("A", "a1", 1.5, 0, false), candidate("B", "b1", 1.2, 1, false)];

        let w1 = resolver.resolve_imp("i1", build(), 0.5).unwrap();
        let w2 = resolver.resolve_imp("i1", build(), 0.5).unwrap();

        assert_eq!(w1.bidder_code, w2.bidder_code);
        assert_eq!(w1.clearing_price, w2.clearing_price);
    }

    #[test]
    fn dedup_invariant_exact_duplicate_does_not_change_outcome() {
        // Property 5: resolver is given already-deduped candidates by
        // the exchange (spec.md §4.3.2); feeding it a duplicate entry
        // (same bidder/imp/bid id) must not change the winner or price
        // since it sorts identically and is just a second, ignorable
        // entry below the real runner-up.
        let resolver = AuctionResolver::new(AuctionType::SecondPrice, PriceGranularity::default());
        let original = vec![candidate("A", "a1", 1.5, 0, false), candidate("B", "b1", 1.2, 1, false)];
        let mut with_dup = original.clone();
        with_dup.push(candidate("A", "a1", 1.5, 2, false));

        let w1 = resolver.resolve_imp("i1", original, 0.5).unwrap();
        let w2 = resolver.resolve_imp("i1", with_dup, 0.5).unwrap();

        assert_eq!(w1.bidder_code, w2.bidder_code);
        assert_eq!(w1.clearing_price, w2.clearing_price);
    }
}
