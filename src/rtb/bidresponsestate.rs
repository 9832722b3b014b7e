use crate::rtb::response::BidResponse;

/// The terminal outcome of an auction, grounded on the teacher's
/// `rtb::common::bidresponsestate::BidResponseState` used throughout
/// `app/pipeline/ortb/tasks/*` to attach either a built response or a
/// structured no-bid reason onto the auction context exactly once.
#[derive(Debug, Clone)]
pub enum BidResponseState {
    Bid(BidResponse),
    NoBidReason {
        reqid: String,
        nbr: i32,
        desc: Option<String>,
    },
}

impl BidResponseState {
    pub fn request_id(&self) -> &str {
        match self {
            BidResponseState::Bid(res) => &res.id,
            BidResponseState::NoBidReason { reqid, .. } => reqid,
        }
    }

    /// Flattens either outcome into a wire-level `BidResponse`: a real
    /// response passes through unchanged; a no-bid becomes an empty
    /// `seatbid` with `nbr` set, per spec.md §6 ("HTTP 200 even on
    /// no-bid ... set `nbr` per OpenRTB").
    pub fn into_response(self, auction_cur: &str) -> BidResponse {
        match self {
            BidResponseState::Bid(res) => res,
            BidResponseState::NoBidReason { reqid, nbr, .. } => BidResponse {
                id: reqid,
                seatbid: Vec::new(),
                cur: auction_cur.to_string(),
                nbr: Some(nbr),
                ext: serde_json::Value::Null,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_bid_flattens_to_empty_seatbid_with_nbr() {
        let state = BidResponseState::NoBidReason { reqid: "r1".to_string(), nbr: 8, desc: None };
        let response = state.into_response("USD");
        assert_eq!(response.id, "r1");
        assert!(response.seatbid.is_empty());
        assert_eq!(response.nbr, Some(8));
        assert_eq!(response.cur, "USD");
    }

    #[test]
    fn bid_passes_through_unchanged() {
        let inner = BidResponse { id: "r2".to_string(), cur: "USD".to_string(), ..Default::default() };
        let state = BidResponseState::Bid(inner.clone());
        let response = state.into_response("EUR");
        assert_eq!(response.id, "r2");
        assert_eq!(response.cur, "USD");
    }
}
