//! Minimal OpenRTB 2.x wire types used by the auction engine.
//!
//! Grounded on the teacher's `rtb` crate usage throughout
//! `app/pipeline/ortb/*` (builder-pattern structs, `#[serde(default)]`
//! heavy optionality, a `BidResponseState` sum type distinguishing a real
//! bid response from a structured no-bid). The teacher depends on `rtb`
//! as an external path crate; since it is not part of the retrieval pack
//! it is reimplemented here as an in-crate module.

pub mod bidresponsestate;
pub mod nobidreason;
pub mod request;
pub mod response;

pub use bidresponsestate::BidResponseState;
pub use request::{
    App, AppBuilder, Audio, AudioBuilder, Banner, BannerBuilder, BidRequest, BidRequestBuilder,
    Deal, DealBuilder, Device, DeviceBuilder, DistributionChannel, Geo, GeoBuilder, Imp,
    ImpBuilder, Native, NativeBuilder, Pmp, PmpBuilder, Site, SiteBuilder, User, UserBuilder,
    Video, VideoBuilder,
};
pub use response::{Bid, BidBuilder, BidResponse, BidResponseBuilder, SeatBid, SeatBidBuilder};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The ad format a bid was typed against. Every accepted bid must declare
/// exactly one, matching a media object present on its target impression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum BidType {
    Banner,
    Video,
    Native,
    Audio,
}

/// A parsed `ext.prebid.storedrequest.id` reference, present at either
/// request or per-impression scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRef {
    pub id: String,
}

impl StoredRef {
    /// Extracts a `storedrequest.id` from an opaque `ext` map, if present.
    pub fn from_ext(ext: &serde_json::Value) -> Option<StoredRef> {
        ext.get("prebid")?
            .get("storedrequest")?
            .get("id")?
            .as_str()
            .map(|id| StoredRef { id: id.to_string() })
    }
}
