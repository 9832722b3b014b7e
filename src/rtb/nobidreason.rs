//! OpenRTB `nbr` (no-bid reason) codes referenced by spec.md §7.
//!
//! The teacher defines its extension reasons via `rtb::spec_list!`, a
//! declarative macro living in the external `rtb` crate. That macro isn't
//! available here, so the same enumerated-constant shape is reproduced as
//! plain `pub const` values.

pub const TECHNICAL_ERROR: i32 = 1;
pub const INVALID_REQUEST: i32 = 2;
pub const KNOWN_WEB_SPIDER: i32 = 3;
pub const SUSPECTED_NON_HUMAN_TRAFFIC: i32 = 4;
pub const BELOW_FLOOR: i32 = 8;
pub const REJECTED_BY_PUBLISHER: i32 = 10;

/// Extension codes, following the teacher's `core::spec::nobidreasons`
/// numbering convention of starting custom codes at 500.
pub const NO_BUYERS_PREMATCHED: i32 = 500;
pub const NO_CAMPAIGNS_FOUND: i32 = 501;
pub const ALL_BIDDERS_CIRCUIT_OPEN: i32 = 502;
pub const ALL_BIDDERS_BLOCKED_BY_PRIVACY: i32 = 503;

/// Picks the dominant (most specific / numerically lowest, per
/// SPEC_FULL.md §10.5) no-bid reason when several reasons could apply
/// across different bidders in the same auction.
pub fn dominant(reasons: &[i32]) -> i32 {
    reasons
        .iter()
        .copied()
        .min()
        .unwrap_or(TECHNICAL_ERROR)
}
