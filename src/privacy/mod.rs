//! Privacy gate (spec.md §4.6), consuming the parsed outputs of the
//! GPP/TCF/GPC subsystem named as an out-of-core collaborator (spec.md
//! §1: "the core only consumes a boolean 'block this bidder?' decision").

#[derive(Debug, Clone, Default)]
pub struct PrivacySignals {
    /// Any applicable section's sale opt-out is asserted.
    pub sale_opt_out: bool,
    /// Any applicable section's sharing opt-out is asserted.
    pub sharing_opt_out: bool,
    /// Any applicable section's targeted-advertising opt-out is asserted.
    pub targeted_ads_opt_out: bool,
    /// A GPC (Global Privacy Control) signal was present on the request.
    pub gpc_present: bool,
    /// TCF consent is required for this request (EEA traffic under TCF).
    pub tcf_consent_required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BidderPrivacyCapabilities {
    /// Bidder declares a lawful basis covering sale/sharing/targeted-ads
    /// opt-outs (e.g. it never sells or shares data).
    pub declares_lawful_basis: bool,
    /// Bidder requires explicit opt-in before any transmission when GPC
    /// is asserted.
    pub requires_gpc_opt_in: bool,
    /// Bidder is present on the publisher's TCF vendor list.
    pub on_tcf_vendor_list: bool,
}

#[derive(Debug, Clone)]
pub struct PrivacyDecision {
    pub allowed: bool,
    pub reason: String,
    pub sale_blocked: bool,
    pub targeted_ads_blocked: bool,
    pub sharing_blocked: bool,
}

/// Decides whether `bidder` may receive this request given the parsed
/// privacy signals and its declared capabilities (spec.md §4.6).
pub fn evaluate(signals: &PrivacySignals, caps: &BidderPrivacyCapabilities) -> PrivacyDecision {
    let opt_out_without_basis =
        (signals.sale_opt_out || signals.sharing_opt_out || signals.targeted_ads_opt_out)
            && !caps.declares_lawful_basis;

    if opt_out_without_basis {
        return PrivacyDecision {
            allowed: false,
            reason: "privacy opt-out asserted and bidder lacks a lawful basis".to_string(),
            sale_blocked: signals.sale_opt_out,
            targeted_ads_blocked: signals.targeted_ads_opt_out,
            sharing_blocked: signals.sharing_opt_out,
        };
    }

    if signals.gpc_present && caps.requires_gpc_opt_in {
        return PrivacyDecision {
            allowed: false,
            reason: "GPC signal present and bidder requires explicit opt-in".to_string(),
            sale_blocked: true,
            targeted_ads_blocked: true,
            sharing_blocked: true,
        };
    }

    if signals.tcf_consent_required && !caps.on_tcf_vendor_list {
        return PrivacyDecision {
            allowed: false,
            reason: "TCF consent required and bidder is not on the vendor list".to_string(),
            sale_blocked: false,
            targeted_ads_blocked: false,
            sharing_blocked: false,
        };
    }

    PrivacyDecision {
        allowed: true,
        reason: "allowed".to_string(),
        sale_blocked: false,
        targeted_ads_blocked: false,
        sharing_blocked: false,
    }
}
