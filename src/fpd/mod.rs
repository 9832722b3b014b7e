//! First-party data processor (spec.md §4, "FPD per-bidder view").
//!
//! Produces a per-bidder JSON overlay merged onto that bidder's request
//! clone, restricted to an allowlist of paths. Reuses
//! [`crate::store::merge::merge_json`] for the overlay-merge semantics
//! (map-recurse, scalar/array-replace) since FPD application is the same
//! deep-merge rule set as stored-config merging, just scoped to a
//! sub-tree per bidder.

use crate::store::merge::merge_json;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FpdAllowlist {
    /// Top-level keys (`site`, `app`, `user`, `imp.ext`) a given bidder is
    /// allowed to receive FPD enrichment for.
    pub allowed_keys: Vec<String>,
}

pub struct FpdProcessor {
    /// Per-bidder FPD overlay (publisher-provided enrichments) and the
    /// allowlist restricting which of its keys apply.
    per_bidder: HashMap<String, (Value, FpdAllowlist)>,
}

impl FpdProcessor {
    pub fn new() -> Self {
        Self { per_bidder: HashMap::new() }
    }

    pub fn set_bidder_fpd(&mut self, bidder: &str, overlay: Value, allowlist: FpdAllowlist) {
        self.per_bidder.insert(bidder.to_lowercase(), (overlay, allowlist));
    }

    /// Produces the per-bidder view: a JSON overlay containing only the
    /// allowlisted top-level keys, deep-merged over the base.
    pub fn view_for(&self, bidder: &str, base: &Value) -> Value {
        let Some((overlay, allowlist)) = self.per_bidder.get(&bidder.to_lowercase()) else {
            return base.clone();
        };

        if allowlist.allowed_keys.is_empty() {
            return base.clone();
        }

        let mut filtered = serde_json::Map::new();
        if let Value::Object(overlay_map) = overlay {
            for key in &allowlist.allowed_keys {
                if let Some(v) = overlay_map.get(key) {
                    filtered.insert(key.clone(), v.clone());
                }
            }
        }

        merge_json(base, &Value::Object(filtered))
    }
}

impl Default for FpdProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn applies_only_allowlisted_keys() {
        let mut processor = FpdProcessor::new();
        processor.set_bidder_fpd(
            "acme",
            json!({"site": {"domain": "override.com"}, "user": {"id": "should-not-apply"}}),
            FpdAllowlist { allowed_keys: vec!["site".to_string()] },
        );

        let base = json!({"site": {"domain": "orig.com"}, "user": {"id": "orig"}});
        let view = processor.view_for("acme", &base);

        assert_eq!(view["site"]["domain"], "override.com");
        assert_eq!(view["user"]["id"], "orig");
    }

    #[test]
    fn unknown_bidder_gets_base_unchanged() {
        let processor = FpdProcessor::new();
        let base = json!({"site": {"domain": "orig.com"}});
        assert_eq!(processor.view_for("nobody", &base), base);
    }
}
