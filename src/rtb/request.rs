use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Geo {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub country: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Device {
    pub ua: Option<String>,
    pub ip: Option<String>,
    pub geo: Option<Geo>,
    /// ADCOM device type taxonomy value (mobile/tablet, personal computer,
    /// connected TV, etc). Left as a raw integer since full ADCOM taxonomy
    /// parsing is an out-of-core collaborator (spec.md §1).
    pub devicetype: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct User {
    pub id: Option<String>,
    #[serde(default)]
    pub ext: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Site {
    pub id: Option<String>,
    pub domain: Option<String>,
    pub page: Option<String>,
    pub publisher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct App {
    pub id: Option<String>,
    pub bundle: Option<String>,
    pub publisher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Banner {
    pub w: Option<i32>,
    pub h: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Video {
    pub w: Option<i32>,
    pub h: Option<i32>,
    pub mimes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Native {
    pub request: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Audio {
    pub mimes: Vec<String>,
}

/// A pre-negotiated deal line inside an impression's private marketplace.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Deal {
    pub id: String,
    pub bidfloor: f64,
    #[serde(default = "default_currency")]
    #[builder(default = "default_currency()")]
    pub bidfloorcur: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Pmp {
    pub private_auction: bool,
    pub deals: Vec<Deal>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Imp {
    pub id: String,
    pub banner: Option<Banner>,
    pub video: Option<Video>,
    pub native: Option<Native>,
    pub audio: Option<Audio>,
    pub bidfloor: f64,
    #[serde(default = "default_currency")]
    #[builder(default = "default_currency()")]
    pub bidfloorcur: String,
    pub pmp: Option<Pmp>,
    #[serde(default)]
    pub ext: Value,
}

impl Imp {
    pub fn stored_ref(&self) -> Option<crate::rtb::StoredRef> {
        crate::rtb::StoredRef::from_ext(&self.ext)
    }

    pub fn supports(&self, bid_type: crate::rtb::BidType) -> bool {
        use crate::rtb::BidType::*;
        match bid_type {
            Banner => self.banner.is_some(),
            Video => self.video.is_some(),
            Native => self.native.is_some(),
            Audio => self.audio.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DistributionChannel {
    Site(Site),
    App(App),
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default)]
pub struct BidRequest {
    pub id: String,
    pub imp: Vec<Imp>,
    pub site: Option<Site>,
    pub app: Option<App>,
    pub device: Option<Device>,
    pub user: Option<User>,
    /// `0` means "absent" — callers resolve the effective value against
    /// `ExchangeConfig::default_timeout_ms` (spec.md §6) before
    /// validating the request, since `validate()` requires `tmax_ms > 0`.
    #[serde(default)]
    #[builder(default)]
    pub tmax_ms: i64,
    #[serde(default = "default_cur")]
    #[builder(default = "default_cur()")]
    pub cur: Vec<String>,
    #[serde(default)]
    pub ext: Value,
}

impl Default for BidRequest {
    fn default() -> Self {
        Self {
            id: String::new(),
            imp: Vec::new(),
            site: None,
            app: None,
            device: None,
            user: None,
            tmax_ms: 0,
            cur: default_cur(),
            ext: Value::Null,
        }
    }
}

fn default_cur() -> Vec<String> {
    vec!["USD".to_string()]
}

impl BidRequest {
    /// `cur[0]` is the auction currency per spec.md §3, defaulting to USD
    /// when `cur` is empty.
    pub fn auction_currency(&self) -> &str {
        self.cur.first().map(String::as_str).unwrap_or("USD")
    }

    pub fn distribution_channel(&self) -> Option<DistributionChannel> {
        if let Some(site) = &self.site {
            Some(DistributionChannel::Site(site.clone()))
        } else {
            self.app.clone().map(DistributionChannel::App)
        }
    }

    pub fn stored_ref(&self) -> Option<crate::rtb::StoredRef> {
        crate::rtb::StoredRef::from_ext(&self.ext)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("request id must not be empty".to_string());
        }
        if self.imp.is_empty() {
            return Err("request must contain at least one impression".to_string());
        }
        if self.tmax_ms <= 0 {
            return Err("tmax_ms must be > 0".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for imp in &self.imp {
            if imp.id.is_empty() {
                return Err("impression id must not be empty".to_string());
            }
            if !seen.insert(imp.id.as_str()) {
                return Err(format!("duplicate impression id: {}", imp.id));
            }
        }
        Ok(())
    }
}
