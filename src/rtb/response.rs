use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Bid {
    pub id: String,
    pub imp_id: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    #[builder(default = "default_currency()")]
    pub currency: String,
    pub adm: Option<String>,
    pub nurl: Option<String>,
    pub deal_id: Option<String>,
    pub crid: Option<String>,
    #[serde(default)]
    pub w: Option<i32>,
    #[serde(default)]
    pub h: Option<i32>,
    #[serde(default)]
    pub ext: Value,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Bid {
    pub fn has_creative(&self) -> bool {
        self.adm.is_some() || self.nurl.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct SeatBid {
    pub seat: String,
    pub bid: Vec<Bid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct BidResponse {
    pub id: String,
    pub seatbid: Vec<SeatBid>,
    #[serde(default = "default_currency")]
    #[builder(default = "default_currency()")]
    pub cur: String,
    #[serde(default)]
    pub nbr: Option<i32>,
    #[serde(default)]
    pub ext: Value,
}
