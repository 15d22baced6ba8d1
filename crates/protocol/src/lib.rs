use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CabinClass {
    #[default]
    Economy,
    #[serde(rename = "Premium_Economy")]
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Economy => "Economy",
            Self::PremiumEconomy => "Premium_Economy",
            Self::Business => "Business",
            Self::First => "First",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PassengerCounts {
    pub adults: u8,
    pub children: u8,
    pub infants: u8,
}

impl Default for PassengerCounts {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

impl PassengerCounts {
    pub fn is_valid(&self) -> bool {
        self.adults >= 1
    }
}

/// The caller-facing search request. Immutable once issued; batch expansion
/// copies or defaults these fields per sub-query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchIntent {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub cabin: CabinClass,
    #[serde(default)]
    pub passengers: PassengerCounts,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for SearchIntent {
    fn default() -> Self {
        Self {
            date: None,
            cabin: CabinClass::default(),
            passengers: PassengerCounts::default(),
            currency: default_currency(),
            limit: default_limit(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_owned()
}

fn default_limit() -> usize {
    3
}

/// Airport code plus the pricing backend's opaque identifier for it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RoutePoint {
    pub code: String,
    pub entity_id: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub date: NaiveDate,
    pub origin: RoutePoint,
    pub destination: RoutePoint,
    pub market: String,
    pub cabin: CabinClass,
    pub passengers: PassengerCounts,
    pub currency: String,
}

/// An ordered batch of sub-queries. Order is significant: batch responses
/// are positionally correlated with the queries.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct QueryBatch {
    pub queries: Vec<SubQuery>,
}

impl QueryBatch {
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub market: String,
    pub price: f64,
    pub currency: String,
    pub departs_at: DateTime<Utc>,
    pub arrives_at: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    pub stops: u32,
    pub carrier: String,
    pub duration_minutes: u32,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum OfferDefect {
    #[error("price {0} is not positive")]
    NonPositivePrice(f64),
    #[error("price {0} is not finite")]
    NonFinitePrice(f64),
    #[error("duration must be positive")]
    ZeroDuration,
}

impl Offer {
    pub fn check(&self) -> Result<(), OfferDefect> {
        if !self.price.is_finite() {
            return Err(OfferDefect::NonFinitePrice(self.price));
        }
        if self.price <= 0.0 {
            return Err(OfferDefect::NonPositivePrice(self.price));
        }
        if self.duration_minutes == 0 {
            return Err(OfferDefect::ZeroDuration);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }
}

/// One peer's answer to a batch: one offer list per sub-query position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub offers: Vec<Vec<Offer>>,
}

impl BatchResponse {
    /// Normalizes a response to the originating batch length. Missing
    /// positions become empty lists; extra positions are discarded. A short
    /// or overlong response is a per-position gap, never a batch error.
    pub fn padded_to(mut self, len: usize) -> Self {
        self.offers.truncate(len);
        while self.offers.len() < len {
            self.offers.push(Vec::new());
        }
        self
    }
}
