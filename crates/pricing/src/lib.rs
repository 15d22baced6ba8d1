#![forbid(unsafe_code)]

mod client;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use protocol::{Offer, SubQuery};
use rand::Rng;
use thiserror::Error;

pub use client::{SkyApiClient, SkyApiConfig};

#[derive(Clone, Debug, Error)]
pub enum PricingError {
    #[error("pricing request failed: {0}")]
    Transport(String),
    #[error("pricing response malformed: {0}")]
    Decode(String),
    #[error("pricing backend returned no offers")]
    Empty,
}

/// A source of candidate offers for one sub-query. Implementations must not
/// panic; any failure surfaces as `PricingError` and the fulfillment layer
/// substitutes a synthetic offer.
#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn search(&self, query: &SubQuery) -> Result<Vec<Offer>, PricingError>;
}

#[async_trait]
impl PricingSource for Box<dyn PricingSource> {
    async fn search(&self, query: &SubQuery) -> Result<Vec<Offer>, PricingError> {
        self.as_ref().search(query).await
    }
}

/// Builds a synthetic offer for a sub-query. Always valid: positive price,
/// positive duration, timestamps anchored to the queried date.
pub fn fallback_offer(query: &SubQuery) -> Offer {
    let mut rng = rand::thread_rng();
    let price = rng.gen_range(100.0..2_000.0_f64);
    let depart_hour = rng.gen_range(5_u32..22);
    let duration_minutes = rng.gen_range(90_u32..=900);
    let stops = rng.gen_range(0_u32..=2);

    let departs_at = Utc
        .from_utc_datetime(
            &query
                .date
                .and_time(NaiveTime::from_hms_opt(depart_hour, 0, 0).unwrap_or_default()),
        );
    let arrives_at = departs_at + ChronoDuration::minutes(duration_minutes as i64);

    Offer {
        market: query.market.clone(),
        price: (price * 100.0).round() / 100.0,
        currency: query.currency.clone(),
        departs_at,
        arrives_at,
        origin: query.origin.code.clone(),
        destination: query.destination.code.clone(),
        stops,
        carrier: "MockAir".to_owned(),
        duration_minutes,
    }
}

/// Keyless source: answers every query with one synthetic offer.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockPricingSource;

#[async_trait]
impl PricingSource for MockPricingSource {
    async fn search(&self, query: &SubQuery) -> Result<Vec<Offer>, PricingError> {
        Ok(vec![fallback_offer(query)])
    }
}

#[cfg(test)]
mod tests {
    use super::{MockPricingSource, PricingSource, fallback_offer};
    use chrono::NaiveDate;
    use protocol::{CabinClass, PassengerCounts, RoutePoint, SubQuery};

    fn query() -> SubQuery {
        SubQuery {
            date: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            origin: RoutePoint {
                code: "JFK".to_owned(),
                entity_id: "27537542".to_owned(),
            },
            destination: RoutePoint {
                code: "HNL".to_owned(),
                entity_id: "95673827".to_owned(),
            },
            market: "US".to_owned(),
            cabin: CabinClass::Economy,
            passengers: PassengerCounts::default(),
            currency: "USD".to_owned(),
        }
    }

    #[test]
    fn fallback_offer_is_always_valid() {
        for _ in 0..64 {
            let offer = fallback_offer(&query());
            assert!(offer.check().is_ok(), "fallback offer failed validity: {offer:?}");
            assert!(offer.price >= 100.0 && offer.price < 2_000.0);
            assert!(offer.arrives_at > offer.departs_at);
            assert_eq!(offer.origin, "JFK");
            assert_eq!(offer.destination, "HNL");
            assert_eq!(offer.currency, "USD");
        }
    }

    #[test]
    fn fallback_departure_is_anchored_to_query_date() {
        let offer = fallback_offer(&query());
        assert_eq!(offer.departs_at.date_naive(), query().date);
    }

    #[tokio::test]
    async fn mock_source_returns_exactly_one_offer_per_query() {
        let source = MockPricingSource;
        let offers = source.search(&query()).await.expect("mock search");
        assert_eq!(offers.len(), 1);
        assert!(offers[0].is_valid());
    }
}
