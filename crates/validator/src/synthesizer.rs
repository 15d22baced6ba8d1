use chrono::{Days, NaiveDate};
use protocol::{CabinClass, PassengerCounts, QueryBatch, SearchIntent, SubQuery};
use rand::Rng;
use refdata::ReferenceData;

/// Which intent fields flow into each sub-query versus taking defaults.
/// Enumerated here once instead of conditional branches inside synthesis.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesizerConfig {
    pub max_batch_size: usize,
    pub propagate_intent_fields: bool,
    pub min_days_ahead: u32,
    pub max_days_ahead: u32,
    pub default_currency: String,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            propagate_intent_fields: false,
            min_days_ahead: 7,
            max_days_ahead: 120,
            default_currency: "USD".to_owned(),
        }
    }
}

/// Expands one intent into a batch of diversified sub-queries: per query a
/// uniform random market, two distinct airports, and a random departure date
/// in the configured window. Empty reference data yields an empty batch.
pub fn synthesize_batch<R: Rng>(
    intent: &SearchIntent,
    refdata: &ReferenceData,
    config: &SynthesizerConfig,
    today: NaiveDate,
    rng: &mut R,
) -> QueryBatch {
    let batch_size = refdata.markets.len().min(config.max_batch_size);
    if batch_size == 0 || refdata.airports.len() < 2 {
        tracing::warn!(
            markets = refdata.markets.len(),
            airports = refdata.airports.len(),
            "reference data too small to synthesize a batch"
        );
        return QueryBatch::default();
    }

    let queries = (0..batch_size)
        .map(|_| {
            let market = refdata.markets[rng.gen_range(0..refdata.markets.len())].clone();
            let picked = rand::seq::index::sample(rng, refdata.airports.len(), 2);
            let origin = &refdata.airports[picked.index(0)];
            let destination = &refdata.airports[picked.index(1)];

            let (cabin, passengers, currency) = if config.propagate_intent_fields {
                (intent.cabin, intent.passengers, intent.currency.clone())
            } else {
                (
                    CabinClass::default(),
                    PassengerCounts::default(),
                    config.default_currency.clone(),
                )
            };

            SubQuery {
                date: random_departure_date(today, config, rng),
                origin: protocol::RoutePoint {
                    code: origin.code.clone(),
                    entity_id: origin.entity_id.clone(),
                },
                destination: protocol::RoutePoint {
                    code: destination.code.clone(),
                    entity_id: destination.entity_id.clone(),
                },
                market,
                cabin,
                passengers,
                currency,
            }
        })
        .collect();

    QueryBatch { queries }
}

fn random_departure_date<R: Rng>(today: NaiveDate, config: &SynthesizerConfig, rng: &mut R) -> NaiveDate {
    let min = config.min_days_ahead.min(config.max_days_ahead);
    let max = config.max_days_ahead.max(config.min_days_ahead);
    let ahead = rng.gen_range(min..=max);
    today
        .checked_add_days(Days::new(ahead as u64))
        .unwrap_or(today)
}
