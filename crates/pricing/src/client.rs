use crate::{PricingError, PricingSource};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use protocol::{Offer, SubQuery};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkyApiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_host: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for SkyApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://skyscanner89.p.rapidapi.com/flights/one-way/list".to_owned(),
            api_key: String::new(),
            api_host: "skyscanner89.p.rapidapi.com".to_owned(),
            request_timeout_ms: 10_000,
            max_retries: 2,
            initial_backoff_ms: 250,
        }
    }
}

/// HTTP client for the flight-price backend. Transport failures and 5xx
/// answers are retried with exponential backoff; everything else surfaces as
/// a `PricingError` for the fulfillment layer to absorb.
#[derive(Clone)]
pub struct SkyApiClient {
    http: reqwest::Client,
    config: SkyApiConfig,
}

impl SkyApiClient {
    pub fn new(config: SkyApiConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            bail!("pricing endpoint must not be empty");
        }
        let timeout = Duration::from_millis(config.request_timeout_ms.max(1));
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    async fn search_with_retry(&self, query: &SubQuery) -> Result<Vec<Offer>, PricingError> {
        let params = [
            ("origin", query.origin.code.clone()),
            ("originId", query.origin.entity_id.clone()),
            ("destination", query.destination.code.clone()),
            ("destinationId", query.destination.entity_id.clone()),
            ("date", query.date.to_string()),
            ("market", query.market.clone()),
            ("currency", query.currency.clone()),
            ("cabinClass", query.cabin.as_str().to_owned()),
            ("adults", query.passengers.adults.to_string()),
            ("children", query.passengers.children.to_string()),
            ("infants", query.passengers.infants.to_string()),
        ];

        let mut last_error = String::new();
        for attempt in 0..=self.config.max_retries {
            let response = self
                .http
                .get(&self.config.endpoint)
                .header("x-rapidapi-key", &self.config.api_key)
                .header("x-rapidapi-host", &self.config.api_host)
                .query(&params)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let envelope: SearchEnvelope = response
                            .json()
                            .await
                            .map_err(|err| PricingError::Decode(err.to_string()))?;
                        return extract_offers(envelope, query);
                    }
                    last_error = format!("status {status}");
                    if !status.is_server_error() {
                        return Err(PricingError::Transport(last_error));
                    }
                }
                Err(err) => {
                    last_error = err.to_string();
                }
            }

            if attempt < self.config.max_retries {
                let backoff_ms = backoff_delay_ms(self.config.initial_backoff_ms, attempt);
                tracing::warn!(
                    error = %last_error,
                    attempt = attempt + 1,
                    backoff_ms,
                    "pricing request failed, retrying"
                );
                sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(PricingError::Transport(last_error))
    }
}

#[async_trait]
impl PricingSource for SkyApiClient {
    async fn search(&self, query: &SubQuery) -> Result<Vec<Offer>, PricingError> {
        self.search_with_retry(query).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    result: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    flights: Vec<FlightRecord>,
}

#[derive(Debug, Deserialize)]
struct FlightRecord {
    #[serde(default)]
    price: f64,
    #[serde(default)]
    stops: u32,
    #[serde(default)]
    carrier: Option<String>,
    #[serde(default)]
    departure: Option<FlightEndpoint>,
    #[serde(default)]
    arrival: Option<FlightEndpoint>,
}

#[derive(Debug, Deserialize)]
struct FlightEndpoint {
    #[serde(default)]
    time: Option<DateTime<Utc>>,
}

fn extract_offers(envelope: SearchEnvelope, query: &SubQuery) -> Result<Vec<Offer>, PricingError> {
    let mut offers = Vec::new();
    let mut skipped = 0_usize;

    for record in envelope.result.flights {
        let departs_at = record.departure.as_ref().and_then(|endpoint| endpoint.time);
        let arrives_at = record.arrival.as_ref().and_then(|endpoint| endpoint.time);
        let (Some(departs_at), Some(arrives_at)) = (departs_at, arrives_at) else {
            skipped += 1;
            continue;
        };
        let duration_minutes = (arrives_at - departs_at).num_minutes();
        if record.price <= 0.0 || duration_minutes <= 0 {
            skipped += 1;
            continue;
        }

        offers.push(Offer {
            market: query.market.clone(),
            price: record.price,
            currency: query.currency.clone(),
            departs_at,
            arrives_at,
            origin: query.origin.code.clone(),
            destination: query.destination.code.clone(),
            stops: record.stops,
            carrier: record.carrier.unwrap_or_else(|| "Unknown".to_owned()),
            duration_minutes: duration_minutes as u32,
        });
    }

    if skipped > 0 {
        tracing::debug!(skipped, route = %format!("{}-{}", query.origin.code, query.destination.code), "skipped malformed flight records");
    }
    if offers.is_empty() {
        return Err(PricingError::Empty);
    }
    Ok(offers)
}

fn backoff_delay_ms(initial_backoff_ms: u64, retry_index: u32) -> u64 {
    let retry_shift = retry_index.min(16);
    initial_backoff_ms.max(1).saturating_mul(1_u64 << retry_shift)
}
