use parking_lot::Mutex;
use pricing::{PricingSource, fallback_offer};
use protocol::{BatchResponse, QueryBatch};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FulfillmentConfig {
    pub offers_per_query: usize,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self { offers_per_query: 1 }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentMetrics {
    pub batches_total: u64,
    pub queries_total: u64,
    pub real_offers_total: u64,
    pub fallback_offers_total: u64,
}

/// Answers one batch per request: each sub-query is priced against the
/// backing source in order, and any failure or empty result is replaced by
/// one synthetic offer. Positions are never empty and never reordered.
pub struct FulfillmentService<P> {
    pricing: P,
    config: FulfillmentConfig,
    metrics: Mutex<FulfillmentMetrics>,
}

impl<P> FulfillmentService<P>
where
    P: PricingSource,
{
    pub fn new(pricing: P, config: FulfillmentConfig) -> Self {
        Self {
            pricing,
            config: FulfillmentConfig {
                offers_per_query: config.offers_per_query.max(1),
            },
            metrics: Mutex::new(FulfillmentMetrics::default()),
        }
    }

    pub async fn fulfill_batch(&self, batch: &QueryBatch) -> BatchResponse {
        let mut offers = Vec::with_capacity(batch.len());
        let mut real = 0_u64;
        let mut fallback = 0_u64;

        for query in &batch.queries {
            let list = match self.pricing.search(query).await {
                Ok(mut found) if !found.is_empty() => {
                    found.truncate(self.config.offers_per_query);
                    real = real.saturating_add(found.len() as u64);
                    found
                }
                Ok(_) => {
                    fallback += 1;
                    vec![fallback_offer(query)]
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        origin = %query.origin.code,
                        destination = %query.destination.code,
                        "pricing lookup failed, substituting fallback offer"
                    );
                    fallback += 1;
                    vec![fallback_offer(query)]
                }
            };
            offers.push(list);
        }

        let mut metrics = self.metrics.lock();
        metrics.batches_total = metrics.batches_total.saturating_add(1);
        metrics.queries_total = metrics.queries_total.saturating_add(batch.len() as u64);
        metrics.real_offers_total = metrics.real_offers_total.saturating_add(real);
        metrics.fallback_offers_total = metrics.fallback_offers_total.saturating_add(fallback);

        BatchResponse { offers }
    }

    pub fn metrics(&self) -> FulfillmentMetrics {
        self.metrics.lock().clone()
    }
}
