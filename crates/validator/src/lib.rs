#![forbid(unsafe_code)]

mod aggregator;
mod reward;
mod sampler;
mod synthesizer;

use chrono::Utc;
use common::{HealthSnapshot, Hotkey};
use protocol::{Offer, SearchIntent};
use refdata::ReferenceData;
use registry::MetagraphView;
use scoring::ScoreTable;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use transport::{BatchTransport, dispatch_batch};

pub use aggregator::{AggregationStats, RankedOffer, collect_candidates, rank_by_price};
pub use reward::{apply_rewards, profit_for, reward_line};
pub use sampler::sample_peers;
pub use synthesizer::{SynthesizerConfig, synthesize_batch};

#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    pub synthesizer: SynthesizerConfig,
    pub sample_size: usize,
    pub dispatch_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            synthesizer: SynthesizerConfig::default(),
            sample_size: 10,
            dispatch_timeout: Duration::from_millis(12_000),
        }
    }
}

/// Outcome of one query cycle: the caller-facing top offers plus the
/// counters the metrics surface reports.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub offers: Vec<Offer>,
    pub queries: usize,
    pub peers_sampled: usize,
    pub peers_responded: usize,
    pub candidates: usize,
    pub offers_seen: u64,
    pub offers_dropped: u64,
    pub rewarded: u64,
    pub best_price: Option<f64>,
    pub dispatch_latency_ms: u64,
}

impl CycleReport {
    pub fn health_snapshot(&self, empty_cycle_streak: u32) -> HealthSnapshot {
        HealthSnapshot {
            peers_sampled: self.peers_sampled as u32,
            peers_responded: self.peers_responded as u32,
            offers_seen_total: self.offers_seen,
            offers_dropped_total: self.offers_dropped,
            queries_total: self.queries as u64,
            fallback_offers_total: 0,
            empty_cycle_streak,
            dispatch_latency_ms: self.dispatch_latency_ms,
        }
    }
}

/// The validator role: expands one intent into a diversified batch, fans it
/// out to sampled miners, ranks what came back, and feeds the reward signal
/// into the per-peer score table the caller persists around each cycle.
pub struct ValidatorNode<T, M> {
    hotkey: Hotkey,
    config: ValidatorConfig,
    refdata: ReferenceData,
    metagraph: M,
    transport: T,
}

impl<T, M> ValidatorNode<T, M>
where
    T: BatchTransport,
    M: MetagraphView,
{
    pub fn new(
        hotkey: impl Into<Hotkey>,
        config: ValidatorConfig,
        refdata: ReferenceData,
        metagraph: M,
        transport: T,
    ) -> Self {
        Self {
            hotkey: hotkey.into(),
            config: ValidatorConfig {
                sample_size: config.sample_size.max(1),
                ..config
            },
            refdata,
            metagraph,
            transport,
        }
    }

    pub fn metagraph(&self) -> &M {
        &self.metagraph
    }

    /// One full query/reward cycle. Callers load the score table before the
    /// cycle and save it after; reward application for one cycle completes
    /// before the next cycle's begins.
    pub async fn run_cycle(&self, intent: &SearchIntent, scores: &mut ScoreTable) -> CycleReport {
        let today = Utc::now().date_naive();
        let batch = {
            let mut rng = rand::thread_rng();
            synthesize_batch(intent, &self.refdata, &self.config.synthesizer, today, &mut rng)
        };
        if batch.is_empty() {
            tracing::warn!("no sub-queries synthesized, reporting no candidates");
            return CycleReport::default();
        }

        let peers = {
            let mut rng = rand::thread_rng();
            sample_peers(&self.metagraph, self.config.sample_size, &self.hotkey, &mut rng)
        };
        tracing::info!(queries = batch.len(), peers = peers.len(), "dispatching query batch");

        let started = Instant::now();
        let responses =
            dispatch_batch(&self.transport, &peers, &batch, self.config.dispatch_timeout).await;
        let dispatch_latency_ms = started.elapsed().as_millis() as u64;

        if responses.is_empty() {
            tracing::warn!("no flight options returned from miners");
            return CycleReport {
                queries: batch.len(),
                peers_sampled: peers.len(),
                dispatch_latency_ms,
                ..CycleReport::default()
            };
        }

        let (candidates, stats) = collect_candidates(&responses, batch.len());
        let ranked = rank_by_price(candidates);
        let rewarded = apply_rewards(&ranked, scores);
        let best_price = reward_line(&ranked);

        let offers = ranked
            .iter()
            .take(intent.limit)
            .map(|candidate| candidate.offer.clone())
            .collect();

        CycleReport {
            offers,
            queries: batch.len(),
            peers_sampled: peers.len(),
            peers_responded: responses.len(),
            candidates: ranked.len(),
            offers_seen: stats.offers_seen,
            offers_dropped: stats.offers_dropped,
            rewarded,
            best_price,
            dispatch_latency_ms,
        }
    }
}
