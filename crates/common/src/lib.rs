use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type Hotkey = String;

#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub peer_silence_percent: u8,
    pub fallback_rate_bps: u16,
    pub invalid_offer_rate_bps: u16,
    pub empty_cycle_streak: u32,
    pub dispatch_latency_ms: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            peer_silence_percent: 50,
            fallback_rate_bps: 5_000,
            invalid_offer_rate_bps: 500,
            empty_cycle_streak: 3,
            dispatch_latency_ms: 15_000,
        }
    }
}

/// Counters from the most recent request cycle. The validator fills the
/// dispatch/offer fields; the miner fills the fulfillment fields; unused
/// fields stay zero and never trip an alert.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub peers_sampled: u32,
    pub peers_responded: u32,
    pub offers_seen_total: u64,
    pub offers_dropped_total: u64,
    pub queries_total: u64,
    pub fallback_offers_total: u64,
    pub empty_cycle_streak: u32,
    pub dispatch_latency_ms: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HealthAlerts {
    pub peer_silence: bool,
    pub fallback_surge: bool,
    pub invalid_offers: bool,
    pub empty_cycles: bool,
    pub slow_dispatch: bool,
}

pub fn evaluate_health(snapshot: &HealthSnapshot, thresholds: &HealthThresholds) -> HealthAlerts {
    let silent_percent = if snapshot.peers_sampled == 0 {
        0
    } else {
        let silent = snapshot.peers_sampled.saturating_sub(snapshot.peers_responded);
        ((silent as u64 * 100) / snapshot.peers_sampled as u64) as u8
    };

    let fallback_bps = if snapshot.queries_total == 0 {
        0
    } else {
        ((snapshot.fallback_offers_total * 10_000) / snapshot.queries_total) as u16
    };

    let invalid_bps = if snapshot.offers_seen_total == 0 {
        0
    } else {
        ((snapshot.offers_dropped_total * 10_000) / snapshot.offers_seen_total) as u16
    };

    HealthAlerts {
        peer_silence: silent_percent >= thresholds.peer_silence_percent,
        fallback_surge: fallback_bps >= thresholds.fallback_rate_bps,
        invalid_offers: invalid_bps >= thresholds.invalid_offer_rate_bps,
        empty_cycles: snapshot.empty_cycle_streak >= thresholds.empty_cycle_streak,
        slow_dispatch: snapshot.dispatch_latency_ms >= thresholds.dispatch_latency_ms,
    }
}
