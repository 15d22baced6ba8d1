use common::Hotkey;
use protocol::Offer;
use serde::Serialize;
use transport::PeerBatch;

/// A candidate offer tagged with the peer that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedOffer {
    pub peer: Hotkey,
    pub offer: Offer,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AggregationStats {
    pub offers_seen: u64,
    pub offers_dropped: u64,
}

/// Flattens every offer across every peer and sub-query position into one
/// candidate list. Each response is first normalized to the batch length;
/// offers failing validity are dropped and counted, never an error.
pub fn collect_candidates(
    peer_batches: &[PeerBatch],
    batch_len: usize,
) -> (Vec<RankedOffer>, AggregationStats) {
    let mut candidates = Vec::new();
    let mut stats = AggregationStats::default();

    for peer_batch in peer_batches {
        let normalized = peer_batch.response.clone().padded_to(batch_len);
        for position in normalized.offers {
            for offer in position {
                stats.offers_seen += 1;
                match offer.check() {
                    Ok(()) => candidates.push(RankedOffer {
                        peer: peer_batch.peer.clone(),
                        offer,
                    }),
                    Err(defect) => {
                        stats.offers_dropped += 1;
                        tracing::debug!(peer = %peer_batch.peer, defect = %defect, "dropping invalid offer");
                    }
                }
            }
        }
    }

    (candidates, stats)
}

/// Ascending by price; the sort is stable, so exact-price ties keep their
/// arrival order (earlier dispatch positions first).
pub fn rank_by_price(mut candidates: Vec<RankedOffer>) -> Vec<RankedOffer> {
    candidates.sort_by(|left, right| left.offer.price.total_cmp(&right.offer.price));
    candidates
}

#[cfg(test)]
mod tests {
    use super::{collect_candidates, rank_by_price};
    use chrono::{TimeZone, Utc};
    use protocol::{BatchResponse, Offer};
    use transport::PeerBatch;

    fn offer(price: f64, carrier: &str) -> Offer {
        Offer {
            market: "US".to_owned(),
            price,
            currency: "USD".to_owned(),
            departs_at: Utc.with_ymd_and_hms(2026, 9, 14, 9, 0, 0).unwrap(),
            arrives_at: Utc.with_ymd_and_hms(2026, 9, 14, 13, 0, 0).unwrap(),
            origin: "JFK".to_owned(),
            destination: "LAX".to_owned(),
            stops: 0,
            carrier: carrier.to_owned(),
            duration_minutes: 240,
        }
    }

    fn peer_batch(peer: &str, offers: Vec<Vec<Offer>>) -> PeerBatch {
        PeerBatch {
            peer: peer.to_owned(),
            response: BatchResponse { offers },
        }
    }

    #[test]
    fn invalid_offers_are_dropped_and_counted() {
        let batches = vec![peer_batch(
            "miner-a",
            vec![vec![
                offer(120.0, "Good"),
                offer(-3.0, "NegativePrice"),
                Offer {
                    duration_minutes: 0,
                    ..offer(140.0, "ZeroDuration")
                },
            ]],
        )];

        let (candidates, stats) = collect_candidates(&batches, 1);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].offer.carrier, "Good");
        assert_eq!(stats.offers_seen, 3);
        assert_eq!(stats.offers_dropped, 2);
    }

    #[test]
    fn short_responses_are_padded_not_rejected() {
        let batches = vec![
            peer_batch("miner-short", vec![vec![offer(200.0, "Short")]]),
            peer_batch(
                "miner-full",
                vec![vec![offer(150.0, "FullA")], vec![offer(160.0, "FullB")]],
            ),
        ];

        let (candidates, stats) = collect_candidates(&batches, 2);
        assert_eq!(candidates.len(), 3);
        assert_eq!(stats.offers_dropped, 0);
    }

    #[test]
    fn ranking_sorts_ascending_by_price() {
        let (candidates, _) = collect_candidates(
            &[
                peer_batch("miner-a", vec![vec![offer(310.0, "A")]]),
                peer_batch("miner-b", vec![vec![offer(120.0, "B")]]),
                peer_batch("miner-c", vec![vec![offer(240.0, "C")]]),
            ],
            1,
        );
        let ranked = rank_by_price(candidates);

        let prices: Vec<f64> = ranked.iter().map(|candidate| candidate.offer.price).collect();
        assert_eq!(prices, vec![120.0, 240.0, 310.0]);
    }

    #[test]
    fn equal_prices_keep_arrival_order() {
        let (candidates, _) = collect_candidates(
            &[
                peer_batch("miner-first", vec![vec![offer(100.0, "First")]]),
                peer_batch("miner-second", vec![vec![offer(100.0, "Second")]]),
                peer_batch("miner-cheaper", vec![vec![offer(90.0, "Cheaper")]]),
            ],
            1,
        );
        let ranked = rank_by_price(candidates);

        assert_eq!(ranked[0].peer, "miner-cheaper");
        assert_eq!(ranked[1].peer, "miner-first");
        assert_eq!(ranked[2].peer, "miner-second");
    }

    #[test]
    fn no_responses_aggregate_to_empty_candidates() {
        let (candidates, stats) = collect_candidates(&[], 5);
        assert!(candidates.is_empty());
        assert_eq!(stats.offers_seen, 0);
    }
}
