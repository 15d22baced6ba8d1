use crate::aggregator::RankedOffer;
use scoring::ScoreTable;

/// Price of the cheapest ranked offer. This is the reward line: profit is
/// measured against it, and nothing below it can exist after ranking.
pub fn reward_line(ranked: &[RankedOffer]) -> Option<f64> {
    ranked.first().map(|candidate| candidate.offer.price)
}

/// `max(0, best_price - price)`. With ranked (ascending) input every offer
/// priced above the cheapest gets exactly zero; only offers at the best
/// price sit on the zero-profit line. The cheapest tier defines the reward,
/// not the rank.
pub fn profit_for(best_price: f64, price: f64) -> f64 {
    (best_price - price).max(0.0)
}

/// Applies one cycle's profits additively to the originating peers' scores.
/// Single pass over the ranked list, so one aggregation pass cannot double
/// count. Returns how many offers were rewarded.
pub fn apply_rewards(ranked: &[RankedOffer], scores: &mut ScoreTable) -> u64 {
    let Some(best_price) = reward_line(ranked) else {
        return 0;
    };

    let mut rewarded = 0_u64;
    for candidate in ranked {
        let profit = profit_for(best_price, candidate.offer.price);
        scores.credit(&candidate.peer, profit);
        rewarded = rewarded.saturating_add(1);
        tracing::debug!(peer = %candidate.peer, price = candidate.offer.price, profit, "applied reward");
    }
    rewarded
}

#[cfg(test)]
mod tests {
    use super::{apply_rewards, profit_for, reward_line};
    use crate::aggregator::RankedOffer;
    use chrono::{TimeZone, Utc};
    use protocol::Offer;
    use scoring::ScoreTable;

    fn ranked(peer: &str, price: f64) -> RankedOffer {
        RankedOffer {
            peer: peer.to_owned(),
            offer: Offer {
                market: "US".to_owned(),
                price,
                currency: "USD".to_owned(),
                departs_at: Utc.with_ymd_and_hms(2026, 9, 14, 9, 0, 0).unwrap(),
                arrives_at: Utc.with_ymd_and_hms(2026, 9, 14, 13, 0, 0).unwrap(),
                origin: "JFK".to_owned(),
                destination: "LAX".to_owned(),
                stops: 0,
                carrier: "TestAir".to_owned(),
                duration_minutes: 240,
            },
        }
    }

    #[test]
    fn no_offer_above_best_price_ever_receives_positive_profit() {
        let offers = vec![ranked("A", 100.0), ranked("B", 100.0), ranked("C", 150.0)];
        let mut scores = ScoreTable::default();

        let rewarded = apply_rewards(&offers, &mut scores);

        assert_eq!(rewarded, 3);
        assert_eq!(reward_line(&offers), Some(100.0));
        // best-price offers sit exactly on the zero-profit line...
        assert_eq!(scores.score_of("A"), Some(0.0));
        assert_eq!(scores.score_of("B"), Some(0.0));
        // ...and max(0, 100 - 150) = 0 for everything above it.
        assert_eq!(scores.score_of("C"), Some(0.0));
    }

    #[test]
    fn profit_formula_is_exact() {
        assert_eq!(profit_for(100.0, 100.0), 0.0);
        assert_eq!(profit_for(100.0, 150.0), 0.0);
        assert_eq!(profit_for(100.0, 80.0), 20.0);
    }

    #[test]
    fn empty_candidate_list_rewards_nobody() {
        let mut scores = ScoreTable::default();
        assert_eq!(apply_rewards(&[], &mut scores), 0);
        assert!(scores.is_empty());
    }

    #[test]
    fn rewards_accumulate_across_cycles_not_within_one() {
        let offers = vec![ranked("A", 100.0)];
        let mut scores = ScoreTable::default();

        apply_rewards(&offers, &mut scores);
        assert_eq!(scores.score_of("A"), Some(0.0));

        // A later cycle where A is undercut by its own earlier price line.
        let second = vec![ranked("B", 90.0), ranked("A", 100.0)];
        apply_rewards(&second, &mut scores);
        assert_eq!(scores.score_of("B"), Some(0.0));
        assert_eq!(scores.score_of("A"), Some(0.0));
        assert_eq!(scores.len(), 2);
    }
}
