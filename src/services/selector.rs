use rand::{seq::SliceRandom, Rng};

use crate::{
    models::{CandidateRecord, SessionState, Title},
    services::PipelineSettings,
};

/// Picks one candidate per spin, favoring services that have been served
/// less often this session
pub struct BalancedSelector {
    weight_base: u32,
    reset_min_remaining: usize,
    reset_pool_threshold: usize,
}

impl BalancedSelector {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            weight_base: settings.weight_base,
            reset_min_remaining: settings.reset_min_remaining,
            reset_pool_threshold: settings.reset_pool_threshold,
        }
    }

    /// `max(1, base - usage)` for the candidate's primary service
    pub fn weight(&self, record: &CandidateRecord, session: &SessionState) -> u32 {
        let usage = record
            .primary_service()
            .map(|service| session.usage(service))
            .unwrap_or(0);
        self.weight_base.saturating_sub(usage).max(1)
    }

    /// Items whose id has not been served yet
    ///
    /// When too few unseen items remain (fewer than `reset_min_remaining`
    /// out of a pool larger than `reset_pool_threshold`, or none at all),
    /// the served set is cleared and the whole pool is eligible again.
    pub fn eligible<'a, T>(
        &self,
        items: &'a [T],
        id_of: impl Fn(&T) -> u64,
        session: &mut SessionState,
    ) -> Vec<&'a T> {
        let unseen: Vec<&T> = items
            .iter()
            .filter(|item| !session.is_served(id_of(item)))
            .collect();

        let starving = unseen.len() < self.reset_min_remaining
            && items.len() > self.reset_pool_threshold;
        if !items.is_empty() && (unseen.is_empty() || starving) {
            tracing::info!(
                pool_size = items.len(),
                unseen = unseen.len(),
                served = session.served_count(),
                "Recycling served titles"
            );
            session.clear_served();
            return items.iter().collect();
        }

        unseen
    }

    /// Drops served titles from a raw pool, recycling when it runs dry
    pub fn exclude_served(&self, pool: Vec<Title>, session: &mut SessionState) -> Vec<Title> {
        let keep: Vec<u64> = self
            .eligible(&pool, |t| t.id, session)
            .into_iter()
            .map(|t| t.id)
            .collect();
        pool.into_iter().filter(|t| keep.contains(&t.id)).collect()
    }

    /// Weighted draw over eligible records; records the pick in the session
    pub fn select<R: Rng + ?Sized>(
        &self,
        records: &[CandidateRecord],
        session: &mut SessionState,
        rng: &mut R,
    ) -> Option<CandidateRecord> {
        let eligible = self.eligible(records, |r| r.title.id, session);
        let chosen = self.pick_weighted(&eligible, session, rng)?.clone();

        session.record_served(chosen.title.id, chosen.primary_service());
        tracing::debug!(
            title_id = chosen.title.id,
            service = ?chosen.primary_service(),
            candidates = eligible.len(),
            "Candidate selected"
        );

        Some(chosen)
    }

    /// Uniform draw over eligible raw titles; records the pick in the session
    pub fn select_uniform<R: Rng + ?Sized>(
        &self,
        pool: &[Title],
        session: &mut SessionState,
        rng: &mut R,
    ) -> Option<Title> {
        let eligible = self.eligible(pool, |t| t.id, session);
        let chosen = (*eligible.choose(rng)?).clone();
        session.record_served(chosen.id, None);
        Some(chosen)
    }

    /// Cumulative-weight draw. Every record has weight >= 1, so none is
    /// ever unreachable.
    fn pick_weighted<'a, R: Rng + ?Sized>(
        &self,
        records: &[&'a CandidateRecord],
        session: &SessionState,
        rng: &mut R,
    ) -> Option<&'a CandidateRecord> {
        let weights: Vec<u32> = records.iter().map(|r| self.weight(r, session)).collect();
        let total: u32 = weights.iter().sum();
        if total == 0 {
            return None;
        }

        let mut pick = rng.gen_range(0..total);
        for (record, weight) in records.iter().zip(weights) {
            if pick < weight {
                return Some(record);
            }
            pick -= weight;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_fixtures::{movies, record};
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashMap;

    fn selector() -> BalancedSelector {
        BalancedSelector::new(&PipelineSettings::default())
    }

    #[test]
    fn test_weight_floor() {
        let selector = selector();
        let mut session = SessionState::new(3);
        let candidate = record(1, &["Netflix"]);

        assert_eq!(selector.weight(&candidate, &session), 10);
        for id in 100..104 {
            session.record_served(id, Some("Netflix"));
        }
        assert_eq!(selector.weight(&candidate, &session), 6);
        for id in 200..220 {
            session.record_served(id, Some("Netflix"));
        }
        assert_eq!(selector.weight(&candidate, &session), 1);
    }

    #[test]
    fn test_select_skips_served_and_records_pick() {
        let selector = selector();
        let mut session = SessionState::new(3);
        session.record_served(1, None);
        let records = vec![record(1, &["Netflix"]), record(2, &["Hulu"])];
        let mut rng = StdRng::seed_from_u64(42);

        let chosen = selector.select(&records, &mut session, &mut rng).unwrap();

        assert_eq!(chosen.title.id, 2);
        assert!(session.is_served(2));
        assert_eq!(session.usage("Hulu"), 1);
    }

    #[test]
    fn test_select_empty_is_none() {
        let selector = selector();
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(42);
        assert!(selector.select(&[], &mut session, &mut rng).is_none());
    }

    #[test]
    fn test_all_served_recycles() {
        let selector = selector();
        let mut session = SessionState::new(3);
        session.record_served(1, None);
        session.record_served(2, None);
        let records = vec![record(1, &["Netflix"]), record(2, &["Netflix"])];
        let mut rng = StdRng::seed_from_u64(42);

        let chosen = selector.select(&records, &mut session, &mut rng).unwrap();

        assert!(chosen.title.id == 1 || chosen.title.id == 2);
        assert_eq!(session.served_count(), 1);
    }

    #[test]
    fn test_reset_when_large_pool_nearly_exhausted() {
        let selector = selector();
        let mut session = SessionState::new(3);
        let pool = movies(1..13);
        for id in 1..10 {
            session.record_served(id, None);
        }

        // 3 unseen of 12 is below the floor of 5
        let eligible = selector.exclude_served(pool, &mut session);
        assert_eq!(eligible.len(), 12);
        assert_eq!(session.served_count(), 0);
    }

    #[test]
    fn test_no_reset_for_small_pool_with_unseen_titles() {
        let selector = selector();
        let mut session = SessionState::new(3);
        let pool = movies(1..9);
        for id in 1..7 {
            session.record_served(id, None);
        }

        let eligible = selector.exclude_served(pool, &mut session);
        let ids: Vec<u64> = eligible.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(session.served_count(), 6);
    }

    #[test]
    fn test_weighted_selection_tracks_weights() {
        let selector = selector();
        let mut session = SessionState::new(3);
        // Netflix used 8 times -> weight 2, Hulu unused -> weight 10
        for id in 1000..1008 {
            session.record_served(id, Some("Netflix"));
        }
        let records = vec![record(1, &["Netflix"]), record(2, &["Hulu"])];
        let eligible: Vec<&CandidateRecord> = records.iter().collect();
        let mut rng = StdRng::seed_from_u64(9);

        let mut counts: HashMap<u64, u32> = HashMap::new();
        let trials = 12_000;
        for _ in 0..trials {
            let chosen = selector.pick_weighted(&eligible, &session, &mut rng).unwrap();
            *counts.entry(chosen.title.id).or_insert(0) += 1;
        }

        let netflix_share = counts[&1] as f64 / trials as f64;
        // Expected 2 / 12
        assert!((netflix_share - 2.0 / 12.0).abs() < 0.03);
    }

    #[test]
    fn test_heavily_used_service_still_reachable() {
        let selector = selector();
        let mut session = SessionState::new(3);
        for id in 1000..1050 {
            session.record_served(id, Some("Netflix"));
        }
        let records = vec![record(1, &["Netflix"]), record(2, &["Hulu"])];
        let eligible: Vec<&CandidateRecord> = records.iter().collect();
        let mut rng = StdRng::seed_from_u64(5);

        let picked_netflix = (0..2_000)
            .filter_map(|_| selector.pick_weighted(&eligible, &session, &mut rng))
            .any(|r| r.title.id == 1);
        assert!(picked_netflix);
    }

    #[test]
    fn test_select_uniform_records_without_usage() {
        let selector = selector();
        let mut session = SessionState::new(3);
        let pool = movies(1..4);
        let mut rng = StdRng::seed_from_u64(1);

        let chosen = selector.select_uniform(&pool, &mut session, &mut rng).unwrap();
        assert!(session.is_served(chosen.id));
        assert_eq!(session.snapshot().service_usage.len(), 0);
    }
}
