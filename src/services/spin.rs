use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        CandidateRecord, ContentKind, Selection, SelectionCriteria, SessionState, SpinResult,
        StreamingService, Title,
    },
    services::{
        providers::MetadataProvider, BalancedSelector, CandidateDiscovery, PipelineSettings,
        ProviderMatcher,
    },
};

/// Which constraints a round of attempts enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// No rating filter; an unmatched pool falls back to a raw pick
    Open,
    /// Rating filter enforced; failing records are set aside
    Strict,
    /// Rating filter dropped, service match still required
    Relaxed,
}

/// The title a spin settled on, before budget bookkeeping
#[derive(Debug)]
struct Pick {
    title: Title,
    providers: Vec<String>,
    maturity_rating: Option<String>,
}

impl From<CandidateRecord> for Pick {
    fn from(record: CandidateRecord) -> Self {
        Self {
            title: record.title,
            providers: record.services,
            maturity_rating: record.maturity_rating,
        }
    }
}

/// Runs one spin end to end: discovery, provider matching and selection,
/// with bounded retries and rating relaxation
pub struct SpinEngine {
    discovery: CandidateDiscovery,
    matcher: ProviderMatcher,
    selector: BalancedSelector,
    max_attempts: usize,
}

impl SpinEngine {
    pub fn new(provider: Arc<dyn MetadataProvider>, settings: PipelineSettings) -> Self {
        Self {
            selector: BalancedSelector::new(&settings),
            max_attempts: settings.max_attempts.max(1),
            discovery: CandidateDiscovery::new(provider.clone(), settings.clone()),
            matcher: ProviderMatcher::new(provider, settings),
        }
    }

    /// Produces one recommendation and updates the session
    ///
    /// Invalid criteria are rejected before the budget is touched. Any error
    /// after that gives the spin back.
    pub async fn spin(
        &self,
        session: &mut SessionState,
        criteria: &SelectionCriteria,
    ) -> AppResult<SpinResult> {
        let mut rng = StdRng::from_entropy();
        self.spin_with_rng(session, criteria, &mut rng).await
    }

    pub(crate) async fn spin_with_rng(
        &self,
        session: &mut SessionState,
        criteria: &SelectionCriteria,
        rng: &mut StdRng,
    ) -> AppResult<SpinResult> {
        let selection = criteria.validate()?;

        if !session.consume_spin() {
            return Err(AppError::SpinsExhausted);
        }

        match self.run(&selection, session, rng).await {
            Ok(pick) => {
                tracing::info!(
                    title_id = pick.title.id,
                    title = %pick.title.name,
                    kind = %pick.title.kind,
                    year = ?pick.title.release_year(),
                    providers = ?pick.providers,
                    spins_remaining = session.spins_remaining(),
                    "Spin completed"
                );
                Ok(SpinResult {
                    title: pick.title,
                    matched_providers: pick.providers,
                    maturity_rating: pick.maturity_rating,
                    spins_remaining: session.spins_remaining(),
                })
            }
            Err(e) => {
                session.restore_spin();
                tracing::warn!(
                    error = %e,
                    code = e.code(),
                    spins_remaining = session.spins_remaining(),
                    "Spin failed, budget restored"
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        selection: &Selection,
        session: &mut SessionState,
        rng: &mut StdRng,
    ) -> AppResult<Pick> {
        let mut rating_fallbacks = Vec::new();

        if selection.maturity.is_none() {
            return self
                .attempt(Pass::Open, selection, session, rng, &mut rating_fallbacks)
                .await?
                .ok_or_else(no_content);
        }

        if let Some(pick) = self
            .attempt(Pass::Strict, selection, session, rng, &mut rating_fallbacks)
            .await?
        {
            return Ok(pick);
        }

        if let Some(record) = self.selector.select(&rating_fallbacks, session, rng) {
            tracing::info!(
                title_id = record.title.id,
                rating = ?record.maturity_rating,
                "No title passed the rating filter, serving closest match"
            );
            return Ok(record.into());
        }

        tracing::info!("Retrying without the rating filter");
        self.attempt(
            Pass::Relaxed,
            &selection.relaxed(),
            session,
            rng,
            &mut rating_fallbacks,
        )
        .await?
        .ok_or_else(no_content)
    }

    /// Bounded retry loop; stops at the first pick or after `max_attempts`
    async fn attempt(
        &self,
        pass: Pass,
        selection: &Selection,
        session: &mut SessionState,
        rng: &mut StdRng,
        rating_fallbacks: &mut Vec<CandidateRecord>,
    ) -> AppResult<Option<Pick>> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let kind = choose_kind(selection, rng)?;
            let preferred = preferred_service(selection, session, rng)?;

            let pool = match self.discovery.discover(kind, selection, preferred, rng).await {
                Ok(pool) => pool,
                Err(e) if attempt == 1 && rating_fallbacks.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt, pass = ?pass, error = %e, "Discovery failed, retrying");
                    last_error = Some(e);
                    continue;
                }
            };
            let pool = self.selector.exclude_served(pool, session);
            if pool.is_empty() {
                tracing::debug!(attempt, pass = ?pass, kind = %kind, "Empty candidate pool");
                continue;
            }

            let records = self.matcher.match_candidates(&pool, selection).await;

            match pass {
                Pass::Strict => {
                    let (passing, failing): (Vec<_>, Vec<_>) =
                        records.into_iter().partition(|r| r.passes_rating);
                    for record in failing {
                        if !rating_fallbacks.iter().any(|f| f.title.id == record.title.id) {
                            rating_fallbacks.push(record);
                        }
                    }
                    if let Some(record) = self.selector.select(&passing, session, rng) {
                        return Ok(Some(record.into()));
                    }
                }
                Pass::Open | Pass::Relaxed => {
                    if let Some(record) = self.selector.select(&records, session, rng) {
                        return Ok(Some(record.into()));
                    }
                    if pass == Pass::Open {
                        return Ok(self.raw_pick(&pool, selection, session, rng).await);
                    }
                }
            }

            tracing::debug!(attempt, pass = ?pass, kind = %kind, "No candidate on this attempt");
        }

        tracing::info!(pass = ?pass, attempts = self.max_attempts, "Attempts exhausted");

        // Set-aside fallbacks outrank a late discovery failure
        match last_error {
            Some(e) if rating_fallbacks.is_empty() => Err(e),
            _ => Ok(None),
        }
    }

    /// Uniform pick from the unmatched pool with a one-off offer lookup.
    /// The providers may be empty or outside the selection.
    async fn raw_pick(
        &self,
        pool: &[Title],
        selection: &Selection,
        session: &mut SessionState,
        rng: &mut StdRng,
    ) -> Option<Pick> {
        let title = self.selector.select_uniform(pool, session, rng)?;
        let selected = selection.service_names();
        let providers = self.matcher.lookup_services(&title, &selected).await;

        // Only selected services earn usage credit
        if let Some(primary) = providers.first().filter(|p| selected.contains(*p)) {
            session.record_served(title.id, Some(primary.as_str()));
        }

        tracing::info!(
            title_id = title.id,
            providers = ?providers,
            "No provider match, serving from raw pool"
        );

        Some(Pick {
            title,
            providers,
            maturity_rating: None,
        })
    }
}

fn no_content() -> AppError {
    AppError::NoContent(
        "Nothing available on your services matches these filters. Try adding services or content types."
            .to_string(),
    )
}

fn choose_kind(selection: &Selection, rng: &mut StdRng) -> AppResult<ContentKind> {
    selection
        .kinds
        .choose(rng)
        .copied()
        .ok_or_else(|| AppError::Internal("selection has no content kinds".to_string()))
}

/// Least-used selected service, ties broken at random
fn preferred_service(
    selection: &Selection,
    session: &SessionState,
    rng: &mut StdRng,
) -> AppResult<&'static StreamingService> {
    let least = selection
        .services
        .iter()
        .map(|s| session.usage(s.name))
        .min()
        .unwrap_or(0);
    let tied: Vec<&'static StreamingService> = selection
        .services
        .iter()
        .copied()
        .filter(|s| session.usage(s.name) == least)
        .collect();

    tied.choose(rng)
        .copied()
        .ok_or_else(|| AppError::Internal("selection has no services".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockMetadataProvider;
    use crate::services::test_fixtures::{criteria, movies, subscription_offers};

    fn engine(mock: MockMetadataProvider) -> SpinEngine {
        let settings = PipelineSettings {
            max_attempts: 2,
            ..PipelineSettings::default()
        };
        SpinEngine::new(Arc::new(mock), settings)
    }

    fn netflix_movies() -> SelectionCriteria {
        criteria(&["Netflix"], &[ContentKind::Movie])
    }

    /// Discovery always yields titles 1..=20
    fn with_pool(mock: &mut MockMetadataProvider) {
        mock.expect_discover().returning(|_, _| Ok(movies(1..21)));
        mock.expect_popular_by_provider()
            .returning(|_, _, _| Ok(vec![]));
        mock.expect_trending().returning(|_, _| Ok(vec![]));
    }

    /// Every third title is on Netflix, the rest on Hulu
    fn with_netflix_thirds(mock: &mut MockMetadataProvider) {
        mock.expect_provider_offers().returning(|_, id| {
            if id % 3 == 0 {
                Ok(Some(subscription_offers(id, &["Netflix"])))
            } else {
                Ok(Some(subscription_offers(id, &["Hulu"])))
            }
        });
    }

    #[tokio::test]
    async fn test_validation_leaves_budget_untouched() {
        let engine = engine(MockMetadataProvider::new());
        let mut session = SessionState::new(3);

        let err = engine
            .spin(&mut session, &criteria(&[], &[ContentKind::Movie]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(session.spins_remaining(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_rejected() {
        let engine = engine(MockMetadataProvider::new());
        let mut session = SessionState::new(0);

        let err = engine.spin(&mut session, &netflix_movies()).await.unwrap_err();
        assert!(matches!(err, AppError::SpinsExhausted));
    }

    #[tokio::test]
    async fn test_serves_a_netflix_match() {
        let mut mock = MockMetadataProvider::new();
        with_pool(&mut mock);
        with_netflix_thirds(&mut mock);
        let engine = engine(mock);
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(11);

        let result = engine
            .spin_with_rng(&mut session, &netflix_movies(), &mut rng)
            .await
            .unwrap();

        assert_eq!(result.title.id % 3, 0);
        assert_eq!(result.matched_providers, vec!["Netflix"]);
        assert_eq!(result.spins_remaining, 2);
        assert!(session.is_served(result.title.id));
        assert_eq!(session.usage("Netflix"), 1);
    }

    #[tokio::test]
    async fn test_repeat_spins_avoid_served_titles() {
        let mut mock = MockMetadataProvider::new();
        with_pool(&mut mock);
        with_netflix_thirds(&mut mock);
        let engine = engine(mock);
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(5);

        let mut served = Vec::new();
        for _ in 0..3 {
            let result = engine
                .spin_with_rng(&mut session, &netflix_movies(), &mut rng)
                .await
                .unwrap();
            assert!(!served.contains(&result.title.id));
            served.push(result.title.id);
        }
        assert_eq!(session.spins_remaining(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_pool_falls_back_to_raw_pick() {
        let mut mock = MockMetadataProvider::new();
        with_pool(&mut mock);
        mock.expect_provider_offers()
            .returning(|_, id| Ok(Some(subscription_offers(id, &["Hulu"]))));
        let engine = engine(mock);
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(2);

        let result = engine
            .spin_with_rng(&mut session, &netflix_movies(), &mut rng)
            .await
            .unwrap();

        assert!((1..21).contains(&result.title.id));
        assert_eq!(result.matched_providers, vec!["Hulu"]);
        assert_eq!(session.usage("Hulu"), 0);
        assert!(session.is_served(result.title.id));
    }

    #[tokio::test]
    async fn test_raw_pick_may_have_no_providers() {
        let mut mock = MockMetadataProvider::new();
        with_pool(&mut mock);
        mock.expect_provider_offers().returning(|_, _| Ok(None));
        let engine = engine(mock);
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(2);

        let result = engine
            .spin_with_rng(&mut session, &netflix_movies(), &mut rng)
            .await
            .unwrap();

        assert!(result.matched_providers.is_empty());
        assert_eq!(result.spins_remaining, 2);
    }

    #[tokio::test]
    async fn test_discovery_failure_is_api_failure_and_restores_budget() {
        let mut mock = MockMetadataProvider::new();
        mock.expect_discover()
            .returning(|_, _| Err(AppError::ExternalApi("connection refused".to_string())));
        mock.expect_popular_by_provider()
            .returning(|_, _, _| Err(AppError::ExternalApi("connection refused".to_string())));
        mock.expect_trending()
            .returning(|_, _| Err(AppError::ExternalApi("connection refused".to_string())));
        let engine = engine(mock);
        let mut session = SessionState::new(3);

        let err = engine.spin(&mut session, &netflix_movies()).await.unwrap_err();

        match err {
            AppError::ApiFailure { detail, .. } => assert!(detail.contains("connection refused")),
            other => panic!("expected ApiFailure, got {:?}", other),
        }
        assert_eq!(session.spins_remaining(), 3);
    }

    #[tokio::test]
    async fn test_later_discovery_failure_keeps_rating_fallbacks() {
        let mut mock = MockMetadataProvider::new();
        let mut calls = 0;
        mock.expect_discover().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(movies(1..21))
            } else {
                Err(AppError::ExternalApi("connection reset".to_string()))
            }
        });
        mock.expect_popular_by_provider()
            .returning(|_, _, _| Err(AppError::ExternalApi("connection reset".to_string())));
        mock.expect_trending()
            .returning(|_, _| Err(AppError::ExternalApi("connection reset".to_string())));
        mock.expect_provider_offers()
            .returning(|_, id| Ok(Some(subscription_offers(id, &["Netflix"]))));
        mock.expect_maturity_rating()
            .returning(|_, _| Ok(Some("R".to_string())));
        let engine = engine(mock);
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(8);

        let mut criteria = netflix_movies();
        criteria.ratings = Some(vec!["PG".to_string()]);
        let result = engine
            .spin_with_rng(&mut session, &criteria, &mut rng)
            .await
            .unwrap();

        assert_eq!(result.maturity_rating.as_deref(), Some("R"));
        assert_eq!(result.matched_providers, vec!["Netflix"]);
        assert_eq!(result.spins_remaining, 2);
    }

    #[tokio::test]
    async fn test_empty_discovery_is_no_content() {
        let mut mock = MockMetadataProvider::new();
        mock.expect_discover().returning(|_, _| Ok(vec![]));
        mock.expect_popular_by_provider()
            .returning(|_, _, _| Ok(vec![]));
        mock.expect_trending().returning(|_, _| Ok(vec![]));
        let engine = engine(mock);
        let mut session = SessionState::new(3);

        let err = engine.spin(&mut session, &netflix_movies()).await.unwrap_err();

        assert!(matches!(err, AppError::NoContent(_)));
        assert_eq!(session.spins_remaining(), 3);
    }

    #[tokio::test]
    async fn test_rating_filter_prefers_passing_title() {
        let mut mock = MockMetadataProvider::new();
        with_pool(&mut mock);
        with_netflix_thirds(&mut mock);
        mock.expect_maturity_rating().returning(|_, id| {
            Ok(Some(if id == 9 { "PG" } else { "R" }.to_string()))
        });
        let engine = engine(mock);
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(4);

        let mut criteria = netflix_movies();
        criteria.ratings = Some(vec!["PG".to_string()]);
        let result = engine
            .spin_with_rng(&mut session, &criteria, &mut rng)
            .await
            .unwrap();

        assert_eq!(result.title.id, 9);
        assert_eq!(result.maturity_rating.as_deref(), Some("PG"));
    }

    #[tokio::test]
    async fn test_rating_relaxed_when_nothing_passes() {
        let mut mock = MockMetadataProvider::new();
        with_pool(&mut mock);
        with_netflix_thirds(&mut mock);
        mock.expect_maturity_rating()
            .returning(|_, _| Ok(Some("R".to_string())));
        let engine = engine(mock);
        let mut session = SessionState::new(3);
        let mut rng = StdRng::seed_from_u64(4);

        let mut criteria = netflix_movies();
        criteria.ratings = Some(vec!["PG".to_string()]);
        let result = engine
            .spin_with_rng(&mut session, &criteria, &mut rng)
            .await
            .unwrap();

        // Service membership still holds
        assert_eq!(result.title.id % 3, 0);
        assert_eq!(result.matched_providers, vec!["Netflix"]);
        assert_eq!(result.maturity_rating.as_deref(), Some("R"));
    }

    #[tokio::test]
    async fn test_rating_filter_never_falls_back_to_unmatched_titles() {
        let mut mock = MockMetadataProvider::new();
        with_pool(&mut mock);
        mock.expect_provider_offers()
            .returning(|_, id| Ok(Some(subscription_offers(id, &["Hulu"]))));
        mock.expect_maturity_rating().never();
        let engine = engine(mock);
        let mut session = SessionState::new(3);

        let mut criteria = netflix_movies();
        criteria.ratings = Some(vec!["PG".to_string()]);
        let err = engine.spin(&mut session, &criteria).await.unwrap_err();

        assert!(matches!(err, AppError::NoContent(_)));
        assert_eq!(session.spins_remaining(), 3);
    }

    #[test]
    fn test_preferred_service_is_least_used() {
        let selection = criteria(&["Netflix", "Hulu", "Max"], &[ContentKind::Movie])
            .validate()
            .unwrap();
        let mut session = SessionState::new(3);
        session.record_served(1, Some("Netflix"));
        session.record_served(2, Some("Max"));
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..20 {
            let preferred = preferred_service(&selection, &session, &mut rng).unwrap();
            assert_eq!(preferred.name, "Hulu");
        }
    }
}
