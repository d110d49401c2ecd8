use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{ContentKind, Selection, StreamingService, Title, TrendingWindow},
    services::{
        providers::{DiscoverFilters, MetadataProvider},
        PipelineSettings,
    },
};

/// Sort orders used when fanning out over a provider, with the vote floor
/// each one needs to avoid obscure entries
fn sort_orders(kind: ContentKind) -> [(&'static str, Option<u32>); 3] {
    let newest = match kind {
        ContentKind::Movie => "primary_release_date.desc",
        ContentKind::Show => "first_air_date.desc",
    };
    [
        ("popularity.desc", None),
        ("vote_average.desc", Some(100)),
        (newest, Some(50)),
    ]
}

/// Deduplicated pool of titles, in insertion order
#[derive(Debug, Default)]
struct CandidatePool {
    titles: Vec<Title>,
    seen: HashSet<u64>,
}

impl CandidatePool {
    /// Adds unseen titles and returns how many were new
    fn extend(&mut self, titles: Vec<Title>) -> usize {
        let before = self.titles.len();
        for title in titles {
            if self.seen.insert(title.id) {
                self.titles.push(title);
            }
        }
        self.titles.len() - before
    }

    fn len(&self) -> usize {
        self.titles.len()
    }
}

/// Builds the raw candidate pool for a spin
///
/// Strategies run in a fixed order and each one only runs while the pool is
/// still too small:
/// 1. every selected service x several sort orders, random pages
/// 2. the alternate content kind on the preferred service
/// 3. the preferred service's popular list
/// 4. unfiltered popularity discovery
/// 5. trending this week
pub struct CandidateDiscovery {
    provider: Arc<dyn MetadataProvider>,
    settings: PipelineSettings,
}

impl CandidateDiscovery {
    pub fn new(provider: Arc<dyn MetadataProvider>, settings: PipelineSettings) -> Self {
        Self { provider, settings }
    }

    /// Returns a shuffled, deduplicated pool for `kind`
    ///
    /// Individual strategy failures are logged and skipped. Only an empty
    /// pool after at least one failure is an error (`ApiFailure`); an empty
    /// pool without failures is returned as is.
    pub async fn discover(
        &self,
        kind: ContentKind,
        selection: &Selection,
        preferred: &StreamingService,
        rng: &mut StdRng,
    ) -> AppResult<Vec<Title>> {
        let mut pool = CandidatePool::default();
        let mut last_error: Option<AppError> = None;

        self.fan_out(kind, selection, preferred, rng, &mut pool, &mut last_error)
            .await;

        if pool.len() < self.settings.min_pool && selection.kinds.len() > 1 {
            let alternate = kind.alternate();
            let filters = DiscoverFilters {
                provider_id: Some(preferred.primary_provider_id()),
                ..DiscoverFilters::popular(self.random_page(rng))
            };
            let result = self.provider.discover(alternate, &filters).await;
            self.absorb("alternate_kind", result, &mut pool, &mut last_error);
        }

        if pool.len() < self.settings.min_pool {
            let result = self
                .provider
                .popular_by_provider(kind, preferred.primary_provider_id(), 1)
                .await;
            self.absorb("provider_popular", result, &mut pool, &mut last_error);
        }

        if pool.len() < self.settings.min_pool {
            let filters = DiscoverFilters::popular(self.random_page(rng));
            let result = self.provider.discover(kind, &filters).await;
            self.absorb("generic_popular", result, &mut pool, &mut last_error);
        }

        if pool.len() < self.settings.min_pool {
            let result = self
                .provider
                .trending(Some(kind), TrendingWindow::Week)
                .await;
            self.absorb("trending", result, &mut pool, &mut last_error);
        }

        if pool.titles.is_empty() {
            if let Some(e) = last_error {
                tracing::error!(error = %e, kind = %kind, "Discovery failed on every strategy");
                return Err(AppError::ApiFailure {
                    message: "Unable to load recommendations right now. Please try again."
                        .to_string(),
                    detail: e.to_string(),
                });
            }
            tracing::info!(kind = %kind, "Discovery found no content");
            return Ok(Vec::new());
        }

        let mut titles = pool.titles;
        titles.shuffle(rng);

        tracing::info!(
            kind = %kind,
            preferred = preferred.name,
            pool_size = titles.len(),
            "Candidate pool built"
        );

        Ok(titles)
    }

    /// Strategy 1: provider-scoped discovery across all selected services,
    /// preferred service first, one sort order at a time
    async fn fan_out(
        &self,
        kind: ContentKind,
        selection: &Selection,
        preferred: &StreamingService,
        rng: &mut StdRng,
        pool: &mut CandidatePool,
        last_error: &mut Option<AppError>,
    ) {
        let mut services: Vec<&StreamingService> = vec![preferred];
        services.extend(selection.services.iter().copied().filter(|s| *s != preferred));

        let mut queries = 0;
        for (sort_by, min_votes) in sort_orders(kind) {
            for service in &services {
                if pool.len() >= self.settings.pool_target
                    || queries >= self.settings.max_provider_queries
                {
                    return;
                }
                queries += 1;

                let filters = DiscoverFilters {
                    provider_id: Some(service.primary_provider_id()),
                    sort_by: sort_by.to_string(),
                    min_votes,
                    page: self.random_page(rng),
                };
                let result = self.provider.discover(kind, &filters).await;
                self.absorb(service.name, result, pool, last_error);
            }
        }
    }

    fn absorb(
        &self,
        strategy: &str,
        result: AppResult<Vec<Title>>,
        pool: &mut CandidatePool,
        last_error: &mut Option<AppError>,
    ) {
        match result {
            Ok(titles) => {
                let fetched = titles.len();
                let added = pool.extend(titles);
                tracing::debug!(
                    strategy = %strategy,
                    fetched,
                    added,
                    pool_size = pool.len(),
                    "Discovery strategy completed"
                );
            }
            Err(e) => {
                tracing::warn!(strategy = %strategy, error = %e, "Discovery strategy failed");
                *last_error = Some(e);
            }
        }
    }

    fn random_page(&self, rng: &mut StdRng) -> u32 {
        rng.gen_range(1..=self.settings.max_page.max(1))
    }
}
