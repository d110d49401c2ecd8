//! Content metadata provider abstraction
//!
//! The recommendation pipeline only talks to metadata through this trait, so
//! the concrete API client (TMDB today) can be swapped or stubbed.

use crate::{
    error::AppResult,
    models::{ContentKind, Genre, ProviderOffers, Title, TrendingWindow},
};

pub mod tmdb;

pub use tmdb::TmdbProvider;

/// Filters for a discovery query
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverFilters {
    /// Restrict to titles offered by this provider id in the watch region
    pub provider_id: Option<u32>,
    /// Sort order understood by the provider (e.g. "popularity.desc")
    pub sort_by: String,
    /// Minimum number of votes a title needs
    pub min_votes: Option<u32>,
    pub page: u32,
}

impl DiscoverFilters {
    pub fn popular(page: u32) -> Self {
        Self {
            provider_id: None,
            sort_by: "popularity.desc".to_string(),
            min_votes: None,
            page,
        }
    }
}

/// Source of titles, offers and ratings
///
/// Every call may fail or come back empty; callers decide whether a failure
/// matters.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Discover titles of one kind with the given filters
    async fn discover(&self, kind: ContentKind, filters: &DiscoverFilters)
        -> AppResult<Vec<Title>>;

    /// Most popular titles currently offered by a provider
    async fn popular_by_provider(
        &self,
        kind: ContentKind,
        provider_id: u32,
        page: u32,
    ) -> AppResult<Vec<Title>>;

    /// Trending titles; `None` mixes movies and shows
    async fn trending(
        &self,
        kind: Option<ContentKind>,
        window: TrendingWindow,
    ) -> AppResult<Vec<Title>>;

    /// Offers for a title in the configured region, `None` if it has none there
    async fn provider_offers(
        &self,
        kind: ContentKind,
        title_id: u64,
    ) -> AppResult<Option<ProviderOffers>>;

    /// Maturity rating for a title in the configured region
    async fn maturity_rating(&self, kind: ContentKind, title_id: u64)
        -> AppResult<Option<String>>;

    async fn genres(&self, kind: ContentKind) -> AppResult<Vec<Genre>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
