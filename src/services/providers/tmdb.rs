//! TMDB metadata provider
//!
//! API flow used by the pipeline:
//! 1. Candidates: /discover/{movie|tv} filtered by watch provider, or
//!    /trending as a last resort
//! 2. Availability: /{movie|tv}/{id}/watch/providers
//! 3. Maturity: /movie/{id}/release_dates or /tv/{id}/content_ratings
use crate::{
    cache::{Cache, CacheKey},
    cached,
    error::{AppError, AppResult},
    models::{
        ContentKind, Genre, ProviderOffers, Title, TmdbContentRatings, TmdbGenreList, TmdbMovie,
        TmdbPage, TmdbReleaseDates, TmdbShow, TmdbTrendingItem, TmdbWatchProviders,
        TrendingWindow,
    },
    services::providers::{DiscoverFilters, MetadataProvider},
};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Monetization types that count as included with a service
const INCLUDED_MONETIZATION: &str = "flatrate|free|ads";

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    region: String,
    cache: Cache,
}

impl TmdbProvider {
    pub fn new(
        cache: Cache,
        api_key: String,
        api_url: String,
        region: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            region,
            cache,
        })
    }

    /// Query parameters for a discover call
    fn discover_query(&self, filters: &DiscoverFilters) -> Vec<(String, String)> {
        let mut query = vec![
            ("sort_by".to_string(), filters.sort_by.clone()),
            ("page".to_string(), filters.page.max(1).to_string()),
            ("include_adult".to_string(), "false".to_string()),
            ("watch_region".to_string(), self.region.clone()),
        ];

        if let Some(provider_id) = filters.provider_id {
            query.push(("with_watch_providers".to_string(), provider_id.to_string()));
            query.push((
                "with_watch_monetization_types".to_string(),
                INCLUDED_MONETIZATION.to_string(),
            ));
        }

        if let Some(min_votes) = filters.min_votes {
            query.push(("vote_count.gte".to_string(), min_votes.to_string()));
        }

        query
    }

    /// GETs a path under the API root and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(path = %path, status = %status, "TMDB request failed");
            return Err(AppError::ExternalApi(format!(
                "TMDB returned status {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, path = %path, "Failed to deserialize TMDB response");
            AppError::ExternalApi(format!("Failed to parse TMDB response: {}", e))
        })
    }

    /// Fetches one page of discover results and converts them to titles
    async fn fetch_discover_page(
        &self,
        kind: ContentKind,
        filters: &DiscoverFilters,
    ) -> AppResult<Vec<Title>> {
        let path = format!("/discover/{}", kind.api_path());
        let query = self.discover_query(filters);

        let titles: Vec<Title> = match kind {
            ContentKind::Movie => self
                .get_json::<TmdbPage<TmdbMovie>>(&path, &query)
                .await?
                .results
                .into_iter()
                .map(Title::from)
                .collect(),
            ContentKind::Show => self
                .get_json::<TmdbPage<TmdbShow>>(&path, &query)
                .await?
                .results
                .into_iter()
                .map(Title::from)
                .collect(),
        };

        tracing::debug!(
            kind = %kind,
            provider_id = ?filters.provider_id,
            sort_by = %filters.sort_by,
            page = filters.page,
            results = titles.len(),
            "Discover page fetched"
        );

        Ok(titles)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbProvider {
    async fn discover(
        &self,
        kind: ContentKind,
        filters: &DiscoverFilters,
    ) -> AppResult<Vec<Title>> {
        cached!(
            self.cache,
            CacheKey::Discover {
                kind,
                provider: filters.provider_id.unwrap_or(0),
                sort: format!("{}:{}", filters.sort_by, filters.min_votes.unwrap_or(0)),
                page: filters.page,
            },
            self.fetch_discover_page(kind, filters)
        )
    }

    async fn popular_by_provider(
        &self,
        kind: ContentKind,
        provider_id: u32,
        page: u32,
    ) -> AppResult<Vec<Title>> {
        let filters = DiscoverFilters {
            provider_id: Some(provider_id),
            ..DiscoverFilters::popular(page)
        };

        cached!(
            self.cache,
            CacheKey::PopularByProvider {
                kind,
                provider: provider_id,
                page,
            },
            self.fetch_discover_page(kind, &filters)
        )
    }

    async fn trending(
        &self,
        kind: Option<ContentKind>,
        window: TrendingWindow,
    ) -> AppResult<Vec<Title>> {
        cached!(
            self.cache,
            CacheKey::Trending { kind, window },
            async move {
                let segment = kind.map(|k| k.api_path()).unwrap_or("all");
                let path = format!("/trending/{}/{}", segment, window.as_str());

                let page: TmdbPage<TmdbTrendingItem> = self.get_json(&path, &[]).await?;
                let titles: Vec<Title> = page
                    .results
                    .into_iter()
                    .filter_map(|item| item.into_title(kind))
                    .collect();

                tracing::debug!(path = %path, results = titles.len(), "Trending fetched");
                Ok::<Vec<Title>, AppError>(titles)
            }
        )
    }

    async fn provider_offers(
        &self,
        kind: ContentKind,
        title_id: u64,
    ) -> AppResult<Option<ProviderOffers>> {
        cached!(
            self.cache,
            CacheKey::ProviderOffers { kind, id: title_id },
            async move {
                let path = format!("/{}/{}/watch/providers", kind.api_path(), title_id);
                let providers: TmdbWatchProviders = self.get_json(&path, &[]).await?;
                let offers = providers.into_offers(title_id, &self.region);

                tracing::debug!(
                    title_id,
                    kind = %kind,
                    offers = offers.as_ref().map(|o| o.offers.len()).unwrap_or(0),
                    "Provider offers fetched"
                );

                Ok::<Option<ProviderOffers>, AppError>(offers)
            }
        )
    }

    async fn maturity_rating(
        &self,
        kind: ContentKind,
        title_id: u64,
    ) -> AppResult<Option<String>> {
        cached!(
            self.cache,
            CacheKey::MaturityRating { kind, id: title_id },
            async move {
                let rating = match kind {
                    ContentKind::Movie => {
                        let path = format!("/movie/{}/release_dates", title_id);
                        let dates: TmdbReleaseDates = self.get_json(&path, &[]).await?;
                        dates.certification_for(&self.region)
                    }
                    ContentKind::Show => {
                        let path = format!("/tv/{}/content_ratings", title_id);
                        let ratings: TmdbContentRatings = self.get_json(&path, &[]).await?;
                        ratings.rating_for(&self.region)
                    }
                };

                Ok::<Option<String>, AppError>(rating)
            }
        )
    }

    async fn genres(&self, kind: ContentKind) -> AppResult<Vec<Genre>> {
        cached!(self.cache, CacheKey::Genres { kind }, async move {
            let path = format!("/genre/{}/list", kind.api_path());
            let list: TmdbGenreList = self.get_json(&path, &[]).await?;
            Ok::<Vec<Genre>, AppError>(list.genres)
        })
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
