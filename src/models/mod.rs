use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod selection;
mod session;
mod streaming_service;
mod title;

pub use selection::{MaturityFilter, Selection, SelectionCriteria};
pub use session::{SessionSnapshot, SessionState};
pub use streaming_service::{
    normalize_provider_name, OfferKind, ProviderOffer, ProviderOffers, StreamingService,
};
pub use title::{ContentKind, Title};

/// A discovered title that is available on at least one selected service
///
/// Built by the provider-match filter and consumed once by selection.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub title: Title,
    /// Selected services the title is included on, in selection order. Never empty.
    pub services: Vec<String>,
    pub maturity_rating: Option<String>,
    pub passes_rating: bool,
}

impl CandidateRecord {
    /// Service credited when this candidate is served
    pub fn primary_service(&self) -> Option<&str> {
        self.services.first().map(String::as_str)
    }
}

/// Outcome of a successful spin
#[derive(Debug, Clone, Serialize)]
pub struct SpinResult {
    pub title: Title,
    pub matched_providers: Vec<String>,
    pub maturity_rating: Option<String>,
    pub spins_remaining: u32,
}

/// Genre id/name pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

/// Time window for trending queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingWindow {
    Day,
    Week,
}

impl TrendingWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingWindow::Day => "day",
            TrendingWindow::Week => "week",
        }
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Paged list response
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub popularity: f64,
}

impl From<TmdbMovie> for Title {
    fn from(movie: TmdbMovie) -> Self {
        Title {
            id: movie.id,
            kind: ContentKind::Movie,
            name: movie.title,
            genre_ids: movie.genre_ids,
            overview: movie.overview,
            release_date: movie.release_date.filter(|d| !d.is_empty()),
            vote_average: movie.vote_average,
            poster_path: movie.poster_path,
            original_language: movie.original_language,
            popularity: movie.popularity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbShow {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub popularity: f64,
}

impl From<TmdbShow> for Title {
    fn from(show: TmdbShow) -> Self {
        Title {
            id: show.id,
            kind: ContentKind::Show,
            name: show.name,
            genre_ids: show.genre_ids,
            overview: show.overview,
            release_date: show.first_air_date.filter(|d| !d.is_empty()),
            vote_average: show.vote_average,
            poster_path: show.poster_path,
            original_language: show.original_language,
            popularity: show.popularity,
        }
    }
}

/// Entry of `/trending/all/*`, which mixes movies, shows and people
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbTrendingItem {
    pub id: u64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub popularity: f64,
}

impl TmdbTrendingItem {
    /// Converts to a title; `fallback_kind` applies when the endpoint was
    /// already kind-scoped and omits `media_type`. People are dropped.
    pub fn into_title(self, fallback_kind: Option<ContentKind>) -> Option<Title> {
        let kind = match self.media_type.as_deref() {
            Some("movie") => ContentKind::Movie,
            Some("tv") => ContentKind::Show,
            Some(_) => return None,
            None => fallback_kind?,
        };

        let (name, release_date) = match kind {
            ContentKind::Movie => (self.title.or(self.name)?, self.release_date),
            ContentKind::Show => (self.name.or(self.title)?, self.first_air_date),
        };

        Some(Title {
            id: self.id,
            kind,
            name,
            genre_ids: self.genre_ids,
            overview: self.overview,
            release_date: release_date.filter(|d| !d.is_empty()),
            vote_average: self.vote_average,
            poster_path: self.poster_path,
            original_language: self.original_language,
            popularity: self.popularity,
        })
    }
}

/// Response of `/{movie|tv}/{id}/watch/providers`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbWatchProviders {
    #[serde(default)]
    pub results: HashMap<String, TmdbRegionOffers>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbRegionOffers {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub flatrate: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub free: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub ads: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub buy: Vec<TmdbProviderEntry>,
    #[serde(default)]
    pub rent: Vec<TmdbProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbProviderEntry {
    pub provider_id: u32,
    pub provider_name: String,
}

impl TmdbWatchProviders {
    /// Offers for one region, or `None` when the title has none there
    pub fn into_offers(mut self, title_id: u64, region: &str) -> Option<ProviderOffers> {
        let region_offers = self.results.remove(region)?;

        let groups = [
            (region_offers.flatrate, OfferKind::Subscription),
            (region_offers.free, OfferKind::Free),
            (region_offers.ads, OfferKind::AdSupported),
            (region_offers.buy, OfferKind::Buy),
            (region_offers.rent, OfferKind::Rent),
        ];

        let offers = groups
            .into_iter()
            .flat_map(|(entries, kind)| {
                entries.into_iter().map(move |e| ProviderOffer {
                    provider_id: e.provider_id,
                    provider_name: e.provider_name,
                    kind,
                })
            })
            .collect();

        Some(ProviderOffers {
            title_id,
            region: region.to_string(),
            link: region_offers.link,
            offers,
            fetched_at: Utc::now(),
        })
    }
}

/// Response of `/movie/{id}/release_dates`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbReleaseDates {
    #[serde(default)]
    pub results: Vec<TmdbRegionReleases>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbRegionReleases {
    pub iso_3166_1: String,
    #[serde(default)]
    pub release_dates: Vec<TmdbReleaseDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbReleaseDate {
    #[serde(default)]
    pub certification: String,
}

impl TmdbReleaseDates {
    /// First non-empty certification for the region
    pub fn certification_for(&self, region: &str) -> Option<String> {
        self.results
            .iter()
            .find(|r| r.iso_3166_1 == region)?
            .release_dates
            .iter()
            .map(|d| d.certification.trim())
            .find(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// Response of `/tv/{id}/content_ratings`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbContentRatings {
    #[serde(default)]
    pub results: Vec<TmdbContentRating>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbContentRating {
    pub iso_3166_1: String,
    #[serde(default)]
    pub rating: String,
}

impl TmdbContentRatings {
    pub fn rating_for(&self, region: &str) -> Option<String> {
        self.results
            .iter()
            .find(|r| r.iso_3166_1 == region && !r.rating.trim().is_empty())
            .map(|r| r.rating.trim().to_string())
    }
}

/// Response of `/genre/{movie|tv}/list`
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenreList {
    #[serde(default)]
    pub genres: Vec<Genre>,
}
