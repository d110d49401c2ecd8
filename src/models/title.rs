use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Kind of content a title represents
///
/// Set once when a title is ingested from the metadata provider and never
/// inferred from the shape of the payload afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Show,
}

impl ContentKind {
    /// Path segment used by the metadata provider for this kind
    pub fn api_path(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::Show => "tv",
        }
    }

    /// The other kind, used when a discovery pool needs topping up
    pub fn alternate(&self) -> Self {
        match self {
            ContentKind::Movie => ContentKind::Show,
            ContentKind::Show => ContentKind::Movie,
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Movie => write!(f, "movie"),
            ContentKind::Show => write!(f, "show"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" => Ok(ContentKind::Movie),
            "show" | "shows" | "tv" | "series" => Ok(ContentKind::Show),
            other => Err(format!("Unknown content kind: {}", other)),
        }
    }
}

/// A movie or show returned by the metadata provider
///
/// `id` is the only key used for deduplication, so it must stay stable
/// across every pool a title appears in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Title {
    pub id: u64,
    pub kind: ContentKind,
    pub name: String,
    pub genre_ids: Vec<u32>,
    pub overview: String,
    pub release_date: Option<String>,
    pub vote_average: f64,
    pub poster_path: Option<String>,
    pub original_language: String,
    pub popularity: f64,
}

impl Title {
    /// Release year parsed from the leading `YYYY` of the release date
    pub fn release_year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }
}
