use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A streaming service the user can select
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamingService {
    /// Canonical display name (e.g., "Netflix", "Max")
    pub name: &'static str,
    /// Metadata provider ids that belong to this service. The first one is
    /// the id used when filtering discovery queries.
    pub provider_ids: &'static [u32],
}

const CATALOG: &[StreamingService] = &[
    StreamingService {
        name: "Netflix",
        provider_ids: &[8, 1796],
    },
    StreamingService {
        name: "Amazon Prime Video",
        provider_ids: &[9, 119, 2100],
    },
    StreamingService {
        name: "Disney+",
        provider_ids: &[337],
    },
    StreamingService {
        name: "Hulu",
        provider_ids: &[15],
    },
    StreamingService {
        name: "Max",
        provider_ids: &[1899, 384],
    },
    StreamingService {
        name: "Apple TV+",
        provider_ids: &[350],
    },
    StreamingService {
        name: "Paramount+",
        provider_ids: &[531, 1770],
    },
    StreamingService {
        name: "Peacock",
        provider_ids: &[386, 387],
    },
];

impl StreamingService {
    /// All services that can be selected
    pub fn catalog() -> &'static [StreamingService] {
        CATALOG
    }

    /// Looks up a service by any of its names or aliases
    pub fn find(name: &str) -> Option<&'static StreamingService> {
        let canonical = normalize_provider_name(name);
        CATALOG.iter().find(|s| s.name == canonical)
    }

    /// Id passed to discovery queries for this service
    pub fn primary_provider_id(&self) -> u32 {
        self.provider_ids[0]
    }
}

/// Collapses provider aliases into one canonical service name
///
/// Offers come back under several labels for the same service ("Amazon Video",
/// "Prime Video", "HBO Max", ...). Unknown names are returned trimmed but
/// otherwise untouched, so applying this twice gives the same result as once.
pub fn normalize_provider_name(name: &str) -> String {
    let trimmed = name.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "netflix" | "netflix basic with ads" | "netflix standard with ads" => "Netflix",
        "amazon prime video" | "amazon video" | "prime video" | "amazon prime"
        | "amazon prime video with ads" | "amazon prime video free with ads" => {
            "Amazon Prime Video"
        }
        "disney+" | "disney plus" => "Disney+",
        "hulu" => "Hulu",
        "max" | "hbo" | "hbo max" | "max amazon channel" | "hbo max amazon channel" => "Max",
        "apple tv+" | "apple tv plus" => "Apple TV+",
        "paramount+" | "paramount plus" | "paramount+ with showtime"
        | "paramount plus premium" | "paramount plus essential" => "Paramount+",
        "peacock" | "peacock premium" | "peacock premium plus" => "Peacock",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

/// How a title is offered on a service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    Subscription,
    Free,
    AdSupported,
    Buy,
    Rent,
}

impl OfferKind {
    /// Whether the offer counts as "available on" the service, i.e. no
    /// per-title payment is needed
    pub fn is_included(&self) -> bool {
        matches!(
            self,
            OfferKind::Subscription | OfferKind::Free | OfferKind::AdSupported
        )
    }
}

/// One service offering a title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderOffer {
    pub provider_id: u32,
    pub provider_name: String,
    pub kind: OfferKind,
}

/// All offers for a title within a single region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOffers {
    pub title_id: u64,
    pub region: String,
    pub link: Option<String>,
    pub offers: Vec<ProviderOffer>,
    pub fetched_at: DateTime<Utc>,
}

impl ProviderOffers {
    /// Canonical names of services that include the title, in offer order,
    /// without duplicates
    pub fn included_services(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for offer in self.offers.iter().filter(|o| o.kind.is_included()) {
            let name = normalize_provider_name(&offer.provider_name);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Included services intersected with the user's selection, keeping the
    /// order of `selected`
    pub fn matching_services(&self, selected: &[String]) -> Vec<String> {
        let included = self.included_services();
        selected
            .iter()
            .filter(|s| included.contains(s))
            .cloned()
            .collect()
    }
}
