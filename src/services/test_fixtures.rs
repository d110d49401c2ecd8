use chrono::Utc;

use crate::models::{
    CandidateRecord, ContentKind, OfferKind, ProviderOffer, ProviderOffers, SelectionCriteria,
    Title,
};

pub fn title(id: u64, kind: ContentKind) -> Title {
    Title {
        id,
        kind,
        name: format!("Title {}", id),
        genre_ids: vec![18],
        overview: String::new(),
        release_date: Some("2021-05-01".to_string()),
        vote_average: 7.0,
        poster_path: None,
        original_language: "en".to_string(),
        popularity: 10.0,
    }
}

pub fn movies(ids: std::ops::Range<u64>) -> Vec<Title> {
    ids.map(|id| title(id, ContentKind::Movie)).collect()
}

pub fn subscription_offers(title_id: u64, services: &[&str]) -> ProviderOffers {
    ProviderOffers {
        title_id,
        region: "US".to_string(),
        link: None,
        offers: services
            .iter()
            .enumerate()
            .map(|(i, name)| ProviderOffer {
                provider_id: i as u32 + 1,
                provider_name: name.to_string(),
                kind: OfferKind::Subscription,
            })
            .collect(),
        fetched_at: Utc::now(),
    }
}

pub fn record(id: u64, services: &[&str]) -> CandidateRecord {
    CandidateRecord {
        title: title(id, ContentKind::Movie),
        services: services.iter().map(|s| s.to_string()).collect(),
        maturity_rating: None,
        passes_rating: true,
    }
}

pub fn criteria(services: &[&str], kinds: &[ContentKind]) -> SelectionCriteria {
    SelectionCriteria {
        services: services.iter().map(|s| s.to_string()).collect(),
        kinds: kinds.to_vec(),
        ratings: None,
    }
}
