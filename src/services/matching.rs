use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::{
    models::{CandidateRecord, MaturityFilter, Selection, Title},
    services::{providers::MetadataProvider, PipelineSettings},
};

/// Narrows a candidate pool to titles offered on the selected services
///
/// Only a prefix of the pool is inspected and inspection stops once enough
/// passing matches are in hand; any valid match is good enough, so latency
/// wins over finding the "best" one.
pub struct ProviderMatcher {
    provider: Arc<dyn MetadataProvider>,
    settings: PipelineSettings,
}

impl ProviderMatcher {
    pub fn new(provider: Arc<dyn MetadataProvider>, settings: PipelineSettings) -> Self {
        Self { provider, settings }
    }

    /// Looks up offers (and ratings, when filtering) for the pool prefix
    ///
    /// At most `lookup_concurrency` lookups are in flight. Records come back
    /// in pool order, each with a non-empty service list. Titles failing the
    /// rating filter are kept with `passes_rating = false`.
    pub async fn match_candidates(
        &self,
        pool: &[Title],
        selection: &Selection,
    ) -> Vec<CandidateRecord> {
        let selected = selection.service_names();
        let maturity = selection.maturity.as_ref();
        let prefix = &pool[..pool.len().min(self.settings.inspect_limit)];

        let lookups: Vec<_> = prefix
            .iter()
            .map(|title| self.inspect(title, &selected, maturity))
            .collect();
        let mut results = stream::iter(lookups).buffered(self.settings.lookup_concurrency.max(1));

        let mut records = Vec::new();
        let mut passing = 0;
        let mut inspected = 0;

        while let Some(result) = results.next().await {
            inspected += 1;
            let Some(record) = result else { continue };

            if record.passes_rating {
                passing += 1;
            }
            records.push(record);

            if passing >= self.settings.match_target {
                break;
            }
        }

        tracing::info!(
            pool_size = pool.len(),
            inspected,
            matched = records.len(),
            passing,
            "Provider matching completed"
        );

        records
    }

    /// Offer lookup for a single title chosen without a provider match
    ///
    /// Returns the selected services the title is on, or failing that every
    /// service it is included on. Empty when the lookup fails or finds nothing.
    pub async fn lookup_services(&self, title: &Title, selected: &[String]) -> Vec<String> {
        match self.provider.provider_offers(title.kind, title.id).await {
            Ok(Some(offers)) => {
                let matching = offers.matching_services(selected);
                if matching.is_empty() {
                    offers.included_services()
                } else {
                    matching
                }
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(title_id = title.id, error = %e, "Direct offer lookup failed");
                Vec::new()
            }
        }
    }

    async fn inspect(
        &self,
        title: &Title,
        selected: &[String],
        maturity: Option<&MaturityFilter>,
    ) -> Option<CandidateRecord> {
        let offers = match self.provider.provider_offers(title.kind, title.id).await {
            Ok(Some(offers)) => offers,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(title_id = title.id, error = %e, "Offer lookup failed");
                return None;
            }
        };

        let services = offers.matching_services(selected);
        if services.is_empty() {
            return None;
        }

        let (maturity_rating, passes_rating) = match maturity {
            Some(filter) => {
                let rating = match self.provider.maturity_rating(title.kind, title.id).await {
                    Ok(rating) => rating,
                    Err(e) => {
                        tracing::warn!(title_id = title.id, error = %e, "Rating lookup failed");
                        None
                    }
                };
                let passes = filter.allows(rating.as_deref());
                (rating, passes)
            }
            None => (None, true),
        };

        Some(CandidateRecord {
            title: title.clone(),
            services,
            maturity_rating,
            passes_rating,
        })
    }
}
