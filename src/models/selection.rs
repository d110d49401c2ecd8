use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::{ContentKind, StreamingService};

/// What the user asked for when triggering a spin
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectionCriteria {
    /// Streaming service names; aliases are accepted
    pub services: Vec<String>,
    /// Content kinds to draw from
    pub kinds: Vec<ContentKind>,
    /// Acceptable maturity ratings (e.g. "PG-13", "TV-14"). `None` or an
    /// empty list disables the rating filter.
    #[serde(default)]
    pub ratings: Option<Vec<String>>,
}

/// Criteria that passed validation
#[derive(Debug, Clone)]
pub struct Selection {
    pub services: Vec<&'static StreamingService>,
    pub kinds: Vec<ContentKind>,
    pub maturity: Option<MaturityFilter>,
}

impl Selection {
    /// Canonical names of the selected services, in selection order
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.to_string()).collect()
    }

    /// Same selection without the rating constraint
    pub fn relaxed(&self) -> Self {
        Self {
            services: self.services.clone(),
            kinds: self.kinds.clone(),
            maturity: None,
        }
    }
}

impl SelectionCriteria {
    /// Checks the criteria and resolves service names against the catalog
    pub fn validate(&self) -> AppResult<Selection> {
        if self.services.is_empty() {
            return Err(AppError::Validation(
                "Select at least one streaming service".to_string(),
            ));
        }
        if self.kinds.is_empty() {
            return Err(AppError::Validation(
                "Select at least one content type".to_string(),
            ));
        }

        let mut services: Vec<&'static StreamingService> = Vec::new();
        for name in &self.services {
            let service = StreamingService::find(name).ok_or_else(|| {
                AppError::Validation(format!("Unknown streaming service: {}", name))
            })?;
            if !services.contains(&service) {
                services.push(service);
            }
        }

        let mut kinds = Vec::new();
        for kind in &self.kinds {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }

        let maturity = self
            .ratings
            .as_ref()
            .filter(|r| !r.is_empty())
            .map(|r| MaturityFilter::new(r));

        Ok(Selection {
            services,
            kinds,
            maturity,
        })
    }
}

/// Set of acceptable maturity ratings
#[derive(Debug, Clone, PartialEq)]
pub struct MaturityFilter {
    allowed: Vec<String>,
}

impl MaturityFilter {
    pub fn new(ratings: &[String]) -> Self {
        Self {
            allowed: ratings.iter().map(|r| normalize_rating(r)).collect(),
        }
    }

    /// A title without a known rating never passes
    pub fn allows(&self, rating: Option<&str>) -> bool {
        match rating {
            Some(r) => self.allowed.contains(&normalize_rating(r)),
            None => false,
        }
    }
}

fn normalize_rating(rating: &str) -> String {
    rating.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(services: &[&str], kinds: &[ContentKind]) -> SelectionCriteria {
        SelectionCriteria {
            services: services.iter().map(|s| s.to_string()).collect(),
            kinds: kinds.to_vec(),
            ratings: None,
        }
    }

    #[test]
    fn test_empty_services_rejected() {
        let err = criteria(&[], &[ContentKind::Movie]).validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_empty_kinds_rejected() {
        let err = criteria(&["Netflix"], &[]).validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_unknown_service_rejected() {
        let err = criteria(&["Blockbuster"], &[ContentKind::Movie])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("Blockbuster"));
    }

    #[test]
    fn test_aliases_collapse_to_one_service() {
        let selection = criteria(
            &["Amazon Video", "Prime Video", "HBO"],
            &[ContentKind::Movie, ContentKind::Movie],
        )
        .validate()
        .unwrap();

        assert_eq!(selection.service_names(), vec!["Amazon Prime Video", "Max"]);
        assert_eq!(selection.kinds, vec![ContentKind::Movie]);
        assert!(selection.maturity.is_none());
    }

    #[test]
    fn test_empty_rating_list_disables_filter() {
        let mut c = criteria(&["Netflix"], &[ContentKind::Show]);
        c.ratings = Some(vec![]);
        assert!(c.validate().unwrap().maturity.is_none());
    }

    #[test]
    fn test_maturity_filter() {
        let filter = MaturityFilter::new(&["pg-13".to_string(), "TV-14".to_string()]);
        assert!(filter.allows(Some("PG-13")));
        assert!(filter.allows(Some(" tv-14")));
        assert!(!filter.allows(Some("R")));
        assert!(!filter.allows(None));
    }

    #[test]
    fn test_relaxed_drops_maturity() {
        let mut c = criteria(&["Netflix"], &[ContentKind::Movie]);
        c.ratings = Some(vec!["PG".to_string()]);
        let selection = c.validate().unwrap();
        assert!(selection.maturity.is_some());
        assert!(selection.relaxed().maturity.is_none());
    }
}
