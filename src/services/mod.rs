pub mod discovery;
pub mod matching;
pub mod providers;
pub mod selector;
pub mod session;
pub mod spin;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use discovery::CandidateDiscovery;
pub use matching::ProviderMatcher;
pub use selector::BalancedSelector;
pub use session::Session;
pub use spin::SpinEngine;

/// Tuning knobs for the recommendation pipeline
///
/// None of these are load-bearing; they trade latency against pool size.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Stop provider fan-out once the pool holds this many titles
    pub pool_target: usize,
    /// Below this size the fallback strategies kick in
    pub min_pool: usize,
    /// Discover pages are drawn from `1..=max_page`
    pub max_page: u32,
    /// Upper bound on provider-scoped discover calls per pool
    pub max_provider_queries: usize,
    /// Only this many pool entries get an offer lookup
    pub inspect_limit: usize,
    /// Stop inspecting once this many passing matches are found
    pub match_target: usize,
    /// Simultaneous offer lookups
    pub lookup_concurrency: usize,
    /// Discover/match rounds before giving up on a constraint set
    pub max_attempts: usize,
    /// Selection weight is `max(1, weight_base - usage)`
    pub weight_base: u32,
    /// Recycle served titles when fewer than this many are unseen...
    pub reset_min_remaining: usize,
    /// ...and the pool holds more than this many
    pub reset_pool_threshold: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pool_target: 40,
            min_pool: 20,
            max_page: 5,
            max_provider_queries: 12,
            inspect_limit: 24,
            match_target: 8,
            lookup_concurrency: 4,
            max_attempts: 16,
            weight_base: 10,
            reset_min_remaining: 5,
            reset_pool_threshold: 10,
        }
    }
}
