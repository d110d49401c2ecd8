use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Per-session state carried across spins
///
/// Owned by whoever drives the spins and only mutated by the selection step
/// and by `reset`.
#[derive(Debug, Clone)]
pub struct SessionState {
    budget: u32,
    spins_remaining: u32,
    served_ids: HashSet<u64>,
    service_usage: HashMap<String, u32>,
    started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(budget: u32) -> Self {
        Self {
            budget,
            spins_remaining: budget,
            served_ids: HashSet::new(),
            service_usage: HashMap::new(),
            started_at: Utc::now(),
        }
    }

    pub fn spins_remaining(&self) -> u32 {
        self.spins_remaining
    }

    pub fn is_served(&self, id: u64) -> bool {
        self.served_ids.contains(&id)
    }

    pub fn served_count(&self) -> usize {
        self.served_ids.len()
    }

    /// Times a service has been the primary match of a served title
    pub fn usage(&self, service: &str) -> u32 {
        self.service_usage.get(service).copied().unwrap_or(0)
    }

    /// Takes one spin from the budget. Returns false when none are left.
    pub fn consume_spin(&mut self) -> bool {
        if self.spins_remaining == 0 {
            return false;
        }
        self.spins_remaining -= 1;
        true
    }

    /// Gives back a spin lost to a failed attempt
    pub fn restore_spin(&mut self) {
        self.spins_remaining = (self.spins_remaining + 1).min(self.budget);
    }

    /// Forgets which titles were served so the pool can be reused
    pub fn clear_served(&mut self) {
        self.served_ids.clear();
    }

    /// Records a served title and the service it was credited to
    pub fn record_served(&mut self, id: u64, primary_service: Option<&str>) {
        self.served_ids.insert(id);
        if let Some(service) = primary_service {
            *self.service_usage.entry(service.to_string()).or_insert(0) += 1;
        }
    }

    /// Starts over with a full budget and no history
    pub fn reset(&mut self) {
        self.spins_remaining = self.budget;
        self.served_ids.clear();
        self.service_usage.clear();
        self.started_at = Utc::now();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            spins_remaining: self.spins_remaining,
            budget: self.budget,
            served_count: self.served_ids.len(),
            service_usage: self.service_usage.clone(),
            started_at: self.started_at,
        }
    }
}

/// Read-only view of a session for clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub spins_remaining: u32,
    pub budget: u32,
    pub served_count: usize,
    pub service_usage: HashMap<String, u32>,
    pub started_at: DateTime<Utc>,
}
