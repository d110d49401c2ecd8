use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::RwLock, task::JoinHandle};
use uuid::Uuid;

use crate::services::{
    providers::MetadataProvider, PipelineSettings, Session, SpinEngine,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SpinEngine>,
    pub provider: Arc<dyn MetadataProvider>,
    pub sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub spin_budget: u32,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        settings: PipelineSettings,
        spin_budget: u32,
    ) -> Self {
        tracing::info!(provider = provider.name(), spin_budget, "Spin engine ready");
        Self {
            engine: Arc::new(SpinEngine::new(provider.clone(), settings)),
            provider,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            spin_budget,
        }
    }

    /// Creates and registers a session with a full budget
    pub async fn create_session(&self) -> Session {
        let session = Session::new(self.spin_budget);
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        session
    }

    /// Looks up a session and marks it as used
    pub async fn session(&self, id: Uuid) -> Option<Session> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Drops sessions unused for at least `max_idle`. Sessions with a spin in
    /// flight are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_busy() || session.idle_for() < max_idle);
        let evicted = before - sessions.len();

        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    /// Runs `evict_idle` every `every` until the runtime shuts down
    pub fn spawn_session_sweeper(&self, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                state.evict_idle(max_idle).await;
            }
        })
    }
}
