use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{SelectionCriteria, SessionSnapshot, SessionState, SpinResult},
    services::SpinEngine,
};

/// A spin session shared between requests
///
/// The state sits behind an async mutex. A spin holds the lock for its whole
/// run, so a second spin (or a reset) arriving meanwhile is rejected instead
/// of queued.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    state: Arc<Mutex<SessionState>>,
    created: Instant,
    /// Milliseconds after `created` of the last access
    last_used_ms: Arc<AtomicU64>,
}

impl Session {
    pub fn new(budget: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(SessionState::new(budget))),
            created: Instant::now(),
            last_used_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Marks the session as used now
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.created.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_used_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the session was last used
    pub fn idle_for(&self) -> Duration {
        let last_used = Duration::from_millis(self.last_used_ms.load(Ordering::Relaxed));
        self.created.elapsed().saturating_sub(last_used)
    }

    /// True while a spin or reset holds the state
    pub fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }

    pub async fn spin(
        &self,
        engine: &SpinEngine,
        criteria: &SelectionCriteria,
    ) -> AppResult<SpinResult> {
        let mut state = self.state.try_lock().map_err(|_| {
            tracing::info!(session_id = %self.id, "Spin rejected, another is in flight");
            AppError::SpinInProgress
        })?;
        engine.spin(&mut state, criteria).await
    }

    /// Waits for any in-flight spin to finish
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub fn reset(&self) -> AppResult<SessionSnapshot> {
        let mut state = self
            .state
            .try_lock()
            .map_err(|_| AppError::SpinInProgress)?;
        state.reset();
        tracing::info!(session_id = %self.id, "Session reset");
        Ok(state.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;
    use crate::services::providers::MockMetadataProvider;
    use crate::services::test_fixtures::criteria;
    use crate::services::PipelineSettings;

    fn idle_engine() -> SpinEngine {
        SpinEngine::new(
            Arc::new(MockMetadataProvider::new()),
            PipelineSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_spin_rejected_while_in_flight() {
        let session = Session::new(3);
        let engine = idle_engine();
        let _in_flight = session.state.lock().await;

        let err = session
            .spin(&engine, &criteria(&["Netflix"], &[ContentKind::Movie]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SpinInProgress));
    }

    #[tokio::test]
    async fn test_reset_rejected_while_in_flight() {
        let session = Session::new(3);
        let _in_flight = session.state.lock().await;

        assert!(matches!(session.reset(), Err(AppError::SpinInProgress)));
    }

    #[tokio::test]
    async fn test_reset_restores_budget() {
        let session = Session::new(3);
        {
            let mut state = session.state.lock().await;
            state.consume_spin();
            state.record_served(42, Some("Netflix"));
        }

        let snapshot = session.reset().unwrap();
        assert_eq!(snapshot.spins_remaining, 3);
        assert_eq!(snapshot.served_count, 0);
        assert!(snapshot.service_usage.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let session = Session::new(2);
        let other = session.clone();
        {
            let mut state = session.state.lock().await;
            state.consume_spin();
        }

        assert_eq!(other.id(), session.id());
        assert_eq!(other.snapshot().await.spins_remaining, 1);
    }

    #[test]
    fn test_touch_resets_idle_time() {
        let session = Session::new(3);
        std::thread::sleep(Duration::from_millis(20));
        assert!(session.idle_for() >= Duration::from_millis(20));

        session.clone().touch();
        assert!(session.idle_for() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_busy_while_state_locked() {
        let session = Session::new(3);
        assert!(!session.is_busy());

        let _in_flight = session.state.lock().await;
        assert!(session.is_busy());
    }

    #[tokio::test]
    async fn test_validation_error_passes_through() {
        let session = Session::new(3);
        let engine = idle_engine();

        let err = session
            .spin(&engine, &criteria(&["Netflix"], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(session.snapshot().await.spins_remaining, 3);
    }
}
