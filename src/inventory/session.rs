//! Session Registry
//!
//! Tracks authenticated sessions keyed by (endpoint, principal). A session
//! is never assumed valid: callers discover expiry through an authentication
//! failure and ask the registry to log in again. Concurrent callers that hit
//! the same expired session share a single login.

use crate::domain::ports::{CommandRunner, SessionContext, SessionKey};
use crate::error::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Observable state of one session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Bumped on every successful login
    pub generation: u64,
    pub authenticated_at: Option<DateTime<Utc>>,
    pub reauthentications: u64,
}

#[derive(Default)]
struct SessionSlot {
    state: RwLock<SessionState>,
    login_lock: tokio::sync::Mutex<()>,
}

/// Registry of sessions shared across requests
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<SessionSlot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: SessionKey) -> Arc<SessionSlot> {
        self.sessions.entry(key).or_default().clone()
    }

    /// Current login generation, 0 if this session never re-authenticated
    pub fn generation(&self, key: &SessionKey) -> u64 {
        self.sessions
            .get(key)
            .map(|slot| slot.state.read().generation)
            .unwrap_or(0)
    }

    pub fn state(&self, key: &SessionKey) -> Option<SessionState> {
        self.sessions.get(key).map(|slot| slot.state.read().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Log in again unless another caller already did since `seen_generation`
    pub async fn reauthenticate(
        &self,
        runner: &dyn CommandRunner,
        session: &SessionContext,
        seen_generation: u64,
    ) -> Result<()> {
        let slot = self.slot(session.key());
        let _guard = slot.login_lock.lock().await;

        if slot.state.read().generation != seen_generation {
            debug!(
                "Session for {}@{} was refreshed concurrently",
                session.principal(),
                session.endpoint()
            );
            return Ok(());
        }

        runner.login(session).await?;

        let mut state = slot.state.write();
        state.generation += 1;
        state.authenticated_at = Some(Utc::now());
        state.reauthentications += 1;
        info!(
            "Re-authenticated {}@{} (generation {})",
            session.principal(),
            session.endpoint(),
            state.generation
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::testing::{session, ScriptedRunner};

    #[tokio::test]
    async fn test_reauthenticate_bumps_generation() {
        let registry = SessionRegistry::new();
        let runner = ScriptedRunner::new();
        let session = session();

        assert_eq!(registry.generation(&session.key()), 0);
        registry.reauthenticate(&runner, &session, 0).await.unwrap();

        let state = registry.state(&session.key()).unwrap();
        assert_eq!(state.generation, 1);
        assert_eq!(state.reauthentications, 1);
        assert!(state.authenticated_at.is_some());
        assert_eq!(runner.logins(), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_skips_login() {
        let registry = SessionRegistry::new();
        let runner = ScriptedRunner::new();
        let session = session();

        registry.reauthenticate(&runner, &session, 0).await.unwrap();
        // A caller that started before the first login must not log in again
        registry.reauthenticate(&runner, &session, 0).await.unwrap();

        assert_eq!(runner.logins(), 1);
        assert_eq!(registry.generation(&session.key()), 1);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_generation() {
        let registry = SessionRegistry::new();
        let runner = ScriptedRunner::new().failing_login();
        let session = session();

        assert!(registry.reauthenticate(&runner, &session, 0).await.is_err());
        assert_eq!(registry.generation(&session.key()), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sessions_keyed_by_endpoint_and_principal() {
        let registry = SessionRegistry::new();
        let a = SessionContext::new("https://vc-a", "admin", "pw").unwrap();
        let b = SessionContext::new("https://vc-b", "admin", "pw").unwrap();

        registry.slot(a.key());
        registry.slot(b.key());
        registry.slot(a.key());
        assert_eq!(registry.len(), 2);
    }
}
