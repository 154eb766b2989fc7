//! Active session registry
//!
//! One handle per live connection, keyed by connection id. The registry is
//! the only place the server can reach into running sessions, which it does
//! for the status endpoint and for shutdown.

use crate::session::engine::EngineSignal;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// What the registry knows about one live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub connection_id: String,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub control: mpsc::Sender<EngineSignal>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. A second registration under a live id is
    /// refused rather than silently replacing the running session.
    pub async fn insert(&self, handle: SessionHandle) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&handle.connection_id) {
            bail!("Session '{}' is already registered", handle.connection_id);
        }
        debug!(connection = %handle.connection_id, "session registered");
        sessions.insert(handle.connection_id.clone(), handle);
        Ok(())
    }

    pub async fn remove(&self, connection_id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(connection_id);
        if removed.is_some() {
            debug!(connection = %connection_id, "session removed");
        }
        removed
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Ask every live session to tear down. Used on server shutdown so each
    /// engine runs its normal end-of-call path.
    pub async fn terminate_all(&self) {
        let sessions = self.sessions.read().await;
        if sessions.is_empty() {
            return;
        }
        info!(count = sessions.len(), "terminating active sessions");
        for handle in sessions.values() {
            let _ = handle.control.send(EngineSignal::Terminate).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: &str) -> (SessionHandle, mpsc::Receiver<EngineSignal>) {
        let (tx, rx) = mpsc::channel(4);
        (
            SessionHandle {
                connection_id: id.to_string(),
                user_id: None,
                agent_id: None,
                connected_at: Utc::now(),
                control: tx,
            },
            rx,
        )
    }

    #[test]
    fn test_insert_remove_and_count() {
        tokio_test::block_on(async {
            let registry = SessionRegistry::new();
            let (first, _rx1) = handle("conn-1");
            let (second, _rx2) = handle("conn-2");

            registry.insert(first).await.unwrap();
            registry.insert(second).await.unwrap();
            assert_eq!(registry.active_count().await, 2);

            assert!(registry.remove("conn-1").await.is_some());
            assert!(registry.remove("conn-1").await.is_none());
            assert_eq!(registry.active_count().await, 1);
        });
    }

    #[test]
    fn test_duplicate_id_is_refused() {
        tokio_test::block_on(async {
            let registry = SessionRegistry::new();
            let (first, _rx1) = handle("conn-1");
            let (dup, _rx2) = handle("conn-1");

            registry.insert(first).await.unwrap();
            assert!(registry.insert(dup).await.is_err());
            assert_eq!(registry.active_count().await, 1);
        });
    }

    #[test]
    fn test_terminate_all_signals_every_session() {
        tokio_test::block_on(async {
            let registry = SessionRegistry::new();
            let (first, mut rx1) = handle("conn-1");
            let (second, mut rx2) = handle("conn-2");
            registry.insert(first).await.unwrap();
            registry.insert(second).await.unwrap();

            registry.terminate_all().await;

            assert!(matches!(rx1.recv().await, Some(EngineSignal::Terminate)));
            assert!(matches!(rx2.recv().await, Some(EngineSignal::Terminate)));
        });
    }
}
