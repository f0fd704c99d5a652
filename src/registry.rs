//! The process-wide session registry (§4.F).
//!
//! Mirrors a `sessions` map plus a `close_all_sessions`/`atexit` hook; async
//! Rust has no `atexit`, so the equivalent shutdown sweep is triggered
//! explicitly by the host CLI's `tokio::signal::ctrl_c` handler (see
//! `main.rs`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::engine::Session;

/// A non-owning lookup table from session id to live session.
///
/// The registry holds a *non-owning* handle for lookup — `Arc<Session>` is
/// cheap to clone and the session's own `close()` is what actually tears
/// things down; `remove` just forgets the registry's reference.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Arc<Session>) {
        let id = session.id().to_owned();
        self.sessions.write().await.insert(id, session);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    #[must_use]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[must_use]
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Close every registered session. Individual close failures are logged
    /// but never abort the sweep — one stuck debuggee must not prevent the
    /// others from being cleaned up.
    pub async fn shutdown_all(&self) {
        let sessions: Vec<Arc<Session>> = {
            let mut map = self.sessions.write().await;
            map.drain().map(|(_, session)| session).collect()
        };
        info!(count = sessions.len(), "shutting down all registered sessions");
        for session in sessions {
            let id = session.id().to_owned();
            session.close().await;
            if session.is_done() {
                info!(session_id = %id, "session closed during shutdown sweep");
            } else {
                warn!(session_id = %id, "session did not report done after close during shutdown sweep");
            }
        }
    }
}
