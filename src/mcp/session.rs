//! Session table for the HTTP transport
//!
//! rmcp's `LocalSessionManager` runs one worker per session; this table wraps
//! it to add the bookkeeping the server needs: open count for `/health`, a
//! lookup for the session guard, bulk close at shutdown and lifecycle logs.
//! A session leaves the table on `DELETE`, when its worker stops (idle
//! timeout or transport failure), or on `clear`.

use chrono::{DateTime, Utc};
use futures::Stream;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::common::server_side_http::ServerSseMessage;
use rmcp::transport::streamable_http_server::session::local::{
    LocalSessionManager, LocalSessionManagerError, LocalSessionWorker, SessionConfig, SessionError,
};
use rmcp::transport::streamable_http_server::{SessionId, SessionManager};
use rmcp::transport::WorkerTransport;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

pub struct SessionTable {
    inner: LocalSessionManager,
    opened_at: RwLock<HashMap<SessionId, DateTime<Utc>>>,
}

impl SessionTable {
    /// Sessions with no traffic for `idle_timeout` are closed by their worker.
    pub fn new(idle_timeout: Duration) -> Self {
        let inner = LocalSessionManager {
            sessions: Default::default(),
            session_config: SessionConfig {
                keep_alive: Some(idle_timeout),
                ..SessionConfig::default()
            },
        };
        Self {
            inner,
            opened_at: RwLock::new(HashMap::new()),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.sessions.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every open session, returning how many there were.
    pub async fn clear(&self) -> usize {
        let ids: Vec<SessionId> = self.inner.sessions.read().await.keys().cloned().collect();
        for id in &ids {
            if let Err(e) = self.close_session(id).await {
                tracing::warn!(session = %id, error = %e, "Failed to close session");
            }
        }
        ids.len()
    }
}

impl SessionManager for SessionTable {
    type Error = LocalSessionManagerError;
    type Transport = WorkerTransport<LocalSessionWorker>;

    async fn create_session(&self) -> Result<(SessionId, Self::Transport), Self::Error> {
        let (id, transport) = self.inner.create_session().await?;
        self.opened_at.write().await.insert(id.clone(), Utc::now());
        tracing::info!(session = %id, "Session opened");
        Ok((id, transport))
    }

    async fn initialize_session(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> Result<ServerJsonRpcMessage, Self::Error> {
        self.inner.initialize_session(id, message).await
    }

    async fn has_session(&self, id: &SessionId) -> Result<bool, Self::Error> {
        self.inner.has_session(id).await
    }

    async fn close_session(&self, id: &SessionId) -> Result<(), Self::Error> {
        // Called again by the serving task once the worker stops; only the
        // first call finds the entry.
        let opened = self.opened_at.write().await.remove(id);
        if let Some(opened) = opened {
            let age_secs = (Utc::now() - opened).num_seconds();
            tracing::info!(session = %id, age_secs, "Session closed");
        }
        match self.inner.close_session(id).await {
            // The worker already stopped on its own (idle timeout)
            Err(LocalSessionManagerError::SessionError(SessionError::SessionServiceTerminated)) => Ok(()),
            other => other,
        }
    }

    async fn create_stream(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.inner.create_stream(id, message).await
    }

    async fn accept_message(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> Result<(), Self::Error> {
        self.inner.accept_message(id, message).await
    }

    async fn create_standalone_stream(
        &self,
        id: &SessionId,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.inner.create_standalone_stream(id).await
    }

    async fn resume(
        &self,
        id: &SessionId,
        last_event_id: String,
    ) -> Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error> {
        self.inner.resume(id, last_event_id).await
    }
}
