//! The tool façade (§4.G): the three operations an external driver calls —
//! `create_session`, `execute_commands`, `close_session` — each wrapping the
//! engine/registry/provisioner and mapping failures to an `{error,
//! stack_trace}` envelope.
//!
//! Grounded on `examples/original_source/src/mcp.py`'s three tool functions:
//! same three operations, same try/except-to-envelope shape. Rust has no
//! `traceback.format_exc()` equivalent worth fabricating, so `stack_trace`
//! is always omitted rather than faked.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::cdp::ResultItem;
use crate::engine::Session;
use crate::registry::SessionRegistry;
use crate::sandbox::SandboxProvisioner;

#[derive(Debug, Serialize)]
pub struct CreateSessionResult {
    pub session_id: String,
    pub execution_result: Vec<ResultItem>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteCommandsResult {
    pub execution_result: Vec<ResultItem>,
}

#[derive(Debug, Serialize)]
pub struct CloseSessionResult {
    pub status: String,
}

/// The envelope returned in place of a successful result (§6).
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl ErrorEnvelope {
    fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), stack_trace: None }
    }
}

/// Wires the provisioner, the session engine, and the registry together
/// behind three plain async functions.
///
/// Generic over one concrete `SandboxProvisioner` — see
/// `sandbox::SandboxProvisioner`'s doc comment for why this isn't boxed.
pub struct ToolFacade<P: SandboxProvisioner> {
    provisioner: P,
    registry: Arc<SessionRegistry>,
    default_timeout: Duration,
    connect_timeout: Duration,
    channel_capacity: usize,
}

impl<P: SandboxProvisioner> ToolFacade<P> {
    #[must_use]
    pub fn new(
        provisioner: P,
        registry: Arc<SessionRegistry>,
        default_timeout: Duration,
        connect_timeout: Duration,
        channel_capacity: usize,
    ) -> Self {
        Self {
            provisioner,
            registry,
            default_timeout,
            connect_timeout,
            channel_capacity,
        }
    }

    /// Provision a debuggee, connect a session, and run it through
    /// `initialize`. `timeout` overrides the facade's default per-operation
    /// timeout for the lifetime of the resulting session.
    pub async fn create_session(
        &self,
        code: &str,
        timeout_secs: Option<u64>,
    ) -> Result<CreateSessionResult, ErrorEnvelope> {
        let op_timeout = timeout_secs.map_or(self.default_timeout, Duration::from_secs);

        let provisioned = self
            .provisioner
            .provision(code)
            .await
            .map_err(|e| ErrorEnvelope::new(e.to_string()))?;

        let session = Session::connect(
            provisioned.session_id,
            &provisioned.transport_url,
            provisioned.handle,
            op_timeout,
            self.connect_timeout,
            self.channel_capacity,
        )
        .await
        .map_err(|e| ErrorEnvelope::new(e.to_string()))?;

        let execution_result = match session.initialize().await {
            Ok(items) => items,
            Err(e) => {
                session.close().await;
                return Err(ErrorEnvelope::new(e.to_string()));
            }
        };

        let session_id = session.id().to_owned();
        self.registry.register(session).await;
        Ok(CreateSessionResult { session_id, execution_result })
    }

    /// Drive an existing session through a batch of CDP commands.
    pub async fn execute_commands(
        &self,
        session_id: &str,
        commands: Vec<(String, Option<Value>)>,
    ) -> Result<ExecuteCommandsResult, ErrorEnvelope> {
        let Some(session) = self.registry.get(session_id).await else {
            return Err(ErrorEnvelope::new(format!("Session {session_id} not found")));
        };
        let execution_result = session
            .execute_batch(commands, false)
            .await
            .map_err(|e| ErrorEnvelope::new(e.to_string()))?;
        Ok(ExecuteCommandsResult { execution_result })
    }

    /// Close and forget a session.
    pub async fn close_session(&self, session_id: &str) -> Result<CloseSessionResult, ErrorEnvelope> {
        let Some(session) = self.registry.remove(session_id).await else {
            return Err(ErrorEnvelope::new(format!("Session {session_id} not found")));
        };
        session.close().await;
        Ok(CloseSessionResult { status: format!("Session {session_id} closed.") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ProvisionError, Provisioned};

    struct FailingProvisioner;

    impl SandboxProvisioner for FailingProvisioner {
        async fn provision(&self, _code: &str) -> Result<Provisioned, ProvisionError> {
            Err(ProvisionError::SpawnFailed("no node binary configured in test".into()))
        }
    }

    fn facade() -> ToolFacade<FailingProvisioner> {
        ToolFacade::new(
            FailingProvisioner,
            Arc::new(SessionRegistry::new()),
            Duration::from_secs(30),
            Duration::from_secs(5),
            64,
        )
    }

    #[tokio::test]
    async fn create_session_surfaces_provision_error_envelope() {
        let facade = facade();
        let err = facade.create_session("debugger;", None).await.unwrap_err();
        assert!(err.error.contains("no node binary"));
        assert!(err.stack_trace.is_none());
    }

    #[tokio::test]
    async fn execute_commands_on_missing_session_is_an_error_envelope() {
        let facade = facade();
        let err = facade
            .execute_commands("nonexistent", vec![("Debugger.resume".into(), None)])
            .await
            .unwrap_err();
        assert!(err.error.contains("not found"));
    }

    #[tokio::test]
    async fn close_session_on_missing_session_is_an_error_envelope() {
        let facade = facade();
        let err = facade.close_session("nonexistent").await.unwrap_err();
        assert!(err.error.contains("not found"));
    }
}
