use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cdp::{CdpEvent, ResultItem, TransportCommand, TransportHandle, spawn_transport};
use crate::sandbox::DebuggeeHandle;
use crate::taxonomy;

use super::error::EngineError;

/// The three-state machine of §4.D.7. No operation returns a session to a
/// prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Domains unenabled; `initialize` has not yet been called.
    Attached,
    /// Domains enabled, runtime started; normal operating state.
    Armed,
    /// Terminal: no further commands are accepted.
    Done,
}

/// One debuggee, one transport, and the engine state needed to drive it
/// (§3 "Session").
pub struct Session {
    id: String,
    transport: TransportHandle,
    event_rx: Mutex<mpsc::UnboundedReceiver<Option<CdpEvent>>>,
    debuggee: Mutex<Option<Box<dyn DebuggeeHandle>>>,
    default_timeout: Duration,
    done: AtomicBool,
    state: Mutex<SessionState>,
    /// Serializes public operations on this session (§5): the façade is
    /// expected to issue one `execute` at a time, but the engine defends
    /// against accidental concurrent calls by serializing rather than
    /// racing.
    op_lock: Mutex<()>,
}

impl Session {
    /// Connect to `transport_url` and construct a new session in the
    /// `Attached` state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::TransportError` if the initial WebSocket
    /// connection cannot be established.
    pub async fn connect(
        id: String,
        transport_url: &str,
        debuggee: Box<dyn DebuggeeHandle>,
        default_timeout: Duration,
        connect_timeout: Duration,
        channel_capacity: usize,
    ) -> Result<Arc<Self>, EngineError> {
        let (transport, event_rx) =
            spawn_transport(transport_url, channel_capacity, connect_timeout).await?;
        info!(session_id = %id, "session connected");
        Ok(Arc::new(Self {
            id,
            transport,
            event_rx: Mutex::new(event_rx),
            debuggee: Mutex::new(Some(debuggee)),
            default_timeout,
            done: AtomicBool::new(false),
            state: Mutex::new(SessionState::Attached),
            op_lock: Mutex::new(()),
        }))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    // -- 4.D.1 --------------------------------------------------------------

    /// Reserve a fresh id, write the command frame, and wait for its
    /// response (§4.D.1).
    ///
    /// # Errors
    ///
    /// `EngineError::SessionClosed` if the session is already done;
    /// otherwise whatever the transport reports (`Timeout`, `ProtocolError`,
    /// `TransportError`).
    async fn send_and_await(&self, method: &str, params: Option<Value>) -> Result<Value, EngineError> {
        if self.is_done() {
            return Err(EngineError::SessionClosed);
        }
        let deadline = Instant::now() + self.default_timeout;
        let result = self.transport.send_and_await(method, params, deadline).await;
        if let Err(crate::cdp::CdpError::ConnectionClosed) = &result {
            self.mark_done().await;
        }
        Ok(result?)
    }

    // -- 4.D.2 --------------------------------------------------------------

    /// Drain every event currently queued, without blocking (§4.D.2).
    async fn drain_pending_events(&self) -> Vec<CdpEvent> {
        let mut rx = self.event_rx.lock().await;
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {
                    self.mark_done().await;
                    break;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
        events
    }

    // -- 4.D.3 --------------------------------------------------------------

    /// Block until the next pause/termination marker, the sentinel, or
    /// `timeout` elapses (§4.D.3). Never fails: a timeout here is benign
    /// and simply truncates the batch (§7).
    async fn wait_for_quiescence(&self, timeout: Duration) -> Vec<CdpEvent> {
        let mut rx = self.event_rx.lock().await;
        let mut buffer = Vec::new();
        let deadline = Instant::now() + timeout;

        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(Some(event))) => {
                    let is_marker = taxonomy::is_quiescence_marker(&event.method);
                    buffer.push(event);
                    if is_marker {
                        break;
                    }
                }
                Ok(Some(None)) => {
                    drop(rx);
                    self.mark_done().await;
                    break;
                }
                Ok(None) => {
                    drop(rx);
                    self.mark_done().await;
                    break;
                }
                Err(_) => {
                    warn!(session_id = %self.id, "wait_for_quiescence timed out");
                    break;
                }
            }
        }
        buffer
    }

    async fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
        *self.state.lock().await = SessionState::Done;
    }

    // -- 4.D.4 ----------------------------------------------------------

    /// Run a single command to completion, returning every result item it
    /// produced in observation order (§4.D.4).
    ///
    /// # Errors
    ///
    /// `EngineError::SessionClosed` if the session is done,
    /// `EngineError::UnknownCommand` if `method` is not allowed and
    /// `allow_unknown` is false, or any error `send_and_await` raises.
    pub async fn execute(
        &self,
        method: &str,
        params: Option<Value>,
        allow_unknown: bool,
    ) -> Result<Vec<ResultItem>, EngineError> {
        let _guard = self.op_lock.lock().await;
        self.execute_locked(method, params, allow_unknown).await
    }

    async fn execute_locked(
        &self,
        method: &str,
        params: Option<Value>,
        allow_unknown: bool,
    ) -> Result<Vec<ResultItem>, EngineError> {
        if self.is_done() {
            return Err(EngineError::SessionClosed);
        }
        if !allow_unknown && !taxonomy::is_allowed_command(method) {
            return Err(EngineError::UnknownCommand(method.to_owned()));
        }

        let mut items: Vec<ResultItem> = self
            .drain_pending_events()
            .await
            .into_iter()
            .map(ResultItem::Event)
            .collect();

        let result = self.send_and_await(method, params).await?;
        if !is_empty_result(&result) {
            items.push(ResultItem::CommandResult(result));
        }

        if taxonomy::may_cause_run(method) {
            let events = self.wait_for_quiescence(self.default_timeout).await;
            items.extend(events.into_iter().map(ResultItem::Event));
        }

        Ok(items)
    }

    // -- 4.D.5 ----------------------------------------------------------

    /// Sequentially compose `execute` calls, concatenating their result
    /// lists. Stops and propagates the first failure without rolling back
    /// prior commands (§4.D.5).
    ///
    /// # Errors
    ///
    /// Whatever the first failing `execute` call returns.
    pub async fn execute_batch(
        &self,
        commands: Vec<(String, Option<Value>)>,
        allow_unknown: bool,
    ) -> Result<Vec<ResultItem>, EngineError> {
        let _guard = self.op_lock.lock().await;
        let mut all = Vec::new();
        for (method, params) in commands {
            let items = self.execute_locked(&method, params, allow_unknown).await?;
            all.extend(items);
        }
        Ok(all)
    }

    // -- 4.D.6 ----------------------------------------------------------

    /// Enable the standard domains, then resume a waiting debuggee,
    /// transitioning `Attached` → `Armed` (§4.D.6, §4.D.7).
    ///
    /// # Errors
    ///
    /// Whatever the underlying `execute` calls raise.
    pub async fn initialize(&self) -> Result<Vec<ResultItem>, EngineError> {
        let _guard = self.op_lock.lock().await;
        let mut items = Vec::new();
        for method in taxonomy::INITIALIZE_ENABLE_COMMANDS {
            items.extend(self.execute_locked(method, None, false).await?);
        }
        *self.state.lock().await = SessionState::Armed;
        items.extend(
            self.execute_locked("Runtime.runIfWaitingForDebugger", None, false)
                .await?,
        );
        Ok(items)
    }

    // -- 4.F / close ------------------------------------------------------

    /// Tear down the session: cancel the demultiplexer, close the
    /// transport, and terminate the debuggee. Idempotent — a second call is
    /// a no-op on the transport (§8 "Closure idempotence").
    pub async fn close(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.state.lock().await = SessionState::Done;
        let _ = self.transport.send(TransportCommand::Shutdown).await;
        if let Some(mut handle) = self.debuggee.lock().await.take() {
            handle.terminate();
        }
        info!(session_id = %self.id, "session closed");
    }
}

/// A command result is "non-empty" when it's neither `null` nor `{}`
/// (§4.D.4 step 3) — CDP's domain-enable commands respond with `{}`, which
/// the caller has no use for as a surfaced `command_result`.
fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_detection() {
        assert!(is_empty_result(&Value::Null));
        assert!(is_empty_result(&serde_json::json!({})));
        assert!(!is_empty_result(&serde_json::json!({"value": 3})));
        assert!(!is_empty_result(&serde_json::json!([])));
    }
}
