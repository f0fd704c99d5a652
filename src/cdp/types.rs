use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing CDP command (client to debuggee).
///
/// Unlike a browser-multiplexing transport, each session here owns exactly
/// one debuggee, so there is no `sessionId` field to thread through outbound
/// frames.
#[derive(Debug, Serialize)]
pub struct CdpCommand {
    /// Unique message ID for response correlation.
    pub id: u64,
    /// CDP method name (e.g., `Debugger.resume`).
    pub method: String,
    /// Optional parameters for the command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Raw incoming CDP message before classification.
///
/// This is the union of response and event fields — every incoming
/// WebSocket message is deserialized into this type first, then
/// classified via [`classify`](Self::classify).
#[derive(Debug, Deserialize)]
pub struct RawCdpMessage {
    /// Present for responses; absent for events.
    pub id: Option<u64>,
    /// Present for events.
    pub method: Option<String>,
    /// Event parameters.
    pub params: Option<Value>,
    /// Successful response payload.
    pub result: Option<Value>,
    /// Protocol error payload.
    pub error: Option<CdpProtocolError>,
}

/// CDP protocol error payload returned by the debuggee.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpProtocolError {
    /// The CDP error code (e.g., -32000).
    pub code: i64,
    /// Human-readable error description.
    pub message: String,
}

/// Parsed CDP response (has an `id`).
#[derive(Debug)]
pub struct CdpResponse {
    /// The message ID that correlates to the sent command.
    pub id: u64,
    /// The result: either a successful value or a protocol error.
    pub result: Result<Value, CdpProtocolError>,
}

/// Parsed CDP event (no `id`, has `method`).
#[derive(Debug, Clone, Serialize)]
pub struct CdpEvent {
    /// The CDP event method name (e.g., `Debugger.paused`).
    pub method: String,
    /// Event parameters.
    pub params: Value,
}

/// Classification of a raw CDP message.
pub enum MessageKind {
    /// A response to a previously sent command.
    Response(CdpResponse),
    /// An asynchronous event from the debuggee.
    Event(CdpEvent),
}

impl RawCdpMessage {
    /// Classify this raw message as either a response or an event.
    ///
    /// Messages with an `id` field are responses; messages with a `method`
    /// field but no `id` are events. Returns `None` if the message cannot
    /// be classified (neither `id` nor `method` present).
    #[must_use]
    pub fn classify(self) -> Option<MessageKind> {
        if let Some(id) = self.id {
            let result = if let Some(error) = self.error {
                Err(error)
            } else {
                Ok(self.result.unwrap_or(Value::Null))
            };
            Some(MessageKind::Response(CdpResponse { id, result }))
        } else if let Some(method) = self.method {
            Some(MessageKind::Event(CdpEvent {
                method,
                params: self.params.unwrap_or(Value::Null),
            }))
        } else {
            None
        }
    }
}

/// The tagged result union emitted to callers of `execute`/`execute_batch`.
///
/// Order reflects the debugger's observed temporal order: events queued
/// before a command's response are emitted before that response's
/// `command_result`, and resume-triggered events follow it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ResultItem {
    /// The return payload of a command that was sent.
    CommandResult(Value),
    /// A raw CDP event observed while draining the queue.
    Event(CdpEvent),
}
