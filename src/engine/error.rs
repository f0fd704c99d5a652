use std::fmt;

/// The session engine's error taxonomy (§7).
///
/// Only [`CdpError::ConnectionClosed`](crate::cdp::CdpError)-style transport
/// loss and an explicit `close()` ever mark a session done; every other
/// variant here is scoped to the one operation that produced it.
#[derive(Debug)]
pub enum EngineError {
    /// The session is already done; the operation was rejected.
    SessionClosed,
    /// `method` is not in the allowed set and the caller did not opt out.
    UnknownCommand(String),
    /// `send_and_await` exceeded its budget waiting for a response.
    Timeout { method: String },
    /// The debuggee returned a CDP `error` payload.
    ProtocolError(String),
    /// The underlying transport failed mid-session.
    TransportError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionClosed => write!(f, "session is closed"),
            Self::UnknownCommand(method) => write!(f, "unknown command: {method}"),
            Self::Timeout { method } => write!(f, "timed out waiting for response to {method}"),
            Self::ProtocolError(msg) => write!(f, "protocol error: {msg}"),
            Self::TransportError(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<crate::cdp::CdpError> for EngineError {
    fn from(e: crate::cdp::CdpError) -> Self {
        use crate::cdp::CdpError;
        match e {
            CdpError::CommandTimeout { method } => Self::Timeout { method },
            CdpError::Protocol { message, .. } => Self::ProtocolError(message),
            CdpError::ConnectionClosed => Self::SessionClosed,
            other => Self::TransportError(other.to_string()),
        }
    }
}

impl From<EngineError> for crate::error::AppError {
    fn from(e: EngineError) -> Self {
        use crate::error::ExitCode;
        let code = match &e {
            EngineError::SessionClosed => ExitCode::ConnectionError,
            EngineError::UnknownCommand(_) => ExitCode::GeneralError,
            EngineError::Timeout { .. } => ExitCode::TimeoutError,
            EngineError::ProtocolError(_) => ExitCode::ProtocolError,
            EngineError::TransportError(_) => ExitCode::ConnectionError,
        };
        Self {
            message: e.to_string(),
            code,
        }
    }
}
