use std::fmt;

/// Failures that can occur while provisioning a debuggee (§7, `ProvisionError`).
///
/// Surfaced only by `create_session`: once a session exists, provisioning is
/// done and any further failure belongs to [`EngineError`](crate::engine::EngineError).
#[derive(Debug)]
pub enum ProvisionError {
    /// The project directory, entry script, or generated manifest could not
    /// be written to disk.
    SetupFailed(String),
    /// The debuggee process could not be spawned.
    SpawnFailed(String),
    /// The debuggee did not open its discovery endpoint within the startup
    /// timeout.
    StartupTimeout,
    /// The discovery endpoint was reachable but returned no usable target
    /// with a `webSocketDebuggerUrl` after exhausting all retries.
    DiscoveryExhausted { attempts: u32 },
    /// The discovered WebSocket endpoint could not be connected to.
    TransportFailed(String),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetupFailed(msg) => write!(f, "sandbox setup failed: {msg}"),
            Self::SpawnFailed(msg) => write!(f, "failed to spawn debuggee process: {msg}"),
            Self::StartupTimeout => write!(f, "debuggee did not become ready in time"),
            Self::DiscoveryExhausted { attempts } => {
                write!(f, "discovery endpoint gave no target after {attempts} attempts")
            }
            Self::TransportFailed(msg) => write!(f, "could not connect to debuggee transport: {msg}"),
        }
    }
}

impl std::error::Error for ProvisionError {}

impl From<ProvisionError> for crate::error::AppError {
    fn from(e: ProvisionError) -> Self {
        use crate::error::ExitCode;
        let code = match &e {
            Self::SetupFailed(_) | Self::SpawnFailed(_) => ExitCode::GeneralError,
            Self::StartupTimeout => ExitCode::TimeoutError,
            Self::DiscoveryExhausted { .. } | Self::TransportFailed(_) => ExitCode::ConnectionError,
        };
        Self {
            message: e.to_string(),
            code,
        }
    }
}
