//! The sandbox provisioner contract (§4.E) and its reference implementation.
//!
//! The session engine never builds a sandbox itself; it asks a
//! [`SandboxProvisioner`] for one. Swapping the reference
//! [`LocalNodeProvisioner`](node_process::LocalNodeProvisioner) for a
//! container-based provisioner requires no change to `engine`.

mod discovery;
mod error;
pub mod node_process;

pub use error::ProvisionError;
pub use node_process::{LocalNodeProvisioner, NodeProvisionerConfig};

/// A live debuggee process, used only to terminate it.
///
/// Implementations must make `terminate` idempotent: the engine's `close()`
/// may call it exactly once, but a provisioner backing multiple sessions
/// (e.g. one container per session) may reasonably want to no-op on a
/// double call too.
pub trait DebuggeeHandle: Send + Sync {
    /// Terminate the debuggee process.
    fn terminate(&mut self);
}

/// What the session engine needs from a provisioner to create a session
/// (§4.E item 1-3).
pub struct Provisioned {
    /// A handle representing the live debuggee process.
    pub handle: Box<dyn DebuggeeHandle>,
    /// The CDP WebSocket transport URL.
    pub transport_url: String,
    /// A short identifier usable as the session id.
    pub session_id: String,
}

/// The abstract contract the session engine consumes to obtain a debuggee.
///
/// The provisioner guarantees the debuggee starts with the debugger
/// *waiting* (`--inspect-wait` in the reference implementation), so the
/// first meaningful event is controlled by the caller's
/// `Runtime.runIfWaitingForDebugger`.
///
/// Not a `dyn`-safe trait (it carries a native `async fn`): the engine and
/// façade are generic over one concrete provisioner rather than boxing it,
/// since a process only ever runs one kind of provisioner.
pub trait SandboxProvisioner: Send + Sync {
    /// Provision a running debuggee executing `code` and return the
    /// handle/URL/id triple the engine needs.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] if the sandbox cannot be built, the
    /// debuggee process cannot be spawned, or its transport cannot be
    /// discovered within the startup timeout.
    async fn provision(&self, code: &str) -> Result<Provisioned, ProvisionError>;
}
