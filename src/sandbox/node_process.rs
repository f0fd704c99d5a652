//! The reference sandbox provisioner: a local Node.js child process.
//!
//! Process management follows a `TempDir`-with-`Drop`-based-cleanup shape
//! (`random_suffix`, poll-until-ready), with the same `--inspect-wait`/
//! warm-up/retry constants as the reference Node.js debuggee setup
//! (§4.E, §6).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{info, warn};

use super::discovery::discover_websocket_url;
use super::{DebuggeeHandle, ProvisionError, Provisioned, SandboxProvisioner};

/// Configuration for [`LocalNodeProvisioner`].
#[derive(Debug, Clone)]
pub struct NodeProvisionerConfig {
    /// Path to (or name of) the `node` binary used to run `npx tsx`.
    pub node_path: PathBuf,
    /// How long to wait for the debuggee's discovery endpoint to appear
    /// before giving up (distinct from the fixed warm-up/retry schedule in
    /// `discovery`, which bounds the polling loop itself).
    pub startup_timeout: Duration,
    /// The host-side project directory supplied on the CLI, if any. Its
    /// contents (besides the entry script) are copied alongside the entry
    /// script, preserving the original's `/app/<package-name>/` mount
    /// convention; `node_modules` is skipped.
    pub project_path: Option<PathBuf>,
}

impl Default for NodeProvisionerConfig {
    fn default() -> Self {
        Self {
            node_path: PathBuf::from("node"),
            startup_timeout: Duration::from_secs(20),
            project_path: None,
        }
    }
}

/// A local Node.js (via `tsx`) child process provisioner.
///
/// Satisfies the §4.E contract without any container/image machinery: the
/// entry script is written to a temp directory and run directly with
/// `--inspect-wait=127.0.0.1:0`, which starts the debuggee with the
/// debugger waiting — exactly the precondition `initialize`'s
/// `Runtime.runIfWaitingForDebugger` call depends on.
pub struct LocalNodeProvisioner {
    config: NodeProvisionerConfig,
}

impl LocalNodeProvisioner {
    #[must_use]
    pub fn new(config: NodeProvisionerConfig) -> Self {
        Self { config }
    }
}

impl SandboxProvisioner for LocalNodeProvisioner {
    async fn provision(&self, code: &str) -> Result<Provisioned, ProvisionError> {
        let temp_dir = TempProjectDir::create()?;
        let package_name = self.write_project(&temp_dir, code)?;
        info!(dir = %temp_dir.path.display(), package_name, "provisioned sandbox directory");

        let port = find_available_port()
            .map_err(|e| ProvisionError::SpawnFailed(format!("could not reserve a port: {e}")))?;

        let entry_path = temp_dir.path.join("entrypoint.ts");
        let mut cmd = Command::new("npx");
        cmd.arg("tsx")
            .arg(format!("--inspect-wait=127.0.0.1:{port}"))
            .arg("--enable-source-maps")
            .arg(&entry_path)
            .current_dir(&temp_dir.path)
            .env("PATH", node_path_env(&self.config.node_path))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| ProvisionError::SpawnFailed(format!("failed to spawn tsx: {e}")))?;

        let transport_url =
            match tokio::time::timeout(self.config.startup_timeout, discover_websocket_url("127.0.0.1", port))
                .await
            {
                Ok(Ok(url)) => url,
                Ok(Err(e)) => {
                    warn!(error = %e, "debuggee discovery failed");
                    return Err(e);
                }
                Err(_) => return Err(ProvisionError::StartupTimeout),
            };

        let session_id = uuid::Uuid::new_v4().simple().to_string();
        info!(session_id, %transport_url, "debuggee ready");

        Ok(Provisioned {
            handle: Box::new(NodeDebuggee {
                child: Some(child),
                _temp_dir: temp_dir,
            }),
            transport_url,
            session_id,
        })
    }
}

impl LocalNodeProvisioner {
    /// Write the entry script plus a generated `package.json` into `dir`,
    /// copying the supporting project (if configured) alongside it.
    /// Returns the package name used (read from the project's own
    /// `package.json`, or a generated placeholder).
    fn write_project(&self, dir: &TempProjectDir, code: &str) -> Result<String, ProvisionError> {
        std::fs::write(dir.path.join("entrypoint.ts"), code)
            .map_err(|e| ProvisionError::SetupFailed(format!("writing entrypoint.ts: {e}")))?;

        let package_name = self
            .config
            .project_path
            .as_deref()
            .and_then(read_package_name)
            .unwrap_or_else(|| format!("jsts-debugger-sandbox-{}", random_suffix()));

        if let Some(project_path) = &self.config.project_path {
            copy_dir_skip_node_modules(project_path, &dir.path).map_err(|e| {
                ProvisionError::SetupFailed(format!(
                    "copying project from {}: {e}",
                    project_path.display()
                ))
            })?;
        }

        let manifest = format!(
            "{{\n  \"name\": \"{package_name}\",\n  \"private\": true,\n  \"type\": \"module\"\n}}\n"
        );
        std::fs::write(dir.path.join("package.json"), manifest)
            .map_err(|e| ProvisionError::SetupFailed(format!("writing package.json: {e}")))?;

        Ok(package_name)
    }
}

/// A Node.js child process debuggee, killed and cleaned up on `terminate`
/// or drop.
struct NodeDebuggee {
    child: Option<tokio::process::Child>,
    _temp_dir: TempProjectDir,
}

impl DebuggeeHandle for NodeDebuggee {
    fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}

impl Drop for NodeDebuggee {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// A temporary project directory, removed on drop.
struct TempProjectDir {
    path: PathBuf,
}

impl TempProjectDir {
    fn create() -> Result<Self, ProvisionError> {
        let path = std::env::temp_dir().join(format!("jsts-debugger-{}", random_suffix()));
        std::fs::create_dir_all(&path)
            .map_err(|e| ProvisionError::SetupFailed(format!("creating temp dir: {e}")))?;
        Ok(Self { path })
    }
}

impl Drop for TempProjectDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

#[derive(Deserialize)]
struct PackageJsonName {
    name: Option<String>,
}

fn read_package_name(project_path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(project_path.join("package.json")).ok()?;
    let parsed: PackageJsonName = serde_json::from_str(&contents).ok()?;
    parsed.name
}

fn copy_dir_skip_node_modules(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name == "node_modules" || file_name == ".git" {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&file_name);
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_skip_node_modules(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

fn random_suffix() -> String {
    let mut buf = [0u8; 8];
    if let Ok(mut f) = std::fs::File::open("/dev/urandom") {
        if f.read_exact(&mut buf).is_ok() {
            return hex_encode(&buf);
        }
    }
    let pid = std::process::id();
    let addr = &raw const buf as usize;
    format!("{pid:x}-{addr:x}")
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

fn find_available_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// `npx` needs to find `node` on `PATH`; prepend the configured node
/// binary's directory if it isn't just the bare `"node"` lookup name.
fn node_path_env(node_path: &Path) -> std::ffi::OsString {
    let existing = std::env::var_os("PATH").unwrap_or_default();
    if node_path == Path::new("node") {
        return existing;
    }
    let Some(dir) = node_path.parent() else {
        return existing;
    };
    let mut paths = vec![dir.to_path_buf()];
    paths.extend(std::env::split_paths(&existing));
    std::env::join_paths(paths).unwrap_or(existing)
}
