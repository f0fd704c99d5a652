use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config structs (parsed from TOML)
// ---------------------------------------------------------------------------

/// Represents the parsed TOML config file. All fields optional.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub session: SessionConfig,
    pub provisioner: ProvisionerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout_secs: Option<u64>,
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub node_path: Option<String>,
    pub startup_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved config (all defaults filled in)
// ---------------------------------------------------------------------------

/// Fully resolved configuration with all defaults filled in.
#[derive(Debug, Serialize)]
pub struct ResolvedConfig {
    pub config_path: Option<PathBuf>,
    pub session: ResolvedSession,
    pub provisioner: ResolvedProvisioner,
}

#[derive(Debug, Serialize)]
pub struct ResolvedSession {
    pub timeout_secs: u64,
    pub channel_capacity: usize,
}

impl ResolvedSession {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Serialize)]
pub struct ResolvedProvisioner {
    pub node_path: String,
    pub startup_timeout_secs: u64,
}

impl ResolvedProvisioner {
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Config file search
// ---------------------------------------------------------------------------

/// Find the first config file that exists, checking locations in priority order.
///
/// Search order:
/// 1. `explicit_path` (from `--config` flag)
/// 2. `$JSTS_DEBUGGER_CONFIG` environment variable
/// 3. `./.jsts-debugger.toml` (project-local)
/// 4. `<config_dir>/jsts-debugger/config.toml` (XDG / platform config dir)
/// 5. `~/.jsts-debugger.toml` (home directory fallback)
#[must_use]
pub fn find_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    find_config_file_with(explicit_path, std::env::var("JSTS_DEBUGGER_CONFIG").ok())
}

/// Testable variant of [`find_config_file`] that accepts an explicit env value.
#[must_use]
pub fn find_config_file_with(
    explicit_path: Option<&Path>,
    env_config: Option<String>,
) -> Option<PathBuf> {
    // 1. Explicit --config path
    if let Some(p) = explicit_path {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    // 2. $JSTS_DEBUGGER_CONFIG
    if let Some(env_path) = env_config {
        let p = PathBuf::from(env_path);
        if p.exists() {
            return Some(p);
        }
    }

    // 3. ./.jsts-debugger.toml (project-local)
    let local = PathBuf::from(".jsts-debugger.toml");
    if local.exists() {
        return Some(local);
    }

    // 4. XDG / platform config dir
    if let Some(config_dir) = dirs::config_dir() {
        let xdg = config_dir.join("jsts-debugger").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }

    // 5. ~/.jsts-debugger.toml
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".jsts-debugger.toml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load and parse a config file. Returns the file path (if found) and the parsed config.
///
/// On parse errors, prints a warning to stderr and returns `ConfigFile::default()`.
#[must_use]
pub fn load_config(explicit_path: Option<&Path>) -> (Option<PathBuf>, ConfigFile) {
    let path = find_config_file(explicit_path);
    match &path {
        Some(p) => {
            let config = load_config_from(p);
            (path, config)
        }
        None => (None, ConfigFile::default()),
    }
}

/// Load and parse a config file from a specific path.
///
/// On parse errors, prints a warning to stderr and returns `ConfigFile::default()`.
#[must_use]
pub fn load_config_from(path: &Path) -> ConfigFile {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!(
                "warning: could not read config file {}: {e}",
                path.display()
            );
            return ConfigFile::default();
        }
    };

    parse_config(&contents, path)
}

/// Parse TOML content into a `ConfigFile`.
///
/// Uses a two-pass strategy: first tries strict parsing (to detect unknown keys),
/// then falls back to lenient parsing if strict fails due to unknown fields.
#[must_use]
pub fn parse_config(contents: &str, path: &Path) -> ConfigFile {
    // First pass: strict (deny_unknown_fields via a wrapper)
    match toml::from_str::<StrictConfigFile>(contents) {
        Ok(strict) => strict.into(),
        Err(strict_err) => {
            // Second pass: lenient
            match toml::from_str::<ConfigFile>(contents) {
                Ok(config) => {
                    // Strict failed but lenient succeeded → unknown keys
                    eprintln!(
                        "warning: unknown keys in config file {}: {strict_err}",
                        path.display()
                    );
                    config
                }
                Err(parse_err) => {
                    // Both failed → invalid TOML
                    eprintln!(
                        "warning: could not parse config file {}: {parse_err}",
                        path.display()
                    );
                    ConfigFile::default()
                }
            }
        }
    }
}

/// Strict variant used for the first-pass parse to detect unknown keys.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictConfigFile {
    #[serde(default)]
    session: StrictSessionConfig,
    #[serde(default)]
    provisioner: StrictProvisionerConfig,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictSessionConfig {
    timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictProvisionerConfig {
    node_path: Option<String>,
    startup_timeout_secs: Option<u64>,
}

impl From<StrictConfigFile> for ConfigFile {
    fn from(s: StrictConfigFile) -> Self {
        Self {
            session: SessionConfig {
                timeout_secs: s.session.timeout_secs,
                channel_capacity: s.session.channel_capacity,
            },
            provisioner: ProvisionerConfig {
                node_path: s.provisioner.node_path,
                startup_timeout_secs: s.provisioner.startup_timeout_secs,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Default per-operation session timeout, in seconds (§5).
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default event-queue channel capacity.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;
/// Default node binary lookup name.
const DEFAULT_NODE_PATH: &str = "node";
/// Default debuggee discovery startup timeout, in seconds (§6).
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 20;

/// Resolve a config file into a fully-populated `ResolvedConfig` with all defaults.
#[must_use]
pub fn resolve_config(file: &ConfigFile, config_path: Option<PathBuf>) -> ResolvedConfig {
    ResolvedConfig {
        config_path,
        session: ResolvedSession {
            timeout_secs: file.session.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            channel_capacity: file
                .session
                .channel_capacity
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        },
        provisioner: ResolvedProvisioner {
            node_path: file
                .provisioner
                .node_path
                .clone()
                .unwrap_or_else(|| DEFAULT_NODE_PATH.to_string()),
            startup_timeout_secs: file
                .provisioner
                .startup_timeout_secs
                .unwrap_or(DEFAULT_STARTUP_TIMEOUT_SECS),
        },
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
