//! Host CLI: provisions debuggees locally via [`jsts_debugger::sandbox::LocalNodeProvisioner`]
//! and exposes the tool façade (§4.G, §6) as a line-oriented JSON driver over
//! stdin/stdout, mirroring a small single-positional-arg server entry point
//! rather than a full agent-facing RPC server.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jsts_debugger::config;
use jsts_debugger::error::{AppError, ExitCode};
use jsts_debugger::facade::ToolFacade;
use jsts_debugger::registry::SessionRegistry;
use jsts_debugger::sandbox::{LocalNodeProvisioner, NodeProvisionerConfig};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.exit();
        }
    };

    if let Err(e) = run(&cli).await {
        e.print_json_stderr();
        #[allow(clippy::cast_possible_truncation)]
        std::process::exit(e.code as i32);
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    if !cli.project_path.exists() {
        return Err(AppError {
            message: format!("project path does not exist: {}", cli.project_path.display()),
            code: ExitCode::GeneralError,
        });
    }

    let (config_path, config_file) = config::load_config(cli.config.as_deref());
    let resolved = config::resolve_config(&config_file, config_path);

    let provisioner = LocalNodeProvisioner::new(NodeProvisionerConfig {
        node_path: resolved.provisioner.node_path.clone().into(),
        startup_timeout: resolved.provisioner.startup_timeout(),
        project_path: Some(cli.project_path.clone()),
    });

    let registry = Arc::new(SessionRegistry::new());
    let facade = Arc::new(ToolFacade::new(
        provisioner,
        Arc::clone(&registry),
        resolved.session.timeout(),
        std::time::Duration::from_secs(10),
        resolved.session.channel_capacity,
    ));

    let shutdown_registry = Arc::clone(&registry);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, closing all sessions");
            shutdown_registry.shutdown_all().await;
            std::process::exit(0);
        }
    });

    run_driver_loop(&facade).await;
    registry.shutdown_all().await;
    Ok(())
}

/// One line of driver input: `{"op": "...", ...}` dispatched to the façade.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverRequest {
    CreateSession {
        code: String,
        #[serde(default)]
        timeout: Option<u64>,
    },
    ExecuteCommands {
        session_id: String,
        commands: Vec<CommandSpec>,
    },
    CloseSession {
        session_id: String,
    },
}

/// A single `(method, params)` CDP command as read from the driver (§6).
#[derive(Debug, Deserialize)]
struct CommandSpec {
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// Read newline-delimited JSON requests from stdin, dispatch each to the
/// façade, and write the newline-delimited JSON response (success payload or
/// error envelope) to stdout. Exits the loop at EOF.
async fn run_driver_loop<P: jsts_debugger::sandbox::SandboxProvisioner>(
    facade: &ToolFacade<P>,
) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response_json = match serde_json::from_str::<DriverRequest>(trimmed) {
            Ok(request) => dispatch(facade, request).await,
            Err(e) => serde_json::to_string(&ErrorLine {
                error: format!("malformed driver request: {e}"),
            })
            .unwrap_or_else(|_| r#"{"error":"malformed driver request"}"#.to_string()),
        };

        if writeln!(stdout, "{response_json}").is_err() || stdout.flush().is_err() {
            break;
        }
    }
}

#[derive(Serialize)]
struct ErrorLine {
    error: String,
}

async fn dispatch<P: jsts_debugger::sandbox::SandboxProvisioner>(
    facade: &ToolFacade<P>,
    request: DriverRequest,
) -> String {
    let result = match request {
        DriverRequest::CreateSession { code, timeout } => {
            serialize_outcome(facade.create_session(&code, timeout).await)
        }
        DriverRequest::ExecuteCommands { session_id, commands } => {
            let commands = commands
                .into_iter()
                .map(|c| (c.method, c.params))
                .collect();
            serialize_outcome(facade.execute_commands(&session_id, commands).await)
        }
        DriverRequest::CloseSession { session_id } => {
            serialize_outcome(facade.close_session(&session_id).await)
        }
    };
    result
}

fn serialize_outcome<T: Serialize, E: Serialize>(outcome: Result<T, E>) -> String {
    let value = match outcome {
        Ok(ok) => serde_json::to_string(&ok),
        Err(err) => serde_json::to_string(&err),
    };
    value.unwrap_or_else(|e| format!(r#"{{"error":"failed to serialize response: {e}"}}"#))
}
