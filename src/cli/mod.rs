#![allow(clippy::doc_markdown)]

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "jsts-debugger",
    version,
    about = "Remote JavaScript/TypeScript debugger driven over the Chrome DevTools Protocol",
    long_about = "jsts-debugger runs a JavaScript/TypeScript entry script under Node.js with the \
        inspector attached, then exposes a line-oriented JSON driver over stdin/stdout for \
        creating debugging sessions, executing CDP commands against them in run-until-quiescent \
        batches, and closing them.\n\n\
        The project path names the host-side Node.js/TypeScript project whose files (besides the \
        entry script itself) are made available to the debuggee.",
    term_width = 100
)]
pub struct Cli {
    /// Host-side path to the Node.js/TypeScript project being debugged.
    pub project_path: PathBuf,

    /// Path to a TOML config file, overriding the default search order.
    #[arg(long, env = "JSTS_DEBUGGER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_bare_project_path() {
        let cli = Cli::try_parse_from(["jsts-debugger", "/home/user/my-project"]).unwrap();
        assert_eq!(cli.project_path, PathBuf::from("/home/user/my-project"));
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_config_override() {
        let cli = Cli::try_parse_from([
            "jsts-debugger",
            "/home/user/my-project",
            "--config",
            "/tmp/custom.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/custom.toml")));
    }

    #[test]
    fn missing_project_path_is_an_error() {
        assert!(Cli::try_parse_from(["jsts-debugger"]).is_err());
    }
}
