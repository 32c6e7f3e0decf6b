// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::Mode;

/// Command-line arguments for `assetpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetpipe",
    version,
    about = "Build static-site assets, then serve and live-reload them.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Assetpipe.toml` in the current working directory. When that
    /// file does not exist, the built-in pipeline is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the composed stages, but don't touch any file.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Override `[server].port` for the live preview.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Build once, serve the build directory and rebuild on change (default).
    Dev,
    /// Run the one-shot production build and exit.
    Build,
}

impl CliArgs {
    /// Pipeline mode selected by the subcommand; no subcommand means `dev`.
    pub fn mode(&self) -> Mode {
        match self.command {
            Some(Command::Build) => Mode::Build,
            Some(Command::Dev) | None => Mode::Dev,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_invocation_is_dev() {
        let args = CliArgs::try_parse_from(["assetpipe"]).unwrap();
        assert_eq!(args.mode(), Mode::Dev);
        assert!(args.config.is_none());
    }

    #[test]
    fn build_subcommand_selects_build_mode() {
        let args =
            CliArgs::try_parse_from(["assetpipe", "--config", "site.toml", "build", "--dry-run"])
                .unwrap();
        assert_eq!(args.mode(), Mode::Build);
        assert_eq!(args.config.as_deref(), Some("site.toml"));
        assert!(args.dry_run);
    }
}
