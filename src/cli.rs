// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `stubrunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stubrunner",
    version,
    about = "Launch a process (or the Spring Cloud Contract stub runner) and wait until it is ready.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Stubrunner.toml` in the current working directory, if it exists.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STUBRUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a shell command and wait for a marker on its stdout.
    Exec(ExecArgs),
    /// Make sure the stub runner jar is cached, launch it and wait until it is up.
    Stubs(StubsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
    /// Shell command to run.
    #[arg(long, value_name = "CMD")]
    pub cmd: String,

    /// Literal text that signals readiness on stdout.
    #[arg(long, value_name = "TEXT")]
    pub marker: String,

    /// Echo the command's stdout.
    #[arg(long)]
    pub show_output: bool,

    /// Give up if not ready in time (e.g. `30s`, `2m`).
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct StubsArgs {
    /// Stub ids, e.g. `com.example:demo:+:stubs`.
    #[arg(value_name = "IDS")]
    pub ids: String,

    /// Where the stub runner jar is cached.
    #[arg(long, value_name = "PATH")]
    pub jar: Option<PathBuf>,

    /// Where to download the jar from if it is not cached.
    #[arg(long, value_name = "URL")]
    pub download_url: Option<String>,

    /// Java binary.
    #[arg(long, value_name = "BIN")]
    pub java: Option<String>,

    /// Echo the stub runner's stdout.
    #[arg(long)]
    pub show_output: bool,

    /// Give up if not ready in time (e.g. `90s`, `2m`).
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Print the resolved jar location and command, but don't download or run anything.
    #[arg(long)]
    pub dry_run: bool,
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
