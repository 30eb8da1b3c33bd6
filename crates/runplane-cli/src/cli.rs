//! Command line definition.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

/// runplane - run orchestration services
#[derive(Parser, Debug)]
#[command(name = "runplane")]
#[command(about = "Run orchestration services", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a local deployment: the web server and the scheduling daemon
    Start(StartArgs),
}

#[derive(Args, Debug, Clone, Default)]
#[command(group(ArgGroup::new("target").args(["file", "module", "workspace"])))]
pub struct StartArgs {
    /// Job definition file to load
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Module to load job definitions from
    #[arg(short = 'm', long)]
    pub module: Option<String>,

    /// Workspace file listing code locations
    #[arg(short = 'w', long)]
    pub workspace: Option<PathBuf>,

    /// Log level for worker processes started by the services
    #[arg(long, value_enum, default_value_t = LogLevel::Warning)]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Critical,
    Error,
    #[default]
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<StartArgs, clap::Error> {
        let cli = Cli::try_parse_from(args)?;
        let Commands::Start(args) = cli.command;
        Ok(args)
    }

    #[test]
    fn test_start_defaults() {
        let args = parse(&["runplane", "start"]).unwrap();
        assert_eq!(args.log_level, LogLevel::Warning);
        assert!(args.file.is_none() && args.module.is_none() && args.workspace.is_none());
    }

    #[test]
    fn test_log_level_values() {
        let args = parse(&["runplane", "start", "--log-level", "trace"]).unwrap();
        assert_eq!(args.log_level.as_str(), "trace");
        assert!(parse(&["runplane", "start", "--log-level", "verbose"]).is_err());
    }

    #[test]
    fn test_targets_are_mutually_exclusive() {
        assert!(parse(&["runplane", "start", "-f", "jobs.py", "-m", "jobs"]).is_err());
        let args = parse(&["runplane", "start", "--module", "jobs"]).unwrap();
        assert_eq!(args.module.as_deref(), Some("jobs"));
    }
}
