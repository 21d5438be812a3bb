//! Command-line interface for hydrotrack.
//!
//! This module provides the CLI structure for the `hydro` binary and the
//! small helpers its command handlers share.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, DrinkCommand, GoalCommand, PresetsCommand, StatusCommand,
    SyncCommand,
};

use crate::error::{Error, Result};
use crate::logging::Verbosity;
use crate::preset::CupPreset;

/// hydro - Keep track of the water you drink
///
/// Logs intake against a daily goal, with quick-add cup presets. State is
/// kept locally and mirrored to a paired device when one is configured.
#[derive(Debug, Parser)]
#[command(name = "hydro")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Keep state in memory only; nothing is read from or written to disk
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show today's progress
    Status(StatusCommand),

    /// Log a custom amount of water
    Add(AddCommand),

    /// Log the volume of a preset
    Drink(DrinkCommand),

    /// Start the day over
    Reset,

    /// Set the daily goal
    Goal(GoalCommand),

    /// Manage cup presets
    #[command(subcommand)]
    Presets(PresetsCommand),

    /// Inspect or run replication with the paired device
    #[command(subcommand)]
    Sync(SyncCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

/// Resolve a preset selector to a position in `presets`.
///
/// A selector is either a 1-based position, as shown by `presets list`, or a
/// preset name compared case-insensitively. The first name match wins.
///
/// # Errors
///
/// Returns [`Error::PresetNotFound`] if nothing matches.
pub fn preset_index(presets: &[CupPreset], selector: &str) -> Result<usize> {
    if let Ok(position) = selector.parse::<usize>() {
        if (1..=presets.len()).contains(&position) {
            return Ok(position - 1);
        }
    }
    presets
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(selector))
        .ok_or_else(|| Error::preset_not_found(selector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::seed_presets;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "hydro");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(parse(&["hydro", "-q", "-v", "status"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["hydro", "status"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["hydro", "-v", "status"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["hydro", "-vv", "status"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_global_flags_after_command() {
        let cli = parse(&["hydro", "status", "--ephemeral", "-c", "/custom/config.toml"]);
        assert!(cli.ephemeral);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_add_default_volume() {
        let cli = parse(&["hydro", "add"]);
        assert!(matches!(cli.command, Command::Add(AddCommand { volume: 250 })));
    }

    #[test]
    fn test_parse_add_negative_volume() {
        let cli = parse(&["hydro", "add", "-100"]);
        assert!(matches!(cli.command, Command::Add(AddCommand { volume: -100 })));
    }

    #[test]
    fn test_parse_drink() {
        let cli = parse(&["hydro", "drink", "medium"]);
        match cli.command {
            Command::Drink(cmd) => assert_eq!(cmd.preset, "medium"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_goal_rejects_zero() {
        assert!(Cli::try_parse_from(["hydro", "goal", "0"]).is_err());
        let cli = parse(&["hydro", "goal", "2500"]);
        assert!(matches!(cli.command, Command::Goal(GoalCommand { goal: 2500 })));
    }

    #[test]
    fn test_parse_reset() {
        assert!(matches!(parse(&["hydro", "reset"]).command, Command::Reset));
    }

    #[test]
    fn test_parse_presets_add_keeps_raw_volume() {
        let cli = parse(&["hydro", "presets", "add", "Bottle", "-50"]);
        match cli.command {
            Command::Presets(PresetsCommand::Add { name, volume }) => {
                assert_eq!(name, "Bottle");
                assert_eq!(volume, "-50");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_presets_remove_requires_index() {
        assert!(Cli::try_parse_from(["hydro", "presets", "remove"]).is_err());
        let cli = parse(&["hydro", "presets", "remove", "1", "3"]);
        match cli.command {
            Command::Presets(PresetsCommand::Remove { indices }) => assert_eq!(indices, vec![1, 3]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sync_watch() {
        let cli = parse(&["hydro", "sync", "watch"]);
        assert!(matches!(cli.command, Command::Sync(SyncCommand::Watch)));
    }

    #[test]
    fn test_preset_index_by_position() {
        let presets = seed_presets();
        assert_eq!(preset_index(&presets, "1").unwrap(), 0);
        assert_eq!(preset_index(&presets, "3").unwrap(), 2);
        assert!(preset_index(&presets, "0").is_err());
        assert!(preset_index(&presets, "4").is_err());
    }

    #[test]
    fn test_preset_index_by_name() {
        let presets = seed_presets();
        assert_eq!(preset_index(&presets, "large").unwrap(), 2);
        assert_eq!(preset_index(&presets, "MEDIUM").unwrap(), 1);

        let err = preset_index(&presets, "Jumbo").unwrap_err();
        assert_eq!(err.to_string(), "no preset matches 'Jumbo'");
    }
}
