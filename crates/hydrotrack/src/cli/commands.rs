//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::tracker::DEFAULT_CUSTOM_VOLUME;

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Millilitres to log; the day's total never exceeds the goal
    #[arg(
        value_name = "ML",
        default_value_t = DEFAULT_CUSTOM_VOLUME,
        allow_negative_numbers = true
    )]
    pub volume: i64,
}

/// Drink command arguments.
#[derive(Debug, Args)]
pub struct DrinkCommand {
    /// Preset position (1-based, as listed) or name
    pub preset: String,
}

/// Goal command arguments.
#[derive(Debug, Args)]
pub struct GoalCommand {
    /// New daily goal in millilitres
    #[arg(value_name = "ML", value_parser = clap::value_parser!(i64).range(1..))]
    pub goal: i64,
}

/// Preset management commands.
#[derive(Debug, Subcommand)]
pub enum PresetsCommand {
    /// List presets in display order
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Append a preset
    Add {
        /// Display name
        name: String,

        /// Volume in millilitres; anything that is not an integer is ignored
        #[arg(value_name = "ML", allow_hyphen_values = true)]
        volume: String,
    },

    /// Remove presets by position
    Remove {
        /// 1-based positions, as listed
        #[arg(required = true)]
        indices: Vec<usize>,
    },
}

/// Paired-device replication commands.
#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Show the replication session
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Stay running and apply snapshots from the paired device as they arrive
    Watch,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_command_debug() {
        let cmd = StatusCommand { json: true };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("json"));
    }

    #[test]
    fn test_presets_command_debug() {
        let cmd = PresetsCommand::Remove {
            indices: vec![2, 1],
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Remove"));
        assert!(debug_str.contains("indices"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
