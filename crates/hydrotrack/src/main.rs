//! `hydro` - CLI for hydrotrack
//!
//! This binary logs water intake, manages cup presets and keeps the paired
//! device in step.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use hydrotrack::cli::{
    preset_index, Cli, Command, ConfigCommand, PresetsCommand, SyncCommand,
};
use hydrotrack::replication::SessionStatus;
use hydrotrack::{
    init_logging, Config, KeyValueStore, MemoryStore, Offline, ReplicationChannel, SpoolChannel,
    Storage, Tracker, TrackerView,
};

const PROGRESS_BAR_WIDTH: usize = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let mut tracker = open_tracker(&config, cli.ephemeral).await?;

    let result = match cli.command {
        Command::Status(cmd) => print_status(tracker.view(), cmd.json),
        Command::Add(cmd) => {
            tracker.add_water(cmd.volume);
            report(&mut tracker)
        }
        Command::Drink(cmd) => {
            let index = preset_index(tracker.presets(), &cmd.preset)?;
            tracker.drink_preset(index);
            report(&mut tracker)
        }
        Command::Reset => {
            tracker.reset_daily();
            report(&mut tracker)
        }
        Command::Goal(cmd) => {
            tracker.set_daily_goal(cmd.goal);
            report(&mut tracker)
        }
        Command::Presets(cmd) => handle_presets(&mut tracker, cmd),
        Command::Sync(cmd) => handle_sync(&mut tracker, cmd).await,
        Command::Config(_) => Ok(()),
    };

    tracker.deactivate();
    result
}

async fn open_tracker(config: &Config, ephemeral: bool) -> anyhow::Result<Tracker> {
    let store: Box<dyn KeyValueStore> = if ephemeral {
        debug!("Using in-memory store");
        Box::new(MemoryStore::new())
    } else {
        let path = config.database_path();
        let storage = Storage::open(&path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        if let Ok(stats) = storage.stats() {
            debug!(
                path = %path.display(),
                entries = stats.entries,
                size_bytes = stats.db_size_bytes,
                "Opened preference store"
            );
        }
        Box::new(storage)
    };

    let channel: Box<dyn ReplicationChannel> = if config.is_paired() && !ephemeral {
        Box::new(SpoolChannel::from_config(config))
    } else {
        debug!("Replication off");
        Box::new(Offline)
    };

    let mut tracker =
        Tracker::initialize(store, channel, config.replication.queue_capacity).await;
    let applied = tracker.apply_pending();
    if applied > 0 {
        info!(applied, "Applied snapshots from paired device");
    }
    Ok(tracker)
}

fn report(tracker: &mut Tracker) -> anyhow::Result<()> {
    print_status(tracker.view(), false)?;
    if tracker.take_goal_alert() {
        println!();
        println!("Daily goal reached. Nice work!");
    }
    Ok(())
}

fn print_status(view: &TrackerView, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!("{} / {} mL", view.current_intake, view.daily_goal);
    println!("{}", progress_bar(view.progress(), PROGRESS_BAR_WIDTH));
    if view.goal_reached {
        println!("Goal reached");
    } else {
        println!("{} mL to go", view.remaining());
    }
    Ok(())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress * width as f64).round() as usize).min(width);
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        progress * 100.0
    )
}

fn handle_presets(tracker: &mut Tracker, cmd: PresetsCommand) -> anyhow::Result<()> {
    match cmd {
        PresetsCommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(tracker.presets())?);
            } else if tracker.presets().is_empty() {
                println!("No presets.");
            } else {
                for (position, preset) in tracker.presets().iter().enumerate() {
                    println!("{:>3}. {}", position + 1, preset.label());
                }
            }
        }
        PresetsCommand::Add { name, volume } => match tracker.add_preset(&name, &volume) {
            Some(_) => {
                if let Some(preset) = tracker.presets().last() {
                    println!("Added {}", preset.label());
                }
            }
            None => println!("Ignored: a preset needs a name and a whole number of mL."),
        },
        PresetsCommand::Remove { indices } => {
            let positions: Vec<usize> = indices.iter().filter_map(|i| i.checked_sub(1)).collect();
            let removed = tracker.remove_presets(&positions);
            println!("Removed {removed} preset(s).");
        }
    }
    Ok(())
}

async fn handle_sync(tracker: &mut Tracker, cmd: SyncCommand) -> anyhow::Result<()> {
    match cmd {
        SyncCommand::Status { json } => print_session(&tracker.session_status(), json),
        SyncCommand::Watch => {
            if !tracker.ensure_session().await {
                println!("{}", tracker.session_status().message);
            }
            print_status(tracker.view(), false)?;

            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Received shutdown signal");
                        break;
                    }
                    () = tracker.next_inbound() => {
                        println!();
                        report(tracker)?;
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_session(status: &SessionStatus, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    println!("Replication session");
    println!("-------------------");
    println!("Channel:       {}", status.channel);
    println!("Active:        {}", if status.active { "yes" } else { "no" });
    if let Some(at) = status.activated_at {
        println!("Activated at:  {}", at.to_rfc3339());
    }
    println!("Sent:          {}", status.sent);
    println!("Received:      {}", status.received);
    println!("Status:        {}", status.message);
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Replication]");
                println!("  Enabled:            {}", config.replication.enabled);
                println!("  Inbox:              {}", config.inbox_dir().display());
                match &config.replication.peer_inbox_dir {
                    Some(peer) => println!("  Peer inbox:         {}", peer.display()),
                    None => println!("  Peer inbox:         (not paired)"),
                }
                println!(
                    "  Poll interval (ms): {}",
                    config.replication.poll_interval_ms
                );
                println!(
                    "  Queue capacity:     {}",
                    config.replication.queue_capacity
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
