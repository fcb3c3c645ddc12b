//! Huddle CLI
//!
//! Command-line interface for huddle - channels, messages and presence
//! backed by a local store file.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use huddle_core::Config;

mod commands;
mod output;
mod prompt;

use commands::Context;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Huddle - real-time team chat")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user id instead of the configured one
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session: create the default channel if needed, go online
    Init,
    /// Manage channels
    Channel {
        #[command(subcommand)]
        command: ChannelCommands,
    },
    /// Send a message to a channel
    Send {
        /// Channel ID
        channel: String,
        /// Message text
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Show recent messages of a channel
    Messages {
        /// Channel ID
        channel: String,
        /// Number of messages to show (0 for all)
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
    /// Set your presence
    Presence {
        #[command(subcommand)]
        command: PresenceCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ChannelCommands {
    /// Create a new channel
    #[command(alias = "add")]
    Create {
        /// Channel name
        name: String,
        /// Create a voice channel
        #[arg(long)]
        voice: bool,
    },
    /// List your channels
    #[command(alias = "ls")]
    List,
    /// Rename a channel
    Rename {
        /// Channel ID
        id: String,
        /// New name
        name: String,
    },
    /// Delete a channel
    #[command(alias = "rm")]
    Delete {
        /// Channel ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Join an existing channel
    Join {
        /// Channel ID
        id: String,
    },
    /// Find channels you haven't joined
    Search {
        /// Text contained in the channel name
        query: String,
    },
    /// Show who is online in a channel
    Members {
        /// Channel ID
        id: String,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum PresenceCommands {
    /// Mark yourself online
    Online,
    /// Mark yourself offline
    Offline,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (user_id, display_name, data_dir, ...)
        key: String,
        /// Configuration value ("none" clears optional keys)
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work even when no user is configured
    if let Commands::Config { command } = &cli.command {
        init_logging(cli.verbose, None);
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(cli.verbose, config.log_file.as_ref());
    debug!(data_dir = ?config.data_dir, "Configuration loaded");

    let ctx = Context::with_config(config, cli.user)?;

    match cli.command {
        Commands::Init => commands::init::run(&ctx, &output).await.map(|_| ()),
        Commands::Channel { command } => handle_channel_command(command, &ctx, &output).await,
        Commands::Send { channel, text } => {
            commands::message::send(&ctx, channel, text, &output).await.map(|_| ())
        }
        Commands::Messages { channel, limit } => {
            commands::message::list(&ctx, channel, limit, &output).await.map(|_| ())
        }
        Commands::Presence { command } => {
            let online = matches!(command, PresenceCommands::Online);
            commands::presence::set(&ctx, online, &output).await.map(|_| ())
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_channel_command(command: ChannelCommands, ctx: &Context, output: &Output) -> Result<()> {
    match command {
        ChannelCommands::Create { name, voice } => {
            let channel = commands::channel::create(ctx, name, voice, output).await?;
            if !output.is_quiet() {
                output.print_channel(&channel);
            } else {
                println!("{}", channel.id);
            }
            Ok(())
        }
        ChannelCommands::List => commands::channel::list(ctx, output).await.map(|_| ()),
        ChannelCommands::Rename { id, name } => commands::channel::rename(ctx, id, name, output).await,
        ChannelCommands::Delete { id, yes } => commands::channel::delete(ctx, id, yes, output).await,
        ChannelCommands::Join { id } => commands::channel::join(ctx, id, output).await.map(|_| ()),
        ChannelCommands::Search { query } => {
            commands::channel::search(ctx, query, output).await.map(|_| ())
        }
        ChannelCommands::Members { id } => commands::channel::members(ctx, id, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// RUST_LOG wins; otherwise `--verbose` selects debug and the default is
/// warnings only. Logs go to `log_file` when configured, else stderr.
fn init_logging(verbose: bool, log_file: Option<&PathBuf>) {
    let level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("huddle_core={},huddle_cli={}", level, level)));

    let file = log_file.and_then(|path| match File::options().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", path, e);
            None
        }
    });

    // Ignore error if already initialized
    let _ = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(file)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };
}
