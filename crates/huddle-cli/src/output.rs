//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Serialize;

use huddle_core::views::{self, PresencePartition};
use huddle_core::{Channel, Message, Presence};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single channel
    pub fn print_channel(&self, channel: &Channel) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", channel.id);
                println!("Name:     #{}", channel.name);
                println!("Type:     {}", channel.kind);
                println!("Created:  {}", format_millis(channel.created_at));
                println!("Owner:    {}", channel.created_by);
                println!("Members:  {}", channel.member_ids().join(", "));
            }
            OutputFormat::Json => print_json(channel),
            OutputFormat::Quiet => println!("{}", channel.id),
        }
    }

    /// Print a list of channels
    pub fn print_channels(&self, channels: &[Channel]) {
        match self.format {
            OutputFormat::Human => {
                if channels.is_empty() {
                    println!("No channels found.");
                    return;
                }
                for channel in channels {
                    println!(
                        "{} | #{} | {} | {} member(s)",
                        channel.id,
                        truncate(&channel.name, 30),
                        channel.kind,
                        channel.member_ids().len()
                    );
                }
                println!("\n{} channel(s)", channels.len());
            }
            OutputFormat::Json => print_json(&channels),
            OutputFormat::Quiet => {
                for channel in channels {
                    println!("{}", channel.id);
                }
            }
        }
    }

    /// Print a channel's messages, oldest first
    pub fn print_messages(&self, messages: &[Message]) {
        match self.format {
            OutputFormat::Human => {
                if messages.is_empty() {
                    println!("No messages yet.");
                    return;
                }
                for message in messages {
                    println!(
                        "[{}] {}: {}",
                        format_millis(message.sort_key()),
                        message.user_name,
                        truncate_line(&message.content, 200)
                    );
                }
            }
            OutputFormat::Json => print_json(&messages),
            OutputFormat::Quiet => {
                for message in messages {
                    println!("{}", message.id);
                }
            }
        }
    }

    /// Print channel members grouped by online status
    pub fn print_members(
        &self,
        split: &PresencePartition,
        presence: &BTreeMap<String, Presence>,
        now: i64,
    ) {
        match self.format {
            OutputFormat::Human => {
                println!("Online ({})", split.online.len());
                for uid in &split.online {
                    println!("  ● {}", views::display_name(presence, uid));
                }
                println!();
                println!("Offline ({})", split.offline.len());
                for uid in &split.offline {
                    let name = views::display_name(presence, uid);
                    match presence.get(uid).filter(|p| p.last_seen > 0) {
                        Some(p) => println!(
                            "  ○ {} (last seen {})",
                            name,
                            views::format_last_seen(p.last_seen, now)
                        ),
                        None => println!("  ○ {}", name),
                    }
                }
            }
            OutputFormat::Json => {
                let entry = |uid: &String| {
                    serde_json::json!({
                        "userId": uid,
                        "displayName": views::display_name(presence, uid),
                        "lastSeen": presence.get(uid).map(|p| p.last_seen),
                    })
                };
                print_json(&serde_json::json!({
                    "online": split.online.iter().map(entry).collect::<Vec<_>>(),
                    "offline": split.offline.iter().map(entry).collect::<Vec<_>>(),
                }));
            }
            OutputFormat::Quiet => {
                for uid in &split.online {
                    println!("{}", uid);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON output: {}", e),
    }
}

/// Local date and time of an epoch-millis timestamp
fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
