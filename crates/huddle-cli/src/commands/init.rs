//! Init command handler

use anyhow::Result;

use huddle_core::{AuthEvent, DefaultChannel, SessionOutcome, SessionReactor};

use super::Context;
use crate::output::{Output, OutputFormat};

/// Start a session for the acting user: make sure they have a channel and
/// mark them online
pub async fn run(ctx: &Context, output: &Output) -> Result<SessionOutcome> {
    let mut reactor = SessionReactor::new(ctx.chat.clone());
    let outcome = reactor.handle(AuthEvent::SignedIn(ctx.user.clone())).await?;

    if let SessionOutcome::SignedIn {
        default_channel: Some(default_channel),
        ..
    } = &outcome
    {
        match output.format {
            OutputFormat::Json => {
                let (created, channels) = match default_channel {
                    DefaultChannel::Created(channel) => (true, vec![channel.id.clone()]),
                    DefaultChannel::Existing(ids) => (false, ids.clone()),
                };
                println!(
                    "{}",
                    serde_json::json!({
                        "user_id": ctx.user.uid,
                        "created": created,
                        "channels": channels
                    })
                );
            }
            OutputFormat::Quiet => {}
            OutputFormat::Human => match default_channel {
                DefaultChannel::Created(channel) => {
                    println!("Created #{} ({})", channel.name, channel.id);
                    println!();
                    println!("Send your first message with:");
                    println!("  huddle send {} hello", channel.id);
                }
                DefaultChannel::Existing(ids) => {
                    println!("Already a member of {} channel(s).", ids.len());
                }
            },
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;

    #[tokio::test]
    async fn test_init_creates_default_channel_once() {
        let (temp, ctx) = testing::context("u1");
        let output = Output::new(OutputFormat::Quiet);

        let outcome = run(&ctx, &output).await.unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::SignedIn {
                default_channel: Some(DefaultChannel::Created(_)),
                ..
            }
        ));

        let again = testing::reopen(&temp, "u1");
        let outcome = run(&again, &output).await.unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::SignedIn {
                default_channel: Some(DefaultChannel::Existing(_)),
                ..
            }
        ));
    }
}
