//! Channel command handlers

use anyhow::{Context as _, Result};

use huddle_core::views::{self, ChannelDirectory};
use huddle_core::{path, Channel, ChannelKind};

use super::Context;
use crate::output::Output;
use crate::prompt::confirm;

/// Create a channel owned by the acting user
pub async fn create(ctx: &Context, name: String, voice: bool, output: &Output) -> Result<Channel> {
    let kind = if voice {
        ChannelKind::Voice
    } else {
        ChannelKind::Text
    };
    let channel = ctx
        .chat
        .create_channel(&ctx.user.uid, &name, kind)
        .await
        .context("Failed to create channel")?;

    output.success(&format!("Created channel #{} ({})", channel.name, channel.id));
    Ok(channel)
}

/// List the acting user's channels, oldest first
pub async fn list(ctx: &Context, output: &Output) -> Result<Vec<Channel>> {
    let directory = ChannelDirectory::open(&ctx.store, &ctx.user.uid);
    if let Some(error) = directory.index_state().error {
        anyhow::bail!("Failed to load channels: {}", error);
    }

    let channels = directory.channels();
    output.print_channels(&channels);
    Ok(channels)
}

/// Rename a channel
pub async fn rename(ctx: &Context, id: String, name: String, output: &Output) -> Result<()> {
    let (id, name) = ctx
        .chat
        .update_channel(&id, &name, &ctx.user.uid)
        .await
        .context("Failed to rename channel")?;

    output.success(&format!("Renamed {} to #{}", id, name));
    Ok(())
}

/// Delete a channel and remove it from every member's list
pub async fn delete(ctx: &Context, id: String, yes: bool, output: &Output) -> Result<()> {
    if output.should_prompt() && !yes {
        println!("Delete channel: {}", id);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let deleted = ctx
        .chat
        .delete_channel(&id, &ctx.user.uid)
        .await
        .context("Failed to delete channel")?;

    output.success(&format!(
        "Deleted channel {} ({} member list(s) updated)",
        deleted.channel_id,
        deleted.unindexed.len()
    ));
    Ok(())
}

/// Join an existing channel
pub async fn join(ctx: &Context, id: String, output: &Output) -> Result<Channel> {
    let channel = ctx
        .chat
        .join_channel(&id, &ctx.user.uid)
        .await
        .context("Failed to join channel")?;

    output.success(&format!("Joined #{}", channel.name));
    Ok(channel)
}

/// Find channels the acting user can join
pub async fn search(ctx: &Context, query: String, output: &Output) -> Result<Vec<Channel>> {
    let channels = ctx
        .chat
        .search_channels(&query, &ctx.user.uid)
        .await
        .context("Failed to search channels")?;

    output.print_channels(&channels);
    Ok(channels)
}

/// Show who is online in a channel
pub async fn members(ctx: &Context, id: String, output: &Output) -> Result<()> {
    let mut channel_sub = ctx.store.watch(&path::channel(&id));
    let mut presence_sub = ctx.store.watch(path::PRESENCE);

    let state = channel_sub.settled().await;
    if let Some(error) = state.error {
        anyhow::bail!("Failed to load channel {}: {}", id, error);
    }
    let channel = state
        .data
        .as_ref()
        .and_then(|value| Channel::from_snapshot(&id, value))
        .with_context(|| format!("Channel not found: {}", id))?;

    let presence = views::presence_map(presence_sub.settled().await.data.as_ref());
    let now = huddle_core::models::now_millis();
    let split = views::partition_presence_within(
        &views::channel_members(&channel),
        &presence,
        now,
        ctx.config.presence_timeout(),
    );

    if !output.is_quiet() && !output.is_json() {
        println!("#{} members", channel.name);
        println!();
    }
    output.print_members(&split, &presence, now);
    Ok(())
}
