//! Presence command handler

use anyhow::{Context as _, Result};

use huddle_core::Presence;

use super::Context;
use crate::output::Output;

/// Publish the acting user's presence
pub async fn set(ctx: &Context, online: bool, output: &Output) -> Result<Presence> {
    let presence = ctx
        .chat
        .update_presence(&ctx.user.uid, online, &ctx.user.profile())
        .await
        .context("Failed to update presence")?;

    let status = if online { "online" } else { "offline" };
    output.success(&format!("{} is {}", ctx.user.uid, status));
    Ok(presence)
}
