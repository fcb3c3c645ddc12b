//! Message command handlers

use anyhow::{Context as _, Result};

use huddle_core::{path, views, Message};

use super::Context;
use crate::output::Output;

/// Post a message as the acting user
pub async fn send(ctx: &Context, channel_id: String, text: Vec<String>, output: &Output) -> Result<Option<Message>> {
    let content = text.join(" ");
    let sent = ctx
        .chat
        .send_message(&channel_id, &ctx.user.uid, &ctx.sender_name(), None, &content)
        .await
        .context("Failed to send message")?;

    match &sent {
        Some(message) => output.success(&format!("Sent {}", message.id)),
        None => output.message("Nothing to send."),
    }
    Ok(sent)
}

/// Show the latest messages of a channel, oldest first
pub async fn list(ctx: &Context, channel_id: String, limit: usize, output: &Output) -> Result<Vec<Message>> {
    let mut subscription = ctx.store.watch(&path::messages(&channel_id));
    let state = subscription.settled().await;
    if let Some(error) = state.error {
        anyhow::bail!("Failed to load messages: {}", error);
    }

    let mut messages = views::message_list(state.data.as_ref());
    if limit > 0 && messages.len() > limit {
        messages.drain(..messages.len() - limit);
    }

    output.print_messages(&messages);
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use crate::output::{Output, OutputFormat};

    #[tokio::test]
    async fn test_send_and_list_with_limit() {
        let (_temp, ctx) = testing::context("u1");
        let output = Output::new(OutputFormat::Quiet);

        for text in ["one", "two", "three"] {
            send(&ctx, "c1".to_string(), vec![text.to_string()], &output)
                .await
                .unwrap()
                .unwrap();
        }

        let all = list(&ctx, "c1".to_string(), 0, &output).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(all[0].user_name, "u1 name");

        let latest = list(&ctx, "c1".to_string(), 2, &output).await.unwrap();
        let contents: Vec<&str> = latest.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn test_blank_message_is_not_sent() {
        let (_temp, ctx) = testing::context("u1");
        let output = Output::new(OutputFormat::Quiet);

        let sent = send(&ctx, "c1".to_string(), vec!["  ".to_string()], &output)
            .await
            .unwrap();
        assert!(sent.is_none());
        assert!(list(&ctx, "c1".to_string(), 0, &output).await.unwrap().is_empty());
    }
}
