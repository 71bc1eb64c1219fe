use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Abort;
use crate::models::Conversation;
use crate::prompt::{Prompter, Reply};

/// Outcome of picking a conversation.
#[derive(Debug)]
pub enum Selection<P> {
    Chosen(Conversation<P>),
    NotFound,
    /// The user dismissed the chooser.
    BailOut,
}

/// Exact match on the title, or on the full name for untitled (one-to-one) chats.
pub fn matches<P>(conversation: &Conversation<P>, name: &str) -> bool {
    match &conversation.title {
        Some(title) => title == name,
        None => conversation.full_name.as_deref() == Some(name),
    }
}

/// Drain the source in order.
pub async fn collect<P>(
    mut next: impl AsyncFnMut() -> Result<Option<Conversation<P>>>,
    cancel: &CancellationToken,
) -> Result<Vec<Conversation<P>>> {
    let mut conversations = Vec::new();
    loop {
        let pulled = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Abort::Interrupted { removed: None }.into()),
            pulled = next() => pulled?,
        };
        let Some(conversation) = pulled else {
            break;
        };
        conversations.push(conversation);
    }
    Ok(conversations)
}

/// Pick a conversation from a lazily pulled source.
///
/// With a name, the first exact match wins and nothing after it is pulled.
/// Without one, or when nothing matches, every conversation seen goes to the chooser.
pub async fn select<P, Pr: Prompter>(
    name: Option<&str>,
    mut next: impl AsyncFnMut() -> Result<Option<Conversation<P>>>,
    prompter: &mut Pr,
    cancel: &CancellationToken,
) -> Result<Selection<P>> {
    let mut seen = Vec::new();
    loop {
        let pulled = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Abort::Interrupted { removed: None }.into()),
            pulled = next() => pulled?,
        };
        let Some(conversation) = pulled else {
            break;
        };
        if let Some(name) = name {
            debug!(id = conversation.id, name = %conversation.display_name(), "checking conversation");
            if matches(&conversation, name) {
                return Ok(Selection::Chosen(conversation));
            }
        }
        seen.push(conversation);
    }

    if let Some(name) = name {
        info!(name, "no chat with that exact name, pick one instead");
    }
    Ok(choose(prompter, seen)?)
}

/// Interactive pick over every conversation, labelled by display name.
pub fn choose<P, Pr: Prompter>(
    prompter: &mut Pr,
    mut conversations: Vec<Conversation<P>>,
) -> Result<Selection<P>, Abort> {
    if conversations.is_empty() {
        return Ok(Selection::NotFound);
    }
    let labels: Vec<String> = conversations
        .iter()
        .map(|c| c.display_name().to_string())
        .collect();

    match prompter.select("Which chat do you want to grab files from?", &labels)? {
        Reply::Answer(index) => Ok(Selection::Chosen(conversations.swap_remove(index))),
        Reply::Cancelled => Ok(Selection::BailOut),
        Reply::Interrupted => Err(Abort::Interrupted { removed: None }),
    }
}
