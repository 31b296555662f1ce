//! Ordered message log for a session

use chrono::Utc;

use crate::error::ChatError;
use crate::state::{Message, MessageId, Sender};

/// The transcript is the single source of truth for what gets rendered.
///
/// Ids come from a counter owned by the store and are never reused, not even
/// across `reset`, so two messages created in the same instant still differ.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Replace everything with a single assistant greeting
    pub fn reset(&mut self, greeting: impl Into<String>) -> MessageId {
        self.messages.clear();
        self.append(Sender::Assistant, greeting)
    }

    pub fn append(&mut self, sender: Sender, text: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message {
            id,
            text: text.into(),
            sender,
            created_at: Utc::now(),
        });
        id
    }

    /// Rewrite a user message and drop everything after it.
    ///
    /// On success the transcript ends at the edited message. Later user
    /// messages are discarded along with the assistant replies.
    pub fn edit_user_message(&mut self, id: MessageId, new_text: &str) -> Result<(), ChatError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == id && m.is_user())
            .ok_or_else(|| ChatError::not_found(format!("user message {}", id)))?;

        if new_text.trim().is_empty() {
            return Err(ChatError::invalid_argument("edited text is empty"));
        }

        self.messages.truncate(index + 1);
        self.messages[index].text = new_text.to_string();
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_from(&self, index: usize) -> &[Message] {
        self.messages.get(index..).unwrap_or(&[])
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
