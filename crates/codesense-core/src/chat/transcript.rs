//! Ordered list of messages shown in the conversation view.
//!
//! The assistant message being streamed is addressed through a
//! [`StreamingHandle`] carrying its id, never by position, so a snapshot or
//! an unrelated append cannot redirect stream updates to the wrong message.

use codesense_types::chat::{HistoryEntry, Message, MessageId, MessageRole, StoredMessage};
use codesense_types::stream::StreamUpdate;
use uuid::Uuid;

/// Identity of the assistant message currently receiving stream updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingHandle {
    id: MessageId,
}

impl StreamingHandle {
    pub fn message_id(&self) -> MessageId {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Append a message and return its id.
    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message {
            id,
            role,
            content: content.into(),
            citations: Vec::new(),
            persisted_id: None,
        });
        id
    }

    /// Append an empty assistant message that will receive stream updates.
    pub fn begin_streaming(&mut self) -> StreamingHandle {
        StreamingHandle {
            id: self.push(MessageRole::Assistant, String::new()),
        }
    }

    /// Apply one decoded update to the streaming message.
    ///
    /// Content updates carry the full text so far and replace the body.
    pub fn apply(&mut self, handle: StreamingHandle, update: StreamUpdate) {
        let Some(message) = self.get_mut(handle.id) else {
            tracing::warn!(message_id = %handle.id, "stream update for a message no longer in the transcript");
            return;
        };
        match update {
            StreamUpdate::Citations(sources) => message.citations = sources,
            StreamUpdate::Content(text) => message.content = text,
        }
    }

    /// Mark the streaming message as cut short.
    pub fn append_error_suffix(&mut self, handle: StreamingHandle, suffix: &str) {
        if let Some(message) = self.get_mut(handle.id) {
            message.content.push_str(suffix);
        }
    }

    pub fn set_persisted_id(&mut self, id: MessageId, persisted_id: Uuid) {
        if let Some(message) = self.get_mut(id) {
            message.persisted_id = Some(persisted_id);
        }
    }

    /// Remove a message; used to revert an optimistic append.
    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(index))
    }

    /// Prior turns as sent to the answer service, oldest first, excluding `last` and everything after it.
    pub fn history_before(&self, last: MessageId) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .take_while(|m| m.id != last)
            .map(HistoryEntry::from)
            .collect()
    }

    /// Replace the whole conversation with stored messages.
    pub fn replace_all(&mut self, stored: &[StoredMessage]) {
        self.messages.clear();
        for message in stored {
            let id = self.push(message.role, message.content.clone());
            self.set_persisted_id(id, message.id);
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(self.next_id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}
