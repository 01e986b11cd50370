use std::collections::HashSet;

use crate::chat::{room_id, Message};

/// The chat window: who it is open on and the transcript it shows.
/// Every message appears once, however many times it is delivered.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    counterpart: Option<String>,
    room_id: Option<String>,
    transcript: Vec<Message>,
    ids: HashSet<String>,
}

impl Conversation {
    /// Shows the conversation between `user_id` and `counterpart_id`, replacing the transcript.
    pub fn open(&mut self, user_id: &str, counterpart_id: &str, history: Vec<Message>) {
        self.counterpart = Some(counterpart_id.to_owned());
        self.room_id = Some(room_id(user_id, counterpart_id));
        self.transcript.clear();
        self.ids.clear();
        for message in history {
            self.append(message);
        }
    }

    pub fn close(&mut self) -> Option<String> {
        self.transcript.clear();
        self.ids.clear();
        self.counterpart = None;
        self.room_id.take()
    }

    pub fn counterpart(&self) -> Option<&str> {
        self.counterpart.as_deref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn is_showing(&self, room_id: &str) -> bool {
        self.room_id.as_deref() == Some(room_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.ids.contains(message_id)
    }

    /// Adds a message unless its id is already shown. Returns whether it was added.
    pub fn append(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.transcript.push(message);
        true
    }

    /// Swaps a locally shown message for the record the server stored.
    pub fn confirm(&mut self, stored: Message) {
        match self.transcript.iter_mut().find(|m| m.id == stored.id) {
            Some(shown) => *shown = stored,
            None => {
                self.append(stored);
            }
        }
    }

    /// Takes back a message the server refused.
    pub fn rollback(&mut self, message_id: &str) -> bool {
        if !self.ids.remove(message_id) {
            return false;
        }
        self.transcript.retain(|m| m.id != message_id);
        true
    }

    /// Marks what `sender_id` sent as read in the visible transcript.
    pub fn mark_read_from(&mut self, sender_id: &str) {
        for message in self.transcript.iter_mut().filter(|m| m.sender_id == sender_id) {
            message.read = true;
        }
    }
}
