use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    chat::{room_id, ClientEvent, Message, NewMessage, Role, ServerEvent},
    db::now_millis,
    payments::AttemptState,
};

use super::{ChatBackend, Conversation, MediaUploader, UnreadLedger};

/// Everything a signed-in client keeps while the app is open: who it is, who
/// is online, what is unread and which conversation is showing.
///
/// Created at sign-in and handed to whatever needs it; [`ClientContext::teardown`]
/// wipes it at sign-out. Failures of backend calls never escape: they are
/// turned into notices for the user (see [`ClientContext::take_notices`]).
#[derive(Debug)]
pub struct ClientContext {
    user_id: String,
    role: Role,
    online: HashSet<String>,
    unread: UnreadLedger,
    conversation: Conversation,
    // ids already added to the ledger, so a redelivery is not counted twice
    counted: HashSet<String>,
    // latest payment state per booking; the matching notice arrives as a notification
    payments: HashMap<String, AttemptState>,
    notices: Vec<String>,
}

impl ClientContext {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        ClientContext {
            user_id: user_id.into(),
            role,
            online: HashSet::new(),
            unread: UnreadLedger::new(),
            conversation: Conversation::default(),
            counted: HashSet::new(),
            payments: HashMap::new(),
            notices: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The first frame to send on a fresh connection.
    pub fn join_event(&self) -> ClientEvent {
        ClientEvent::Join { user_id: self.user_id.clone(), role: self.role }
    }

    pub fn unread(&self) -> &UnreadLedger {
        &self.unread
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn payment_state(&self, booking_id: &str) -> Option<AttemptState> {
        self.payments.get(booking_id).copied()
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    fn notice(&mut self, notice: impl Into<String>) {
        let notice = notice.into();
        tracing::warn!(user_id = %self.user_id, %notice, "client notice");
        self.notices.push(notice);
    }

    /// Seeds the ledger from the server, e.g. right after connecting. Messages
    /// the server already counted are not counted again when they arrive live.
    pub async fn sync_unread(&mut self, backend: &dyn ChatBackend) {
        match backend.unread_counts_by_sender(&self.user_id).await {
            Ok(unread) => {
                self.unread.reconcile(unread.counts);
                self.counted.extend(unread.message_ids);
            }
            Err(e) => self.notice(format!("Could not load unread messages: {e}")),
        }
    }

    /// Opens the conversation with `counterpart_id`: loads its history and
    /// marks it read. Returns the room frames to send on the socket.
    pub async fn open_conversation(&mut self, backend: &dyn ChatBackend, counterpart_id: &str) -> Vec<ClientEvent> {
        let history = match backend.list_by_counterpart(&self.user_id, counterpart_id).await {
            Ok(history) => history,
            Err(e) => {
                self.notice(format!("Could not load the conversation: {e}"));
                return Vec::new();
            }
        };

        let room = room_id(&self.user_id, counterpart_id);
        let mut events = Vec::new();
        if let Some(previous) = self.conversation.room_id() {
            if previous != room {
                events.push(ClientEvent::LeaveRoom { room_id: previous.to_owned() });
            }
        }
        self.conversation.open(&self.user_id, counterpart_id, history);
        events.push(ClientEvent::JoinRoom { room_id: room });

        self.mark_read(backend, counterpart_id).await;
        events
    }

    pub fn close_conversation(&mut self) -> Option<ClientEvent> {
        self.conversation.close().map(|room_id| ClientEvent::LeaveRoom { room_id })
    }

    /// Zeroes `sender_id` in the ledger and persists the read state. If the
    /// server refuses, the removed count is put back.
    pub async fn mark_read(&mut self, backend: &dyn ChatBackend, sender_id: &str) {
        let removed = self.unread.clear(sender_id);
        match backend.mark_read_by_sender(&self.user_id, sender_id).await {
            Ok(_) => self.conversation.mark_read_from(sender_id),
            Err(e) => {
                self.unread.restore(sender_id, removed);
                self.notice(format!("Could not mark messages as read: {e}"));
            }
        }
    }

    pub async fn handle_event(&mut self, backend: &dyn ChatBackend, event: ServerEvent) {
        match event {
            ServerEvent::OnlineUsers { user_ids } => self.online = user_ids.into_iter().collect(),
            ServerEvent::Message { message } => self.receive(backend, message).await,
            ServerEvent::PaymentStatus { booking_id, state, .. } => {
                self.payments.insert(booking_id, state);
            }
            ServerEvent::Notification { notification } => self.notices.push(notification.body),
            ServerEvent::Error { message } => self.notice(message),
            ServerEvent::Typing { .. } => {}
        }
    }

    async fn receive(&mut self, backend: &dyn ChatBackend, message: Message) {
        let for_me = message.receiver_id == self.user_id && !message.read;

        if !self.conversation.is_showing(&message.room_id) {
            if for_me && self.counted.insert(message.id.clone()) {
                self.unread.increment(&message.sender_id);
            }
            return;
        }

        let sender_id = message.sender_id.clone();
        let message_id = message.id.clone();
        if !self.conversation.append(message) || !for_me {
            return;
        }

        // on screen already, so it is read as it arrives
        match backend.mark_read_by_sender(&self.user_id, &sender_id).await {
            Ok(_) => self.conversation.mark_read_from(&sender_id),
            Err(e) => {
                if self.counted.insert(message_id) {
                    self.unread.increment(&sender_id);
                }
                self.notice(format!("Could not mark messages as read: {e}"));
            }
        }
    }

    pub async fn send_text(&mut self, backend: &dyn ChatBackend, text: &str) -> Option<ClientEvent> {
        let new = self.draft(Some(text.to_owned()), None)?;
        self.send(backend, new).await
    }

    /// Uploads the image, then sends it like a text message. The caption is optional.
    pub async fn send_image(
        &mut self,
        backend: &dyn ChatBackend,
        uploader: &dyn MediaUploader,
        bytes: Vec<u8>,
        content_type: &str,
        caption: Option<String>,
    ) -> Option<ClientEvent> {
        self.conversation.counterpart()?;
        let url = match uploader.upload(bytes, content_type).await {
            Ok(url) => url,
            Err(e) => {
                self.notice(format!("Could not upload the image: {e}"));
                return None;
            }
        };
        let new = self.draft(caption, Some(url))?;
        self.send(backend, new).await
    }

    fn draft(&mut self, text: Option<String>, image_url: Option<String>) -> Option<NewMessage> {
        let Some(counterpart) = self.conversation.counterpart().map(str::to_owned) else {
            self.notice("Open a conversation first.");
            return None;
        };

        Some(NewMessage {
            id: Uuid::now_v7().to_string(),
            room_id: Some(room_id(&self.user_id, &counterpart)),
            sender_id: self.user_id.clone(),
            receiver_id: counterpart,
            text,
            image_url,
        })
    }

    /// Shows the message at once, persists it, then either keeps the stored
    /// record or takes the message back. Returns the frame to emit on success.
    async fn send(&mut self, backend: &dyn ChatBackend, new: NewMessage) -> Option<ClientEvent> {
        let local = match new.clone().into_message(now_millis()) {
            Ok(local) => local,
            Err(e) => {
                self.notice(e.to_string());
                return None;
            }
        };
        self.conversation.append(local);

        match backend.create(&new).await {
            Ok(stored) => {
                self.conversation.confirm(stored.clone());
                Some(ClientEvent::SendMessage { message: stored })
            }
            Err(e) => {
                self.conversation.rollback(&new.id);
                self.notice(format!("Message not sent: {e}"));
                None
            }
        }
    }

    /// Forgets everything tied to the signed-in user.
    pub fn teardown(&mut self) {
        self.online.clear();
        self.unread.reset();
        self.conversation.close();
        self.counted.clear();
        self.payments.clear();
        self.notices.clear();
        tracing::debug!(user_id = %self.user_id, "client context torn down");
    }
}
