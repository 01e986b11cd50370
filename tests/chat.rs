mod common;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use servicehub::{
    chat::{msg, ClientEvent, Message, NewMessage, Role, ServerEvent, UnreadCounts, IMAGE_CAPTION},
    client::{ChatBackend, ClientContext, MediaUploader},
    notifications::Notification,
    payments::AttemptState,
};
use sqlx::SqlitePool;

/// Serves the client straight from the message store, with switchable failures.
struct StoreBackend {
    db_pool: SqlitePool,
    refuse_create: AtomicBool,
    refuse_mark_read: AtomicBool,
}

impl StoreBackend {
    async fn new() -> Self {
        StoreBackend {
            db_pool: common::pool().await,
            refuse_create: AtomicBool::new(false),
            refuse_mark_read: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ChatBackend for StoreBackend {
    async fn create(&self, message: &NewMessage) -> anyhow::Result<Message> {
        if self.refuse_create.load(Ordering::SeqCst) {
            anyhow::bail!("server unavailable");
        }
        msg::create(&self.db_pool, message.clone()).await.map_err(|e| e.0)
    }

    async fn list_by_counterpart(&self, user_id: &str, counterpart_id: &str) -> anyhow::Result<Vec<Message>> {
        msg::list_by_counterpart(&self.db_pool, user_id, counterpart_id).await.map_err(|e| e.0)
    }

    async fn mark_read_by_sender(&self, reader_id: &str, sender_id: &str) -> anyhow::Result<u64> {
        if self.refuse_mark_read.load(Ordering::SeqCst) {
            anyhow::bail!("server unavailable");
        }
        msg::mark_read_by_sender(&self.db_pool, reader_id, sender_id).await.map_err(|e| e.0)
    }

    async fn unread_counts_by_sender(&self, user_id: &str) -> anyhow::Result<UnreadCounts> {
        msg::unread_counts_by_sender(&self.db_pool, user_id).await.map_err(|e| e.0)
    }
}

struct FixedUploader;

#[async_trait]
impl MediaUploader for FixedUploader {
    async fn upload(&self, bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<String> {
        anyhow::ensure!(!bytes.is_empty(), "empty upload");
        Ok("https://img.example/1.png".to_owned())
    }
}

async fn send(db_pool: &SqlitePool, id: &str, from: &str, to: &str, text: &str) -> Message {
    msg::create(db_pool, NewMessage {
        id: id.to_owned(),
        sender_id: from.to_owned(),
        receiver_id: to.to_owned(),
        room_id: None,
        text: Some(text.to_owned()),
        image_url: None,
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn unread_messages_clear_when_the_conversation_opens() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);

    for (i, text) in ["hi", "are you free", "tomorrow?"].into_iter().enumerate() {
        let message = send(&backend.db_pool, &format!("m{i}"), "bob", "alice", text).await;
        alice.handle_event(&backend, ServerEvent::Message { message }).await;
    }
    assert_eq!(alice.unread().count("bob"), 3);
    assert_eq!(alice.unread().total(), 3);

    let frames = alice.open_conversation(&backend, "bob").await;
    assert_eq!(frames, vec![ClientEvent::JoinRoom { room_id: "alice_bob".to_owned() }]);
    assert_eq!(alice.unread().count("bob"), 0);
    assert_eq!(alice.unread().total(), 0);
    assert_eq!(alice.conversation().messages().len(), 3);
    assert!(alice.conversation().messages().iter().all(|m| m.read));

    let server = msg::unread_counts_by_sender(&backend.db_pool, "alice").await.unwrap();
    assert_eq!(server.total, 0);
    assert!(alice.take_notices().is_empty());
}

#[tokio::test]
async fn redelivered_messages_count_and_show_once() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);

    let first = send(&backend.db_pool, "m1", "bob", "alice", "hello").await;
    for _ in 0..2 {
        alice.handle_event(&backend, ServerEvent::Message { message: first.clone() }).await;
    }
    assert_eq!(alice.unread().total(), 1);

    alice.open_conversation(&backend, "bob").await;
    let second = send(&backend.db_pool, "m2", "bob", "alice", "still there?").await;
    for _ in 0..2 {
        alice.handle_event(&backend, ServerEvent::Message { message: second.clone() }).await;
    }

    let shown: Vec<&str> = alice.conversation().messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(shown, ["m1", "m2"]);
    assert_eq!(alice.unread().total(), 0);
    assert!(msg::get(&backend.db_pool, "m2").await.unwrap().unwrap().read);
}

#[tokio::test]
async fn messages_for_another_room_are_counted_not_shown() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Provider);
    alice.open_conversation(&backend, "bob").await;

    let other = send(&backend.db_pool, "m1", "carol", "alice", "quote please").await;
    alice.handle_event(&backend, ServerEvent::Message { message: other }).await;

    assert!(alice.conversation().messages().is_empty());
    assert_eq!(alice.unread().count("carol"), 1);
    assert!(alice.unread().is_consistent());
}

#[tokio::test]
async fn failed_mark_read_puts_the_count_back() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);
    for i in 0..2 {
        let message = send(&backend.db_pool, &format!("m{i}"), "bob", "alice", "ping").await;
        alice.handle_event(&backend, ServerEvent::Message { message }).await;
    }

    backend.refuse_mark_read.store(true, Ordering::SeqCst);
    alice.open_conversation(&backend, "bob").await;

    assert_eq!(alice.unread().count("bob"), 2);
    assert_eq!(alice.unread().total(), 2);
    assert_eq!(alice.take_notices().len(), 1);

    let live = send(&backend.db_pool, "m9", "bob", "alice", "hello?").await;
    alice.handle_event(&backend, ServerEvent::Message { message: live }).await;
    assert_eq!(alice.conversation().messages().len(), 3);
    assert_eq!(alice.unread().count("bob"), 3);
    assert!(alice.unread().is_consistent());
}

#[tokio::test]
async fn sent_message_is_shown_then_confirmed() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);
    alice.open_conversation(&backend, "bob").await;

    let frame = alice.send_text(&backend, "  on my way  ").await.unwrap();
    let ClientEvent::SendMessage { message } = frame else {
        panic!("expected a send_message frame, got {frame:?}");
    };
    assert_eq!(message.text, "on my way");
    assert_eq!(message.room_id, "alice_bob");
    assert_eq!(alice.conversation().messages(), [message.clone()]);

    let stored = msg::list_by_counterpart(&backend.db_pool, "bob", "alice").await.unwrap();
    assert_eq!(stored, vec![message]);
}

#[tokio::test]
async fn refused_message_is_taken_back() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);
    alice.open_conversation(&backend, "bob").await;
    backend.refuse_create.store(true, Ordering::SeqCst);

    assert!(alice.send_text(&backend, "hello").await.is_none());
    assert!(alice.conversation().messages().is_empty());
    assert_eq!(alice.take_notices().len(), 1);
}

#[tokio::test]
async fn sending_needs_an_open_conversation() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);

    assert!(alice.send_text(&backend, "hello").await.is_none());
    assert_eq!(alice.take_notices().len(), 1);
}

#[tokio::test]
async fn image_without_caption_gets_the_default() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);
    alice.open_conversation(&backend, "bob").await;

    let frame = alice
        .send_image(&backend, &FixedUploader, vec![0x89, 0x50, 0x4e, 0x47], "image/png", None)
        .await
        .unwrap();
    let ClientEvent::SendMessage { message } = frame else {
        panic!("expected a send_message frame, got {frame:?}");
    };
    assert_eq!(message.text, IMAGE_CAPTION);
    assert_eq!(message.image_url.as_deref(), Some("https://img.example/1.png"));
}

#[tokio::test]
async fn switching_conversations_leaves_the_old_room() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);
    alice.open_conversation(&backend, "bob").await;

    let frames = alice.open_conversation(&backend, "carol").await;
    assert_eq!(frames, vec![
        ClientEvent::LeaveRoom { room_id: "alice_bob".to_owned() },
        ClientEvent::JoinRoom { room_id: "alice_carol".to_owned() },
    ]);
    assert_eq!(alice.close_conversation(), Some(ClientEvent::LeaveRoom { room_id: "alice_carol".to_owned() }));
    assert_eq!(alice.close_conversation(), None);
}

#[tokio::test]
async fn sync_presence_and_teardown() {
    let backend = StoreBackend::new().await;
    send(&backend.db_pool, "m1", "bob", "alice", "one").await;
    send(&backend.db_pool, "m2", "bob", "alice", "two").await;
    send(&backend.db_pool, "m3", "carol", "alice", "three").await;

    let mut alice = ClientContext::new("alice", Role::Customer);
    assert_eq!(alice.join_event(), ClientEvent::Join { user_id: "alice".to_owned(), role: Role::Customer });

    alice.sync_unread(&backend).await;
    assert_eq!(alice.unread().count("bob"), 2);
    assert_eq!(alice.unread().count("carol"), 1);
    assert_eq!(alice.unread().total(), 3);

    alice.handle_event(&backend, ServerEvent::OnlineUsers { user_ids: vec!["bob".to_owned()] }).await;
    assert!(alice.is_online("bob"));
    assert!(!alice.is_online("carol"));

    alice.teardown();
    assert_eq!(alice.unread().total(), 0);
    assert!(!alice.is_online("bob"));
}

#[tokio::test]
async fn synced_message_delivered_live_counts_once() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);

    // persisted before the socket delivers it
    let message = send(&backend.db_pool, "m1", "bob", "alice", "hello").await;
    alice.sync_unread(&backend).await;
    alice.handle_event(&backend, ServerEvent::Message { message }).await;

    let server = msg::unread_counts_by_sender(&backend.db_pool, "alice").await.unwrap();
    assert_eq!(server.message_ids, ["m1"]);
    assert_eq!(alice.unread().count("bob"), 1);
    assert_eq!(alice.unread().total(), 1);
    assert_eq!(alice.unread().total(), server.total);

    let later = send(&backend.db_pool, "m2", "bob", "alice", "still there?").await;
    alice.handle_event(&backend, ServerEvent::Message { message: later }).await;
    assert_eq!(alice.unread().count("bob"), 2);
    assert!(alice.unread().is_consistent());
}

#[tokio::test]
async fn payment_outcome_gives_one_notice() {
    let backend = StoreBackend::new().await;
    let mut alice = ClientContext::new("alice", Role::Customer);
    let message = AttemptState::Confirmed.user_message().to_owned();

    alice.handle_event(&backend, ServerEvent::PaymentStatus {
        booking_id: "b1".to_owned(),
        state: AttemptState::Confirmed,
        message: message.clone(),
    })
    .await;
    alice.handle_event(&backend, ServerEvent::Notification {
        notification: Notification {
            id: "n1".to_owned(),
            user_id: "alice".to_owned(),
            kind: "payment".to_owned(),
            body: message.clone(),
            read: false,
            created_at: 1,
        },
    })
    .await;

    assert_eq!(alice.take_notices(), [message]);
    assert_eq!(alice.payment_state("b1"), Some(AttemptState::Confirmed));
    assert_eq!(alice.payment_state("b2"), None);

    alice.teardown();
    assert_eq!(alice.payment_state("b1"), None);
}

#[tokio::test]
async fn resubmitted_message_is_stored_once() {
    let db_pool = common::pool().await;
    let first = send(&db_pool, "m1", "bob", "alice", "hello").await;
    let again = send(&db_pool, "m1", "bob", "alice", "hello").await;

    assert_eq!(first, again);
    assert_eq!(msg::list_by_counterpart(&db_pool, "alice", "bob").await.unwrap().len(), 1);

    let unread = msg::unread_counts_by_sender(&db_pool, "alice").await.unwrap();
    assert_eq!(unread.total, 1);
    assert_eq!(msg::mark_read_by_sender(&db_pool, "alice", "bob").await.unwrap(), 1);
    assert_eq!(msg::mark_read_by_sender(&db_pool, "alice", "bob").await.unwrap(), 0);
}

#[tokio::test]
async fn stolen_message_id_is_rejected() {
    let db_pool = common::pool().await;
    send(&db_pool, "m1", "bob", "alice", "hello").await;

    let err = msg::create(&db_pool, NewMessage {
        id: "m1".to_owned(),
        sender_id: "mallory".to_owned(),
        receiver_id: "alice".to_owned(),
        room_id: None,
        text: Some("hi".to_owned()),
        image_url: None,
    })
    .await
    .err()
    .unwrap();
    assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
}
