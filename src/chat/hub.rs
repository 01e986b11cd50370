use std::{collections::HashSet, sync::Arc};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{presence::Presence, ServerEvent};

/// Who a published event is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    User(String),
    /// Connections that joined the room, plus every connection of `receiver`.
    Room { room_id: String, receiver: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    /// Connection that caused the event; it is not echoed back there.
    pub origin: Option<Uuid>,
    pub event: ServerEvent,
}

/// What one connection has announced about itself.
#[derive(Debug, Clone, Default)]
pub struct Membership {
    pub user_id: Option<String>,
    pub rooms: HashSet<String>,
}

impl Membership {
    pub fn reaches(&self, conn_id: Uuid, envelope: &Envelope) -> bool {
        if envelope.origin == Some(conn_id) {
            return false;
        }
        match &envelope.audience {
            Audience::Everyone => true,
            Audience::User(user_id) => self.user_id.as_ref() == Some(user_id),
            Audience::Room { room_id, receiver } => {
                self.rooms.contains(room_id)
                    || (receiver.is_some() && self.user_id.as_ref() == receiver.as_ref())
            }
        }
    }
}

/// Fan-out point of the real-time channel. Every connection subscribes and
/// filters by its own [`Membership`].
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<Envelope>,
    presence: Arc<Presence>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        Hub {
            tx: broadcast::channel(capacity).0,
            presence: Arc::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn publish(&self, envelope: Envelope) {
        // no subscribers just means nobody is connected
        let _ = self.tx.send(envelope);
    }

    pub fn to_user(&self, user_id: &str, event: ServerEvent) {
        self.publish(Envelope {
            audience: Audience::User(user_id.to_owned()),
            origin: None,
            event,
        });
    }

    pub fn to_room(&self, room_id: &str, receiver: Option<&str>, origin: Option<Uuid>, event: ServerEvent) {
        self.publish(Envelope {
            audience: Audience::Room {
                room_id: room_id.to_owned(),
                receiver: receiver.map(str::to_owned),
            },
            origin,
            event,
        });
    }

    pub fn announce_online(&self, user_ids: Vec<String>) {
        self.publish(Envelope {
            audience: Audience::Everyone,
            origin: None,
            event: ServerEvent::OnlineUsers { user_ids },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(audience: Audience, origin: Option<Uuid>) -> Envelope {
        Envelope { audience, origin, event: ServerEvent::Error { message: "x".to_owned() } }
    }

    #[test]
    fn room_events_reach_members_and_receiver_but_not_origin() {
        let conn = Uuid::now_v7();
        let room = Audience::Room { room_id: "u1_u2".to_owned(), receiver: Some("u1".to_owned()) };

        let member = Membership { user_id: Some("u2".to_owned()), rooms: HashSet::from(["u1_u2".to_owned()]) };
        assert!(member.reaches(conn, &envelope(room.clone(), None)));
        assert!(!member.reaches(conn, &envelope(room.clone(), Some(conn))));

        let receiver_elsewhere = Membership { user_id: Some("u1".to_owned()), rooms: HashSet::new() };
        assert!(receiver_elsewhere.reaches(conn, &envelope(room.clone(), None)));

        let stranger = Membership { user_id: Some("u3".to_owned()), rooms: HashSet::new() };
        assert!(!stranger.reaches(conn, &envelope(room, None)));
    }

    #[test]
    fn anonymous_connections_only_hear_broadcasts() {
        let conn = Uuid::now_v7();
        let anonymous = Membership::default();
        assert!(anonymous.reaches(conn, &envelope(Audience::Everyone, None)));
        assert!(!anonymous.reaches(conn, &envelope(Audience::User("u1".to_owned()), None)));
        let no_receiver = Audience::Room { room_id: "u1_u2".to_owned(), receiver: None };
        assert!(!anonymous.reaches(conn, &envelope(no_receiver, None)));
    }
}
