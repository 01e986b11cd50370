/// Separator between the two participant ids of a room id.
pub const ROOM_SEPARATOR: char = '_';

/// The room shared by two users. Both sides compute the same id no matter who
/// opens the conversation first, so a pair never ends up with two rooms.
pub fn room_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first}{ROOM_SEPARATOR}{second}")
}

/// Whether `user_id` is one of the two participants of `room`.
pub fn participates(room: &str, user_id: &str) -> bool {
    counterpart(room, user_id).is_some()
}

/// The other participant of `room`, seen from `user_id`.
pub fn counterpart<'a>(room: &'a str, user_id: &str) -> Option<&'a str> {
    let prefix = room.strip_prefix(user_id).and_then(|rest| rest.strip_prefix(ROOM_SEPARATOR));
    if let Some(other) = prefix {
        if room_id(user_id, other) == room {
            return Some(other);
        }
    }

    let suffix = room.strip_suffix(user_id).and_then(|rest| rest.strip_suffix(ROOM_SEPARATOR));
    if let Some(other) = suffix {
        if room_id(user_id, other) == room {
            return Some(other);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_is_symmetric() {
        let pairs = [("u1", "u2"), ("alice", "bob"), ("b", "a"), ("same", "same"), ("", "x")];
        for (a, b) in pairs {
            assert_eq!(room_id(a, b), room_id(b, a));
        }
        assert_eq!(room_id("u2", "u1"), "u1_u2");
    }

    #[test]
    fn counterpart_from_either_side() {
        let room = room_id("u1", "u2");
        assert_eq!(counterpart(&room, "u1"), Some("u2"));
        assert_eq!(counterpart(&room, "u2"), Some("u1"));
        assert_eq!(counterpart(&room, "u3"), None);
        assert!(!participates(&room, "u"));
    }

    #[test]
    fn ids_containing_the_separator() {
        let room = room_id("a_b", "c");
        assert_eq!(counterpart(&room, "a_b"), Some("c"));
        assert_eq!(counterpart(&room, "c"), Some("a_b"));
        assert_eq!(counterpart(&room, "b"), None);
    }
}
