//! Client-side chat state: the unread ledger, the open conversation and the
//! context object that owns them. Independent of any UI toolkit; talks to the
//! server through [`ChatBackend`] and returns the socket frames to send.

mod backend;
mod context;
mod conversation;
mod unread;

pub use backend::{ChatBackend, HttpChatBackend, HttpMediaUploader, MediaUploader};
pub use context::ClientContext;
pub use conversation::Conversation;
pub use unread::UnreadLedger;
