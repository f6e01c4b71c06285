use std::fmt;

use tutor_client::{Reply, ServerId};

/// Id shown for a message the server has not confirmed yet.
pub const SENTINEL_ID: &str = "temp-message";

const TIMESTAMP_FORMAT: &str = "%-I:%M %p";

/// Current wall-clock time as shown next to messages, e.g. "3:04 PM".
pub fn local_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Identity of a message as the backend knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Placeholder for an optimistic message awaiting confirmation.
    Temp,
    Server(ServerId),
}

impl MessageId {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, MessageId::Temp)
    }

    pub fn server(&self) -> Option<&ServerId> {
        match self {
            MessageId::Temp => None,
            MessageId::Server(id) => Some(id),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Temp => f.write_str(SENTINEL_ID),
            MessageId::Server(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        if id == SENTINEL_ID {
            MessageId::Temp
        } else {
            MessageId::Server(ServerId::new(id))
        }
    }
}

impl From<ServerId> for MessageId {
    fn from(id: ServerId) -> Self {
        MessageId::Server(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Whether the server has acknowledged a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Shown optimistically, request in flight.
    Pending,
    #[default]
    Confirmed,
    /// The submission failed. The message stays in the transcript.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    pub edited: bool,
    pub delivery: Delivery,
    /// Replacement content while an edit request is in flight.
    pub pending_edit: Option<String>,
}

impl Message {
    /// A user message shown before the server has seen it.
    pub fn optimistic(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            id: MessageId::Temp,
            role: Role::User,
            content: content.into(),
            timestamp: timestamp.into(),
            edited: false,
            delivery: Delivery::Pending,
            pending_edit: None,
        }
    }

    /// A message the server has stored. A missing timestamp falls back to
    /// the local clock.
    pub fn confirmed(
        id: ServerId,
        role: Role,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        let mut timestamp = timestamp.into();
        if timestamp.trim().is_empty() {
            timestamp = local_timestamp();
        }
        Self {
            id: MessageId::Server(id),
            role,
            content: content.into(),
            timestamp,
            edited: false,
            delivery: Delivery::Confirmed,
            pending_edit: None,
        }
    }

    pub fn from_reply(role: Role, reply: Reply) -> Self {
        Self::confirmed(reply.id, role, reply.content, reply.timestamp)
    }

    pub fn is_editing(&self) -> bool {
        self.pending_edit.is_some()
    }
}
