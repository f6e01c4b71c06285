use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::BackendError;
use crate::serde_helpers::string_or_number;

/// Identifier the backend assigned to a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ServerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_or_number::deserialize(deserializer).map(ServerId)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Body of a chat-submit request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitQuestion {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Successful chat-submit response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitAnswer {
    pub response: String,
    #[serde(default)]
    pub timestamp: String,
    pub question_id: ServerId,
    pub response_id: ServerId,
}

/// A stored message echoed back by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    pub id: ServerId,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadReplyRequest {
    pub parent_message_id: ServerId,
    pub content: String,
}

/// The `thread` object of a successful thread-reply response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadReply {
    pub user_reply: Reply,
    pub ai_reply: Reply,
}

/// Raw thread-reply envelope: either `success` with a thread or an `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadReplyResponse {
    #[serde(default)]
    pub success: bool,
    pub thread: Option<ThreadReply>,
    pub error: Option<String>,
}

impl ThreadReplyResponse {
    pub fn into_result(self) -> Result<ThreadReply, BackendError> {
        if !self.success {
            return Err(server_error(self.error));
        }
        self.thread.ok_or(BackendError::MissingField("thread"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditMessageRequest {
    pub message_id: ServerId,
    pub content: String,
}

/// The `edited_message` object of an edit-message response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditedContent {
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Raw edit-message envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EditMessageResponse {
    #[serde(default)]
    pub success: bool,
    pub edited_message: Option<EditedContent>,
    #[serde(default)]
    pub deleted_message_ids: Vec<ServerId>,
    pub new_response: Option<Reply>,
    pub error: Option<String>,
}

/// A confirmed edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditedMessage {
    pub content: String,
    pub timestamp: String,
    /// Messages after the edited one that the backend dropped.
    pub deleted_ids: Vec<ServerId>,
    /// Regenerated assistant answer to the edited message.
    pub new_response: Option<Reply>,
}

impl EditMessageResponse {
    pub fn into_result(self) -> Result<EditedMessage, BackendError> {
        if !self.success {
            return Err(server_error(self.error));
        }
        let edited = self
            .edited_message
            .ok_or(BackendError::MissingField("edited_message"))?;
        Ok(EditedMessage {
            content: edited.content,
            timestamp: edited.timestamp,
            deleted_ids: self.deleted_message_ids,
            new_response: self.new_response,
        })
    }
}

fn server_error(error: Option<String>) -> BackendError {
    BackendError::Server(error.unwrap_or_else(|| "Unknown error".to_string()))
}
