//! Client for the tutoring chat backend.
//!
//! The backend exposes three endpoints answering in JSON: question
//! submission, thread replies and message edits. This crate provides the wire types for them,
//! the [`ChatBackend`] trait the chat controller is written against, and
//! [`HttpChatBackend`], the reqwest-based implementation.
//!
//! # Example
//!
//! ```ignore
//! use tutor_client::{ChatBackend, HttpChatBackend, SubmitQuestion};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = HttpChatBackend::new("https://school.example.org")
//!         .with_csrf_token("token-from-the-page");
//!
//!     let answer = backend
//!         .submit_question(SubmitQuestion {
//!             question: "What is photosynthesis?".to_string(),
//!             subject: Some("biology".to_string()),
//!         })
//!         .await
//!         .unwrap();
//!
//!     println!("{} ({})", answer.response, answer.timestamp);
//! }
//! ```

mod backend;
mod client;
mod error;
pub mod serde_helpers;
mod types;

pub use backend::ChatBackend;
pub use client::{BodyEncoding, Endpoints, HttpChatBackend, CSRF_HEADER};
pub use error::BackendError;
pub use types::{
    EditMessageRequest, EditMessageResponse, EditedContent, EditedMessage, Reply, ServerId,
    SubmitAnswer, SubmitQuestion, ThreadReply, ThreadReplyRequest, ThreadReplyResponse,
};
