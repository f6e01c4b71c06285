use std::future::Future;

use crate::error::BackendError;
use crate::types::{
    EditMessageRequest, EditedMessage, SubmitAnswer, SubmitQuestion, ThreadReply,
    ThreadReplyRequest,
};

/// The chat backend as seen by the widget.
///
/// Requests are taken by value so callers can move them into spawned tasks.
/// Every method resolves to exactly one outcome; there is no retry and no
/// cancellation at this layer.
pub trait ChatBackend: Send + Sync {
    fn submit_question(
        &self,
        request: SubmitQuestion,
    ) -> impl Future<Output = Result<SubmitAnswer, BackendError>> + Send;

    fn reply_in_thread(
        &self,
        request: ThreadReplyRequest,
    ) -> impl Future<Output = Result<ThreadReply, BackendError>> + Send;

    fn edit_message(
        &self,
        request: EditMessageRequest,
    ) -> impl Future<Output = Result<EditedMessage, BackendError>> + Send;
}
