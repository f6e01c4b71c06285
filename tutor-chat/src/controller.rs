use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tutor_client::{
    BackendError, ChatBackend, EditMessageRequest, EditedMessage, SubmitAnswer, SubmitQuestion,
    ThreadReply, ThreadReplyRequest,
};

use crate::composer::Composer;
use crate::message::{Delivery, Message, MessageId, Role, local_timestamp};
use crate::transcript::{EntryKey, EntryKind, Transcript};
use crate::view::{RenderTarget, ViewPatch};

/// Shown in place of transport failures, which carry nothing useful for the user.
pub const GENERIC_FAILURE: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// Thread-reply counterpart of [`GENERIC_FAILURE`].
pub const THREAD_FAILURE: &str = "An error occurred. Please try again.";

/// Alert raised when an edit fails without a server explanation.
pub const EDIT_FAILURE: &str = "An error occurred while editing the message.";

/// Monotonic per-controller request number.
pub type RequestSeq = u64;

/// Unit of request serialization: one outstanding request per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Submit,
    Edit(EntryKey),
    Thread(EntryKey),
}

/// Why an operation was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Ignored {
    #[error("input is empty")]
    EmptyInput,
    #[error("message has not been confirmed by the server")]
    Unconfirmed,
    #[error("message not found")]
    UnknownMessage,
    #[error("replies can only be attached to assistant messages")]
    NotAssistant,
    #[error("you can only edit your own questions")]
    NotQuestion,
    #[error("a request is already in flight")]
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent(RequestSeq),
    Ignored(Ignored),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent(_))
    }

    pub fn seq(&self) -> Option<RequestSeq> {
        match self {
            Dispatch::Sent(seq) => Some(*seq),
            Dispatch::Ignored(_) => None,
        }
    }
}

/// What happened to a received response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Applied(RequestSeq),
    /// The request was superseded or its message is gone.
    Stale(RequestSeq),
}

enum Response {
    Submit(Result<SubmitAnswer, BackendError>),
    Edit(Result<EditedMessage, BackendError>),
    Thread(Result<ThreadReply, BackendError>),
}

struct Completion {
    seq: RequestSeq,
    slot: Slot,
    response: Response,
}

struct InFlight {
    seq: RequestSeq,
    /// Entry the response belongs to.
    origin: EntryKey,
    /// Typing indicator to clear when the response lands.
    indicator: Option<EntryKey>,
}

/// Drives one conversation: owns the transcript, talks to the backend and
/// keeps the view in step.
///
/// Operations return immediately. Responses are delivered through an
/// internal channel and applied by [`poll_completions`](Self::poll_completions)
/// or [`next_completion`](Self::next_completion) on the owning thread, so
/// the transcript is only ever mutated from one place.
pub struct ChatWidgetController<B, V> {
    backend: Arc<B>,
    view: V,
    transcript: Transcript,
    composer: Composer,
    in_flight: HashMap<Slot, InFlight>,
    next_seq: RequestSeq,
    outstanding: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<B, V> ChatWidgetController<B, V>
where
    B: ChatBackend + 'static,
    V: RenderTarget,
{
    pub fn new(backend: Arc<B>, view: V) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            view,
            transcript: Transcript::new(),
            composer: Composer::new(),
            in_flight: HashMap::new(),
            next_seq: 0,
            outstanding: 0,
            completions_tx,
            completions_rx,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn is_busy(&self, slot: Slot) -> bool {
        self.in_flight.contains_key(&slot)
    }

    /// Requests whose responses have not been received yet, stale ones included.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    fn emit(&mut self, patch: ViewPatch) {
        self.view.apply(&self.transcript, &patch);
    }

    /// Submits a question.
    ///
    /// The question appears at once as an optimistic user message followed
    /// by a typing indicator. Only one submission may be in flight.
    pub fn submit(&mut self, question: &str, subject: Option<&str>) -> Dispatch {
        let question = question.trim();
        if question.is_empty() {
            return Dispatch::Ignored(Ignored::EmptyInput);
        }
        if self.is_busy(Slot::Submit) {
            debug!("Submission already in flight");
            return Dispatch::Ignored(Ignored::InFlight);
        }

        let origin = self
            .transcript
            .push(EntryKind::Message(Message::optimistic(question, local_timestamp())));
        self.emit(ViewPatch::Inserted(origin));

        self.composer.clear();
        self.emit(ViewPatch::ComposerCleared);

        let indicator = self.transcript.push(EntryKind::Typing);
        self.emit(ViewPatch::Inserted(indicator));

        let request = SubmitQuestion {
            question: question.to_string(),
            subject: subject.filter(|s| !s.is_empty()).map(str::to_string),
        };
        let backend = Arc::clone(&self.backend);
        let seq = self.dispatch(Slot::Submit, origin, Some(indicator), async move {
            Response::Submit(backend.submit_question(request).await)
        });
        Dispatch::Sent(seq)
    }

    /// Submits whatever is in the composer.
    pub fn submit_composer(&mut self, subject: Option<&str>) -> Dispatch {
        let question = self.composer.text().to_string();
        self.submit(&question, subject)
    }

    /// Replaces the content of a confirmed question.
    ///
    /// On success the backend may drop later messages and regenerate the
    /// answer. On failure the original content stays and an alert is raised.
    pub fn edit_message(&mut self, id: &MessageId, new_content: &str) -> Dispatch {
        let Some(server_id) = id.server() else {
            return Dispatch::Ignored(Ignored::Unconfirmed);
        };
        let new_content = new_content.trim();
        if new_content.is_empty() {
            return Dispatch::Ignored(Ignored::EmptyInput);
        }
        let Some(key) = self.transcript.find(server_id) else {
            return Dispatch::Ignored(Ignored::UnknownMessage);
        };
        if self.transcript.message(key).map(|m| m.role) != Some(Role::User) {
            return Dispatch::Ignored(Ignored::NotQuestion);
        }
        let slot = Slot::Edit(key);
        if self.is_busy(slot) {
            return Dispatch::Ignored(Ignored::InFlight);
        }

        if let Some(msg) = self.transcript.message_mut(key) {
            msg.pending_edit = Some(new_content.to_string());
        }
        self.emit(ViewPatch::Updated(key));

        let request = EditMessageRequest {
            message_id: server_id.clone(),
            content: new_content.to_string(),
        };
        let backend = Arc::clone(&self.backend);
        let seq = self.dispatch(slot, key, None, async move {
            Response::Edit(backend.edit_message(request).await)
        });
        Dispatch::Sent(seq)
    }

    /// Opens the reply composer under an assistant message, creating its
    /// thread on first use.
    pub fn open_thread(&mut self, parent: &MessageId) -> Result<EntryKey, Ignored> {
        let key = self.thread_parent(parent)?;
        if let Some(thread) = self.transcript.ensure_thread(key) {
            thread.composer_open = true;
        }
        self.emit(ViewPatch::ThreadOpened(key));
        Ok(key)
    }

    pub fn close_thread(&mut self, parent: EntryKey) {
        let closed = match self.transcript.thread_mut(parent) {
            Some(thread) if thread.composer_open => {
                thread.composer_open = false;
                true
            }
            _ => false,
        };
        if closed {
            self.emit(ViewPatch::ThreadClosed(parent));
        }
    }

    pub fn thread_composer_mut(&mut self, parent: EntryKey) -> Option<&mut Composer> {
        self.transcript.thread_mut(parent).map(|t| &mut t.composer)
    }

    /// Replies in the thread of an assistant message.
    ///
    /// Nothing is shown for the reply itself until the backend echoes it.
    pub fn reply_in_thread(&mut self, parent: &MessageId, content: &str) -> Dispatch {
        let content = content.trim();
        if content.is_empty() {
            return Dispatch::Ignored(Ignored::EmptyInput);
        }
        let key = match self.thread_parent(parent) {
            Ok(key) => key,
            Err(reason) => return Dispatch::Ignored(reason),
        };
        let slot = Slot::Thread(key);
        if self.is_busy(slot) {
            return Dispatch::Ignored(Ignored::InFlight);
        }
        let Some(parent_id) = parent.server().cloned() else {
            return Dispatch::Ignored(Ignored::Unconfirmed);
        };

        if let Some(thread) = self.transcript.ensure_thread(key) {
            thread.composer.clear();
        }
        self.close_thread(key);

        let Some(indicator) = self.transcript.push_to_thread(key, EntryKind::Typing) else {
            return Dispatch::Ignored(Ignored::UnknownMessage);
        };
        self.emit(ViewPatch::ThreadInserted {
            parent: key,
            key: indicator,
        });

        let request = ThreadReplyRequest {
            parent_message_id: parent_id,
            content: content.to_string(),
        };
        let backend = Arc::clone(&self.backend);
        let seq = self.dispatch(slot, key, Some(indicator), async move {
            Response::Thread(backend.reply_in_thread(request).await)
        });
        Dispatch::Sent(seq)
    }

    /// Replies with whatever is in the parent's thread composer.
    pub fn reply_from_composer(&mut self, parent: &MessageId) -> Dispatch {
        let content = match parent.server().and_then(|id| self.transcript.find(id)) {
            Some(key) => self
                .transcript
                .thread(key)
                .map(|t| t.composer.text().to_string())
                .unwrap_or_default(),
            None => String::new(),
        };
        self.reply_in_thread(parent, &content)
    }

    fn thread_parent(&self, parent: &MessageId) -> Result<EntryKey, Ignored> {
        let id = parent.server().ok_or(Ignored::Unconfirmed)?;
        let key = self.transcript.find(id).ok_or(Ignored::UnknownMessage)?;
        match self.transcript.message(key) {
            Some(msg) if msg.role == Role::Assistant => Ok(key),
            _ => Err(Ignored::NotAssistant),
        }
    }

    fn dispatch<F>(
        &mut self,
        slot: Slot,
        origin: EntryKey,
        indicator: Option<EntryKey>,
        request: F,
    ) -> RequestSeq
    where
        F: Future<Output = Response> + Send + 'static,
    {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.in_flight.insert(
            slot,
            InFlight {
                seq,
                origin,
                indicator,
            },
        );
        self.outstanding += 1;

        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let response = request.await;
            let _ = tx.send(Completion {
                seq,
                slot,
                response,
            });
        });

        debug!(seq, ?slot, "Request dispatched");
        seq
    }

    /// Applies every response that has already arrived, without waiting.
    pub fn poll_completions(&mut self) -> Vec<Settled> {
        let mut settled = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            settled.push(self.settle(completion));
        }
        settled
    }

    /// Waits for the next response and applies it.
    ///
    /// Returns `None` when nothing is outstanding.
    pub async fn next_completion(&mut self) -> Option<Settled> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.settle(completion))
    }

    fn settle(&mut self, completion: Completion) -> Settled {
        self.outstanding = self.outstanding.saturating_sub(1);
        let Completion {
            seq,
            slot,
            response,
        } = completion;

        let flight = match self.in_flight.remove(&slot) {
            Some(flight) if flight.seq == seq => flight,
            other => {
                if let Some(current) = other {
                    self.in_flight.insert(slot, current);
                }
                debug!(seq, ?slot, "Discarding stale response");
                return Settled::Stale(seq);
            }
        };

        debug!(seq, ?slot, "Applying response");
        match response {
            Response::Submit(result) => self.settle_submit(flight, result),
            Response::Edit(result) => self.settle_edit(flight, result),
            Response::Thread(result) => self.settle_thread(flight, result),
        }
        Settled::Applied(seq)
    }

    fn settle_submit(&mut self, flight: InFlight, result: Result<SubmitAnswer, BackendError>) {
        if let Some(indicator) = flight.indicator {
            if self.transcript.remove(indicator).is_some() {
                self.emit(ViewPatch::Removed(indicator));
            }
        }

        match result {
            Ok(answer) => {
                if let Some(msg) = self.transcript.message_mut(flight.origin) {
                    msg.id = MessageId::Server(answer.question_id);
                    msg.delivery = Delivery::Confirmed;
                }
                self.emit(ViewPatch::Updated(flight.origin));

                let key = self.transcript.push(EntryKind::Message(Message::confirmed(
                    answer.response_id,
                    Role::Assistant,
                    answer.response,
                    answer.timestamp,
                )));
                self.emit(ViewPatch::Inserted(key));
            }
            Err(err) => {
                warn!(error = %err, "Question submission failed");
                // The question stays visible; the server may or may not have it.
                if let Some(msg) = self.transcript.message_mut(flight.origin) {
                    msg.delivery = Delivery::Failed;
                }
                self.emit(ViewPatch::Updated(flight.origin));

                let key = self.transcript.push(EntryKind::Error(failure_text(&err)));
                self.emit(ViewPatch::Inserted(key));
            }
        }
    }

    fn settle_edit(&mut self, flight: InFlight, result: Result<EditedMessage, BackendError>) {
        let origin = flight.origin;
        match result {
            Ok(edited) => {
                if let Some(msg) = self.transcript.message_mut(origin) {
                    msg.content = edited.content;
                    if !edited.timestamp.is_empty() {
                        msg.timestamp = edited.timestamp;
                    }
                    msg.edited = true;
                    msg.pending_edit = None;
                }
                self.emit(ViewPatch::Updated(origin));

                let removed = self
                    .transcript
                    .remove_following(origin, &edited.deleted_ids);
                for key in removed {
                    // Anything still waiting on a removed message is now stale.
                    self.in_flight.retain(|_, f| f.origin != key);
                    self.emit(ViewPatch::Removed(key));
                }

                if let Some(reply) = edited.new_response {
                    let key = self
                        .transcript
                        .push(EntryKind::Message(Message::from_reply(Role::Assistant, reply)));
                    self.emit(ViewPatch::Inserted(key));
                }
            }
            Err(err) => {
                warn!(error = %err, "Message edit failed");
                if let Some(msg) = self.transcript.message_mut(origin) {
                    msg.pending_edit = None;
                }
                self.emit(ViewPatch::Updated(origin));
                self.emit(ViewPatch::Alert(server_error_or(&err, EDIT_FAILURE)));
            }
        }
    }

    fn settle_thread(&mut self, flight: InFlight, result: Result<ThreadReply, BackendError>) {
        let parent = flight.origin;
        if let Some(indicator) = flight.indicator {
            if self.transcript.remove_from_thread(parent, indicator).is_some() {
                self.emit(ViewPatch::ThreadRemoved {
                    parent,
                    key: indicator,
                });
            }
        }

        let entries = match result {
            Ok(thread) => vec![
                EntryKind::Message(Message::from_reply(Role::User, thread.user_reply)),
                EntryKind::Message(Message::from_reply(Role::Assistant, thread.ai_reply)),
            ],
            Err(err) => {
                warn!(error = %err, "Thread reply failed");
                vec![EntryKind::Error(server_error_or(&err, THREAD_FAILURE))]
            }
        };

        for kind in entries {
            if let Some(key) = self.transcript.push_to_thread(parent, kind) {
                self.emit(ViewPatch::ThreadInserted { parent, key });
            }
        }
    }
}

fn failure_text(err: &BackendError) -> String {
    if err.is_server() {
        err.to_string()
    } else {
        GENERIC_FAILURE.to_string()
    }
}

/// "Error: ..." for server-reported failures, `fallback` for the rest.
fn server_error_or(err: &BackendError, fallback: &str) -> String {
    if err.is_server() {
        format!("Error: {}", err)
    } else {
        fallback.to_string()
    }
}
