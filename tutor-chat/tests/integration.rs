//! Controller tests against a scripted in-memory backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tutor_chat::{
    ChatWidgetController, Delivery, Dispatch, EDIT_FAILURE, EntryKind, GENERIC_FAILURE, Ignored,
    MessageId, PatchLog, Role, Settled, Slot, THREAD_FAILURE, Transcript, ViewPatch,
};
use tutor_client::{
    BackendError, ChatBackend, EditMessageRequest, EditedMessage, Reply, ServerId, SubmitAnswer,
    SubmitQuestion, ThreadReply, ThreadReplyRequest,
};

struct Scripted<T> {
    gate: Option<oneshot::Receiver<()>>,
    result: Result<T, BackendError>,
}

#[derive(Default)]
struct ScriptedBackend {
    submits: Mutex<VecDeque<Scripted<SubmitAnswer>>>,
    replies: Mutex<VecDeque<Scripted<ThreadReply>>>,
    edits: Mutex<VecDeque<Scripted<EditedMessage>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn push<T>(queue: &Mutex<VecDeque<Scripted<T>>>, result: Result<T, BackendError>) {
        queue.lock().unwrap().push_back(Scripted { gate: None, result });
    }

    /// Queues a result that is only delivered once the returned sender fires.
    fn push_gated<T>(
        queue: &Mutex<VecDeque<Scripted<T>>>,
        result: Result<T, BackendError>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        queue.lock().unwrap().push_back(Scripted {
            gate: Some(rx),
            result,
        });
        tx
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

async fn run<T>(queue: &Mutex<VecDeque<Scripted<T>>>) -> Result<T, BackendError> {
    let scripted = queue.lock().unwrap().pop_front();
    let Some(Scripted { gate, result }) = scripted else {
        return Err(BackendError::Status { status: 500 });
    };
    if let Some(gate) = gate {
        let _ = gate.await;
    }
    result
}

impl ChatBackend for ScriptedBackend {
    async fn submit_question(&self, request: SubmitQuestion) -> Result<SubmitAnswer, BackendError> {
        self.record(format!(
            "submit:{}|{}",
            request.question,
            request.subject.as_deref().unwrap_or("")
        ));
        run(&self.submits).await
    }

    async fn reply_in_thread(&self, request: ThreadReplyRequest) -> Result<ThreadReply, BackendError> {
        self.record(format!(
            "reply:{}|{}",
            request.parent_message_id, request.content
        ));
        run(&self.replies).await
    }

    async fn edit_message(&self, request: EditMessageRequest) -> Result<EditedMessage, BackendError> {
        self.record(format!("edit:{}|{}", request.message_id, request.content));
        run(&self.edits).await
    }
}

type Controller = ChatWidgetController<ScriptedBackend, PatchLog>;

fn setup() -> (Arc<ScriptedBackend>, Controller) {
    let backend = Arc::new(ScriptedBackend::default());
    let controller = ChatWidgetController::new(Arc::clone(&backend), PatchLog::new());
    (backend, controller)
}

fn answer(question_id: u64, response_id: u64, response: &str) -> SubmitAnswer {
    SubmitAnswer {
        response: response.to_string(),
        timestamp: "3:04 PM".to_string(),
        question_id: ServerId::new(question_id.to_string()),
        response_id: ServerId::new(response_id.to_string()),
    }
}

fn reply(id: u64, content: &str) -> Reply {
    Reply {
        id: ServerId::new(id.to_string()),
        content: content.to_string(),
        timestamp: "3:05 PM".to_string(),
    }
}

fn describe(kind: &EntryKind) -> String {
    match kind {
        EntryKind::Message(msg) => {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{}#{}:{}", role, msg.id, msg.content)
        }
        EntryKind::Typing => "typing".to_string(),
        EntryKind::Error(text) => format!("error:{}", text),
    }
}

fn rows(transcript: &Transcript) -> Vec<String> {
    transcript.entries().iter().map(|e| describe(&e.kind)).collect()
}

fn thread_rows(transcript: &Transcript, parent_id: &str) -> Vec<String> {
    let parent = transcript.find(&ServerId::new(parent_id)).unwrap();
    transcript
        .thread(parent)
        .map(|t| t.entries().iter().map(|e| describe(&e.kind)).collect())
        .unwrap_or_default()
}

/// Submits a question and waits for its scripted answer.
async fn exchange(
    backend: &ScriptedBackend,
    controller: &mut Controller,
    question: &str,
    ids: (u64, u64),
    response: &str,
) {
    ScriptedBackend::push(&backend.submits, Ok(answer(ids.0, ids.1, response)));
    assert!(controller.submit(question, None).is_sent());
    assert!(matches!(
        controller.next_completion().await,
        Some(Settled::Applied(_))
    ));
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let (backend, mut controller) = setup();

    assert_eq!(
        controller.submit("   \t ", Some("biology")),
        Dispatch::Ignored(Ignored::EmptyInput)
    );
    assert_eq!(
        controller.submit_composer(None),
        Dispatch::Ignored(Ignored::EmptyInput)
    );

    assert!(controller.transcript().is_empty());
    assert_eq!(controller.outstanding(), 0);
    assert_eq!(controller.next_completion().await, None);
    assert!(controller.view().patches().is_empty());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn submit_shows_question_then_answer() {
    let (backend, mut controller) = setup();
    ScriptedBackend::push(
        &backend.submits,
        Ok(answer(41, 42, "Plants turn light into sugar.")),
    );

    for c in "What is photosynthesis?".chars() {
        controller.composer_mut().insert(c);
    }
    let dispatch = controller.submit_composer(Some("biology"));
    assert_eq!(dispatch, Dispatch::Sent(1));

    // Optimistic state, before any response.
    assert_eq!(
        rows(controller.transcript()),
        vec!["user#temp-message:What is photosynthesis?", "typing"]
    );
    assert_eq!(controller.composer().text(), "");
    assert_eq!(controller.transcript().pending_count(), 1);
    assert!(controller.is_busy(Slot::Submit));

    assert_eq!(
        controller.next_completion().await,
        Some(Settled::Applied(1))
    );
    assert_eq!(
        rows(controller.transcript()),
        vec![
            "user#41:What is photosynthesis?",
            "assistant#42:Plants turn light into sugar."
        ]
    );
    let (_, question) = controller.transcript().messages().next().unwrap();
    assert_eq!(question.delivery, Delivery::Confirmed);
    assert!(!controller.is_busy(Slot::Submit));
    assert_eq!(
        backend.calls(),
        vec!["submit:What is photosynthesis?|biology"]
    );
}

#[tokio::test]
async fn submit_patches_follow_model_changes() {
    let (backend, mut controller) = setup();
    ScriptedBackend::push(&backend.submits, Ok(answer(41, 42, "Answer")));

    controller.submit("Question", None);
    controller.next_completion().await;

    let keys: Vec<_> = controller.transcript().entries().iter().map(|e| e.key).collect();
    let patches = controller.view_mut().drain();
    assert_eq!(patches.len(), 6);
    assert_eq!(patches[0], ViewPatch::Inserted(keys[0]));
    assert_eq!(patches[1], ViewPatch::ComposerCleared);
    assert!(matches!(patches[2], ViewPatch::Inserted(_)));
    assert!(matches!(patches[3], ViewPatch::Removed(_)));
    assert_eq!(patches[4], ViewPatch::Updated(keys[0]));
    assert_eq!(patches[5], ViewPatch::Inserted(keys[1]));
}

#[tokio::test]
async fn failed_submit_keeps_question_and_adds_one_error() {
    let (backend, mut controller) = setup();
    ScriptedBackend::push(&backend.submits, Err(BackendError::Status { status: 502 }));

    controller.submit("What is photosynthesis?", None);
    controller.next_completion().await;

    assert_eq!(
        rows(controller.transcript()),
        vec![
            "user#temp-message:What is photosynthesis?".to_string(),
            format!("error:{}", GENERIC_FAILURE),
        ]
    );
    let (_, question) = controller.transcript().messages().next().unwrap();
    assert_eq!(question.delivery, Delivery::Failed);
    assert_eq!(controller.transcript().pending_count(), 0);
}

#[tokio::test]
async fn server_error_text_is_shown() {
    let (backend, mut controller) = setup();
    ScriptedBackend::push(
        &backend.submits,
        Err(BackendError::Server("Daily question limit reached".to_string())),
    );

    controller.submit("One more?", None);
    controller.next_completion().await;

    let last = controller.transcript().entries().last().unwrap();
    assert_eq!(
        last.kind,
        EntryKind::Error("Daily question limit reached".to_string())
    );
}

#[tokio::test]
async fn only_one_optimistic_message_at_a_time() {
    let (backend, mut controller) = setup();
    let gate = ScriptedBackend::push_gated(&backend.submits, Ok(answer(41, 42, "First answer")));

    assert!(controller.submit("First", None).is_sent());
    assert_eq!(
        controller.submit("Second", None),
        Dispatch::Ignored(Ignored::InFlight)
    );
    assert_eq!(controller.transcript().pending_count(), 1);

    gate.send(()).unwrap();
    controller.next_completion().await;

    ScriptedBackend::push(&backend.submits, Ok(answer(43, 44, "Second answer")));
    assert!(controller.submit("Second", None).is_sent());
    controller.next_completion().await;

    assert_eq!(
        rows(controller.transcript()),
        vec![
            "user#41:First",
            "assistant#42:First answer",
            "user#43:Second",
            "assistant#44:Second answer"
        ]
    );
}

#[tokio::test]
async fn edit_replaces_content_and_drops_listed_messages() {
    let (backend, mut controller) = setup();
    exchange(&backend, &mut controller, "Q1", (40, 41), "A1").await;
    exchange(&backend, &mut controller, "What is photosynthesis?", (42, 43), "A2").await;
    exchange(&backend, &mut controller, "Q3", (44, 45), "A3").await;

    ScriptedBackend::push(
        &backend.edits,
        Ok(EditedMessage {
            content: "What is respiration?".to_string(),
            timestamp: "3:10 PM".to_string(),
            deleted_ids: vec![ServerId::new("43"), ServerId::new("44"), ServerId::new("45")],
            new_response: Some(reply(46, "Cells release energy from sugar.")),
        }),
    );

    let id = MessageId::from("42");
    assert!(controller.edit_message(&id, "What is respiration?").is_sent());

    let key = controller.transcript().find(&ServerId::new("42")).unwrap();
    let msg = controller.transcript().message(key).unwrap();
    assert!(msg.is_editing());
    assert_eq!(msg.content, "What is photosynthesis?");

    controller.next_completion().await;

    assert_eq!(
        rows(controller.transcript()),
        vec![
            "user#40:Q1",
            "assistant#41:A1",
            "user#42:What is respiration?",
            "assistant#46:Cells release energy from sugar."
        ]
    );
    let msg = controller.transcript().message(key).unwrap();
    assert!(msg.edited);
    assert!(!msg.is_editing());
    assert_eq!(msg.timestamp, "3:10 PM");
    assert!(backend.calls().contains(&"edit:42|What is respiration?".to_string()));
}

#[tokio::test]
async fn editing_sentinel_is_noop() {
    let (backend, mut controller) = setup();
    let _gate = ScriptedBackend::push_gated(&backend.submits, Ok(answer(41, 42, "Answer")));
    controller.submit("Pending question", None);
    let before = rows(controller.transcript());
    let patch_count = controller.view().patches().len();

    assert_eq!(
        controller.edit_message(&MessageId::Temp, "Changed"),
        Dispatch::Ignored(Ignored::Unconfirmed)
    );
    assert_eq!(
        controller.edit_message(&MessageId::from("temp-message"), "Changed"),
        Dispatch::Ignored(Ignored::Unconfirmed)
    );

    assert_eq!(rows(controller.transcript()), before);
    assert_eq!(controller.view().patches().len(), patch_count);
    assert_eq!(controller.outstanding(), 1);
}

#[tokio::test]
async fn edit_of_unknown_message_is_ignored() {
    let (_backend, mut controller) = setup();
    assert_eq!(
        controller.edit_message(&MessageId::from("999"), "Anything"),
        Dispatch::Ignored(Ignored::UnknownMessage)
    );
}

#[tokio::test]
async fn only_questions_can_be_edited() {
    let (backend, mut controller) = setup();
    exchange(&backend, &mut controller, "Question", (40, 41), "Answer").await;
    let patch_count = controller.view().patches().len();

    assert_eq!(
        controller.edit_message(&MessageId::from("41"), "rewrite the answer"),
        Dispatch::Ignored(Ignored::NotQuestion)
    );

    let key = controller.transcript().find(&ServerId::new("41")).unwrap();
    assert!(!controller.transcript().message(key).unwrap().is_editing());
    assert_eq!(controller.view().patches().len(), patch_count);
    assert_eq!(controller.outstanding(), 0);
    assert!(!backend.calls().iter().any(|c| c.starts_with("edit:")));
}

#[tokio::test]
async fn answer_without_timestamp_gets_local_time() {
    let (backend, mut controller) = setup();
    let mut untimed = answer(40, 41, "Answer");
    untimed.timestamp = String::new();
    ScriptedBackend::push(&backend.submits, Ok(untimed));
    controller.submit("Question", None);
    controller.next_completion().await;

    let key = controller.transcript().find(&ServerId::new("41")).unwrap();
    let timestamp = &controller.transcript().message(key).unwrap().timestamp;
    assert!(timestamp.ends_with("AM") || timestamp.ends_with("PM"));
}

#[tokio::test]
async fn transport_failures_use_action_specific_text() {
    let (backend, mut controller) = setup();
    exchange(&backend, &mut controller, "Question", (40, 41), "Answer").await;

    ScriptedBackend::push(&backend.edits, Err(BackendError::Status { status: 500 }));
    assert!(controller.edit_message(&MessageId::from("40"), "Changed").is_sent());
    controller.next_completion().await;
    let alerts: Vec<_> = controller.view().alerts().collect();
    assert_eq!(alerts, vec![EDIT_FAILURE]);

    ScriptedBackend::push(&backend.replies, Err(BackendError::Status { status: 502 }));
    assert!(controller.reply_in_thread(&MessageId::from("41"), "Why?").is_sent());
    controller.next_completion().await;
    assert_eq!(
        thread_rows(controller.transcript(), "41"),
        vec![format!("error:{}", THREAD_FAILURE)]
    );
}

#[tokio::test]
async fn failed_edit_restores_content_exactly() {
    let (backend, mut controller) = setup();
    let original = "What  is\tphotosynthesis? 🌱 (p. 42)";
    exchange(&backend, &mut controller, original, (42, 43), "Answer").await;

    ScriptedBackend::push(
        &backend.edits,
        Err(BackendError::Server("Edit window expired".to_string())),
    );
    let dispatch = controller.edit_message(&MessageId::from("42"), "Something else");
    assert!(dispatch.is_sent());
    controller.next_completion().await;

    let key = controller.transcript().find(&ServerId::new("42")).unwrap();
    let msg = controller.transcript().message(key).unwrap();
    assert_eq!(msg.content.as_bytes(), original.as_bytes());
    assert!(!msg.edited);
    assert!(!msg.is_editing());
    assert_eq!(controller.transcript().len(), 2);

    let alerts: Vec<_> = controller.view().alerts().collect();
    assert_eq!(alerts, vec!["Error: Edit window expired"]);
}

#[tokio::test]
async fn thread_needs_existing_assistant_parent() {
    let (backend, mut controller) = setup();

    // Nothing exists yet.
    assert_eq!(
        controller.reply_in_thread(&MessageId::from("41"), "Why?"),
        Dispatch::Ignored(Ignored::UnknownMessage)
    );
    assert_eq!(
        controller.open_thread(&MessageId::Temp),
        Err(Ignored::Unconfirmed)
    );

    exchange(&backend, &mut controller, "Question", (40, 41), "Answer").await;

    assert_eq!(
        controller.reply_in_thread(&MessageId::from("40"), "Why?"),
        Dispatch::Ignored(Ignored::NotAssistant)
    );
    assert_eq!(
        controller.reply_in_thread(&MessageId::from("41"), "  "),
        Dispatch::Ignored(Ignored::EmptyInput)
    );
    assert!(thread_rows(controller.transcript(), "41").is_empty());
    assert!(!backend.calls().iter().any(|c| c.starts_with("reply:")));
}

#[tokio::test]
async fn thread_reply_appends_echo_and_answer() {
    let (backend, mut controller) = setup();
    exchange(&backend, &mut controller, "What is photosynthesis?", (40, 41), "Light to sugar.").await;

    let parent = controller.open_thread(&MessageId::from("41")).unwrap();
    assert!(controller.transcript().thread(parent).unwrap().composer_open);
    for c in "Why are leaves green?".chars() {
        controller.thread_composer_mut(parent).unwrap().insert(c);
    }

    ScriptedBackend::push(
        &backend.replies,
        Ok(ThreadReply {
            user_reply: reply(50, "Why are leaves green?"),
            ai_reply: reply(51, "Chlorophyll reflects green light."),
        }),
    );
    assert!(controller.reply_from_composer(&MessageId::from("41")).is_sent());

    // No optimistic reply, only the thread-local indicator.
    assert_eq!(thread_rows(controller.transcript(), "41"), vec!["typing"]);
    let thread = controller.transcript().thread(parent).unwrap();
    assert!(!thread.composer_open);
    assert_eq!(thread.composer.text(), "");

    controller.next_completion().await;

    assert_eq!(
        thread_rows(controller.transcript(), "41"),
        vec![
            "user#50:Why are leaves green?",
            "assistant#51:Chlorophyll reflects green light."
        ]
    );
    assert_eq!(controller.transcript().len(), 2);
    assert!(backend.calls().contains(&"reply:41|Why are leaves green?".to_string()));
}

#[tokio::test]
async fn failed_thread_reply_stays_in_thread() {
    let (backend, mut controller) = setup();
    exchange(&backend, &mut controller, "Question", (40, 41), "Answer").await;

    ScriptedBackend::push(
        &backend.replies,
        Err(BackendError::Server("Thread is locked".to_string())),
    );
    controller.reply_in_thread(&MessageId::from("41"), "Follow-up");
    controller.next_completion().await;

    assert_eq!(
        thread_rows(controller.transcript(), "41"),
        vec!["error:Error: Thread is locked"]
    );
    assert_eq!(
        rows(controller.transcript()),
        vec!["user#40:Question", "assistant#41:Answer"]
    );
}

#[tokio::test]
async fn out_of_order_responses_attach_to_their_origin() {
    let (backend, mut controller) = setup();
    exchange(&backend, &mut controller, "Q1", (40, 41), "A1").await;

    let gate = ScriptedBackend::push_gated(&backend.submits, Ok(answer(42, 43, "A2")));
    let submit = controller.submit("Q2", None).seq().unwrap();

    ScriptedBackend::push(
        &backend.replies,
        Ok(ThreadReply {
            user_reply: reply(50, "About A1"),
            ai_reply: reply(51, "Reply to A1"),
        }),
    );
    let thread = controller
        .reply_in_thread(&MessageId::from("41"), "About A1")
        .seq()
        .unwrap();
    assert!(thread > submit);

    // The later request finishes first.
    assert_eq!(
        controller.next_completion().await,
        Some(Settled::Applied(thread))
    );
    assert_eq!(
        rows(controller.transcript()),
        vec!["user#40:Q1", "assistant#41:A1", "user#temp-message:Q2", "typing"]
    );

    gate.send(()).unwrap();
    assert_eq!(
        controller.next_completion().await,
        Some(Settled::Applied(submit))
    );

    assert_eq!(
        rows(controller.transcript()),
        vec!["user#40:Q1", "assistant#41:A1", "user#42:Q2", "assistant#43:A2"]
    );
    assert_eq!(
        thread_rows(controller.transcript(), "41"),
        vec!["user#50:About A1", "assistant#51:Reply to A1"]
    );
}

#[tokio::test]
async fn response_for_removed_message_is_stale() {
    let (backend, mut controller) = setup();
    exchange(&backend, &mut controller, "Q1", (40, 41), "A1").await;
    exchange(&backend, &mut controller, "Q2", (42, 43), "A2").await;
    let q2 = controller.transcript().find(&ServerId::new("42")).unwrap();
    let asked_at = controller.transcript().message(q2).unwrap().timestamp.clone();

    let gate = ScriptedBackend::push_gated(
        &backend.replies,
        Ok(ThreadReply {
            user_reply: reply(50, "Late"),
            ai_reply: reply(51, "Too late"),
        }),
    );
    let thread = controller
        .reply_in_thread(&MessageId::from("43"), "Late")
        .seq()
        .unwrap();

    ScriptedBackend::push(
        &backend.edits,
        Ok(EditedMessage {
            content: "Q2 revised".to_string(),
            timestamp: String::new(),
            deleted_ids: vec![ServerId::new("43")],
            new_response: Some(reply(44, "A2 revised")),
        }),
    );
    let edit = controller
        .edit_message(&MessageId::from("42"), "Q2 revised")
        .seq()
        .unwrap();

    assert_eq!(
        controller.next_completion().await,
        Some(Settled::Applied(edit))
    );

    gate.send(()).unwrap();
    assert_eq!(
        controller.next_completion().await,
        Some(Settled::Stale(thread))
    );
    assert_eq!(controller.next_completion().await, None);

    let transcript = controller.transcript();
    assert_eq!(
        rows(transcript),
        vec!["user#40:Q1", "assistant#41:A1", "user#42:Q2 revised", "assistant#44:A2 revised"]
    );
    assert!(transcript.entries().iter().all(|e| transcript.thread(e.key).is_none()));
    // Empty timestamp from the server keeps the original one.
    assert_eq!(transcript.message(q2).unwrap().timestamp, asked_at);
}
