use std::sync::Arc;

use tracing::debug;
use tutor_chat::{
    ChatWidgetController, Composer, Delivery, Dispatch, EntryKey, Ignored, MessageId, PatchLog,
    Role, Slot, ViewPatch,
};
use tutor_client::HttpChatBackend;

use crate::config::{ChatConfig, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Chat,
    SelectSubject,
    SelectSuggestion,
    /// Editing the given message in the input box.
    Edit(EntryKey),
    /// Writing a reply in the given message's thread.
    Reply(EntryKey),
}

pub struct ChatApp {
    pub mode: AppMode,
    pub should_quit: bool,
    pub controller: ChatWidgetController<HttpChatBackend, PatchLog>,
    pub subjects: Vec<Subject>,
    pub subject: Option<Subject>,
    /// Canned questions offered for one-key submission.
    pub suggestions: Vec<String>,
    /// Message highlighted for edit/reply.
    pub selected: Option<EntryKey>,
    pub messages_scroll: u16,
    pub edit_buffer: Composer,
    pub status: Option<String>,

    // Popup state
    pub popup_selected: usize,
}

impl ChatApp {
    pub fn new(backend: HttpChatBackend, chat: ChatConfig, subject: Option<Subject>) -> Self {
        Self {
            mode: AppMode::Chat,
            should_quit: false,
            controller: ChatWidgetController::new(Arc::new(backend), PatchLog::new()),
            subjects: chat.subjects,
            subject,
            suggestions: chat.suggestions,
            selected: None,
            messages_scroll: 0,
            edit_buffer: Composer::new(),
            status: None,
            popup_selected: 0,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.controller.is_busy(Slot::Submit)
    }

    /// Input box contents for the current mode.
    pub fn active_composer(&self) -> Option<&Composer> {
        match self.mode {
            AppMode::Chat => Some(self.controller.composer()),
            AppMode::Edit(_) => Some(&self.edit_buffer),
            AppMode::Reply(key) => self
                .controller
                .transcript()
                .thread(key)
                .map(|t| &t.composer),
            AppMode::SelectSubject | AppMode::SelectSuggestion => None,
        }
    }

    pub fn active_composer_mut(&mut self) -> Option<&mut Composer> {
        match self.mode {
            AppMode::Chat => Some(self.controller.composer_mut()),
            AppMode::Edit(_) => Some(&mut self.edit_buffer),
            AppMode::Reply(key) => self.controller.thread_composer_mut(key),
            AppMode::SelectSubject | AppMode::SelectSuggestion => None,
        }
    }

    fn subject_id(&self) -> Option<&str> {
        self.subject.as_ref().map(|s| s.id.as_str())
    }

    fn report(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Sent(seq) => {
                debug!(seq, "Request sent");
                self.status = None;
            }
            Dispatch::Ignored(Ignored::EmptyInput) => {}
            Dispatch::Ignored(reason) => self.status = Some(reason.to_string()),
        }
    }

    pub fn send_message(&mut self) {
        let subject = self.subject_id().map(str::to_string);
        let dispatch = self.controller.submit_composer(subject.as_deref());
        self.after_submit(dispatch);
    }

    fn after_submit(&mut self, dispatch: Dispatch) {
        if dispatch.is_sent() {
            self.selected = None;
            self.messages_scroll = 0;
        }
        self.report(dispatch);
    }

    /// Applies whatever responses have arrived and picks up alerts.
    pub fn poll_responses(&mut self) {
        self.controller.poll_completions();

        for patch in self.controller.view_mut().drain() {
            match patch {
                ViewPatch::Alert(message) => self.status = Some(message),
                ViewPatch::Removed(key) if self.selected == Some(key) => self.selected = None,
                _ => {}
            }
        }

        if let AppMode::Edit(key) | AppMode::Reply(key) = self.mode {
            if !self.controller.transcript().contains(key) {
                self.mode = AppMode::Chat;
            }
        }
    }

    fn message_keys(&self) -> Vec<EntryKey> {
        self.controller
            .transcript()
            .messages()
            .map(|(key, _)| key)
            .collect()
    }

    pub fn select_prev(&mut self) {
        let keys = self.message_keys();
        self.selected = match self.selected.and_then(|k| keys.iter().position(|&x| x == k)) {
            Some(0) => keys.first().copied(),
            Some(i) => keys.get(i - 1).copied(),
            None => keys.last().copied(),
        };
    }

    pub fn select_next(&mut self) {
        let keys = self.message_keys();
        self.selected = match self.selected.and_then(|k| keys.iter().position(|&x| x == k)) {
            Some(i) => keys.get(i + 1).copied(),
            None => None,
        };
    }

    fn selected_id(&self) -> Option<(EntryKey, MessageId)> {
        let key = self.selected?;
        let msg = self.controller.transcript().message(key)?;
        Some((key, msg.id.clone()))
    }

    pub fn begin_edit(&mut self) {
        let Some((key, id)) = self.selected_id() else {
            return;
        };
        if id.is_sentinel() {
            self.status = Some(Ignored::Unconfirmed.to_string());
            return;
        }
        let Some(msg) = self.controller.transcript().message(key) else {
            return;
        };
        if msg.role != Role::User {
            self.status = Some(Ignored::NotQuestion.to_string());
            return;
        }
        self.edit_buffer = Composer::with_text(msg.content.clone());
        self.mode = AppMode::Edit(key);
    }

    pub fn commit_edit(&mut self) {
        let AppMode::Edit(key) = self.mode else {
            return;
        };
        self.mode = AppMode::Chat;
        let Some(id) = self
            .controller
            .transcript()
            .message(key)
            .map(|m| m.id.clone())
        else {
            return;
        };
        let content = self.edit_buffer.text().to_string();
        let dispatch = self.controller.edit_message(&id, &content);
        self.report(dispatch);
    }

    pub fn cancel_edit(&mut self) {
        self.edit_buffer.clear();
        self.mode = AppMode::Chat;
    }

    pub fn begin_reply(&mut self) {
        let Some((_, id)) = self.selected_id() else {
            return;
        };
        match self.controller.open_thread(&id) {
            Ok(key) => self.mode = AppMode::Reply(key),
            Err(reason) => self.status = Some(reason.to_string()),
        }
    }

    pub fn commit_reply(&mut self) {
        let AppMode::Reply(key) = self.mode else {
            return;
        };
        self.mode = AppMode::Chat;
        let Some(id) = self
            .controller
            .transcript()
            .message(key)
            .map(|m| m.id.clone())
        else {
            return;
        };
        let dispatch = self.controller.reply_from_composer(&id);
        self.report(dispatch);
    }

    pub fn cancel_reply(&mut self) {
        if let AppMode::Reply(key) = self.mode {
            self.controller.close_thread(key);
        }
        self.mode = AppMode::Chat;
    }

    /// Text of the selected message, for the clipboard.
    pub fn selected_text(&self) -> Option<&str> {
        let key = self.selected?;
        self.controller
            .transcript()
            .message(key)
            .map(|m| m.content.as_str())
    }

    pub fn copy_selected(&mut self) {
        let Some(text) = self.selected_text().map(str::to_string) else {
            return;
        };
        self.status = Some(match super::copy_to_clipboard(&text) {
            Ok(()) => "Copied to clipboard".to_string(),
            Err(e) => {
                debug!(error = %e, "Clipboard write failed");
                "Failed to copy response to clipboard".to_string()
            }
        });
    }

    pub fn open_subject_picker(&mut self) {
        if self.subjects.is_empty() {
            self.status = Some("No subjects configured".to_string());
            return;
        }
        self.popup_selected = self
            .subject
            .as_ref()
            .and_then(|s| self.subjects.iter().position(|x| x == s))
            .unwrap_or(0);
        self.mode = AppMode::SelectSubject;
    }

    pub fn open_suggestions(&mut self) {
        if self.suggestions.is_empty() || self.is_waiting() {
            return;
        }
        self.popup_selected = 0;
        self.mode = AppMode::SelectSuggestion;
    }

    fn popup_len(&self) -> usize {
        match self.mode {
            AppMode::SelectSubject => self.subjects.len(),
            AppMode::SelectSuggestion => self.suggestions.len(),
            _ => 0,
        }
    }

    pub fn close_popup(&mut self) {
        self.mode = AppMode::Chat;
    }

    pub fn popup_up(&mut self) {
        if self.popup_selected > 0 {
            self.popup_selected -= 1;
        }
    }

    pub fn popup_down(&mut self) {
        if self.popup_selected + 1 < self.popup_len() {
            self.popup_selected += 1;
        }
    }

    pub fn popup_select(&mut self) {
        let mode = self.mode;
        self.close_popup();
        match mode {
            AppMode::SelectSubject => {
                if let Some(subject) = self.subjects.get(self.popup_selected) {
                    self.subject = Some(subject.clone());
                }
            }
            AppMode::SelectSuggestion => {
                // Submitted as if typed, replacing any draft.
                if let Some(question) = self.suggestions.get(self.popup_selected).cloned() {
                    let subject = self.subject_id().map(str::to_string);
                    let dispatch = self.controller.submit(&question, subject.as_deref());
                    self.after_submit(dispatch);
                }
            }
            _ => {}
        }
    }

    pub fn scroll_up(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_add(1);
    }

    pub fn scroll_down(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_sub(1);
    }

    /// Questions asked this session and how many never reached the server.
    pub fn delivery_summary(&self) -> (usize, usize) {
        let questions: Vec<Delivery> = self
            .controller
            .transcript()
            .messages()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(_, m)| m.delivery)
            .collect();
        let failed = questions
            .iter()
            .filter(|d| **d == Delivery::Failed)
            .count();
        (questions.len(), failed)
    }
}
