use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::backend::ChatBackend;
use crate::error::BackendError;
use crate::types::{
    EditMessageRequest, EditMessageResponse, EditedMessage, SubmitAnswer, SubmitQuestion,
    ThreadReply, ThreadReplyRequest, ThreadReplyResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Header carrying the cross-site request forgery token.
pub const CSRF_HEADER: &str = "X-CSRFToken";

const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// How request bodies are encoded. Responses are always JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `application/x-www-form-urlencoded`, what the site's own pages send.
    #[default]
    Form,
    Json,
}

/// Paths of the chat endpoints, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub chat_submit: String,
    pub thread_reply: String,
    pub edit_message: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            chat_submit: "/ai-tutor/ajax-chat/".to_string(),
            thread_reply: "/ai-tutor/thread-reply/".to_string(),
            edit_message: "/ai-tutor/edit-message/".to_string(),
        }
    }
}

/// HTTP implementation of [`ChatBackend`].
pub struct HttpChatBackend {
    http: reqwest::Client,
    base_url: String,
    csrf_token: Option<String>,
    session_cookie: Option<String>,
    endpoints: Endpoints,
    encoding: BodyEncoding,
}

impl HttpChatBackend {
    /// Creates a backend rooted at `base_url` with the default endpoint paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            csrf_token: None,
            session_cookie: None,
            endpoints: Endpoints::default(),
            encoding: BodyEncoding::default(),
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Sends `cookie` verbatim as the `Cookie` header of every request.
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(self.url(path))
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1);
        request = match self.encoding {
            BodyEncoding::Form => request.form(body),
            BodyEncoding::Json => request.json(body),
        };
        if let Some(token) = &self.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, path, "Backend rejected request");
            return Err(BackendError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for HttpChatBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ChatBackend for HttpChatBackend {
    #[instrument(skip(self, request), fields(subject = ?request.subject))]
    async fn submit_question(&self, request: SubmitQuestion) -> Result<SubmitAnswer, BackendError> {
        debug!("Submitting question");
        let answer: SubmitAnswer = self.post(&self.endpoints.chat_submit, &request).await?;
        debug!(question_id = %answer.question_id, response_id = %answer.response_id, "Question answered");
        Ok(answer)
    }

    #[instrument(skip(self, request), fields(parent = %request.parent_message_id))]
    async fn reply_in_thread(
        &self,
        request: ThreadReplyRequest,
    ) -> Result<ThreadReply, BackendError> {
        debug!("Sending thread reply");
        let response: ThreadReplyResponse =
            self.post(&self.endpoints.thread_reply, &request).await?;
        response.into_result()
    }

    #[instrument(skip(self, request), fields(message = %request.message_id))]
    async fn edit_message(
        &self,
        request: EditMessageRequest,
    ) -> Result<EditedMessage, BackendError> {
        debug!("Editing message");
        let response: EditMessageResponse =
            self.post(&self.endpoints.edit_message, &request).await?;
        let edited = response.into_result()?;
        debug!(deleted = edited.deleted_ids.len(), "Edit confirmed");
        Ok(edited)
    }
}
