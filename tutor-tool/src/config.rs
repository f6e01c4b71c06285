use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;
use tutor_client::serde_helpers::string_or_number;
use tutor_client::{BodyEncoding, Endpoints, HttpChatBackend};

use crate::error::ToolError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const DEFAULT_SUGGESTIONS: &[&str] = &[
    "Can you explain this topic step by step?",
    "Give me a practice question on this subject.",
    "What are the key points I should remember?",
    "How do I check my answer?",
];

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
    /// Request body format, `form` unless the backend wants `json`.
    #[serde(default)]
    pub encoding: EncodingConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncodingConfig {
    #[default]
    Form,
    Json,
}

impl From<EncodingConfig> for BodyEncoding {
    fn from(encoding: EncodingConfig) -> Self {
        match encoding {
            EncodingConfig::Form => BodyEncoding::Form,
            EncodingConfig::Json => BodyEncoding::Json,
        }
    }
}

/// Overrides for individual endpoint paths.
#[derive(Debug, Deserialize, Default)]
pub struct EndpointsConfig {
    pub chat_submit: Option<String>,
    pub thread_reply: Option<String>,
    pub edit_message: Option<String>,
}

impl EndpointsConfig {
    pub fn resolve(&self) -> Endpoints {
        let defaults = Endpoints::default();
        Endpoints {
            chat_submit: self.chat_submit.clone().unwrap_or(defaults.chat_submit),
            thread_reply: self.thread_reply.clone().unwrap_or(defaults.thread_reply),
            edit_message: self.edit_message.clone().unwrap_or(defaults.edit_message),
        }
    }
}

/// A subject as the backend identifies it. Only the id goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SubjectEntry")]
pub struct Subject {
    pub id: String,
    pub name: String,
}

impl Subject {
    /// A subject known only by its id.
    pub fn bare(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
        }
    }
}

/// `"3"`, `3` or `{ id = 3, name = "Biology" }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SubjectEntry {
    Named {
        #[serde(deserialize_with = "string_or_number::deserialize")]
        id: String,
        name: String,
    },
    Id(#[serde(deserialize_with = "string_or_number::deserialize")] String),
}

impl From<SubjectEntry> for Subject {
    fn from(entry: SubjectEntry) -> Self {
        match entry {
            SubjectEntry::Named { id, name } => Subject { id, name },
            SubjectEntry::Id(id) => Subject::bare(id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    /// Id or name of the subject to start with.
    pub default_subject: Option<String>,
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            subjects: Vec::new(),
            default_subject: None,
            suggestions: default_suggestions(),
        }
    }
}

impl ChatConfig {
    /// Looks `key` up by id, then by name ignoring case. Unknown keys are
    /// taken to be ids.
    pub fn subject(&self, key: &str) -> Subject {
        self.subjects
            .iter()
            .find(|s| s.id == key)
            .or_else(|| self.subjects.iter().find(|s| s.name.eq_ignore_ascii_case(key)))
            .cloned()
            .unwrap_or_else(|| Subject::bare(key))
    }
}

fn default_suggestions() -> Vec<String> {
    DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tutor").join("config.toml"))
}

pub fn load_config_from(path: &Path) -> Result<Config, ToolError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Loads the user config, falling back to defaults when it is missing or broken.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }

    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            Config::default()
        }
    }
}

/// Where and how to reach the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
    pub endpoints: Endpoints,
    pub encoding: BodyEncoding,
}

impl Connection {
    pub fn into_backend(self) -> HttpChatBackend {
        let mut backend = HttpChatBackend::new(self.base_url)
            .with_endpoints(self.endpoints)
            .with_encoding(self.encoding);
        if let Some(token) = self.csrf_token {
            backend = backend.with_csrf_token(token);
        }
        if let Some(cookie) = self.session_cookie {
            backend = backend.with_session_cookie(cookie);
        }
        backend
    }
}

/// Command-line overrides.
#[derive(Debug, Default)]
pub struct ConnectionArgs {
    pub base_url: Option<String>,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn resolve_connection(config: &Config, args: ConnectionArgs) -> Connection {
    resolve_connection_with(config, args, env_var)
}

/// Flags win over environment variables, which win over the config file.
fn resolve_connection_with(
    config: &Config,
    args: ConnectionArgs,
    env: impl Fn(&str) -> Option<String>,
) -> Connection {
    let env = |name: &str| env(name).filter(|v| !v.is_empty());

    let base_url = args
        .base_url
        .or_else(|| env("TUTOR_BASE_URL"))
        .or_else(|| config.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let csrf_token = args
        .csrf_token
        .or_else(|| env("TUTOR_CSRF_TOKEN"))
        .or_else(|| config.csrf_token.clone());
    let session_cookie = args
        .session_cookie
        .or_else(|| env("TUTOR_SESSION_COOKIE"))
        .or_else(|| config.session_cookie.clone());

    Connection {
        base_url,
        csrf_token,
        session_cookie,
        endpoints: config.endpoints.resolve(),
        encoding: config.encoding.into(),
    }
}
