use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] tutor_client::BackendError),

    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
