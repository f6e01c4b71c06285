mod config;
mod error;
mod logging;

#[cfg(feature = "chat")]
mod chat;

use clap::{Parser, Subcommand};
use tracing::info;
use tutor_client::{ChatBackend, SubmitQuestion};

use crate::config::{load_config, resolve_connection, ConnectionArgs};
use crate::error::ToolError;

#[derive(Parser)]
#[command(name = "tutor")]
#[command(about = "Terminal client for the AI tutor chat", long_about = None)]
struct Cli {
    /// Base URL of the tutoring site
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// CSRF token sent with every request
    #[arg(long, global = true)]
    csrf_token: Option<String>,

    /// Cookie header value identifying the logged-in session
    #[arg(long, global = true)]
    session_cookie: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[cfg(feature = "chat")]
    /// Start an interactive chat session
    Chat {
        /// Subject id or name sent along with each question
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Ask a single question and print the answer
    Ask {
        question: String,

        /// Subject id or name sent along with the question
        #[arg(short, long)]
        subject: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = logging::init()?;
    let config = load_config();
    let connection = resolve_connection(
        &config,
        ConnectionArgs {
            base_url: cli.base_url,
            csrf_token: cli.csrf_token,
            session_cookie: cli.session_cookie,
        },
    );
    info!(base_url = %connection.base_url, log = %log_path.display(), "Starting tutor");
    let backend = connection.into_backend();
    let chat_config = config.chat;

    match cli.command {
        #[cfg(feature = "chat")]
        Command::Chat { subject } => {
            let subject = subject
                .or_else(|| chat_config.default_subject.clone())
                .map(|key| chat_config.subject(&key));
            chat::run(backend, chat_config, subject).await?;
        }
        Command::Ask { question, subject } => {
            let question = question.trim();
            if question.is_empty() {
                return Err(ToolError::EmptyQuestion.into());
            }
            let answer = backend
                .submit_question(SubmitQuestion {
                    question: question.to_string(),
                    subject: subject
                        .or_else(|| chat_config.default_subject.clone())
                        .map(|key| chat_config.subject(&key).id),
                })
                .await
                .map_err(ToolError::from)?;
            println!("{}", answer.response);
        }
    }

    Ok(())
}
