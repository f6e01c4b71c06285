mod app;
mod input;
mod ui;

use std::io;
use std::time::Duration;

use crossterm::{
    clipboard::CopyToClipboard,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::prelude::*;
use tutor_client::HttpChatBackend;

pub use app::ChatApp;

use crate::config::{ChatConfig, Subject};
use crate::error::ToolError;

pub async fn run(
    backend: HttpChatBackend,
    chat: ChatConfig,
    subject: Option<Subject>,
) -> Result<(), ToolError> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    // Needed to tell Shift+Enter from Enter
    let enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if enhanced {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
    }

    let backend_ui = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_ui)?;

    let mut app = ChatApp::new(backend, chat, subject);

    let result = run_loop(&mut terminal, &mut app).await;

    // Restore terminal
    if enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let (sent, failed) = app.delivery_summary();
    if sent > 0 {
        println!("Asked {} question(s), {} not delivered.", sent, failed);
    }

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut ChatApp,
) -> Result<(), ToolError> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        // Poll for events with timeout so responses are picked up promptly
        if event::poll(Duration::from_millis(50))? {
            let event = event::read()?;
            input::handle_event(app, event);
        }

        app.poll_responses();

        if app.should_quit {
            break;
        }

        // Let spawned requests make progress between frames
        tokio::task::yield_now().await;
    }

    Ok(())
}

/// Puts `text` on the system clipboard through the terminal (OSC 52), which
/// also works over SSH.
fn copy_to_clipboard(text: &str) -> io::Result<()> {
    execute!(io::stdout(), CopyToClipboard::to_clipboard_from(text))
}
