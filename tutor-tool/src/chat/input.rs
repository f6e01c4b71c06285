use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::app::{AppMode, ChatApp};

pub fn handle_event(app: &mut ChatApp, event: Event) {
    if let Event::Key(key) = event {
        if key.kind == KeyEventKind::Press {
            handle_key(app, key);
        }
    }
}

fn handle_key(app: &mut ChatApp, key: KeyEvent) {
    match app.mode {
        AppMode::Chat => handle_chat_key(app, key),
        AppMode::Edit(_) => handle_compose_key(app, key, ChatApp::commit_edit, ChatApp::cancel_edit),
        AppMode::Reply(_) => {
            handle_compose_key(app, key, ChatApp::commit_reply, ChatApp::cancel_reply)
        }
        AppMode::SelectSubject | AppMode::SelectSuggestion => handle_popup_key(app, key),
    }
}

fn handle_chat_key(app: &mut ChatApp, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            app.should_quit = true;
        }
        (KeyCode::F(2), _) => {
            app.open_subject_picker();
        }
        (KeyCode::F(3), _) => {
            app.open_suggestions();
        }
        (KeyCode::Enter, KeyModifiers::NONE) => {
            app.send_message();
        }
        (KeyCode::Up, KeyModifiers::CONTROL) => {
            app.scroll_up();
        }
        (KeyCode::Down, KeyModifiers::CONTROL) => {
            app.scroll_down();
        }
        (KeyCode::Up, _) => {
            app.select_prev();
        }
        (KeyCode::Down, _) => {
            app.select_next();
        }
        // Actions on the selected message
        (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
            app.begin_edit();
        }
        (KeyCode::Char('r'), KeyModifiers::CONTROL) => {
            app.begin_reply();
        }
        (KeyCode::Char('y'), KeyModifiers::CONTROL) => {
            app.copy_selected();
        }
        _ => edit_text(app, key),
    }
}

fn handle_compose_key(
    app: &mut ChatApp,
    key: KeyEvent,
    commit: fn(&mut ChatApp),
    cancel: fn(&mut ChatApp),
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => cancel(app),
        (KeyCode::Enter, KeyModifiers::NONE) => commit(app),
        _ => edit_text(app, key),
    }
}

fn edit_text(app: &mut ChatApp, key: KeyEvent) {
    let Some(composer) = app.active_composer_mut() else {
        return;
    };
    match (key.code, key.modifiers) {
        // Plain Enter was taken by the caller; Shift/Alt+Enter breaks the line
        (KeyCode::Enter, _) => composer.newline(),
        (KeyCode::Backspace, _) => composer.backspace(),
        (KeyCode::Delete, _) => composer.delete(),
        (KeyCode::Left, _) => composer.left(),
        (KeyCode::Right, _) => composer.right(),
        (KeyCode::Home, _) => composer.home(),
        (KeyCode::End, _) => composer.end(),
        (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => composer.insert(c),
        _ => {}
    }
}

fn handle_popup_key(app: &mut ChatApp, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_popup(),
        KeyCode::Enter => app.popup_select(),
        KeyCode::Up => app.popup_up(),
        KeyCode::Down => app.popup_down(),
        _ => {}
    }
}
