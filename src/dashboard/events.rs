use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};

use super::app::App;

pub fn handle_key_event(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') => {
            app.focus_left();
        }
        KeyCode::Right | KeyCode::Char('l') => {
            app.focus_right();
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            app.toggle_drag();
        }
        KeyCode::Esc => {
            app.cancel_drag();
        }
        KeyCode::Char('r') => {
            app.refresh_all();
        }
        _ => {}
    }
}

pub fn handle_mouse_event(mouse: MouseEvent, app: &mut App) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.pointer_down(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.pointer_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.pointer_up(mouse.column, mouse.row),
        _ => {}
    }
}
