use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, DetailTab, DraftField, InputMode, Screen, WizardStep};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
    app.poll_tasks().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Screen switching, shared by every screen
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('r') => {
            app.session.toggle_role();
            return;
        }
        KeyCode::Char('D') => {
            app.go_to(Screen::Dashboard);
            return;
        }
        KeyCode::Char('C') => {
            app.go_to(Screen::Create);
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Browse => handle_browse_normal(app, key),
        Screen::Detail => handle_detail_normal(app, key),
        Screen::Create => handle_create_normal(app, key),
        Screen::Dashboard => handle_dashboard_normal(app, key),
    }
}

fn handle_browse_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.browse_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.browse_nav_up(),
        KeyCode::Char('g') => {
            if !app.visible_ids.is_empty() {
                app.browse_state.select(Some(0));
            }
        }
        KeyCode::Char('G') => {
            if !app.visible_ids.is_empty() {
                app.browse_state.select(Some(app.visible_ids.len() - 1));
            }
        }

        // Sector filter bar
        KeyCode::Tab | KeyCode::Char(']') | KeyCode::Char('l') | KeyCode::Right => {
            app.next_sector_filter()
        }
        KeyCode::BackTab | KeyCode::Char('[') | KeyCode::Char('h') | KeyCode::Left => {
            app.prev_sector_filter()
        }

        KeyCode::Enter => {
            if let Some(id) = app.selected_browse_id() {
                app.open_listing(&id);
            }
        }

        KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Esc => {
            if !app.search_input.is_empty() {
                app.search_input.clear();
                app.refresh_browse();
            }
        }

        _ => {}
    }
}

fn handle_detail_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace => app.go_to(Screen::Browse),

        KeyCode::Tab => app.detail_tab = app.detail_tab.next(),
        KeyCode::Char('1') => app.detail_tab = DetailTab::Overview,
        KeyCode::Char('2') => app.detail_tab = DetailTab::Demo,
        KeyCode::Char('3') => app.detail_tab = DetailTab::Reviews,

        // Checkout
        KeyCode::Char('p') => app.plan = app.plan.toggled(),
        KeyCode::Char('b') => app.start_purchase(),

        // Demo chat
        KeyCode::Char('i') | KeyCode::Char('a') => {
            if app.current_listing().is_some() {
                app.detail_tab = DetailTab::Demo;
                app.input_mode = InputMode::Editing;
                app.chat_cursor = app.chat_input.chars().count();
            }
        }
        KeyCode::Char('s') if app.detail_tab == DetailTab::Demo => {
            app.fill_seed_prompt();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('f') if app.detail_tab == DetailTab::Demo => {
            app.fill_next_quick_prompt();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('j') | KeyCode::Down if app.detail_tab == DetailTab::Demo => {
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up if app.detail_tab == DetailTab::Demo => {
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        KeyCode::Char('G') if app.detail_tab == DetailTab::Demo => app.scroll_chat_to_bottom(),

        _ => {}
    }
}

fn handle_create_normal(app: &mut App, key: KeyEvent) {
    match app.wizard_step {
        WizardStep::Idea => match key.code {
            KeyCode::Esc => app.go_to(Screen::Browse),
            KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
            KeyCode::Char('g') => app.start_draft(),
            KeyCode::Char('m') => app.skip_to_manual_entry(),
            _ => {}
        },
        WizardStep::Details => match key.code {
            KeyCode::Esc => app.wizard_step = WizardStep::Idea,
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => app.draft_field_down(),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => app.draft_field_up(),
            KeyCode::Left | KeyCode::Char('h') if app.selected_draft_field() == DraftField::Sector => {
                app.cycle_draft_sector(false)
            }
            KeyCode::Right | KeyCode::Char('l') if app.selected_draft_field() == DraftField::Sector => {
                app.cycle_draft_sector(true)
            }
            KeyCode::Char('i') | KeyCode::Enter => {
                if app.selected_draft_field() != DraftField::Sector {
                    app.input_mode = InputMode::Editing;
                }
            }
            KeyCode::Char('+') => app.add_capability_slot(),
            KeyCode::Char('n') => {
                app.wizard_step = WizardStep::Review;
                app.wizard_notice = None;
            }
            _ => {}
        },
        WizardStep::Review => match key.code {
            KeyCode::Esc => app.wizard_step = WizardStep::Details,
            KeyCode::Enter | KeyCode::Char('P') => app.publish_draft(),
            _ => {}
        },
    }
}

fn handle_dashboard_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.go_to(Screen::Browse),
        KeyCode::Tab => app.dashboard_tab = app.dashboard_tab.next(),
        KeyCode::Char('j') | KeyCode::Down => app.owned_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.owned_nav_up(),
        KeyCode::Enter => {
            if let Some(id) = app.selected_owned_id() {
                app.open_listing(&id);
            }
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.screen {
        Screen::Browse => handle_search_editing(app, key),
        Screen::Detail => handle_chat_editing(app, key),
        Screen::Create => handle_create_editing(app, key),
        Screen::Dashboard => app.input_mode = InputMode::Normal,
    }
}

fn handle_search_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Backspace => {
            app.search_input.pop();
            app.refresh_browse();
        }
        KeyCode::Char(c) => {
            app.search_input.push(c);
            app.refresh_browse();
        }
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.send_chat();
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

fn handle_create_editing(app: &mut App, key: KeyEvent) {
    match (app.wizard_step, key.code) {
        (_, KeyCode::Esc) => app.input_mode = InputMode::Normal,

        (WizardStep::Idea, KeyCode::Enter) => {
            app.start_draft();
            app.input_mode = InputMode::Normal;
        }
        (WizardStep::Idea, KeyCode::Backspace) => {
            app.idea_input.pop();
        }
        (WizardStep::Idea, KeyCode::Char(c)) => app.idea_input.push(c),

        (WizardStep::Details, KeyCode::Enter) => {
            app.input_mode = InputMode::Normal;
            app.draft_field_down();
        }
        (WizardStep::Details, KeyCode::Backspace) => app.draft_field_pop(),
        (WizardStep::Details, KeyCode::Char(c)) => app.draft_field_push(c),

        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_list = app.list_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => match app.screen {
            Screen::Browse if in_list => app.browse_nav_down(),
            Screen::Detail if in_chat => app.chat_scroll = app.chat_scroll.saturating_add(3),
            Screen::Dashboard if in_list => app.owned_nav_down(),
            _ => {}
        },
        MouseEventKind::ScrollUp => match app.screen {
            Screen::Browse if in_list => app.browse_nav_up(),
            Screen::Detail if in_chat => app.chat_scroll = app.chat_scroll.saturating_sub(3),
            Screen::Dashboard if in_list => app.owned_nav_up(),
            _ => {}
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "héllo";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 10), s.len());
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 4, 3);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(5, 4, rect));
        assert!(!point_in_rect(6, 4, rect));
        assert!(!point_in_rect(1, 3, rect));
    }
}
