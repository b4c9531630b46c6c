use crate::ui::conversation::commands::{
    command_entries, parse_slash_command, CommandEntry, ParsedCommand,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Text being composed. The cursor counts chars, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor_position: usize,
}

impl TextAreaState {
    fn byte_index(&self, char_pos: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Input box with a slash-command palette
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    title: String,
    has_focus: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            title: title.into(),
            has_focus: true,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationResult {
        if key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else if self.show_command_palette && self.apply_selected_command() {
                    return ConversationResult::None;
                } else if !self.state.content.trim().is_empty() {
                    let content = self.take_content();
                    return match parse_slash_command(&content) {
                        Some(command) => ConversationResult::Command(command),
                        None => ConversationResult::Submitted(content),
                    };
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) => {
                self.insert_char(c);

                if self.state.content == "/" {
                    self.open_command_palette();
                } else if self.show_command_palette {
                    if self.state.content.starts_with('/') && !c.is_whitespace() {
                        self.refresh_command_palette();
                    } else {
                        self.close_command_palette();
                    }
                }
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.after_edit();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.after_edit();
                }
            }
            KeyCode::Left => {
                self.state.cursor_position = self.state.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.state.cursor_position < self.state.char_len() {
                    self.state.cursor_position += 1;
                }
            }
            KeyCode::Home => self.state.cursor_position = 0,
            KeyCode::End => self.state.cursor_position = self.state.char_len(),
            _ => {}
        }

        ConversationResult::None
    }

    fn after_edit(&mut self) {
        if self.show_command_palette {
            if self.state.content.starts_with('/') {
                self.refresh_command_palette();
            } else {
                self.close_command_palette();
            }
        }
    }

    /// Insert a character at the cursor position
    fn insert_char(&mut self, c: char) {
        let at = self.state.byte_index(self.state.cursor_position);
        self.state.content.insert(at, c);
        self.state.cursor_position += 1;
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.state.cursor_position == 0 {
            return false;
        }
        self.state.cursor_position -= 1;
        let at = self.state.byte_index(self.state.cursor_position);
        self.state.content.remove(at);
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.state.cursor_position >= self.state.char_len() {
            return false;
        }
        let at = self.state.byte_index(self.state.cursor_position);
        self.state.content.remove(at);
        true
    }

    fn open_command_palette(&mut self) {
        self.show_command_palette = true;
        self.selected_command = Some(0);
        self.refresh_command_palette();
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.selected_command = match self.filtered_commands.len() {
            0 => None,
            len => Some(self.selected_command.unwrap_or(0).min(len - 1)),
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        self.state.content = format!("/{} ", entry.keyword);
        self.state.cursor_position = self.state.char_len();
        self.close_command_palette();
        true
    }

    fn take_content(&mut self) -> String {
        self.close_command_palette();
        self.state.cursor_position = 0;
        std::mem::take(&mut self.state.content)
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    pub fn palette_open(&self) -> bool {
        self.show_command_palette
    }

    pub fn clear(&mut self) {
        self.take_content();
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title.as_str())
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = self.state.content.clone();
            if self.has_focus {
                content.insert(self.state.byte_index(self.state.cursor_position), '▌');
            }

            for (i, line_text) in content.split('\n').enumerate() {
                if i < inner_area.height as usize {
                    let line = Line::from(vec![Span::raw(line_text)]);
                    buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
                }
            }
        }

        if self.show_command_palette {
            self.render_palette(inner_area, buf);
        }
    }

    /// Palette floats above the input box
    fn render_palette(&self, inner_area: Rect, buf: &mut Buffer) {
        let palette_height = (self.filtered_commands.len().min(6) + 2) as u16;
        let palette_area = Rect {
            x: inner_area.x,
            y: inner_area.y.saturating_sub(palette_height + 1),
            width: inner_area.width,
            height: palette_height,
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Commands")
            .style(Style::default().fg(Color::Blue));
        let inner = block.inner(palette_area);
        ratatui::widgets::Clear.render(palette_area, buf);
        block.render(palette_area, buf);

        // Keep the selection visible when the list is longer than the box
        let visible = inner.height as usize;
        let selected = self.selected_command.unwrap_or(0);
        let first = selected.saturating_sub(visible.saturating_sub(1));

        for (row, (index, entry)) in self
            .filtered_commands
            .iter()
            .enumerate()
            .skip(first)
            .take(visible)
            .enumerate()
        {
            let style = if self.selected_command == Some(index) {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let line = Line::from(vec![
                Span::styled(format!("/{}", entry.keyword), style),
                Span::styled("  ", Style::default()),
                Span::styled(entry.description, Style::default().fg(Color::Gray)),
            ]);
            buf.set_line(inner.x, inner.y + row as u16, &line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::conversation::commands::SlashCommand;

    fn press(composer: &mut ConversationComposer, code: KeyCode) -> ConversationResult {
        composer.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(composer: &mut ConversationComposer, text: &str) {
        for c in text.chars() {
            press(composer, KeyCode::Char(c));
        }
    }

    #[test]
    fn enter_submits_plain_text() {
        let mut composer = ConversationComposer::new("Ask...", "Chat");
        type_str(&mut composer, "How does Emotet propagate?");

        let result = press(&mut composer, KeyCode::Enter);

        assert_eq!(
            result,
            ConversationResult::Submitted("How does Emotet propagate?".to_string())
        );
        assert!(composer.content().is_empty());
    }

    #[test]
    fn blank_input_is_not_submitted() {
        let mut composer = ConversationComposer::new("Ask...", "Chat");
        type_str(&mut composer, "   ");
        assert_eq!(press(&mut composer, KeyCode::Enter), ConversationResult::None);
    }

    #[test]
    fn palette_completes_the_selected_command() {
        let mut composer = ConversationComposer::new("Ask...", "Chat");
        type_str(&mut composer, "/exp");
        assert!(composer.palette_open());

        press(&mut composer, KeyCode::Tab);
        assert_eq!(composer.content(), "/export ");
        assert!(!composer.palette_open());

        type_str(&mut composer, "pdf");
        match press(&mut composer, KeyCode::Enter) {
            ConversationResult::Command(parsed) => {
                assert_eq!(parsed.command, SlashCommand::Export);
                assert_eq!(parsed.argument(), Some("pdf"));
            }
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[test]
    fn editing_handles_multibyte_text() {
        let mut composer = ConversationComposer::new("Ask...", "Chat");
        type_str(&mut composer, "Lazarus 🐍 group");
        press(&mut composer, KeyCode::Home);
        for _ in 0..8 {
            press(&mut composer, KeyCode::Right);
        }
        press(&mut composer, KeyCode::Delete);
        press(&mut composer, KeyCode::Backspace);

        assert_eq!(composer.content(), "Lazarus group");
    }
}
