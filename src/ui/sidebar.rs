//! Left panel: saved conversations or the query history search

use crate::api::ConversationSummary;
use crate::history::HistorySearch;
use crate::markup::{confidence_bar_width, sanitize_terminal};
use crate::session::DEFAULT_TITLE;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidebarMode {
    #[default]
    Conversations,
    History,
}

pub struct Sidebar<'a> {
    mode: SidebarMode,
    conversations: &'a [ConversationSummary],
    active_id: Option<&'a str>,
    history: &'a HistorySearch,
    focused: bool,
}

impl<'a> Sidebar<'a> {
    pub fn new(
        mode: SidebarMode,
        conversations: &'a [ConversationSummary],
        active_id: Option<&'a str>,
        history: &'a HistorySearch,
    ) -> Self {
        Self {
            mode,
            conversations,
            active_id,
            history,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }
}

fn truncate(text: &str, width: usize) -> String {
    let text = sanitize_terminal(text).replace('\n', " ");
    if text.chars().count() <= width {
        return text;
    }
    let head: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", head)
}

pub fn conversation_lines(
    conversations: &[ConversationSummary],
    active_id: Option<&str>,
    width: usize,
) -> Vec<Line<'static>> {
    if conversations.is_empty() {
        return vec![Line::from(Span::styled(
            "No conversations yet",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    conversations
        .iter()
        .enumerate()
        .map(|(i, conversation)| {
            let is_active = active_id == Some(conversation.id.as_str());
            let title = if conversation.title.trim().is_empty() {
                DEFAULT_TITLE
            } else {
                conversation.title.as_str()
            };
            let prefix = format!("{:>2}. ", i + 1);
            let style = if is_active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(vec![
                Span::styled(prefix.clone(), Style::default().fg(Color::DarkGray)),
                Span::styled(truncate(title, width.saturating_sub(prefix.len())), style),
            ])
        })
        .collect()
}

pub fn history_lines(history: &HistorySearch, width: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("🔍 ", Style::default().fg(Color::Yellow)),
        Span::raw(truncate(history.input(), width.saturating_sub(3))),
        Span::styled(
            if history.is_waiting() { " …" } else { "" },
            Style::default().fg(Color::DarkGray),
        ),
    ])];

    if let Some(stats) = history.stats() {
        lines.push(Line::from(Span::styled(
            format!("{} queries, {:.1} KB", stats.total_queries, stats.storage_size_kb),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(""));

    if history.entries().is_empty() {
        let empty = match history.filter() {
            Some(term) => format!("No matches for '{}'", truncate(term, 20)),
            None => "No queries yet".to_string(),
        };
        lines.push(Line::from(Span::styled(empty, Style::default().fg(Color::DarkGray))));
        return lines;
    }

    for entry in history.entries() {
        lines.push(Line::from(Span::styled(
            truncate(&entry.query, width),
            Style::default().fg(Color::White),
        )));
        let mut details = vec![entry.timestamp.chars().take(16).collect::<String>().replace('T', " ")];
        if let Some(confidence) = entry.confidence {
            details.push(confidence_bar_width(confidence));
        }
        if let Some(count) = entry.evidence_count {
            details.push(format!("{} ev", count));
        }
        lines.push(Line::from(Span::styled(
            format!("  {}", details.join(" · ")),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

impl Widget for Sidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.mode {
            SidebarMode::Conversations => "Chats",
            SidebarMode::History => "History (Tab)",
        };
        let border = if self.focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border);

        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width as usize;
        let lines = match self.mode {
            SidebarMode::Conversations => conversation_lines(self.conversations, self.active_id, width),
            SidebarMode::History => history_lines(self.history, width),
        };

        for (i, line) in lines.iter().take(inner.height as usize).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HistoryEntry, HistoryPage, HistoryStats};

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn conversations_are_numbered_from_one() {
        let conversations = vec![
            ConversationSummary {
                id: "c1".into(),
                title: "APT28 tactics".into(),
                created_at: None,
                updated_at: None,
                message_count: None,
            },
            ConversationSummary {
                id: "c2".into(),
                title: "".into(),
                created_at: None,
                updated_at: None,
                message_count: None,
            },
        ];

        let lines: Vec<String> = conversation_lines(&conversations, Some("c2"), 30)
            .iter()
            .map(text)
            .collect();

        assert_eq!(lines, vec![" 1. APT28 tactics", " 2. New Chat"]);
    }

    #[test]
    fn history_panel_shows_stats_and_entries() {
        let mut search = HistorySearch::default();
        let fetch = search.fetch_now("");
        search.apply(
            &fetch,
            HistoryPage {
                queries: vec![HistoryEntry {
                    query_id: "1".into(),
                    query: "How does Emotet propagate?".into(),
                    timestamp: "2024-05-01T12:00:00".into(),
                    confidence: Some(0.9),
                    evidence_count: Some(3),
                    ..Default::default()
                }],
                stats: Some(HistoryStats {
                    total_queries: 1,
                    storage_size_kb: 2.5,
                }),
            },
        );

        let lines: Vec<String> = history_lines(&search, 40).iter().map(text).collect();

        assert!(lines.contains(&"1 queries, 2.5 KB".to_string()));
        assert!(lines.contains(&"How does Emotet propagate?".to_string()));
        assert!(lines.contains(&"  2024-05-01 12:00 · 90% · 3 ev".to_string()));
    }

    #[test]
    fn empty_search_says_so() {
        let mut search = HistorySearch::default();
        let fetch = search.fetch_now("lazarus");
        search.apply(&fetch, HistoryPage::default());

        let lines: Vec<String> = history_lines(&search, 40).iter().map(text).collect();
        assert!(lines.contains(&"No matches for 'lazarus'".to_string()));
    }
}
