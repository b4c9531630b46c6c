//! Transcript display component

use crate::api::{MessageMetadata, Role};
use crate::markup::{confidence_bar_width, evidence_badge, sanitize_terminal, wrap_text};
use crate::session::{Transcript, TranscriptEntry};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

const BAR_CELLS: usize = 10;
const EVIDENCE_SHOWN: usize = 3;

/// Renders the active transcript, newest at the bottom
pub struct ConversationHistory<'a> {
    transcript: &'a Transcript,
    samples: &'a [String],
    title: &'a str,
    /// Lines scrolled up from the bottom
    scroll: usize,
}

impl<'a> ConversationHistory<'a> {
    pub fn new(transcript: &'a Transcript, samples: &'a [String], title: &'a str) -> Self {
        Self {
            transcript,
            samples,
            title,
            scroll: 0,
        }
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }
}

impl Widget for ConversationHistory<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("💬 {}", sanitize_terminal(self.title)));

        let inner_area = block.inner(area);
        block.render(area, buf);

        let all_lines = if self.transcript.is_empty() {
            welcome_lines(self.samples)
        } else {
            transcript_lines(self.transcript, inner_area.width as usize)
        };

        // Bottom-anchored window, shifted up by `scroll`
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let end = total.saturating_sub(self.scroll.min(total.saturating_sub(height)));
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn welcome_lines(samples: &[String]) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            "Threat Intelligence Assistant 🛡️",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Ask about threat actors, malware families, techniques or campaigns.",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
    ];

    if !samples.is_empty() {
        lines.push(Line::from(Span::styled(
            "Try one of these:",
            Style::default().fg(Color::Gray),
        )));
        for sample in samples {
            lines.push(Line::from(vec![
                Span::styled("  • ", Style::default().fg(Color::Cyan)),
                Span::raw(sanitize_terminal(sample)),
            ]));
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        "Enter sends, Shift+Enter adds a line, /help lists commands.",
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

/// All transcript lines at `width`. Assistant answers carry their 1-based number.
pub fn transcript_lines(transcript: &Transcript, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut answer_number = 0;

    for entry in transcript.entries() {
        let number = if entry.role == Role::Assistant {
            answer_number += 1;
            Some(answer_number)
        } else {
            None
        };
        lines.extend(render_entry(entry, number, width));
        lines.push(Line::from(""));
    }
    lines
}

fn render_entry(entry: &TranscriptEntry, number: Option<usize>, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let role_icon = match entry.role {
        Role::User => "👤",
        Role::Assistant => "🤖",
        Role::Error => "⚠️",
    };
    let timestamp = entry.timestamp.format("%H:%M:%S").to_string();
    let mut header = vec![Span::styled(
        format!("{} {} ", role_icon, timestamp),
        Style::default().fg(Color::DarkGray),
    )];
    if let Some(n) = number {
        header.push(Span::styled(
            format!("[#{}] ", n),
            Style::default().fg(Color::Cyan),
        ));
    }
    header.push(Span::styled("─".repeat(20), Style::default().fg(Color::DarkGray)));
    lines.push(Line::from(header));

    let style = content_style(entry.role);
    for content_line in wrap_text(&sanitize_terminal(&entry.content), width.saturating_sub(2)) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(content_line, style),
        ]));
    }

    if let Some(metadata) = &entry.metadata {
        lines.extend(metadata_lines(metadata, width));
    }
    lines
}

fn metadata_lines(metadata: &MessageMetadata, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let confidence = if metadata.confidence.is_finite() {
        metadata.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (confidence * BAR_CELLS as f64).round() as usize;
    let bar_color = if confidence >= 0.7 {
        Color::Green
    } else if confidence >= 0.4 {
        Color::Yellow
    } else {
        Color::Red
    };

    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("Confidence ", Style::default().fg(Color::Gray)),
        Span::styled("█".repeat(filled), Style::default().fg(bar_color)),
        Span::styled("░".repeat(BAR_CELLS - filled), Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!(" {}", confidence_bar_width(metadata.confidence)),
            Style::default().fg(bar_color),
        ),
        Span::styled("  Evidence ", Style::default().fg(Color::Gray)),
        Span::styled(
            format!("[{}]", evidence_badge(metadata.evidence.len())),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("  Model {}", metadata.model.as_deref().unwrap_or("N/A")),
            Style::default().fg(Color::DarkGray),
        ),
    ]));

    for item in metadata.evidence.iter().take(EVIDENCE_SHOWN) {
        let label = format!(
            "    • {} ({}, {:.2}): ",
            sanitize_terminal(item.actor()),
            sanitize_terminal(&item.source),
            item.score
        );
        let room = width.saturating_sub(label.chars().count()).max(10);
        let text = sanitize_terminal(&item.text).replace('\n', " ");
        let snippet = if text.chars().count() > room {
            let head: String = text.chars().take(room.saturating_sub(3)).collect();
            format!("{}...", head)
        } else {
            text
        };
        lines.push(Line::from(vec![
            Span::styled(label, Style::default().fg(Color::DarkGray)),
            Span::styled(snippet, Style::default().fg(Color::Gray)),
        ]));
    }
    if metadata.evidence.len() > EVIDENCE_SHOWN {
        lines.push(Line::from(Span::styled(
            format!("    … {} more", metadata.evidence.len() - EVIDENCE_SHOWN),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn content_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Blue),
        Role::Assistant => Style::default().fg(Color::Green),
        Role::Error => Style::default().fg(Color::Red),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EvidenceItem;
    use crate::session::MessageId;
    use chrono::Utc;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn sample_transcript() -> Transcript {
        let mut transcript = Transcript::new();
        transcript.add_user_message("What are common tactics used by APT28?".into(), Utc::now());
        transcript.add_assistant_message(
            "Spearphishing\x1b[31m and credential harvesting.".into(),
            MessageMetadata {
                evidence: vec![EvidenceItem {
                    actor: Some("APT28".into()),
                    source: "description".into(),
                    text: "APT28 uses spearphishing".into(),
                    score: 0.9123,
                }],
                confidence: 0.845,
                model: Some("llama3:8b".into()),
                ..Default::default()
            },
            MessageId::new(),
            Utc::now(),
        );
        transcript.add_error("Network error: connection refused".into(), Utc::now());
        transcript
    }

    #[test]
    fn answers_show_number_confidence_and_evidence() {
        let rendered: Vec<String> = transcript_lines(&sample_transcript(), 80)
            .iter()
            .map(text)
            .collect();

        assert!(rendered.iter().any(|l| l.contains("[#1]")));
        assert!(rendered.iter().any(|l| l.contains("84.5%") && l.contains("[1]")));
        assert!(rendered.iter().any(|l| l.contains("APT28 (description, 0.91)")));
        assert!(rendered.iter().any(|l| l.contains("connection refused")));
    }

    #[test]
    fn escape_sequences_never_reach_the_terminal() {
        let rendered = transcript_lines(&sample_transcript(), 80);
        assert!(rendered.iter().all(|l| !text(l).contains('\x1b')));
    }

    #[test]
    fn empty_transcript_shows_samples() {
        let area = Rect::new(0, 0, 80, 12);
        let mut buf = Buffer::empty(area);
        let samples = vec!["How does Emotet propagate?".to_string()];
        let transcript = Transcript::new();

        ConversationHistory::new(&transcript, &samples, "New Chat").render(area, &mut buf);

        let screen: String = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf.get(x, y).symbol().to_string())
                    .collect::<String>()
            })
            .collect();
        assert!(screen.contains("How does Emotet propagate?"));
    }
}
