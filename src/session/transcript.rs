//! Client-side view of the active conversation

use chrono::{DateTime, NaiveDateTime, Utc};

use super::registry::MessageId;
use crate::api::{MessageMetadata, Role};
use crate::markup::{confidence_bar_width, escape_html};

/// A single entry in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
    pub timestamp: DateTime<Utc>,
    /// Registry id, set on assistant entries only
    pub message_id: Option<MessageId>,
}

/// Ordered entries of the active conversation plus the typing indicator
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    typing: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user_message(&mut self, content: String, timestamp: DateTime<Utc>) {
        self.entries.push(TranscriptEntry {
            role: Role::User,
            content,
            metadata: None,
            timestamp,
            message_id: None,
        });
    }

    pub fn add_assistant_message(
        &mut self,
        content: String,
        metadata: MessageMetadata,
        message_id: MessageId,
        timestamp: DateTime<Utc>,
    ) {
        self.entries.push(TranscriptEntry {
            role: Role::Assistant,
            content,
            metadata: Some(metadata),
            timestamp,
            message_id: Some(message_id),
        });
    }

    pub fn add_error(&mut self, content: String, timestamp: DateTime<Utc>) {
        self.entries.push(TranscriptEntry {
            role: Role::Error,
            content,
            metadata: None,
            timestamp,
            message_id: None,
        });
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// Back to the welcome state
    pub fn clear(&mut self) {
        self.entries.clear();
        self.typing = false;
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registry ids of assistant entries, oldest first
    pub fn assistant_ids(&self) -> Vec<&MessageId> {
        self.entries
            .iter()
            .filter_map(|e| e.message_id.as_ref())
            .collect()
    }

    /// The most recent user message, used as the query of the next answer
    pub fn last_user_message(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.role == Role::User)
            .map(|e| e.content.as_str())
    }

    /// Standalone HTML page of the transcript. Every piece of text is escaped.
    pub fn to_html(&self, title: &str) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));

        for entry in &self.entries {
            let class = match entry.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Error => "error",
            };
            html.push_str(&format!(
                "<div class=\"message {}\">\n<p class=\"time\">{}</p>\n",
                class,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
            for line in entry.content.lines() {
                html.push_str(&format!("<p>{}</p>\n", escape_html(line)));
            }

            if let Some(metadata) = &entry.metadata {
                html.push_str(&format!(
                    "<p class=\"confidence\">Confidence: {} &middot; {} sources</p>\n",
                    confidence_bar_width(metadata.confidence),
                    metadata.evidence.len()
                ));
                if !metadata.evidence.is_empty() {
                    html.push_str("<ol class=\"evidence\">\n");
                    for item in &metadata.evidence {
                        html.push_str(&format!(
                            "<li><strong>{}</strong> ({}, score {:.2}): {}</li>\n",
                            escape_html(item.actor()),
                            escape_html(&item.source),
                            item.score,
                            escape_html(&item.text)
                        ));
                    }
                    html.push_str("</ol>\n");
                }
            }
            html.push_str("</div>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

/// Parse service timestamps: RFC 3339, or naive ISO 8601 taken as UTC
pub fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Utc::now();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}
