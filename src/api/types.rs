//! Wire types for the threat intelligence HTTP API

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, IntoStaticStr};

/// `GET /api/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusInfo {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub llm_mode: String,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SamplesResponse {
    #[serde(default)]
    pub samples: Vec<String>,
}

/// A cited snippet backing an answer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvidenceItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: f64,
}

impl EvidenceItem {
    pub fn actor(&self) -> &str {
        match self.actor.as_deref() {
            Some(actor) if !actor.trim().is_empty() => actor,
            _ => "Unknown",
        }
    }
}

/// Result of `POST /api/query`; also the `result` body sent to the export endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub source_count: u32,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Metadata attached to assistant messages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub source_count: u32,
}

/// Who authored a message. `Error` entries only exist client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(alias = "system")]
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationList {
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedConversation {
    pub conversation_id: String,
}

/// A message as stored by the conversation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `GET /api/conversations/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationDetail {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// `POST /api/conversations/{id}/message`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub assistant_message: String,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

/// Outbound feedback record. Built fresh per submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRecord {
    pub query: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub model: String,
    pub source_count: u32,
    pub confidence: f64,
    pub rating: Option<u8>,
    pub relevance: Option<String>,
    pub accuracy: Option<String>,
    pub completeness: Option<String>,
    pub comments: Option<String>,
    pub corrections: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FeedbackReceipt {
    #[serde(default)]
    pub feedback_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Report formats the backend can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    Pdf,
    Csv,
}

impl ExportFormat {
    /// Path segment and file extension
    pub fn extension(self) -> &'static str {
        self.into()
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Csv => "text/csv",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExportRequest<'a> {
    pub result: &'a QueryResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub query_id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub source_count: Option<u32>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub evidence_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryStats {
    #[serde(default)]
    pub total_queries: u64,
    #[serde(default)]
    pub storage_size_kb: f64,
}

/// `GET /api/history` and `GET /api/history/search`. Search responses carry no stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryPage {
    #[serde(default)]
    pub queries: Vec<HistoryEntry>,
    #[serde(default)]
    pub stats: Option<HistoryStats>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn evidence_actor_defaults_to_unknown() {
        let item: EvidenceItem =
            serde_json::from_str(r#"{"source":"mitre","text":"spearphishing","score":0.91}"#)
                .unwrap();
        assert_eq!(item.actor(), "Unknown");

        let named = EvidenceItem {
            actor: Some("APT28".into()),
            ..item
        };
        assert_eq!(named.actor(), "APT28");
    }

    #[test]
    fn stored_messages_tolerate_empty_metadata() {
        let msg: StoredMessage = serde_json::from_str(
            r#"{"role":"assistant","content":"hi","metadata":{},"timestamp":"2024-01-01T00:00:00"}"#,
        )
        .unwrap();
        let metadata = msg.metadata.unwrap();
        assert!(metadata.evidence.is_empty());
        assert_eq!(metadata.source_count, 0);
    }

    #[test]
    fn system_role_maps_to_error_entries() {
        let msg: StoredMessage =
            serde_json::from_str(r#"{"role":"system","content":"boom"}"#).unwrap();
        assert_eq!(msg.role, Role::Error);
    }

    #[test]
    fn export_format_parses_case_insensitively() {
        assert_eq!(ExportFormat::from_str("PDF").unwrap(), ExportFormat::Pdf);
        assert_eq!(ExportFormat::from_str("csv").unwrap(), ExportFormat::Csv);
        assert!(ExportFormat::from_str("docx").is_err());
        assert_eq!(ExportFormat::Csv.extension(), "csv");
    }
}
