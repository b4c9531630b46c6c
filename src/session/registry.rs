use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::api::{MessageMetadata, QueryResult};

/// Locally generated id of a rendered assistant message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(format!("msg-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What export and feedback need to know about a rendered answer
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    /// The user message this answer replied to
    pub query: String,
    pub content: String,
    pub metadata: MessageMetadata,
    pub timestamp: DateTime<Utc>,
}

impl RegistryEntry {
    /// Rebuild the result envelope the export endpoints expect
    pub fn to_result(&self) -> QueryResult {
        QueryResult {
            query: self.query.clone(),
            answer: self.content.clone(),
            confidence: self.metadata.confidence,
            evidence: self.metadata.evidence.clone(),
            model: self
                .metadata
                .model
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            source_count: self.metadata.source_count,
            timestamp: self.timestamp.to_rfc3339(),
            trace_id: self.metadata.trace_id.clone(),
        }
    }
}

/// Message id -> content/metadata, for the lifetime of the session.
/// Entries are only ever added.
#[derive(Debug, Default, Clone)]
pub struct MessageRegistry {
    entries: HashMap<MessageId, RegistryEntry>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an answer under a freshly generated id
    pub fn register(&mut self, entry: RegistryEntry) -> MessageId {
        let id = MessageId::new();
        self.entries.insert(id.clone(), entry);
        id
    }

    pub fn get(&self, id: &MessageId) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
