//! HTTP API of the threat intelligence service

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

use crate::error::Result;
pub use client::ApiClient;
pub use types::*;

/// Everything the client asks of the remote service.
///
/// `ApiClient` is the real implementation. Session and history logic only see
/// this trait, so they can be driven by a scripted fake in tests.
#[async_trait]
pub trait ThreatIntelApi: Send + Sync {
    async fn status(&self) -> Result<StatusInfo>;
    async fn samples(&self) -> Result<Vec<String>>;
    async fn query(&self, query: &str) -> Result<QueryResult>;

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;
    /// Returns the new conversation id
    async fn create_conversation(&self, title: &str) -> Result<String>;
    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail>;
    async fn delete_conversation(&self, id: &str) -> Result<()>;
    async fn send_message(&self, conversation_id: &str, message: &str) -> Result<ChatReply>;

    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<FeedbackReceipt>;
    /// Returns the rendered report bytes
    async fn export(&self, format: ExportFormat, result: &QueryResult) -> Result<Vec<u8>>;

    async fn history(&self) -> Result<HistoryPage>;
    async fn search_history(&self, term: &str) -> Result<HistoryPage>;
    async fn clear_history(&self) -> Result<()>;
}
