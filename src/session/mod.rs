//! Conversation session: active conversation, transcript, message registry
//! and the single-flight chat send.

pub mod feedback;
pub mod registry;
pub mod transcript;

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{
    ChatReply, ConversationSummary, ExportFormat, FeedbackReceipt, Role, ThreatIntelApi,
};
use crate::download;
use crate::error::{Error, Result};
use crate::markup::derive_title;

pub use feedback::{FeedbackForm, Sentiment};
pub use registry::{MessageId, MessageRegistry, RegistryEntry};
pub use transcript::{Transcript, TranscriptEntry};

/// Title the service gives conversations created by "new chat"
pub const DEFAULT_TITLE: &str = "New Chat";

fn is_untitled(title: Option<&str>) -> bool {
    match title.map(str::trim) {
        None => true,
        Some(t) => t.is_empty() || t == DEFAULT_TITLE,
    }
}

/// The conversation currently shown
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveConversation {
    pub id: String,
    pub title: Option<String>,
}

/// Proof that a send was started. Handed back to `complete_send` with the reply.
#[derive(Debug, Clone, PartialEq)]
pub struct SendTicket {
    pub conversation_id: String,
    pub generation: u64,
    pub text: String,
}

/// What `complete_send` did with a reply
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Assistant message appended and registered
    Replied(MessageId),
    /// Error entry appended in place of an answer
    Failed(String),
    /// The reply belonged to a conversation that is no longer active
    Discarded,
}

/// Mediates between the remote conversation store and the rendered transcript
pub struct SessionManager {
    api: Arc<dyn ThreatIntelApi>,
    download_dir: PathBuf,
    active: Option<ActiveConversation>,
    conversations: Vec<ConversationSummary>,
    transcript: Transcript,
    registry: MessageRegistry,
    pending: Option<SendTicket>,
    /// Bumped whenever the active conversation changes
    generation: u64,
}

impl SessionManager {
    pub fn new(api: Arc<dyn ThreatIntelApi>, download_dir: PathBuf) -> Self {
        Self {
            api,
            download_dir,
            active: None,
            conversations: Vec::new(),
            transcript: Transcript::new(),
            registry: MessageRegistry::new(),
            pending: None,
            generation: 0,
        }
    }

    /// Start a fresh conversation and make it active
    pub async fn create_conversation(&mut self) -> Result<String> {
        let id = self.api.create_conversation(DEFAULT_TITLE).await?;
        info!(conversation_id = %id, "Created conversation");

        self.switch_to(ActiveConversation {
            id: id.clone(),
            title: None,
        });
        self.refresh_conversations_quietly().await;
        Ok(id)
    }

    /// Replace the transcript with the stored messages of `id`
    pub async fn load_conversation(&mut self, id: &str) -> Result<()> {
        let detail = self.api.get_conversation(id).await?;
        debug!(conversation_id = %id, messages = detail.messages.len(), "Loaded conversation");

        self.switch_to(ActiveConversation {
            id: id.to_string(),
            title: Some(detail.title).filter(|t| !is_untitled(Some(t))),
        });

        for message in detail.messages {
            let timestamp = transcript::parse_timestamp(message.timestamp.as_deref());
            match message.role {
                Role::User => self.transcript.add_user_message(message.content, timestamp),
                Role::Assistant => {
                    let metadata = message.metadata.unwrap_or_default();
                    let query = self
                        .transcript
                        .last_user_message()
                        .unwrap_or_default()
                        .to_string();
                    let message_id = self.registry.register(RegistryEntry {
                        query,
                        content: message.content.clone(),
                        metadata: metadata.clone(),
                        timestamp,
                    });
                    self.transcript.add_assistant_message(
                        message.content,
                        metadata,
                        message_id,
                        timestamp,
                    );
                }
                Role::Error => self.transcript.add_error(message.content, timestamp),
            }
        }
        Ok(())
    }

    /// Delete `id`. Deleting the active conversation moves to a new one,
    /// created before the old one is removed so one is always active.
    pub async fn delete_conversation(&mut self, id: &str) -> Result<()> {
        let was_active = self.active.as_ref().is_some_and(|a| a.id == id);
        if !was_active {
            self.api.delete_conversation(id).await?;
            info!(conversation_id = %id, "Deleted conversation");
            self.conversations.retain(|c| c.id != id);
            self.refresh_conversations_quietly().await;
            return Ok(());
        }

        let replacement = self.api.create_conversation(DEFAULT_TITLE).await?;
        info!(conversation_id = %replacement, "Created conversation");

        if let Err(e) = self.api.delete_conversation(id).await {
            warn!(conversation_id = %id, error = %e, "Delete failed, keeping the active conversation");
            self.refresh_conversations_quietly().await;
            return Err(e);
        }
        info!(conversation_id = %id, "Deleted conversation");

        self.switch_to(ActiveConversation {
            id: replacement,
            title: None,
        });
        self.conversations.retain(|c| c.id != id);
        self.refresh_conversations_quietly().await;
        Ok(())
    }

    /// Validate, show the user message and mark a send as in flight
    pub fn begin_send(&mut self, text: &str) -> Result<SendTicket> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Please enter a message".to_string()));
        }
        if self.pending.is_some() {
            return Err(Error::SendPending);
        }
        let Some(active) = &self.active else {
            return Err(Error::Validation("No active conversation".to_string()));
        };

        let ticket = SendTicket {
            conversation_id: active.id.clone(),
            generation: self.generation,
            text: text.to_string(),
        };

        self.transcript.add_user_message(ticket.text.clone(), Utc::now());
        self.transcript.set_typing(true);
        self.pending = Some(ticket.clone());
        Ok(ticket)
    }

    /// Apply the reply for `ticket`, unless the conversation moved on
    pub fn complete_send(&mut self, ticket: SendTicket, result: Result<ChatReply>) -> SendOutcome {
        let current = self.active.as_ref().map(|a| a.id.as_str());
        if ticket.generation != self.generation || current != Some(ticket.conversation_id.as_str())
        {
            debug!(
                conversation_id = %ticket.conversation_id,
                generation = ticket.generation,
                current_generation = self.generation,
                "Discarding stale chat reply"
            );
            return SendOutcome::Discarded;
        }

        self.pending = None;
        self.transcript.set_typing(false);

        match result {
            Ok(reply) => {
                let now = Utc::now();
                let message_id = self.registry.register(RegistryEntry {
                    query: ticket.text,
                    content: reply.assistant_message.clone(),
                    metadata: reply.metadata.clone(),
                    timestamp: now,
                });
                self.transcript.add_assistant_message(
                    reply.assistant_message.clone(),
                    reply.metadata,
                    message_id.clone(),
                    now,
                );
                self.derive_title_from(&reply.assistant_message);
                SendOutcome::Replied(message_id)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(conversation_id = %ticket.conversation_id, error = %message, "Chat message failed");
                self.transcript.add_error(message.clone(), Utc::now());
                SendOutcome::Failed(message)
            }
        }
    }

    /// `begin_send`, the request, then `complete_send`
    pub async fn send_message(&mut self, text: &str) -> Result<SendOutcome> {
        let ticket = self.begin_send(text)?;
        let result = self
            .api
            .send_message(&ticket.conversation_id, &ticket.text)
            .await;
        Ok(self.complete_send(ticket, result))
    }

    /// Export a registered answer and save the report as a download
    pub async fn export_message(&self, message_id: &MessageId, format: ExportFormat) -> Result<PathBuf> {
        let entry = self.lookup(message_id)?;
        let bytes = self.api.export(format, &entry.to_result()).await?;
        download::save_report(&self.download_dir, format, &bytes, Utc::now())
    }

    pub async fn submit_feedback(
        &self,
        message_id: &MessageId,
        form: FeedbackForm,
    ) -> Result<FeedbackReceipt> {
        let entry = self.lookup(message_id)?;
        let record = form.into_record(&entry.to_result(), Utc::now())?;
        let receipt = self.api.submit_feedback(&record).await?;
        info!(message_id = %message_id, rating = ?record.rating, "Feedback submitted");
        Ok(receipt)
    }

    pub async fn quick_feedback(
        &self,
        message_id: &MessageId,
        sentiment: Sentiment,
    ) -> Result<FeedbackReceipt> {
        self.submit_feedback(message_id, FeedbackForm::rating(sentiment.rating()))
            .await
    }

    /// Reload the conversation list. A title derived locally for the active
    /// conversation wins over an untitled server entry.
    pub async fn refresh_conversations(&mut self) -> Result<()> {
        let mut conversations = self.api.list_conversations().await?;
        if let Some(ActiveConversation {
            id,
            title: Some(title),
        }) = &self.active
        {
            for summary in conversations.iter_mut().filter(|c| &c.id == id) {
                if is_untitled(Some(&summary.title)) {
                    summary.title = title.clone();
                }
            }
        }
        self.conversations = conversations;
        Ok(())
    }

    /// Write the active transcript as an escaped HTML page
    pub fn save_transcript_html(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.transcript.to_html(&self.display_title()))?;
        Ok(())
    }

    pub fn active(&self) -> Option<&ActiveConversation> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.id.as_str())
    }

    pub fn display_title(&self) -> String {
        self.active
            .as_ref()
            .and_then(|a| a.title.clone())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn api(&self) -> Arc<dyn ThreatIntelApi> {
        Arc::clone(&self.api)
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn latest_assistant_message(&self) -> Option<&MessageId> {
        self.transcript.assistant_ids().last().copied()
    }

    /// 1-based index over the assistant messages of the transcript
    pub fn assistant_message(&self, n: usize) -> Option<&MessageId> {
        n.checked_sub(1)
            .and_then(|i| self.transcript.assistant_ids().get(i).copied())
    }

    fn lookup(&self, message_id: &MessageId) -> Result<&RegistryEntry> {
        self.registry
            .get(message_id)
            .ok_or_else(|| Error::UnknownMessage(message_id.to_string()))
    }

    fn switch_to(&mut self, conversation: ActiveConversation) {
        self.generation += 1;
        self.pending = None;
        self.transcript.clear();
        self.active = Some(conversation);
    }

    fn derive_title_from(&mut self, content: &str) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !is_untitled(active.title.as_deref()) {
            return;
        }
        let title = derive_title(content);
        if title.is_empty() {
            return;
        }
        if let Some(summary) = self.conversations.iter_mut().find(|c| c.id == active.id) {
            summary.title = title.clone();
        }
        active.title = Some(title);
    }

    async fn refresh_conversations_quietly(&mut self) {
        if let Err(e) = self.refresh_conversations().await {
            warn!(error = %e, "Failed to refresh conversation list");
        }
    }
}
