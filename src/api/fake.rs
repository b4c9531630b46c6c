//! Scripted in-memory stand-in for the remote service

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::types::*;
use super::ThreatIntelApi;
use crate::error::{Error, Result};

#[derive(Default)]
pub(crate) struct FakeApi {
    pub calls: Mutex<Vec<String>>,
    pub conversations: Mutex<HashMap<String, ConversationDetail>>,
    pub replies: Mutex<VecDeque<Result<ChatReply>>>,
    pub queries: Mutex<VecDeque<Result<QueryResult>>>,
    pub history: Mutex<Vec<HistoryEntry>>,
    pub feedback: Mutex<Vec<FeedbackRecord>>,
    pub exports: Mutex<Vec<(ExportFormat, QueryResult)>>,
    pub fail_create: Mutex<bool>,
    pub fail_delete: Mutex<bool>,
    next_id: Mutex<u32>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: Result<ChatReply>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_query(&self, result: Result<QueryResult>) {
        self.queries.lock().unwrap().push_back(result);
    }

    pub fn insert_conversation(&self, id: &str, detail: ConversationDetail) {
        self.conversations
            .lock()
            .unwrap()
            .insert(id.to_string(), detail);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub(crate) fn reply(text: &str, confidence: f64, evidence: usize) -> ChatReply {
    ChatReply {
        assistant_message: text.to_string(),
        metadata: MessageMetadata {
            evidence: (0..evidence)
                .map(|i| EvidenceItem {
                    actor: None,
                    source: format!("source-{}", i),
                    text: format!("snippet {}", i),
                    score: 0.8,
                })
                .collect(),
            confidence,
            model: Some("llama3:8b".to_string()),
            trace_id: Some("trace-1".to_string()),
            source_count: evidence as u32,
        },
    }
}

pub(crate) fn api_error(message: &str) -> Error {
    Error::Api {
        status: 500,
        message: message.to_string(),
    }
}

#[async_trait]
impl ThreatIntelApi for FakeApi {
    async fn status(&self) -> Result<StatusInfo> {
        self.record("status".into());
        Ok(StatusInfo {
            initialized: true,
            model: "llama3:8b".into(),
            llm_mode: "Ollama".into(),
            host: None,
        })
    }

    async fn samples(&self) -> Result<Vec<String>> {
        self.record("samples".into());
        Ok(vec!["What are common tactics used by APT28?".into()])
    }

    async fn query(&self, query: &str) -> Result<QueryResult> {
        self.record(format!("query:{}", query));
        self.queries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api_error("no scripted query")))
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.record("list".into());
        let mut list: Vec<_> = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .map(|(id, detail)| ConversationSummary {
                id: id.clone(),
                title: detail.title.clone(),
                created_at: None,
                updated_at: None,
                message_count: Some(detail.messages.len() as u32),
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn create_conversation(&self, title: &str) -> Result<String> {
        self.record(format!("create:{}", title));
        if *self.fail_create.lock().unwrap() {
            return Err(api_error("storage unavailable"));
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = format!("conv-{}", next);
        self.insert_conversation(
            &id,
            ConversationDetail {
                title: title.to_string(),
                messages: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        self.record(format!("get:{}", id));
        self.conversations
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "Conversation not found".into(),
            })
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.record(format!("delete:{}", id));
        if *self.fail_delete.lock().unwrap() {
            return Err(api_error("storage unavailable"));
        }
        self.conversations.lock().unwrap().remove(id);
        Ok(())
    }

    async fn send_message(&self, conversation_id: &str, message: &str) -> Result<ChatReply> {
        self.record(format!("send:{}:{}", conversation_id, message));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api_error("no scripted reply")))
    }

    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<FeedbackReceipt> {
        self.record("feedback".into());
        self.feedback.lock().unwrap().push(record.clone());
        Ok(FeedbackReceipt {
            feedback_id: Some("fb-1".into()),
            message: Some("Thank you for your feedback!".into()),
        })
    }

    async fn export(&self, format: ExportFormat, result: &QueryResult) -> Result<Vec<u8>> {
        self.record(format!("export:{}", format.extension()));
        self.exports.lock().unwrap().push((format, result.clone()));
        Ok(b"report-bytes".to_vec())
    }

    async fn history(&self) -> Result<HistoryPage> {
        self.record("history".into());
        let queries = self.history.lock().unwrap().clone();
        Ok(HistoryPage {
            stats: Some(HistoryStats {
                total_queries: queries.len() as u64,
                storage_size_kb: 1.5,
            }),
            queries,
        })
    }

    async fn search_history(&self, term: &str) -> Result<HistoryPage> {
        self.record(format!("search:{}", term));
        let needle = term.to_lowercase();
        let queries = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.query.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(HistoryPage {
            queries,
            stats: None,
        })
    }

    async fn clear_history(&self) -> Result<()> {
        self.record("clear".into());
        self.history.lock().unwrap().clear();
        Ok(())
    }
}
