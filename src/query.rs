//! One-shot queries outside of a conversation

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::api::{ExportFormat, FeedbackReceipt, QueryResult, ThreatIntelApi};
use crate::download;
use crate::error::{Error, Result};
use crate::markup::{confidence_bar_width, evidence_badge};
use crate::session::FeedbackForm;

/// Display model of a query result
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCard {
    pub query: String,
    pub answer: String,
    pub confidence_width: String,
    pub evidence_badge: String,
    pub model: String,
    pub trace_id: String,
    pub timestamp: String,
    pub evidence: Vec<EvidenceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceRow {
    pub actor: String,
    pub source: String,
    pub score: String,
    pub text: String,
}

impl From<&QueryResult> for ResultCard {
    fn from(result: &QueryResult) -> Self {
        Self {
            query: result.query.clone(),
            answer: result.answer.clone(),
            confidence_width: confidence_bar_width(result.confidence),
            evidence_badge: evidence_badge(result.evidence.len()),
            model: result.model.clone(),
            trace_id: result.trace_id.clone().unwrap_or_else(|| "N/A".to_string()),
            timestamp: result.timestamp.clone(),
            evidence: result
                .evidence
                .iter()
                .map(|e| EvidenceRow {
                    actor: e.actor().to_string(),
                    source: e.source.clone(),
                    score: format!("{:.2}", e.score),
                    text: e.text.clone(),
                })
                .collect(),
        }
    }
}

/// Holds the last-known result; export and feedback act on it
pub struct QueryDesk {
    api: Arc<dyn ThreatIntelApi>,
    download_dir: PathBuf,
    last_result: Option<QueryResult>,
}

impl QueryDesk {
    pub fn new(api: Arc<dyn ThreatIntelApi>, download_dir: PathBuf) -> Self {
        Self {
            api,
            download_dir,
            last_result: None,
        }
    }

    pub async fn submit(&mut self, text: &str) -> Result<&QueryResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Please enter a query".to_string()));
        }

        info!(query = text, "Submitting query");
        let result = self.api.query(text).await?;
        info!(
            confidence = result.confidence,
            evidence = result.evidence.len(),
            trace_id = ?result.trace_id,
            "Query answered"
        );
        Ok(&*self.last_result.insert(result))
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    pub fn result_card(&self) -> Option<ResultCard> {
        self.last_result.as_ref().map(ResultCard::from)
    }

    pub async fn export(&self, format: ExportFormat) -> Result<PathBuf> {
        let result = self.last_result.as_ref().ok_or(Error::NoResult)?;
        let bytes = self.api.export(format, result).await?;
        download::save_report(&self.download_dir, format, &bytes, Utc::now())
    }

    pub async fn feedback(&self, form: FeedbackForm) -> Result<FeedbackReceipt> {
        let result = self.last_result.as_ref().ok_or(Error::NoResult)?;
        let record = form.into_record(result, Utc::now())?;
        self.api.submit_feedback(&record).await
    }
}
