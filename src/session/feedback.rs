use chrono::{DateTime, Utc};
use strum::{AsRefStr, EnumString};

use crate::api::{FeedbackRecord, QueryResult};
use crate::error::{Error, Result};

/// Fields an analyst fills in. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackForm {
    pub rating: Option<u8>,
    pub relevance: Option<String>,
    pub accuracy: Option<String>,
    pub completeness: Option<String>,
    pub comments: Option<String>,
    pub corrections: Option<String>,
}

/// Thumbs up / thumbs down
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    pub fn rating(self) -> u8 {
        match self {
            Sentiment::Positive => 5,
            Sentiment::Negative => 1,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FeedbackForm {
    pub fn rating(rating: u8) -> Self {
        Self {
            rating: Some(rating),
            ..Default::default()
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// At least one of rating, relevance, accuracy or comments, and a rating in 1..=5
    pub fn validate(&self) -> Result<()> {
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(Error::Validation(format!(
                    "Rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }

        let has_content = self.rating.is_some()
            || non_blank(&self.relevance).is_some()
            || non_blank(&self.accuracy).is_some()
            || non_blank(&self.comments).is_some();
        if !has_content {
            return Err(Error::Validation(
                "Please provide at least one feedback field".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the outbound record from a snapshot of the answer being rated
    pub fn into_record(self, snapshot: &QueryResult, now: DateTime<Utc>) -> Result<FeedbackRecord> {
        self.validate()?;

        Ok(FeedbackRecord {
            query: snapshot.query.clone(),
            answer: snapshot.answer.clone(),
            response_id: snapshot.trace_id.clone(),
            trace_id: snapshot.trace_id.clone(),
            model: snapshot.model.clone(),
            source_count: snapshot.source_count,
            confidence: snapshot.confidence,
            rating: self.rating,
            relevance: non_blank(&self.relevance),
            accuracy: non_blank(&self.accuracy),
            completeness: non_blank(&self.completeness),
            comments: non_blank(&self.comments),
            corrections: non_blank(&self.corrections),
            timestamp: now.to_rfc3339(),
        })
    }
}
