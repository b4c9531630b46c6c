use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::*;
use super::ThreatIntelApi;
use crate::config::Config;
use crate::error::{Error, Result};

/// reqwest-backed client for the threat intelligence API
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Client against an explicit base URL with no timeout
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// `/api/conversations/<id>[/<action>]`, the id encoded as a single path segment
    fn conversation_url(&self, id: &str, action: Option<&str>) -> Result<String> {
        let invalid = || Error::Validation(format!("Invalid API URL: {}", self.base_url));
        let mut url = Url::parse(&self.url("conversations")).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .push(id)
            .extend(action);
        Ok(url.into())
    }

    /// Turn non-2xx responses into `Error::Api`, preferring the body's `error` field
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .map(|r| format!("{} {}", status.as_u16(), r))
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
            });
        warn!(status = status.as_u16(), %message, "API request failed");

        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        Self::read_json(response).await
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T> {
        debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl ThreatIntelApi for ApiClient {
    async fn status(&self) -> Result<StatusInfo> {
        self.get_json(self.url("status")).await
    }

    async fn samples(&self) -> Result<Vec<String>> {
        let response: SamplesResponse = self.get_json(self.url("samples")).await?;
        Ok(response.samples)
    }

    async fn query(&self, query: &str) -> Result<QueryResult> {
        self.post_json(self.url("query"), &serde_json::json!({ "query": query }))
            .await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let list: ConversationList = self.get_json(self.url("conversations")).await?;
        Ok(list.conversations)
    }

    async fn create_conversation(&self, title: &str) -> Result<String> {
        let created: CreatedConversation = self
            .post_json(self.url("conversations"), &serde_json::json!({ "title": title }))
            .await?;
        Ok(created.conversation_id)
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        self.get_json(self.conversation_url(id, None)?).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let url = self.conversation_url(id, None)?;
        debug!(%url, "DELETE");
        let response = self.client.delete(&url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn send_message(&self, conversation_id: &str, message: &str) -> Result<ChatReply> {
        self.post_json(
            self.conversation_url(conversation_id, Some("message"))?,
            &serde_json::json!({ "message": message }),
        )
        .await
    }

    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<FeedbackReceipt> {
        let url = self.url("feedback");
        debug!(%url, "POST");
        let response = self.client.post(&url).json(record).send().await?;
        let response = Self::check(response).await?;
        // Older backends reply with an empty 200
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(FeedbackReceipt::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn export(&self, format: ExportFormat, result: &QueryResult) -> Result<Vec<u8>> {
        let url = self.url(&format!("export/{}", format.extension()));
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(&ExportRequest { result })
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn history(&self) -> Result<HistoryPage> {
        self.get_json(self.url("history")).await
    }

    async fn search_history(&self, term: &str) -> Result<HistoryPage> {
        let url = self.url("history/search");
        debug!(%url, term, "GET");
        let response = self.client.get(&url).query(&[("q", term)]).send().await?;
        Self::read_json(response).await
    }

    async fn clear_history(&self) -> Result<()> {
        let url = self.url("history/clear");
        debug!(%url, "POST");
        let response = self.client.post(&url).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
