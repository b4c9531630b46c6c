//! Query history list with debounced search.
//!
//! Keystrokes call `on_input`, which only records the latest term and pushes
//! the deadline out by the quiet window. The UI loop calls `poll` on every
//! tick; once the window has passed without new input it hands back a
//! `HistoryFetch` for the most recent term. A blank term means "full history".
//!
//! Every fetch carries a sequence number. `apply` drops a page whose fetch is
//! older than the newest page already shown, so a slow response can never
//! overwrite a newer one.

use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::api::{HistoryEntry, HistoryPage, HistoryStats, ThreatIntelApi};
use crate::error::Result;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// One request for the history list
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFetch {
    pub seq: u64,
    /// `None` loads the unfiltered history
    pub term: Option<String>,
}

impl HistoryFetch {
    pub async fn run(&self, api: &dyn ThreatIntelApi) -> Result<HistoryPage> {
        match &self.term {
            Some(term) => api.search_history(term).await,
            None => api.history().await,
        }
    }
}

pub struct HistorySearch {
    window: Duration,
    input: String,
    deadline: Option<Instant>,
    next_seq: u64,
    applied_seq: Option<u64>,
    entries: Vec<HistoryEntry>,
    stats: Option<HistoryStats>,
    filter: Option<String>,
}

impl HistorySearch {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            input: String::new(),
            deadline: None,
            next_seq: 0,
            applied_seq: None,
            entries: Vec::new(),
            stats: None,
            filter: None,
        }
    }

    /// Record the search box contents; the request waits for the quiet window
    pub fn on_input(&mut self, term: &str, now: Instant) {
        self.input = term.to_string();
        self.deadline = Some(now + self.window);
    }

    /// The fetch to issue, once input has been quiet for the whole window
    pub fn poll(&mut self, now: Instant) -> Option<HistoryFetch> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                let term = self.input.clone();
                Some(self.fetch_for(&term))
            }
            _ => None,
        }
    }

    /// Skip the debounce, e.g. when the panel opens
    pub fn fetch_now(&mut self, term: &str) -> HistoryFetch {
        self.input = term.to_string();
        self.deadline = None;
        self.fetch_for(term)
    }

    fn fetch_for(&mut self, term: &str) -> HistoryFetch {
        let seq = self.next_seq;
        self.next_seq += 1;
        let term = term.trim();
        HistoryFetch {
            seq,
            term: (!term.is_empty()).then(|| term.to_string()),
        }
    }

    /// Replace the displayed list with `page`. Returns false for a stale page.
    pub fn apply(&mut self, fetch: &HistoryFetch, page: HistoryPage) -> bool {
        if self.applied_seq.is_some_and(|applied| fetch.seq < applied) {
            debug!(seq = fetch.seq, applied = ?self.applied_seq, "Dropping stale history page");
            return false;
        }

        self.applied_seq = Some(fetch.seq);
        self.entries = page.queries;
        self.filter = fetch.term.clone();
        if fetch.term.is_none() {
            self.stats = page.stats;
        }
        true
    }

    /// Fetch and apply in one step
    pub async fn refresh(&mut self, api: &dyn ThreatIntelApi, term: &str) -> Result<()> {
        let fetch = self.fetch_now(term);
        let page = fetch.run(api).await?;
        self.apply(&fetch, page);
        Ok(())
    }

    /// Clear history on the service, then reload the (now empty) full list
    pub async fn clear(&mut self, api: &dyn ThreatIntelApi) -> Result<()> {
        api.clear_history().await?;
        info!("Cleared query history");
        self.refresh(api, "").await
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn stats(&self) -> Option<HistoryStats> {
        self.stats
    }

    /// Term of the list currently shown, `None` for the full history
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_waiting(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for HistorySearch {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;

    fn entry(id: &str, query: &str) -> HistoryEntry {
        HistoryEntry {
            query_id: id.into(),
            query: query.into(),
            timestamp: "2024-05-01T12:00:00".into(),
            ..Default::default()
        }
    }

    fn seeded_api() -> FakeApi {
        let api = FakeApi::new();
        *api.history.lock().unwrap() = vec![
            entry("1", "What are common tactics used by APT28?"),
            entry("2", "How does Emotet propagate?"),
            entry("3", "Describe Emotet loaders"),
        ];
        api
    }

    #[test]
    fn typing_inside_the_window_fires_once_with_the_latest_term() {
        let mut search = HistorySearch::new(Duration::from_millis(300));
        let t0 = Instant::now();

        search.on_input("e", t0);
        search.on_input("em", t0 + Duration::from_millis(100));
        search.on_input("emo", t0 + Duration::from_millis(200));

        assert_eq!(search.poll(t0 + Duration::from_millis(450)), None);
        let fetch = search.poll(t0 + Duration::from_millis(500)).unwrap();
        assert_eq!(fetch.term.as_deref(), Some("emo"));
        assert_eq!(search.poll(t0 + Duration::from_millis(900)), None);
        assert!(!search.is_waiting());
    }

    #[test]
    fn blank_terms_request_the_full_history() {
        let mut search = HistorySearch::default();
        let t0 = Instant::now();
        search.on_input("   ", t0);
        let fetch = search.poll(t0 + DEFAULT_DEBOUNCE).unwrap();
        assert_eq!(fetch.term, None);
    }

    #[test]
    fn stale_pages_are_dropped() {
        let mut search = HistorySearch::default();
        let slow = search.fetch_now("apt");
        let fast = search.fetch_now("emotet");

        assert!(search.apply(
            &fast,
            HistoryPage {
                queries: vec![entry("2", "How does Emotet propagate?")],
                stats: None,
            }
        ));
        assert!(!search.apply(
            &slow,
            HistoryPage {
                queries: vec![entry("1", "APT28")],
                stats: None,
            }
        ));

        assert_eq!(search.entries().len(), 1);
        assert_eq!(search.filter(), Some("emotet"));
    }

    #[tokio::test]
    async fn clearing_the_term_restores_the_full_list() {
        let api = seeded_api();
        let mut search = HistorySearch::default();

        search.refresh(&api, "").await.unwrap();
        let full: Vec<_> = search.entries().to_vec();
        assert_eq!(full.len(), 3);
        assert_eq!(search.stats().unwrap().total_queries, 3);

        search.refresh(&api, "emotet").await.unwrap();
        assert_eq!(search.entries().len(), 2);
        assert_eq!(search.filter(), Some("emotet"));

        search.refresh(&api, "").await.unwrap();
        assert_eq!(search.entries(), full.as_slice());
        assert_eq!(search.filter(), None);
        assert_eq!(api.calls(), vec!["history", "search:emotet", "history"]);
    }

    #[tokio::test]
    async fn clear_empties_the_list() {
        let api = seeded_api();
        let mut search = HistorySearch::default();
        search.refresh(&api, "").await.unwrap();

        search.clear(&api).await.unwrap();

        assert!(search.entries().is_empty());
        assert_eq!(search.stats().unwrap().total_queries, 0);
    }
}
