use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use briefing_types::{BriefingError, DocumentState, Result, SourceDocument};

use crate::{QueryWindow, SourceFeed};

#[derive(Default)]
struct Inner {
    documents: Vec<SourceDocument>,
    states: HashMap<String, DocumentState>,
    history: Vec<(String, DocumentState)>,
    fail_fetch: Option<String>,
}

/// In-process message store, used by tests and dry runs.
///
/// Every `set_state` call is recorded so callers can inspect the sequence of
/// state changes a run performed.
#[derive(Default)]
pub struct MemoryFeed {
    inner: Mutex<Inner>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = SourceDocument>) -> Self {
        let feed = Self::new();
        for doc in documents {
            feed.insert(doc);
        }
        feed
    }

    pub fn insert(&self, document: SourceDocument) {
        let mut inner = self.lock();
        inner
            .states
            .insert(document.external_id.clone(), document.state);
        inner.documents.push(document);
    }

    /// Make every subsequent `fetch` fail with `message`.
    pub fn fail_fetch_with(&self, message: impl Into<String>) {
        self.lock().fail_fetch = Some(message.into());
    }

    pub fn state_of(&self, external_id: &str) -> Option<DocumentState> {
        self.lock().states.get(external_id).copied()
    }

    /// All `set_state` calls so far, in order.
    pub fn history(&self) -> Vec<(String, DocumentState)> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SourceFeed for MemoryFeed {
    async fn fetch(&self, window: &QueryWindow) -> Result<Vec<SourceDocument>> {
        let inner = self.lock();
        if let Some(message) = &inner.fail_fetch {
            return Err(BriefingError::Fetch {
                message: message.clone(),
            });
        }

        let cutoff = Utc::now() - Duration::days(i64::from(window.newer_than_days));
        Ok(inner
            .documents
            .iter()
            .filter(|d| window.allows(&d.sender_address) && d.received_at >= cutoff)
            .map(|d| {
                let mut doc = d.clone();
                if let Some(state) = inner.states.get(&d.external_id) {
                    doc.state = *state;
                }
                doc
            })
            .collect())
    }

    async fn set_state(&self, external_id: &str, state: DocumentState) -> Result<()> {
        let mut inner = self.lock();
        if !inner.states.contains_key(external_id) {
            return Err(BriefingError::Fetch {
                message: format!("unknown document '{external_id}'"),
            });
        }
        inner.states.insert(external_id.to_string(), state);
        inner.history.push((external_id.to_string(), state));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use briefing_types::{OutcomeLabel, Period};

    fn doc(id: &str, sender: &str, days_ago: i64) -> SourceDocument {
        SourceDocument {
            external_id: id.into(),
            sender_name: "TLDR".into(),
            sender_address: sender.into(),
            subject: format!("Issue {id}"),
            received_at: Utc::now() - Duration::days(days_ago),
            body: "body".into(),
            state: DocumentState::Unread,
        }
    }

    #[tokio::test]
    async fn fetch_filters_by_sender_and_window() {
        let feed = MemoryFeed::with_documents([
            doc("m1", "dan@tldrnewsletter.com", 1),
            doc("m2", "dan@tldrnewsletter.com", 5),
            doc("m3", "other@example.com", 1),
        ]);

        let window = QueryWindow::for_period(vec!["dan@tldrnewsletter.com".into()], Period::Midweek);
        let docs = feed.fetch(&window).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.external_id.as_str()).collect();
        assert_eq!(ids, vec!["m1"]);

        let window = QueryWindow::for_period(vec!["dan@tldrnewsletter.com".into()], Period::Weekly);
        assert_eq!(feed.fetch(&window).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn set_state_is_reflected_in_fetch_and_history() {
        let feed = MemoryFeed::with_documents([doc("m1", "dan@tldrnewsletter.com", 0)]);
        feed.set_state("m1", DocumentState::Read).await.unwrap();
        feed.label_outcome(&["m1".to_string()], OutcomeLabel::Parsed)
            .await
            .unwrap();

        let window = QueryWindow::for_period(vec!["dan@tldrnewsletter.com".into()], Period::Weekly);
        let docs = feed.fetch(&window).await.unwrap();
        assert_eq!(docs[0].state, DocumentState::Parsed);
        assert_eq!(
            feed.history(),
            vec![
                ("m1".to_string(), DocumentState::Read),
                ("m1".to_string(), DocumentState::Parsed),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_document_and_injected_failure() {
        let feed = MemoryFeed::new();
        assert!(feed.set_state("nope", DocumentState::Read).await.is_err());

        feed.fail_fetch_with("mailbox unavailable");
        let window = QueryWindow::for_period(vec![], Period::Weekly);
        let err = feed.fetch(&window).await.unwrap_err();
        assert_eq!(err.stage(), "fetch");
    }
}
