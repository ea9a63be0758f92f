//! Source feed adapters for Briefing.
//!
//! A [`SourceFeed`] is the message store newsletters arrive in. The pipeline
//! fetches a window of documents from it, claims them by flipping their state
//! flag, and labels them once their artifact progresses.

mod clean;
mod gmail;
mod memory;

pub use clean::{clean_newsletter_body, remove_emojis, strip_markup};
pub use gmail::{GmailFeed, GmailLabels};
pub use memory::MemoryFeed;

use async_trait::async_trait;
use briefing_types::{DocumentState, OutcomeLabel, Period, Result, SourceDocument};

// ---------------------------------------------------------------------------
// QueryWindow
// ---------------------------------------------------------------------------

/// Which documents a fetch should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    /// Allowlisted sender addresses.
    pub senders: Vec<String>,
    /// Only documents received within this many days.
    pub newer_than_days: u32,
}

impl QueryWindow {
    pub fn for_period(senders: Vec<String>, period: Period) -> Self {
        Self {
            senders,
            newer_than_days: period.lookback_days(),
        }
    }

    /// Gmail search syntax for this window, e.g.
    /// `from:a@x.com OR from:b@y.com newer_than:7d`. Entries that are not
    /// addresses are skipped; `None` when no address is left, since a query
    /// without a sender filter would match the whole mailbox.
    pub fn gmail_query(&self) -> Option<String> {
        let from = self
            .senders
            .iter()
            .filter(|s| s.contains('@'))
            .map(|s| format!("from:{s}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        if from.is_empty() {
            return None;
        }
        Some(format!("{from} newer_than:{}d", self.newer_than_days))
    }

    pub fn allows(&self, address: &str) -> bool {
        self.senders.iter().any(|s| s.eq_ignore_ascii_case(address))
    }
}

// ---------------------------------------------------------------------------
// SourceFeed
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// Documents matching `window`, each carrying its current state flag.
    async fn fetch(&self, window: &QueryWindow) -> Result<Vec<SourceDocument>>;

    /// Overwrite the external state flag of one document.
    async fn set_state(&self, external_id: &str, state: DocumentState) -> Result<()>;

    /// Mark a batch of documents with an outcome label.
    async fn label_outcome(&self, external_ids: &[String], label: OutcomeLabel) -> Result<()> {
        for id in external_ids {
            self.set_state(id, label.state()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gmail_query_joins_senders() {
        let window = QueryWindow::for_period(
            vec!["dan@tldrnewsletter.com".into(), "crew@morningbrew.com".into()],
            Period::Weekly,
        );
        assert_eq!(
            window.gmail_query().as_deref(),
            Some("from:dan@tldrnewsletter.com OR from:crew@morningbrew.com newer_than:7d")
        );
    }

    #[test]
    fn gmail_query_skips_non_addresses() {
        let window = QueryWindow {
            senders: vec!["TLDR".into(), "dan@tldrnewsletter.com".into()],
            newer_than_days: 3,
        };
        assert_eq!(
            window.gmail_query().as_deref(),
            Some("from:dan@tldrnewsletter.com newer_than:3d")
        );
    }

    #[test]
    fn gmail_query_without_addresses_is_none() {
        let window = QueryWindow {
            senders: vec!["TLDR".into(), "The Rundown".into()],
            newer_than_days: 7,
        };
        assert_eq!(window.gmail_query(), None);
        assert_eq!(QueryWindow::for_period(vec![], Period::Weekly).gmail_query(), None);
    }

    #[test]
    fn allows_is_case_insensitive() {
        let window = QueryWindow::for_period(vec!["Dan@TLDRnewsletter.com".into()], Period::Midweek);
        assert!(window.allows("dan@tldrnewsletter.com"));
        assert!(!window.allows("someone@else.com"));
        assert_eq!(window.newer_than_days, 3);
    }
}
