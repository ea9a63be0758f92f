use serde::{Deserialize, Serialize};

use crate::{Category, Period};

/// What happened to one category during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CategoryOutcome {
    /// No active newsletter is configured for the category.
    SkippedNoNewsletters,
    /// The feed returned no unprocessed documents.
    SkippedNoEmails,
    /// Generation, persistence, or rendering failed and the claimed
    /// documents were restored to their prior state.
    GenerationFailedRolledBack { stage: String, reason: String },
    /// An artifact was rendered and carried through to the published state.
    Published { artifact_id: i64, slug: String },
    /// An artifact was rendered but publication did not complete. It stays
    /// in `MARKDOWN_CREATED` and is picked up again on the next run.
    PublishFailed {
        artifact_id: i64,
        slug: String,
        reason: String,
    },
    /// Stopped after rendering because the run was a dry run.
    Rendered { artifact_id: i64, slug: String },
}

impl CategoryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CategoryOutcome::GenerationFailedRolledBack { .. } | CategoryOutcome::PublishFailed { .. }
        )
    }

    pub fn artifact_id(&self) -> Option<i64> {
        match self {
            CategoryOutcome::Published { artifact_id, .. }
            | CategoryOutcome::PublishFailed { artifact_id, .. }
            | CategoryOutcome::Rendered { artifact_id, .. } => Some(*artifact_id),
            _ => None,
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub period: Period,
    /// One entry per processed category, in processing order.
    pub outcomes: Vec<(Category, CategoryOutcome)>,
    /// Artifacts left over from earlier runs that this run carried forward.
    #[serde(default)]
    pub recovered: Vec<i64>,
    /// Number of the review request the run published through, if any.
    pub review_request: Option<u64>,
}

impl RunReport {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            outcomes: Vec::new(),
            recovered: Vec::new(),
            review_request: None,
        }
    }

    pub fn outcome(&self, category: Category) -> Option<&CategoryOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, outcome)| outcome)
    }

    pub fn published_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CategoryOutcome::Published { .. }))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lookups() {
        let mut report = RunReport::new(Period::Weekly);
        report
            .outcomes
            .push((Category::Ai, CategoryOutcome::Published {
                artifact_id: 1,
                slug: "weekly-ai-news-1".into(),
            }));
        report.outcomes.push((Category::Tech, CategoryOutcome::SkippedNoEmails));

        assert_eq!(report.published_count(), 1);
        assert!(!report.has_failures());
        assert_eq!(report.outcome(Category::Tech), Some(&CategoryOutcome::SkippedNoEmails));
        assert_eq!(report.outcome(Category::Ai).and_then(|o| o.artifact_id()), Some(1));
        assert!(report.outcome(Category::Health).is_none());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(CategoryOutcome::GenerationFailedRolledBack {
            stage: "generate".into(),
            reason: "empty response".into(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "generation_failed_rolled_back");
        assert_eq!(json["stage"], "generate");
    }
}
