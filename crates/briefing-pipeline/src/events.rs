//! Run progress events.
//!
//! The orchestrator emits [`RunEvent`]s on a [`tokio::sync::broadcast`]
//! channel so observers (the CLI, tests) can follow a run without reaching
//! into the orchestrator.

use serde::{Deserialize, Serialize};

use briefing_types::{ArtifactStatus, Category, Period};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        period: Period,
        categories: Vec<Category>,
    },
    RunCompleted {
        run_id: String,
        published: usize,
        failed: usize,
        duration_ms: u64,
    },
    BatchStarted {
        category: Category,
    },
    BatchSkipped {
        category: Category,
        reason: String,
    },
    DocumentsClaimed {
        category: Category,
        count: usize,
    },
    ArtifactPersisted {
        category: Category,
        artifact_id: i64,
        slug: String,
    },
    ArtifactRendered {
        artifact_id: i64,
        path: String,
    },
    BatchFailed {
        category: Category,
        stage: String,
        error: String,
    },
    BatchRolledBack {
        category: Category,
        restored: usize,
    },
    ArtifactRecovered {
        artifact_id: i64,
        from: ArtifactStatus,
    },
    PublicationStarted {
        artifacts: usize,
    },
    ReviewRequestReady {
        number: u64,
    },
    Merged {
        number: u64,
        forced: bool,
    },
    PublicationFailed {
        error: String,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers. Dropped if nobody listens.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
