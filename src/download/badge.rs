use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Minimum spacing between two published summaries
pub const BADGE_INTERVAL: Duration = Duration::from_millis(300);

/// Queue counts shown to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    /// Items not yet in a terminal state
    pub pending: usize,
    pub total: usize,
    pub concurrent: usize,
}

impl QueueSummary {
    /// Badge text, empty when nothing is pending
    pub fn badge_text(&self) -> String {
        if self.pending == 0 {
            String::new()
        } else {
            self.pending.to_string()
        }
    }
}

/// Coalescing summary publisher
///
/// State changes only mark the badge dirty. The owner publishes once the
/// deadline passes, so bursts of changes cost one update.
#[derive(Debug)]
pub struct Badge {
    tx: watch::Sender<QueueSummary>,
    deadline: Option<Instant>,
    interval: Duration,
}

impl Badge {
    pub fn new() -> (Self, watch::Receiver<QueueSummary>) {
        Self::with_interval(BADGE_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> (Self, watch::Receiver<QueueSummary>) {
        let (tx, rx) = watch::channel(QueueSummary::default());
        (
            Self {
                tx,
                deadline: None,
                interval,
            },
            rx,
        )
    }

    /// Schedule a publish unless one is already pending
    pub fn mark_dirty(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Publish `summary` and clear the pending deadline
    pub fn publish(&mut self, summary: QueueSummary) {
        self.deadline = None;
        self.tx.send_if_modified(|current| {
            if *current == summary {
                return false;
            }
            tracing::trace!("Badge: {} pending of {}", summary.pending, summary.total);
            *current = summary;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueSummary> {
        self.tx.subscribe()
    }
}
