//! The monitor pipeline: fetch, parse, compare, notify, persist.
//!
//! A run either stops before touching anything (fetch or parse failed, or
//! nothing changed) or goes all the way to persisting the new snapshot.
//! Notification failures are logged per routing key and never stop the run.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::diff::{ChangeSet, diff};
use crate::fetch::{FetchError, ScheduleSource};
use crate::format::format_message;
use crate::model::{ScheduleDate, ScheduleSnapshot};
use crate::notify::Notifier;
use crate::parse::{ParseError, parse_schedule};
use crate::storage::SnapshotStore;

/// Failures that abort a run before any state change.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The schedule matches the stored one; nothing was written or sent.
    Unchanged,

    /// The schedule changed.
    Updated {
        /// Routing keys whose message was accepted.
        sent: Vec<String>,
        /// Routing keys whose dispatch failed.
        failed: Vec<String>,
        /// Whether the new snapshot was stored.
        persisted: bool,
    },
}

/// A message ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub routing_key: String,
    pub message: String,
}

/// Messages for every sub-queue whose slots changed, in schedule order.
pub fn notifications(changes: &ChangeSet) -> Vec<Notification> {
    changes
        .changed()
        .map(|c| {
            let routing_key = c.routing_key();
            tracing::debug!(%routing_key, flagged = c.has_flagged_slots(), "sub-queue changed");
            Notification {
                message: format_message(c.queue, c.subqueue, &c.slots, &c.changed),
                routing_key,
            }
        })
        .collect()
}

/// Wires the collaborators together.
pub struct Pipeline {
    source: Box<dyn ScheduleSource>,
    store: Box<dyn SnapshotStore>,
    notifier: Box<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn ScheduleSource>,
        store: Box<dyn SnapshotStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
        }
    }

    /// Run once for `date`.
    pub async fn run(&self, date: ScheduleDate) -> Result<RunOutcome, RunError> {
        let markup = self.source.fetch_markup(date).await?;
        let snapshot = parse_schedule(date, &markup)?;

        let previous = self.load_previous(date);
        if previous.as_ref() == Some(&snapshot) {
            tracing::info!(%date, "no changes");
            return Ok(RunOutcome::Unchanged);
        }

        tracing::info!(%date, first = previous.is_none(), "schedule changed");
        let changes = diff(previous.as_ref(), &snapshot);

        let mut sent = Vec::new();
        let mut failed = Vec::new();
        for n in notifications(&changes) {
            match self.notifier.send(&n.routing_key, &n.message).await {
                Ok(()) => sent.push(n.routing_key),
                Err(e) => {
                    tracing::error!(routing_key = %n.routing_key, error = %e, "dispatch failed");
                    failed.push(n.routing_key);
                }
            }
        }

        let persisted = self.persist(date, &snapshot);
        Ok(RunOutcome::Updated {
            sent,
            failed,
            persisted,
        })
    }

    /// Stored snapshot for `date`. A read failure counts as none stored.
    fn load_previous(&self, date: ScheduleDate) -> Option<ScheduleSnapshot> {
        match self.store.load(date) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(%date, error = %e, "could not read stored snapshot, treating as first observation");
                None
            }
        }
    }

    fn persist(&self, date: ScheduleDate, snapshot: &ScheduleSnapshot) -> bool {
        match self.store.save(date, snapshot) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%date, error = %e, "could not store snapshot");
                false
            }
        }
    }

    /// Run every `period` until `shutdown` resolves.
    ///
    /// Runs never overlap: each one is awaited before the next tick is taken,
    /// and ticks missed while a run was in flight are skipped.
    pub async fn watch<T, F>(&self, period: Duration, mut today: T, shutdown: F)
    where
        T: FnMut() -> Option<ScheduleDate>,
        F: Future<Output = ()>,
    {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(interval = ?period, "watching schedule");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let Some(date) = today() else {
                continue;
            };
            match self.run(date).await {
                Ok(RunOutcome::Unchanged) => {}
                Ok(RunOutcome::Updated {
                    sent,
                    failed,
                    persisted,
                }) => {
                    tracing::info!(%date, sent = sent.len(), failed = failed.len(), persisted, "run complete");
                }
                Err(RunError::Parse(e)) => tracing::warn!(%date, error = %e, "run aborted"),
                Err(e) => tracing::error!(%date, error = %e, "run aborted"),
            }
        }
        tracing::info!("stopped watching");
    }
}
