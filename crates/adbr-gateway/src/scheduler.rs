//! Reconciliation pass scheduling
//!
//! The daemon loop pulls ticks from a `Scheduler` and runs one pass per
//! tick, inline. Production uses a fixed interval; tests drive passes by
//! hand through a `TriggerHandle` and wait for each pass to finish.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::session::PassReport;

/// One request for a reconciliation pass
#[derive(Debug, Default)]
pub struct Tick {
    /// Receives the pass result, for manually triggered passes
    pub reply: Option<oneshot::Sender<Option<PassReport>>>,
}

/// Source of reconciliation ticks
#[derive(Debug)]
pub struct Scheduler {
    source: Source,
}

#[derive(Debug)]
enum Source {
    Interval(Interval),
    Manual(mpsc::Receiver<Tick>),
}

impl Scheduler {
    /// Tick every `period`, starting one period from now.
    ///
    /// A pass that overruns the period delays the next tick rather than
    /// triggering a burst of catch-up passes.
    pub fn interval(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            source: Source::Interval(interval),
        }
    }

    /// Tick only when the returned handle asks for it
    pub fn manual() -> (Self, TriggerHandle) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                source: Source::Manual(rx),
            },
            TriggerHandle { tx },
        )
    }

    /// Wait for the next tick. `None` once a manual scheduler's handle is gone.
    pub async fn tick(&mut self) -> Option<Tick> {
        match &mut self.source {
            Source::Interval(interval) => {
                interval.tick().await;
                Some(Tick::default())
            }
            Source::Manual(rx) => rx.recv().await,
        }
    }
}

/// Triggers passes on a manual scheduler
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<Tick>,
}

impl TriggerHandle {
    /// Request a pass and wait for its report.
    ///
    /// Returns `None` if the daemon has stopped, or if the pass was abandoned.
    pub async fn run_pass(&self) -> Option<PassReport> {
        let (reply, done) = oneshot::channel();
        self.tx.send(Tick { reply: Some(reply) }).await.ok()?;
        done.await.ok().flatten()
    }
}
