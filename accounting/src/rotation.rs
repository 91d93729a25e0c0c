/// Periodic shift rotation
///
/// A background task walks the dispatcher on a fixed cadence, rotates every
/// live session's shift, and hands the non-empty finalized shifts to the
/// settlement consumer over a channel. The handler set is cloned out of the
/// registry lock first so rotation work never runs under it.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::dispatcher::Dispatcher;
use crate::shift::FinalizedShift;

/// One rotated-out shift, attributed to the (client, worker) identity that
/// was bound to the session when the rotation pass ran.
#[derive(Debug, Clone)]
pub struct SettledShift {
    pub client: String,
    pub worker: String,
    pub shift: FinalizedShift,
}

pub struct ShiftScheduler {
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    sink: mpsc::UnboundedSender<SettledShift>,
    running: Arc<AtomicBool>,
}

impl ShiftScheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SettledShift>) {
        let (sink, drain) = mpsc::unbounded_channel();
        (
            Self {
                dispatcher,
                period,
                sink,
                running: Arc::new(AtomicBool::new(false)),
            },
            drain,
        )
    }

    /// Rotate every live session once, forwarding non-empty shifts to the
    /// settlement channel. Returns how many shifts were forwarded.
    pub fn rotate_all(&self) -> usize {
        let handlers = self.dispatcher.snapshot();
        let mut forwarded = 0;
        for handler in handlers {
            let shift = handler.session().rotate();
            if shift.is_empty() {
                continue;
            }
            let settled = SettledShift {
                client: handler.client().name().to_string(),
                worker: handler.worker().name(),
                shift,
            };
            if self.sink.send(settled).is_err() {
                tracing::warn!("settlement receiver dropped, stopping shift rotation");
                self.running.store(false, Ordering::Release);
                break;
            }
            forwarded += 1;
        }
        if forwarded > 0 {
            tracing::debug!(forwarded, "shift rotation pass complete");
        }
        forwarded
    }

    pub fn spawn(self) -> SchedulerHandle {
        let running = self.running.clone();
        running.store(true, Ordering::Release);
        tracing::info!(period_secs = self.period.as_secs(), "shift scheduler started");
        let join = tokio::spawn(self.run());
        SchedulerHandle { running, join }
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick of a tokio interval completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            self.rotate_all();
        }
        tracing::info!("shift scheduler stopped");
    }
}

pub struct SchedulerHandle {
    running: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Takes effect at the next tick; already-forwarded shifts are unaffected.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub async fn stopped(self) {
        self.stop();
        let _ = self.join.await;
    }
}
