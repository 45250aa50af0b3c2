use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTick {
    pub session_id: u64,
}

/// A running countdown schedule. Cancelling stops further ticks for good.
pub trait TickHandle: Send {
    fn cancel(self: Box<Self>);
}

pub trait TickScheduler: Send + Sync {
    fn start(&self, session_id: u64) -> Box<dyn TickHandle>;
}

/// Sends one `SessionTick` per period into a channel; a single consumer applies them in order.
pub struct TokioTickScheduler {
    period: Duration,
    tx: mpsc::UnboundedSender<SessionTick>,
}

impl TokioTickScheduler {
    pub fn new(period: Duration) -> (Self, mpsc::UnboundedReceiver<SessionTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { period, tx }, rx)
    }
}

impl TickScheduler for TokioTickScheduler {
    fn start(&self, session_id: u64) -> Box<dyn TickHandle> {
        let tx = self.tx.clone();
        let period = self.period;
        let task = tokio::spawn(async move {
            // First tick one full period after start, not immediately.
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                if tx.send(SessionTick { session_id }).is_err() {
                    break;
                }
            }
        });
        Box::new(TokioTickHandle { task })
    }
}

struct TokioTickHandle {
    task: JoinHandle<()>,
}

impl TickHandle for TokioTickHandle {
    fn cancel(self: Box<Self>) {
        self.task.abort();
    }
}

impl Drop for TokioTickHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
