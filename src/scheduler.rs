//! Deferred and periodic work for an arena.
//!
//! Scheduled work never runs on the timer. A fired task is handed back to
//! whoever owns the arena, which runs it through [`Arena::run_scheduled`]
//! on the arena's own queue.
//!
//! [`Arena::run_scheduled`]: crate::arena::Arena::run_scheduled

use crate::time::{Clock, ManualClock, millis};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Work an arena asks to have done later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Redraw the countdown display
    CountdownRefresh { ticker: u64 },
    /// Move from starting to playing
    BeginGame { round: u64 },
    /// Move from ended back to waiting
    ResetArena { round: u64 },
}

/// Cancellation flag shared between a periodic task and its owner
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub trait Scheduler: Send + Sync {
    /// Fire `task` once after `delay`
    fn run_after(&self, delay: Duration, task: ScheduledTask);

    /// Fire `task` every `interval` until the returned handle is cancelled
    fn run_periodic(&self, interval: Duration, task: ScheduledTask) -> TaskHandle;
}

/// Scheduler backed by tokio timers.
///
/// Fired tasks are sent down a channel that the arena task drains.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<ScheduledTask>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<ScheduledTask>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScheduledTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Scheduler for TokioScheduler {
    fn run_after(&self, delay: Duration, task: ScheduledTask) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(task).is_err() {
                debug!("Arena queue closed, dropping {:?}", task);
            }
        });
    }

    fn run_periodic(&self, interval: Duration, task: ScheduledTask) -> TaskHandle {
        let handle = TaskHandle::new();
        let flag = handle.clone();
        let tx = self.tx.clone();

        // tokio panics on a zero period
        let interval = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes straight away
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if flag.is_cancelled() || tx.send(task).is_err() {
                    break;
                }
            }
        });

        handle
    }
}

#[derive(Debug)]
struct Pending {
    due_ms: u64,
    seq: u64,
    task: ScheduledTask,
    repeat: Option<(u64, TaskHandle)>,
}

#[derive(Debug, Default)]
struct Queue {
    pending: Vec<Pending>,
    next_seq: u64,
}

impl Queue {
    fn push(&mut self, due_ms: u64, task: ScheduledTask, repeat: Option<(u64, TaskHandle)>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending {
            due_ms,
            seq,
            task,
            repeat,
        });
    }

    /// Remove the earliest task due at or before `until`
    fn pop_due(&mut self, until: u64) -> Option<Pending> {
        self.pending.retain(|p| !p.repeat.as_ref().is_some_and(|(_, h)| h.is_cancelled()));

        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due_ms <= until)
            .min_by_key(|(_, p)| (p.due_ms, p.seq))
            .map(|(i, _)| i)?;
        Some(self.pending.swap_remove(idx))
    }
}

/// Scheduler driven by hand against a [`ManualClock`], for tests and replays.
///
/// ```rust,ignore
/// scheduler.advance(Duration::from_millis(3000), |task| arena.run_scheduled(task));
/// ```
#[derive(Debug)]
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    queue: Mutex<Queue>,
}

impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(Queue::default()),
        }
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Number of scheduled tasks still waiting (cancelled tickers excluded)
    pub fn pending_count(&self) -> usize {
        self.queue
            .lock()
            .pending
            .iter()
            .filter(|p| !p.repeat.as_ref().is_some_and(|(_, h)| h.is_cancelled()))
            .count()
    }

    /// Move the clock forward by `by`, firing every task that comes due.
    ///
    /// Tasks fire in due order with the clock set to their due time. Tasks
    /// scheduled from inside `fire` are picked up if they fall in the window.
    pub fn advance(&self, by: Duration, mut fire: impl FnMut(ScheduledTask)) {
        let target = self.clock.now_ms().saturating_add(millis(by));

        loop {
            let next = {
                let mut queue = self.queue.lock();
                let next = queue.pop_due(target);
                if let Some(Pending {
                    due_ms,
                    task,
                    repeat: Some((interval, handle)),
                    ..
                }) = &next
                {
                    if let Some(due) = due_ms.checked_add(*interval) {
                        queue.push(due, *task, Some((*interval, handle.clone())));
                    }
                }
                next
            };

            let Some(pending) = next else { break };
            self.clock.set(pending.due_ms.max(self.clock.now_ms()));
            fire(pending.task);
        }

        self.clock.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn run_after(&self, delay: Duration, task: ScheduledTask) {
        let due = self.clock.now_ms().saturating_add(millis(delay));
        self.queue.lock().push(due, task, None);
    }

    fn run_periodic(&self, interval: Duration, task: ScheduledTask) -> TaskHandle {
        let handle = TaskHandle::new();
        let interval_ms = millis(interval).max(1);
        let due = self.clock.now_ms().saturating_add(interval_ms);
        self.queue
            .lock()
            .push(due, task, Some((interval_ms, handle.clone())));
        handle
    }
}
