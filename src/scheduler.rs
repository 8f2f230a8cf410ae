//! Cooperative task queue of the simulated main thread.
//!
//! Nothing runs in the background: posted tasks execute only when the
//! scheduler is explicitly driven (`run_one_task`, `advance_by`, `drain`, ...)
//! on the calling thread. Time is virtual and only moves when driven.
//!
//! Other threads post through a `SchedulerHandle`, which feeds a channel inbox.
//! The inbox is moved into the queue whenever the scheduler is driven.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// A unit of work for the main thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct QueueState {
    now: Duration,
    next_seq: u64,
    // Ordered by due time, then by posting order.
    pending: BTreeMap<(Duration, u64), Task>,
}

impl QueueState {
    fn push(&mut self, due: Duration, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((due, seq), task);
    }
}

/// Posts tasks onto a scheduler from any thread.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: Sender<Task>,
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

impl SchedulerHandle {
    /// Posts a task due at the scheduler's current time.
    ///
    /// Returns false if the scheduler has been dropped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(task)).is_ok()
    }
}

/// Ordered task queue for the single logical main thread.
pub struct MainThreadScheduler {
    owner: ThreadId,
    state: Mutex<QueueState>,
    inbox_tx: Sender<Task>,
    inbox_rx: Receiver<Task>,
}

impl fmt::Debug for MainThreadScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadScheduler")
            .field("owner", &self.owner)
            .field("now", &self.current_time())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

impl Default for MainThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadScheduler {
    /// Creates an empty scheduler owned by the calling thread.
    #[must_use]
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = unbounded();
        Self {
            owner: thread::current().id(),
            state: Mutex::new(QueueState::default()),
            inbox_tx,
            inbox_rx,
        }
    }

    /// Thread the scheduler was created on.
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// A `Send` handle for posting from other threads.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.inbox_tx.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Tasks never run under the lock, so poisoning cannot leave the queue half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn intake(&self, state: &mut QueueState) {
        let now = state.now;
        while let Ok(task) = self.inbox_rx.try_recv() {
            state.push(now, task);
        }
    }

    /// Posts a task due now.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.post_delayed(task, Duration::ZERO);
    }

    /// Posts a task due `delay` after the current virtual time.
    pub fn post_delayed(&self, task: impl FnOnce() + Send + 'static, delay: Duration) {
        let mut state = self.lock();
        self.intake(&mut state);
        let due = state.now.saturating_add(delay);
        state.push(due, Box::new(task));
    }

    /// Current virtual time.
    #[must_use]
    pub fn current_time(&self) -> Duration {
        self.lock().now
    }

    /// Number of tasks waiting, including ones posted from other threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().pending.len() + self.inbox_rx.len()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.size() == 0
    }

    fn pop_due(&self, limit: Option<Duration>) -> Option<Task> {
        let mut state = self.lock();
        self.intake(&mut state);
        let (&(due, seq), _) = state.pending.first_key_value()?;
        if limit.is_some_and(|limit| due > limit) {
            return None;
        }
        let task = state.pending.remove(&(due, seq))?;
        if due > state.now {
            state.now = due;
        }
        Some(task)
    }

    /// Runs the earliest task, advancing time to its due time if needed.
    pub fn run_one_task(&self) -> bool {
        match self.pop_due(None) {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs every task due up to `target`, in order, then sets the clock to `target`.
    ///
    /// Tasks posted while running are picked up if they fall due in time.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(Some(target)) {
            task();
            ran += 1;
        }
        let mut state = self.lock();
        if target > state.now {
            state.now = target;
        }
        ran
    }

    /// Advances virtual time by `interval`, running everything that falls due.
    pub fn advance_by(&self, interval: Duration) -> usize {
        let target = self.current_time().saturating_add(interval);
        self.advance_to(target)
    }

    /// Advances to the due time of the latest task queued right now.
    pub fn advance_to_last_posted(&self) -> usize {
        let last = {
            let mut state = self.lock();
            self.intake(&mut state);
            state.pending.last_key_value().map(|(&(due, _), _)| due)
        };
        last.map_or(0, |due| self.advance_to(due))
    }

    /// Runs every task due now without moving the clock.
    pub fn drain(&self) -> usize {
        self.advance_by(Duration::ZERO)
    }

    /// Drops all pending tasks and rewinds the clock.
    pub fn reset(&self) {
        let mut state = self.lock();
        while self.inbox_rx.try_recv().is_ok() {}
        *state = QueueState::default();
    }
}
