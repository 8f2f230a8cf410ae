//! Main-thread looper.

use std::sync::{Arc, PoisonError, RwLock};
use std::thread::ThreadId;

use crate::scheduler::MainThreadScheduler;

/// Message loop bound to the main thread.
///
/// A looper outlives individual tests: it is prepared once per main thread and
/// rebound to each test's fresh scheduler with `reset_scheduler`.
#[derive(Debug)]
pub struct Looper {
    thread: ThreadId,
    scheduler: RwLock<Arc<MainThreadScheduler>>,
}

impl Looper {
    /// Returns the looper in `slot` if it belongs to `thread`, otherwise
    /// prepares a new one there. Either way it ends up driving `scheduler`.
    pub fn prepare_main_looper(
        slot: &mut Option<Arc<Self>>,
        thread: ThreadId,
        scheduler: &Arc<MainThreadScheduler>,
    ) -> Arc<Self> {
        if let Some(existing) = slot.as_ref().filter(|looper| looper.thread == thread) {
            existing.reset_scheduler(scheduler);
            return Arc::clone(existing);
        }
        let looper = Arc::new(Self {
            thread,
            scheduler: RwLock::new(Arc::clone(scheduler)),
        });
        *slot = Some(Arc::clone(&looper));
        looper
    }

    /// Thread this looper belongs to.
    #[must_use]
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Scheduler currently driven by this looper.
    #[must_use]
    pub fn scheduler(&self) -> Arc<MainThreadScheduler> {
        Arc::clone(&self.scheduler.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Rebinds the looper to `scheduler`.
    pub fn reset_scheduler(&self, scheduler: &Arc<MainThreadScheduler>) {
        *self.scheduler.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(scheduler);
    }

    /// Posts a task onto the looper's scheduler.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.scheduler().post(task);
    }
}
