//! One-shot timer service.
//!
//! A timer is armed for an absolute provider time (see [`TimeProvider::now`])
//! and runs its callback at most once. Cancelling, or dropping the
//! [`TimerHandle`], guarantees the callback never runs afterwards: firing and
//! cancelling race for the same slot and exactly one of them wins.
//!
//! [`TimeProvider::now`]: crate::TimeProvider::now

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::TokioTimeProvider;

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

type CallbackSlot = Arc<Mutex<Option<TimerCallback>>>;

/// Service able to schedule one-shot wakeups.
pub trait TimerService: Clone + Send + Sync + 'static {
    /// Arm a timer that runs `on_fire` once provider time reaches `due`.
    ///
    /// A `due` time in the past fires as soon as possible.
    fn arm(&self, due: Duration, on_fire: TimerCallback) -> TimerHandle;
}

/// Owning handle to an armed timer.
///
/// Dropping the handle cancels the timer.
pub struct TimerHandle {
    slot: CallbackSlot,
    abort: Option<tokio::task::AbortHandle>,
}

/// Firing side of a timer, handed to whatever drives the wakeup.
pub struct TimerTrigger {
    slot: CallbackSlot,
}

impl TimerHandle {
    /// Create a handle/trigger pair sharing the callback slot.
    ///
    /// Timer service implementations keep the trigger and call
    /// [`TimerTrigger::fire`] when the due time is reached.
    pub fn pair(on_fire: TimerCallback) -> (TimerHandle, TimerTrigger) {
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(on_fire)));
        (
            TimerHandle {
                slot: slot.clone(),
                abort: None,
            },
            TimerTrigger { slot },
        )
    }

    /// Attach the task driving this timer so cancellation also stops it.
    pub fn with_abort_handle(mut self, abort: tokio::task::AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Cancel the timer.
    ///
    /// Returns `true` if the callback had not run yet and now never will.
    pub fn cancel(&mut self) -> bool {
        let taken = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
        taken.is_some()
    }

    /// Whether the timer is still waiting to fire.
    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl TimerTrigger {
    /// Run the callback unless the timer was cancelled first.
    ///
    /// Returns `true` if the callback ran.
    pub fn fire(self) -> bool {
        let callback = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl TimerService for TokioTimeProvider {
    fn arm(&self, due: Duration, on_fire: TimerCallback) -> TimerHandle {
        let (handle, trigger) = TimerHandle::pair(on_fire);
        let deadline = self.instant_at(due);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            trigger.fire();
        });
        handle.with_abort_handle(task.abort_handle())
    }
}
