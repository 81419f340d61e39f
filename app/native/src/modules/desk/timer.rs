//! Timers that post back into the desk mailbox.
//!
//! Handlers never sleep. A delayed action is scheduled as a [`TimerEvent`]
//! that arrives later as an ordinary message; stale events are recognised by
//! their generation or attempt number and ignored.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::actor::DeskMessage;
use super::state::AvatarUrl;

/// A timer that fired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// No resize arrived for the debounce window since `generation`.
    ResizeSettled { url: AvatarUrl, generation: u64 },
    /// Render attempt `attempt` ran out of time.
    RenderDeadline { url: AvatarUrl, attempt: u64 },
}

/// Cancels a scheduled timer.
#[derive(Debug, Default)]
pub struct TimerHandle(Option<AbortHandle>);

impl TimerHandle {
    /// A handle with nothing to cancel.
    #[must_use]
    pub const fn detached() -> Self { Self(None) }

    pub fn cancel(self) {
        if let Some(handle) = self.0 {
            handle.abort();
        }
    }
}

/// Schedules timer events.
pub trait Scheduler: Send {
    fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle;
}

/// Scheduler backed by tokio tasks. Must be used inside a runtime.
pub struct TokioScheduler {
    sender: mpsc::Sender<DeskMessage>,
}

impl TokioScheduler {
    #[must_use]
    pub const fn new(sender: mpsc::Sender<DeskMessage>) -> Self { Self { sender } }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle {
        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(DeskMessage::Timer(event)).await.is_err() {
                tracing::trace!("desk: timer fired after actor stopped");
            }
        });
        TimerHandle(Some(task.abort_handle()))
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Records scheduled events so tests decide when they fire.
    #[derive(Clone, Default)]
    pub struct ManualScheduler {
        pending: Arc<Mutex<Vec<(Duration, TimerEvent)>>>,
    }

    impl ManualScheduler {
        /// Removes and returns every scheduled event, oldest first.
        pub fn take(&self) -> Vec<TimerEvent> {
            self.pending.lock().drain(..).map(|(_, event)| event).collect()
        }

        pub fn delays(&self) -> Vec<Duration> {
            self.pending.lock().iter().map(|(delay, _)| *delay).collect()
        }

        pub fn len(&self) -> usize { self.pending.lock().len() }
    }

    impl Scheduler for ManualScheduler {
        fn schedule(&self, delay: Duration, event: TimerEvent) -> TimerHandle {
            self.pending.lock().push((delay, event));
            TimerHandle::detached()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_delivers_after_delay() {
        let (sender, mut receiver) = mpsc::channel(4);
        let scheduler = TokioScheduler::new(sender);
        let url = AvatarUrl::local("0", "c", "a");

        let _handle = scheduler.schedule(
            Duration::from_millis(1000),
            TimerEvent::ResizeSettled { url: url.clone(), generation: 1 },
        );

        // Let the timer task register its sleep before moving the clock.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(receiver.try_recv().is_err());

        match tokio::time::timeout(Duration::from_millis(10), receiver.recv()).await {
            Ok(Some(DeskMessage::Timer(TimerEvent::ResizeSettled { generation, .. }))) => {
                assert_eq!(generation, 1);
            }
            _ => panic!("Expected ResizeSettled timer"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (sender, mut receiver) = mpsc::channel(4);
        let scheduler = TokioScheduler::new(sender);
        let url = AvatarUrl::local("0", "c", "a");

        let handle = scheduler.schedule(
            Duration::from_millis(50),
            TimerEvent::RenderDeadline { url, attempt: 1 },
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(receiver.try_recv().is_err());
    }
}
