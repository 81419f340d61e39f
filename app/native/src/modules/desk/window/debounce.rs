//! Resize debouncer.
//!
//! Native resizes arrive in bursts. Each new rectangle replaces the pending
//! one and bumps a generation counter; the timer armed for an older
//! generation is cancelled, and if it fires anyway its generation no longer
//! matches and it settles nothing. Closing the window discards the pending
//! rectangle without writing it.

use crate::modules::desk::state::Rect;
use crate::modules::desk::timer::TimerHandle;

#[derive(Debug, Default)]
pub struct ResizeDebouncer {
    generation: u64,
    pending: Option<Rect>,
    timer: Option<TimerHandle>,
}

impl ResizeDebouncer {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replaces the pending rectangle and returns the new generation.
    ///
    /// The caller schedules a settle event for this generation and hands its
    /// handle to [`arm`](Self::arm).
    pub fn push(&mut self, rect: Rect) -> u64 {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.generation += 1;
        self.pending = Some(rect);
        self.generation
    }

    pub fn arm(&mut self, timer: TimerHandle) { self.timer = Some(timer); }

    /// Takes the pending rectangle if `generation` is still the latest.
    pub fn settle(&mut self, generation: u64) -> Option<Rect> {
        if generation != self.generation {
            return None;
        }
        self.timer = None;
        self.pending.take()
    }

    /// Drops the pending rectangle and cancels its timer.
    pub fn discard(&mut self) -> Option<Rect> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.pending.take()
    }
}
