//! Focus arbitration.
//!
//! Blurring and refocusing a window to pull window-manager attention makes
//! the OS focus some other window in between. Those transient events must not
//! reach any renderer. A context-wide gate silences every window while a
//! transfer is in flight; the window being recaptured carries a
//! [`FocusGuard`] that consumes its own events and reopens the gate.
//!
//! Once the recaptured window's focus event has been handled the gate is open
//! again and every guard is back to `Idle`. A window that stops listening
//! before that event arrives, because a switch stripped it or it went away,
//! releases its guard with [`abandon`] so the gate never stays shut.

use serde::{Deserialize, Serialize};

use super::state::DeskContext;

/// One-shot focus state of a single window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FocusGuard {
    #[default]
    Idle,
    /// Swallow the next focus event. Used while restacking.
    SuppressFocusOnce,
    /// Swallow the next blur, then await recapture.
    #[serde(rename_all = "camelCase")]
    AwaitingBlur { emit_focus: bool },
    /// The next focus event reopens the gate.
    #[serde(rename_all = "camelCase")]
    AwaitingRecapture { emit_focus: bool },
}

/// Which of the recaptured window's own events are silenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuppressMode {
    /// The window's blur (if it was focused) and its focus are both silent.
    Events,
    /// Only other windows are silenced; the window's blur and focus propagate.
    FocusEvent,
}

/// Arms the protocol for one window. The caller then calls native
/// `blur()` followed by `focus()` on it without yielding.
pub fn begin_transfer(
    ctx: &mut DeskContext,
    guard: &mut FocusGuard,
    is_focused: bool,
    mode: SuppressMode,
) {
    ctx.close_focus_gate();
    *guard = match mode {
        SuppressMode::Events if is_focused => FocusGuard::AwaitingBlur { emit_focus: false },
        SuppressMode::Events => FocusGuard::AwaitingRecapture { emit_focus: false },
        SuppressMode::FocusEvent => FocusGuard::AwaitingRecapture { emit_focus: true },
    };
}

/// Handles a native blur. Returns whether `CardBlurred` should be emitted.
pub fn on_blur(ctx: &DeskContext, guard: &mut FocusGuard) -> bool {
    match *guard {
        FocusGuard::AwaitingBlur { emit_focus } => {
            *guard = FocusGuard::AwaitingRecapture { emit_focus };
            false
        }
        // The window being recaptured is exempt from the gate.
        FocusGuard::AwaitingRecapture { .. } => true,
        FocusGuard::Idle | FocusGuard::SuppressFocusOnce => ctx.focus_permitted(),
    }
}

/// Handles a native focus. Returns whether `CardFocused` should be emitted.
pub fn on_focus(ctx: &mut DeskContext, guard: &mut FocusGuard) -> bool {
    match std::mem::take(guard) {
        FocusGuard::AwaitingBlur { emit_focus } | FocusGuard::AwaitingRecapture { emit_focus } => {
            ctx.open_focus_gate();
            emit_focus
        }
        FocusGuard::SuppressFocusOnce => false,
        FocusGuard::Idle => ctx.focus_permitted(),
    }
}

/// Releases `guard` for a window that will never deliver its recapture
/// event. Returns whether a pending transfer was cut short.
pub fn abandon(ctx: &mut DeskContext, guard: &mut FocusGuard) -> bool {
    match std::mem::take(guard) {
        FocusGuard::AwaitingBlur { .. } | FocusGuard::AwaitingRecapture { .. } => {
            ctx.open_focus_gate();
            true
        }
        FocusGuard::Idle | FocusGuard::SuppressFocusOnce => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Win {
        guard: FocusGuard,
        emitted: Vec<&'static str>,
    }

    impl Win {
        fn new() -> Self { Self { guard: FocusGuard::Idle, emitted: Vec::new() } }

        fn blur(&mut self, ctx: &DeskContext) {
            if on_blur(ctx, &mut self.guard) {
                self.emitted.push("blurred");
            }
        }

        fn focus(&mut self, ctx: &mut DeskContext) {
            if on_focus(ctx, &mut self.guard) {
                self.emitted.push("focused");
            }
        }
    }

    #[test]
    fn test_idle_window_emits_when_gate_open() {
        let mut ctx = DeskContext::new();
        let mut win = Win::new();
        win.focus(&mut ctx);
        win.blur(&ctx);
        assert_eq!(win.emitted, vec!["focused", "blurred"]);
    }

    #[test]
    fn test_suppress_events_on_focused_window() {
        let mut ctx = DeskContext::new();
        let mut a = Win::new();
        let mut b = Win::new();

        begin_transfer(&mut ctx, &mut a.guard, true, SuppressMode::Events);
        assert!(!ctx.focus_permitted());

        // blur(A), OS focuses B, focus(A) blurs B and focuses A.
        a.blur(&ctx);
        b.focus(&mut ctx);
        b.blur(&ctx);
        a.focus(&mut ctx);

        assert!(a.emitted.is_empty());
        assert!(b.emitted.is_empty());
        assert!(ctx.focus_permitted());
        assert_eq!(a.guard, FocusGuard::Idle);
        assert_eq!(b.guard, FocusGuard::Idle);
    }

    #[test]
    fn test_suppress_events_on_unfocused_window() {
        let mut ctx = DeskContext::new();
        let mut a = Win::new();
        let mut b = Win::new();

        begin_transfer(&mut ctx, &mut a.guard, false, SuppressMode::Events);
        assert_eq!(a.guard, FocusGuard::AwaitingRecapture { emit_focus: false });

        // Only focus(A) produces events: B loses focus, A gains it.
        b.blur(&ctx);
        a.focus(&mut ctx);

        assert!(a.emitted.is_empty());
        assert!(b.emitted.is_empty());
        assert!(ctx.focus_permitted());
        assert_eq!(a.guard, FocusGuard::Idle);
    }

    #[test]
    fn test_suppress_focus_event_lets_own_events_through() {
        let mut ctx = DeskContext::new();
        let mut a = Win::new();
        let mut b = Win::new();

        begin_transfer(&mut ctx, &mut a.guard, true, SuppressMode::FocusEvent);

        a.blur(&ctx);
        b.focus(&mut ctx);
        b.blur(&ctx);
        a.focus(&mut ctx);

        assert_eq!(a.emitted, vec!["blurred", "focused"]);
        assert!(b.emitted.is_empty());
        assert!(ctx.focus_permitted());
        assert_eq!(a.guard, FocusGuard::Idle);
    }

    #[test]
    fn test_suppress_focus_once_is_consumed() {
        let mut ctx = DeskContext::new();
        let mut a = Win { guard: FocusGuard::SuppressFocusOnce, emitted: Vec::new() };
        a.focus(&mut ctx);
        assert!(a.emitted.is_empty());
        assert_eq!(a.guard, FocusGuard::Idle);

        a.focus(&mut ctx);
        assert_eq!(a.emitted, vec!["focused"]);
    }

    #[test]
    fn test_closed_gate_leaves_other_guards_untouched() {
        let mut ctx = DeskContext::new();
        ctx.close_focus_gate();
        let mut b = Win { guard: FocusGuard::SuppressFocusOnce, emitted: Vec::new() };
        b.blur(&ctx);
        assert_eq!(b.guard, FocusGuard::SuppressFocusOnce);
        assert!(b.emitted.is_empty());
    }

    #[test]
    fn test_focus_without_blur_still_recaptures() {
        let mut ctx = DeskContext::new();
        let mut a = Win::new();
        begin_transfer(&mut ctx, &mut a.guard, true, SuppressMode::Events);
        // The OS never delivered the blur.
        a.focus(&mut ctx);
        assert!(ctx.focus_permitted());
        assert_eq!(a.guard, FocusGuard::Idle);
        assert!(a.emitted.is_empty());
    }

    #[test]
    fn test_abandon_reopens_gate_for_pending_transfer() {
        let mut ctx = DeskContext::new();
        let mut a = Win::new();
        begin_transfer(&mut ctx, &mut a.guard, true, SuppressMode::Events);

        assert!(abandon(&mut ctx, &mut a.guard));
        assert!(ctx.focus_permitted());
        assert_eq!(a.guard, FocusGuard::Idle);

        let mut b = Win { guard: FocusGuard::SuppressFocusOnce, emitted: Vec::new() };
        assert!(!abandon(&mut ctx, &mut b.guard));
        assert_eq!(b.guard, FocusGuard::Idle);
        assert!(ctx.focus_permitted());
    }

    #[test]
    fn test_all_orderings_restore_gate_and_guards() {
        // Interleave any number of foreign events before the recapturing focus.
        for mode in [SuppressMode::Events, SuppressMode::FocusEvent] {
            for a_focused in [true, false] {
                for foreign in 0..4 {
                    let mut ctx = DeskContext::new();
                    let mut a = Win::new();
                    let mut b = Win::new();
                    begin_transfer(&mut ctx, &mut a.guard, a_focused, mode);
                    if a_focused {
                        a.blur(&ctx);
                    }
                    for i in 0..foreign {
                        if i % 2 == 0 {
                            b.focus(&mut ctx);
                        } else {
                            b.blur(&ctx);
                        }
                    }
                    a.focus(&mut ctx);

                    assert!(ctx.focus_permitted(), "{mode:?} {a_focused} {foreign}");
                    assert_eq!(a.guard, FocusGuard::Idle);
                    assert_eq!(b.guard, FocusGuard::Idle);
                    assert!(b.emitted.is_empty());
                }
            }
        }
    }
}
