//! Window-manager context.
//!
//! Holds the state shared by every component of one desk: the focus gate,
//! the workspace transition intent and the active workspace. Each value is an
//! `eyeball::Observable` so status readers can subscribe to changes.

use eyeball::{Observable, Subscriber};
use serde::{Deserialize, Serialize};

/// Pending workspace transition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "workspaceId", rename_all = "camelCase")]
pub enum TransitionIntent {
    /// Steady state.
    #[default]
    None,
    /// Close every window, then the store, then stop.
    Exit,
    /// Close every window, then open the named workspace.
    Workspace(String),
}

/// Phase of the workspace switch state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "workspaceId", rename_all = "camelCase")]
pub enum SwitchPhase {
    /// No workspace loaded yet.
    #[default]
    Starting,
    /// Windows of this workspace are live.
    Stable(String),
    /// Waiting for every window to report closed.
    ClosingForSwitch(TransitionIntent),
    /// All windows closed, the target is being loaded.
    SwitchApplied,
}

/// State shared by the components of one desk.
pub struct DeskContext {
    /// Whether focus and blur handlers may emit notifications.
    focus_permission: Observable<bool>,

    /// Pending workspace transition.
    intent: Observable<TransitionIntent>,

    /// Id of the active workspace.
    current_workspace: Observable<Option<String>>,

    phase: SwitchPhase,

    exit_requested: bool,
}

impl Default for DeskContext {
    fn default() -> Self { Self::new() }
}

impl DeskContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            focus_permission: Observable::new(true),
            intent: Observable::new(TransitionIntent::None),
            current_workspace: Observable::new(None),
            phase: SwitchPhase::Starting,
            exit_requested: false,
        }
    }

    // ========================================================================
    // Focus gate
    // ========================================================================

    #[must_use]
    pub fn focus_permitted(&self) -> bool { *Observable::get(&self.focus_permission) }

    pub fn close_focus_gate(&mut self) { Observable::set(&mut self.focus_permission, false); }

    pub fn open_focus_gate(&mut self) { Observable::set(&mut self.focus_permission, true); }

    #[must_use]
    pub fn subscribe_focus_permission(&self) -> Subscriber<bool> {
        Observable::subscribe(&self.focus_permission)
    }

    // ========================================================================
    // Transition intent
    // ========================================================================

    #[must_use]
    pub fn intent(&self) -> TransitionIntent { Observable::get(&self.intent).clone() }

    pub fn set_intent(&mut self, intent: TransitionIntent) { Observable::set(&mut self.intent, intent); }

    // ========================================================================
    // Active workspace
    // ========================================================================

    #[must_use]
    pub fn current_workspace(&self) -> Option<String> {
        Observable::get(&self.current_workspace).clone()
    }

    pub fn set_current_workspace(&mut self, id: &str) {
        Observable::set(&mut self.current_workspace, Some(id.to_string()));
    }

    // ========================================================================
    // Switch phase
    // ========================================================================

    #[must_use]
    pub const fn phase(&self) -> &SwitchPhase { &self.phase }

    pub fn set_phase(&mut self, phase: SwitchPhase) { self.phase = phase; }

    #[must_use]
    pub const fn exit_requested(&self) -> bool { self.exit_requested }

    pub const fn request_exit(&mut self) { self.exit_requested = true; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_idle() {
        let ctx = DeskContext::new();
        assert!(ctx.focus_permitted());
        assert_eq!(ctx.intent(), TransitionIntent::None);
        assert_eq!(ctx.current_workspace(), None);
        assert_eq!(ctx.phase(), &SwitchPhase::Starting);
        assert!(!ctx.exit_requested());
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut a = DeskContext::new();
        let b = DeskContext::new();
        a.close_focus_gate();
        a.set_intent(TransitionIntent::Exit);
        assert!(!a.focus_permitted());
        assert!(b.focus_permitted());
        assert_eq!(b.intent(), TransitionIntent::None);
    }

    #[test]
    fn test_focus_subscriber_sees_latest_value() {
        let mut ctx = DeskContext::new();
        let subscriber = ctx.subscribe_focus_permission();
        ctx.close_focus_gate();
        assert!(!subscriber.get());
        ctx.open_focus_gate();
        assert!(subscriber.get());
    }

    #[test]
    fn test_intent_serializes_tagged() {
        let json = serde_json::to_string(&TransitionIntent::Workspace("w2".into())).unwrap();
        assert_eq!(json, r#"{"kind":"workspace","workspaceId":"w2"}"#);
        let json = serde_json::to_string(&TransitionIntent::None).unwrap();
        assert_eq!(json, r#"{"kind":"none"}"#);
    }
}
