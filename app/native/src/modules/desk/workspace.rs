//! Workspace switching.
//!
//! A switch (or exit) never tears windows down directly. It records the
//! transition intent, strips every window down to its `closed` listener and
//! asks each renderer to close. The registry emptying out triggers
//! [`DeskManager::on_all_windows_closed`], which applies the intent.
//!
//! ```text
//! Stable(a) ──switch(b)──▶ ClosingForSwitch(b) ──all closed──▶ SwitchApplied ──▶ Stable(b)
//!     │
//!     └──exit──▶ ClosingForSwitch(exit) ──all closed──▶ store closed, actor stops
//! ```

use super::actor::SwitchOutcome;
use super::error::DeskError;
use super::focus;
use super::manager::DeskManager;
use super::state::{AvatarUrl, CurrentWorkspace, SwitchPhase, TransitionIntent, Workspace};
use super::timer::TimerEvent;
use super::window::AvatarWindow;
use crate::constants::CURRENT_WORKSPACE_KEY;

/// Picks the workspace to open at startup.
///
/// The stored id wins if it still exists; otherwise the earliest created
/// workspace is used.
fn choose_startup_workspace<'a>(
    workspaces: &'a [Workspace],
    stored: Option<&str>,
) -> Option<&'a Workspace> {
    if let Some(id) = stored {
        let found = workspaces.iter().find(|workspace| workspace.id == id);
        if found.is_some() {
            return found;
        }
        tracing::warn!(workspace = id, "desk: stored current workspace no longer exists");
    }
    workspaces.iter().min_by(|a, b| {
        a.date.created_date.cmp(&b.date.created_date).then_with(|| a.id.cmp(&b.id))
    })
}

impl DeskManager {
    /// Opens the workspace recorded as current, falling back to the earliest
    /// created one. Returns the id of the opened workspace.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::NoWorkspace`] when the store holds no workspace.
    pub fn load_current_workspace(&mut self) -> Result<String, DeskError> {
        let workspaces = self.store.workspaces();
        let stored = self
            .store
            .get_local(CURRENT_WORKSPACE_KEY)
            .and_then(|doc| serde_json::from_value::<CurrentWorkspace>(doc).ok())
            .map(|current| current.id);

        let Some(workspace) = choose_startup_workspace(&workspaces, stored.as_deref()) else {
            return Err(DeskError::NoWorkspace);
        };
        let id = workspace.id.clone();
        if stored.as_deref() != Some(id.as_str()) {
            self.persist_current_workspace(&id);
        }

        let opened = self.open_workspace(&id);
        tracing::info!(workspace = %id, windows = opened, "desk: workspace loaded");
        Ok(id)
    }

    /// Makes `id` the active workspace and opens its avatars back to front.
    fn open_workspace(&mut self, id: &str) -> usize {
        self.ctx.set_current_workspace(id);
        self.ctx.set_phase(SwitchPhase::Stable(id.to_string()));

        let Some(workspace) = self.store.find_workspace(id) else {
            return 0;
        };
        let mut avatars = self.store.find_avatars(&workspace.avatars);
        avatars.sort_by_key(|avatar| avatar.geometry.z);

        let mut opened = 0;
        for avatar in avatars {
            if self.store.find_card(avatar.url.card_id()).is_none() {
                tracing::warn!(url = %avatar.url, "desk: card missing, skipping avatar");
                continue;
            }
            if self.open_avatar(&avatar.url) {
                opened += 1;
            }
        }
        opened
    }

    /// Creates a window for `url` and starts loading it.
    fn open_avatar(&mut self, url: &AvatarUrl) -> bool {
        if self.registry.contains(url) {
            tracing::warn!(%url, "desk: window already open");
            return false;
        }
        let native = self.factory.create(url);
        let mut window = AvatarWindow::new(url.clone(), native);
        let attempt = window.open(&self.settings.index_url);
        let deadline = self.scheduler.schedule(
            self.settings.render_timeout,
            TimerEvent::RenderDeadline { url: url.clone(), attempt },
        );
        window.arm_render_deadline(deadline);
        self.registry.insert(window).is_ok()
    }

    fn persist_current_workspace(&self, id: &str) {
        let doc = match serde_json::to_value(CurrentWorkspace::new(id)) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::error!(workspace = id, "desk: cannot encode current workspace: {err}");
                return;
            }
        };
        if let Err(err) = self.store.put_local(CURRENT_WORKSPACE_KEY, doc) {
            tracing::error!(workspace = id, "desk: failed to persist current workspace: {err}");
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Switches to workspace `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::SwitchInProgress`] while another transition is
    /// closing windows, and [`DeskError::WorkspaceNotFound`] for an unknown id.
    /// No window is touched in either case.
    pub fn switch_workspace(&mut self, id: &str) -> Result<SwitchOutcome, DeskError> {
        if self.ctx.intent() != TransitionIntent::None {
            return Err(DeskError::SwitchInProgress);
        }
        if self.ctx.current_workspace().as_deref() == Some(id) {
            return Ok(SwitchOutcome::AlreadyActive);
        }
        if self.store.find_workspace(id).is_none() {
            return Err(DeskError::WorkspaceNotFound(id.to_string()));
        }

        tracing::info!(from = ?self.ctx.current_workspace(), to = id, "desk: switching workspace");
        if self.begin_transition(TransitionIntent::Workspace(id.to_string())) {
            Ok(SwitchOutcome::Switched)
        } else {
            Ok(SwitchOutcome::Closing)
        }
    }

    /// Closes every window, then the store, then stops.
    ///
    /// An exit requested during a workspace switch replaces the switch target.
    pub fn request_exit(&mut self) {
        match self.ctx.intent() {
            TransitionIntent::Exit => {}
            TransitionIntent::Workspace(target) => {
                tracing::info!(abandoned = %target, "desk: exit replaces pending switch");
                self.ctx.set_intent(TransitionIntent::Exit);
                self.ctx.set_phase(SwitchPhase::ClosingForSwitch(TransitionIntent::Exit));
            }
            TransitionIntent::None => {
                tracing::info!(windows = self.registry.len(), "desk: exit requested");
                self.begin_transition(TransitionIntent::Exit);
            }
        }
    }

    /// Records `intent` and closes every window. Returns whether the
    /// transition was applied immediately because no window was open.
    fn begin_transition(&mut self, intent: TransitionIntent) -> bool {
        self.ctx.set_intent(intent.clone());
        self.ctx.set_phase(SwitchPhase::ClosingForSwitch(intent));

        if self.registry.is_empty() {
            self.on_all_windows_closed();
            return true;
        }
        for window in self.registry.iter_mut() {
            if focus::abandon(&mut self.ctx, window.focus_guard_mut()) {
                tracing::debug!(url = %window.url(), "desk: focus transfer cut short by transition");
            }
            window.strip_listeners();
            window.request_close();
        }
        false
    }

    /// Applies the pending transition once no window is left.
    pub fn on_all_windows_closed(&mut self) {
        match self.ctx.intent() {
            TransitionIntent::None => {
                tracing::debug!("desk: all windows closed, nothing pending");
            }
            TransitionIntent::Exit => {
                self.ctx.set_phase(SwitchPhase::SwitchApplied);
                if let Err(err) = self.store.close() {
                    tracing::error!("desk: failed to close store: {err}");
                }
                self.ctx.request_exit();
                tracing::info!("desk: all windows closed, exiting");
            }
            TransitionIntent::Workspace(id) => self.apply_switch(&id),
        }
    }

    fn apply_switch(&mut self, id: &str) {
        self.ctx.set_phase(SwitchPhase::SwitchApplied);
        self.persist_current_workspace(id);
        let opened = self.open_workspace(id);
        self.ctx.set_intent(TransitionIntent::None);
        tracing::info!(workspace = id, windows = opened, "desk: workspace switched");
    }
}
