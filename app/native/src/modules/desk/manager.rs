//! The desk manager.
//!
//! Owns the window-manager context, the window registry and the store handle,
//! and turns every mailbox message into state changes. All handlers are
//! synchronous: a focus transfer closes and reopens the gate without yielding,
//! and native calls made here only queue events for later messages.
//!
//! Z-order operations live in [`super::zorder`] and workspace transitions in
//! [`super::workspace`]; both extend this type.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::actions::PersistentAction;
use super::actor::{CommandReply, DeskCommand, DeskQuery, DeskStatus, QueryResult, WindowStatus};
use super::dispatcher::ActionDispatcher;
use super::error::DeskError;
use super::focus::{self, SuppressMode};
use super::state::{Avatar, AvatarUrl, DeskContext, Rect};
use super::store::{AvatarChange, DocumentStore, Provenance};
use super::timer::{Scheduler, TimerEvent};
use super::window::{
    AvatarWindow, ListenerSet, NativeEvent, RenderStatus, RendererMessage, WindowFactory,
    WindowRegistry, WindowSignal,
};
use crate::config::RxdeskConfig;
use crate::constants::{
    DEFAULT_RENDER_TIMEOUT_MS, DEFAULT_RESIZE_DEBOUNCE_MS, INDEX_URL, MINIMUM_WINDOW_HEIGHT,
    MINIMUM_WINDOW_WIDTH,
};

/// Tunables of one desk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeskSettings {
    /// Quiet period before a resize burst is written.
    pub resize_debounce: Duration,
    /// How long a window may stay in the rendering phase.
    pub render_timeout: Duration,
    pub min_width: i32,
    pub min_height: i32,
    /// Page every window loads before its card is rendered.
    pub index_url: String,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            resize_debounce: Duration::from_millis(DEFAULT_RESIZE_DEBOUNCE_MS),
            render_timeout: Duration::from_millis(DEFAULT_RENDER_TIMEOUT_MS),
            min_width: MINIMUM_WINDOW_WIDTH,
            min_height: MINIMUM_WINDOW_HEIGHT,
            index_url: INDEX_URL.to_string(),
        }
    }
}

impl DeskSettings {
    #[must_use]
    pub fn from_config(config: &RxdeskConfig) -> Self {
        Self {
            resize_debounce: Duration::from_millis(config.timing.resize_debounce_ms),
            render_timeout: Duration::from_millis(config.timing.render_timeout_ms),
            min_width: config.window.min_width,
            min_height: config.window.min_height,
            index_url: INDEX_URL.to_string(),
        }
    }

    const fn min_size(&self) -> (i32, i32) { (self.min_width, self.min_height) }
}

/// Coordinates every avatar window of one desk.
pub struct DeskManager {
    pub(super) ctx: DeskContext,
    pub(super) registry: WindowRegistry,
    pub(super) store: Arc<dyn DocumentStore>,
    pub(super) dispatcher: ActionDispatcher,
    pub(super) factory: Box<dyn WindowFactory>,
    pub(super) scheduler: Box<dyn Scheduler>,
    pub(super) settings: DeskSettings,
}

impl DeskManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        factory: Box<dyn WindowFactory>,
        scheduler: Box<dyn Scheduler>,
        settings: DeskSettings,
    ) -> Self {
        Self {
            ctx: DeskContext::new(),
            registry: WindowRegistry::new(),
            dispatcher: ActionDispatcher::new(store.clone()),
            store,
            factory,
            scheduler,
            settings,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub const fn ctx(&self) -> &DeskContext { &self.ctx }

    #[must_use]
    pub const fn registry(&self) -> &WindowRegistry { &self.registry }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> { &self.store }

    #[must_use]
    pub const fn settings(&self) -> &DeskSettings { &self.settings }

    // ========================================================================
    // Window signals
    // ========================================================================

    /// Handles one signal reported by a window.
    pub fn handle_signal(&mut self, url: &AvatarUrl, signal: WindowSignal) {
        match signal {
            WindowSignal::Native(event) => self.on_native_event(url, event),
            WindowSignal::FinishLoad => self.on_finish_load(url),
            WindowSignal::FinishRenderCard => self.on_finish_render(url),
        }
    }

    fn on_native_event(&mut self, url: &AvatarUrl, event: NativeEvent) {
        let Some(window) = self.registry.get_mut(url) else {
            tracing::trace!(%url, event = event.name(), "desk: event for unknown window");
            return;
        };
        if !window.accepts(&event) {
            tracing::trace!(%url, event = event.name(), "desk: listener not registered, ignoring");
            return;
        }

        match event {
            NativeEvent::WillMove(rect) => {
                let action = PersistentAction::position(url.clone(), rect.x, rect.y, false);
                self.dispatcher.apply_action(&action, Provenance::Window(url.clone()));
            }
            NativeEvent::WillResize(rect) => {
                let generation = window.debouncer_mut().push(rect);
                let timer = self.scheduler.schedule(
                    self.settings.resize_debounce,
                    TimerEvent::ResizeSettled { url: url.clone(), generation },
                );
                window.debouncer_mut().arm(timer);
                window.forward_geometry(rect);
            }
            NativeEvent::Focus => {
                if focus::on_focus(&mut self.ctx, window.focus_guard_mut()) {
                    window.send(RendererMessage::CardFocused);
                } else {
                    tracing::debug!(%url, "desk: focus suppressed");
                }
            }
            NativeEvent::Blur => {
                if focus::on_blur(&self.ctx, window.focus_guard_mut()) {
                    window.send(RendererMessage::CardBlurred);
                } else {
                    tracing::debug!(%url, "desk: blur suppressed");
                }
            }
            NativeEvent::Closed => self.on_window_closed(url),
        }
    }

    fn on_window_closed(&mut self, url: &AvatarUrl) {
        if self.remove_window(url).is_some() {
            tracing::info!(%url, remaining = self.registry.len(), "desk: window closed");
            if self.registry.is_empty() {
                self.on_all_windows_closed();
            }
        }
    }

    /// Deregisters a window and releases any focus transfer it was part of.
    fn remove_window(&mut self, url: &AvatarUrl) -> Option<AvatarWindow> {
        let mut window = self.registry.remove(url)?;
        if focus::abandon(&mut self.ctx, window.focus_guard_mut()) {
            tracing::debug!(%url, "desk: window gone mid-transfer, focus gate reopened");
        }
        window.mark_closed();
        Some(window)
    }

    fn on_finish_load(&mut self, url: &AvatarUrl) {
        let Some(window) = self.registry.get_mut(url) else {
            tracing::trace!(%url, "desk: finish-load for unknown window");
            return;
        };
        if window.listeners() != ListenerSet::All {
            tracing::trace!(%url, "desk: finish-load after teardown, ignoring");
            return;
        }
        let Some(avatar) = self.store.find_one(url) else {
            tracing::warn!(%url, "desk: finish-load for avatar missing from store");
            return;
        };
        let card = self.store.find_card(url.card_id());
        if card.is_none() {
            tracing::warn!(%url, card_id = url.card_id(), "desk: rendering without card");
        }

        if let Some(attempt) = window.finish_load(card, avatar, self.settings.min_size()) {
            let deadline = self.scheduler.schedule(
                self.settings.render_timeout,
                TimerEvent::RenderDeadline { url: url.clone(), attempt },
            );
            window.arm_render_deadline(deadline);
        }
    }

    fn on_finish_render(&mut self, url: &AvatarUrl) {
        match self.registry.get_mut(url) {
            Some(window) => {
                window.finish_render();
            }
            None => tracing::trace!(%url, "desk: finish-render for unknown window"),
        }
    }

    // ========================================================================
    // Timers and store changes
    // ========================================================================

    /// Handles a fired timer.
    pub fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::ResizeSettled { url, generation } => {
                let Some(window) = self.registry.get_mut(&url) else {
                    return;
                };
                let Some(rect) = window.debouncer_mut().settle(generation) else {
                    tracing::trace!(%url, generation, "desk: stale resize timer");
                    return;
                };
                let action = PersistentAction::size(url.clone(), rect, true);
                self.dispatcher.apply_action(&action, Provenance::Window(url));
            }
            TimerEvent::RenderDeadline { url, attempt } => {
                let Some(window) = self.registry.get_mut(&url) else {
                    return;
                };
                if window.render_deadline_elapsed(attempt) {
                    let err = DeskError::RenderTimeout(url.clone());
                    tracing::warn!(
                        %url,
                        attempt,
                        timeout = ?self.settings.render_timeout,
                        "desk: {err}"
                    );
                }
            }
        }
    }

    /// Forwards a committed store change to the avatar's own window.
    pub fn on_avatar_changed(&mut self, change: &AvatarChange) {
        let url = &change.next.url;
        let Some(window) = self.registry.get_mut(url) else {
            return;
        };
        if window.listeners() != ListenerSet::All {
            return;
        }
        if let Some(forward) = ActionDispatcher::forward_for(change, url) {
            window.send(forward.into_message());
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Executes one command.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError`] when the command names an unknown avatar or
    /// workspace, a switch is already running, or the store rejects a write.
    pub fn execute(&mut self, command: DeskCommand) -> Result<CommandReply, DeskError> {
        tracing::debug!(command = command.name(), "desk: executing command");
        match command {
            DeskCommand::DispatchAction(action) => {
                self.dispatch(&action)?;
                Ok(CommandReply::Done)
            }
            DeskCommand::BringToFront { url, rearrange } => {
                Ok(CommandReply::Depth(self.bring_to_front(&url, rearrange)))
            }
            DeskCommand::SendToBack { url } => Ok(CommandReply::Depth(self.send_to_back(&url))),
            DeskCommand::SetWindowSize { url, width, height } => self
                .set_window_size(&url, width, height)
                .map(CommandReply::Bounds)
                .ok_or(DeskError::NotFound(url)),
            DeskCommand::SetWindowPosition { url, x, y } => self
                .set_window_position(&url, x, y)
                .map(CommandReply::Bounds)
                .ok_or(DeskError::NotFound(url)),
            DeskCommand::Blur { url } => {
                self.blur(&url).then_some(CommandReply::Done).ok_or(DeskError::NotFound(url))
            }
            DeskCommand::Focus { url } => {
                self.focus(&url).then_some(CommandReply::Done).ok_or(DeskError::NotFound(url))
            }
            DeskCommand::BlurAndFocus { url, mode } => self
                .blur_and_focus(&url, mode)
                .then_some(CommandReply::Done)
                .ok_or(DeskError::NotFound(url)),
            DeskCommand::DeleteAvatar { url } => {
                self.delete_avatar(&url)?;
                Ok(CommandReply::Done)
            }
            DeskCommand::SwitchWorkspace { id } => {
                self.switch_workspace(&id).map(CommandReply::Switch)
            }
            DeskCommand::Exit => {
                self.request_exit();
                Ok(CommandReply::Done)
            }
        }
    }

    /// Applies an action on behalf of the avatar's own renderer.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::NotFound`] or [`DeskError::StoreWriteFailure`];
    /// either way the action is dropped.
    pub fn dispatch(&self, action: &PersistentAction) -> Result<Avatar, DeskError> {
        self.dispatcher
            .try_apply(action, Provenance::Window(action.url.clone()))
            .map_err(|err| {
                tracing::warn!(
                    url = %action.url,
                    action = action.kind.name(),
                    "desk: dropping action: {err}"
                );
                DeskError::from(err)
            })
    }

    /// Deletes an avatar: removes the document and its workspace membership,
    /// then destroys its window if one is open.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::NotFound`] for an unknown avatar, or
    /// [`DeskError::StoreWriteFailure`] if the store refuses the delete.
    pub fn delete_avatar(&mut self, url: &AvatarUrl) -> Result<(), DeskError> {
        self.store.delete_avatar(url)?;
        let Some(mut window) = self.remove_window(url) else {
            tracing::info!(%url, "desk: avatar deleted");
            return Ok(());
        };
        if !window.native().is_destroyed() {
            window.native_mut().close();
        }
        tracing::info!(%url, remaining = self.registry.len(), "desk: avatar deleted, window destroyed");
        if self.registry.is_empty() {
            self.on_all_windows_closed();
        }
        Ok(())
    }

    /// Resizes a window, keeping it at least the minimum size. Returns its bounds.
    pub fn set_window_size(&mut self, url: &AvatarUrl, width: i32, height: i32) -> Option<Rect> {
        let (min_width, min_height) = self.settings.min_size();
        let native = self.live_window(url)?.native_mut();
        let current = native.bounds();
        let bounds = Rect::new(current.x, current.y, width, height).at_least(min_width, min_height);
        native.set_bounds(bounds);
        Some(native.bounds())
    }

    /// Moves a window. Returns its bounds.
    pub fn set_window_position(&mut self, url: &AvatarUrl, x: i32, y: i32) -> Option<Rect> {
        let native = self.live_window(url)?.native_mut();
        let current = native.bounds();
        native.set_bounds(Rect::new(x, y, current.width, current.height));
        Some(native.bounds())
    }

    pub fn blur(&mut self, url: &AvatarUrl) -> bool {
        let Some(window) = self.live_window(url) else {
            return false;
        };
        window.native_mut().blur();
        true
    }

    pub fn focus(&mut self, url: &AvatarUrl) -> bool {
        let Some(window) = self.live_window(url) else {
            return false;
        };
        window.native_mut().focus();
        true
    }

    /// Blurs and refocuses a window to pull window-manager attention, silencing
    /// the focus cascade this causes on every other window.
    pub fn blur_and_focus(&mut self, url: &AvatarUrl, mode: SuppressMode) -> bool {
        let Some(window) = self.registry.get_mut(url) else {
            tracing::warn!(%url, "desk: blur-and-focus for unknown window");
            return false;
        };
        if window.native().is_destroyed() {
            return false;
        }
        let is_focused = window.native().is_focused();
        focus::begin_transfer(&mut self.ctx, window.focus_guard_mut(), is_focused, mode);
        tracing::debug!(
            %url,
            ?mode,
            is_focused,
            guard = ?window.focus_guard(),
            "desk: focus transfer armed"
        );
        window.native_mut().blur();
        window.native_mut().focus();
        true
    }

    fn live_window(&mut self, url: &AvatarUrl) -> Option<&mut AvatarWindow> {
        let window = self.registry.get_mut(url).filter(|window| !window.native().is_destroyed());
        if window.is_none() {
            tracing::warn!(%url, "desk: no live window");
        }
        window
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Answers one query.
    #[must_use]
    pub fn query(&self, query: DeskQuery) -> QueryResult {
        match query {
            DeskQuery::Status => QueryResult::Status(self.status()),
            DeskQuery::Avatar { url } => QueryResult::Avatar(self.store.find_one(&url)),
            DeskQuery::RenderWatch { url } => QueryResult::RenderWatch(self.watch_render(&url)),
        }
    }

    #[must_use]
    pub fn watch_render(&self, url: &AvatarUrl) -> Option<watch::Receiver<RenderStatus>> {
        self.registry.get(url).map(AvatarWindow::watch_render)
    }

    #[must_use]
    pub fn status(&self) -> DeskStatus {
        let mut windows: Vec<_> = self
            .registry
            .iter()
            .map(|window| WindowStatus {
                url: window.url().clone(),
                phase: window.phase(),
                render: window.render_status(),
                listeners: window.listeners(),
                focus_guard: window.focus_guard(),
                focused: window.native().is_focused(),
                bounds: window.native().bounds(),
            })
            .collect();
        windows.sort_by(|a, b| a.url.cmp(&b.url));

        DeskStatus {
            current_workspace: self.ctx.current_workspace(),
            phase: self.ctx.phase().clone(),
            intent: self.ctx.intent(),
            focus_permitted: self.ctx.focus_permitted(),
            windows,
        }
    }
}
