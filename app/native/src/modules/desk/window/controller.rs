//! Avatar window controller.
//!
//! One [`AvatarWindow`] per live window. It owns the native handle and the
//! per-window runtime state (lifecycle phase, listener set, focus guard,
//! resize debouncer and render status) and exposes the transitions the desk
//! drives from native events and renderer callbacks.
//!
//! ```text
//! Created ─load─▶ Loading ─finish-load─▶ Rendering ─finish-render─▶ Ready
//!                    │                     │                          │
//!           deadline ▼            deadline ▼                  closed ▼
//!                  Failed               Failed                Closing ─▶ Closed
//! ```
//!
//! One deadline covers the load handshake and another the render, so a
//! renderer that never answers either leaves the window `Failed`, not stuck.

use serde::Serialize;
use tokio::sync::watch;

use super::debounce::ResizeDebouncer;
use super::{NativeEvent, NativeWindow, RendererMessage};
use crate::modules::desk::focus::FocusGuard;
use crate::modules::desk::state::{Avatar, AvatarUrl, Card, Rect};
use crate::modules::desk::timer::TimerHandle;

/// Lifecycle phase of a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowPhase {
    Created,
    /// Waiting for the renderer's finish-load handshake.
    Loading,
    /// Render command sent, waiting for finish-render.
    Rendering,
    Ready,
    /// The load or render deadline elapsed.
    Failed,
    Closing,
    Closed,
}

/// Which native events the controller still reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerSet {
    All,
    /// Only `closed`, used while a workspace switch tears windows down.
    ClosedOnly,
    None,
}

impl ListenerSet {
    #[must_use]
    pub const fn accepts(self, event: &NativeEvent) -> bool {
        match self {
            Self::All => true,
            Self::ClosedOnly => matches!(event, NativeEvent::Closed),
            Self::None => false,
        }
    }
}

/// Render progress as observed by waiters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderStatus {
    Pending,
    Ready,
    Failed,
}

/// Runtime state of one live avatar window.
pub struct AvatarWindow {
    url: AvatarUrl,
    native: Box<dyn NativeWindow>,
    phase: WindowPhase,
    listeners: ListenerSet,
    focus_guard: FocusGuard,
    debouncer: ResizeDebouncer,
    render_status: watch::Sender<RenderStatus>,
    render_deadline: Option<TimerHandle>,
    render_attempt: u64,
    /// Set once the first finish-load has been consumed; later ones are reloads.
    loaded: bool,
}

impl AvatarWindow {
    #[must_use]
    pub fn new(url: AvatarUrl, native: Box<dyn NativeWindow>) -> Self {
        let (render_status, _) = watch::channel(RenderStatus::Pending);
        Self {
            url,
            native,
            phase: WindowPhase::Created,
            listeners: ListenerSet::All,
            focus_guard: FocusGuard::Idle,
            debouncer: ResizeDebouncer::new(),
            render_status,
            render_deadline: None,
            render_attempt: 0,
            loaded: false,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub const fn url(&self) -> &AvatarUrl { &self.url }

    #[must_use]
    pub const fn phase(&self) -> WindowPhase { self.phase }

    #[must_use]
    pub const fn listeners(&self) -> ListenerSet { self.listeners }

    #[must_use]
    pub const fn focus_guard(&self) -> FocusGuard { self.focus_guard }

    pub const fn focus_guard_mut(&mut self) -> &mut FocusGuard { &mut self.focus_guard }

    pub fn debouncer_mut(&mut self) -> &mut ResizeDebouncer { &mut self.debouncer }

    #[must_use]
    pub fn native(&self) -> &dyn NativeWindow { self.native.as_ref() }

    pub fn native_mut(&mut self) -> &mut dyn NativeWindow { self.native.as_mut() }

    #[must_use]
    pub fn render_status(&self) -> RenderStatus { *self.render_status.borrow() }

    /// Receiver that observes render progress.
    #[must_use]
    pub fn watch_render(&self) -> watch::Receiver<RenderStatus> { self.render_status.subscribe() }

    #[must_use]
    pub fn accepts(&self, event: &NativeEvent) -> bool { self.listeners.accepts(event) }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// `Created → Loading`: starts loading the renderer page. Returns the
    /// attempt to arm a load deadline for.
    pub fn open(&mut self, index_url: &str) -> u64 {
        self.phase = WindowPhase::Loading;
        self.render_attempt += 1;
        let page = format!("{index_url}?avatarUrl={}", self.url);
        self.native.load_url(&page);
        tracing::debug!(url = %self.url, "desk: window loading");
        self.render_attempt
    }

    /// Handles a finish-load handshake.
    ///
    /// The first one moves the window into `Rendering`: it is sized and
    /// positioned from the avatar, shown without activation and sent the card.
    /// Later ones are renderer reloads and only resend the card. Returns the
    /// render attempt to arm a deadline for, or `None` if the handshake was
    /// ignored.
    pub fn finish_load(&mut self, card: Option<Card>, avatar: Avatar, min_size: (i32, i32)) -> Option<u64> {
        match self.phase {
            // A late first handshake still renders a window whose load timed out.
            WindowPhase::Loading | WindowPhase::Failed if !self.loaded => {
                let bounds = avatar.geometry.rect().at_least(min_size.0, min_size.1);
                self.native.set_bounds(bounds);
                self.native.show_inactive();
                self.loaded = true;
            }
            WindowPhase::Rendering | WindowPhase::Ready | WindowPhase::Failed if self.loaded => {
                tracing::debug!(url = %self.url, "desk: renderer reloaded, re-rendering");
            }
            phase => {
                tracing::trace!(url = %self.url, ?phase, "desk: ignoring finish-load");
                return None;
            }
        }

        self.native.send(RendererMessage::RenderCard { card, avatar });
        self.phase = WindowPhase::Rendering;
        self.render_attempt += 1;
        self.render_status.send_replace(RenderStatus::Pending);
        Some(self.render_attempt)
    }

    pub fn arm_render_deadline(&mut self, timer: TimerHandle) {
        if let Some(previous) = self.render_deadline.replace(timer) {
            previous.cancel();
        }
    }

    /// `Rendering → Ready`. A late completion also rescues a `Failed` window.
    pub fn finish_render(&mut self) -> bool {
        if !matches!(self.phase, WindowPhase::Rendering | WindowPhase::Failed) {
            tracing::trace!(url = %self.url, phase = ?self.phase, "desk: ignoring finish-render");
            return false;
        }
        if let Some(deadline) = self.render_deadline.take() {
            deadline.cancel();
        }
        self.phase = WindowPhase::Ready;
        self.render_status.send_replace(RenderStatus::Ready);
        tracing::debug!(url = %self.url, "desk: window ready");
        true
    }

    /// Moves a window still loading or rendering attempt `attempt` to `Failed`.
    pub fn render_deadline_elapsed(&mut self, attempt: u64) -> bool {
        let waiting = matches!(self.phase, WindowPhase::Loading | WindowPhase::Rendering);
        if !waiting || attempt != self.render_attempt {
            return false;
        }
        self.render_deadline = None;
        self.phase = WindowPhase::Failed;
        self.render_status.send_replace(RenderStatus::Failed);
        true
    }

    /// Stops reacting to everything except `closed`.
    pub const fn strip_listeners(&mut self) { self.listeners = ListenerSet::ClosedOnly; }

    /// Asks the renderer to flush and close.
    pub fn request_close(&mut self) { self.native.send(RendererMessage::CardClose); }

    /// `→ Closing → Closed`: deregisters listeners and drops pending work.
    pub fn mark_closed(&mut self) {
        self.phase = WindowPhase::Closing;
        self.listeners = ListenerSet::None;
        if let Some(rect) = self.debouncer.discard() {
            tracing::debug!(url = %self.url, ?rect, "desk: discarding pending resize on close");
        }
        if let Some(deadline) = self.render_deadline.take() {
            deadline.cancel();
        }
        if self.render_status() == RenderStatus::Pending {
            self.render_status.send_replace(RenderStatus::Failed);
        }
        self.phase = WindowPhase::Closed;
    }

    // ========================================================================
    // Renderer push
    // ========================================================================

    pub fn send(&mut self, message: RendererMessage) { self.native.send(message); }

    /// Sends the raw native rectangle straight to this window's renderer.
    pub fn forward_geometry(&mut self, rect: Rect) {
        self.native.send(RendererMessage::PersistentStoreForward {
            property_name: Some("geometry".to_string()),
            state: serde_json::to_value(rect).unwrap_or(serde_json::Value::Null),
        });
    }
}
