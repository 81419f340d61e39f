//! Headless window backend.
//!
//! Models what the desk relies on from a real window system: a native
//! stacking order, a single focused window, the OS handing focus to the next
//! window after a blur, and the `blur`/`focus`/`closed` events those produce.
//! A simulated renderer can answer the load and render handshakes and honour
//! close requests on its own.
//!
//! Events are collected while the display lock is held and delivered to the
//! sink after it is released.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{EventSink, NativeEvent, NativeWindow, RendererMessage, WindowFactory, WindowSignal};
use crate::modules::desk::state::{AvatarUrl, Rect};

/// How the simulated renderer and OS behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendererBehavior {
    /// Report finish-load as soon as a page is loaded.
    pub auto_finish_load: bool,
    /// Report finish-render as soon as a card is sent.
    pub auto_finish_render: bool,
    /// Close the window when asked to.
    pub close_on_request: bool,
    /// Focus the topmost remaining window after a blur.
    pub refocus_on_blur: bool,
}

impl RendererBehavior {
    /// Renderer answers nothing by itself; the OS still refocuses.
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            auto_finish_load: false,
            auto_finish_render: false,
            close_on_request: false,
            refocus_on_blur: true,
        }
    }

    /// Renderer answers every handshake and close request.
    #[must_use]
    pub const fn automatic() -> Self {
        Self {
            auto_finish_load: true,
            auto_finish_render: true,
            close_on_request: true,
            refocus_on_blur: true,
        }
    }
}

impl Default for RendererBehavior {
    fn default() -> Self { Self::automatic() }
}

struct Record {
    id: u64,
    url: AvatarUrl,
    bounds: Rect,
    visible: bool,
    destroyed: bool,
    page: Option<String>,
    inbox: Vec<RendererMessage>,
}

type Pending = Vec<(AvatarUrl, WindowSignal)>;

struct DisplayState {
    next_id: u64,
    records: Vec<Record>,
    /// Live window ids, bottom to top.
    stack: Vec<u64>,
    focused: Option<u64>,
    behavior: RendererBehavior,
    sink: Option<Arc<dyn EventSink>>,
}

impl DisplayState {
    fn record(&self, id: u64) -> Option<&Record> { self.records.iter().find(|r| r.id == id) }

    fn record_mut(&mut self, id: u64) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    fn latest(&self, url: &AvatarUrl) -> Option<&Record> {
        self.records.iter().rev().find(|r| &r.url == url)
    }

    fn latest_mut(&mut self, url: &AvatarUrl) -> Option<&mut Record> {
        self.records.iter_mut().rev().find(|r| &r.url == url)
    }

    fn is_live(&self, id: u64) -> bool { self.record(id).is_some_and(|r| !r.destroyed) }

    fn url_of(&self, id: u64) -> Option<AvatarUrl> { self.record(id).map(|r| r.url.clone()) }

    fn push(&self, pending: &mut Pending, id: u64, signal: WindowSignal) {
        if let Some(url) = self.url_of(id) {
            pending.push((url, signal));
        }
    }

    fn move_to_top(&mut self, id: u64) {
        self.stack.retain(|other| *other != id);
        self.stack.push(id);
    }

    fn focus(&mut self, id: u64, pending: &mut Pending) {
        if !self.is_live(id) {
            return;
        }
        self.move_to_top(id);
        if self.focused == Some(id) {
            return;
        }
        if let Some(previous) = self.focused.take() {
            self.push(pending, previous, WindowSignal::Native(NativeEvent::Blur));
        }
        self.focused = Some(id);
        self.push(pending, id, WindowSignal::Native(NativeEvent::Focus));
    }

    fn blur(&mut self, id: u64, pending: &mut Pending) {
        if self.focused != Some(id) {
            return;
        }
        self.focused = None;
        self.push(pending, id, WindowSignal::Native(NativeEvent::Blur));

        if self.behavior.refocus_on_blur {
            let next = self
                .stack
                .iter()
                .rev()
                .copied()
                .find(|other| *other != id && self.record(*other).is_some_and(|r| r.visible));
            if let Some(next) = next {
                self.focused = Some(next);
                self.push(pending, next, WindowSignal::Native(NativeEvent::Focus));
            }
        }
    }

    fn close(&mut self, id: u64, pending: &mut Pending) {
        if !self.is_live(id) {
            return;
        }
        if self.focused == Some(id) {
            self.focused = None;
            self.push(pending, id, WindowSignal::Native(NativeEvent::Blur));
        }
        if let Some(record) = self.record_mut(id) {
            record.destroyed = true;
            record.visible = false;
        }
        self.stack.retain(|other| *other != id);
        self.push(pending, id, WindowSignal::Native(NativeEvent::Closed));
    }

    fn send(&mut self, id: u64, message: RendererMessage, pending: &mut Pending) {
        if !self.is_live(id) {
            return;
        }
        let reply = match &message {
            RendererMessage::RenderCard { .. } if self.behavior.auto_finish_render => {
                Some(WindowSignal::FinishRenderCard)
            }
            _ => None,
        };
        let close = matches!(message, RendererMessage::CardClose) && self.behavior.close_on_request;

        if let Some(record) = self.record_mut(id) {
            record.inbox.push(message);
        }
        if let Some(reply) = reply {
            self.push(pending, id, reply);
        }
        if close {
            self.close(id, pending);
        }
    }
}

/// Shared headless display. Cloning shares the same display.
#[derive(Clone)]
pub struct HeadlessDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl HeadlessDisplay {
    #[must_use]
    pub fn new(behavior: RendererBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(DisplayState {
                next_id: 1,
                records: Vec::new(),
                stack: Vec::new(),
                focused: None,
                behavior,
                sink: None,
            })),
        }
    }

    /// Routes window signals to `sink`.
    pub fn attach_sink(&self, sink: Arc<dyn EventSink>) { self.state.lock().sink = Some(sink); }

    fn with_state<R>(&self, f: impl FnOnce(&mut DisplayState, &mut Pending) -> R) -> R {
        let mut pending = Pending::new();
        let (result, sink) = {
            let mut state = self.state.lock();
            let result = f(&mut state, &mut pending);
            (result, state.sink.clone())
        };
        if let Some(sink) = sink {
            for (url, signal) in pending {
                sink.emit(&url, signal);
            }
        }
        result
    }

    fn with_latest(&self, url: &AvatarUrl, f: impl FnOnce(&mut DisplayState, u64, &mut Pending)) {
        self.with_state(|state, pending| {
            let id = state.latest(url).filter(|r| !r.destroyed).map(|r| r.id);
            if let Some(id) = id {
                f(state, id, pending);
            }
        });
    }

    // ========================================================================
    // User input
    // ========================================================================

    /// The user drags a window.
    pub fn user_move(&self, url: &AvatarUrl, rect: Rect) {
        self.with_latest(url, |state, id, pending| {
            if let Some(record) = state.record_mut(id) {
                record.bounds = rect;
            }
            state.push(pending, id, WindowSignal::Native(NativeEvent::WillMove(rect)));
        });
    }

    /// The user resizes a window.
    pub fn user_resize(&self, url: &AvatarUrl, rect: Rect) {
        self.with_latest(url, |state, id, pending| {
            if let Some(record) = state.record_mut(id) {
                record.bounds = rect;
            }
            state.push(pending, id, WindowSignal::Native(NativeEvent::WillResize(rect)));
        });
    }

    /// The user clicks a window.
    pub fn user_focus(&self, url: &AvatarUrl) {
        self.with_latest(url, |state, id, pending| state.focus(id, pending));
    }

    /// The user closes a window.
    pub fn user_close(&self, url: &AvatarUrl) {
        self.with_latest(url, |state, id, pending| state.close(id, pending));
    }

    /// The renderer reports that its page finished loading.
    pub fn renderer_finish_load(&self, url: &AvatarUrl) {
        self.with_latest(url, |state, id, pending| state.push(pending, id, WindowSignal::FinishLoad));
    }

    /// The renderer reports that the card finished drawing.
    pub fn renderer_finish_render(&self, url: &AvatarUrl) {
        self.with_latest(url, |state, id, pending| {
            state.push(pending, id, WindowSignal::FinishRenderCard);
        });
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Live windows from bottom to top.
    #[must_use]
    pub fn stack(&self) -> Vec<AvatarUrl> {
        let state = self.state.lock();
        state.stack.iter().filter_map(|id| state.url_of(*id)).collect()
    }

    #[must_use]
    pub fn focused(&self) -> Option<AvatarUrl> {
        let state = self.state.lock();
        state.focused.and_then(|id| state.url_of(id))
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().records.iter().filter(|r| !r.destroyed).count()
    }

    /// Messages received by the most recent window for `url`.
    #[must_use]
    pub fn messages(&self, url: &AvatarUrl) -> Vec<RendererMessage> {
        self.state.lock().latest(url).map(|r| r.inbox.clone()).unwrap_or_default()
    }

    /// Drains the messages of the most recent window for `url`.
    pub fn take_messages(&self, url: &AvatarUrl) -> Vec<RendererMessage> {
        self.state.lock().latest_mut(url).map(|r| std::mem::take(&mut r.inbox)).unwrap_or_default()
    }

    #[must_use]
    pub fn loaded_page(&self, url: &AvatarUrl) -> Option<String> {
        self.state.lock().latest(url).and_then(|r| r.page.clone())
    }

    #[must_use]
    pub fn is_visible(&self, url: &AvatarUrl) -> bool {
        self.state.lock().latest(url).is_some_and(|r| r.visible)
    }

    #[must_use]
    pub fn bounds(&self, url: &AvatarUrl) -> Option<Rect> {
        self.state.lock().latest(url).map(|r| r.bounds)
    }
}

impl WindowFactory for HeadlessDisplay {
    fn create(&mut self, url: &AvatarUrl) -> Box<dyn NativeWindow> {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.records.push(Record {
                id,
                url: url.clone(),
                bounds: Rect::default(),
                visible: false,
                destroyed: false,
                page: None,
                inbox: Vec::new(),
            });
            state.stack.push(id);
            id
        };
        Box::new(HeadlessWindow { id, display: self.clone() })
    }
}

/// A window on a [`HeadlessDisplay`].
struct HeadlessWindow {
    id: u64,
    display: HeadlessDisplay,
}

impl NativeWindow for HeadlessWindow {
    fn load_url(&mut self, url: &str) {
        let id = self.id;
        self.display.with_state(|state, pending| {
            let auto = state.behavior.auto_finish_load;
            if let Some(record) = state.record_mut(id) {
                record.page = Some(url.to_string());
            }
            if auto {
                state.push(pending, id, WindowSignal::FinishLoad);
            }
        });
    }

    fn show_inactive(&mut self) {
        let id = self.id;
        self.display.with_state(|state, _| {
            if let Some(record) = state.record_mut(id) {
                record.visible = true;
            }
            state.move_to_top(id);
        });
    }

    fn set_bounds(&mut self, bounds: Rect) {
        let id = self.id;
        self.display.with_state(|state, _| {
            if let Some(record) = state.record_mut(id) {
                record.bounds = bounds;
            }
        });
    }

    fn bounds(&self) -> Rect {
        self.display.state.lock().record(self.id).map(|r| r.bounds).unwrap_or_default()
    }

    fn focus(&mut self) {
        let id = self.id;
        self.display.with_state(|state, pending| state.focus(id, pending));
    }

    fn blur(&mut self) {
        let id = self.id;
        self.display.with_state(|state, pending| state.blur(id, pending));
    }

    fn raise(&mut self) {
        let id = self.id;
        self.display.with_state(|state, _| {
            if state.is_live(id) {
                state.move_to_top(id);
            }
        });
    }

    fn is_focused(&self) -> bool { self.display.state.lock().focused == Some(self.id) }

    fn is_destroyed(&self) -> bool { !self.display.state.lock().is_live(self.id) }

    fn close(&mut self) {
        let id = self.id;
        self.display.with_state(|state, pending| state.close(id, pending));
    }

    fn send(&mut self, message: RendererMessage) {
        let id = self.id;
        self.display.with_state(|state, pending| state.send(id, message, pending));
    }
}


#[cfg(test)]
mod tests {
    use super::testing::QueueSink;
    use super::*;

    fn url(instance: &str) -> AvatarUrl { AvatarUrl::local("w1", "c1", instance) }

    fn setup(behavior: RendererBehavior) -> (HeadlessDisplay, Arc<QueueSink>) {
        let display = HeadlessDisplay::new(behavior);
        let sink = Arc::new(QueueSink::default());
        display.attach_sink(sink.clone());
        (display, sink)
    }

    fn shown(display: &mut HeadlessDisplay, instance: &str) -> Box<dyn NativeWindow> {
        let mut window = display.create(&url(instance));
        window.show_inactive();
        window
    }

    fn native(signal: &WindowSignal) -> Option<NativeEvent> {
        match signal {
            WindowSignal::Native(event) => Some(*event),
            _ => None,
        }
    }

    #[test]
    fn test_focus_blurs_previous() {
        let (mut display, sink) = setup(RendererBehavior::manual());
        let mut a = shown(&mut display, "a");
        let mut b = shown(&mut display, "b");

        a.focus();
        b.focus();

        let events: Vec<_> = sink.drain().iter().map(|(u, s)| (u.clone(), native(s))).collect();
        assert_eq!(events, vec![
            (url("a"), Some(NativeEvent::Focus)),
            (url("a"), Some(NativeEvent::Blur)),
            (url("b"), Some(NativeEvent::Focus)),
        ]);
        assert_eq!(display.focused(), Some(url("b")));
        assert_eq!(display.stack(), vec![url("a"), url("b")]);
    }

    #[test]
    fn test_blur_refocuses_topmost_other() {
        let (mut display, sink) = setup(RendererBehavior::manual());
        let _a = shown(&mut display, "a");
        let mut b = shown(&mut display, "b");
        b.focus();
        sink.drain();

        b.blur();
        let events: Vec<_> = sink.drain().iter().map(|(u, s)| (u.clone(), native(s))).collect();
        assert_eq!(events, vec![
            (url("b"), Some(NativeEvent::Blur)),
            (url("a"), Some(NativeEvent::Focus)),
        ]);
        assert_eq!(display.focused(), Some(url("a")));
    }

    #[test]
    fn test_blur_of_unfocused_window_is_silent() {
        let (mut display, sink) = setup(RendererBehavior::manual());
        let mut a = shown(&mut display, "a");
        a.blur();
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_raise_does_not_focus() {
        let (mut display, sink) = setup(RendererBehavior::manual());
        let mut a = shown(&mut display, "a");
        let _b = shown(&mut display, "b");
        a.raise();
        assert_eq!(display.stack(), vec![url("b"), url("a")]);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_automatic_renderer_handshakes() {
        let (mut display, sink) = setup(RendererBehavior::automatic());
        let mut a = display.create(&url("a"));
        a.load_url("index");
        a.send(RendererMessage::RenderCard {
            card: None,
            avatar: crate::modules::desk::state::Avatar::new(url("a"), Default::default()),
        });
        let signals: Vec<_> = sink.drain().into_iter().map(|(_, s)| s).collect();
        assert_eq!(signals, vec![WindowSignal::FinishLoad, WindowSignal::FinishRenderCard]);
    }

    #[test]
    fn test_close_request_closes_when_automatic() {
        let (mut display, sink) = setup(RendererBehavior::automatic());
        let mut a = shown(&mut display, "a");
        a.focus();
        sink.drain();

        a.send(RendererMessage::CardClose);
        assert!(a.is_destroyed());
        let events: Vec<_> = sink.drain().iter().map(|(_, s)| native(s)).collect();
        assert_eq!(events, vec![Some(NativeEvent::Blur), Some(NativeEvent::Closed)]);
        assert_eq!(display.live_count(), 0);
    }

    #[test]
    fn test_close_request_ignored_when_manual() {
        let (mut display, _sink) = setup(RendererBehavior::manual());
        let mut a = shown(&mut display, "a");
        a.send(RendererMessage::CardClose);
        assert!(!a.is_destroyed());
        assert_eq!(display.messages(&url("a")), vec![RendererMessage::CardClose]);
    }

    #[test]
    fn test_user_input_emits_native_events() {
        let (mut display, sink) = setup(RendererBehavior::manual());
        let _a = shown(&mut display, "a");
        display.user_move(&url("a"), Rect::new(1, 2, 300, 300));
        display.user_resize(&url("a"), Rect::new(1, 2, 400, 300));

        let events: Vec<_> = sink.drain().iter().map(|(_, s)| native(s)).collect();
        assert_eq!(events, vec![
            Some(NativeEvent::WillMove(Rect::new(1, 2, 300, 300))),
            Some(NativeEvent::WillResize(Rect::new(1, 2, 400, 300))),
        ]);
        assert_eq!(display.bounds(&url("a")), Some(Rect::new(1, 2, 400, 300)));
    }

    #[test]
    fn test_reopened_url_gets_fresh_record() {
        let (mut display, _sink) = setup(RendererBehavior::manual());
        let mut first = shown(&mut display, "a");
        first.send(RendererMessage::CardFocused);
        first.close();

        let _second = shown(&mut display, "a");
        assert!(display.messages(&url("a")).is_empty());
        assert_eq!(display.live_count(), 1);
    }
}
