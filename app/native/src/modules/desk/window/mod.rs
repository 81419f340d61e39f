//! Avatar windows.
//!
//! The native windowing API is reached only through [`NativeWindow`] and
//! [`WindowFactory`]. Windows report native events and renderer callbacks to
//! an [`EventSink`]; the desk pushes [`RendererMessage`]s back.
//!
//! - [`controller`] - per-window lifecycle, listeners and render status
//! - [`debounce`] - coalescing of native resize bursts
//! - [`registry`] - live windows keyed by avatar URL
//! - [`headless`] - in-process backend simulating stacking, focus and a renderer

pub mod controller;
pub mod debounce;
pub mod headless;
pub mod registry;

use serde::Serialize;

pub use controller::{AvatarWindow, ListenerSet, RenderStatus, WindowPhase};
pub use debounce::ResizeDebouncer;
pub use headless::{HeadlessDisplay, RendererBehavior};
pub use registry::WindowRegistry;

use super::state::{Avatar, AvatarUrl, Card, Rect};

/// Event reported by the native window system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeEvent {
    /// The user is dragging the window to this rectangle.
    WillMove(Rect),
    /// The user is resizing the window to this rectangle.
    WillResize(Rect),
    Focus,
    Blur,
    Closed,
}

impl NativeEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::WillMove(_) => "will-move",
            Self::WillResize(_) => "will-resize",
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::Closed => "closed",
        }
    }
}

/// Anything a window reports back to the desk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowSignal {
    Native(NativeEvent),
    /// The renderer finished loading the index page.
    FinishLoad,
    /// The renderer finished drawing the card.
    FinishRenderCard,
}

/// Message pushed from the desk to a window's renderer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RendererMessage {
    /// Draw this card with this presentation.
    RenderCard { card: Option<Card>, avatar: Avatar },
    /// A store change, either one property or the whole avatar.
    #[serde(rename_all = "camelCase")]
    PersistentStoreForward {
        property_name: Option<String>,
        state: serde_json::Value,
    },
    CardFocused,
    CardBlurred,
    /// Flush pending edits and close.
    CardClose,
}

/// Receives window signals.
pub trait EventSink: Send + Sync {
    fn emit(&self, url: &AvatarUrl, signal: WindowSignal);
}

/// One native window.
pub trait NativeWindow: Send {
    /// Starts loading a page into the window.
    fn load_url(&mut self, url: &str);

    /// Shows the window without activating it.
    fn show_inactive(&mut self);

    fn set_bounds(&mut self, bounds: Rect);

    fn bounds(&self) -> Rect;

    fn focus(&mut self);

    fn blur(&mut self);

    /// Moves the window to the top of the native stack without focusing it.
    fn raise(&mut self);

    fn is_focused(&self) -> bool;

    fn is_destroyed(&self) -> bool;

    /// Destroys the window.
    fn close(&mut self);

    /// Pushes a message to the window's renderer.
    fn send(&mut self, message: RendererMessage);
}

/// Creates native windows.
pub trait WindowFactory: Send {
    fn create(&mut self, url: &AvatarUrl) -> Box<dyn NativeWindow>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::desk::state::Geometry;

    #[test]
    fn test_renderer_message_wire_format() {
        let json = serde_json::to_value(RendererMessage::CardClose).unwrap();
        assert_eq!(json, serde_json::json!({"type": "card-close"}));

        let forward = RendererMessage::PersistentStoreForward {
            property_name: Some("geometry".into()),
            state: serde_json::json!({"z": 1}),
        };
        let json = serde_json::to_value(forward).unwrap();
        assert_eq!(json["type"], "persistent-store-forward");
        assert_eq!(json["propertyName"], "geometry");

        let render = RendererMessage::RenderCard {
            card: None,
            avatar: Avatar::new(AvatarUrl::local("0", "c", "a"), Geometry::default()),
        };
        let json = serde_json::to_value(render).unwrap();
        assert_eq!(json["type"], "render-card");
        assert!(json["avatar"]["geometry"].is_object());
    }

    #[test]
    fn test_native_event_names() {
        assert_eq!(NativeEvent::WillMove(Rect::default()).name(), "will-move");
        assert_eq!(NativeEvent::Closed.name(), "closed");
    }
}
