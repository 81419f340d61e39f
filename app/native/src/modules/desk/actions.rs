//! Persistent actions and their reducers.
//!
//! An action names one avatar and one geometry mutation. Its wire form is
//!
//! ```json
//! {"type": "size-update", "url": "rxdesktop://local/ws/0/c/a",
//!  "payload": {"x": 1, "y": 2, "width": 300, "height": 200}, "skipForward": true}
//! ```

use serde::{Deserialize, Serialize};

use super::state::{AvatarUrl, Geometry, Rect};
use super::store::{AvatarPatch, GeometryPatch};

/// New top-left corner of a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// New stacking key of a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depth {
    pub z: i64,
}

/// The mutation an action performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ActionKind {
    /// Merge `{x, y}` into the geometry.
    PositionUpdate(Position),
    /// Merge `{x, y, width, height}` into the geometry.
    SizeUpdate(Rect),
    /// Set `z`.
    DepthUpdate(Depth),
}

impl ActionKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PositionUpdate(_) => "position-update",
            Self::SizeUpdate(_) => "size-update",
            Self::DepthUpdate(_) => "depth-update",
        }
    }

    /// Pure reducer: the store patch this action produces.
    #[must_use]
    pub const fn reduce(&self) -> AvatarPatch {
        let geometry = match *self {
            Self::PositionUpdate(Position { x, y }) => GeometryPatch {
                x: Some(x),
                y: Some(y),
                z: None,
                width: None,
                height: None,
            },
            Self::SizeUpdate(Rect { x, y, width, height }) => GeometryPatch {
                x: Some(x),
                y: Some(y),
                z: None,
                width: Some(width),
                height: Some(height),
            },
            Self::DepthUpdate(Depth { z }) => GeometryPatch {
                x: None,
                y: None,
                z: Some(z),
                width: None,
                height: None,
            },
        };
        AvatarPatch { geometry }
    }

    /// Applies the reducer to a bare geometry.
    #[must_use]
    pub const fn apply_to(&self, geometry: Geometry) -> Geometry {
        let mut next = geometry;
        match *self {
            Self::PositionUpdate(Position { x, y }) => {
                next.x = x;
                next.y = y;
            }
            Self::SizeUpdate(Rect { x, y, width, height }) => {
                next.x = x;
                next.y = y;
                next.width = width;
                next.height = height;
            }
            Self::DepthUpdate(Depth { z }) => next.z = z,
        }
        next
    }
}

/// A mutation of one avatar, dispatched through the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentAction {
    pub url: AvatarUrl,
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Do not forward the resulting change to the originating window.
    #[serde(default)]
    pub skip_forward: bool,
}

impl PersistentAction {
    #[must_use]
    pub const fn new(url: AvatarUrl, kind: ActionKind, skip_forward: bool) -> Self {
        Self { url, kind, skip_forward }
    }

    #[must_use]
    pub const fn position(url: AvatarUrl, x: i32, y: i32, skip_forward: bool) -> Self {
        Self::new(url, ActionKind::PositionUpdate(Position { x, y }), skip_forward)
    }

    #[must_use]
    pub const fn size(url: AvatarUrl, rect: Rect, skip_forward: bool) -> Self {
        Self::new(url, ActionKind::SizeUpdate(rect), skip_forward)
    }

    #[must_use]
    pub const fn depth(url: AvatarUrl, z: i64, skip_forward: bool) -> Self {
        Self::new(url, ActionKind::DepthUpdate(Depth { z }), skip_forward)
    }
}
