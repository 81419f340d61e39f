//! Persisted document types.
//!
//! These mirror the documents held by the store:
//! - `Workspace` lists the avatar URLs that belong to it
//! - `Avatar` owns the presentation of one card on one workspace
//! - `Card` owns the content and is only read by this crate
//!
//! Relations:
//! - `Workspace.avatars` → list of `Avatar.url`
//! - `Avatar.url` → encodes `Workspace.id` and `Card.id`

use serde::{Deserialize, Serialize};

use super::url::AvatarUrl;
use crate::constants::{
    DEFAULT_AVATAR_HEIGHT, DEFAULT_AVATAR_WIDTH, DEFAULT_AVATAR_X, DEFAULT_AVATAR_Y,
    DEFAULT_BACKGROUND_COLOR, DOCUMENT_VERSION,
};

// ============================================================================
// Geometry Types
// ============================================================================

/// A rectangle with integral position and size, as reported by the window system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Returns this rectangle grown to at least the given size.
    #[must_use]
    pub fn at_least(self, min_width: i32, min_height: i32) -> Self {
        Self {
            width: self.width.max(min_width),
            height: self.height.max(min_height),
            ..self
        }
    }
}

/// Position, size and stacking key of an avatar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub z: i64,
    pub width: i32,
    pub height: i32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: DEFAULT_AVATAR_X,
            y: DEFAULT_AVATAR_Y,
            z: 0,
            width: DEFAULT_AVATAR_WIDTH,
            height: DEFAULT_AVATAR_HEIGHT,
        }
    }
}

impl Geometry {
    /// The on-screen rectangle, without the stacking key.
    #[must_use]
    pub const fn rect(&self) -> Rect { Rect::new(self.x, self.y, self.width, self.height) }
}

// ============================================================================
// Documents
// ============================================================================

/// Visual style of an avatar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AvatarStyle {
    pub ui_color: String,
    pub background_color: String,
    pub opacity: f64,
    pub zoom: f64,
}

impl Default for AvatarStyle {
    fn default() -> Self {
        Self {
            ui_color: String::new(),
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            opacity: 1.0,
            zoom: 1.0,
        }
    }
}

/// Editing condition of an avatar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarCondition {
    pub locked: bool,
}

/// Creation and modification timestamps (ISO 8601 strings).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocDate {
    pub created_date: String,
    pub modified_date: String,
}

fn default_version() -> String { DOCUMENT_VERSION.to_string() }

/// Presentation of one card on one workspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    pub url: AvatarUrl,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub style: AvatarStyle,
    #[serde(default)]
    pub condition: AvatarCondition,
    #[serde(default)]
    pub date: DocDate,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Avatar {
    /// Create an avatar with default presentation.
    #[must_use]
    pub fn new(url: AvatarUrl, geometry: Geometry) -> Self {
        Self {
            url,
            geometry,
            style: AvatarStyle::default(),
            condition: AvatarCondition::default(),
            date: DocDate::default(),
            version: default_version(),
        }
    }

    /// Top-level fields that differ between `self` and `next`.
    #[must_use]
    pub fn changed_fields(&self, next: &Self) -> Vec<AvatarField> {
        AvatarField::ALL
            .into_iter()
            .filter(|field| self.field_value(*field) != next.field_value(*field))
            .collect()
    }

    /// JSON value of one top-level field.
    #[must_use]
    pub fn field_value(&self, field: AvatarField) -> serde_json::Value {
        let value = match field {
            AvatarField::Url => serde_json::to_value(&self.url),
            AvatarField::Geometry => serde_json::to_value(self.geometry),
            AvatarField::Style => serde_json::to_value(&self.style),
            AvatarField::Condition => serde_json::to_value(self.condition),
            AvatarField::Date => serde_json::to_value(&self.date),
            AvatarField::Version => serde_json::to_value(&self.version),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Top-level avatar property, used to forward single-field changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AvatarField {
    Url,
    Geometry,
    Style,
    Condition,
    Date,
    Version,
}

impl AvatarField {
    pub const ALL: [Self; 6] =
        [Self::Url, Self::Geometry, Self::Style, Self::Condition, Self::Date, Self::Version];

    /// Property name as seen by the renderer.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Geometry => "geometry",
            Self::Style => "style",
            Self::Condition => "condition",
            Self::Date => "date",
            Self::Version => "version",
        }
    }
}

/// Card content. Read-only from the desk's point of view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user: String,
    pub data: String,
    pub date: DocDate,
    pub version: String,
}

/// A named collection of avatars shown together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub date: DocDate,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub avatars: Vec<AvatarUrl>,
}

impl Workspace {
    /// Create an empty workspace.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            date: DocDate::default(),
            version: default_version(),
            avatars: Vec::new(),
        }
    }
}

/// Local document naming the active workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentWorkspace {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl CurrentWorkspace {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self { Self { id: id.into(), version: default_version() } }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar() -> Avatar { Avatar::new(AvatarUrl::local("w1", "c1", "a"), Geometry::default()) }

    #[test]
    fn test_rect_at_least_clamps_size_only() {
        let rect = Rect::new(5, 6, 100, 40).at_least(185, 80);
        assert_eq!(rect, Rect::new(5, 6, 185, 80));

        let rect = Rect::new(5, 6, 400, 300).at_least(185, 80);
        assert_eq!(rect, Rect::new(5, 6, 400, 300));
    }

    #[test]
    fn test_geometry_default() {
        let geometry = Geometry::default();
        assert_eq!(geometry.rect(), Rect::new(70, 70, 300, 300));
        assert_eq!(geometry.z, 0);
    }

    #[test]
    fn test_changed_fields_none_when_equal() {
        let a = avatar();
        assert!(a.changed_fields(&a.clone()).is_empty());
    }

    #[test]
    fn test_changed_fields_single() {
        let a = avatar();
        let mut b = a.clone();
        b.geometry.z = 4;
        assert_eq!(a.changed_fields(&b), vec![AvatarField::Geometry]);
    }

    #[test]
    fn test_changed_fields_multiple() {
        let a = avatar();
        let mut b = a.clone();
        b.geometry.x = 1;
        b.condition.locked = true;
        assert_eq!(a.changed_fields(&b), vec![AvatarField::Geometry, AvatarField::Condition]);
    }

    #[test]
    fn test_avatar_deserializes_with_defaults() {
        let json = r#"{"url": "rxdesktop://local/ws/1/c/a"}"#;
        let avatar: Avatar = serde_json::from_str(json).unwrap();
        assert_eq!(avatar.geometry, Geometry::default());
        assert_eq!(avatar.style.background_color, "#ffffa0");
        assert_eq!(avatar.version, "1.0");
    }

    #[test]
    fn test_avatar_serializes_camel_case() {
        let json = serde_json::to_string(&avatar()).unwrap();
        assert!(json.contains("backgroundColor"));
        assert!(json.contains("createdDate"));
    }

    #[test]
    fn test_card_type_field() {
        let card: Card = serde_json::from_str(r#"{"id":"c1","type":"text/html"}"#).unwrap();
        assert_eq!(card.kind, "text/html");
    }
}
