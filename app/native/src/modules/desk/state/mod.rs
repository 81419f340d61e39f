//! Desk state: persisted document types, avatar URLs and the window-manager context.

mod context;
mod types;
mod url;

pub use context::{DeskContext, SwitchPhase, TransitionIntent};
pub use types::{
    Avatar, AvatarCondition, AvatarField, AvatarStyle, Card, CurrentWorkspace, DocDate, Geometry,
    Rect, Workspace,
};
pub use url::{AvatarUrl, UrlError};
