//! Message types for the desk actor.
//!
//! - `DeskMessage` - everything the actor's mailbox accepts
//! - `DeskCommand` - mutating requests, answered with a `CommandReply`
//! - `DeskQuery` - read-only requests, answered with a `QueryResult`

use serde::Serialize;
use tokio::sync::{oneshot, watch};

use crate::modules::desk::actions::PersistentAction;
use crate::modules::desk::error::DeskError;
use crate::modules::desk::focus::{FocusGuard, SuppressMode};
use crate::modules::desk::state::{
    Avatar, AvatarUrl, Rect, SwitchPhase, TransitionIntent,
};
use crate::modules::desk::store::AvatarChange;
use crate::modules::desk::timer::TimerEvent;
use crate::modules::desk::window::{ListenerSet, RenderStatus, WindowPhase, WindowSignal};

// ============================================================================
// Desk Messages
// ============================================================================

/// Messages sent to the desk actor.
#[derive(Debug)]
pub enum DeskMessage {
    /// A window reported a native event or a renderer callback.
    Window { url: AvatarUrl, signal: WindowSignal },

    /// The store committed an avatar write.
    AvatarChanged(AvatarChange),

    /// A scheduled timer fired.
    Timer(TimerEvent),

    /// The window system reports that no window is left.
    AllWindowsClosed,

    /// Mutating request with a response channel.
    Command {
        command: DeskCommand,
        respond_to: oneshot::Sender<Result<CommandReply, DeskError>>,
    },

    /// Read-only request with a response channel.
    Query {
        query: DeskQuery,
        respond_to: oneshot::Sender<QueryResult>,
    },

    /// Stop the actor immediately, without closing windows.
    Shutdown,
}

impl DeskMessage {
    /// Returns a short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Window { .. } => "Window",
            Self::AvatarChanged(_) => "AvatarChanged",
            Self::Timer(_) => "Timer",
            Self::AllWindowsClosed => "AllWindowsClosed",
            Self::Command { .. } => "Command",
            Self::Query { .. } => "Query",
            Self::Shutdown => "Shutdown",
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Mutating requests accepted by the desk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeskCommand {
    DispatchAction(PersistentAction),
    BringToFront { url: AvatarUrl, rearrange: bool },
    SendToBack { url: AvatarUrl },
    SetWindowSize { url: AvatarUrl, width: i32, height: i32 },
    SetWindowPosition { url: AvatarUrl, x: i32, y: i32 },
    Blur { url: AvatarUrl },
    Focus { url: AvatarUrl },
    BlurAndFocus { url: AvatarUrl, mode: SuppressMode },
    /// Destroy the avatar's window, drop it from its workspace and delete it.
    DeleteAvatar { url: AvatarUrl },
    SwitchWorkspace { id: String },
    Exit,
}

impl DeskCommand {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DispatchAction(_) => "DispatchAction",
            Self::BringToFront { .. } => "BringToFront",
            Self::SendToBack { .. } => "SendToBack",
            Self::SetWindowSize { .. } => "SetWindowSize",
            Self::SetWindowPosition { .. } => "SetWindowPosition",
            Self::Blur { .. } => "Blur",
            Self::Focus { .. } => "Focus",
            Self::BlurAndFocus { .. } => "BlurAndFocus",
            Self::DeleteAvatar { .. } => "DeleteAvatar",
            Self::SwitchWorkspace { .. } => "SwitchWorkspace",
            Self::Exit => "Exit",
        }
    }
}

/// How a workspace switch request was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchOutcome {
    /// No window was open; the target is already active.
    Switched,
    /// Windows are closing; the target opens once all of them report closed.
    Closing,
    /// The target is the active workspace.
    AlreadyActive,
}

/// Successful result of a [`DeskCommand`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    Done,
    /// New stacking key, `None` when nothing was restacked.
    Depth(Option<i64>),
    /// Window bounds after the change.
    Bounds(Rect),
    Switch(SwitchOutcome),
}

// ============================================================================
// Queries
// ============================================================================

/// Read-only requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeskQuery {
    Status,
    Avatar { url: AvatarUrl },
    /// Receiver observing a window's render status.
    RenderWatch { url: AvatarUrl },
}

/// Results from queries.
#[derive(Debug)]
pub enum QueryResult {
    Status(DeskStatus),
    Avatar(Option<Avatar>),
    RenderWatch(Option<watch::Receiver<RenderStatus>>),
}

/// Snapshot of one live window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStatus {
    pub url: AvatarUrl,
    pub phase: WindowPhase,
    pub render: RenderStatus,
    pub listeners: ListenerSet,
    pub focus_guard: FocusGuard,
    pub focused: bool,
    pub bounds: Rect,
}

/// Snapshot of the desk.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeskStatus {
    pub current_workspace: Option<String>,
    pub phase: SwitchPhase,
    pub intent: TransitionIntent,
    pub focus_permitted: bool,
    pub windows: Vec<WindowStatus>,
}
