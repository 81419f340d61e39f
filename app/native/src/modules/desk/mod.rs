//! Desk: avatar window lifecycle, focus arbitration and state synchronization.
//!
//! Every avatar is its own native window whose geometry lives in a shared
//! document store. The desk keeps the two consistent without feedback loops,
//! keeps the stacking order total, and switches between workspaces.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Native windows            Document store              │
//! │  (move, resize, focus, blur,   (avatar change stream)        │
//! │   closed, renderer callbacks)                                │
//! └──────────────┬──────────────────────────┬───────────────────┘
//!                │ MailboxSink               │ change pump
//!                ▼                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Desk Actor                             │
//! │  - DeskManager owns context, registry, store handle          │
//! │  - Focus gate + per-window FocusGuard                        │
//! │  - Dispatcher writes actions with provenance                 │
//! │  - Z-order arbiter, workspace switch state machine           │
//! └──────────────┬──────────────────────────┬───────────────────┘
//!                │ RendererMessage           │ TimerEvent
//!                ▼                           ▼
//!          window renderers          tokio timers → mailbox
//! ```

pub mod actions;
pub mod actor;
pub mod dispatcher;
pub mod error;
pub mod focus;
pub mod init;
pub mod ipc;
pub mod manager;
pub mod state;
pub mod store;
pub mod timer;
pub mod window;
mod workspace;
mod zorder;

pub use actions::{ActionKind, PersistentAction};
pub use actor::{
    ActorError, CommandReply, DeskCommand, DeskHandle, DeskQuery, DeskStatus, QueryResult,
    SwitchOutcome,
};
pub use error::DeskError;
pub use focus::{FocusGuard, SuppressMode};
pub use init::{DeskRuntime, spawn_desk};
pub use manager::{DeskManager, DeskSettings};
pub use state::{Avatar, AvatarUrl, Card, Geometry, Rect, Workspace};
pub use store::{DocumentStore, MemoryStore};
pub use window::{HeadlessDisplay, RendererBehavior, RendererMessage};
