//! Errors reported by desk operations.

use serde::Serialize;
use thiserror::Error;

use super::dispatcher::DispatchError;
use super::state::AvatarUrl;
use super::store::StoreError;

/// Error returned by desk commands and requests.
///
/// Serializes to `{ "kind": ..., "message": ... }` for IPC responses.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum DeskError {
    /// The URL names no avatar or no live window.
    #[error("avatar not found: {0}")]
    NotFound(AvatarUrl),

    /// The store holds no workspace to open.
    #[error("no workspace exists in the store")]
    NoWorkspace,

    /// A workspace switch targets an unknown workspace.
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    /// Another workspace switch or exit is still closing windows.
    #[error("a workspace switch is already in progress")]
    SwitchInProgress,

    /// The store rejected a write.
    #[error("store write failed: {0}")]
    StoreWriteFailure(String),

    /// A window did not finish rendering in time.
    #[error("render timed out for {0}")]
    RenderTimeout(AvatarUrl),

    /// The desk actor is not reachable.
    #[error("desk unavailable: {0}")]
    Unavailable(String),
}

impl From<DispatchError> for DeskError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound(url) => Self::NotFound(url),
            err @ DispatchError::StoreWriteFailure { .. } => Self::StoreWriteFailure(err.to_string()),
        }
    }
}

impl From<StoreError> for DeskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(url) => Self::NotFound(url),
            err => Self::StoreWriteFailure(err.to_string()),
        }
    }
}
