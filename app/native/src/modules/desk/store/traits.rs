//! Document store contract.
//!
//! The desk never touches storage directly. It reads documents, applies
//! atomic per-document patches and listens to avatar changes through
//! [`DocumentStore`]. Every write carries [`WriteMeta`] naming where it came
//! from, which the forwarder uses to avoid echoing a window's own edits back.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::modules::desk::state::{Avatar, AvatarUrl, Card, Workspace};

/// Errors reported by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No avatar with this URL exists.
    #[error("avatar not found: {0}")]
    NotFound(AvatarUrl),

    /// The store has been closed and refuses writes.
    #[error("store is closed")]
    Closed,

    /// The write could not be performed.
    #[error("store write failed: {0}")]
    WriteFailure(String),

    /// Snapshot file could not be read or written.
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file is not valid JSON.
    #[error("snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where a write originated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "camelCase")]
pub enum Provenance {
    /// A native event of this avatar's own window.
    Window(AvatarUrl),
    /// The desk itself (z-order, IPC commands).
    Manager,
    /// Another writer sharing the store.
    External,
}

/// Metadata attached to every write and carried on its change event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteMeta {
    pub provenance: Provenance,
    pub skip_forward: bool,
    pub revision: Uuid,
}

impl WriteMeta {
    #[must_use]
    pub fn new(provenance: Provenance, skip_forward: bool) -> Self {
        Self {
            provenance,
            skip_forward,
            revision: Uuid::now_v7(),
        }
    }

    /// Whether this write must not be forwarded to the window of `subscriber`.
    #[must_use]
    pub fn is_echo_for(&self, subscriber: &AvatarUrl) -> bool {
        self.skip_forward && matches!(&self.provenance, Provenance::Window(url) if url == subscriber)
    }
}

/// Partial geometry update. `None` fields are left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryPatch {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub z: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Partial avatar update applied by [`DocumentStore::atomic_patch`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarPatch {
    pub geometry: GeometryPatch,
}

impl AvatarPatch {
    /// Merges the patch into `avatar`.
    pub fn apply(&self, avatar: &mut Avatar) {
        let geometry = &mut avatar.geometry;
        if let Some(x) = self.geometry.x {
            geometry.x = x;
        }
        if let Some(y) = self.geometry.y {
            geometry.y = y;
        }
        if let Some(z) = self.geometry.z {
            geometry.z = z;
        }
        if let Some(width) = self.geometry.width {
            geometry.width = width;
        }
        if let Some(height) = self.geometry.height {
            geometry.height = height;
        }
    }
}

/// One successful avatar write, as seen by change subscribers.
#[derive(Clone, Debug)]
pub struct AvatarChange {
    pub previous: Option<Avatar>,
    pub next: Avatar,
    pub meta: WriteMeta,
}

/// Storage consumed by the desk.
///
/// Implementations must serialize writes per document: concurrent patches to
/// one URL apply in receipt order, and every successful patch produces exactly
/// one [`AvatarChange`] in that order.
pub trait DocumentStore: Send + Sync {
    /// Reads one avatar.
    fn find_one(&self, url: &AvatarUrl) -> Option<Avatar>;

    /// Reads several avatars, skipping unknown URLs.
    fn find_avatars(&self, urls: &[AvatarUrl]) -> Vec<Avatar>;

    /// Read-modify-write of one avatar.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown URL, [`StoreError::Closed`]
    /// after [`close`](Self::close), or [`StoreError::WriteFailure`].
    fn atomic_patch(
        &self,
        url: &AvatarUrl,
        patch: &AvatarPatch,
        meta: WriteMeta,
    ) -> Result<Avatar, StoreError>;

    /// Deletes one avatar and drops it from its workspace's member list.
    /// Returns the deleted document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown URL or
    /// [`StoreError::Closed`] after [`close`](Self::close).
    fn delete_avatar(&self, url: &AvatarUrl) -> Result<Avatar, StoreError>;

    /// Subscribes to avatar changes.
    fn subscribe_avatars(&self) -> broadcast::Receiver<AvatarChange>;

    /// All workspaces.
    fn workspaces(&self) -> Vec<Workspace>;

    /// Reads one workspace.
    fn find_workspace(&self, id: &str) -> Option<Workspace>;

    /// Reads one card.
    fn find_card(&self, id: &str) -> Option<Card>;

    /// Reads a local (non-replicated) document.
    fn get_local(&self, id: &str) -> Option<serde_json::Value>;

    /// Writes a local (non-replicated) document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`close`](Self::close).
    fn put_local(&self, id: &str, doc: serde_json::Value) -> Result<(), StoreError>;

    /// Flushes and refuses further writes.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn close(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::desk::state::Geometry;

    fn url(instance: &str) -> AvatarUrl { AvatarUrl::local("w1", "c1", instance) }

    #[test]
    fn test_echo_requires_skip_forward_and_same_window() {
        let a = url("a");
        let b = url("b");

        let own_skip = WriteMeta::new(Provenance::Window(a.clone()), true);
        assert!(own_skip.is_echo_for(&a));
        assert!(!own_skip.is_echo_for(&b));

        let own_forward = WriteMeta::new(Provenance::Window(a.clone()), false);
        assert!(!own_forward.is_echo_for(&a));

        let manager = WriteMeta::new(Provenance::Manager, true);
        assert!(!manager.is_echo_for(&a));
    }

    #[test]
    fn test_revisions_are_unique() {
        let first = WriteMeta::new(Provenance::Manager, false);
        let second = WriteMeta::new(Provenance::Manager, false);
        assert_ne!(first.revision, second.revision);
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut avatar = Avatar::new(url("a"), Geometry::default());
        let patch = AvatarPatch {
            geometry: GeometryPatch {
                x: Some(120),
                height: Some(250),
                ..GeometryPatch::default()
            },
        };
        patch.apply(&mut avatar);
        assert_eq!(avatar.geometry, Geometry { x: 120, y: 70, z: 0, width: 300, height: 250 });
    }
}
