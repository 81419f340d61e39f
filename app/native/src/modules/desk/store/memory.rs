//! In-memory document store with optional JSON snapshot persistence.
//!
//! Each collection is a `DashMap`; holding a document's entry lock for the
//! whole read-modify-write makes patches atomic per document, and the change
//! is broadcast before the lock is released so subscribers observe writes to
//! one document in the order they were applied.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::traits::{AvatarChange, AvatarPatch, DocumentStore, StoreError, WriteMeta};
use crate::modules::desk::state::{Avatar, AvatarUrl, Card, Workspace};

/// Capacity of the avatar change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// On-disk layout of a snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
    workspaces: Vec<Workspace>,
    avatars: Vec<Avatar>,
    cards: Vec<Card>,
    locals: BTreeMap<String, serde_json::Value>,
}

/// Document store kept in memory.
pub struct MemoryStore {
    avatars: DashMap<AvatarUrl, Avatar>,
    workspaces: DashMap<String, Workspace>,
    cards: DashMap<String, Card>,
    locals: DashMap<String, serde_json::Value>,
    changes: broadcast::Sender<AvatarChange>,
    snapshot_path: Option<PathBuf>,
    closed: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    /// Creates an empty store without persistence.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            avatars: DashMap::new(),
            workspaces: DashMap::new(),
            cards: DashMap::new(),
            locals: DashMap::new(),
            changes,
            snapshot_path: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Opens a store backed by a snapshot file.
    ///
    /// A missing file yields an empty store that will be written on close.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            store.load_snapshot(snapshot);
            tracing::info!(
                path = %path.display(),
                avatars = store.avatars.len(),
                workspaces = store.workspaces.len(),
                "desk: store snapshot loaded"
            );
        } else {
            tracing::info!(path = %path.display(), "desk: no store snapshot, starting empty");
        }

        store.snapshot_path = Some(path);
        Ok(store)
    }

    fn load_snapshot(&mut self, snapshot: Snapshot) {
        for workspace in snapshot.workspaces {
            self.workspaces.insert(workspace.id.clone(), workspace);
        }
        for avatar in snapshot.avatars {
            self.avatars.insert(avatar.url.clone(), avatar);
        }
        for card in snapshot.cards {
            self.cards.insert(card.id.clone(), card);
        }
        for (key, value) in snapshot.locals {
            self.locals.insert(key, value);
        }
    }

    fn snapshot(&self) -> Snapshot {
        let mut workspaces: Vec<Workspace> =
            self.workspaces.iter().map(|entry| entry.value().clone()).collect();
        workspaces.sort_by(|a, b| a.id.cmp(&b.id));

        let mut avatars: Vec<Avatar> =
            self.avatars.iter().map(|entry| entry.value().clone()).collect();
        avatars.sort_by(|a, b| a.url.cmp(&b.url));

        let mut cards: Vec<Card> = self.cards.iter().map(|entry| entry.value().clone()).collect();
        cards.sort_by(|a, b| a.id.cmp(&b.id));

        let locals = self
            .locals
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        Snapshot { workspaces, avatars, cards, locals }
    }

    /// Writes the snapshot file, if this store has one.
    ///
    /// The file is replaced atomically through a temporary file in the same
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or written.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        write_snapshot(path, &self.snapshot())?;
        tracing::debug!(path = %path.display(), "desk: store snapshot written");
        Ok(())
    }

    /// Path of the snapshot file, if any.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> { self.snapshot_path.as_deref() }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Inserts or replaces a workspace.
    pub fn insert_workspace(&self, workspace: Workspace) {
        self.workspaces.insert(workspace.id.clone(), workspace);
    }

    /// Inserts or replaces an avatar and adds it to its workspace's member list.
    pub fn insert_avatar(&self, avatar: Avatar) {
        if let Some(mut workspace) = self.workspaces.get_mut(avatar.url.workspace_id()) {
            let members = &mut workspace.avatars;
            if !members.contains(&avatar.url) {
                members.push(avatar.url.clone());
            }
        }
        self.avatars.insert(avatar.url.clone(), avatar);
    }

    /// Inserts or replaces a card.
    pub fn insert_card(&self, card: Card) { self.cards.insert(card.id.clone(), card); }

    /// Creates workspace `0` if the store holds no workspace at all.
    ///
    /// Returns `true` if a workspace was created.
    pub fn ensure_workspace(&self, name: &str) -> bool {
        if !self.workspaces.is_empty() {
            return false;
        }
        self.insert_workspace(Workspace::new("0", name));
        true
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(file.as_file());
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
    }
    file.as_file().sync_data()?;
    file.persist(path).map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, url: &AvatarUrl) -> Option<Avatar> {
        self.avatars.get(url).map(|entry| entry.value().clone())
    }

    fn find_avatars(&self, urls: &[AvatarUrl]) -> Vec<Avatar> {
        urls.iter().filter_map(|url| self.find_one(url)).collect()
    }

    fn atomic_patch(
        &self,
        url: &AvatarUrl,
        patch: &AvatarPatch,
        meta: WriteMeta,
    ) -> Result<Avatar, StoreError> {
        self.ensure_open()?;

        let Some(mut entry) = self.avatars.get_mut(url) else {
            return Err(StoreError::NotFound(url.clone()));
        };

        let previous = entry.value().clone();
        patch.apply(entry.value_mut());
        let next = entry.value().clone();

        tracing::trace!(
            url = %url,
            revision = %meta.revision,
            skip_forward = meta.skip_forward,
            "desk: avatar patched"
        );

        // No receivers is not an error: nobody is listening yet.
        let _ = self.changes.send(AvatarChange {
            previous: Some(previous),
            next: next.clone(),
            meta,
        });
        drop(entry);

        Ok(next)
    }

    fn delete_avatar(&self, url: &AvatarUrl) -> Result<Avatar, StoreError> {
        self.ensure_open()?;

        let Some((_, avatar)) = self.avatars.remove(url) else {
            return Err(StoreError::NotFound(url.clone()));
        };
        if let Some(mut workspace) = self.workspaces.get_mut(url.workspace_id()) {
            workspace.avatars.retain(|member| member != url);
        }
        tracing::debug!(url = %url, "desk: avatar deleted");
        Ok(avatar)
    }

    fn subscribe_avatars(&self) -> broadcast::Receiver<AvatarChange> { self.changes.subscribe() }

    fn workspaces(&self) -> Vec<Workspace> {
        let mut workspaces: Vec<Workspace> =
            self.workspaces.iter().map(|entry| entry.value().clone()).collect();
        workspaces.sort_by(|a, b| a.id.cmp(&b.id));
        workspaces
    }

    fn find_workspace(&self, id: &str) -> Option<Workspace> {
        self.workspaces.get(id).map(|entry| entry.value().clone())
    }

    fn find_card(&self, id: &str) -> Option<Card> {
        self.cards.get(id).map(|entry| entry.value().clone())
    }

    fn get_local(&self, id: &str) -> Option<serde_json::Value> {
        self.locals.get(id).map(|entry| entry.value().clone())
    }

    fn put_local(&self, id: &str, doc: serde_json::Value) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.locals.insert(id.to_string(), doc);
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!("desk: closing store");
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::modules::desk::state::Geometry;
    use crate::modules::desk::store::traits::{GeometryPatch, Provenance};

    fn url(instance: &str) -> AvatarUrl { AvatarUrl::local("w1", "c1", instance) }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_workspace(Workspace::new("w1", "One"));
        store.insert_avatar(Avatar::new(url("a"), Geometry::default()));
        store
    }

    fn move_to(x: i32, y: i32) -> AvatarPatch {
        AvatarPatch {
            geometry: GeometryPatch {
                x: Some(x),
                y: Some(y),
                ..GeometryPatch::default()
            },
        }
    }

    #[test]
    fn test_insert_avatar_joins_workspace() {
        let store = seeded();
        let workspace = store.find_workspace("w1").unwrap();
        assert_eq!(workspace.avatars, vec![url("a")]);

        // Re-inserting does not duplicate membership.
        store.insert_avatar(Avatar::new(url("a"), Geometry::default()));
        assert_eq!(store.find_workspace("w1").unwrap().avatars.len(), 1);
    }

    #[test]
    fn test_patch_unknown_url_is_not_found() {
        let store = seeded();
        let err = store
            .atomic_patch(&url("zzz"), &move_to(1, 1), WriteMeta::new(Provenance::Manager, false))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_patch_emits_one_change_with_meta() {
        let store = seeded();
        let mut changes = store.subscribe_avatars();

        let meta = WriteMeta::new(Provenance::Window(url("a")), true);
        let revision = meta.revision;
        let next = store.atomic_patch(&url("a"), &move_to(10, 20), meta).unwrap();
        assert_eq!((next.geometry.x, next.geometry.y), (10, 20));

        let change = changes.try_recv().unwrap();
        assert_eq!(change.previous.unwrap().geometry.x, 70);
        assert_eq!(change.next.geometry.x, 10);
        assert_eq!(change.meta.revision, revision);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_patches_lose_no_update() {
        let store = Arc::new(seeded());
        let mut changes = store.subscribe_avatars();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let patch = AvatarPatch {
                        geometry: GeometryPatch {
                            z: Some(i),
                            ..GeometryPatch::default()
                        },
                    };
                    store
                        .atomic_patch(&url("a"), &patch, WriteMeta::new(Provenance::Manager, false))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Each change's previous is the prior change's next: no interleaving.
        let mut last_z = 0;
        let mut count = 0;
        while let Ok(change) = changes.try_recv() {
            assert_eq!(change.previous.unwrap().geometry.z, last_z);
            last_z = change.next.geometry.z;
            count += 1;
        }
        assert_eq!(count, 8);
        assert_eq!(store.find_one(&url("a")).unwrap().geometry.z, last_z);
    }

    #[test]
    fn test_delete_avatar_leaves_workspace() {
        let store = seeded();
        store.insert_avatar(Avatar::new(url("b"), Geometry::default()));

        let deleted = store.delete_avatar(&url("a")).unwrap();
        assert_eq!(deleted.url, url("a"));
        assert!(store.find_one(&url("a")).is_none());
        assert_eq!(store.find_workspace("w1").unwrap().avatars, vec![url("b")]);

        assert!(matches!(store.delete_avatar(&url("a")), Err(StoreError::NotFound(_))));
        store.close().unwrap();
        assert!(matches!(store.delete_avatar(&url("b")), Err(StoreError::Closed)));
    }

    #[test]
    fn test_closed_store_refuses_writes() {
        let store = seeded();
        store.close().unwrap();
        let err = store
            .atomic_patch(&url("a"), &move_to(1, 1), WriteMeta::new(Provenance::Manager, false))
            .unwrap_err();
        assert!(matches!(err, StoreError::Closed));
        assert!(store.put_local("k", serde_json::json!(1)).is_err());
    }

    #[test]
    fn test_snapshot_round_trip_through_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = MemoryStore::open(&path).unwrap();
        store.insert_workspace(Workspace::new("w1", "One"));
        store.insert_avatar(Avatar::new(url("a"), Geometry::default()));
        store.put_local("currentWorkspace", serde_json::json!({"id": "w1"})).unwrap();
        store
            .atomic_patch(&url("a"), &move_to(5, 6), WriteMeta::new(Provenance::Manager, false))
            .unwrap();
        store.close().unwrap();
        assert!(path.exists());

        let reopened = MemoryStore::open(&path).unwrap();
        let avatar = reopened.find_one(&url("a")).unwrap();
        assert_eq!((avatar.geometry.x, avatar.geometry.y), (5, 6));
        assert_eq!(reopened.get_local("currentWorkspace").unwrap()["id"], "w1");
        assert_eq!(reopened.workspaces().len(), 1);
    }

    #[test]
    fn test_open_rejects_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(MemoryStore::open(&path), Err(StoreError::Parse(_))));
    }

    #[test]
    fn test_ensure_workspace_only_when_empty() {
        let store = MemoryStore::new();
        assert!(store.ensure_workspace("Workspace 1"));
        assert!(!store.ensure_workspace("Workspace 1"));
        assert_eq!(store.workspaces().len(), 1);
    }
}
