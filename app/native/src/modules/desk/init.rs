//! Desk startup.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         spawn_desk()                                     │
//! │  1. Create the mailbox and the unbounded window-signal channel          │
//! │  2. Route display signals into the latter (MailboxSink)                 │
//! │  3. Subscribe to store changes before any window opens                  │
//! │  4. Build the DeskManager and open the current workspace                │
//! │  5. Spawn the change pump and the actor                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is global: every call builds an independent desk, so several can
//! run side by side in one process.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::actor::{CHANNEL_BUFFER_SIZE, DeskActor, DeskHandle, DeskMessage, MailboxSink};
use super::error::DeskError;
use super::manager::{DeskManager, DeskSettings};
use super::store::{AvatarChange, DocumentStore};
use super::timer::TokioScheduler;
use super::window::HeadlessDisplay;

/// A running desk.
pub struct DeskRuntime {
    pub handle: DeskHandle,
    /// Id of the workspace opened at startup.
    pub workspace: String,
    /// Completes when the actor stops.
    pub actor: JoinHandle<()>,
}

/// Starts a desk on `display`. Must be called inside a tokio runtime.
///
/// # Errors
///
/// Returns [`DeskError::NoWorkspace`] if the store holds no workspace.
pub fn spawn_desk(
    store: Arc<dyn DocumentStore>,
    display: &HeadlessDisplay,
    settings: DeskSettings,
) -> Result<DeskRuntime, DeskError> {
    tracing::debug!("desk: spawning actor");
    let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let (signal_sender, signals) = mpsc::unbounded_channel();

    display.attach_sink(Arc::new(MailboxSink::new(signal_sender)));
    let changes = store.subscribe_avatars();

    let mut manager = DeskManager::new(
        store,
        Box::new(display.clone()),
        Box::new(TokioScheduler::new(sender.clone())),
        settings,
    );
    let workspace = manager.load_current_workspace()?;

    let pump = tokio::spawn(pump_changes(changes, sender.clone()));
    let actor = DeskActor::new(manager, receiver, signals);
    let actor = tokio::spawn(async move {
        actor.run().await;
        pump.abort();
    });

    Ok(DeskRuntime {
        handle: DeskHandle::new(sender),
        workspace,
        actor,
    })
}

/// Feeds store changes into the mailbox.
async fn pump_changes(
    mut changes: broadcast::Receiver<AvatarChange>,
    sender: mpsc::Sender<DeskMessage>,
) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                if sender.send(DeskMessage::AvatarChanged(change)).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "desk: change pump lagged, forwards were lost");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::modules::desk::actor::{CommandReply, DeskCommand, DeskQuery, QueryResult};
    use crate::modules::desk::manager::testing::{seed_avatar, seeded_store, url};
    use crate::modules::desk::store::MemoryStore;
    use crate::modules::desk::window::{RendererBehavior, RendererMessage};

    #[tokio::test]
    async fn test_spawn_desk_renders_and_answers() {
        let display = HeadlessDisplay::new(RendererBehavior::automatic());
        let runtime = spawn_desk(seeded_store(), &display, DeskSettings::default()).unwrap();
        assert_eq!(runtime.workspace, "w1");

        let a = url("w1", "a");
        runtime.handle.wait_rendered(&a, Duration::from_secs(5)).await.unwrap();

        let reply = runtime
            .handle
            .command(DeskCommand::BringToFront { url: a.clone(), rearrange: false })
            .await
            .unwrap();
        assert_eq!(reply, CommandReply::Depth(Some(2)));

        match runtime.handle.query(DeskQuery::Avatar { url: a.clone() }).await.unwrap() {
            QueryResult::Avatar(Some(avatar)) => assert_eq!(avatar.geometry.z, 2),
            other => panic!("Expected avatar, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_changes_reach_windows_through_pump() {
        let display = HeadlessDisplay::new(RendererBehavior::automatic());
        let runtime = spawn_desk(seeded_store(), &display, DeskSettings::default()).unwrap();
        let a = url("w1", "a");
        runtime.handle.wait_rendered(&a, Duration::from_secs(5)).await.unwrap();

        runtime
            .handle
            .command(DeskCommand::SendToBack { url: a.clone() })
            .await
            .unwrap();
        // A status round-trip lets the pump deliver the change first.
        tokio::task::yield_now().await;
        runtime.handle.status().await.unwrap();

        let forwarded = display
            .messages(&a)
            .iter()
            .any(|m| matches!(m, RendererMessage::PersistentStoreForward { .. }));
        assert!(forwarded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_rendered_times_out() {
        let display = HeadlessDisplay::new(RendererBehavior::manual());
        let runtime = spawn_desk(seeded_store(), &display, DeskSettings::default()).unwrap();
        let a = url("w1", "a");

        let result = runtime.handle.wait_rendered(&a, Duration::from_millis(50)).await;
        assert_eq!(result, Err(DeskError::RenderTimeout(a)));
    }

    #[tokio::test]
    async fn test_exit_stops_actor_and_closes_store() {
        let store = seeded_store();
        let display = HeadlessDisplay::new(RendererBehavior::automatic());
        let runtime = spawn_desk(store.clone(), &display, DeskSettings::default()).unwrap();

        runtime.handle.command(DeskCommand::Exit).await.unwrap();
        runtime.actor.await.unwrap();

        assert_eq!(display.live_count(), 0);
        assert!(runtime.handle.is_closed());
        assert!(store.put_local("after-close", serde_json::json!({})).is_err());
    }

    #[tokio::test]
    async fn test_more_windows_than_mailbox_slots_start_and_exit() {
        let store = Arc::new(MemoryStore::new());
        store.insert_workspace(crate::modules::desk::state::Workspace::new("w1", "Crowded"));
        let count = CHANNEL_BUFFER_SIZE + 46;
        for i in 0..count {
            let z = i64::try_from(i).unwrap();
            let geometry = crate::modules::desk::state::Geometry { z, ..Default::default() };
            seed_avatar(&store, "w1", &format!("n{i}"), geometry);
        }
        let display = HeadlessDisplay::new(RendererBehavior::automatic());
        let runtime = spawn_desk(store, &display, DeskSettings::default()).unwrap();

        for i in 0..count {
            let note = url("w1", &format!("n{i}"));
            runtime.handle.wait_rendered(&note, Duration::from_secs(5)).await.unwrap();
        }

        runtime.handle.command(DeskCommand::Exit).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), runtime.actor)
            .await
            .expect("actor did not stop after exit")
            .unwrap();
        assert_eq!(display.live_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_refuses_to_start() {
        let display = HeadlessDisplay::new(RendererBehavior::automatic());
        let result = spawn_desk(Arc::new(MemoryStore::new()), &display, DeskSettings::default());
        assert!(matches!(result, Err(DeskError::NoWorkspace)));
    }
}
