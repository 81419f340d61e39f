//! Desk actor.
//!
//! The actor owns the [`DeskManager`] and processes mailbox messages one at a
//! time, so window events, store changes, timers and IPC requests never race.
//!
//! # Panic Recovery
//!
//! A panicking handler is caught and logged, and the actor moves on to the
//! next message. The desk may be partially inconsistent afterwards but keeps
//! serving.
//!
//! # Window Signals
//!
//! Window signals arrive on their own unbounded channel and are drained before
//! the mailbox. A display emits them synchronously, often hundreds at once
//! while a workspace opens or closes, and a lost `closed` or `finish-load`
//! would stall that transition for good.

mod handle;
mod messages;

use std::panic::{AssertUnwindSafe, catch_unwind};

pub use handle::{ActorError, DeskHandle};
pub use messages::{
    CommandReply, DeskCommand, DeskMessage, DeskQuery, DeskStatus, QueryResult, SwitchOutcome,
    WindowStatus,
};
use tokio::sync::mpsc;

use super::manager::DeskManager;
use super::state::AvatarUrl;
use super::window::{EventSink, WindowSignal};

/// Channel buffer size for the desk mailbox.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// The actor that owns one desk.
pub struct DeskActor {
    manager: DeskManager,
    receiver: mpsc::Receiver<DeskMessage>,
    signals: mpsc::UnboundedReceiver<DeskMessage>,
}

impl DeskActor {
    #[must_use]
    pub const fn new(
        manager: DeskManager,
        receiver: mpsc::Receiver<DeskMessage>,
        signals: mpsc::UnboundedReceiver<DeskMessage>,
    ) -> Self {
        Self { manager, receiver, signals }
    }

    /// Next message, window signals first. `None` once the mailbox is closed.
    async fn next_message(&mut self) -> Option<DeskMessage> {
        tokio::select! {
            biased;
            Some(signal) = self.signals.recv() => Some(signal),
            msg = self.receiver.recv() => msg,
        }
    }

    /// Runs the message loop until shutdown, exit or a closed mailbox.
    pub async fn run(mut self) {
        tracing::trace!("desk: actor message loop starting");

        while let Some(msg) = self.next_message().await {
            if matches!(msg, DeskMessage::Shutdown) {
                tracing::debug!("desk: actor received shutdown message");
                return;
            }

            let msg_name = msg.name();
            let result = catch_unwind(AssertUnwindSafe(|| {
                self.handle_message(msg);
            }));

            if let Err(panic_info) = result {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());

                tracing::error!("desk: PANIC in actor while handling '{msg_name}': {panic_msg}");
                tracing::error!("desk: actor recovered from panic, window state may be inconsistent");
            }

            if self.manager.ctx().exit_requested() {
                tracing::info!("desk: exit complete, stopping actor");
                return;
            }
        }

        tracing::debug!("desk: actor channel closed, exiting");
    }

    fn handle_message(&mut self, msg: DeskMessage) {
        match msg {
            DeskMessage::Window { url, signal } => self.manager.handle_signal(&url, signal),
            DeskMessage::AvatarChanged(change) => self.manager.on_avatar_changed(&change),
            DeskMessage::Timer(event) => self.manager.on_timer(event),
            DeskMessage::AllWindowsClosed => self.manager.on_all_windows_closed(),
            DeskMessage::Command { command, respond_to } => {
                let reply = self.manager.execute(command);
                if respond_to.send(reply).is_err() {
                    tracing::trace!("desk: command caller went away");
                }
            }
            DeskMessage::Query { query, respond_to } => {
                let result = self.manager.query(query);
                if respond_to.send(result).is_err() {
                    tracing::trace!("desk: query caller went away");
                }
            }
            DeskMessage::Shutdown => {}
        }
    }
}

/// Delivers window signals to the actor. Never drops a signal while the
/// actor is running.
pub struct MailboxSink {
    sender: mpsc::UnboundedSender<DeskMessage>,
}

impl MailboxSink {
    #[must_use]
    pub const fn new(sender: mpsc::UnboundedSender<DeskMessage>) -> Self { Self { sender } }
}

impl EventSink for MailboxSink {
    fn emit(&self, url: &AvatarUrl, signal: WindowSignal) {
        let msg = DeskMessage::Window { url: url.clone(), signal };
        if self.sender.send(msg).is_err() {
            tracing::trace!(%url, ?signal, "desk: window signal after actor stopped");
        }
    }
}
