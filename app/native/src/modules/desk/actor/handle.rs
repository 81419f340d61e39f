//! Handle for communicating with the desk actor.
//!
//! `DeskHandle` is a cheap, cloneable front for the mailbox. Async callers use
//! [`DeskHandle::command`] and [`DeskHandle::query`]; threads outside the
//! runtime, such as IPC connections, use the blocking variants.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::messages::{CommandReply, DeskCommand, DeskMessage, DeskQuery, DeskStatus, QueryResult};
use crate::modules::desk::error::DeskError;
use crate::modules::desk::state::AvatarUrl;
use crate::modules::desk::window::RenderStatus;

/// Error types for actor communication.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// Failed to send message to actor.
    #[error("Failed to send message to actor: channel closed")]
    SendFailed,

    /// Failed to receive response from actor.
    #[error("Failed to receive response from actor: channel closed")]
    ReceiveFailed,

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<ActorError> for DeskError {
    fn from(err: ActorError) -> Self { Self::Unavailable(err.to_string()) }
}

/// Handle for communicating with the desk actor.
#[derive(Clone)]
pub struct DeskHandle {
    sender: mpsc::Sender<DeskMessage>,
}

impl DeskHandle {
    /// Create a new handle with the given sender.
    pub(crate) const fn new(sender: mpsc::Sender<DeskMessage>) -> Self { Self { sender } }

    // ========================================================================
    // Fire-and-forget sending
    // ========================================================================

    /// Send a message to the actor without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the mailbox is full or closed.
    pub fn send(&self, msg: DeskMessage) -> Result<(), ActorError> {
        self.sender.try_send(msg).map_err(|_| ActorError::SendFailed)
    }

    /// Send a message to the actor and wait for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed.
    pub async fn send_async(&self, msg: DeskMessage) -> Result<(), ActorError> {
        self.sender.send(msg).await.map_err(|_| ActorError::SendFailed)
    }

    /// Whether the actor has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.sender.is_closed() }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Execute a command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns the command's [`DeskError`], or [`DeskError::Unavailable`] if
    /// the actor cannot be reached.
    pub async fn command(&self, command: DeskCommand) -> Result<CommandReply, DeskError> {
        let (tx, rx) = oneshot::channel();
        self.send_async(DeskMessage::Command { command, respond_to: tx }).await?;
        rx.await.map_err(|_| ActorError::ReceiveFailed)?
    }

    /// Execute a command from a thread outside the runtime.
    ///
    /// # Errors
    ///
    /// Same as [`Self::command`].
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_command(&self, command: DeskCommand) -> Result<CommandReply, DeskError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .blocking_send(DeskMessage::Command { command, respond_to: tx })
            .map_err(|_| ActorError::SendFailed)?;
        rx.blocking_recv().map_err(|_| ActorError::ReceiveFailed)?
    }

    /// Execute a query and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed, or
    /// [`ActorError::ReceiveFailed`] if the response channel is closed.
    pub async fn query(&self, query: DeskQuery) -> Result<QueryResult, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.send_async(DeskMessage::Query { query, respond_to: tx }).await?;
        rx.await.map_err(|_| ActorError::ReceiveFailed)
    }

    /// Execute a query from a thread outside the runtime.
    ///
    /// # Errors
    ///
    /// Same as [`Self::query`].
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_query(&self, query: DeskQuery) -> Result<QueryResult, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .blocking_send(DeskMessage::Query { query, respond_to: tx })
            .map_err(|_| ActorError::SendFailed)?;
        rx.blocking_recv().map_err(|_| ActorError::ReceiveFailed)
    }

    /// Execute a query with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Timeout`] if the query doesn't complete in time,
    /// or any error from [`Self::query`].
    pub async fn query_timeout(
        &self,
        query: DeskQuery,
        timeout: Duration,
    ) -> Result<QueryResult, ActorError> {
        tokio::time::timeout(timeout, self.query(query))
            .await
            .map_err(|_| ActorError::Timeout(timeout))?
    }

    // ========================================================================
    // Convenience methods
    // ========================================================================

    /// Snapshot of the desk.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the actor fails.
    pub async fn status(&self) -> Result<DeskStatus, ActorError> {
        match self.query(DeskQuery::Status).await? {
            QueryResult::Status(status) => Ok(status),
            _ => Err(ActorError::ReceiveFailed),
        }
    }

    /// Waits until the window of `url` has rendered its card.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::NotFound`] if no window is open for `url`, and
    /// [`DeskError::RenderTimeout`] if rendering fails or does not finish
    /// within `timeout`.
    pub async fn wait_rendered(&self, url: &AvatarUrl, timeout: Duration) -> Result<(), DeskError> {
        let query = DeskQuery::RenderWatch { url: url.clone() };
        let QueryResult::RenderWatch(Some(mut receiver)) = self.query(query).await? else {
            return Err(DeskError::NotFound(url.clone()));
        };

        let waited = tokio::time::timeout(
            timeout,
            receiver.wait_for(|status| *status != RenderStatus::Pending),
        )
        .await;

        match waited {
            Ok(Ok(status)) if *status == RenderStatus::Ready => Ok(()),
            Ok(Ok(_)) | Err(_) => Err(DeskError::RenderTimeout(url.clone())),
            // The window was dropped before reporting.
            Ok(Err(_)) => Err(DeskError::NotFound(url.clone())),
        }
    }
}
