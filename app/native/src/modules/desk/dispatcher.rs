//! Action dispatcher.
//!
//! Applies [`PersistentAction`]s to the store and decides, for every avatar
//! change coming back from the store, what (if anything) the owning window
//! should be told.

use std::sync::Arc;

use thiserror::Error;

use super::actions::PersistentAction;
use super::state::{Avatar, AvatarField, AvatarUrl};
use super::store::{AvatarChange, DocumentStore, Provenance, StoreError, WriteMeta};
use super::window::RendererMessage;

/// Why an action was not applied.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The action names an avatar the store does not hold.
    #[error("avatar not found: {0}")]
    NotFound(AvatarUrl),

    /// The store rejected the write.
    #[error("store write failed for {url}: {source}")]
    StoreWriteFailure {
        url: AvatarUrl,
        #[source]
        source: StoreError,
    },
}

/// What a window receives for one avatar change.
#[derive(Clone, Debug, PartialEq)]
pub enum Forward {
    /// Exactly one top-level field changed.
    Field { field: AvatarField, state: serde_json::Value },
    /// Several fields changed, or there was no previous document.
    Full(Avatar),
}

impl Forward {
    /// Computes the forward for a change, or `None` when nothing differs.
    #[must_use]
    pub fn for_change(change: &AvatarChange) -> Option<Self> {
        let Some(previous) = &change.previous else {
            return Some(Self::Full(change.next.clone()));
        };

        match previous.changed_fields(&change.next).as_slice() {
            [] => None,
            [field] => Some(Self::Field {
                field: *field,
                state: change.next.field_value(*field),
            }),
            _ => Some(Self::Full(change.next.clone())),
        }
    }

    /// Message pushed to the renderer.
    #[must_use]
    pub fn into_message(self) -> RendererMessage {
        match self {
            Self::Field { field, state } => RendererMessage::PersistentStoreForward {
                property_name: Some(field.as_str().to_string()),
                state,
            },
            Self::Full(avatar) => RendererMessage::PersistentStoreForward {
                property_name: None,
                state: serde_json::to_value(avatar).unwrap_or(serde_json::Value::Null),
            },
        }
    }
}

/// Applies actions to the store.
pub struct ActionDispatcher {
    store: Arc<dyn DocumentStore>,
}

impl ActionDispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store } }

    /// Applies an action, returning the written avatar.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown URL and
    /// [`DispatchError::StoreWriteFailure`] if the store rejects the write.
    pub fn try_apply(
        &self,
        action: &PersistentAction,
        provenance: Provenance,
    ) -> Result<Avatar, DispatchError> {
        if self.store.find_one(&action.url).is_none() {
            return Err(DispatchError::NotFound(action.url.clone()));
        }

        let patch = action.kind.reduce();
        let meta = WriteMeta::new(provenance, action.skip_forward);

        self.store.atomic_patch(&action.url, &patch, meta).map_err(|source| match source {
            // Deleted between the read and the write.
            StoreError::NotFound(url) => DispatchError::NotFound(url),
            source => DispatchError::StoreWriteFailure {
                url: action.url.clone(),
                source,
            },
        })
    }

    /// Applies an action, logging and dropping it on failure.
    pub fn apply_action(&self, action: &PersistentAction, provenance: Provenance) -> Option<Avatar> {
        match self.try_apply(action, provenance) {
            Ok(avatar) => {
                tracing::debug!(
                    url = %action.url,
                    action = action.kind.name(),
                    skip_forward = action.skip_forward,
                    "desk: action applied"
                );
                Some(avatar)
            }
            Err(err @ DispatchError::NotFound(_)) => {
                tracing::warn!(action = action.kind.name(), "desk: dropping action: {err}");
                None
            }
            Err(err @ DispatchError::StoreWriteFailure { .. }) => {
                tracing::error!(action = action.kind.name(), "desk: abandoning action: {err}");
                None
            }
        }
    }

    /// Whether `change` should reach the window of `subscriber`.
    ///
    /// Only a skip-forward write originating from that same window is held back.
    #[must_use]
    pub fn should_forward(change: &AvatarChange, subscriber: &AvatarUrl) -> bool {
        !change.meta.is_echo_for(subscriber)
    }

    /// The forward `subscriber` receives for `change`, if any.
    #[must_use]
    pub fn forward_for(change: &AvatarChange, subscriber: &AvatarUrl) -> Option<Forward> {
        if !Self::should_forward(change, subscriber) {
            tracing::trace!(url = %subscriber, revision = %change.meta.revision, "desk: self-echo suppressed");
            return None;
        }
        Forward::for_change(change)
    }
}
