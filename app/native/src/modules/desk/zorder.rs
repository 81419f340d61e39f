//! Z-order arbitration.
//!
//! Stacking keys only grow outwards: bringing an avatar forward allocates
//! `max + 1`, sending it back allocates `min - 1`. Keys are never renumbered,
//! so duplicates are possible and sorting is stable. A key that would pass
//! `i64::MAX` or `i64::MIN` stays at the limit and ties with the avatar
//! already there; this is logged as a warning.

use super::actions::PersistentAction;
use super::focus::FocusGuard;
use super::manager::DeskManager;
use super::state::{Avatar, AvatarUrl};
use super::store::Provenance;

/// Largest stacking key among `avatars`.
fn max_z(avatars: &[Avatar]) -> Option<i64> { avatars.iter().map(|a| a.geometry.z).max() }

/// Smallest stacking key among `avatars`.
fn min_z(avatars: &[Avatar]) -> Option<i64> { avatars.iter().map(|a| a.geometry.z).min() }

fn current_z(avatars: &[Avatar], url: &AvatarUrl) -> Option<i64> {
    avatars.iter().find(|avatar| &avatar.url == url).map(|avatar| avatar.geometry.z)
}

/// Key one `step` past `edge`, clamped to the `i64` range.
fn next_key(edge: i64, step: i64, url: &AvatarUrl) -> i64 {
    edge.checked_add(step).unwrap_or_else(|| {
        tracing::warn!(%url, z = edge, "desk: stacking keys exhausted, key ties with another avatar");
        edge
    })
}

/// URLs ordered back to front, with `target` moved to the given end.
fn restack_order(mut avatars: Vec<Avatar>, target: &AvatarUrl, to_front: bool) -> Vec<AvatarUrl> {
    avatars.sort_by_key(|avatar| avatar.geometry.z);
    let mut urls: Vec<_> =
        avatars.into_iter().map(|avatar| avatar.url).filter(|url| url != target).collect();
    if to_front {
        urls.push(target.clone());
    } else {
        urls.insert(0, target.clone());
    }
    urls
}

impl DeskManager {
    /// Avatars sharing a workspace with `url`.
    fn stack_of(&self, url: &AvatarUrl) -> Vec<Avatar> {
        let workspace = url.workspace_id();
        let Some(workspace) = self.store.find_workspace(workspace) else {
            return Vec::new();
        };
        self.store.find_avatars(&workspace.avatars)
    }

    /// Moves an avatar in front of every other avatar of its workspace.
    ///
    /// With `rearrange`, live windows are also raised back to front so the
    /// native stack matches the stored order. Returns the new stacking key, the
    /// unchanged key when the avatar is alone, or `None` for an unknown URL.
    pub fn bring_to_front(&mut self, url: &AvatarUrl, rearrange: bool) -> Option<i64> {
        let avatars = self.stack_of(url);
        let Some(current) = current_z(&avatars, url) else {
            tracing::warn!(%url, "desk: bring-to-front for unknown avatar");
            return None;
        };
        if avatars.len() == 1 {
            return Some(current);
        }

        let z = next_key(max_z(&avatars)?, 1, url);
        self.dispatcher
            .apply_action(&PersistentAction::depth(url.clone(), z, false), Provenance::Manager)?;
        tracing::debug!(%url, z, rearrange, "desk: brought to front");

        if rearrange {
            for member in restack_order(avatars, url, true) {
                let Some(window) = self.registry.get_mut(&member) else {
                    continue;
                };
                if !window.native().is_destroyed() {
                    window.native_mut().raise();
                }
            }
        }
        Some(z)
    }

    /// Moves an avatar behind every other avatar of its workspace.
    ///
    /// Live windows are refocused back to front so the native stack follows;
    /// each one swallows the focus event this produces. Returns the new
    /// stacking key, the unchanged key when the avatar is alone, or `None` for
    /// an unknown URL.
    pub fn send_to_back(&mut self, url: &AvatarUrl) -> Option<i64> {
        let avatars = self.stack_of(url);
        let Some(current) = current_z(&avatars, url) else {
            tracing::warn!(%url, "desk: send-to-back for unknown avatar");
            return None;
        };
        if avatars.len() == 1 {
            return Some(current);
        }

        let z = next_key(min_z(&avatars)?, -1, url);
        self.dispatcher
            .apply_action(&PersistentAction::depth(url.clone(), z, false), Provenance::Manager)?;
        tracing::debug!(%url, z, "desk: sent to back");

        for member in restack_order(avatars, url, false) {
            let Some(window) = self.registry.get_mut(&member) else {
                continue;
            };
            if window.native().is_destroyed() {
                continue;
            }
            // A focused window gets no focus event, so it must not be armed.
            if !window.native().is_focused() {
                *window.focus_guard_mut() = FocusGuard::SuppressFocusOnce;
            }
            window.native_mut().focus();
        }
        Some(z)
    }
}
