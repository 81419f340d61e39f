//! Live avatar windows keyed by URL.
//!
//! At most one window exists per avatar URL. A window leaves the registry when
//! its native `closed` event is handled.

use std::collections::HashMap;

use super::AvatarWindow;
use crate::modules::desk::state::AvatarUrl;

#[derive(Default)]
pub struct WindowRegistry {
    windows: HashMap<AvatarUrl, AvatarWindow>,
}

impl WindowRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Registers a window. Returns it back if one already exists for its URL.
    ///
    /// # Errors
    ///
    /// Returns the rejected window when the URL is already registered.
    pub fn insert(&mut self, window: AvatarWindow) -> Result<(), AvatarWindow> {
        if self.windows.contains_key(window.url()) {
            return Err(window);
        }
        self.windows.insert(window.url().clone(), window);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, url: &AvatarUrl) -> bool { self.windows.contains_key(url) }

    #[must_use]
    pub fn get(&self, url: &AvatarUrl) -> Option<&AvatarWindow> { self.windows.get(url) }

    pub fn get_mut(&mut self, url: &AvatarUrl) -> Option<&mut AvatarWindow> { self.windows.get_mut(url) }

    pub fn remove(&mut self, url: &AvatarUrl) -> Option<AvatarWindow> { self.windows.remove(url) }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    #[must_use]
    pub fn len(&self) -> usize { self.windows.len() }

    /// Registered URLs in sorted order.
    #[must_use]
    pub fn urls(&self) -> Vec<AvatarUrl> {
        let mut urls: Vec<_> = self.windows.keys().cloned().collect();
        urls.sort();
        urls
    }

    pub fn iter(&self) -> impl Iterator<Item = &AvatarWindow> { self.windows.values() }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AvatarWindow> { self.windows.values_mut() }

    /// URL of the window holding native focus.
    #[must_use]
    pub fn focused(&self) -> Option<AvatarUrl> {
        self.windows
            .values()
            .find(|window| window.native().is_focused())
            .map(|window| window.url().clone())
    }
}
