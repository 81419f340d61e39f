//! Avatar URLs.
//!
//! An avatar URL is the primary key of an avatar document and encodes the
//! workspace, the card and the instance of that card on the desk:
//!
//! ```text
//! rxdesktop://<host>/ws/<workspaceId>/<cardId>/<instance>
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{AVATAR_URL_SCHEME, LOCAL_HOST};

/// Errors returned when parsing an avatar URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// The URL does not start with the avatar scheme.
    #[error("avatar url must start with {AVATAR_URL_SCHEME}: {0}")]
    Scheme(String),

    /// The URL path is not `<host>/ws/<workspaceId>/<cardId>/<instance>`.
    #[error("malformed avatar url: {0}")]
    Malformed(String),
}

/// Validated avatar URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AvatarUrl(String);

impl AvatarUrl {
    /// Parses and validates an avatar URL.
    ///
    /// # Errors
    ///
    /// Returns [`UrlError`] if the scheme is wrong or a path segment is missing.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let Some(rest) = raw.strip_prefix(AVATAR_URL_SCHEME) else {
            return Err(UrlError::Scheme(raw.to_string()));
        };

        let segments: Vec<&str> = rest.split('/').collect();
        let well_formed = segments.len() == 5
            && segments[1] == "ws"
            && segments.iter().all(|segment| !segment.is_empty());
        if !well_formed {
            return Err(UrlError::Malformed(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    /// Builds a local avatar URL from its parts.
    #[must_use]
    pub fn local(workspace_id: &str, card_id: &str, instance: &str) -> Self {
        Self(format!("{AVATAR_URL_SCHEME}{LOCAL_HOST}/ws/{workspace_id}/{card_id}/{instance}"))
    }

    /// Returns the raw URL string.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    fn segment(&self, index: usize) -> &str {
        self.0
            .strip_prefix(AVATAR_URL_SCHEME)
            .and_then(|rest| rest.split('/').nth(index))
            .unwrap_or_default()
    }

    /// Host segment, `local` for locally authored avatars.
    #[must_use]
    pub fn host(&self) -> &str { self.segment(0) }

    /// Id of the workspace the avatar belongs to.
    #[must_use]
    pub fn workspace_id(&self) -> &str { self.segment(2) }

    /// Id of the card this avatar presents.
    #[must_use]
    pub fn card_id(&self) -> &str { self.segment(3) }

    /// Instance tag distinguishing several avatars of one card.
    #[must_use]
    pub fn instance(&self) -> &str { self.segment(4) }
}

impl fmt::Display for AvatarUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for AvatarUrl {
    type Error = UrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<AvatarUrl> for String {
    fn from(url: AvatarUrl) -> Self { url.0 }
}

impl std::str::FromStr for AvatarUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}
