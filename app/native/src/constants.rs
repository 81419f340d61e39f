//! Application-wide constants.

/// Application identifier, used for cache and data directories.
pub const APP_ID: &str = "rxdesk";

/// Scheme prefix of every avatar URL.
pub const AVATAR_URL_SCHEME: &str = "rxdesktop://";

/// Host segment of locally authored avatars.
pub const LOCAL_HOST: &str = "local";

/// Page loaded into every avatar window before the card is rendered.
pub const INDEX_URL: &str = "rxdesk://app/index.html";

/// Key of the local document holding the active workspace.
pub const CURRENT_WORKSPACE_KEY: &str = "currentWorkspace";

/// Schema version written with new documents.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Quiet period before a burst of native resizes becomes one store write.
pub const DEFAULT_RESIZE_DEBOUNCE_MS: u64 = 1000;

/// How long a window may stay in the rendering phase.
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 10_000;

/// Smallest size a card window can be given.
pub const MINIMUM_WINDOW_WIDTH: i32 = 185;
pub const MINIMUM_WINDOW_HEIGHT: i32 = 80;

/// Default avatar geometry.
pub const DEFAULT_AVATAR_X: i32 = 70;
pub const DEFAULT_AVATAR_Y: i32 = 70;
pub const DEFAULT_AVATAR_WIDTH: i32 = 300;
pub const DEFAULT_AVATAR_HEIGHT: i32 = 300;

/// Default card background color.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffa0";
