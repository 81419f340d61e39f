//! rxdesk - a sticky-note desk where every note is its own window.
//!
//! The library provides the desk itself ([`modules::desk`]), the process that
//! serves it over a local socket, and the CLI that talks to that process.

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod modules;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::error::RxdeskError;
use crate::modules::desk::ipc::handle_ipc_request;
use crate::modules::desk::{
    DeskError, DeskSettings, HeadlessDisplay, MemoryStore, RendererBehavior, spawn_desk,
};

/// Environment variable holding the log filter.
const LOG_ENV_VAR: &str = "RXDESK_LOG";

/// Name given to the workspace created by `serve --init`.
const INITIAL_WORKSPACE_NAME: &str = "Desk";

/// Installs the global tracing subscriber, logging to stderr.
///
/// The filter comes from `RXDESK_LOG`, then the config's `logLevel`, then `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
        let level = config::get_config().log_level.as_deref().unwrap_or("info");
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Serves a desk until an `exit` request closes it.
///
/// The store snapshot is `store_path`, else the configured `storage.path`,
/// else `store.json` in the cache directory. With `init`, an empty store gets
/// one workspace so the desk can start.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, holds no workspace, or the
/// IPC socket cannot be bound.
pub fn serve(store_path: Option<PathBuf>, init: bool) -> Result<(), RxdeskError> {
    let config = config::get_config();
    match config::get_config_path() {
        Some(config_path) => tracing::info!(path = %config_path.display(), "configuration loaded"),
        None => tracing::debug!("no configuration file, using defaults"),
    }
    let path = store_path
        .or_else(|| config.storage.resolved_path())
        .unwrap_or_else(cache::default_store_path);

    let store = Arc::new(MemoryStore::open(&path)?);
    if init && store.ensure_workspace(INITIAL_WORKSPACE_NAME) {
        tracing::info!(path = %path.display(), "created initial workspace");
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;

    runtime.block_on(async move {
        let display = HeadlessDisplay::new(RendererBehavior::automatic());
        let desk = spawn_desk(store, &display, DeskSettings::from_config(config))?;

        let handle = desk.handle.clone();
        let mut server = utils::ipc_socket::start_server(move |request| {
            handle_ipc_request(&handle, request)
        })?;
        tracing::info!(workspace = %desk.workspace, store = %path.display(), "desk is serving");

        let finished = desk.actor.await;
        server.stop();

        finished.map_err(|err| RxdeskError::from(DeskError::Unavailable(err.to_string())))
    })
}
