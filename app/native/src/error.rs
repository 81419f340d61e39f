//! Error types for rxdesk.
//!
//! `RxdeskError` is what the CLI and the serving process report. Desk errors
//! keep their own kind so IPC clients can tell them apart.

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::modules::desk::DeskError;
use crate::modules::desk::store::StoreError;
use crate::utils::ipc_socket::IpcError;

/// Errors that can occur during application execution.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum RxdeskError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// The running desk rejected a request.
    #[error("{0}")]
    Rejected(String),
    /// A desk operation failed.
    #[error("Desk error: {0}")]
    DeskError(DeskError),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Document store error.
    #[error("Store error: {0}")]
    StoreError(String),
    /// IPC communication error.
    #[error("IPC error: {0}")]
    IpcError(String),
    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<DeskError> for RxdeskError {
    fn from(err: DeskError) -> Self { Self::DeskError(err) }
}

impl From<ConfigError> for RxdeskError {
    fn from(err: ConfigError) -> Self { Self::ConfigError(err.to_string()) }
}

impl From<StoreError> for RxdeskError {
    fn from(err: StoreError) -> Self { Self::StoreError(err.to_string()) }
}

impl From<IpcError> for RxdeskError {
    fn from(err: IpcError) -> Self { Self::IpcError(err.to_string()) }
}

impl From<std::io::Error> for RxdeskError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err.to_string()) }
}

impl From<serde_json::Error> for RxdeskError {
    fn from(err: serde_json::Error) -> Self { Self::InvalidArguments(err.to_string()) }
}
