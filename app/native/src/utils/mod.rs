//! Shared utilities.

pub mod ipc_socket;
