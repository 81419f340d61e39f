//! Feature modules.

pub mod desk;
