//! Workspace facade and its reactive store.

mod facade;
mod patch_log;
mod store;

pub use facade::Workspace;
pub use patch_log::{PatchLog, PatchLogEntry};
