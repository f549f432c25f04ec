//! Orbit Workspace Client Library
//!
//! Keeps a local copy of a collaborative workspace in sync with the session
//! server: a WebSocket session with automatic reconnect and resync, a pure patch
//! engine, and a reactive facade for UIs and the `orbit` CLI.

pub mod config;
pub mod error;
pub mod patch;
pub mod session;
pub mod workspace;

pub use error::{ClientError, ClientResult, TransportError};
pub use workspace::{PatchLog, PatchLogEntry, Workspace};
