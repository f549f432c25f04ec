//! Wire protocol and domain types for Orbit workspace sessions.
//!
//! This crate defines the shapes exchanged between a workspace client and the
//! session server:
//!
//! ```text
//! Client --[utterance | action | sync_request]--> Server
//!                                                   |
//!                                         intent extraction + resolution
//!                                                   |
//! Client <--[status | intent_parsed | patch]------- Server
//! ```
//!
//! ## Design Principles
//!
//! 1. **Intents are evidence, patches are mutations.** An [`Intent`] says what the
//!    user asked for and references components by a fuzzy `target` string. Only a
//!    [`PatchOperation`] ever changes workspace state, and only the server emits them.
//! 2. **Ignore what you don't understand.** Every tagged union carries an `Unknown`
//!    branch so newer servers never break older clients.
//! 3. **Pure data.** Nothing here performs I/O or holds state.

pub mod component;
pub mod intents;
pub mod messages;
pub mod patch;
pub mod status;

mod lenient;

pub use component::{ComponentChanges, ComponentType, Priority, WorkspaceComponent};
pub use intents::{Intent, MovePosition, NamedPosition, PlanItem};
pub use messages::{ClientMessage, ServerMessage, UtteranceSource};
pub use patch::PatchOperation;
pub use status::{ConnectionStatus, ServerStatus};
