//! Session lifecycle: transport, reconnect policy and the controller actor.

mod backoff;
mod controller;
mod transport;

pub use backoff::{ReconnectMode, ReconnectPolicy};
pub use controller::{SessionController, SessionListener};
pub use transport::{Connection, Connector, TransportEvent, WsConnector};
