//! Transport seam between the session controller and the network.
//!
//! A [`Connector`] opens a [`Connection`]: a sender for outbound text frames and
//! a receiver of [`TransportEvent`]s. The controller never touches sockets
//! directly, which lets tests drive it with in-memory connections.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::TransportError;

/// Something that happened on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A UTF-8 text frame from the server.
    Frame(String),
    /// Transport-level failure. Always followed by [`TransportEvent::Closed`].
    Error(String),
    /// The transport is gone, for whatever reason.
    Closed,
}

/// An open, bidirectional message connection.
#[derive(Debug)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Connection {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Ready state: true while the writer half still accepts frames.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        (self.outbound, self.inbound)
    }
}

/// Opens connections to a session endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &str) -> Result<Connection, TransportError>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Connection, TransportError> {
        let (ws_stream, _) = connect_async(endpoint).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (reader_done_tx, mut reader_done_rx) = oneshot::channel::<()>();

        // Writer: exits when the controller drops its sender or the reader sees
        // the socket go away. Dropping `outbound_rx` flips `is_open` to false.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            debug!("WebSocket send failed: {:?}", e);
                            break;
                        }
                    }
                    _ = &mut reader_done_rx => break,
                }
            }
            drop(outbound_rx);
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if inbound_tx
                            .send(TransportEvent::Frame(text.as_str().to_owned()))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    // Ping/pong is answered by tungstenite; binary frames aren't part of the protocol.
                    Ok(_) => {}
                    Err(e) => {
                        let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            let _ = reader_done_tx.send(());
            let _ = inbound_tx.send(TransportEvent::Closed);
        });

        Ok(Connection::new(outbound_tx, inbound_rx))
    }
}
