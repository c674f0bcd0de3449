//! Transport seam between the session and the websocket layer.
//!
//! The session sees paired tx/rx halves behind traits so tests can inject an
//! in-memory transport. Message boundaries are the websocket layer's: each
//! call to [`TransportRx::next_message`] yields one complete inbound message
//! even when it spanned several underlying reads.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Io(String),
}

/// Write half. Each `send` writes one encoded frame as a single message, so
/// concurrent writers can never interleave mid-frame.
#[async_trait]
pub trait TransportTx: Send {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Close the transport, tolerating a remote that is already gone.
    async fn close(&mut self);
}

/// Read half.
#[async_trait]
pub trait TransportRx: Send {
    /// Next complete binary message; `None` once the remote has closed.
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Opens a transport to a gateway chat endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn TransportTx>, Box<dyn TransportRx>), TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket connector used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

struct WsTx {
    sink: SplitSink<WsStream, Message>,
}

struct WsRx {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn TransportTx>, Box<dyn TransportRx>), TransportError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = ws.split();
        Ok((Box::new(WsTx { sink }), Box::new(WsRx { stream })))
    }
}

#[async_trait]
impl TransportTx for WsTx {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.sink
            .send(Message::Binary(frame.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        // The remote may have closed first; nothing actionable on error.
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

#[async_trait]
impl TransportRx for WsRx {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Ping/pong and text frames carry no protocol payload.
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }
}
