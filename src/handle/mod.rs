//! Write half of a live connection.
//!
//! A [`ConnectionHandle`] is what the [`Pool`](crate::pool::Pool) stores and
//! what the broadcaster writes to. It is cheap to clone; all clones share the
//! same sink.

use std::{fmt::Debug, net::SocketAddr, sync::Arc};

use futures::{stream::SplitSink, SinkExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{Mutex, Notify},
};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};

use crate::types::{ConnectionId, Result};

/// Handle for sending to a WebSocket client.
#[derive(Debug)]
pub struct ConnectionHandle<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    pub(crate) id: ConnectionId,

    /// Shared sink half of the websocket stream.
    pub(crate) writer: Arc<Mutex<SplitSink<WebSocketStream<T>, Message>>>,

    pub(crate) addr: SocketAddr,

    /// Signalled once when the registry drops this connection, so its
    /// ingest loop stops too.
    pub(crate) evicted: Arc<Notify>,
}

impl<T> Clone for ConnectionHandle<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            writer: Arc::clone(&self.writer),
            addr: self.addr,
            evicted: Arc::clone(&self.evicted),
        }
    }
}

impl<T> ConnectionHandle<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    /// Returns the registry identity of this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address, used for logging.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn new(
        id: ConnectionId,
        writer: SplitSink<WebSocketStream<T>, Message>,
        addr: SocketAddr,
    ) -> Self {
        Self {
            id,
            writer: Arc::new(Mutex::new(writer)),
            addr,
            evicted: Arc::new(Notify::new()),
        }
    }

    /// Sends a text frame to the client.
    ///
    /// Best effort: an error means the transport is unusable and the caller
    /// should drop the connection from the registry.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.send(Message::text(text.to_owned())).await?;
        Ok(())
    }

    /// Sends a close frame. Removal from the registry is the caller's job.
    pub async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.send(Message::Close(None)).await?;
        Ok(())
    }
}
