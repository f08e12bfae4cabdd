//! Read half of a live connection and its ingest loop.

use std::{fmt::Debug, net::SocketAddr, sync::Arc};

use futures::{stream::SplitStream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{
    handle::ConnectionHandle,
    pool::Pool,
    spinner::Spinner,
    types::{ConnectionId, MouseEvent},
};

/// Why an ingest loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// The client sent a close frame.
    Closed,
    /// The stream ended without a close frame.
    Eof,
    /// The transport failed while reading.
    Error(String),
    /// The registry dropped the connection, e.g. after a failed broadcast
    /// send.
    Evicted,
    /// The broadcast channel is gone; nothing left to forward to.
    ChannelClosed,
}

/// A registered connection as seen by its ingest loop.
///
/// Produced by [`Pool::register`]. The write half lives in the registry,
/// this struct owns the read half.
#[derive(Debug)]
pub struct Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    pub(crate) handle: ConnectionHandle<T>,
    pub(crate) reader: SplitStream<WebSocketStream<T>>,
    pub(crate) spinner: Option<Arc<Spinner>>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    pub(crate) fn new(
        handle: ConnectionHandle<T>,
        reader: SplitStream<WebSocketStream<T>>,
    ) -> Self {
        Self {
            handle,
            reader,
            spinner: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }

    /// Returns a clone of the write half.
    pub fn handle(&self) -> ConnectionHandle<T> {
        self.handle.clone()
    }

    /// Ticks `spinner` for every accepted event.
    pub fn with_spinner(mut self, spinner: Arc<Spinner>) -> Self {
        self.spinner = Some(spinner);
        self
    }

    /// Reads frames until the client goes away, forwarding every valid
    /// mouse event verbatim into the broadcast channel.
    ///
    /// Malformed payloads are logged and skipped. When the loop ends the
    /// connection is removed from `pool` right away. The loop also ends as
    /// soon as anything else removes the connection from `pool`.
    pub async fn run(mut self, pool: Pool<T>) -> Disconnect {
        let id = self.id();
        let addr = self.addr();
        let evicted = Arc::clone(&self.handle.evicted);

        let reason = loop {
            let frame = tokio::select! {
                biased;
                _ = evicted.notified() => break Disconnect::Evicted,
                frame = self.reader.next() => frame,
            };

            let raw = match frame {
                Some(Ok(Message::Text(text))) => text.to_string(),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(e) => {
                        debug!(%id, error = %e, "dropping non utf-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) => break Disconnect::Closed,
                None => break Disconnect::Eof,
                Some(Err(e)) => {
                    warn!(%id, %addr, error = %e, "read failed");
                    break Disconnect::Error(e.to_string());
                }
            };

            if let Err(e) = MouseEvent::parse(&raw) {
                debug!(%id, error = %e, "dropping malformed mouse event");
                continue;
            }

            if let Some(spinner) = &self.spinner {
                spinner.tick();
            }

            if pool.broadcast(raw).await.is_err() {
                break Disconnect::ChannelClosed;
            }
        };

        pool.remove(id).await;
        info!(%id, %addr, reason = ?reason, "ingest loop finished");
        reason
    }
}
