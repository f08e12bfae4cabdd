mod keepalive_test;

use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio_tungstenite::{
    tungstenite::{protocol::Role, Message},
    WebSocketStream,
};

use crate::{conn::Connection, pool::Pool};

pub(crate) const TIMEOUT: Duration = Duration::from_secs(2);

/// Registers an in-memory connection and returns its client side.
pub(crate) async fn register_mock(
    pool: &Pool<DuplexStream>,
) -> (Connection<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

    let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
    let conn = pool.register(server_ws, addr).await;
    (conn, client_ws)
}

/// Next text frame seen by a client, skipping control frames.
pub(crate) async fn next_text<S>(client: &mut S) -> String
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    })
    .await
    .expect("text frame should arrive in time")
}

/// What a [`FaultyIo`] does with writes. Reads always pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Writes {
    Pass,
    /// Every write fails with a broken pipe.
    Fail,
    /// Every write stays pending forever, like a client that stopped reading.
    Stall,
}

#[derive(Debug)]
pub(crate) struct FaultyIo {
    inner: DuplexStream,
    writes: Writes,
}

impl FaultyIo {
    fn write_outcome(&self) -> Option<Poll<io::Result<()>>> {
        match self.writes {
            Writes::Pass => None,
            Writes::Fail => Some(Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "writes disabled",
            )))),
            Writes::Stall => Some(Poll::Pending),
        }
    }
}

impl AsyncRead for FaultyIo {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FaultyIo {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.write_outcome() {
            None => Pin::new(&mut self.inner).poll_write(cx, buf),
            Some(outcome) => outcome.map_ok(|()| 0),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.write_outcome() {
            None => Pin::new(&mut self.inner).poll_flush(cx),
            Some(outcome) => outcome,
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Registers a connection whose server side writes behave as `writes`.
pub(crate) async fn register_faulty(
    pool: &Pool<FaultyIo>,
    writes: Writes,
) -> (Connection<FaultyIo>, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let server_io = FaultyIo {
        inner: server_io,
        writes,
    };
    let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

    let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
    let conn = pool.register(server_ws, addr).await;
    (conn, client_ws)
}
