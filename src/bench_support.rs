#![cfg(feature = "bench")]

//! Internal helpers for Criterion benchmarks.
//!
//! Builds a pool of in-memory connections backed by
//! `tokio::io::DuplexStream`, so fan-out can be measured without binding
//! real sockets. Every client side is drained by a background task, which
//! keeps the duplex buffers from filling up.

use std::net::SocketAddr;

use futures::StreamExt;
use tokio::io::DuplexStream;
use tokio_tungstenite::{tungstenite::protocol::Role, WebSocketStream};

use crate::{
    conn::Connection,
    pool::{Broadcaster, Pool},
};

/// Stream type used for in-process benchmarking.
pub type BenchStream = DuplexStream;

/// A pool seeded with mock clients and the broadcaster that serves it.
pub struct FanOutContext {
    pub pool: Pool<BenchStream>,
    pub broadcaster: Broadcaster<BenchStream>,
    // Kept so the read halves stay open.
    _connections: Vec<Connection<BenchStream>>,
}

impl FanOutContext {
    /// Creates a context populated with `client_count` clients.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn with_clients(client_count: usize) -> Self {
        let (pool, broadcaster) = Pool::new(1024);
        let mut connections = Vec::with_capacity(client_count);

        for _ in 0..client_count {
            let (server_io, client_io) = tokio::io::duplex(64 * 1024);
            let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
            let client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

            let addr: SocketAddr = "127.0.0.1:0".parse().expect("valid loopback addr");
            connections.push(pool.register(server_ws, addr).await);

            tokio::spawn(async move {
                let (_writer, mut reader) = client_ws.split();
                while let Some(Ok(_)) = reader.next().await {}
            });
        }

        Self {
            pool,
            broadcaster,
            _connections: connections,
        }
    }
}
