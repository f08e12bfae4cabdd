//! Connection registry and broadcast fan-out.
//!
//! [`Pool`] is the registry of live connections plus the producer side of
//! the broadcast channel. [`Broadcaster`] owns the only receiver of that
//! channel and pushes every payload to every registered connection,
//! evicting the ones whose send fails.
//!
//! ```rust,no_run
//! use multimouse::pool::Pool;
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (pool, broadcaster) = Pool::<TcpStream>::new(64);
//!     tokio::spawn(broadcaster.run());
//!
//!     pool.enqueue_keepalive(1_700_000_000).await.unwrap();
//! }
//! ```

use std::{
    collections::HashMap,
    fmt::Debug,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{future::join_all, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, Mutex},
    time::timeout,
};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::{
    conn::Connection,
    handle::ConnectionHandle,
    types::{keepalive_payload, ConnectionId, MultimouseError, Result},
};

/// How long a single client may take to accept a broadcast frame before it
/// is treated as dead.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared registry of all connections eligible for broadcasts.
pub type ClientRegistry<T> = Arc<Mutex<HashMap<ConnectionId, ConnectionHandle<T>>>>;

/// Registry of live connections and entry point of the broadcast channel.
///
/// Cloning a `Pool` is cheap; every clone refers to the same registry and
/// the same channel.
#[derive(Debug)]
pub struct Pool<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    pub(crate) clients: ClientRegistry<T>,
    next_id: Arc<AtomicU64>,
    sender: mpsc::Sender<String>,
}

impl<T> Clone for Pool<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            clients: Arc::clone(&self.clients),
            next_id: Arc::clone(&self.next_id),
            sender: self.sender.clone(),
        }
    }
}

impl<T> Pool<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    /// Creates an empty pool and its broadcaster.
    ///
    /// `capacity` bounds the broadcast channel. A full channel makes
    /// producers wait; nothing is ever dropped. The returned [`Broadcaster`]
    /// holds the single receiver and has to be spawned by the caller.
    pub fn new(capacity: usize) -> (Self, Broadcaster<T>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let clients: ClientRegistry<T> = Arc::new(Mutex::new(HashMap::new()));

        let pool = Self {
            clients: Arc::clone(&clients),
            next_id: Arc::new(AtomicU64::new(1)),
            sender,
        };

        let broadcaster = Broadcaster {
            clients,
            receiver,
            send_timeout: SEND_TIMEOUT,
        };

        (pool, broadcaster)
    }

    /// Registers a freshly upgraded websocket.
    ///
    /// Issues a new [`ConnectionId`], stores the write half in the registry
    /// and hands the read half back to the caller, who is expected to drive
    /// it with [`Connection::run`].
    pub async fn register(
        &self,
        websocket: WebSocketStream<T>,
        addr: SocketAddr,
    ) -> Connection<T> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (writer, reader) = websocket.split();

        let handle = ConnectionHandle::new(id, writer, addr);

        self.add(handle.clone()).await;

        Connection::new(handle, reader)
    }

    /// Adds a handle to the registry.
    pub async fn add(&self, handle: ConnectionHandle<T>) {
        let (id, addr) = (handle.id(), handle.addr());
        let total = {
            let mut clients = self.clients.lock().await;
            clients.insert(id, handle);
            clients.len()
        };
        info!(%id, %addr, clients = total, "connection registered");
    }

    /// Removes a connection from the registry.
    ///
    /// Returns `false` when the connection was not a member, which is the
    /// normal outcome when the ingest loop and the broadcaster both notice
    /// the same dead transport.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        remove_client(&self.clients, id).await
    }

    /// Number of registered connections.
    pub async fn count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Returns `true` if `id` is currently registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    /// Clones the current membership so it can be iterated without holding
    /// the registry lock.
    pub async fn snapshot(&self) -> Vec<ConnectionHandle<T>> {
        snapshot(&self.clients).await
    }

    /// Enqueues a payload for broadcast.
    ///
    /// Waits while the channel is full. Fails only if the broadcaster is
    /// gone.
    pub async fn broadcast<S>(&self, payload: S) -> Result<()>
    where
        S: Into<String>,
    {
        self.sender
            .send(payload.into())
            .await
            .map_err(|_| MultimouseError::ChannelClosed)
    }

    /// Enqueues a `"ping <unix_seconds>"` keepalive.
    pub async fn enqueue_keepalive(&self, unix_seconds: u64) -> Result<()> {
        self.broadcast(keepalive_payload(unix_seconds)).await
    }
}

/// The single consumer of the broadcast channel.
#[derive(Debug)]
pub struct Broadcaster<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    pub(crate) clients: ClientRegistry<T>,
    pub(crate) receiver: mpsc::Receiver<String>,
    send_timeout: Duration,
}

impl<T> Broadcaster<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    /// Overrides [`SEND_TIMEOUT`].
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Drains the channel, fanning every payload out in enqueue order.
    ///
    /// Returns only once every [`Pool`] clone has been dropped.
    pub async fn run(mut self) {
        while let Some(payload) = self.receiver.recv().await {
            self.fan_out(&payload).await;
        }
        debug!("broadcast channel closed, broadcaster stopping");
    }

    /// Delivers one payload to every connection registered when the round
    /// starts.
    ///
    /// Connections whose send fails or exceeds the send timeout are
    /// removed; the others still get the payload. Returns the number of
    /// successful deliveries.
    pub async fn fan_out(&self, payload: &str) -> usize {
        let recipients = snapshot(&self.clients).await;
        let limit = self.send_timeout;

        let results = join_all(recipients.iter().map(|h| async move {
            let result = match timeout(limit, h.send_text(payload)).await {
                Ok(sent) => sent,
                Err(_) => Err(MultimouseError::SendTimeout(limit)),
            };
            (h.id(), h.addr(), result)
        }))
        .await;

        let mut delivered = 0;
        for (id, addr, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(%id, %addr, error = %e, "broadcast send failed, evicting connection");
                    remove_client(&self.clients, id).await;
                }
            }
        }
        delivered
    }
}

async fn snapshot<T>(clients: &ClientRegistry<T>) -> Vec<ConnectionHandle<T>>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    let clients = clients.lock().await;
    clients.values().cloned().collect()
}

async fn remove_client<T>(clients: &ClientRegistry<T>, id: ConnectionId) -> bool
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    let (removed, total) = {
        let mut clients = clients.lock().await;
        let removed = clients.remove(&id);
        (removed, clients.len())
    };
    match removed {
        Some(handle) => {
            // Stores a permit, so a loop that is busy forwarding still sees it.
            handle.evicted.notify_one();
            info!(%id, clients = total, "connection removed");
            true
        }
        None => false,
    }
}
