//! TCP listener, websocket upgrade and task wiring.
//!
//! [`Server`] owns a [`Pool`] and, once serving, runs one broadcaster, one
//! keepalive emitter and one ingest loop per accepted connection.
//!
//! ```rust,no_run
//! use multimouse::server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> multimouse::Result<()> {
//!     let server = Server::new(ServerConfig {
//!         port: 8180,
//!         ..ServerConfig::default()
//!     });
//!     server.listen().await
//! }
//! ```

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};
use tracing::{info, warn};

use crate::{
    keepalive::{self, PING_INTERVAL},
    pool::{Broadcaster, Pool, SEND_TIMEOUT},
    spinner::Spinner,
    types::{MultimouseError, Result},
};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 8180;

/// Settings for a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    pub port: u16,
    /// Request path that is upgraded to a websocket. Other paths get a 404.
    pub ws_path: String,
    pub keepalive_interval: Duration,
    /// A client slower than this to take one broadcast frame is dropped.
    pub send_timeout: Duration,
    /// Capacity of the broadcast channel before producers start waiting.
    pub broadcast_capacity: usize,
    /// Tick a terminal spinner for every relayed event.
    pub spinner: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            ws_path: "/ws".to_string(),
            keepalive_interval: PING_INTERVAL,
            send_timeout: SEND_TIMEOUT,
            broadcast_capacity: 64,
            spinner: true,
        }
    }
}

impl ServerConfig {
    /// `host:port` string handed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The relay server.
pub struct Server {
    config: ServerConfig,
    pool: Pool<TcpStream>,
    broadcaster: Broadcaster<TcpStream>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let (pool, broadcaster) = Pool::new(config.broadcast_capacity);
        let broadcaster = broadcaster.with_send_timeout(config.send_timeout);
        Self {
            config,
            pool,
            broadcaster,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns a handle to the connection pool, e.g. to watch the client
    /// count.
    pub fn pool(&self) -> Pool<TcpStream> {
        self.pool.clone()
    }

    /// Binds the configured address and serves until the process exits.
    ///
    /// A bind failure is the only error this returns.
    pub async fn listen(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| MultimouseError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(%addr, path = %self.config.ws_path, "multimouse listening");
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let Server {
            config,
            pool,
            broadcaster,
        } = self;

        tokio::spawn(broadcaster.run());
        tokio::spawn(keepalive::run(pool.clone(), config.keepalive_interval));

        let spinner = config.spinner.then(|| Arc::new(Spinner::new()));
        let ws_path: Arc<str> = Arc::from(config.ws_path.as_str());

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        pool.clone(),
                        Arc::clone(&ws_path),
                        spinner.clone(),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    pool: Pool<TcpStream>,
    ws_path: Arc<str>,
    spinner: Option<Arc<Spinner>>,
) {
    let check_path = |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
        if req.uri().path() == &*ws_path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some("not found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };

    let websocket = match accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%addr, error = %e, "websocket upgrade failed");
            return;
        }
    };

    info!(%addr, "new connection");

    let mut conn = pool.register(websocket, addr).await;
    if let Some(spinner) = spinner {
        conn = conn.with_spinner(spinner);
    }
    conn.run(pool).await;
}
