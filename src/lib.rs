//! # multimouse
//!
//! A websocket relay for shared cursors. Every client sends small JSON
//! position events and the server rebroadcasts each one, verbatim, to every
//! connected client.
//!
//! ## Pieces
//!
//! - [`pool::Pool`]: registry of live connections and producer side of the
//!   broadcast channel.
//! - [`pool::Broadcaster`]: single consumer of that channel, fans each
//!   payload out and evicts connections whose send fails.
//! - [`conn::Connection::run`]: per-connection ingest loop.
//! - [`keepalive::run`]: enqueues `ping <unix-seconds>` every 10 seconds.
//! - [`server::Server`]: accepts TCP connections and upgrades them.
//!
//! ## Wire format
//!
//! Client to server, as a text frame:
//!
//! ```json
//! { "clientId": 1, "x": 10.5, "y": 20.25 }
//! ```
//!
//! Server to client: either one of those payloads exactly as some client
//! sent it, or `ping 1700000000`.

#[cfg(feature = "bench")]
pub mod bench_support;
pub mod conn;
pub mod handle;
pub mod keepalive;
pub mod pool;
pub mod server;
pub mod spinner;
pub mod types;

#[cfg(test)]
mod tests;

pub use conn::{Connection, Disconnect};
pub use handle::ConnectionHandle;
pub use pool::{Broadcaster, ClientRegistry, Pool};
pub use server::{Server, ServerConfig};
pub use types::{ConnectionId, MouseEvent, MultimouseError, Result};
