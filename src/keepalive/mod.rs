//! Periodic keepalive broadcast.
//!
//! Browsers and proxies drop idle websockets; the client script also uses
//! the `ping` frames as a heartbeat.

use std::{
    fmt::Debug,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::pool::Pool;

/// Interval between two keepalive payloads.
pub const PING_INTERVAL: Duration = Duration::from_secs(10);

/// Seconds since the unix epoch, `0` if the clock is before it.
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Sleeps `interval`, then enqueues `"ping <unix-seconds>"`, forever.
///
/// Returns only if the broadcaster has stopped.
pub async fn run<T>(pool: Pool<T>, interval: Duration)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Debug + 'static,
{
    loop {
        tokio::time::sleep(interval).await;

        let now = unix_seconds();
        if pool.enqueue_keepalive(now).await.is_err() {
            warn!("broadcast channel closed, keepalive stopping");
            return;
        }
        debug!(timestamp = now, "keepalive enqueued");
    }
}
