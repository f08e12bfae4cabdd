#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::DuplexStream,
        time::{timeout, timeout_at, Instant},
    };

    use crate::{
        keepalive::{self, unix_seconds, PING_INTERVAL},
        pool::Pool,
        tests::{next_text, register_mock},
    };

    fn is_ping(payload: &str) -> bool {
        match payload.strip_prefix("ping ") {
            Some(secs) => !secs.is_empty() && secs.chars().all(|c| c.is_ascii_digit()),
            None => false,
        }
    }

    #[test]
    fn test_is_ping_helper() {
        assert!(is_ping("ping 1700000000"));
        assert!(!is_ping("ping "));
        assert!(!is_ping("ping -1"));
        assert!(!is_ping("pong 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_cadence_over_35_seconds() {
        let (pool, mut broadcaster) = Pool::<DuplexStream>::new(8);
        tokio::spawn(keepalive::run(pool.clone(), PING_INTERVAL));

        let deadline = Instant::now() + Duration::from_secs(35);
        let mut pings = Vec::new();
        while let Ok(Some(payload)) = timeout_at(deadline, broadcaster.receiver.recv()).await {
            pings.push(payload);
        }

        assert!(pings.len() >= 3, "got {} pings", pings.len());
        assert!(pings.iter().all(|p| is_ping(p)), "unexpected payloads: {pings:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_is_sent_before_first_interval() {
        let (pool, mut broadcaster) = Pool::<DuplexStream>::new(8);
        tokio::spawn(keepalive::run(pool.clone(), PING_INTERVAL));

        let early = timeout(Duration::from_secs(9), broadcaster.receiver.recv()).await;
        assert!(early.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_stops_when_broadcaster_is_gone() {
        let (pool, broadcaster) = Pool::<DuplexStream>::new(8);
        drop(broadcaster);

        timeout(Duration::from_secs(60), keepalive::run(pool, PING_INTERVAL))
            .await
            .expect("keepalive should return once the channel is closed");
    }

    #[tokio::test]
    async fn test_keepalive_reaches_connected_clients() {
        let (pool, broadcaster) = Pool::<DuplexStream>::new(8);
        let (_conn, mut client) = register_mock(&pool).await;

        tokio::spawn(broadcaster.run());
        tokio::spawn(keepalive::run(pool.clone(), Duration::from_millis(20)));

        let before = unix_seconds();
        let payload = next_text(&mut client).await;
        assert!(is_ping(&payload));

        let stamp: u64 = payload["ping ".len()..].parse().unwrap();
        assert!(stamp >= before);
    }
}
