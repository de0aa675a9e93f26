//! Free-port search by connection probing.
//!
//! The result is advisory: another process may bind the port between the
//! probe and the backend's own bind.

use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::trace;

const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No free port among {attempts} ports starting at {start}")]
pub struct NoPortAvailable {
    pub start: u16,
    pub attempts: u16,
}

/// First port from `start` on `host` that no listener answers.
pub async fn find_available_port(
    host: &str,
    start: u16,
    attempts: u16,
) -> Result<u16, NoPortAvailable> {
    for offset in 0..attempts {
        let Some(port) = start.checked_add(offset) else {
            break;
        };
        if !is_port_in_use(host, port).await {
            return Ok(port);
        }
        trace!("Port {} is taken", port);
    }
    Err(NoPortAvailable { start, attempts })
}

/// Whether something accepts connections on `host:port`.
///
/// Refused and timed-out connections both count as free.
pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_skips_occupied_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = listener.local_addr().unwrap().port();

        let port = find_available_port("127.0.0.1", taken, 20).await.unwrap();
        assert_ne!(port, taken);
        assert!(port > taken);
    }

    #[tokio::test]
    async fn test_returned_port_refuses_connections() {
        let port = find_available_port("127.0.0.1", 42100, 50).await.unwrap();
        assert!(!is_port_in_use("127.0.0.1", port).await);
    }

    #[tokio::test]
    async fn test_all_ports_taken() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = listener.local_addr().unwrap().port();

        let err = find_available_port("127.0.0.1", taken, 1).await.unwrap_err();
        assert_eq!(
            err,
            NoPortAvailable {
                start: taken,
                attempts: 1
            }
        );
    }
}
