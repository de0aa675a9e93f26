//! Event stream client for one instance.
//!
//! Holds a long-lived `GET /event` connection, decodes the body as
//! server-sent events, parses each frame's data and hands every typed event
//! to the [`EventSink`] together with the instance id.
//!
//! # Reconnection
//!
//! Whenever the stream ends (clean close, I/O error, non-2xx, connect
//! timeout), the client sleeps for a fixed delay and reconnects. It never
//! gives up on its own; only the cancellation token stops it. Cancellation
//! aborts an in-flight read or sleep immediately.

use super::protocol::{DIRECTORY_PARAM, parse_frame};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use herd_application::EventSink;
use herd_domain::{BackendEvent, Instance, InstanceId, preview};
use reqwest::header::ACCEPT;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Why one connection ended. Never escapes [`EventStreamClient::run`].
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("event endpoint returned HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("malformed event stream: {0}")]
    Framing(String),
}

impl From<EventStreamError<reqwest::Error>> for StreamError {
    fn from(err: EventStreamError<reqwest::Error>) -> Self {
        match err {
            EventStreamError::Transport(e) => StreamError::Http(e),
            other => StreamError::Framing(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStreamConfig {
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct EventStreamClient {
    http: reqwest::Client,
    instance_id: InstanceId,
    url: String,
    directory: PathBuf,
    sink: Arc<dyn EventSink>,
    config: EventStreamConfig,
}

impl EventStreamClient {
    pub fn new(
        instance: &Instance,
        sink: Arc<dyn EventSink>,
        config: EventStreamConfig,
    ) -> Result<Self, StreamError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            instance_id: instance.id.clone(),
            url: format!("{}/event", instance.base_url.trim_end_matches('/')),
            directory: instance.working_directory.clone(),
            sink,
            config,
        })
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Read, reconnecting forever, until `cancellation` fires.
    pub async fn run(self, cancellation: CancellationToken) {
        let mut connections: u64 = 0;
        loop {
            connections += 1;
            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                result = self.read_once(connections) => result,
            };

            match result {
                Ok(()) => warn!("Event stream for {} closed by backend", self.instance_id),
                Err(e) => warn!("Event stream for {} dropped: {}", self.instance_id, e),
            }

            debug!(
                "Reconnecting to {} in {:?}",
                self.instance_id, self.config.reconnect_delay
            );
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
        info!("Event stream for {} stopped", self.instance_id);
    }

    /// One connection: connect, then read frames until the body ends.
    async fn read_once(&self, connection: u64) -> Result<(), StreamError> {
        let request = self
            .http
            .get(&self.url)
            .query(&[(DIRECTORY_PARAM, self.directory.to_string_lossy())])
            .header(ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(self.config.connect_timeout, request)
            .await
            .map_err(|_| StreamError::ConnectTimeout(self.config.connect_timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status.as_u16()));
        }
        if connection == 1 {
            info!("Subscribed to events of {}", self.instance_id);
        } else {
            info!(
                "Resubscribed to events of {} (connection {})",
                self.instance_id, connection
            );
        }

        let mut frames = response.bytes_stream().eventsource();
        while let Some(frame) = frames.next().await {
            self.dispatch(&frame?.data).await;
        }
        Ok(())
    }

    async fn dispatch(&self, data: &str) {
        let Some(frame) = parse_frame(data) else {
            return;
        };
        match BackendEvent::from_frame(&frame) {
            Some(event) => {
                trace!("{} <- {}", self.instance_id, event.event_type());
                self.sink.on_event(&self.instance_id, event).await;
            }
            None => trace!(
                "Discarding untyped frame from {}: {}",
                self.instance_id,
                preview(data, 120)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herd_domain::InstanceOrigin;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    // ==================== Test Mocks ====================

    struct ChannelSink {
        tx: mpsc::UnboundedSender<(InstanceId, String)>,
    }

    #[async_trait]
    impl EventSink for ChannelSink {
        async fn on_event(&self, instance_id: &InstanceId, event: BackendEvent) {
            let _ = self
                .tx
                .send((instance_id.clone(), event.event_type().to_string()));
        }
    }

    const HEADERS: &[u8] =
        b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

    async fn accept_request(listener: &TcpListener) -> TcpStream {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let mut request = Vec::new();
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending a request");
            request.extend_from_slice(&buf[..n]);
        }
        let request = String::from_utf8_lossy(&request);
        assert!(request.starts_with("GET /event?directory="));
        assert!(request.to_ascii_lowercase().contains("accept: text/event-stream"));
        socket
    }

    fn instance(port: u16) -> Instance {
        Instance::derived(
            Instance::local_url("127.0.0.1", port),
            "/home/dev/app",
            InstanceOrigin::Discovered,
        )
    }

    #[tokio::test]
    async fn test_reconnects_after_delay_and_keeps_instance_id() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let delay = Duration::from_millis(300);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = EventStreamClient::new(
            &instance(port),
            Arc::new(ChannelSink { tx }),
            EventStreamConfig {
                reconnect_delay: delay,
                connect_timeout: Duration::from_secs(5),
            },
        )
        .unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(client.run(token.clone()));

        // First connection: a bare frame, an enveloped frame, then disconnect.
        let mut socket = accept_request(&listener).await;
        socket.write_all(HEADERS).await.unwrap();
        socket
            .write_all(b"data: {\"type\":\"server.connected\",\"properties\":{}}\n\n")
            .await
            .unwrap();
        socket
            .write_all(
                b"data: {\"directory\":\"/home/dev/app\",\"payload\":{\"type\":\"session.status\",\
                  \"properties\":{\"sessionID\":\"ses_1\",\"status\":{\"type\":\"busy\"}}}}\n\n",
            )
            .await
            .unwrap();
        socket.flush().await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.1, "server.connected");
        assert_eq!(second.1, "session.status");

        drop(socket);
        let disconnected = Instant::now();

        // Second connection arrives after roughly the fixed delay.
        let mut socket = accept_request(&listener).await;
        let waited = disconnected.elapsed();
        assert!(waited >= delay - Duration::from_millis(50), "{waited:?}");
        assert!(waited < delay + Duration::from_secs(2), "{waited:?}");

        socket.write_all(HEADERS).await.unwrap();
        socket
            .write_all(b"data: {\"type\":\"todo.updated\",\"properties\":{\"sessionID\":\"ses_1\",\"todos\":[]}}\n\n")
            .await
            .unwrap();
        socket.flush().await.unwrap();

        let third = rx.recv().await.unwrap();
        assert_eq!(third.1, "todo.updated");
        assert_eq!(third.0, first.0);
        assert_eq!(third.0.as_str(), "auto-app");

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_untyped_frames_are_discarded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = EventStreamClient::new(
            &instance(port),
            Arc::new(ChannelSink { tx }),
            EventStreamConfig::default(),
        )
        .unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(client.run(token.clone()));

        let mut socket = accept_request(&listener).await;
        socket.write_all(HEADERS).await.unwrap();
        socket
            .write_all(b": ping\n\ndata: {\"properties\":{}}\n\ndata: [1,2]\n\ndata: {\"type\":\"session.idle\",\"properties\":{\"sessionID\":\"s\"}}\n\n")
            .await
            .unwrap();
        socket.flush().await.unwrap();

        let (_, event_type) = rx.recv().await.unwrap();
        assert_eq!(event_type, "session.idle");
        assert!(rx.try_recv().is_err());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_frame_split_across_writes_with_crlf_and_event_field() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = EventStreamClient::new(
            &instance(port),
            Arc::new(ChannelSink { tx }),
            EventStreamConfig::default(),
        )
        .unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(client.run(token.clone()));

        let mut socket = accept_request(&listener).await;
        socket.write_all(HEADERS).await.unwrap();
        socket
            .write_all(b"event: message\r\nid: 7\r\ndata: {\"type\":\"session")
            .await
            .unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        socket
            .write_all(b".idle\",\"properties\":{\"sessionID\":\"s\"}}\r\n\r\n")
            .await
            .unwrap();
        socket.flush().await.unwrap();

        let (_, event_type) = rx.recv().await.unwrap();
        assert_eq!(event_type, "session.idle");

        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_during_reconnect_delay() {
        // Nothing listens on the port: every connect fails and the client
        // sits in its reconnect delay.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, _rx) = mpsc::unbounded_channel();
        let client = EventStreamClient::new(
            &instance(port),
            Arc::new(ChannelSink { tx }),
            EventStreamConfig {
                reconnect_delay: Duration::from_secs(60),
                connect_timeout: Duration::from_secs(1),
            },
        )
        .unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(client.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
