//! Upstream log relay.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use spacehub_state::{AppStatus, SpaceApp};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{LogRelayError, LogRelayResult};

/// Which of an app's logs to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Build,
    Service,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogKind::Build => "build",
            LogKind::Service => "service",
        })
    }
}

impl LogKind {
    /// Upstream URL of this log, once the app has reached the phase that
    /// produces it. The build log exists from `Building` on; the service
    /// log only while `Serving`.
    pub fn source_url<'a>(&self, app: &'a SpaceApp) -> LogRelayResult<&'a str> {
        let not_ready = || LogRelayError::NotReady {
            kind: *self,
            status: app.status,
        };
        match self {
            LogKind::Build => {
                if app.status == AppStatus::Init {
                    return Err(not_ready());
                }
                app.build_log_url.as_deref().ok_or_else(not_ready)
            }
            LogKind::Service => {
                if app.status != AppStatus::Serving {
                    return Err(not_ready());
                }
                app.app_log_url.as_deref().ok_or_else(not_ready)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRelayConfig {
    /// Bearer token presented to the log source.
    pub token: String,
    pub connect_timeout_secs: u64,
    /// End the relay when the source sends nothing for this long. 0 disables.
    pub idle_timeout_secs: u64,
}

impl Default for LogRelayConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            connect_timeout_secs: 10,
            idle_timeout_secs: 0,
        }
    }
}

pub struct LogRelay {
    client: Client,
    token: String,
    idle_timeout: Option<Duration>,
}

impl LogRelay {
    pub fn new(config: LogRelayConfig) -> LogRelayResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| LogRelayError::Config(e.to_string()))?;
        Ok(Self {
            client,
            token: config.token,
            idle_timeout: (config.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(config.idle_timeout_secs)),
        })
    }

    /// Follow one of `app`'s logs.
    pub async fn open(&self, app: &SpaceApp, kind: LogKind) -> LogRelayResult<LogStream> {
        let url = kind.source_url(app)?;
        debug!(space_id = app.space_id(), %kind, "opening log source");
        self.open_url(url).await
    }

    /// Follow the chunked response at `url`.
    pub async fn open_url(&self, url: &str) -> LogRelayResult<LogStream> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| LogRelayError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "log source refused");
            return Err(LogRelayError::UpstreamStatus(status.as_u16()));
        }

        let upstream = response.bytes_stream();
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(forward(upstream, tx, self.idle_timeout));
        Ok(LogStream { rx })
    }
}

async fn forward<S>(
    upstream: S,
    tx: mpsc::Sender<LogRelayResult<Bytes>>,
    idle_timeout: Option<Duration>,
) where
    S: Stream<Item = reqwest::Result<Bytes>> + Send,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut chunks = 0u64;
    loop {
        let next = async {
            match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, upstream.next())
                    .await
                    .map_err(|_| LogRelayError::Idle(limit.as_secs())),
                None => Ok(upstream.next().await),
            }
        };
        let item = tokio::select! {
            _ = tx.closed() => {
                debug!(chunks, "log subscriber went away");
                return;
            }
            item = next => item,
        };

        let chunk = match item {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(None) => {
                debug!(chunks, "log source closed");
                return;
            }
            Ok(Some(Err(e))) => {
                let _ = tx.send(Err(LogRelayError::Interrupted(e.to_string()))).await;
                return;
            }
            Err(idle) => {
                let _ = tx.send(Err(idle)).await;
                return;
            }
        };
        if tx.send(Ok(chunk)).await.is_err() {
            return;
        }
        chunks += 1;
    }
}

/// Chunks relayed from a log source, in source order.
///
/// Dropping the stream cancels the relay and closes the upstream request.
pub struct LogStream {
    rx: mpsc::Receiver<LogRelayResult<Bytes>>,
}

impl Stream for LogStream {
    type Item = LogRelayResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
