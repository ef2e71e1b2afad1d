//! WebSocket connection to the backend
//!
//! The ingestor owns the socket. It reports connection status changes and
//! decoded backend frames into the runtime's ingress channel, and writes the
//! question frames the runtime hands it.

use crate::protocol::{decode_frame, OutboundFrame};
use crate::state_machine::{ConnectionStatus, Event};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Runtime stopped accepting events")]
    RuntimeGone,
}

/// When and how fast to redial after losing the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Exponential backoff: initial, 2x, 4x, ... capped at `max_delay`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}

/// How a connected session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Socket closed or failed; eligible for reconnect
    Dropped,
    /// Shutdown requested or outbound side closed
    Shutdown,
}

pub struct Ingestor {
    url: String,
    policy: ReconnectPolicy,
    event_tx: mpsc::Sender<Event>,
    outbound_rx: mpsc::Receiver<OutboundFrame>,
    cancel: CancellationToken,
}

impl Ingestor {
    pub fn new(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        event_tx: mpsc::Sender<Event>,
        outbound_rx: mpsc::Receiver<OutboundFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url: url.into(),
            policy,
            event_tx,
            outbound_rx,
            cancel,
        }
    }

    /// Connect, pump frames, and redial per the policy until shut down
    pub async fn run(mut self) -> Result<(), IngestError> {
        let mut attempt: u32 = 0;

        loop {
            self.report(ConnectionStatus::Connecting).await?;
            tracing::info!(url = %self.url, attempt, "Connecting to backend");

            let cancel = self.cancel.clone();
            let connected = tokio::select! {
                () = cancel.cancelled() => None,
                result = tokio_tungstenite::connect_async(self.url.as_str()) => Some(result),
            };

            let end = match connected {
                None => SessionEnd::Shutdown,
                Some(Ok((socket, _response))) => {
                    attempt = 0;
                    tracing::info!(url = %self.url, "Connected to backend");
                    self.report(ConnectionStatus::Connected).await?;
                    self.pump(socket).await?
                }
                Some(Err(e)) => {
                    tracing::warn!(url = %self.url, error = %e, "Connection failed");
                    SessionEnd::Dropped
                }
            };

            self.report(ConnectionStatus::Disconnected).await?;

            if end == SessionEnd::Shutdown || !self.policy.enabled {
                break;
            }

            attempt = attempt.saturating_add(1);
            let delay = self.policy.delay(attempt);
            tracing::info!(attempt, delay_ms = delay.as_millis(), "Reconnecting after backoff");
            if self.backoff(delay).await == SessionEnd::Shutdown {
                break;
            }
        }

        tracing::info!("Ingestor stopped");
        Ok(())
    }

    async fn pump<S>(&mut self, socket: S) -> Result<SessionEnd, IngestError>
    where
        S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut sink, mut stream) = socket.split();
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }

                outbound = self.outbound_rx.recv() => {
                    let Some(frame) = outbound else {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return Ok(SessionEnd::Shutdown);
                    };
                    let text = match frame.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode question");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        tracing::warn!(error = %e, "Failed to send question");
                        return Ok(SessionEnd::Dropped);
                    }
                }

                inbound = stream.next() => match inbound {
                    Some(Ok(WsMessage::Text(text))) => self.forward(&text).await?,
                    Some(Ok(WsMessage::Close(frame))) => {
                        tracing::info!(?frame, "Backend closed the connection");
                        return Ok(SessionEnd::Dropped);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket error");
                        return Ok(SessionEnd::Dropped);
                    }
                    None => return Ok(SessionEnd::Dropped),
                },
            }
        }
    }

    /// Decode one text frame and hand the event to the runtime
    async fn forward(&self, text: &str) -> Result<(), IngestError> {
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed frame");
                return Ok(());
            }
        };
        match frame.to_event() {
            Some(event) => {
                tracing::trace!(frame_type = %frame.frame_type, "Frame received");
                self.event_tx
                    .send(event)
                    .await
                    .map_err(|_| IngestError::RuntimeGone)
            }
            None => {
                tracing::debug!(frame_type = %frame.frame_type, "Ignoring unknown frame type");
                Ok(())
            }
        }
    }

    /// Wait out the backoff; questions queued meanwhile cannot be delivered
    async fn backoff(&mut self, delay: Duration) -> SessionEnd {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                () = &mut sleep => return SessionEnd::Dropped,
                () = cancel.cancelled() => return SessionEnd::Shutdown,
                outbound = self.outbound_rx.recv() => match outbound {
                    Some(_) => tracing::warn!("Dropping question sent while disconnected"),
                    None => return SessionEnd::Shutdown,
                },
            }
        }
    }

    async fn report(&self, status: ConnectionStatus) -> Result<(), IngestError> {
        self.event_tx
            .send(Event::ConnectionChanged { status })
            .await
            .map_err(|_| IngestError::RuntimeGone)
    }
}
