//! Ordered delivery of stream events to the outbound connection.
//!
//! The publisher is the orchestrator's only view of the client: events go
//! into a bounded channel whose receiving half feeds the SSE response. When
//! the client goes away the receiver is dropped, sends start failing, and
//! the orchestrator treats that as cancellation.

use thiserror::Error;
use tokio::sync::mpsc;

use super::StreamEvent;

/// The outbound connection was closed by the client.
#[derive(Debug, Error)]
#[error("client disconnected")]
pub struct ClientDisconnected;

/// Sending half of one run's event stream.
#[derive(Clone)]
pub struct StreamPublisher {
    tx: mpsc::Sender<StreamEvent>,
}

impl StreamPublisher {
    /// Create a publisher and the receiver that feeds the response body.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Publish one event, preserving emission order.
    ///
    /// Awaits channel capacity so events are never reordered or dropped;
    /// fails only when the client side is gone.
    pub async fn publish(&self, event: StreamEvent) -> Result<(), ClientDisconnected> {
        self.tx.send(event).await.map_err(|_| ClientDisconnected)
    }

    /// Whether the client side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolve once the client side has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let (publisher, mut rx) = StreamPublisher::channel(8);

        for token in ["a", "b", "c"] {
            publisher
                .publish(StreamEvent::Token {
                    token: token.to_string(),
                })
                .await
                .unwrap();
        }
        drop(publisher);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::Token { token } = event {
                seen.push(token);
            }
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_publish_fails_after_receiver_dropped() {
        let (publisher, rx) = StreamPublisher::channel(8);
        drop(rx);

        assert!(publisher.is_closed());
        let result = publisher
            .publish(StreamEvent::Token {
                token: "late".to_string(),
            })
            .await;
        assert!(result.is_err());
    }
}
