//! Transport abstraction for outbound messages.
//!
//! The protocol layer never opens sockets itself. Anything that can deliver a
//! whole [`A2AMessage`] to a peer implements [`MessageTransport`]: an HTTP
//! client, a WebSocket, or an in-process channel.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::A2AMessage;

/// Delivers messages to a peer.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver `message`. Returning `Ok` means the transport accepted it, not
    /// that the peer processed it.
    async fn send(&self, message: &A2AMessage) -> ProtocolResult<()>;

    /// Release any held resources.
    ///
    /// The default implementation is a no-op.
    async fn close(&self) -> ProtocolResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: MessageTransport + ?Sized> MessageTransport for Arc<T> {
    async fn send(&self, message: &A2AMessage) -> ProtocolResult<()> {
        (**self).send(message).await
    }

    async fn close(&self) -> ProtocolResult<()> {
        (**self).close().await
    }
}

/// In-process transport backed by an unbounded tokio channel.
///
/// Used to wire agents living in the same process, and by tests to capture
/// what an agent sends.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<A2AMessage>,
}

impl ChannelTransport {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::UnboundedSender<A2AMessage>) -> Self {
        Self { tx }
    }

    /// Create a transport and the receiver that observes everything sent through it.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<A2AMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// `true` once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn send(&self, message: &A2AMessage) -> ProtocolResult<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| ProtocolError::Transport("channel receiver dropped".to_string()))
    }
}

/// Closure-backed transport; see [`transport_fn`].
pub struct FnTransport<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageTransport for FnTransport<F>
where
    F: Fn(A2AMessage) -> Fut + Send + Sync,
    Fut: Future<Output = ProtocolResult<()>> + Send + 'static,
{
    async fn send(&self, message: &A2AMessage) -> ProtocolResult<()> {
        (self.f)(message.clone()).await
    }
}

/// Wrap an async closure as a [`MessageTransport`].
pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(A2AMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProtocolResult<()>> + Send + 'static,
{
    FnTransport { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageType;

    #[tokio::test]
    async fn channel_delivers_and_reports_closed() {
        let (transport, mut rx) = ChannelTransport::pair();
        let msg = A2AMessage::new(MessageType::Heartbeat, "a1");
        transport.send(&msg).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().id(), msg.id());

        drop(rx);
        assert!(transport.is_closed());
        let err = transport.send(&msg).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Transport(_)));
    }

    #[tokio::test]
    async fn closure_transport() {
        let transport = transport_fn(|msg: A2AMessage| async move {
            if msg.sender_id() == "blocked" {
                Err(ProtocolError::Transport("refused".to_string()))
            } else {
                Ok(())
            }
        });
        assert!(transport
            .send(&A2AMessage::new(MessageType::Heartbeat, "a1"))
            .await
            .is_ok());
        assert!(transport
            .send(&A2AMessage::new(MessageType::Heartbeat, "blocked"))
            .await
            .is_err());
    }
}
