use crate::bridge::SonosBridge;
use crate::error::{BridgeError, Result};
use crate::types::Attributes;
use tokio::sync::broadcast;

/// Notification emitted by a bridge instance
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Fresh values for one or more attributes
    Pulled(Attributes),

    /// The device handle was dropped; no further data will arrive
    Disconnected,
}

/// Receiver for one bridge's events
pub type BridgeEvents = Subscription<BridgeEvent>;

/// Receiver for bridges found by discovery
pub type DiscoveredBridges = Subscription<SonosBridge>;

/// Receiver half of a bridge notification port
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(rx: broadcast::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Receive the next notification
    ///
    /// Returns `BridgeError::ChannelError` if the bridge is gone or this
    /// receiver fell behind.
    pub async fn recv(&mut self) -> Result<T> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BridgeError::ChannelError("Bridge dropped".to_string()),
            broadcast::error::RecvError::Lagged(n) => {
                BridgeError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive a notification without blocking
    ///
    /// Returns `None` if no message is available.
    pub fn try_recv(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => {
                Err(BridgeError::ChannelError("Bridge dropped".to_string()))
            }
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(BridgeError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}
