use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Native handle to one Sonos player
///
/// Implemented by the driver that talks to the physical appliance. Every
/// call is one device round trip; the bridge never issues two at once
/// against the same handle.
#[async_trait]
pub trait Player: Send + Sync {
    /// Stable unique identifier of the player
    fn uuid(&self) -> &str;

    /// Display name, if the player reports one
    fn name(&self) -> Option<&str> {
        None
    }

    /// Set the volume (0-100)
    async fn set_volume(&self, volume: u8) -> Result<()>;

    /// Read the current volume (0-100)
    async fn volume(&self) -> Result<u8>;

    /// Set the mute state
    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Read the mute state
    async fn muted(&self) -> Result<bool>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Skip to the next track
    async fn next(&self) -> Result<()>;

    /// Skip to the previous track
    async fn previous(&self) -> Result<()>;

    /// Raw transport state as reported by the player, e.g. `"playing"`
    async fn current_state(&self) -> Result<String>;
}

/// Shared handle to a player
pub type PlayerHandle = Arc<dyn Player>;

/// Network scan yielding player handles
///
/// One call is one scan pass. Handles are sent on `found` as they show up;
/// the same player may be reported again on later passes.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn search(&self, found: mpsc::UnboundedSender<PlayerHandle>) -> Result<()>;
}
