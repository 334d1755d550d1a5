//! Sonos bridge for the home-automation framework
//!
//! A bridge adapts one Sonos player to the framework's uniform control
//! surface. It supports:
//!
//! - Discovery of players through a pluggable [`Scanner`]
//! - Connection lifecycle with periodic polling
//! - Push: volume, mute, transport mode, next/previous track
//! - Pull: volume, mute and transport mode read back as attribute updates
//! - A per-bridge command queue so only one device call is in flight
//!
//! # Quick Start
//!
//! ```no_run
//! use homestar_sonos::{Attributes, BridgeConfig, BridgeEvent, ConnectOptions, SonosBridge};
//! # use homestar_sonos::Scanner;
//! use serde_json::json;
//! # use std::sync::Arc;
//!
//! # async fn run(scanner: Arc<dyn Scanner>) -> Result<(), Box<dyn std::error::Error>> {
//! // The exemplar holds no player; it only discovers
//! let exemplar = SonosBridge::exemplar(BridgeConfig::default(), scanner);
//! let mut discovered = exemplar.subscribe_discovered();
//! exemplar.discover();
//!
//! let bridge = discovered.recv().await?;
//! println!("Found {:?}", bridge.meta());
//!
//! let mut events = bridge.subscribe();
//! bridge.connect(&ConnectOptions::default());
//!
//! let mut attributes = Attributes::new();
//! attributes.insert("volume".to_string(), json!(20));
//! let report = bridge.push(&attributes)?.wait().await?;
//! assert!(report.all_applied());
//!
//! while let Ok(BridgeEvent::Pulled(state)) = events.recv().await {
//!     println!("State update: {:?}", state);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Device**: traits for the native player driver and discovery transport
//! - **Queue**: single-flight FIFO of device calls, one per bridge
//! - **Session**: player handle ownership, lifecycle state, poll task
//! - **Bridge**: the control surface, with push and pull engines
//! - **Subscription**: event ports for pulled data and discovered bridges

mod bridge;
mod config;
mod device;
mod discovery;
mod error;
pub mod logging;
mod pull;
mod push;
mod queue;
mod session;
mod subscription;
mod types;

// Public exports
pub use bridge::{Bridge, SonosBridge};
pub use config::{BridgeConfig, ConnectOptions};
pub use device::{Player, PlayerHandle, Scanner};
pub use error::{BridgeError, Result};
pub use push::{PushCompletion, PushReport, WriteOutcome};
pub use queue::{CommandQueue, QueueItem};
pub use session::SessionState;
pub use subscription::{BridgeEvent, BridgeEvents, DiscoveredBridges, Subscription};
pub use types::{attr, Attributes, MuteState, PlaybackMode, ThingMeta, TransportState, Volume};
