//! Discover a player, print its metadata, push a volume and print state
//!
//! There is no network driver in this crate, so the demo scans a single
//! in-memory player. Run with `HOMESTAR_SONOS_LOG=debug` to see the queue.

use async_trait::async_trait;
use homestar_sonos::logging::{init_logging, LoggingMode};
use homestar_sonos::{
    Attributes, BridgeConfig, BridgeEvent, ConnectOptions, Player, PlayerHandle, Result, Scanner,
    SonosBridge,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

struct LoopbackPlayer {
    volume: Mutex<u8>,
    muted: Mutex<bool>,
    state: Mutex<&'static str>,
}

#[async_trait]
impl Player for LoopbackPlayer {
    fn uuid(&self) -> &str {
        "RINCON_LOOPBACK01400"
    }

    fn name(&self) -> Option<&str> {
        Some("Loopback")
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        *self.volume.lock().unwrap() = volume;
        Ok(())
    }

    async fn volume(&self) -> Result<u8> {
        Ok(*self.volume.lock().unwrap())
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        *self.muted.lock().unwrap() = muted;
        Ok(())
    }

    async fn muted(&self) -> Result<bool> {
        Ok(*self.muted.lock().unwrap())
    }

    async fn play(&self) -> Result<()> {
        *self.state.lock().unwrap() = "playing";
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        *self.state.lock().unwrap() = "paused_playback";
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.state.lock().unwrap() = "stopped";
        Ok(())
    }

    async fn next(&self) -> Result<()> {
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        Ok(())
    }

    async fn current_state(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().to_string())
    }
}

struct LoopbackScanner;

#[async_trait]
impl Scanner for LoopbackScanner {
    async fn search(&self, found: mpsc::UnboundedSender<PlayerHandle>) -> Result<()> {
        let player = Arc::new(LoopbackPlayer {
            volume: Mutex::new(35),
            muted: Mutex::new(false),
            state: Mutex::new("stopped"),
        });
        let _ = found.send(player);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingMode::Development)?;

    let config = BridgeConfig::merged(&json!({ "poll": 2 }), &serde_json::Value::Null)?;
    let exemplar = SonosBridge::exemplar(config, Arc::new(LoopbackScanner));
    let mut discovered = exemplar.subscribe_discovered();
    exemplar.discover();

    let bridge = discovered.recv().await?;
    println!("+ discovered\n  {}", serde_json::to_string_pretty(&bridge.meta())?);

    let mut events = bridge.subscribe();
    bridge.connect(&ConnectOptions::default());

    let mut attributes = Attributes::new();
    attributes.insert("volume".to_string(), json!(20));
    attributes.insert("mode".to_string(), json!("play"));
    let report = bridge.push(&attributes)?.wait().await?;
    println!("+ pushed {:?}", report);

    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event? {
                BridgeEvent::Pulled(state) => println!("+ state {}", serde_json::Value::Object(state)),
                BridgeEvent::Disconnected => println!("+ disconnected"),
            },
        }
    }

    bridge.disconnect();
    exemplar.stop_discovery().await;
    Ok(())
}
