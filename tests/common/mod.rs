//! In-memory player and scanner used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use homestar_sonos::{BridgeError, BridgeEvent, BridgeEvents, Player, PlayerHandle, Result, Scanner, SonosBridge};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Player that records every call and can be told to fail some of them
pub struct FakePlayer {
    uuid: String,
    name: Option<String>,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    volume: Mutex<u8>,
    muted: Mutex<bool>,
    state: Mutex<String>,
}

impl FakePlayer {
    pub fn new(uuid: &str) -> Arc<Self> {
        Self::named(uuid, None)
    }

    pub fn named(uuid: &str, name: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            uuid: uuid.to_string(),
            name: name.map(str::to_string),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            volume: Mutex::new(35),
            muted: Mutex::new(false),
            state: Mutex::new("stopped".to_string()),
        })
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn set_state(&self, raw: &str) {
        *self.state.lock().unwrap() = raw.to_string();
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call(&self, operation: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(operation);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // give any overlapping call a chance to start
        tokio::time::sleep(Duration::from_millis(2)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(BridgeError::device(operation, "simulated failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Player for FakePlayer {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        self.call("setVolume").await?;
        *self.volume.lock().unwrap() = volume;
        Ok(())
    }

    async fn volume(&self) -> Result<u8> {
        self.call("getVolume").await?;
        Ok(*self.volume.lock().unwrap())
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.call("setMuted").await?;
        *self.muted.lock().unwrap() = muted;
        Ok(())
    }

    async fn muted(&self) -> Result<bool> {
        self.call("getMuted").await?;
        Ok(*self.muted.lock().unwrap())
    }

    async fn play(&self) -> Result<()> {
        self.call("play").await
    }

    async fn pause(&self) -> Result<()> {
        self.call("pause").await
    }

    async fn stop(&self) -> Result<()> {
        self.call("stop").await
    }

    async fn next(&self) -> Result<()> {
        self.call("next").await
    }

    async fn previous(&self) -> Result<()> {
        self.call("previous").await
    }

    async fn current_state(&self) -> Result<String> {
        self.call("getCurrentState").await?;
        Ok(self.state.lock().unwrap().clone())
    }
}

/// Scanner replaying scripted passes; passes beyond the script find nothing
pub struct FakeScanner {
    passes: Mutex<VecDeque<Result<Vec<PlayerHandle>>>>,
    searches: AtomicUsize,
}

impl FakeScanner {
    pub fn new(passes: Vec<Result<Vec<PlayerHandle>>>) -> Arc<Self> {
        Arc::new(Self {
            passes: Mutex::new(passes.into()),
            searches: AtomicUsize::new(0),
        })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    async fn search(&self, found: mpsc::UnboundedSender<PlayerHandle>) -> Result<()> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let pass = self.passes.lock().unwrap().pop_front();
        match pass {
            Some(Ok(players)) => {
                for player in players {
                    let _ = found.send(player);
                }
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        }
    }
}

/// Next event, failing the test if none arrives in time
pub async fn next_event(events: &mut BridgeEvents) -> BridgeEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for bridge event")
        .expect("event channel closed")
}

/// Wait until the bridge's queue has drained
pub async fn wait_idle(bridge: &SonosBridge) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while bridge.pending_operations() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("queue did not drain");
}
