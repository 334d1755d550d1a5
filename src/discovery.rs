use crate::bridge::{BridgeInner, SonosBridge};
use crate::config::BridgeConfig;
use crate::device::{PlayerHandle, Scanner};
use crate::error::Result;
use crate::subscription::DiscoveredBridges;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;

const MAX_BACKOFF: Duration = Duration::from_secs(60);
const RESCAN_INTERVAL: Duration = Duration::from_secs(30);
const DISCOVERED_CAPACITY: usize = 32;

/// Discovery bookkeeping held by an exemplar bridge
pub(crate) struct DiscoveryState {
    scanner: Arc<dyn Scanner>,
    discovered_tx: broadcast::Sender<SonosBridge>,
    /// Last bridge announced per player uuid
    seen: Arc<Mutex<HashMap<String, Weak<BridgeInner>>>>,
    task: Mutex<Option<DiscoveryTask>>,
}

struct DiscoveryTask {
    stop_tx: broadcast::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl DiscoveryState {
    pub(crate) fn new(scanner: Arc<dyn Scanner>) -> Self {
        let (discovered_tx, _) = broadcast::channel(DISCOVERED_CAPACITY);
        Self {
            scanner,
            discovered_tx,
            seen: Arc::new(Mutex::new(HashMap::new())),
            task: Mutex::new(None),
        }
    }
}

impl SonosBridge {
    /// Subscribe to bridges created by [`discover`](Self::discover)
    ///
    /// Instances without discovery get a receiver that never yields.
    pub fn subscribe_discovered(&self) -> DiscoveredBridges {
        match &self.inner.discovery {
            Some(discovery) => DiscoveredBridges::new(discovery.discovered_tx.subscribe()),
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                DiscoveredBridges::new(rx)
            }
        }
    }

    /// Start the discovery task
    ///
    /// Only an exemplar can discover; on a bound instance this is a no-op.
    /// Scanning repeats until [`stop_discovery`](Self::stop_discovery),
    /// backing off after failed passes. A player is announced again only
    /// once its previous bridge was disconnected or dropped.
    pub fn discover(&self) {
        tracing::info!(method = "discover", "called");

        let Some(discovery) = &self.inner.discovery else {
            tracing::debug!(method = "discover", "not an exemplar, ignoring");
            return;
        };

        let mut task = discovery.task.lock().unwrap();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            tracing::debug!(method = "discover", "discovery already running");
            return;
        }

        let (stop_tx, _) = broadcast::channel(1);
        let announcer = Announcer {
            config: self.inner.config.clone(),
            seen: discovery.seen.clone(),
            discovered_tx: discovery.discovered_tx.clone(),
        };
        let scanner = discovery.scanner.clone();
        let task_stop_tx = stop_tx.clone();

        let handle = tokio::spawn(async move {
            let mut delay = Duration::from_secs(0);
            let mut backoff = Duration::from_secs(0);
            let mut stop_rx = task_stop_tx.subscribe();

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Discovery stopped by user");
                        break;
                    }
                    _ = async {
                        if delay > Duration::from_secs(0) {
                            sleep(delay).await;
                        }

                        match run_scan_once(scanner.as_ref(), &announcer).await {
                            Ok(found) => {
                                tracing::info!(found, "Discovery scan completed");
                                backoff = Duration::from_secs(0);
                                delay = RESCAN_INTERVAL;
                            }
                            Err(e) => {
                                tracing::error!(method = "discover", error = %e, "Discovery error");
                                // Exponential backoff: 1s, 2s, 4s, 8s, 16s, 32s, 60s (max)
                                if backoff == Duration::from_secs(0) {
                                    backoff = Duration::from_secs(1);
                                } else {
                                    backoff = (backoff * 2).min(MAX_BACKOFF);
                                }
                                tracing::info!("Rescanning in {:?}", backoff);
                                delay = backoff;
                            }
                        }
                    } => {}
                }
            }
        });

        *task = Some(DiscoveryTask { stop_tx, handle });
    }

    /// Stop the discovery task
    ///
    /// Bridges already announced are unaffected.
    pub async fn stop_discovery(&self) {
        let Some(discovery) = &self.inner.discovery else {
            return;
        };

        let task = discovery.task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.stop_tx.send(());
            // Give it a moment to stop gracefully
            let _ = tokio::time::timeout(Duration::from_millis(500), task.handle).await;
        }
    }
}

/// Turns found player handles into bridges
struct Announcer {
    config: BridgeConfig,
    seen: Arc<Mutex<HashMap<String, Weak<BridgeInner>>>>,
    discovered_tx: broadcast::Sender<SonosBridge>,
}

impl Announcer {
    /// Announce `player` unless its last bridge is still live; returns whether it was announced
    ///
    /// A player whose bridge was disconnected or dropped gets a new bridge.
    /// A player is only recorded once a subscriber took the announcement.
    fn announce(&self, player: PlayerHandle) -> bool {
        let uuid = player.uuid().to_string();
        let mut seen = self.seen.lock().unwrap();
        let live = seen
            .get(&uuid)
            .and_then(SonosBridge::upgrade)
            .is_some_and(|bridge| bridge.reachable());
        if live {
            tracing::trace!(uuid = %uuid, "Player already announced");
            return false;
        }

        tracing::info!(method = "discover", uuid = %uuid, name = ?player.name(), "Discovered player");
        let bridge = SonosBridge::new(self.config.clone(), player);
        let weak = bridge.downgrade();
        if self.discovered_tx.send(bridge).is_err() {
            tracing::warn!(uuid = %uuid, "No subscriber for discovered bridge");
            return false;
        }

        seen.insert(uuid, weak);
        true
    }
}

/// Run one scan pass, announcing players as they arrive
async fn run_scan_once(scanner: &dyn Scanner, announcer: &Announcer) -> Result<usize> {
    let (found_tx, mut found_rx) = mpsc::unbounded_channel();
    let mut found = 0;

    let result = {
        let search = scanner.search(found_tx);
        tokio::pin!(search);

        loop {
            tokio::select! {
                Some(player) = found_rx.recv() => {
                    if announcer.announce(player) {
                        found += 1;
                    }
                }
                result = &mut search => break result,
            }
        }
    };

    // Scanners may hand the sender to helpers that outlive the pass
    while let Ok(player) = found_rx.try_recv() {
        if announcer.announce(player) {
            found += 1;
        }
    }

    result.map(|_| found)
}
