use crate::device::PlayerHandle;
use crate::queue::CommandQueue;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Lifecycle state of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handle; exemplar used only to start discovery
    Unbound,
    /// Handle present
    Connected,
    /// Handle cleared; terminal
    Forgotten,
}

struct Poller {
    stop_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the native handle, the command queue and the poll task
///
/// The handle is only ever cleared, never replaced: a player that shows up
/// again gets a new session.
pub(crate) struct DeviceSession {
    player: Mutex<Option<PlayerHandle>>,
    queue: Option<CommandQueue>,
    forgotten: Mutex<bool>,
    poller: Mutex<Option<Poller>>,
}

impl DeviceSession {
    pub(crate) fn unbound() -> Self {
        Self {
            player: Mutex::new(None),
            queue: None,
            forgotten: Mutex::new(false),
            poller: Mutex::new(None),
        }
    }

    /// Session over a discovered player; spawns the queue worker
    pub(crate) fn bound(player: PlayerHandle) -> Self {
        let queue = CommandQueue::new(format!("SonosBridge:{}", player.uuid()));
        Self {
            player: Mutex::new(Some(player)),
            queue: Some(queue),
            forgotten: Mutex::new(false),
            poller: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        if self.player.lock().unwrap().is_some() {
            SessionState::Connected
        } else if *self.forgotten.lock().unwrap() {
            SessionState::Forgotten
        } else {
            SessionState::Unbound
        }
    }

    pub(crate) fn player(&self) -> Option<PlayerHandle> {
        self.player.lock().unwrap().clone()
    }

    pub(crate) fn is_reachable(&self) -> bool {
        self.player.lock().unwrap().is_some()
    }

    pub(crate) fn queue(&self) -> Option<&CommandQueue> {
        self.queue.as_ref()
    }

    /// Player and queue together, or `None` once unreachable
    pub(crate) fn channel(&self) -> Option<(PlayerHandle, &CommandQueue)> {
        Some((self.player()?, self.queue.as_ref()?))
    }

    /// Clear the handle and stop polling; returns the handle if one was held
    ///
    /// The native resource itself belongs to the discovery transport and is
    /// only released here, never torn down.
    pub(crate) fn forget(&self) -> Option<PlayerHandle> {
        let player = self.player.lock().unwrap().take()?;
        *self.forgotten.lock().unwrap() = true;
        self.stop_polling();
        Some(player)
    }

    /// Start calling `tick` every `period`, first call one period from now
    ///
    /// The task ends when `tick` returns false or `stop_polling` is called.
    /// A running poller is left as is.
    pub(crate) fn start_polling<F>(&self, period: Duration, tick: F)
    where
        F: Fn() -> bool + Send + 'static,
    {
        let mut poller = self.poller.lock().unwrap();
        if poller.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            tracing::debug!(method = "start_polling", "poller already running");
            return;
        }

        let (stop_tx, mut stop_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::debug!("Poller stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if !tick() {
                            tracing::debug!("Poller observed a cleared handle, cancelling");
                            break;
                        }
                    }
                }
            }
        });

        *poller = Some(Poller { stop_tx, handle });
    }

    pub(crate) fn stop_polling(&self) {
        if let Some(poller) = self.poller.lock().unwrap().take() {
            let _ = poller.stop_tx.send(());
        }
    }

    pub(crate) fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Ok(poller) = self.poller.get_mut() {
            if let Some(poller) = poller.take() {
                poller.handle.abort();
            }
        }
    }
}
