use crate::config::{BridgeConfig, ConnectOptions};
use crate::device::{PlayerHandle, Scanner};
use crate::discovery::DiscoveryState;
use crate::error::Result;
use crate::push::PushCompletion;
use crate::session::{DeviceSession, SessionState};
use crate::subscription::{BridgeEvent, BridgeEvents};
use crate::types::{Attributes, ThingMeta};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 100;

/// Control surface the orchestration layer drives every bridge through
pub trait Bridge {
    /// Look for things; each one found is announced as a new bridge
    fn discover(&self);

    /// Begin the lifecycle of a discovered bridge
    fn connect(&self, options: &ConnectOptions);

    /// End the lifecycle; the bridge stops producing data
    fn disconnect(&self);

    /// Write attributes to the thing
    fn push(&self, attributes: &Attributes) -> Result<PushCompletion>;

    /// Read attributes from the thing
    fn pull(&self);

    /// Metadata for the thing, `None` when unreachable
    fn meta(&self) -> Option<ThingMeta>;

    fn reachable(&self) -> bool;

    /// Name of a web configuration page, if the bridge offers one
    fn configure(&self) -> Option<String> {
        None
    }
}

/// Bridge to one Sonos player
///
/// Either an exemplar, which holds no player and is only used to start
/// discovery, or an instance bound to a discovered player. Cloning is cheap
/// and all clones share the same session.
///
/// # Example
///
/// ```no_run
/// use homestar_sonos::{Bridge, BridgeConfig, BridgeEvent, ConnectOptions, SonosBridge};
/// # use homestar_sonos::Scanner;
/// # use std::sync::Arc;
///
/// # async fn run(scanner: Arc<dyn Scanner>) -> Result<(), Box<dyn std::error::Error>> {
/// let exemplar = SonosBridge::exemplar(BridgeConfig::default(), scanner);
/// let mut discovered = exemplar.subscribe_discovered();
/// exemplar.discover();
///
/// let bridge = discovered.recv().await?;
/// let mut events = bridge.subscribe();
/// bridge.connect(&ConnectOptions::default());
///
/// while let Ok(BridgeEvent::Pulled(attributes)) = events.recv().await {
///     println!("{:?}", attributes);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SonosBridge {
    pub(crate) inner: Arc<BridgeInner>,
}

pub(crate) struct BridgeInner {
    pub(crate) config: BridgeConfig,
    pub(crate) session: DeviceSession,
    /// Last observed attribute values; informational only
    state: Mutex<Attributes>,
    events: broadcast::Sender<BridgeEvent>,
    pub(crate) discovery: Option<DiscoveryState>,
}

impl SonosBridge {
    /// Bridge bound to a player handle
    ///
    /// Spawns the command queue worker, so must be called from within a
    /// tokio runtime.
    pub fn new(config: BridgeConfig, player: PlayerHandle) -> Self {
        Self::build(config, DeviceSession::bound(player), None)
    }

    /// Handle-less bridge used to run discovery
    pub fn exemplar(config: BridgeConfig, scanner: Arc<dyn Scanner>) -> Self {
        Self::build(
            config,
            DeviceSession::unbound(),
            Some(DiscoveryState::new(scanner)),
        )
    }

    fn build(config: BridgeConfig, session: DeviceSession, discovery: Option<DiscoveryState>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(BridgeInner {
                config,
                session,
                state: Mutex::new(Attributes::new()),
                events,
                discovery,
            }),
        }
    }

    /// Subscribe to this bridge's pulled and disconnected events
    pub fn subscribe(&self) -> BridgeEvents {
        BridgeEvents::new(self.inner.events.subscribe())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// Snapshot of the last observed attribute values
    pub fn last_known_state(&self) -> Attributes {
        self.inner.state.lock().unwrap().clone()
    }

    /// Whether the poll task is running
    pub fn is_polling(&self) -> bool {
        self.inner.session.is_polling()
    }

    /// Device calls queued or in flight
    pub fn pending_operations(&self) -> usize {
        self.inner.session.queue().map_or(0, |q| q.pending())
    }

    /// Start polling (if configured) and pull right away
    ///
    /// No-op without a player handle.
    pub fn connect(&self, _options: &ConnectOptions) {
        if !self.inner.session.is_reachable() {
            return;
        }

        tracing::info!(method = "connect", poll = self.inner.config.poll, "called");
        self.setup_polling();
        self.pull();
    }

    fn setup_polling(&self) {
        let Some(period) = self.inner.config.poll_interval() else {
            return;
        };

        let weak = self.downgrade();
        self.inner.session.start_polling(period, move || {
            let Some(bridge) = SonosBridge::upgrade(&weak) else {
                return false;
            };
            if !bridge.reachable() {
                return false;
            }
            bridge.pull();
            true
        });
    }

    /// Drop the player handle and announce the loss of data
    pub fn disconnect(&self) {
        self.forget();
    }

    fn forget(&self) {
        // Held across the send so no update can follow the disconnected event
        let _state = self.inner.state.lock().unwrap();
        if self.inner.session.forget().is_none() {
            return;
        }

        tracing::info!(method = "_forget", "called");
        let _ = self.inner.events.send(BridgeEvent::Disconnected);
    }

    pub fn meta(&self) -> Option<ThingMeta> {
        let player = self.inner.session.player()?;
        Some(ThingMeta::new(player.uuid(), player.name(), self.inner.config.number))
    }

    /// True iff a player handle is held
    pub fn reachable(&self) -> bool {
        self.inner.session.is_reachable()
    }

    /// Record new attribute values and notify subscribers
    ///
    /// Dropped once the bridge has been forgotten, so nothing follows the
    /// disconnected event.
    pub(crate) fn pulled(&self, attributes: Attributes) {
        let mut state = self.inner.state.lock().unwrap();
        if !self.reachable() {
            tracing::debug!(method = "pulled", ?attributes, "bridge forgotten, dropping update");
            return;
        }

        for (key, value) in &attributes {
            state.insert(key.clone(), value.clone());
        }

        tracing::debug!(method = "pulled", ?attributes, "state");
        let _ = self.inner.events.send(BridgeEvent::Pulled(attributes));
    }

    pub(crate) fn downgrade(&self) -> Weak<BridgeInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<BridgeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

impl Bridge for SonosBridge {
    fn discover(&self) {
        SonosBridge::discover(self)
    }

    fn connect(&self, options: &ConnectOptions) {
        SonosBridge::connect(self, options)
    }

    fn disconnect(&self) {
        SonosBridge::disconnect(self)
    }

    fn push(&self, attributes: &Attributes) -> Result<PushCompletion> {
        SonosBridge::push(self, attributes)
    }

    fn pull(&self) {
        SonosBridge::pull(self)
    }

    fn meta(&self) -> Option<ThingMeta> {
        SonosBridge::meta(self)
    }

    fn reachable(&self) -> bool {
        SonosBridge::reachable(self)
    }
}

impl fmt::Debug for SonosBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid = self.inner.session.player().map(|p| p.uuid().to_string());
        f.debug_struct("SonosBridge")
            .field("uuid", &uuid)
            .field("state", &self.inner.session.state())
            .field("config", &self.inner.config)
            .finish()
    }
}
