use crate::bridge::SonosBridge;
use crate::device::Player;
use crate::error::Result;
use crate::queue::QueueItem;
use crate::types::{attr, Attributes, TransportState};
use serde_json::{json, Value};

/// One read issued by a pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Read {
    Volume,
    Mute,
    State,
}

impl Read {
    const ALL: [Read; 3] = [Read::Volume, Read::Mute, Read::State];

    fn id(&self) -> &'static str {
        match self {
            Read::Volume => "pull:getVolume",
            Read::Mute => "pull:getMuted",
            Read::State => "pull:getCurrentState",
        }
    }

    /// Issue the read; `Ok(None)` means nothing worth reporting came back
    async fn run(&self, player: &dyn Player) -> Result<Option<(&'static str, Value)>> {
        match self {
            Read::Volume => {
                let volume = player.volume().await?;
                Ok(Some((attr::VOLUME, json!(volume))))
            }
            Read::Mute => {
                let muted = player.muted().await?;
                Ok(Some((attr::MUTE, json!(muted))))
            }
            Read::State => {
                let raw = player.current_state().await?;
                match TransportState::from_raw(&raw).mode() {
                    Some(mode) => Ok(Some((attr::MODE, json!(mode.as_str())))),
                    None => {
                        tracing::debug!(method = "pull", state = %raw, "transport state not mapped");
                        Ok(None)
                    }
                }
            }
        }
    }
}

impl SonosBridge {
    /// Queue a read of volume, mute and transport state
    ///
    /// Each read is its own queue item and reports on its own. A failed
    /// read is logged and produces no event.
    pub fn pull(&self) {
        let Some((player, queue)) = self.inner.session.channel() else {
            return;
        };

        tracing::debug!(method = "pull", "called");

        for read in Read::ALL {
            let bridge = self.clone();
            let player = player.clone();
            let item = QueueItem::new(read.id(), async move {
                match read.run(player.as_ref()).await {
                    Ok(Some((key, value))) => {
                        let mut attributes = Attributes::new();
                        attributes.insert(key.to_string(), value);
                        bridge.pulled(attributes);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(method = "pull", read = read.id(), error = %e, "read failed");
                    }
                }
            });

            if let Err(e) = queue.add(item) {
                tracing::error!(method = "pull", queue = queue.name(), read = read.id(), error = %e, "could not queue read");
                return;
            }
        }
    }
}
