use crate::bridge::SonosBridge;
use crate::device::{Player, PlayerHandle};
use crate::error::{BridgeError, Result};
use crate::queue::{CommandQueue, QueueItem};
use crate::types::{attr, Attributes, PlaybackMode, Volume};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Keys in the order their writes are queued
const DISPATCH_ORDER: [&str; 5] = [attr::MUTE, attr::VOLUME, attr::NEXT, attr::PREVIOUS, attr::MODE];

/// Larger than any count a batch can decrement back to zero from
const ABANDONED: usize = usize::MAX / 2;

/// Result of one write within a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The device accepted the write
    Applied,
    /// The device reported an error; the value was not echoed
    Failed(String),
}

/// Per-attribute outcome of a completed push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    outcomes: BTreeMap<String, WriteOutcome>,
}

impl PushReport {
    pub fn outcome(&self, attribute: &str) -> Option<&WriteOutcome> {
        self.outcomes.get(attribute)
    }

    /// Number of device writes the push issued
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Attributes whose write failed at the device
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(key, outcome)| match outcome {
            WriteOutcome::Failed(detail) => Some((key.as_str(), detail.as_str())),
            WriteOutcome::Applied => None,
        })
    }

    pub fn all_applied(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Resolves once every write of a push has finished
pub struct PushCompletion {
    rx: oneshot::Receiver<PushReport>,
}

impl PushCompletion {
    pub async fn wait(self) -> Result<PushReport> {
        self.rx
            .await
            .map_err(|_| BridgeError::ChannelError("Push batch dropped".to_string()))
    }
}

/// Pending-count bookkeeping for one push
///
/// The count starts at one for the dispatch phase and goes up by one per
/// queued write. The batch completes when it drops back to zero.
struct Batch {
    pending: AtomicUsize,
    report: Mutex<PushReport>,
    done: Mutex<Option<oneshot::Sender<PushReport>>>,
}

impl Batch {
    fn new() -> (Arc<Self>, PushCompletion) {
        let (tx, rx) = oneshot::channel();
        let batch = Arc::new(Self {
            pending: AtomicUsize::new(1),
            report: Mutex::new(PushReport::default()),
            done: Mutex::new(Some(tx)),
        });
        (batch, PushCompletion { rx })
    }

    fn begin_write(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn record(&self, attribute: &str, outcome: WriteOutcome) {
        self.report
            .lock()
            .unwrap()
            .outcomes
            .insert(attribute.to_string(), outcome);
    }

    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            let report = std::mem::take(&mut *self.report.lock().unwrap());
            if let Some(tx) = self.done.lock().unwrap().take() {
                let _ = tx.send(report);
            }
        }
    }

    /// Give up on the batch; writes already queued still run
    fn abandon(&self) {
        self.pending.store(ABANDONED, Ordering::SeqCst);
        self.done.lock().unwrap().take();
    }
}

/// One device write derived from a pushed attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Mute(bool),
    Volume(Volume),
    Next,
    Previous,
    Mode(PlaybackMode),
}

impl Write {
    /// Translate one pushed attribute; `Ok(None)` means nothing to do
    fn from_attribute(key: &str, value: &Value) -> Result<Option<Self>> {
        match key {
            attr::MUTE => value
                .as_bool()
                .map(|muted| Some(Write::Mute(muted)))
                .ok_or_else(|| BridgeError::invalid(key, "expected a boolean")),
            attr::VOLUME => {
                let level = value
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| BridgeError::invalid(key, "expected a number"))?;
                Ok(Some(Write::Volume(level.round().clamp(0.0, 100.0) as Volume)))
            }
            attr::NEXT => Ok(fires(value).then_some(Write::Next)),
            attr::PREVIOUS => Ok(fires(value).then_some(Write::Previous)),
            attr::MODE => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| BridgeError::invalid(key, "expected a string"))?;
                let mode = PlaybackMode::from_attribute(raw);
                if mode.is_none() {
                    tracing::debug!(method = "push", mode = raw, "unrecognized mode ignored");
                }
                Ok(mode.map(Write::Mode))
            }
            _ => Ok(None),
        }
    }

    fn attribute(&self) -> &'static str {
        match self {
            Write::Mute(_) => attr::MUTE,
            Write::Volume(_) => attr::VOLUME,
            Write::Next => attr::NEXT,
            Write::Previous => attr::PREVIOUS,
            Write::Mode(_) => attr::MODE,
        }
    }

    fn id(&self) -> &'static str {
        match self {
            Write::Mute(_) => "push:setMuted",
            Write::Volume(_) => "push:setVolume",
            Write::Next => "push:next",
            Write::Previous => "push:previous",
            Write::Mode(PlaybackMode::Play) => "push:play",
            Write::Mode(PlaybackMode::Pause) => "push:pause",
            Write::Mode(PlaybackMode::Stop) => "push:stop",
        }
    }

    async fn apply(&self, player: &dyn Player) -> Result<()> {
        match *self {
            Write::Mute(muted) => player.set_muted(muted).await,
            Write::Volume(volume) => player.set_volume(volume).await,
            Write::Next => player.next().await,
            Write::Previous => player.previous().await,
            Write::Mode(PlaybackMode::Play) => player.play().await,
            Write::Mode(PlaybackMode::Pause) => player.pause().await,
            Write::Mode(PlaybackMode::Stop) => player.stop().await,
        }
    }

    /// Value echoed as pulled once the write succeeds
    fn echo(&self) -> Option<Value> {
        match self {
            Write::Mute(muted) => Some(json!(muted)),
            Write::Volume(volume) => Some(json!(volume)),
            Write::Mode(mode) => Some(json!(mode.as_str())),
            Write::Next | Write::Previous => None,
        }
    }
}

/// Triggers fire unless explicitly pushed as `false`
fn fires(value: &Value) -> bool {
    !matches!(value, Value::Bool(false))
}

impl SonosBridge {
    /// Queue the writes for `attributes`
    ///
    /// Each recognized key becomes its own queue item; unknown keys are
    /// ignored. Returns `BridgeError::Unreachable` without queuing anything
    /// when the bridge holds no player, and stops at the first value that
    /// cannot be translated. Writes queued before such a failure still run.
    ///
    /// The returned completion resolves after every queued write finished.
    /// Device failures show up in the report, not as an error.
    pub fn push(&self, attributes: &Attributes) -> Result<PushCompletion> {
        let Some((player, queue)) = self.inner.session.channel() else {
            tracing::info!(method = "push", "not reachable");
            return Err(BridgeError::Unreachable);
        };

        tracing::info!(method = "push", ?attributes, "push");

        let (batch, completion) = Batch::new();
        match self.dispatch(&player, queue, attributes, &batch) {
            Ok(()) => {
                batch.finish_one();
                Ok(completion)
            }
            Err(e) => {
                tracing::error!(method = "push", error = %e, "dispatch failed, batch abandoned");
                batch.abandon();
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        player: &PlayerHandle,
        queue: &CommandQueue,
        attributes: &Attributes,
        batch: &Arc<Batch>,
    ) -> Result<()> {
        for key in DISPATCH_ORDER {
            let Some(value) = attributes.get(key) else {
                continue;
            };
            let Some(write) = Write::from_attribute(key, value)? else {
                continue;
            };

            let bridge = self.clone();
            let player = player.clone();
            let op_batch = batch.clone();
            let hook_batch = batch.clone();

            let item = QueueItem::new(write.id(), async move {
                match write.apply(player.as_ref()).await {
                    Ok(()) => {
                        if let Some(value) = write.echo() {
                            let mut attributes = Attributes::new();
                            attributes.insert(write.attribute().to_string(), value);
                            bridge.pulled(attributes);
                        }
                        op_batch.record(write.attribute(), WriteOutcome::Applied);
                    }
                    Err(e) => {
                        tracing::error!(method = "push", write = write.id(), error = %e, "write failed");
                        op_batch.record(write.attribute(), WriteOutcome::Failed(e.to_string()));
                    }
                }
            })
            .on_finished(move || hook_batch.finish_one());

            batch.begin_write();
            if let Err(e) = queue.add(item) {
                tracing::error!(method = "push", queue = queue.name(), write = write.id(), error = %e, "could not queue write");
                // never queued, so it will never finish
                batch.finish_one();
                return Err(e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_translation() {
        assert_eq!(Write::from_attribute("mute", &json!(true)).unwrap(), Some(Write::Mute(true)));
        assert_eq!(Write::from_attribute("volume", &json!(20)).unwrap(), Some(Write::Volume(20)));
        assert_eq!(Write::from_attribute("volume", &json!(150.4)).unwrap(), Some(Write::Volume(100)));
        assert_eq!(Write::from_attribute("volume", &json!(-3)).unwrap(), Some(Write::Volume(0)));
        assert_eq!(Write::from_attribute("next", &Value::Null).unwrap(), Some(Write::Next));
        assert_eq!(Write::from_attribute("previous", &json!(false)).unwrap(), None);
        assert_eq!(
            Write::from_attribute("mode", &json!("pause")).unwrap(),
            Some(Write::Mode(PlaybackMode::Pause))
        );
        assert_eq!(Write::from_attribute("mode", &json!("rewind")).unwrap(), None);
        assert_eq!(Write::from_attribute("brightness", &json!(1)).unwrap(), None);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        for (key, value) in [
            ("mute", json!("yes")),
            ("volume", json!("loud")),
            ("mode", json!(1)),
        ] {
            let err = Write::from_attribute(key, &value).unwrap_err();
            assert!(matches!(err, BridgeError::InvalidValue { ref attribute, .. } if attribute == key));
        }
    }

    #[tokio::test]
    async fn test_batch_completes_after_dispatch_and_all_writes() {
        let (batch, completion) = Batch::new();
        batch.begin_write();
        batch.begin_write();

        batch.record("volume", WriteOutcome::Applied);
        batch.finish_one();
        batch.finish_one(); // dispatch phase
        batch.record("mute", WriteOutcome::Failed("boom".to_string()));
        batch.finish_one();

        let report = completion.wait().await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.outcome("volume"), Some(&WriteOutcome::Applied));
        assert_eq!(report.failures().collect::<Vec<_>>(), vec![("mute", "boom")]);
        assert!(!report.all_applied());
    }

    #[tokio::test]
    async fn test_abandoned_batch_never_completes() {
        let (batch, completion) = Batch::new();
        batch.begin_write();
        batch.abandon();
        batch.finish_one();
        batch.finish_one();

        assert!(matches!(completion.wait().await, Err(BridgeError::ChannelError(_))));
    }
}
