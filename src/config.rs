use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Initialization options for a bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Poll interval in seconds (default: 30, 0 disables polling)
    pub poll: u64,

    /// Index used to tell apart things on identical players (default: 0)
    pub number: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { poll: 30, number: 0 }
    }
}

impl BridgeConfig {
    /// Layer explicit options over stored options over the defaults
    ///
    /// Both inputs are JSON objects (or `null`). Keys set in `options` win,
    /// then keys in `stored`; anything missing falls back to [`Default`].
    /// Unknown keys are ignored.
    pub fn merged(options: &Value, stored: &Value) -> Result<Self> {
        let mut layered = serde_json::Map::new();
        for layer in [stored, options] {
            match layer {
                Value::Null => {}
                Value::Object(map) => {
                    for (key, value) in map {
                        if !value.is_null() {
                            layered.insert(key.clone(), value.clone());
                        }
                    }
                }
                other => {
                    return Err(BridgeError::Config(format!(
                        "expected an object of options, got {}",
                        other
                    )))
                }
            }
        }

        serde_json::from_value(Value::Object(layered)).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Poll period, or `None` when polling is disabled
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll > 0).then(|| Duration::from_secs(self.poll))
    }
}

/// Options passed to `connect`
///
/// Carries nothing today; the orchestration layer hands one to every bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectOptions {}
