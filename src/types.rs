use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Partial attribute set, keyed by attribute name
pub type Attributes = serde_json::Map<String, Value>;

/// Volume level (0-100)
pub type Volume = u8;

/// Mute state
pub type MuteState = bool;

/// Attribute names understood by push and produced by pull
pub mod attr {
    pub const VOLUME: &str = "volume";
    pub const MUTE: &str = "mute";
    pub const MODE: &str = "mode";
    pub const NEXT: &str = "next";
    pub const PREVIOUS: &str = "previous";
}

const MANUFACTURER: &str = "http://www.sonos.com/en-ca?r=1";
const THING_NAMESPACE: &str = "Sonos";
const MEDIA_MODE_PREFIX: &str = "iot-attribute:media-mode.";

/// Transport mode that can be pushed to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Play,
    Pause,
    Stop,
}

impl PlaybackMode {
    /// Match candidates in priority order: play, then pause, then stop
    const PRIORITY: [PlaybackMode; 3] = [PlaybackMode::Play, PlaybackMode::Pause, PlaybackMode::Stop];

    /// Attribute value for this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackMode::Play => "play",
            PlaybackMode::Pause => "pause",
            PlaybackMode::Stop => "stop",
        }
    }

    /// Resolve a pushed `mode` value
    ///
    /// Accepts the bare form (`"pause"`) and the expanded schema form
    /// (`"iot-attribute:media-mode.pause"`). Returns `None` for anything else.
    pub fn from_attribute(value: &str) -> Option<Self> {
        let bare = value.strip_prefix(MEDIA_MODE_PREFIX).unwrap_or(value);
        Self::PRIORITY.into_iter().find(|mode| mode.as_str() == bare)
    }
}

/// Transport state as read back from a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Playing,
    Paused,
    Stopped,
    Transitioning,
    Unknown,
}

impl TransportState {
    /// Parse the raw state string reported by the driver
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "playing" => TransportState::Playing,
            "paused" | "paused_playback" => TransportState::Paused,
            "stopped" => TransportState::Stopped,
            "transitioning" => TransportState::Transitioning,
            _ => TransportState::Unknown,
        }
    }

    /// The `mode` attribute this state corresponds to, if settled
    pub fn mode(&self) -> Option<PlaybackMode> {
        match self {
            TransportState::Playing => Some(PlaybackMode::Play),
            TransportState::Paused => Some(PlaybackMode::Pause),
            TransportState::Stopped => Some(PlaybackMode::Stop),
            TransportState::Transitioning | TransportState::Unknown => None,
        }
    }
}

/// Metadata describing the thing behind a bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingMeta {
    /// Globally unique thing id (device + number)
    #[serde(rename = "iot:thing")]
    pub thing: String,

    /// Device id shared by all things on the same player
    #[serde(rename = "iot:device")]
    pub device: String,

    #[serde(rename = "schema:name")]
    pub name: String,

    #[serde(rename = "schema:manufacturer")]
    pub manufacturer: String,

    #[serde(rename = "iot:number")]
    pub number: u32,
}

impl ThingMeta {
    pub(crate) fn new(device_uuid: &str, name: Option<&str>, number: u32) -> Self {
        Self {
            thing: thing_urn(&[device_uuid, &number.to_string()]),
            device: thing_urn(&[device_uuid]),
            name: name.unwrap_or(THING_NAMESPACE).to_string(),
            manufacturer: MANUFACTURER.to_string(),
            number,
        }
    }
}

/// Stable URN hashed from the given parts
fn thing_urn(parts: &[&str]) -> String {
    let key = std::iter::once(THING_NAMESPACE)
        .chain(parts.iter().copied())
        .collect::<Vec<_>>()
        .join("|");
    let hash = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
    format!("urn:iotdb:thing:{}:{}", THING_NAMESPACE, hash.simple())
}
