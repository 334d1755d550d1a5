use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur when driving a Sonos player through the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The bridge holds no device handle
    #[error("Device not reachable")]
    Unreachable,

    /// The native driver reported a failure for one device call
    #[error("Device error during {operation}: {detail}")]
    Device {
        /// Native operation that failed, e.g. `setVolume`
        operation: &'static str,
        /// Error detail reported by the driver
        detail: String,
    },

    /// A pushed attribute carried a value of the wrong shape
    #[error("Invalid value for {attribute}: {reason}")]
    InvalidValue {
        /// Attribute key as pushed
        attribute: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The command queue worker is gone and no longer accepts items
    #[error("Command queue closed")]
    QueueClosed,

    /// Configuration could not be merged or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl BridgeError {
    /// Build a device error for the given native operation
    pub fn device(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Device {
            operation,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid(attribute: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }
}
