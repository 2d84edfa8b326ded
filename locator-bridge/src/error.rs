//! Error types for the locator bridge

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Locator bridge error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on a binary channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Appliance could not be reached over the RPC channel
    #[error("Locator unreachable: {0}")]
    Unreachable(String),

    /// Login rejected by the appliance
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// RPC call failed or returned a non-zero response code
    #[error("RPC call {method} failed: {reason}")]
    Rpc {
        /// Remote method name
        method: String,
        /// Failure description
        reason: String,
    },

    /// Authenticated call attempted without a session
    #[error("No active session")]
    NotLoggedIn,

    /// Locator module missing or with an incompatible version
    #[error("Locator software incompatible with this bridge: {0}")]
    IncompatibleVersion(String),

    /// Pose given in a reference frame other than the map frame
    #[error("Pose sent in wrong frame: is '{actual}' but should be '{expected}'")]
    WrongFrame {
        /// Frame the bridge requires
        expected: String,
        /// Frame the caller supplied
        actual: String,
    },

    /// Config entry not present on the appliance
    #[error("Config entry not found: {0}")]
    ConfigEntryMissing(String),

    /// Local configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization of an RPC body failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker thread could not be spawned
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Error::Config(e.to_string())
        } else if e.is_connect() || e.is_timeout() || e.is_request() {
            Error::Unreachable(e.to_string())
        } else {
            Error::Rpc {
                method: e.url().map_or_else(String::new, |url| url.path().to_string()),
                reason: e.to_string(),
            }
        }
    }
}
