//! Configuration schema definitions for appautomate.
//!
//! These types are deserialized from the optional TOML settings file. Every
//! section has defaults, so an empty file (or no file at all) yields a
//! configuration that talks to the public BrowserStack API and polls every
//! 30 seconds forever.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── ClientConfig      - Service host and request timeout
//! ├── PollConfig        - Build status polling cadence and optional cap
//! └── SessionConfig     - Session fetch fan-out
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Public App Automate API host.
pub const DEFAULT_BASE_URL: &str = "https://api-cloud.browserstack.com";

/// Root configuration structure.
///
/// # TOML Structure
///
/// ```toml
/// [client]
/// base_url = "https://api-cloud.browserstack.com"
/// request_timeout_secs = 600
///
/// [poll]
/// interval_secs = 30
/// max_attempts = 120
///
/// [sessions]
/// concurrency = 4
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP client settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Build status polling settings.
    #[serde(default)]
    pub poll: PollConfig,

    /// Session collection settings.
    #[serde(default)]
    pub sessions: SessionConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to.
    ///
    /// Override this to point the client at a test server.
    ///
    /// Default: `https://api-cloud.browserstack.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    ///
    /// Applies to uploads too, so leave headroom for large artifacts.
    /// Unset means no client-side timeout.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Build status polling settings.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `interval_secs` | 30 |
/// | `max_attempts` | None (poll until the build is done) |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    /// Seconds to wait between two status requests.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Give up after this many status requests.
    pub max_attempts: Option<u32>,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_attempts: None,
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}

/// Session collection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How many session requests may be in flight at once.
    ///
    /// Default: 1 (one device at a time)
    #[serde(default = "default_session_concurrency")]
    pub concurrency: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_session_concurrency(),
        }
    }
}

fn default_session_concurrency() -> usize {
    1
}

/// Test framework the build runs.
///
/// Only XCUITest is supported; the value also selects the framework path
/// segment of the build endpoints.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum,
)]
pub enum TestType {
    #[default]
    #[serde(rename = "XCUITests")]
    #[value(name = "XCUITests")]
    XcuiTests,
}

impl TestType {
    /// Path segment used by the framework specific endpoints.
    pub fn path_segment(self) -> &'static str {
        match self {
            TestType::XcuiTests => "xcuitest",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::XcuiTests => f.write_str("XCUITests"),
        }
    }
}

/// A value that must never show up in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying value. Only call this where the value is
    /// sent to the service.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Basic auth credentials sent with every request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub access_key: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_key: Secret::new(access_key),
        }
    }
}
