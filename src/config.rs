//! Configuration loading and schema definitions for appautomate.
//!
//! Run inputs (credentials, artifact paths, devices) come from the command
//! line or the environment. Client tuning (service host, poll cadence,
//! session fan-out) optionally comes from a TOML file described here.

pub mod schema;

pub use schema::*;

use std::path::Path;

use anyhow::{Context, Result};

/// Loads appautomate settings from a TOML file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (e.g., doesn't exist or permission denied)
/// - The file contains invalid TOML syntax
/// - The settings don't match the expected schema
///
/// # Example
///
/// ```no_run
/// use appautomate::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("appautomate.toml"))?;
/// println!("Polling every {}s", config.poll.interval_secs);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read appautomate settings from {}", path.display()))?;

    load_config_str(&content).with_context(|| format!("In settings file {}", path.display()))
}

/// Loads appautomate settings from a TOML string.
///
/// # Example
///
/// ```
/// use appautomate::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [client]
///     base_url = "http://127.0.0.1:8080"
///
///     [poll]
///     interval_secs = 5
/// "#)?;
///
/// assert_eq!(config.poll.interval_secs, 5);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    toml::from_str(content).context("Invalid appautomate settings")
}
