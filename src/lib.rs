//! appautomate: run XCUITest suites on BrowserStack App Automate.
//!
//! The crate uploads an app and its test runner, starts a build on a list
//! of remote devices, waits for the build to finish and collects the
//! per-device session results.
//!
//! # Architecture
//!
//! - **Client**: authenticated transport plus the upload, execute and
//!   session operations ([`client`])
//! - **Poller**: background task waiting for the build to be done
//!   ([`poller`])
//! - **Orchestrator**: the full run, step by step ([`orchestrator`])
//! - **Report**: console output ([`report`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use appautomate::client::AppAutomateClient;
//! use appautomate::config::{Config, Credentials, TestType};
//! use appautomate::poller::{BuildPoller, PollSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let client = AppAutomateClient::new(
//!         Credentials::new("alice", "secret"),
//!         &config.client,
//!         TestType::XcuiTests,
//!     )?;
//!
//!     let poller = BuildPoller::new(Arc::new(client), PollSettings::default());
//!     let build = poller.spawn("4d2b4deb").wait().await.into_build()?;
//!     println!("{} device(s)", build.devices.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod model;
pub mod orchestrator;
pub mod poller;
pub mod report;

// Re-export commonly used types
pub use client::{ApiError, ApiResult, AppAutomateClient};
pub use config::{Config, Credentials, load_config};
pub use model::{Build, Device, Session, TestStatus};
pub use orchestrator::{Orchestrator, RunOutcome, RunPlan};
pub use poller::{BuildPoller, BuildResult, PollSettings};
pub use report::Reporter;
