//! End-to-end run: upload, execute, wait, collect.
//!
//! ```text
//!   upload app ──► upload test runner ──► execute ──► (accepted?)
//!                                                        │
//!                               BuildPoller task ◄───────┘
//!                                      │ BuildResult (oneshot)
//!                                      ▼
//!                      collect_sessions(device entries)
//!                                      │
//!                                      ▼
//!                                  RunOutcome
//! ```
//!
//! Upload, execute and poll failures end the run with an error, and so does
//! cancellation. Session failures do not; they are part of the
//! [`RunOutcome`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use appautomate::client::AppAutomateClient;
//! use appautomate::config::{Config, Credentials, TestType};
//! use appautomate::orchestrator::{Orchestrator, RunPlan};
//! use appautomate::report::NullReporter;
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
//!     let plan = RunPlan {
//!         app: PathBuf::from("BullsEye.ipa"),
//!         test_suite: PathBuf::from("BullsEyeUITests-Runner.zip"),
//!         devices: vec!["iPhone XS-12".to_string()],
//!         device_logs: true,
//!     };
//!
//!     let orchestrator = Orchestrator::new(Arc::new(client), &config, NullReporter);
//!     let outcome = orchestrator.run(&plan).await?;
//!     println!("{} session(s) collected", outcome.sessions.sessions.len());
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{
    ApiError, AppAutomateClient, ArtifactKind, ExecuteRequest, SessionCollection,
    collect_sessions,
};
use crate::config::Config;
use crate::model::Build;
use crate::poller::{BuildPoller, PollSettings};
use crate::report::Reporter;

/// What to run and where.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Application binary (`.ipa`).
    pub app: PathBuf,
    /// XCUITest runner package (`.zip`).
    pub test_suite: PathBuf,
    /// Device capability strings, passed to the service as given.
    pub devices: Vec<String>,
    /// Ask the service to collect device logs.
    pub device_logs: bool,
}

impl RunPlan {
    /// Splits a pipe-delimited device list such as
    /// `"iPhone 8-11|iPhone XS-12"`. No filtering is applied.
    pub fn parse_devices(devices: &str) -> Vec<String> {
        devices.split('|').map(str::to_string).collect()
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub app_url: String,
    pub test_suite_url: String,
    pub build: Build,
    pub sessions: SessionCollection,
}

/// Drives one run against App Automate.
pub struct Orchestrator<R> {
    client: Arc<AppAutomateClient>,
    poll: PollSettings,
    session_concurrency: usize,
    cancel: CancellationToken,
    reporter: R,
}

impl<R: Reporter> Orchestrator<R> {
    pub fn new(client: Arc<AppAutomateClient>, config: &Config, reporter: R) -> Self {
        Self {
            client,
            poll: PollSettings::from(&config.poll),
            session_concurrency: config.sessions.concurrency,
            cancel: CancellationToken::new(),
            reporter,
        }
    }

    /// Overrides the poll settings taken from the configuration.
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Cancelling `token` stops the run. Uploads in flight are abandoned
    /// and no build is started once it fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub async fn run(&self, plan: &RunPlan) -> Result<RunOutcome> {
        let app_url = self.upload(ArtifactKind::App, plan).await?;
        let test_suite_url = self.upload(ArtifactKind::TestSuite, plan).await?;

        let request = ExecuteRequest::new(
            app_url.clone(),
            test_suite_url.clone(),
            plan.device_logs,
            plan.devices.clone(),
        );
        // No build may start once the run is cancelled.
        if self.cancel.is_cancelled() {
            return Err(ApiError::Interrupted {
                step: "starting the build".to_string(),
            })
            .context("Failed to execute test");
        }
        let execution = self
            .client
            .execute_test(&request)
            .await
            .context("Failed to execute test")?;
        self.reporter.on_execution(&execution);
        let build_id = execution
            .accepted()
            .context("Failed to execute test")?;

        let build = self.wait_for_build(&build_id).await?;

        info!("Fetching sessions for {} device(s)", build.devices.len());
        let devices = build.device_entries();
        let sessions = collect_sessions(
            self.client.as_ref(),
            &build_id,
            &devices,
            self.session_concurrency,
        )
        .await;
        self.reporter.on_sessions(&sessions);

        Ok(RunOutcome {
            app_url,
            test_suite_url,
            build,
            sessions,
        })
    }

    async fn upload(&self, kind: ArtifactKind, plan: &RunPlan) -> Result<String> {
        let path = match kind {
            ArtifactKind::App => &plan.app,
            ArtifactKind::TestSuite => &plan.test_suite,
        };

        self.reporter.on_upload_start(kind, path);
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApiError::Interrupted {
                step: format!("uploading the {}", kind),
            }),
            result = self.client.upload_artifact(kind, path) => result,
        };
        let url =
            result.with_context(|| format!("Failed to upload {} ({})", kind, path.display()))?;
        self.reporter.on_upload_complete(kind, &url);

        Ok(url)
    }

    async fn wait_for_build(&self, build_id: &str) -> Result<Build> {
        let poller = BuildPoller::new(Arc::clone(&self.client), self.poll.clone())
            .with_cancellation(self.cancel.clone());

        self.reporter.on_wait_start(build_id);
        let result = poller.spawn(build_id).wait().await;
        self.reporter.on_wait_end();

        if result.transient_errors > 0 {
            info!(
                "{} of {} status request(s) failed while waiting",
                result.transient_errors, result.polls
            );
        }

        let build = result
            .into_build()
            .with_context(|| format!("Failed to wait for build {}", build_id))?;
        self.reporter.on_build_complete(&build);

        Ok(build)
    }
}
