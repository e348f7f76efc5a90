//! Waiting for a build to finish.
//!
//! A build is either still running (any status other than `"done"`) or
//! done. [`BuildPoller::spawn`] starts a tokio task that asks for the
//! build status at a fixed interval and hands exactly one [`BuildResult`]
//! back through a oneshot channel:
//!
//! ```text
//!   spawn(build_id)
//!        │
//!        ▼
//!   ┌──────────┐   status != "done"   ┌────────────┐
//!   │  request │ ───────────────────► │ sleep(int) │ ──┐
//!   └──────────┘ ◄─────────────────── └────────────┘   │
//!     │   │  request failed: warn, count, keep going    │
//!     │   └─────────────────────────────────────────────┘
//!     │ status == "done"
//!     ▼
//!   BuildResult { Ok(build) } ──► PollHandle::wait()
//! ```
//!
//! Failed status requests do not end the loop. They are logged and counted,
//! and only the final outcome reaches the caller. Without a `max_attempts`
//! cap or a cancellation the task polls until the build is done.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::client::{ApiError, ApiResult, AppAutomateClient};
use crate::config::PollConfig;
use crate::model::Build;

/// Something that can report the current state of a build.
#[async_trait]
pub trait BuildStatusSource: Send + Sync {
    async fn build_status(&self, build_id: &str) -> ApiResult<Build>;
}

#[async_trait]
impl BuildStatusSource for AppAutomateClient {
    async fn build_status(&self, build_id: &str) -> ApiResult<Build> {
        AppAutomateClient::build_status(self, build_id).await
    }
}

/// Polling cadence.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Wait between two status requests.
    pub interval: Duration,
    /// Give up after this many status requests. `None` polls forever.
    pub max_attempts: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl From<&PollConfig> for PollSettings {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }
}

/// The single outcome of one poll invocation.
#[derive(Debug)]
pub struct BuildResult {
    /// The finished build, or why polling stopped without one.
    pub build: ApiResult<Build>,
    /// Status requests issued, including failed ones.
    pub polls: u32,
    /// Status requests that failed and were retried.
    pub transient_errors: u32,
}

impl BuildResult {
    pub fn into_build(self) -> ApiResult<Build> {
        self.build
    }
}

/// Handle to a running poll task.
///
/// Dropping the handle stops the task.
pub struct PollHandle {
    build_id: String,
    receiver: oneshot::Receiver<BuildResult>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl PollHandle {
    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Asks the poll task to stop. [`PollHandle::wait`] then yields
    /// [`ApiError::Cancelled`] unless the build finished first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the poll task's result.
    pub async fn wait(self) -> BuildResult {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => BuildResult {
                build: Err(ApiError::PollAborted {
                    build_id: self.build_id,
                }),
                polls: 0,
                transient_errors: 0,
            },
        }
    }
}

/// Spawns poll tasks against a status source.
pub struct BuildPoller<S> {
    source: Arc<S>,
    settings: PollSettings,
    cancel: CancellationToken,
}

impl<S> BuildPoller<S>
where
    S: BuildStatusSource + 'static,
{
    pub fn new(source: Arc<S>, settings: PollSettings) -> Self {
        Self {
            source,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties every spawned task to `token`: cancelling it stops them all.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Starts polling `build_id` on a background task.
    pub fn spawn(&self, build_id: impl Into<String>) -> PollHandle {
        let build_id = build_id.into();
        let (sender, receiver) = oneshot::channel();
        let cancel = self.cancel.child_token();

        let source = Arc::clone(&self.source);
        let settings = self.settings.clone();
        let task_cancel = cancel.clone();
        let task_build_id = build_id.clone();

        tokio::spawn(async move {
            let result =
                poll_until_complete(source.as_ref(), &task_build_id, &settings, &task_cancel).await;
            if sender.send(result).is_err() {
                debug!("Nobody is waiting for build {} any more", task_build_id);
            }
        });

        PollHandle {
            build_id,
            receiver,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }
}

/// Polls `build_id` until it is done, the attempt cap is hit, or `cancel`
/// fires.
pub async fn poll_until_complete<S>(
    source: &S,
    build_id: &str,
    settings: &PollSettings,
    cancel: &CancellationToken,
) -> BuildResult
where
    S: BuildStatusSource + ?Sized,
{
    let mut polls = 0;
    let mut transient_errors = 0;

    let finish = |build: ApiResult<Build>, polls: u32, transient_errors: u32| BuildResult {
        build,
        polls,
        transient_errors,
    };
    let cancelled = || ApiError::Cancelled {
        build_id: build_id.to_string(),
    };

    loop {
        polls += 1;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return finish(Err(cancelled()), polls - 1, transient_errors),
            response = source.build_status(build_id) => response,
        };

        let last_error = match response {
            Ok(build) if build.is_done() => {
                info!("Build {} done after {} status request(s)", build_id, polls);
                return finish(Ok(build), polls, transient_errors);
            }
            Ok(build) => {
                debug!("Build {} status: {:?}", build_id, build.status);
                None
            }
            Err(e) => {
                transient_errors += 1;
                warn!("Failed to get status of build {}, error: {}", build_id, e);
                Some(e.to_string())
            }
        };

        if let Some(max) = settings.max_attempts {
            if polls >= max {
                return finish(
                    Err(ApiError::PollExhausted {
                        build_id: build_id.to_string(),
                        attempts: polls,
                        last_error,
                    }),
                    polls,
                    transient_errors,
                );
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return finish(Err(cancelled()), polls, transient_errors),
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }
}
