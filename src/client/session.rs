//! Per-device session retrieval.
//!
//! Once a build is done, each device entry points at a session holding that
//! device's test details. Collection is best effort: a device whose session
//! cannot be fetched is recorded as a [`SessionFailure`] and the others are
//! still fetched.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Method;
use tracing::{debug, warn};

use super::{ApiError, ApiResult, AppAutomateClient};
use crate::model::{DeviceEntry, Session};

/// Something that can fetch a device session.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn fetch_session(&self, build_id: &str, session_id: &str) -> ApiResult<Session>;
}

#[async_trait]
impl SessionSource for AppAutomateClient {
    async fn fetch_session(&self, build_id: &str, session_id: &str) -> ApiResult<Session> {
        AppAutomateClient::fetch_session(self, build_id, session_id).await
    }
}

impl AppAutomateClient {
    /// Fetches one device session of a build.
    pub async fn fetch_session(&self, build_id: &str, session_id: &str) -> ApiResult<Session> {
        let url = self.endpoints.session(build_id, session_id)?;
        let request = self.request(Method::GET, url).build()?;
        self.perform_json(request).await
    }
}

/// A device whose session could not be fetched.
#[derive(Debug)]
pub struct SessionFailure {
    /// Device identifier from the build's device mapping.
    pub device: String,
    pub session_id: String,
    pub error: ApiError,
}

/// Outcome of fetching every device session of a build.
#[derive(Debug, Default)]
pub struct SessionCollection {
    /// Sessions that were fetched, in device order.
    pub sessions: Vec<Session>,
    /// Devices that were skipped, in device order.
    pub failures: Vec<SessionFailure>,
}

impl SessionCollection {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetches the session of every device.
///
/// At most `concurrency` requests are in flight at once (a value of 0 is
/// treated as 1). Results keep the order of `devices` regardless of which
/// request finishes first, and a failing device never stops the others.
pub async fn collect_sessions<S>(
    source: &S,
    build_id: &str,
    devices: &[DeviceEntry],
    concurrency: usize,
) -> SessionCollection
where
    S: SessionSource + ?Sized,
{
    let fetches = devices.iter().map(|entry| async move {
        debug!("Fetching session {} ({})", entry.device.session_id, entry.name);
        let result = source.fetch_session(build_id, &entry.device.session_id).await;
        (entry, result)
    });

    let results: Vec<_> = stream::iter(fetches)
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut collection = SessionCollection::default();
    for (entry, result) in results {
        match result {
            Ok(session) => collection.sessions.push(session),
            Err(error) => {
                warn!(
                    "Failed to fetch session ({}) for {}, error: {}",
                    entry.device.session_id, entry.name, error
                );
                collection.failures.push(SessionFailure {
                    device: entry.name.clone(),
                    session_id: entry.device.session_id.clone(),
                    error,
                });
            }
        }
    }

    collection
}
