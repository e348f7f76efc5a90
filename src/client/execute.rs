//! Test execution requests.
//!
//! A successful HTTP call does not mean the build was accepted: the
//! service reports its verdict in the `message` field, and only the exact
//! value `"Success"` means the build is running.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ApiError, ApiResult, AppAutomateClient};

/// The acknowledgement message of an accepted execution.
pub const ACCEPTED_MESSAGE: &str = "Success";

/// Body of an execute request.
///
/// Devices are capability strings such as `"iPhone XS-12"`. The list is
/// sent as given; an empty list is left for the service to judge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteRequest {
    pub devices: Vec<String>,
    pub app: String,
    #[serde(rename = "deviceLogs")]
    pub device_logs: bool,
    #[serde(rename = "testSuite")]
    pub test_suite: String,
}

impl ExecuteRequest {
    pub fn new(
        app_url: impl Into<String>,
        test_suite_url: impl Into<String>,
        device_logs: bool,
        devices: Vec<String>,
    ) -> Self {
        Self {
            devices,
            app: app_url.into(),
            device_logs,
            test_suite: test_suite_url.into(),
        }
    }
}

/// The service's verdict on an execute request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Accepted,
    Rejected,
}

impl Acknowledgement {
    /// Classifies an acknowledgement message. Only [`ACCEPTED_MESSAGE`],
    /// compared exactly, counts as accepted.
    pub fn from_message(message: &str) -> Self {
        match message {
            ACCEPTED_MESSAGE => Acknowledgement::Accepted,
            _ => Acknowledgement::Rejected,
        }
    }
}

/// Response to an execute request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Execution {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub build_id: String,
}

impl Execution {
    pub fn acknowledgement(&self) -> Acknowledgement {
        Acknowledgement::from_message(&self.message)
    }

    /// Returns the build id if the service accepted the execution.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] carrying the service's message
    /// otherwise.
    pub fn accepted(self) -> ApiResult<String> {
        match self.acknowledgement() {
            Acknowledgement::Accepted => Ok(self.build_id),
            Acknowledgement::Rejected => Err(ApiError::Rejected {
                message: self.message,
            }),
        }
    }
}

impl AppAutomateClient {
    /// Starts a build for the uploaded artifacts.
    ///
    /// The returned [`Execution`] still has to be checked with
    /// [`Execution::accepted`]; an HTTP success only means the request was
    /// understood.
    pub async fn execute_test(&self, request: &ExecuteRequest) -> ApiResult<Execution> {
        debug!("Executing on {} device(s): {:?}", request.devices.len(), request.devices);

        let url = self.endpoints.build()?;
        let http_request = self.request(Method::POST, url).json(request).build()?;
        let execution: Execution = self.perform_json(http_request).await?;

        match execution.acknowledgement() {
            Acknowledgement::Accepted => info!("Build {} started", execution.build_id),
            Acknowledgement::Rejected => warn!("Execution not accepted: {}", execution.message),
        }

        Ok(execution)
    }
}
