//! HTTP client for the App Automate REST API.
//!
//! [`AppAutomateClient`] owns a shared `reqwest::Client`, the account
//! credentials and the endpoint layout. Every call goes through one
//! transport primitive, [`AppAutomateClient::perform`], which reads the
//! whole body, checks the status class and maps failures into
//! [`ApiError`]. The operations themselves live in submodules:
//!
//! | Operation | Module |
//! |-----------|--------|
//! | Artifact upload | [`upload`] |
//! | Test execution | [`execute`] |
//! | Session fetch and aggregation | [`session`] |
//! | Build status | [`crate::poller`] drives [`AppAutomateClient::build_status`] |
//!
//! # Error Handling
//!
//! All operations return [`ApiResult<T>`]. The variants separate where a
//! failure happened (local file, network, HTTP status, payload shape,
//! service verdict) so callers can decide what is fatal.

pub mod execute;
pub mod session;
pub mod upload;

use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Method, Request, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ClientConfig, Credentials, TestType};
use crate::model::Build;

pub use execute::{Acknowledgement, ExecuteRequest, Execution};
pub use session::{SessionCollection, SessionFailure, SessionSource, collect_sessions};
pub use upload::ArtifactKind;

/// Result type for App Automate operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur while talking to App Automate.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A local artifact could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service could not be reached or the response could not be read.
    #[error("Failed to perform request: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a status outside `200..300`.
    ///
    /// The body is kept verbatim; error payloads are not decoded.
    #[error("Response status: {status} - Body: {body}")]
    Protocol { status: u16, body: String },

    /// The body was not JSON of the expected shape.
    #[error("Failed to decode response ({body}): {source}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request went through but the service refused to run the build.
    #[error("Execution rejected: {message}")]
    Rejected { message: String },

    /// The configured base URL cannot carry endpoint paths.
    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The build did not finish within the configured number of polls.
    #[error("Build {build_id} not done after {attempts} status requests{}", last_error_suffix(.last_error))]
    PollExhausted {
        build_id: String,
        attempts: u32,
        last_error: Option<String>,
    },

    /// Polling was cancelled before the build finished.
    #[error("Stopped waiting for build {build_id}")]
    Cancelled { build_id: String },

    /// The run was cancelled before a build was started.
    #[error("Cancelled before {step}")]
    Interrupted { step: String },

    /// The poll task ended without delivering a result.
    #[error("Poll task for build {build_id} ended without a result")]
    PollAborted { build_id: String },
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {})", e),
        None => String::new(),
    }
}

/// Endpoint layout relative to a base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
    test_type: TestType,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>, test_type: TestType) -> Self {
        Self {
            base_url: base_url.into(),
            test_type,
        }
    }

    /// Upload endpoint for the given artifact.
    pub fn upload(&self, kind: ArtifactKind) -> ApiResult<Url> {
        match kind {
            ArtifactKind::App => self.join(&["app-automate", "upload"]),
            ArtifactKind::TestSuite => {
                self.join(&["app-automate", self.test_type.path_segment(), "test-suite"])
            }
        }
    }

    pub fn build(&self) -> ApiResult<Url> {
        self.join(&["app-automate", self.test_type.path_segment(), "build"])
    }

    pub fn build_status(&self, build_id: &str) -> ApiResult<Url> {
        self.join(&["app-automate", self.test_type.path_segment(), "builds", build_id])
    }

    pub fn session(&self, build_id: &str, session_id: &str) -> ApiResult<Url> {
        self.join(&[
            "app-automate",
            self.test_type.path_segment(),
            "builds",
            build_id,
            "sessions",
            session_id,
        ])
    }

    /// Appends path segments to the base URL. Segments are percent-encoded,
    /// so identifiers can never change the path structure.
    fn join(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ApiError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl {
                url: self.base_url.clone(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }
}

/// Client for one App Automate account.
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct AppAutomateClient {
    http: reqwest::Client,
    credentials: Credentials,
    endpoints: Endpoints,
}

impl AppAutomateClient {
    /// Creates a client for the given account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the HTTP client cannot be built
    /// and [`ApiError::InvalidUrl`] if `config.base_url` is not a valid
    /// base URL.
    pub fn new(
        credentials: Credentials,
        config: &ClientConfig,
        test_type: TestType,
    ) -> ApiResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let endpoints = Endpoints::new(config.base_url.clone(), test_type);
        // Fail early on a bad host instead of on the first upload.
        endpoints.build()?;

        Ok(Self {
            http: builder.build()?,
            credentials,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Starts a request with basic auth already applied.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).basic_auth(
            &self.credentials.username,
            Some(self.credentials.access_key.expose()),
        )
    }

    /// Performs a request and returns the raw body.
    ///
    /// The body is always read to the end, even for error statuses, so the
    /// connection goes back to the pool.
    pub(crate) async fn perform(&self, request: Request) -> ApiResult<Vec<u8>> {
        debug!("{} {}", request.method(), request.url());

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!("Response status: {}, {} bytes", status, body.len());

        if !(200..300).contains(&status.as_u16()) {
            return Err(ApiError::Protocol {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }

    /// Performs a request and decodes the JSON body into `T`.
    pub(crate) async fn perform_json<T: DeserializeOwned>(&self, request: Request) -> ApiResult<T> {
        let body = self.perform(request).await?;
        decode(&body)
    }

    /// Fetches the current state of a build.
    pub async fn build_status(&self, build_id: &str) -> ApiResult<Build> {
        let url = self.endpoints.build_status(build_id)?;
        let request = self.request(Method::GET, url).build()?;
        self.perform_json(request).await
    }
}

/// Decodes a JSON body, keeping the raw text for the error message.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|source| ApiError::Decode {
        body: String::from_utf8_lossy(body).into_owned(),
        source,
    })
}
