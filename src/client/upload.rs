//! Artifact uploads.
//!
//! Both artifacts go up the same way: one multipart file field named
//! `file`, carrying the file's base name. Only the endpoint and the field
//! holding the returned URL differ.

use std::fmt;
use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use super::{ApiError, ApiResult, AppAutomateClient, decode};

/// Multipart field the service reads the artifact from.
pub const ARTIFACT_FIELD: &str = "file";

/// The two artifacts a build needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The application under test (`.ipa`).
    App,
    /// The XCUITest runner package (`.zip`).
    TestSuite,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::App => f.write_str("app"),
            ArtifactKind::TestSuite => f.write_str("test runner"),
        }
    }
}

#[derive(Deserialize)]
struct AppUploadResponse {
    app_url: String,
}

#[derive(Deserialize)]
struct TestSuiteUploadResponse {
    test_url: String,
}

/// File name sent with the artifact: the path without its directories.
pub fn artifact_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl AppAutomateClient {
    /// Uploads a local artifact and returns the URL the service assigned.
    ///
    /// No retry is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Io`] if the file cannot be read
    /// - [`ApiError::Decode`] if the response lacks the URL field
    /// - any transport or protocol error from the request
    pub async fn upload_artifact(&self, kind: ArtifactKind, path: &Path) -> ApiResult<String> {
        let contents = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = artifact_file_name(path);
        debug!("Uploading {} ({} bytes) as {}", kind, contents.len(), file_name);

        let form = Form::new().part(ARTIFACT_FIELD, Part::bytes(contents).file_name(file_name));
        let url = self.endpoints.upload(kind)?;
        let request = self.request(Method::POST, url).multipart(form).build()?;

        let body = self.perform(request).await?;
        let artifact_url = match kind {
            ArtifactKind::App => decode::<AppUploadResponse>(&body)?.app_url,
            ArtifactKind::TestSuite => decode::<TestSuiteUploadResponse>(&body)?.test_url,
        };

        info!("Uploaded {} to {}", kind, artifact_url);
        Ok(artifact_url)
    }

    /// Uploads the application binary.
    pub async fn upload_app(&self, path: &Path) -> ApiResult<String> {
        self.upload_artifact(ArtifactKind::App, path).await
    }

    /// Uploads the test runner package.
    pub async fn upload_test_suite(&self, path: &Path) -> ApiResult<String> {
        self.upload_artifact(ArtifactKind::TestSuite, path).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::{Multipart, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::json;

    use super::*;
    use crate::client::testing::{client, is_authorized, serve};

    /// One multipart field as seen by the server.
    #[derive(Debug, Clone, PartialEq)]
    struct ReceivedField {
        name: Option<String>,
        file_name: Option<String>,
        contents: Vec<u8>,
    }

    type Received = Arc<Mutex<Vec<ReceivedField>>>;

    async fn read_fields(mut multipart: Multipart) -> Vec<ReceivedField> {
        let mut fields = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().map(str::to_string);
            let file_name = field.file_name().map(str::to_string);
            let contents = field.bytes().await.unwrap().to_vec();
            fields.push(ReceivedField {
                name,
                file_name,
                contents,
            });
        }
        fields
    }

    fn upload_router(received: Received) -> Router {
        Router::new()
            .route(
                "/app-automate/upload",
                post(
                    |State(received): State<Received>, headers: HeaderMap, multipart: Multipart| async move {
                        if !is_authorized(&headers) {
                            return (StatusCode::UNAUTHORIZED, json!({"error": "auth"}).to_string());
                        }
                        let fields = read_fields(multipart).await;
                        let name = fields[0].file_name.clone().unwrap_or_default();
                        received.lock().unwrap().extend(fields);
                        (StatusCode::OK, json!({"app_url": format!("bs://app/{}", name)}).to_string())
                    },
                ),
            )
            .route(
                "/app-automate/xcuitest/test-suite",
                post(
                    |State(received): State<Received>, multipart: Multipart| async move {
                        let fields = read_fields(multipart).await;
                        received.lock().unwrap().extend(fields);
                        json!({"test_url": "bs://suite/1"}).to_string()
                    },
                ),
            )
            .with_state(received)
    }

    fn artifact(dir: &tempfile::TempDir, relative: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_artifact_file_name_strips_directories() {
        assert_eq!(artifact_file_name(Path::new("/tmp/build/out/BullsEye.ipa")), "BullsEye.ipa");
        assert_eq!(artifact_file_name(Path::new("Runner.zip")), "Runner.zip");
        assert_eq!(artifact_file_name(Path::new("./dist/Runner.zip")), "Runner.zip");
    }

    #[tokio::test]
    async fn test_upload_app_sends_single_file_field() {
        let received = Received::default();
        let base = serve(upload_router(received.clone())).await;
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, "nested/deeper/BullsEye.ipa", b"ipa-bytes");

        let url = client(&base).upload_app(&path).await.unwrap();

        assert_eq!(url, "bs://app/BullsEye.ipa");
        let fields = received.lock().unwrap().clone();
        assert_eq!(
            fields,
            vec![ReceivedField {
                name: Some("file".to_string()),
                file_name: Some("BullsEye.ipa".to_string()),
                contents: b"ipa-bytes".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn test_upload_test_suite_reads_test_url() {
        let received = Received::default();
        let base = serve(upload_router(received.clone())).await;
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, "BullsEyeUITests-Runner.zip", b"zip");

        let url = client(&base).upload_test_suite(&path).await.unwrap();

        assert_eq!(url, "bs://suite/1");
        let fields = received.lock().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].file_name.as_deref(), Some("BullsEyeUITests-Runner.zip"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let received = Received::default();
        let base = serve(upload_router(received.clone())).await;

        let err = client(&base)
            .upload_app(Path::new("/no/such/dir/App.ipa"))
            .await
            .unwrap_err();

        match err {
            ApiError::Io { path, .. } => assert_eq!(path, PathBuf::from("/no/such/dir/App.ipa")),
            other => panic!("expected io error, got {:?}", other),
        }
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_response_without_url_is_decode_error() {
        let app = Router::new().route(
            "/app-automate/upload",
            post(|| async { json!({"message": "ok"}).to_string() }),
        );
        let base = serve(app).await;
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, "App.ipa", b"x");

        let err = client(&base).upload_app(&path).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_rejected_upload_is_protocol_error() {
        let app = Router::new().route(
            "/app-automate/upload",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, r#"{"error":"Invalid file"}"#) }),
        );
        let base = serve(app).await;
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, "App.ipa", b"x");

        let err = client(&base).upload_app(&path).await.unwrap_err();
        match err {
            ApiError::Protocol { status, body } => {
                assert_eq!(status, 422);
                assert!(body.contains("Invalid file"));
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
    }
}
