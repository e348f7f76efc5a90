//! Fake App Automate service shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde_json::{Value, json};

/// Behavior knobs and a record of what the fake service saw.
#[derive(Default)]
pub struct FakeService {
    /// Message returned by the execute endpoint.
    pub execute_message: Mutex<String>,
    /// Session ids answered with a 500.
    pub failing_sessions: Mutex<Vec<String>>,
    /// Non-terminal polls before the build reports `done`.
    pub running_polls: AtomicU32,
    /// Delay before an upload is answered, in milliseconds.
    pub upload_delay_ms: AtomicU64,
    pub status_calls: AtomicU32,
    pub uploads: Mutex<Vec<String>>,
    pub execute_bodies: Mutex<Vec<Value>>,
    pub session_calls: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        let service = Self::default();
        *service.execute_message.lock().unwrap() = "Success".to_string();
        service.running_polls.store(2, Ordering::SeqCst);
        Arc::new(service)
    }
}

type Shared = Arc<FakeService>;

async fn file_name(service: &FakeService, mut multipart: Multipart) -> String {
    let delay = service.upload_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let field = multipart.next_field().await.unwrap().unwrap();
    field.file_name().unwrap_or_default().to_string()
}

async fn upload_app(State(service): State<Shared>, multipart: Multipart) -> String {
    let name = file_name(&service, multipart).await;
    service.uploads.lock().unwrap().push(name.clone());
    json!({ "app_url": format!("bs://app/{}", name) }).to_string()
}

async fn upload_suite(State(service): State<Shared>, multipart: Multipart) -> String {
    let name = file_name(&service, multipart).await;
    service.uploads.lock().unwrap().push(name.clone());
    json!({ "test_url": format!("bs://suite/{}", name) }).to_string()
}

async fn execute(State(service): State<Shared>, body: String) -> String {
    let body: Value = serde_json::from_str(&body).unwrap();
    service.execute_bodies.lock().unwrap().push(body);

    let message = service.execute_message.lock().unwrap().clone();
    if message == "Success" {
        json!({ "message": message, "build_id": "build-1" }).to_string()
    } else {
        json!({ "message": message }).to_string()
    }
}

async fn build_status(State(service): State<Shared>, Path(build_id): Path<String>) -> String {
    let call = service.status_calls.fetch_add(1, Ordering::SeqCst);
    let running = service.running_polls.load(Ordering::SeqCst);
    let status = if call < running { "running" } else { "done" };

    json!({
        "build_id": build_id,
        "framework": "xcuitest",
        "status": status,
        "devices": {
            "iPhone XS-12": {
                "session_id": "s-xs",
                "status": "done",
                "test_status": {"SUCCESS": 2, "FAILED": 0}
            },
            "iPhone 8-11": {
                "session_id": "s-8",
                "status": "done",
                "test_status": {"SUCCESS": 1, "FAILED": 1}
            },
            "iPad Air 2019-12": {
                "session_id": "s-ipad",
                "status": "done",
                "test_status": {"SUCCESS": 2}
            }
        }
    })
    .to_string()
}

async fn session(
    State(service): State<Shared>,
    Path((build_id, session_id)): Path<(String, String)>,
) -> (StatusCode, String) {
    service.session_calls.lock().unwrap().push(session_id.clone());

    if service
        .failing_sessions
        .lock()
        .unwrap()
        .contains(&session_id)
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, "session store down".to_string());
    }

    let body = json!({
        "build_id": build_id,
        "session_id": session_id,
        "device": session_id,
        "test_count": 2,
        "test_details": {
            "BullsEyeUITests/BullsEyeUITests": {
                "testScreenshot": {"status": "passed"}
            }
        },
        "test_status": {"SUCCESS": 2}
    });
    (StatusCode::OK, body.to_string())
}

pub fn router(service: Shared) -> Router {
    Router::new()
        .route("/app-automate/upload", post(upload_app))
        .route("/app-automate/xcuitest/test-suite", post(upload_suite))
        .route("/app-automate/xcuitest/build", post(execute))
        .route("/app-automate/xcuitest/builds/{build_id}", get(build_status))
        .route(
            "/app-automate/xcuitest/builds/{build_id}/sessions/{session_id}",
            get(session),
        )
        .with_state(service)
}

/// Serves the fake service on an ephemeral port and returns its base URL.
pub async fn serve(service: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(service)).await.unwrap();
    });

    format!("http://{}", addr)
}
