use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart},
    http::StatusCode,
    routing::post,
};
use label_lens::{
    AnalysisEngine, AnalysisError, AnalysisRequest, AnalysisService, AnalysisSession,
    AnalysisWidget, FAILURE_MESSAGE, HttpAnalysisService, InMemoryPreviewStore, LabelSet,
    SelectedFile, TextInput, WidgetState,
};
use serde_json::{Value, json};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Checks the multipart body and answers with 70/30 for the submitted labels.
async fn well_formed(mut multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let mut file_ok = false;
    let mut labels = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                file_ok = field.file_name() == Some("photo.png")
                    && field.content_type() == Some("image/png");
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                file_ok &= bytes.len() == 2_000_000;
            }
            Some("text_input") => {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                let input: TextInput =
                    serde_json::from_str(&text).map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;
                labels = Some(input.text_list);
            }
            _ => return Err(StatusCode::BAD_REQUEST),
        }
    }

    match labels {
        Some(labels) if file_ok && labels == ["red", "blue"] => Ok(Json(json!({
            "labels": labels,
            "probabilities": [70, 30],
        }))),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

fn spawn_server() -> String {
    let app = Router::new()
        .route("/compute_similarity/", post(well_formed))
        .route(
            "/missing_probabilities/",
            post(|_body: Bytes| async { Json(json!({ "labels": ["red", "blue"] })) }),
        )
        .route(
            "/mismatched/",
            post(|_body: Bytes| async { Json(json!({ "labels": ["red", "blue"], "probabilities": [1.0] })) }),
        )
        .route(
            "/short/",
            post(|_body: Bytes| async { Json(json!({ "labels": ["red"], "probabilities": [100.0] })) }),
        )
        .route(
            "/broken/",
            post(|_body: Bytes| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        )
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024));

    let (addr_tx, addr_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    format!("http://{}", addr_rx.recv().unwrap())
}

fn photo() -> SelectedFile {
    SelectedFile::new("photo.png", "image/png", vec![0x42u8; 2_000_000])
}

fn request() -> AnalysisRequest {
    AnalysisRequest {
        file: photo(),
        labels: LabelSet::new(["red", "blue"]),
    }
}

fn session(endpoint: String) -> AnalysisSession {
    let service = HttpAnalysisService::new(endpoint, TIMEOUT).unwrap();
    let widget = AnalysisWidget::new(InMemoryPreviewStore::new(), LabelSet::new(["red", "blue"]));
    AnalysisSession::new(widget, AnalysisEngine::new(service))
}

#[test]
fn photo_is_analyzed_end_to_end() {
    let base = spawn_server();
    let mut session = session(format!("{base}/compute_similarity/"));

    session.select_file(photo()).unwrap();
    assert_eq!(session.widget().state(), WidgetState::Ready);

    assert!(session.submit());
    assert_eq!(session.widget().state(), WidgetState::Analyzing);
    assert!(!session.submit());

    assert_eq!(session.wait(TIMEOUT), WidgetState::Succeeded);
    let rows: Vec<String> = session.widget().rows().iter().map(ToString::to_string).collect();
    assert_eq!(rows, ["red 70.0%", "blue 30.0%"]);
}

#[test]
fn missing_probabilities_fail_the_request() {
    let base = spawn_server();
    let mut session = session(format!("{base}/missing_probabilities/"));

    session.select_file(photo()).unwrap();
    assert!(session.submit());

    assert_eq!(session.wait(TIMEOUT), WidgetState::Failed);
    assert!(session.widget().result().is_none());
    assert_eq!(session.widget().error_message(), Some(FAILURE_MESSAGE));
}

#[test]
fn service_errors_are_classified() {
    let base = spawn_server();

    let mut broken = HttpAnalysisService::new(format!("{base}/broken/"), TIMEOUT).unwrap();
    match broken.analyze(&request()) {
        Err(AnalysisError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("expected a status error, got {other:?}"),
    }

    let mut mismatched = HttpAnalysisService::new(format!("{base}/mismatched/"), TIMEOUT).unwrap();
    assert!(matches!(
        mismatched.analyze(&request()),
        Err(AnalysisError::LengthMismatch {
            labels: 2,
            probabilities: 1
        })
    ));

    let mut short = HttpAnalysisService::new(format!("{base}/short/"), TIMEOUT).unwrap();
    assert!(matches!(
        short.analyze(&request()),
        Err(AnalysisError::LabelCountMismatch {
            submitted: 2,
            returned: 1
        })
    ));
}

#[test]
fn partial_result_leaves_widget_failed() {
    let base = spawn_server();
    let mut session = session(format!("{base}/short/"));

    session.select_file(photo()).unwrap();
    assert!(session.submit());

    assert_eq!(session.wait(TIMEOUT), WidgetState::Failed);
    assert!(session.widget().rows().is_empty());
}

#[test]
fn unreachable_service_is_a_transport_error() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut service =
        HttpAnalysisService::new(format!("http://127.0.0.1:{port}/compute_similarity/"), TIMEOUT)
            .unwrap();
    assert!(matches!(
        service.analyze(&request()),
        Err(AnalysisError::Transport(_))
    ));
}
