//! HTTP entry point tests driven through `warp::test`

use quizchain::server::{routes, ServerState, MAX_RUN_BODY_BYTES};
use quizchain::testing::mocks::{finished, MockExtractor, MockReasoner, MockRenderer, MockSubmitter};
use quizchain::workflow::{StepLoopController, WorkflowSettings};
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;

const SECRET: &str = "s3cret";

fn state() -> Arc<ServerState> {
    let renderer = MockRenderer::new()
        .with_page(
            "https://quiz.example/q1",
            r#"<p>Capital of France?</p><p>POST to /submit</p>"#,
        )
        .with_page("https://quiz.example/blank", "<p>nothing to post</p>");

    let controller = StepLoopController::new(
        Arc::new(renderer),
        Arc::new(MockReasoner::fixed("Paris")),
        Arc::new(MockExtractor::new()),
        Arc::new(MockSubmitter::always(finished())),
        WorkflowSettings::default(),
    );

    Arc::new(ServerState::new(Arc::new(controller), SECRET))
}

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_get_on_run_endpoint_is_method_not_allowed() {
    let api = routes(state());

    let response = warp::test::request()
        .method("GET")
        .path("/")
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response.body())["error"], "Only POST allowed");
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let api = routes(state());

    let response = warp::test::request()
        .method("POST")
        .path("/run")
        .body("{not json")
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response.body())["error"], "Invalid JSON");
}

#[tokio::test]
async fn test_missing_fields_is_bad_request() {
    let api = routes(state());

    let response = warp::test::request()
        .method("POST")
        .path("/")
        .json(&json!({ "email": "a@b.c", "secret": SECRET }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response.body())["error"], "Missing fields");
}

#[tokio::test]
async fn test_wrong_secret_is_forbidden() {
    let state = state();
    let api = routes(state.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/")
        .json(&json!({ "email": "a@b.c", "secret": "guess", "url": "https://quiz.example/q1" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response.body())["error"], "Invalid secret");
    assert_eq!(state.stats.snapshot().started, 0);
}

#[tokio::test]
async fn test_valid_request_runs_workflow() {
    let api = routes(state());

    let response = warp::test::request()
        .method("POST")
        .path("/run")
        .json(&json!({ "email": "a@b.c", "secret": SECRET, "url": "https://quiz.example/q1" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response.body());
    assert_eq!(result["done"], true);
    assert_eq!(result["termination"], "completed");
    assert_eq!(result["stepLog"][0]["computedAnswer"], "Paris");
    assert_eq!(
        result["stepLog"][0]["submitUrl"],
        "https://quiz.example/submit"
    );
}

#[tokio::test]
async fn test_aborted_run_is_still_ok_with_structured_error() {
    let api = routes(state());

    let response = warp::test::request()
        .method("POST")
        .path("/")
        .json(&json!({ "email": "a@b.c", "secret": SECRET, "url": "https://quiz.example/blank" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response.body());
    assert_eq!(result["done"], false);
    assert_eq!(result["termination"], "submit_url_not_found");
    assert_eq!(result["markupSample"], "<p>nothing to post</p>");
}

#[tokio::test]
async fn test_health_reports_run_counters() {
    let state = state();
    let api = routes(state.clone());

    for url in ["https://quiz.example/q1", "https://quiz.example/blank"] {
        warp::test::request()
            .method("POST")
            .path("/")
            .json(&json!({ "email": "a@b.c", "secret": SECRET, "url": url }))
            .reply(&api)
            .await;
    }

    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response.body());
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["runs"], json!({ "started": 2, "completed": 1, "aborted": 1 }));
}

#[tokio::test]
async fn test_liveness_probe() {
    let api = routes(state());

    let response = warp::test::request()
        .method("GET")
        .path("/live")
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response.body())["alive"], true);
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_running() {
    let state = state();
    let api = routes(state.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/run")
        .body(vec![b' '; MAX_RUN_BODY_BYTES as usize + 1])
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response.body())["error"], "Payload too large");
    assert_eq!(state.stats.snapshot().started, 0);
}

#[tokio::test]
async fn test_body_at_limit_is_read() {
    let api = routes(state());

    let mut padded = br#"{"email":"a@b.c","secret":"s3cret","url":"https://quiz.example/q1"}"#.to_vec();
    padded.resize(MAX_RUN_BODY_BYTES as usize, b' ');

    let response = warp::test::request()
        .method("POST")
        .path("/")
        .body(padded)
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response.body())["done"], true);
}

#[tokio::test]
async fn test_unknown_path_is_json_not_found() {
    let api = routes(state());

    let response = warp::test::request()
        .method("GET")
        .path("/nowhere")
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response.body())["error"], "Not found");
}
