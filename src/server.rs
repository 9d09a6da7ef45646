//! HTTP entry point
//!
//! `POST /` and `POST /run` accept `{email, secret, url}` and answer with the
//! run's `WorkflowResult`. `GET /health` reports run counters and `GET /live`
//! is a liveness probe. Run bodies are capped at `MAX_RUN_BODY_BYTES`; every
//! rejection is answered with a JSON `{"error": ...}` body.

use crate::workflow::{Identity, StepLoopController, WorkflowResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use warp::http::{Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::Filter;

/// Run counters exposed on `/health`
#[derive(Debug, Default)]
pub struct RunStats {
    started: AtomicU64,
    completed: AtomicU64,
    aborted: AtomicU64,
}

impl RunStats {
    fn run_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn run_finished(&self, result: &WorkflowResult) {
        if result.termination.is_aborted() {
            self.aborted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> RunCounters {
        RunCounters {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub started: u64,
    pub completed: u64,
    pub aborted: u64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    runs: RunCounters,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: String,
}

/// Shared state behind every route
pub struct ServerState {
    pub controller: Arc<StepLoopController>,
    pub expected_secret: String,
    pub stats: RunStats,
}

impl ServerState {
    pub fn new(controller: Arc<StepLoopController>, expected_secret: impl Into<String>) -> Self {
        Self {
            controller,
            expected_secret: expected_secret.into(),
            stats: RunStats::default(),
        }
    }
}

/// A request that failed validation: status plus the message for the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    pub status: StatusCode,
    pub message: &'static str,
}

impl Rejected {
    const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

/// Validated run request
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub identity: Identity,
    pub url: String,
}

/// Check method, body, required fields and secret (pure function)
pub fn validate_run_request(
    method: &Method,
    body: &[u8],
    expected_secret: &str,
) -> Result<RunRequest, Rejected> {
    if *method != Method::POST {
        return Err(Rejected::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "Only POST allowed",
        ));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|_| Rejected::new(StatusCode::BAD_REQUEST, "Invalid JSON"))?;

    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let (Some(email), Some(secret), Some(url)) = (field("email"), field("secret"), field("url"))
    else {
        return Err(Rejected::new(StatusCode::BAD_REQUEST, "Missing fields"));
    };

    if secret != expected_secret {
        return Err(Rejected::new(StatusCode::FORBIDDEN, "Invalid secret"));
    }

    Ok(RunRequest {
        identity: Identity::new(email, secret),
        url,
    })
}

/// Largest accepted run request body
pub const MAX_RUN_BODY_BYTES: u64 = 64 * 1024;

fn with_state(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (Arc<ServerState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes, ready for `warp::serve` or `warp::test`
pub fn routes(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<ServerState>| {
            warp::reply::json(&HealthResponse {
                status: "healthy",
                version: env!("CARGO_PKG_VERSION"),
                runs: state.stats.snapshot(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
        });

    let live = warp::path("live")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&LivenessResponse {
                alive: true,
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
        });

    let run_path = warp::path::end()
        .or(warp::path("run").and(warp::path::end()))
        .unify();

    let post_run = run_path
        .clone()
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_RUN_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(|body: Bytes, state: Arc<ServerState>| {
            handle_run(Method::POST, body, state)
        });

    // Any other method gets the 405 body without reading a request body
    let other_run = run_path
        .and(warp::method())
        .and_then(|method: Method| async move {
            if method == Method::POST {
                Err(warp::reject::not_found())
            } else {
                Ok(method)
            }
        })
        .and(with_state(state))
        .and_then(|method: Method, state: Arc<ServerState>| {
            handle_run(method, Bytes::new(), state)
        });

    health
        .or(live)
        .or(post_run)
        .or(other_run)
        .with(warp::cors().allow_any_origin())
        .recover(handle_rejection)
}

/// JSON error bodies for requests no route accepted
async fn handle_rejection(
    rejection: warp::Rejection,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        warn!("Unhandled rejection: {:?}", rejection);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}

async fn handle_run(
    method: Method,
    body: Bytes,
    state: Arc<ServerState>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let request = match validate_run_request(&method, &body, &state.expected_secret) {
        Ok(request) => request,
        Err(rejected) => {
            warn!(
                status = rejected.status.as_u16(),
                "Rejected run request: {}",
                rejected.message
            );
            return Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "error": rejected.message })),
                rejected.status,
            ));
        }
    };

    state.stats.run_started();
    let result = state.controller.run(&request.identity, &request.url).await;
    state.stats.run_finished(&result);

    Ok(warp::reply::with_status(
        warp::reply::json(&result),
        StatusCode::OK,
    ))
}

/// HTTP server wrapping a controller
pub struct QuizServer {
    state: Arc<ServerState>,
    port: u16,
}

impl QuizServer {
    pub fn new(state: Arc<ServerState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<(), warp::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let (bound, server) =
            warp::serve(routes(self.state)).try_bind_with_graceful_shutdown(addr, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
            })?;

        info!("Listening on {}", bound);
        server.await;
        info!("Server stopped");
        Ok(())
    }
}
