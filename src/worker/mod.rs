// Worker process: executes operations received over loopback HTTP

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::ops::{self, Operation, OperationResult};

/// Written to stdout, followed by the bound port, once the worker accepts requests
pub const READY_PREFIX: &str = "ALLURE_RELAY_WORKER_READY:";
pub const TASK_PATH: &str = "/task";
pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
struct WorkerState {
    /// Task requests currently being executed
    in_flight: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

fn router(state: WorkerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(TASK_PATH, post(task_handler).options(preflight_handler))
        .fallback(fallback_handler)
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<WorkerState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "queueDepth": state.in_flight.load(Ordering::SeqCst),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": crate::time::now_rfc3339(),
    }))
}

async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

async fn fallback_handler(method: Method) -> StatusCode {
    if method == Method::OPTIONS {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn task_handler(
    State(state): State<WorkerState>,
    body: axum::body::Bytes,
) -> Json<OperationResult> {
    let operation: Operation = match serde_json::from_slice(&body) {
        Ok(operation) => operation,
        Err(e) => {
            warn!("Rejected task body: {}", e);
            return Json(OperationResult::err(format!("Invalid operation: {}", e)));
        }
    };

    if operation == Operation::Shutdown {
        info!("Shutdown requested");
        state.shutdown.notify_one();
        return Json(OperationResult::ok(None));
    }

    if operation == Operation::Health {
        return Json(OperationResult::ok(Some(json!({
            "status": "ok",
            "queueDepth": state.in_flight.load(Ordering::SeqCst),
        }))));
    }

    state.in_flight.fetch_add(1, Ordering::SeqCst);
    let result = ops::apply(&operation).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    debug!("{} -> success={}", operation.kind(), result.success);
    Json(result)
}

/// Bind to `port` on loopback, falling back to any free port when it is taken
pub async fn bind(port: u16) -> Result<TcpListener> {
    match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => Ok(listener),
        Err(e) if port != 0 => {
            warn!("Port {} unavailable ({}); picking another", port, e);
            TcpListener::bind(("127.0.0.1", 0))
                .await
                .context("Failed to bind loopback listener")
        }
        Err(e) => Err(e).context("Failed to bind loopback listener"),
    }
}

/// Serve until a `shutdown` operation arrives
pub async fn serve(listener: TcpListener) -> Result<()> {
    let shutdown = Arc::new(Notify::new());
    let state = WorkerState {
        in_flight: Arc::new(AtomicUsize::new(0)),
        shutdown: shutdown.clone(),
    };

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.notified().await;
            debug!("Worker shutting down");
        })
        .await
        .context("Worker server failed")
}

/// Entry point of `allure-relay worker`: bind, announce the port, serve
pub async fn run(port: u16) -> Result<()> {
    let listener = bind(port).await?;
    let addr: SocketAddr = listener.local_addr()?;

    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}{}", READY_PREFIX, addr.port())?;
        stdout.flush()?;
    }

    info!("Worker listening on http://{}", addr);
    serve(listener).await
}
