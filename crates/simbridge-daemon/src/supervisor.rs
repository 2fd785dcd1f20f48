//! Supervisor daemon: spawns one session process per client.
//!
//! The supervisor serves exactly one endpoint,
//! `POST /api/startSimulation`. For each request it allocates a free TCP
//! port, spawns a session process (this same binary with the hidden
//! `session` subcommand), pipes the platform XML to the child's stdin,
//! and reads the child's single-line init report from its stdout. The
//! child is then handed to a detached reaper task so the supervisor
//! never accumulates zombies; the session lives on its own until the
//! client terminates it or it crashes.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Lower bound (inclusive) of the session port range.
pub const SESSION_PORT_MIN: u16 = 10000;
/// Upper bound (exclusive) of the session port range.
pub const SESSION_PORT_MAX: u16 = 20000;
/// How many random candidates to try before giving up.
const MAX_PORT_ATTEMPTS: u32 = 256;
/// How long a session process gets to report its init outcome.
const INIT_REPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Supervisor-side failures while setting up a session.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// No free port found within the attempt limit.
    #[error("no free session port found after {MAX_PORT_ATTEMPTS} attempts")]
    PortsExhausted,

    /// A bind probe failed for a reason other than the port being taken.
    #[error("port probe failed: {0}")]
    PortProbe(std::io::Error),

    /// The session process could not be spawned or written to.
    #[error("cannot spawn session process: {0}")]
    Spawn(std::io::Error),

    /// The session process never produced its init report.
    #[error("session process did not report within {}s", INIT_REPORT_TIMEOUT.as_secs())]
    InitTimeout,

    /// The session process exited before reporting.
    #[error("session process exited during initialization")]
    InitEof,

    /// The init report line could not be parsed.
    #[error("unreadable init report from session process: {0}")]
    InitReport(String),
}

/// Flags the supervisor forwards to every session process.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Real-time sleep per controller loop pass, in microseconds.
    pub sleep_us: u64,
    /// Verbose engine logging in sessions.
    pub simulation_logging: bool,
    /// Daemon-level logging in sessions.
    pub daemon_logging: bool,
}

/// Shared state of the supervisor server.
#[derive(Debug)]
pub struct SupervisorState {
    config: SupervisorConfig,
}

impl SupervisorState {
    /// Create supervisor state from the forwarded configuration.
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }
}

/// Body of `POST /api/startSimulation`.
#[derive(Debug, Deserialize)]
struct StartSimulationRequest {
    /// XML platform description, passed through to the engine.
    platform_xml: String,
    /// Host the controller will run on.
    controller_hostname: String,
}

/// The one-line report a session process writes to stdout once its
/// launch sequence has succeeded or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    /// Whether the launch sequence succeeded.
    pub success: bool,
    /// Cause of the failure, when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_cause: Option<String>,
}

impl InitReport {
    /// A successful report.
    pub fn ok() -> Self {
        Self {
            success: true,
            failure_cause: None,
        }
    }

    /// A failed report with a cause.
    pub fn failed(cause: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            failure_cause: Some(cause.to_string()),
        }
    }
}

/// Build the supervisor router.
pub fn supervisor_router(state: Arc<SupervisorState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/startSimulation", post(start_simulation))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle `POST /api/startSimulation`.
async fn start_simulation(State(state): State<Arc<SupervisorState>>, body: String) -> Json<Value> {
    let request: StartSimulationRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(json!({
                "success": false,
                "failure_cause": format!("invalid request body: {e}"),
            }));
        }
    };

    let port = match allocate_session_port() {
        Ok(port) => port,
        Err(e) => {
            warn!(error = %e, "port allocation failed");
            return Json(json!({ "success": false, "failure_cause": e.to_string() }));
        }
    };

    match spawn_session(&state.config, port, &request).await {
        Ok(report) if report.success => {
            info!(port, host = %request.controller_hostname, "session started");
            Json(json!({ "success": true, "port_number": port }))
        }
        Ok(report) => {
            let cause = report
                .failure_cause
                .unwrap_or_else(|| "unknown initialization failure".to_owned());
            info!(%cause, "session failed to initialize");
            Json(json!({ "success": false, "failure_cause": cause }))
        }
        Err(e) => {
            warn!(error = %e, "session spawn failed");
            Json(json!({ "success": false, "failure_cause": e.to_string() }))
        }
    }
}

/// Find a free TCP port for a new session.
///
/// Picks random candidates in `[SESSION_PORT_MIN, SESSION_PORT_MAX)` and
/// probes each with a bind. A taken port ("address in use") means try
/// again; any other bind error is fatal. Ports held by live sessions are
/// excluded automatically, since those sessions keep them bound.
///
/// # Errors
///
/// [`SupervisorError::PortsExhausted`] after the attempt limit,
/// [`SupervisorError::PortProbe`] on an unexpected bind failure.
pub fn allocate_session_port() -> Result<u16, SupervisorError> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_PORT_ATTEMPTS {
        let candidate = rng.gen_range(SESSION_PORT_MIN..SESSION_PORT_MAX);
        match std::net::TcpListener::bind(("0.0.0.0", candidate)) {
            Ok(probe) => {
                drop(probe);
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {}
            Err(e) => return Err(SupervisorError::PortProbe(e)),
        }
    }
    Err(SupervisorError::PortsExhausted)
}

/// Spawn a session process and wait for its init report.
///
/// The child gets the platform XML on stdin and reports on stdout; its
/// stderr flows into the supervisor's stderr. Whatever the outcome, the
/// child ends up owned by a detached reaper task.
async fn spawn_session(
    config: &SupervisorConfig,
    port: u16,
    request: &StartSimulationRequest,
) -> Result<InitReport, SupervisorError> {
    let exe = std::env::current_exe().map_err(SupervisorError::Spawn)?;

    let mut command = Command::new(exe);
    command
        .arg("session")
        .arg("--port")
        .arg(port.to_string())
        .arg("--controller-hostname")
        .arg(&request.controller_hostname)
        .arg("--sleep-us")
        .arg(config.sleep_us.to_string());
    if config.simulation_logging {
        command.arg("--simulation-logging");
    }
    if config.daemon_logging {
        command.arg("--daemon-logging");
    }
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = command.spawn().map_err(SupervisorError::Spawn)?;

    // Ship the platform XML and close stdin so the child sees EOF.
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(request.platform_xml.as_bytes())
            .await
            .map_err(SupervisorError::Spawn)?;
        stdin.shutdown().await.map_err(SupervisorError::Spawn)?;
    }

    let stdout = child.stdout.take().ok_or(SupervisorError::InitEof)?;
    let mut lines = BufReader::new(stdout).lines();

    let line = match tokio::time::timeout(INIT_REPORT_TIMEOUT, lines.next_line()).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => {
            reap(child);
            return Err(SupervisorError::InitEof);
        }
        Ok(Err(e)) => {
            reap(child);
            return Err(SupervisorError::InitReport(e.to_string()));
        }
        Err(_elapsed) => {
            let _ = child.start_kill();
            reap(child);
            return Err(SupervisorError::InitTimeout);
        }
    };

    reap(child);
    serde_json::from_str(&line).map_err(|e| SupervisorError::InitReport(e.to_string()))
}

/// Hand a child to a detached reaper task.
///
/// The session outlives this request by design; awaiting it on a
/// background task is what collects its exit status eventually, so the
/// supervisor needs no signal handling.
fn reap(mut child: tokio::process::Child) {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => info!(%status, "session process exited"),
            Err(e) => warn!(error = %e, "cannot await session process"),
        }
    });
}
