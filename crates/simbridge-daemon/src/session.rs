//! Session HTTP server: the REST surface of one running simulation.
//!
//! Handlers marshal JSON requests into controller calls and controller
//! results back into the response envelope. They are reentrant, hold no
//! simulation state of their own, and may run concurrently; everything
//! stateful lives behind the [`ControllerHandle`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/alive` | Liveness probe |
//! | `POST` | `/api/terminateSimulation` | Stop the simulation and exit |
//! | `POST` | `/api/getTime` | Current simulated time |
//! | `POST` | `/api/getAllHostnames` | Hostnames of the platform |
//! | `POST` | `/api/advanceTime` | Advance the time horizon |
//! | `POST` | `/api/addService` | Create and start a compute service |
//! | `POST` | `/api/createStandardJob` | Create a one-task standard job |
//! | `POST` | `/api/submitStandardJob` | Submit a job to a service |
//! | `POST` | `/api/getSimulationEvents` | Drain pending events |
//! | `POST` | `/api/waitForNextSimulationEvent` | Block for the next event |
//! | `POST` | `/api/standardJobGetNumTasks` | Task count of a job |

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use simbridge_core::{ControllerHandle, RunningSimulation, ServiceSpec, TaskRequest};

use crate::api::{api_failure, api_ok, parse_body};

/// Shared state of one session process.
pub struct SessionState {
    /// The controller operations, callable from any handler.
    pub controller: Arc<ControllerHandle>,
    /// The simulator thread, joined on termination.
    simulation_thread: Mutex<Option<JoinHandle<()>>>,
    /// Signals the HTTP server to shut down gracefully.
    shutdown: Notify,
}

impl SessionState {
    /// Wrap a launched simulation into session state.
    pub fn new(running: RunningSimulation) -> Self {
        Self {
            controller: running.controller,
            simulation_thread: Mutex::new(Some(running.simulation_thread)),
            shutdown: Notify::new(),
        }
    }

    /// Resolves once `terminateSimulation` has been handled.
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }
}

/// Build the session router.
///
/// CORS allows any origin (the typical client is a browser dashboard on
/// another port) and every request is traced.
pub fn session_router(state: Arc<SessionState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/alive", get(alive))
        .route("/api/terminateSimulation", post(terminate_simulation))
        .route("/api/getTime", post(get_time))
        .route("/api/getAllHostnames", post(get_all_hostnames))
        .route("/api/advanceTime", post(advance_time))
        .route("/api/addService", post(add_service))
        .route("/api/createStandardJob", post(create_standard_job))
        .route("/api/submitStandardJob", post(submit_standard_job))
        .route("/api/getSimulationEvents", post(get_simulation_events))
        .route(
            "/api/waitForNextSimulationEvent",
            post(wait_for_next_simulation_event),
        )
        .route("/api/standardJobGetNumTasks", post(standard_job_get_num_tasks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/advanceTime`.
#[derive(Debug, serde::Deserialize)]
struct AdvanceTimeRequest {
    /// Simulated seconds to advance by.
    increment: f64,
}

/// Body of `POST /api/submitStandardJob`.
#[derive(Debug, serde::Deserialize)]
struct SubmitJobRequest {
    job_name: String,
    compute_service_name: String,
}

/// Body of `POST /api/standardJobGetNumTasks`.
#[derive(Debug, serde::Deserialize)]
struct NumTasksRequest {
    job_name: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Liveness probe.
async fn alive() -> Json<Value> {
    api_ok(json!({ "alive": true }))
}

/// Stop the simulation, join the simulator thread, and shut the server
/// down. The process exits once the response has been written.
async fn terminate_simulation(State(state): State<Arc<SessionState>>) -> Json<Value> {
    info!("terminating session");
    state.controller.stop();

    let handle = state
        .simulation_thread
        .lock()
        .expect("simulation thread mutex poisoned")
        .take();
    if let Some(handle) = handle {
        let joined = tokio::task::spawn_blocking(move || handle.join()).await;
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(_)) => error!("simulation thread panicked before termination"),
            Err(e) => error!(error = %e, "cannot join simulation thread"),
        }
    }

    state.shutdown.notify_one();
    api_ok(Value::Null)
}

/// Current simulated time in seconds.
async fn get_time(State(state): State<Arc<SessionState>>) -> Json<Value> {
    api_ok(json!({ "time": state.controller.simulation_time() }))
}

/// Hostnames of the simulated platform, in stable order.
async fn get_all_hostnames(State(state): State<Arc<SessionState>>) -> Json<Value> {
    api_ok(json!({ "hostnames": state.controller.hostnames() }))
}

/// Advance the simulation's time horizon. Non-blocking; the controller
/// catches up on a later loop pass.
async fn advance_time(State(state): State<Arc<SessionState>>, body: String) -> Json<Value> {
    let request: AdvanceTimeRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(cause) => return api_failure(cause),
    };
    state.controller.advance_time(request.increment);
    api_ok(Value::Null)
}

/// Create a compute service; replies with its name.
async fn add_service(State(state): State<Arc<SessionState>>, body: String) -> Json<Value> {
    let spec: ServiceSpec = match parse_body(&body) {
        Ok(spec) => spec,
        Err(cause) => return api_failure(cause),
    };
    match state.controller.add_service(&spec) {
        Ok(service_name) => api_ok(json!({ "service_name": service_name })),
        Err(e) => api_failure(e),
    }
}

/// Create a one-task standard job; replies with its name.
async fn create_standard_job(State(state): State<Arc<SessionState>>, body: String) -> Json<Value> {
    let request: TaskRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(cause) => return api_failure(cause),
    };
    match state.controller.create_standard_job(&request) {
        Ok(job_name) => api_ok(json!({ "job_name": job_name })),
        Err(e) => api_failure(e),
    }
}

/// Submit a registered job to a registered compute service.
async fn submit_standard_job(State(state): State<Arc<SessionState>>, body: String) -> Json<Value> {
    let request: SubmitJobRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(cause) => return api_failure(cause),
    };
    match state
        .controller
        .submit_standard_job(&request.job_name, &request.compute_service_name)
    {
        Ok(()) => api_ok(Value::Null),
        Err(e) => api_failure(e),
    }
}

/// Drain all events currently awaiting delivery.
async fn get_simulation_events(State(state): State<Arc<SessionState>>) -> Json<Value> {
    let events = state.controller.drain_events();
    api_ok(json!({ "events": events }))
}

/// Block until the next simulation event and return it.
async fn wait_for_next_simulation_event(State(state): State<Arc<SessionState>>) -> Json<Value> {
    let controller = Arc::clone(&state.controller);
    let waited = tokio::task::spawn_blocking(move || controller.wait_for_next_event()).await;
    match waited {
        Ok(event) => api_ok(json!({ "event": event })),
        Err(e) => api_failure(format!("cannot wait for the next event: {e}")),
    }
}

/// Number of tasks in a registered standard job.
async fn standard_job_get_num_tasks(
    State(state): State<Arc<SessionState>>,
    body: String,
) -> Json<Value> {
    let request: NumTasksRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(cause) => return api_failure(cause),
    };
    match state.controller.job_num_tasks(&request.job_name) {
        Ok(num_tasks) => api_ok(json!({ "num_tasks": num_tasks })),
        Err(e) => api_failure(e),
    }
}
