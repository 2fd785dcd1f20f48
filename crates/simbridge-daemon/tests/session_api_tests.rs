//! Integration tests for the session REST API.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt`
//! without a TCP listener; behind the router sits a real simulation
//! (controller main loop on its own thread), so these exercise the full
//! request-to-simulation path.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use simbridge_core::{launch, LaunchSpec};
use simbridge_daemon::{session_router, SessionState};
use tower::ServiceExt;

const XML: &str = r#"<?xml version='1.0'?>
<platform version="4.1">
  <zone id="AS0" routing="Full">
    <host id="ControllerHost" speed="1Gf" core="1"/>
    <host id="ComputeHost" speed="100f" core="4"/>
  </zone>
</platform>"#;

fn make_session() -> (Arc<SessionState>, Router) {
    let running = launch(LaunchSpec {
        platform_xml: XML.to_owned(),
        controller_hostname: "ControllerHost".to_owned(),
        sleep_us: 50,
        simulation_logging: false,
    })
    .unwrap();
    let state = Arc::new(SessionState::new(running));
    let router = session_router(Arc::clone(&state));
    (state, router)
}

async fn post(router: &Router, path: &str, body: &str) -> Value {
    let response = router
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "{path} not OK");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post_ok(router: &Router, path: &str, body: &str) -> Value {
    let json = post(router, path, body).await;
    assert_eq!(
        json["wrench_api_request_success"], true,
        "{path} failed: {json}"
    );
    json
}

/// Poll `getTime` until it reaches `target` simulated seconds.
async fn wait_for_time(router: &Router, target: f64) -> f64 {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let json = post_ok(router, "/api/getTime", "").await;
        let now = json["time"].as_f64().unwrap();
        if now >= target {
            return now;
        }
        assert!(Instant::now() < deadline, "never reached t={target}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn add_bare_metal_service(router: &Router) -> String {
    let json = post_ok(
        router,
        "/api/addService",
        r#"{"service_type":"compute_baremetal","head_host":"ComputeHost"}"#,
    )
    .await;
    json["service_name"].as_str().unwrap().to_owned()
}

async fn create_job(router: &Router, flops: f64) -> String {
    let body = format!(
        r#"{{"task_name":"t","task_flops":{flops},"min_num_cores":1,"max_num_cores":1}}"#
    );
    let json = post_ok(router, "/api/createStandardJob", &body).await;
    json["job_name"].as_str().unwrap().to_owned()
}

/// Submit, retrying while the service is still being started by the
/// controller loop.
async fn submit_job(router: &Router, job: &str, service: &str) {
    let body = format!(r#"{{"job_name":"{job}","compute_service_name":"{service}"}}"#);
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let json = post(router, "/api/submitStandardJob", &body).await;
        if json["wrench_api_request_success"] == true {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "submission never accepted: {json}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn alive_answers() {
    let (state, router) = make_session();

    let response = router
        .clone()
        .oneshot(Request::get("/api/alive").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["alive"], true);
    assert_eq!(json["wrench_api_request_success"], true);

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn time_starts_at_zero() {
    let (state, router) = make_session();
    let json = post_ok(&router, "/api/getTime", "").await;
    assert_eq!(json["time"].as_f64().unwrap(), 0.0);
    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn hostnames_are_stable() {
    let (state, router) = make_session();

    let first = post_ok(&router, "/api/getAllHostnames", "").await;
    let second = post_ok(&router, "/api/getAllHostnames", "").await;
    assert_eq!(first["hostnames"], second["hostnames"]);
    assert_eq!(
        first["hostnames"],
        serde_json::json!(["ControllerHost", "ComputeHost"])
    );

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn advance_time_without_events() {
    let (state, router) = make_session();

    post_ok(&router, "/api/advanceTime", r#"{"increment": 10}"#).await;
    let now = wait_for_time(&router, 10.0).await;
    assert!(now >= 10.0);

    let json = post_ok(&router, "/api/getSimulationEvents", "").await;
    assert_eq!(json["events"], serde_json::json!([]));

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn happy_path_completion_event() {
    let (state, router) = make_session();

    let service = add_bare_metal_service(&router).await;
    let job = create_job(&router, 500.0).await;
    submit_job(&router, &job, &service).await;

    let json = post_ok(&router, "/api/waitForNextSimulationEvent", "").await;
    let event = &json["event"];
    assert_eq!(event["event_type"], "job_completion");
    assert_eq!(event["job_name"], job.as_str());
    assert_eq!(event["compute_service_name"], service.as_str());
    assert!(event["end_date"].as_f64().unwrap() > event["submit_date"].as_f64().unwrap());
    assert!(event.get("failure_cause").is_none());

    // Delivered exactly once.
    let json = post_ok(&router, "/api/getSimulationEvents", "").await;
    assert_eq!(json["events"], serde_json::json!([]));

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_service_type_fails_and_session_survives() {
    let (state, router) = make_session();

    let json = post(
        &router,
        "/api/addService",
        r#"{"service_type":"quantum","head_host":"ComputeHost"}"#,
    )
    .await;
    assert_eq!(json["wrench_api_request_success"], false);
    assert!(json["failure_cause"].as_str().unwrap().contains("quantum"));

    // The session keeps answering.
    post_ok(&router, "/api/getAllHostnames", "").await;

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_unknown_entities_fails() {
    let (state, router) = make_session();

    let json = post(
        &router,
        "/api/submitStandardJob",
        r#"{"job_name":"standard_job_42","compute_service_name":"compute_baremetal_1"}"#,
    )
    .await;
    assert_eq!(json["wrench_api_request_success"], false);
    assert!(json["failure_cause"]
        .as_str()
        .unwrap()
        .contains("standard_job_42"));

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_is_an_envelope_failure() {
    let (state, router) = make_session();

    let json = post(&router, "/api/advanceTime", "{not json").await;
    assert_eq!(json["wrench_api_request_success"], false);
    assert!(json["failure_cause"]
        .as_str()
        .unwrap()
        .contains("invalid request body"));

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_field_is_an_envelope_failure() {
    let (state, router) = make_session();

    let json = post(&router, "/api/advanceTime", "{}").await;
    assert_eq!(json["wrench_api_request_success"], false);

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn num_tasks_follows_the_job_lifecycle() {
    let (state, router) = make_session();

    let service = add_bare_metal_service(&router).await;
    let job = create_job(&router, 100.0).await;

    let body = format!(r#"{{"job_name":"{job}"}}"#);
    let json = post_ok(&router, "/api/standardJobGetNumTasks", &body).await;
    assert_eq!(json["num_tasks"], 1);

    // After the terminal event the job is forgotten.
    submit_job(&router, &job, &service).await;
    post_ok(&router, "/api/waitForNextSimulationEvent", "").await;
    let json = post(&router, "/api/standardJobGetNumTasks", &body).await;
    assert_eq!(json["wrench_api_request_success"], false);

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn job_failure_event_carries_cause() {
    let (state, router) = make_session();

    let service = add_bare_metal_service(&router).await;
    let json = post_ok(
        &router,
        "/api/createStandardJob",
        r#"{"task_name":"wide","task_flops":100,"min_num_cores":64,"max_num_cores":64}"#,
    )
    .await;
    let job = json["job_name"].as_str().unwrap().to_owned();
    submit_job(&router, &job, &service).await;

    let json = post_ok(&router, "/api/waitForNextSimulationEvent", "").await;
    let event = &json["event"];
    assert_eq!(event["event_type"], "job_failure");
    assert!(event["failure_cause"].as_str().unwrap().contains("cores"));

    state.controller.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn terminate_stops_the_controller() {
    let (state, router) = make_session();

    let json = post_ok(&router, "/api/terminateSimulation", "").await;
    assert_eq!(json["wrench_api_request_success"], true);
    assert!(!state.controller.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_route_is_not_found() {
    let (state, router) = make_session();

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    state.controller.stop();
}
