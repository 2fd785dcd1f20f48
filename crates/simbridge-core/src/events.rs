//! Client-facing event records.
//!
//! An [`EventRecord`] is the serialized form of an engine terminal event,
//! delivered exactly once to the client and then discarded.

use serde::Serialize;
use simbridge_engine::{EngineEvent, JobOutcome};

/// Event type tag for a completed job.
pub const EVENT_JOB_COMPLETION: &str = "job_completion";
/// Event type tag for a failed job.
pub const EVENT_JOB_FAILURE: &str = "job_failure";

/// One observable simulation event, in the wire schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Simulated time at which the event was observed.
    pub event_date: f64,
    /// `job_completion` or `job_failure`.
    pub event_type: String,
    /// Name of the compute service the job ran on.
    pub compute_service_name: String,
    /// Name of the terminated job.
    pub job_name: String,
    /// Simulated time at which the job was submitted.
    pub submit_date: f64,
    /// Simulated time at which the job ended.
    pub end_date: f64,
    /// Human-readable cause, present only for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_cause: Option<String>,
}

impl From<EngineEvent> for EventRecord {
    fn from(event: EngineEvent) -> Self {
        let (event_type, failure_cause) = match event.outcome {
            JobOutcome::Completed => (EVENT_JOB_COMPLETION.to_owned(), None),
            JobOutcome::Failed(cause) => (EVENT_JOB_FAILURE.to_owned(), Some(cause)),
        };
        Self {
            event_date: event.date,
            event_type,
            compute_service_name: event.service_name,
            job_name: event.job_name,
            submit_date: event.submit_date,
            end_date: event.end_date,
            failure_cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_event(outcome: JobOutcome) -> EngineEvent {
        EngineEvent {
            date: 12.0,
            job_name: "standard_job_1".to_owned(),
            service_name: "compute_baremetal_1".to_owned(),
            submit_date: 2.0,
            end_date: 12.0,
            outcome,
        }
    }

    #[test]
    fn completion_serializes_without_failure_cause() {
        let record = EventRecord::from(engine_event(JobOutcome::Completed));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event_type"], "job_completion");
        assert_eq!(json["event_date"], 12.0);
        assert_eq!(json["job_name"], "standard_job_1");
        assert_eq!(json["compute_service_name"], "compute_baremetal_1");
        assert_eq!(json["submit_date"], 2.0);
        assert_eq!(json["end_date"], 12.0);
        assert!(json.get("failure_cause").is_none());
    }

    #[test]
    fn failure_carries_its_cause() {
        let record = EventRecord::from(engine_event(JobOutcome::Failed(
            "not enough cores".to_owned(),
        )));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event_type"], "job_failure");
        assert_eq!(json["failure_cause"], "not enough cores");
    }
}
