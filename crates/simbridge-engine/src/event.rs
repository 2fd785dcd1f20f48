//! Engine events.
//!
//! Every submitted job produces exactly one terminal event: a completion
//! or a failure. Events surface through the engine's wait primitives in
//! delivery order.

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The job ran to completion.
    Completed,
    /// The job failed; the string is a human-readable cause.
    Failed(String),
}

/// A terminal event observed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    /// Simulated time at which the event fired.
    pub date: f64,
    /// Name of the job this event terminates.
    pub job_name: String,
    /// Name of the compute service the job ran on.
    pub service_name: String,
    /// Simulated time at which the job was submitted.
    pub submit_date: f64,
    /// Simulated time at which the job ended.
    pub end_date: f64,
    /// Completion or failure.
    pub outcome: JobOutcome,
}

impl EngineEvent {
    /// Whether this is a failure event.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, JobOutcome::Failed(_))
    }
}
