//! The simulation controller.
//!
//! The controller is split along the thread boundary. A
//! [`ControllerHandle`] is shared with the HTTP workers and exposes every
//! operation a client can trigger; none of them touch the engine
//! directly. The [`SimulationController`] runs on the dedicated simulator
//! thread, owns the [`Simulation`], and is the only party that calls
//! engine mutators. The two halves meet in the command queues and the
//! time directive.
//!
//! # Main loop
//!
//! Each pass the controller: starts pending compute services, submits
//! pending jobs, then advances simulated time -- either catching up to
//! the client-set horizon and draining the events that fired on the way,
//! or (in wait-for-next-event mode) jumping straight to the next
//! scheduled event. Between passes it sleeps a configurable slice of
//! real time so an idle session does not spin a core.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use simbridge_engine::{ComputeServiceSpec, Platform, SimClock, Simulation, StandardJob, TaskSpec};

use crate::error::ControllerError;
use crate::events::EventRecord;
use crate::queue::CommandQueue;

/// The only service type the daemon currently knows how to start.
pub const SERVICE_TYPE_BARE_METAL: &str = "compute_baremetal";

/// Client-side specification of a compute service.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ServiceSpec {
    /// Service type tag; only `compute_baremetal` is supported.
    pub service_type: String,
    /// Host the service runs on.
    pub head_host: String,
}

/// Client-side specification of a one-task standard job.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TaskRequest {
    /// Task name.
    pub task_name: String,
    /// Compute cost in flops.
    pub task_flops: f64,
    /// Minimum number of cores.
    pub min_num_cores: u32,
    /// Maximum number of cores.
    pub max_num_cores: u32,
}

/// What the main loop should do with simulated time.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeDirective {
    /// Sleep the simulation toward this horizon (simulated seconds).
    Advance(f64),
    /// Block until the next event, wherever in time it is.
    WaitNext,
}

/// A (job, service) pair waiting to be handed to the engine.
#[derive(Debug, Clone)]
struct PendingSubmission {
    job_name: String,
    service_name: String,
}

/// Thread-shared half of the controller.
///
/// Every operation here is callable from any thread. Mutations are
/// enqueued for the simulator thread; reads either hit lock-free shared
/// state (the clock, the platform) or take the registry mutex.
#[derive(Debug)]
pub struct ControllerHandle {
    clock: Arc<SimClock>,
    platform: Arc<Platform>,
    controller_hostname: String,

    services_to_start: CommandQueue<ComputeServiceSpec>,
    submissions: CommandQueue<PendingSubmission>,
    events: CommandQueue<EventRecord>,

    directive: Mutex<TimeDirective>,
    keep_going: AtomicBool,

    service_registry: Mutex<HashMap<String, ComputeServiceSpec>>,
    job_registry: Mutex<HashMap<String, StandardJob>>,

    service_seq: AtomicU64,
    job_seq: AtomicU64,
}

impl ControllerHandle {
    /// Create the shared controller state.
    pub fn new(clock: Arc<SimClock>, platform: Arc<Platform>, controller_hostname: String) -> Self {
        Self {
            clock,
            platform,
            controller_hostname,
            services_to_start: CommandQueue::new(),
            submissions: CommandQueue::new(),
            events: CommandQueue::new(),
            directive: Mutex::new(TimeDirective::Advance(0.0)),
            keep_going: AtomicBool::new(true),
            service_registry: Mutex::new(HashMap::new()),
            job_registry: Mutex::new(HashMap::new()),
            service_seq: AtomicU64::new(0),
            job_seq: AtomicU64::new(0),
        }
    }

    /// Hostname the controller is bound to.
    pub fn controller_hostname(&self) -> &str {
        &self.controller_hostname
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Current simulated time in seconds.
    ///
    /// Reads the engine clock directly; the read is an observation, not a
    /// mutation, so it is safe off the simulator thread.
    pub fn simulation_time(&self) -> f64 {
        self.clock.now()
    }

    /// Ask the simulation to advance by `seconds` simulated seconds.
    ///
    /// Sets the horizon to `now + seconds` and returns immediately; the
    /// main loop catches up on a later pass.
    pub fn advance_time(&self, seconds: f64) {
        let target = self.clock.now() + seconds.max(0.0);
        let mut directive = self.directive.lock().expect("directive mutex poisoned");
        *directive = TimeDirective::Advance(target);
        debug!(horizon = target, "time horizon set");
    }

    // -----------------------------------------------------------------------
    // Platform
    // -----------------------------------------------------------------------

    /// All hostnames of the simulated platform, in stable order.
    pub fn hostnames(&self) -> Vec<String> {
        self.platform.hostnames()
    }

    // -----------------------------------------------------------------------
    // Services
    // -----------------------------------------------------------------------

    /// Create a compute service and queue it for starting.
    ///
    /// The service object is constructed here, off the simulator thread
    /// (creation is thread-safe; only *starting* must happen on-thread),
    /// and its pre-assigned name is returned synchronously.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownServiceType`] for anything but
    /// `compute_baremetal`; [`ControllerError::UnknownHeadHost`] when the
    /// head host is not part of the platform.
    pub fn add_service(&self, spec: &ServiceSpec) -> Result<String, ControllerError> {
        if spec.service_type != SERVICE_TYPE_BARE_METAL {
            return Err(ControllerError::UnknownServiceType {
                service_type: spec.service_type.clone(),
            });
        }
        if !self.platform.contains_host(&spec.head_host) {
            return Err(ControllerError::UnknownHeadHost {
                hostname: spec.head_host.clone(),
            });
        }

        let seq = self.service_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{}_{seq}", spec.service_type);
        self.services_to_start.push(ComputeServiceSpec {
            name: name.clone(),
            service_type: spec.service_type.clone(),
            head_host: spec.head_host.clone(),
        });
        Ok(name)
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    /// Create a standard job around one task and register it.
    ///
    /// Job and task creation are thread-safe; the job only touches the
    /// engine when it is later submitted.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidArgument`] when the task spec is
    /// inconsistent (negative or non-finite flops, zero or inverted core
    /// bounds).
    pub fn create_standard_job(&self, request: &TaskRequest) -> Result<String, ControllerError> {
        if !request.task_flops.is_finite() || request.task_flops < 0.0 {
            return Err(ControllerError::InvalidArgument {
                reason: format!("task_flops must be a non-negative number, got {}", request.task_flops),
            });
        }
        if request.min_num_cores == 0 {
            return Err(ControllerError::InvalidArgument {
                reason: "min_num_cores must be at least 1".to_owned(),
            });
        }
        if request.min_num_cores > request.max_num_cores {
            return Err(ControllerError::InvalidArgument {
                reason: format!(
                    "min_num_cores ({}) exceeds max_num_cores ({})",
                    request.min_num_cores, request.max_num_cores
                ),
            });
        }

        let seq = self.job_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("standard_job_{seq}");
        let job = StandardJob {
            name: name.clone(),
            tasks: vec![TaskSpec {
                name: request.task_name.clone(),
                flops: request.task_flops,
                min_cores: request.min_num_cores,
                max_cores: request.max_num_cores,
                memory: 0.0,
            }],
        };

        let mut registry = self.job_registry.lock().expect("job registry poisoned");
        registry.insert(name.clone(), job);
        Ok(name)
    }

    /// Queue a registered job for submission to a registered service.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownJob`] /
    /// [`ControllerError::UnknownComputeService`] when either name does
    /// not resolve; nothing is enqueued in that case.
    pub fn submit_standard_job(
        &self,
        job_name: &str,
        service_name: &str,
    ) -> Result<(), ControllerError> {
        {
            let jobs = self.job_registry.lock().expect("job registry poisoned");
            if !jobs.contains_key(job_name) {
                return Err(ControllerError::UnknownJob {
                    name: job_name.to_owned(),
                });
            }
        }
        {
            let services = self
                .service_registry
                .lock()
                .expect("service registry poisoned");
            if !services.contains_key(service_name) {
                return Err(ControllerError::UnknownComputeService {
                    name: service_name.to_owned(),
                });
            }
        }
        self.submissions.push(PendingSubmission {
            job_name: job_name.to_owned(),
            service_name: service_name.to_owned(),
        });
        Ok(())
    }

    /// Number of tasks in a registered job.
    ///
    /// # Errors
    ///
    /// [`ControllerError::UnknownJob`] once the job has left the registry
    /// (never registered, or already terminal).
    pub fn job_num_tasks(&self, job_name: &str) -> Result<usize, ControllerError> {
        let jobs = self.job_registry.lock().expect("job registry poisoned");
        jobs.get(job_name)
            .map(StandardJob::num_tasks)
            .ok_or_else(|| ControllerError::UnknownJob {
                name: job_name.to_owned(),
            })
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Drain every event currently awaiting delivery. Non-blocking.
    pub fn drain_events(&self) -> Vec<EventRecord> {
        let mut drained = Vec::new();
        while let Some(event) = self.events.try_pop() {
            drained.push(event);
        }
        drained
    }

    /// Block until the simulation produces its next event, and return it.
    ///
    /// Switches the main loop into wait-for-next-event mode first, so the
    /// simulation jumps ahead to whatever is scheduled instead of idling
    /// at the current horizon.
    pub fn wait_for_next_event(&self) -> EventRecord {
        {
            let mut directive = self.directive.lock().expect("directive mutex poisoned");
            *directive = TimeDirective::WaitNext;
        }
        self.events.wait_and_pop()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Ask the main loop to exit on its next pass.
    pub fn stop(&self) {
        info!("simulation stop requested");
        self.keep_going.store(false, Ordering::Release);
    }

    /// Whether the main loop is still supposed to run.
    pub fn is_running(&self) -> bool {
        self.keep_going.load(Ordering::Acquire)
    }
}

/// Simulator-thread half of the controller.
///
/// Owns the engine [`Simulation`] and is the sole caller of its mutators.
pub struct SimulationController {
    shared: Arc<ControllerHandle>,
    simulation: Simulation,
    pass_sleep: Duration,
}

impl SimulationController {
    /// Bind the shared handle to an engine simulation.
    ///
    /// `sleep_us` is the real-time yield between loop passes; it bounds
    /// CPU use when the session is idle and does not advance simulated
    /// time.
    pub fn new(shared: Arc<ControllerHandle>, simulation: Simulation, sleep_us: u64) -> Self {
        Self {
            shared,
            simulation,
            pass_sleep: Duration::from_micros(sleep_us),
        }
    }

    /// Run the main loop until [`ControllerHandle::stop`] is called.
    pub fn run(mut self) {
        info!(
            host = %self.shared.controller_hostname,
            "simulation controller starting"
        );
        while self.shared.is_running() {
            self.pass();
            std::thread::sleep(self.pass_sleep);
        }
        info!("simulation controller exiting");
    }

    /// One pass of the main loop.
    fn pass(&mut self) {
        self.start_pending_services();
        self.submit_pending_jobs();
        self.advance_simulated_time();
    }

    /// Start every queued compute service and record it in the registry.
    fn start_pending_services(&mut self) {
        while let Some(spec) = self.shared.services_to_start.try_pop() {
            match self.simulation.start_service(&spec) {
                Ok(()) => {
                    debug!(service = %spec.name, host = %spec.head_host, "compute service registered");
                    let mut registry = self
                        .shared
                        .service_registry
                        .lock()
                        .expect("service registry poisoned");
                    registry.insert(spec.name.clone(), spec);
                }
                Err(e) => {
                    warn!(service = %spec.name, error = %e, "cannot start compute service");
                }
            }
        }
    }

    /// Hand every queued (job, service) pair to the engine.
    fn submit_pending_jobs(&mut self) {
        while let Some(pending) = self.shared.submissions.try_pop() {
            let job = {
                let jobs = self
                    .shared
                    .job_registry
                    .lock()
                    .expect("job registry poisoned");
                jobs.get(&pending.job_name).cloned()
            };
            let Some(job) = job else {
                warn!(job = %pending.job_name, "queued job vanished before submission");
                continue;
            };
            if let Err(e) = self.simulation.submit_job(&job, &pending.service_name) {
                warn!(
                    job = %pending.job_name,
                    service = %pending.service_name,
                    error = %e,
                    "job submission rejected by the engine"
                );
            }
        }
    }

    /// Advance simulated time according to the current directive.
    fn advance_simulated_time(&mut self) {
        let directive = *self.shared.directive.lock().expect("directive mutex poisoned");
        match directive {
            TimeDirective::WaitNext => {
                // Nothing scheduled yet means a submission may still be
                // in flight; keep the loop turning so it gets processed.
                if let Some(event) = self.simulation.advance_to_next_event() {
                    self.deliver(event);
                    let mut directive =
                        self.shared.directive.lock().expect("directive mutex poisoned");
                    if *directive == TimeDirective::WaitNext {
                        *directive = TimeDirective::Advance(self.shared.clock.now());
                    }
                }
            }
            TimeDirective::Advance(target) => {
                let delta = target - self.shared.clock.now();
                if delta > 0.0 {
                    self.simulation.sleep(delta);
                    while let Some(event) = self.simulation.poll_event() {
                        self.deliver(event);
                    }
                }
            }
        }
    }

    /// Push an event record for client delivery.
    ///
    /// The job leaves the registry here, which is what guarantees a job
    /// appears in at most one terminal event.
    fn deliver(&self, event: simbridge_engine::EngineEvent) {
        let mut jobs = self
            .shared
            .job_registry
            .lock()
            .expect("job registry poisoned");
        jobs.remove(&event.job_name);
        drop(jobs);
        self.shared.events.push(EventRecord::from(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<platform>
        <host id="ControllerHost" speed="1Gf" core="1"/>
        <host id="ComputeHost" speed="100f" core="4"/>
    </platform>"#;

    fn handle() -> ControllerHandle {
        let platform = Arc::new(Platform::from_xml(XML).unwrap());
        ControllerHandle::new(Arc::new(SimClock::new()), platform, "ControllerHost".to_owned())
    }

    fn bare_metal(head_host: &str) -> ServiceSpec {
        ServiceSpec {
            service_type: SERVICE_TYPE_BARE_METAL.to_owned(),
            head_host: head_host.to_owned(),
        }
    }

    fn one_task_job() -> TaskRequest {
        TaskRequest {
            task_name: "t".to_owned(),
            task_flops: 100.0,
            min_num_cores: 1,
            max_num_cores: 1,
        }
    }

    #[test]
    fn add_service_returns_unique_names() {
        let handle = handle();
        let a = handle.add_service(&bare_metal("ComputeHost")).unwrap();
        let b = handle.add_service(&bare_metal("ComputeHost")).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("compute_baremetal_"));
    }

    #[test]
    fn add_service_rejects_unknown_type() {
        let handle = handle();
        let spec = ServiceSpec {
            service_type: "quantum".to_owned(),
            head_host: "ComputeHost".to_owned(),
        };
        let err = handle.add_service(&spec).unwrap_err();
        assert!(err.to_string().contains("quantum"));
    }

    #[test]
    fn add_service_rejects_unknown_head_host() {
        let handle = handle();
        let err = handle.add_service(&bare_metal("absent")).unwrap_err();
        assert!(matches!(err, ControllerError::UnknownHeadHost { .. }));
    }

    #[test]
    fn create_job_registers_and_counts_tasks() {
        let handle = handle();
        let name = handle.create_standard_job(&one_task_job()).unwrap();
        assert!(name.starts_with("standard_job_"));
        assert_eq!(handle.job_num_tasks(&name).unwrap(), 1);
    }

    #[test]
    fn create_job_rejects_bad_core_bounds() {
        let handle = handle();
        let mut request = one_task_job();
        request.min_num_cores = 4;
        request.max_num_cores = 2;
        assert!(matches!(
            handle.create_standard_job(&request),
            Err(ControllerError::InvalidArgument { .. })
        ));

        request.min_num_cores = 0;
        assert!(handle.create_standard_job(&request).is_err());
    }

    #[test]
    fn create_job_rejects_negative_flops() {
        let handle = handle();
        let mut request = one_task_job();
        request.task_flops = -1.0;
        assert!(handle.create_standard_job(&request).is_err());
    }

    #[test]
    fn submit_with_unknown_job_fails_without_enqueue() {
        let handle = handle();
        let err = handle
            .submit_standard_job("standard_job_99", "compute_baremetal_1")
            .unwrap_err();
        assert!(matches!(err, ControllerError::UnknownJob { .. }));
        assert!(handle.submissions.is_empty());
    }

    #[test]
    fn submit_with_unknown_service_fails_without_enqueue() {
        let handle = handle();
        let job = handle.create_standard_job(&one_task_job()).unwrap();
        let err = handle.submit_standard_job(&job, "compute_baremetal_1").unwrap_err();
        assert!(matches!(err, ControllerError::UnknownComputeService { .. }));
        assert!(handle.submissions.is_empty());
    }

    #[test]
    fn unknown_job_num_tasks_fails() {
        let handle = handle();
        assert!(matches!(
            handle.job_num_tasks("nope"),
            Err(ControllerError::UnknownJob { .. })
        ));
    }

    #[test]
    fn hostnames_are_stable() {
        let handle = handle();
        assert_eq!(handle.hostnames(), handle.hostnames());
        assert_eq!(handle.hostnames(), vec!["ControllerHost", "ComputeHost"]);
    }

    #[test]
    fn stop_clears_running_flag() {
        let handle = handle();
        assert!(handle.is_running());
        handle.stop();
        assert!(!handle.is_running());
    }
}
