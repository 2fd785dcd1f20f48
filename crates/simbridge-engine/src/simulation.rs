//! The discrete-event simulation proper.
//!
//! A [`Simulation`] owns the event calendar, the runtime state of started
//! compute services, and the shared clock. It is driven from a single
//! thread through three primitives:
//!
//! - [`sleep`](Simulation::sleep) -- advance simulated time by a delta,
//!   firing every calendar entry that falls due,
//! - [`poll_event`](Simulation::poll_event) -- the "wait for next event
//!   with a small timeout" primitive: pop an already-fired event without
//!   advancing time,
//! - [`advance_to_next_event`](Simulation::advance_to_next_event) -- the
//!   unbounded wait: jump simulated time to the next scheduled event and
//!   return it.
//!
//! Events fire in date order; ties fire in schedule order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::clock::SimClock;
use crate::error::EngineError;
use crate::event::{EngineEvent, JobOutcome};
use crate::job::StandardJob;
use crate::platform::Platform;

/// Engine-level configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Emit verbose per-event simulation logging.
    pub full_log: bool,
}

/// Placeholder workflow container.
///
/// The engine requires a workflow to be attached before launch; the
/// daemon drives jobs through the REST surface instead of a static
/// workflow, so the attached workflow stays empty.
#[derive(Debug, Clone, Default)]
pub struct Workflow;

impl Workflow {
    /// Create an empty workflow.
    pub fn new() -> Self {
        Self
    }
}

/// Specification of a compute service to start.
///
/// Constructed off the simulator thread (the name is pre-assigned so the
/// client can learn it synchronously); starting the service happens on
/// the simulator thread only.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeServiceSpec {
    /// Pre-assigned unique service name.
    pub name: String,
    /// Service type tag.
    pub service_type: String,
    /// Head host of the service.
    pub head_host: String,
}

/// Runtime state of a started compute service.
#[derive(Debug)]
struct ServiceRuntime {
    head_host: String,
    speed: f64,
    cores: u32,
}

/// A calendar entry: an event scheduled at a simulated date.
///
/// `seq` breaks date ties in schedule order, and the `Ord` impl is
/// reversed so the `BinaryHeap` pops the earliest entry first.
#[derive(Debug)]
struct Scheduled {
    date: f64,
    seq: u64,
    event: EngineEvent,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .date
            .partial_cmp(&self.date)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

/// The discrete-event simulation.
pub struct Simulation {
    platform: Arc<Platform>,
    clock: Arc<SimClock>,
    config: EngineConfig,
    calendar: BinaryHeap<Scheduled>,
    fired: VecDeque<EngineEvent>,
    services: HashMap<String, ServiceRuntime>,
    next_seq: u64,
    workflow_attached: bool,
}

impl Simulation {
    /// Create a simulation over a loaded platform.
    pub fn new(platform: Arc<Platform>, clock: Arc<SimClock>, config: EngineConfig) -> Self {
        Self {
            platform,
            clock,
            config,
            calendar: BinaryHeap::new(),
            fired: VecDeque::new(),
            services: HashMap::new(),
            next_seq: 0,
            workflow_attached: false,
        }
    }

    /// The platform this simulation runs over.
    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// The shared simulated clock.
    pub fn clock(&self) -> &Arc<SimClock> {
        &self.clock
    }

    /// Attach a workflow. Must happen before the simulation is driven.
    pub fn attach_workflow(&mut self, _workflow: Workflow) {
        self.workflow_attached = true;
    }

    /// Whether a workflow has been attached.
    pub fn has_workflow(&self) -> bool {
        self.workflow_attached
    }

    /// Start a compute service on its head host.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownHost`] if the head host is not in the
    /// platform; [`EngineError::DuplicateService`] if a service with the
    /// same name was already started.
    pub fn start_service(&mut self, spec: &ComputeServiceSpec) -> Result<(), EngineError> {
        let host = self
            .platform
            .host(&spec.head_host)
            .ok_or_else(|| EngineError::UnknownHost {
                hostname: spec.head_host.clone(),
            })?;

        if self.services.contains_key(&spec.name) {
            return Err(EngineError::DuplicateService {
                name: spec.name.clone(),
            });
        }

        debug!(service = %spec.name, host = %spec.head_host, "starting compute service");
        self.services.insert(
            spec.name.clone(),
            ServiceRuntime {
                head_host: spec.head_host.clone(),
                speed: host.speed,
                cores: host.cores,
            },
        );
        Ok(())
    }

    /// Submit a standard job to a started compute service.
    ///
    /// Stamps the submit date with the current simulated time and
    /// schedules the job's single terminal event: a completion at
    /// `now + total_flops / host_speed`, or an immediate failure when the
    /// service's host cannot satisfy the job's core requirement.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownService`] if the service is not started.
    pub fn submit_job(&mut self, job: &StandardJob, service_name: &str) -> Result<(), EngineError> {
        let service =
            self.services
                .get(service_name)
                .ok_or_else(|| EngineError::UnknownService {
                    name: service_name.to_owned(),
                })?;

        let now = self.clock.now();
        let required = job.min_cores_required();

        if required > service.cores {
            let cause = format!(
                "not enough cores on host {} ({} requested, {} available)",
                service.head_host, required, service.cores
            );
            debug!(job = %job.name, service = %service_name, %cause, "job submission fails");
            self.schedule(EngineEvent {
                date: now,
                job_name: job.name.clone(),
                service_name: service_name.to_owned(),
                submit_date: now,
                end_date: now,
                outcome: JobOutcome::Failed(cause),
            });
            return Ok(());
        }

        let duration = job.total_flops() / service.speed;
        let end_date = now + duration;

        if self.config.full_log {
            debug!(
                job = %job.name,
                service = %service_name,
                submit_date = now,
                end_date,
                "job submitted"
            );
        }

        self.schedule(EngineEvent {
            date: end_date,
            job_name: job.name.clone(),
            service_name: service_name.to_owned(),
            submit_date: now,
            end_date,
            outcome: JobOutcome::Completed,
        });
        Ok(())
    }

    /// Advance simulated time by `delta` seconds.
    ///
    /// Every calendar entry with a date inside the window fires, with the
    /// clock stepping through each event date in order, then the clock
    /// lands on `now + delta`. Negative or zero deltas are no-ops.
    pub fn sleep(&mut self, delta: f64) {
        if delta <= 0.0 {
            return;
        }
        let target = self.clock.now() + delta;
        while self
            .calendar
            .peek()
            .is_some_and(|entry| entry.date <= target)
        {
            if let Some(entry) = self.calendar.pop() {
                self.fire(entry);
            }
        }
        self.clock.advance_to(target);
    }

    /// Pop the next already-fired event, without advancing time.
    ///
    /// This is the "wait for next event with a small timeout" primitive:
    /// with a native in-process calendar the timeout degenerates to a
    /// non-blocking poll.
    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.fired.pop_front()
    }

    /// Jump simulated time to the next scheduled event and return it.
    ///
    /// Already-fired events are returned first. Returns `None` when
    /// nothing is fired or scheduled; the caller decides whether to keep
    /// waiting for new work.
    pub fn advance_to_next_event(&mut self) -> Option<EngineEvent> {
        if let Some(event) = self.fired.pop_front() {
            return Some(event);
        }
        let entry = self.calendar.pop()?;
        self.fire(entry);
        self.fired.pop_front()
    }

    /// Whether any event is fired or scheduled.
    pub fn has_pending_events(&self) -> bool {
        !self.fired.is_empty() || !self.calendar.is_empty()
    }

    fn schedule(&mut self, event: EngineEvent) {
        let entry = Scheduled {
            date: event.date,
            seq: self.next_seq,
            event,
        };
        self.next_seq += 1;
        self.calendar.push(entry);
    }

    fn fire(&mut self, entry: Scheduled) {
        self.clock.advance_to(entry.date);
        if self.config.full_log {
            debug!(
                date = entry.date,
                job = %entry.event.job_name,
                failure = entry.event.is_failure(),
                "event fired"
            );
        }
        self.fired.push_back(entry.event);
    }
}
