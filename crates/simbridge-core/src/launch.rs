//! The simulation launch sequence.
//!
//! Turns a platform description and a controller hostname into a running
//! simulation: platform load, controller-host check, controller creation,
//! workflow attach, simulator-thread start. Every step before the thread
//! spawn reports a typed [`InitError`] so the session process can relay
//! the exact failure to the supervisor.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::info;

use simbridge_engine::{EngineConfig, Platform, SimClock, Simulation, Workflow};

use crate::controller::{ControllerHandle, SimulationController};
use crate::error::InitError;

/// Everything needed to launch one simulation.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// XML platform description (the description itself, not a path).
    pub platform_xml: String,
    /// Host the controller is bound to; must exist in the platform.
    pub controller_hostname: String,
    /// Real-time sleep between controller loop passes, in microseconds.
    pub sleep_us: u64,
    /// Verbose engine logging.
    pub simulation_logging: bool,
}

/// A launched simulation: the shared handle plus the simulator thread.
#[derive(Debug)]
pub struct RunningSimulation {
    /// Operations callable from any thread.
    pub controller: Arc<ControllerHandle>,
    /// The simulator thread; joins after [`ControllerHandle::stop`].
    pub simulation_thread: JoinHandle<()>,
}

/// Launch a simulation.
///
/// On success the simulator thread is already running its main loop and
/// the returned handle accepts operations. The thread exits when
/// [`ControllerHandle::stop`] is called.
///
/// # Errors
///
/// [`InitError::Platform`] when the XML is rejected,
/// [`InitError::MissingControllerHost`] when the controller host is not
/// in the platform, [`InitError::Thread`] when the simulator thread
/// cannot be spawned.
pub fn launch(spec: LaunchSpec) -> Result<RunningSimulation, InitError> {
    let config = EngineConfig {
        full_log: spec.simulation_logging,
    };

    let platform = Arc::new(Platform::from_xml(&spec.platform_xml)?);
    info!(hosts = platform.hosts().len(), "platform instantiated");

    if !platform.contains_host(&spec.controller_hostname) {
        return Err(InitError::MissingControllerHost {
            hostname: spec.controller_hostname,
        });
    }

    let clock = Arc::new(SimClock::new());
    let mut simulation = Simulation::new(Arc::clone(&platform), Arc::clone(&clock), config);
    simulation.attach_workflow(Workflow::new());

    let handle = Arc::new(ControllerHandle::new(
        clock,
        platform,
        spec.controller_hostname.clone(),
    ));

    let controller = SimulationController::new(Arc::clone(&handle), simulation, spec.sleep_us);
    let simulation_thread = std::thread::Builder::new()
        .name("simulation".to_owned())
        .spawn(move || controller.run())?;

    info!(host = %spec.controller_hostname, "simulation launched");
    Ok(RunningSimulation {
        controller: handle,
        simulation_thread,
    })
}
