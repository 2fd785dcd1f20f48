//! Daemon binary: supervisor by default, session under the hidden
//! `session` subcommand.
//!
//! # Startup sequence (supervisor)
//!
//! 1. Parse CLI flags
//! 2. Initialize structured logging (tracing)
//! 3. Bind the public port
//! 4. Serve `POST /api/startSimulation` until killed
//!
//! # Startup sequence (session)
//!
//! 1. Parse CLI flags, read the platform XML from stdin
//! 2. Initialize structured logging to stderr (stdout carries the init
//!    report line read by the supervisor)
//! 3. Run the simulation launch sequence
//! 4. Bind the allocated port
//! 5. Report `{"success":true}` on stdout and serve until
//!    `terminateSimulation`

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use simbridge_core::{launch, LaunchSpec};
use simbridge_daemon::supervisor::InitReport;
use simbridge_daemon::{
    session_router, supervisor_router, SessionState, SupervisorConfig, SupervisorState,
};

/// HTTP daemon fronting the simbridge discrete-event simulator.
#[derive(Parser)]
#[command(name = "simbridge-daemon")]
#[command(about = "HTTP/JSON daemon for client-driven cluster simulations", long_about = None)]
struct Cli {
    /// Port the supervisor listens on.
    #[arg(long, default_value_t = 8101, value_parser = clap::value_parser!(u16).range(1024..=49151))]
    port: u16,

    /// Micro-seconds of real time the simulation controller sleeps at
    /// each iteration of its main loop.
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(0..=1_000_000))]
    sleep_us: u64,

    /// Print simulation logging.
    #[arg(long)]
    simulation_logging: bool,

    /// Print daemon logging.
    #[arg(long)]
    daemon_logging: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one simulation session (spawned by the supervisor).
    #[command(hide = true)]
    Session {
        /// Port the session server listens on.
        #[arg(long)]
        port: u16,

        /// Host the simulation controller runs on.
        #[arg(long)]
        controller_hostname: String,

        /// Micro-seconds of real time per controller loop pass.
        #[arg(long, default_value_t = 200)]
        sleep_us: u64,

        /// Print simulation logging.
        #[arg(long)]
        simulation_logging: bool,

        /// Print daemon logging.
        #[arg(long)]
        daemon_logging: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Session {
            port,
            controller_hostname,
            sleep_us,
            simulation_logging,
            daemon_logging,
        }) => {
            init_logging(daemon_logging, simulation_logging, true);
            run_session(port, controller_hostname, sleep_us, simulation_logging).await
        }
        None => {
            init_logging(cli.daemon_logging, cli.simulation_logging, false);
            run_supervisor(cli).await
        }
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is derived from the
/// logging flags. Session processes log to stderr so stdout stays
/// reserved for the init report.
fn init_logging(daemon_logging: bool, simulation_logging: bool, to_stderr: bool) {
    let daemon_level = if daemon_logging { "info" } else { "warn" };
    let engine_level = if simulation_logging { "debug" } else { "warn" };
    let fallback = format!(
        "warn,simbridge_daemon={daemon_level},simbridge_core={daemon_level},\
         simbridge_engine={engine_level}"
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

/// Run the supervisor server until the process is killed.
async fn run_supervisor(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(SupervisorState::new(SupervisorConfig {
        sleep_us: cli.sleep_us,
        simulation_logging: cli.simulation_logging,
        daemon_logging: cli.daemon_logging,
    }));
    let router = supervisor_router(state);

    let listener = TcpListener::bind(("0.0.0.0", cli.port)).await?;
    info!(port = cli.port, "simbridge daemon listening");

    axum::serve(listener, router).await?;
    Ok(())
}

/// Run one session: launch the simulation, report, serve, exit.
async fn run_session(
    port: u16,
    controller_hostname: String,
    sleep_us: u64,
    simulation_logging: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut platform_xml = String::new();
    if let Err(e) = tokio::io::stdin().read_to_string(&mut platform_xml).await {
        report_init(&InitReport::failed(format!("cannot read platform XML: {e}")));
        std::process::exit(1);
    }

    let running = match launch(LaunchSpec {
        platform_xml,
        controller_hostname,
        sleep_us,
        simulation_logging,
    }) {
        Ok(running) => running,
        Err(e) => {
            report_init(&InitReport::failed(e));
            std::process::exit(1);
        }
    };

    // Bind before reporting success so the client can connect as soon as
    // it learns the port.
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            running.controller.stop();
            report_init(&InitReport::failed(format!("cannot bind port {port}: {e}")));
            std::process::exit(1);
        }
    };

    let state = Arc::new(SessionState::new(running));
    let router = session_router(Arc::clone(&state));

    report_init(&InitReport::ok());
    info!(port, pid = std::process::id(), "session listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { state.shutdown_requested().await })
        .await?;

    info!("session terminated");
    Ok(())
}

/// Write the one-line init report the supervisor is waiting on.
fn report_init(report: &InitReport) {
    match serde_json::to_string(report) {
        Ok(line) => {
            println!("{line}");
            let _ = std::io::stdout().flush();
        }
        Err(e) => eprintln!("cannot serialize init report: {e}"),
    }
}
