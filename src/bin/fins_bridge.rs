//! Bridge binary: loads a PLC config, starts one [`Poller`] per PLC, and
//! supervises them until a shutdown signal arrives.
//!
//! This is the only place in the crate that installs a logger, parses CLI
//! arguments, or touches process signals.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use anyhow::Context;
use clap::Parser;

use omron_fins::config::Config;
use omron_fins::poller::{Poller, PollerEvent};
use omron_fins::sinks::{NoopPublishSink, PublishSink};

/// OPC UA FINS bridge: connects OMRON PLCs to CSV/OPC UA sinks.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the PLC configuration file.
    #[arg(short, long, default_value = "plc_data.json")]
    config: std::path::PathBuf,

    /// Enable reload mode on the OPC UA node mapper (forwarded to the
    /// `PublishSink`; has no effect on the bundled no-op sink).
    #[arg(long)]
    reload: bool,

    /// Only poll on an external trigger (SIGUSR1) instead of continuously.
    #[arg(long)]
    signal_based: bool,

    /// Force CSV output even if a PublishSink is also configured.
    #[arg(long)]
    csv: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    if cli.reload {
        log::info!("--reload requested; no-op without a vendored OPC UA client");
    }
    if cli.csv {
        log::info!("--csv requested; CSV output is always on regardless of this flag");
    }

    let stop_flag = Arc::new(AtomicBool::new(false));
    let wake_flag = Arc::new(AtomicBool::new(false));

    install_signal_handlers(Arc::clone(&stop_flag), Arc::clone(&wake_flag))
        .context("installing signal handlers")?;

    let (control_tx, control_rx) = mpsc::channel::<PollerEvent>();

    let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(config.plcs.len());

    for plc in &config.plcs {
        let publish_sink: Box<dyn PublishSink> = Box::new(NoopPublishSink);

        let poller = Poller::new(
            plc,
            publish_sink,
            control_tx.clone(),
            Arc::clone(&stop_flag),
        )
        .with_context(|| format!("constructing poller for PLC '{}'", plc.plc_name))?;

        let poller = if cli.signal_based {
            poller.with_wake_flag(Arc::clone(&wake_flag))
        } else {
            poller
        };

        let plc_name = plc.plc_name.clone();
        handles.push(
            std::thread::Builder::new()
                .name(format!("poller-{plc_name}"))
                .spawn(move || poller.run())
                .with_context(|| format!("spawning poller thread for PLC '{plc_name}'"))?,
        );
    }
    drop(control_tx);

    if cli.signal_based {
        log::info!("running in signal-based mode; waiting for SIGUSR1 to trigger cycles");
    }

    // Supervisor: drain lifecycle events until every Poller has reported
    // Stopped (either from a shutdown signal or from its own TooManyErrors).
    let mut remaining = handles.len();
    while remaining > 0 {
        match control_rx.recv() {
            Ok(PollerEvent::TooManyErrors {
                plc_name,
                failed_to_read,
            }) => {
                log::error!(
                    "PLC '{plc_name}' stopped itself after {failed_to_read} failed reads"
                );
                remaining -= 1;
            }
            Ok(PollerEvent::Stopped { plc_name }) => {
                log::info!("PLC '{plc_name}' poller stopped");
                remaining -= 1;
            }
            Err(_) => break,
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}

/// Registers SIGINT/SIGTERM to request a graceful shutdown (setting
/// `stop_flag`, which every Poller checks once per cycle) and, in
/// `--signal-based` mode, SIGUSR1 to wake a Poller that is idling between
/// cycles (setting `wake_flag`). All three share `signal_hook`'s flag-based
/// registration, which is safe to call from a signal handler because it only
/// stores into an `AtomicBool`.
fn install_signal_handlers(
    stop_flag: Arc<AtomicBool>,
    wake_flag: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop_flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop_flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&wake_flag))?;
    Ok(())
}
