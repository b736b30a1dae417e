//! Per-PLC polling scheduler.
//!
//! A [`Poller`] owns one PLC: its [`Engine`], its read plan, and its sinks.
//! It runs on a dedicated OS thread (one per configured PLC, matching the
//! source's `PLCThread`), repeating a fixed cycle — read, assemble a
//! [`Sample`], dispatch to sinks, sleep — until told to stop or until it
//! accumulates more read failures than [`THRESHOLD`] allows.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::config::{PlcConfig, HEARTBEAT};
use crate::data_type::{DataType, Value};
use crate::engine::Engine;
use crate::error::FinsError;
use crate::header::NodeAddress;
use crate::sinks::{CsvSampleSink, PublishSink, PublishValue, SampleSink, SinkError};
use crate::transport::{DEFAULT_FINS_PORT, DEFAULT_TIMEOUT};

/// Cumulative individual-read failure count, across cycles, above which a
/// Poller reports [`PollerEvent::TooManyErrors`] and stops itself.
pub const THRESHOLD: u32 = 3;

/// Errors that can occur while constructing a [`Poller`].
#[derive(Debug, Error)]
pub enum PollerError {
    /// `plc_ip` did not parse as a socket address.
    #[error("invalid PLC address '{address}': {source}")]
    InvalidAddress {
        /// The offending `plc_ip` value.
        address: String,
        /// Underlying parse error.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The FINS engine could not be constructed (socket creation failed).
    #[error(transparent)]
    Fins(#[from] FinsError),

    /// The CSV sink's backing file or directory could not be created.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// A lifecycle event a [`Poller`] reports to the supervisor thread (D4) over
/// its control channel.
#[derive(Debug, Clone)]
pub enum PollerEvent {
    /// This Poller's cumulative failure count exceeded [`THRESHOLD`]; it is
    /// terminating its own loop.
    TooManyErrors {
        /// The reporting PLC's name.
        plc_name: String,
        /// The failure count that triggered the report.
        failed_to_read: u32,
    },
    /// This Poller stopped normally (external stop signal).
    Stopped {
        /// The reporting PLC's name.
        plc_name: String,
    },
}

/// One mapping entry whose item width is greater than one word, or whose
/// data type could not be recognized at plan-build time.
#[derive(Debug, Clone)]
enum PlannedRead {
    /// A recognized multi-word (or otherwise not-batchable) data type.
    Known {
        tag: String,
        address: String,
        dtype: DataType,
    },
    /// A `data_type` string [`DataType::from_name`] did not recognize. Kept
    /// in the plan (so every mapping entry still appears exactly once) but
    /// never actually read — it always contributes a `null` value and a
    /// failure-counter increment.
    Unknown {
        tag: String,
        address: String,
        raw_type: String,
    },
}

/// The pre-computed partition of one PLC's address mappings into multi-read
/// groups and individual reads, built once at Poller startup.
#[derive(Debug, Clone)]
pub struct ReadPlan {
    /// Width-1 items, chopped in mapping order into groups of at most
    /// [`crate::command::MAX_MULTI_READ_ENTRIES`]. Each group becomes one
    /// `multiple_read` call per cycle.
    multi_read_batches: Vec<Vec<(String, String, DataType)>>,
    /// Width-greater-than-1 items (and unrecognized data types), in mapping
    /// order.
    individual_reads: Vec<PlannedRead>,
    /// Every mapped tag (including the heartbeat tag, if present) in
    /// original mapping order — this is the Sample's column order.
    original_tags: Vec<String>,
    /// The `opcua_reg_add` tag of the `HEARTBEAT` mapping entry, if any.
    heartbeat_tag: Option<String>,
}

impl ReadPlan {
    /// Builds a plan from one PLC's `address_mappings`, in mapping order.
    pub fn build(mappings: &[crate::config::AddressMapping]) -> Self {
        let mut multi_pool: Vec<(String, String, DataType)> = Vec::new();
        let mut individual_reads = Vec::new();
        let mut original_tags = Vec::new();
        let mut heartbeat_tag = None;

        for mapping in mappings {
            original_tags.push(mapping.opcua_reg_add.clone());

            if mapping.plc_reg_add == HEARTBEAT {
                heartbeat_tag = Some(mapping.opcua_reg_add.clone());
                continue;
            }

            match DataType::from_name(&mapping.data_type) {
                Some(dtype) if dtype.words_per_item() == 1 => {
                    multi_pool.push((
                        mapping.opcua_reg_add.clone(),
                        mapping.plc_reg_add.clone(),
                        dtype,
                    ));
                }
                Some(dtype) => individual_reads.push(PlannedRead::Known {
                    tag: mapping.opcua_reg_add.clone(),
                    address: mapping.plc_reg_add.clone(),
                    dtype,
                }),
                None => {
                    log::warn!(
                        "unrecognized data_type '{}' for address '{}'; this tag will always read as failed",
                        mapping.data_type,
                        mapping.plc_reg_add
                    );
                    individual_reads.push(PlannedRead::Unknown {
                        tag: mapping.opcua_reg_add.clone(),
                        address: mapping.plc_reg_add.clone(),
                        raw_type: mapping.data_type.clone(),
                    });
                }
            }
        }

        let multi_read_batches = multi_pool
            .chunks(crate::command::MAX_MULTI_READ_ENTRIES)
            .map(|chunk| chunk.to_vec())
            .collect();

        Self {
            multi_read_batches,
            individual_reads,
            original_tags,
            heartbeat_tag,
        }
    }

    /// Number of multi-read groups this plan will issue per cycle.
    pub fn multi_read_group_count(&self) -> usize {
        self.multi_read_batches.len()
    }

    /// Number of individual reads this plan will issue per cycle.
    pub fn individual_read_count(&self) -> usize {
        self.individual_reads.len()
    }
}

type SinkPair = (Box<dyn SampleSink>, Box<dyn PublishSink>);

/// Owns one PLC's engine, read plan, and sinks, and drives its polling
/// cycle on the thread [`Poller::run`] is called from.
pub struct Poller {
    plc_name: String,
    engine: Engine,
    plan: ReadPlan,
    sleep_interval: Duration,
    sample_sink: Option<Box<dyn SampleSink>>,
    publish_sink: Option<Box<dyn PublishSink>>,
    pending_sink_join: Option<JoinHandle<SinkPair>>,
    failed_to_read: u32,
    control_tx: mpsc::Sender<PollerEvent>,
    stop_flag: Arc<AtomicBool>,
    wake_flag: Option<Arc<AtomicBool>>,
    too_many_errors_reported: bool,
}

impl Poller {
    /// Builds a Poller for `plc`: connects its engine, creates its CSV sink,
    /// and builds its read plan. Does not perform any network I/O beyond
    /// opening the UDP socket — the connectivity probe happens in
    /// [`Poller::run`].
    pub fn new(
        plc: &PlcConfig,
        publish_sink: Box<dyn PublishSink>,
        control_tx: mpsc::Sender<PollerEvent>,
        stop_flag: Arc<AtomicBool>,
    ) -> Result<Self, PollerError> {
        let addr: SocketAddr = format!("{}:{}", plc.plc_ip, DEFAULT_FINS_PORT)
            .parse()
            .map_err(|source| PollerError::InvalidAddress {
                address: plc.plc_ip.clone(),
                source,
            })?;

        let engine = Engine::new(
            addr,
            DEFAULT_TIMEOUT,
            NodeAddress::new(0, 1, 0),
            NodeAddress::new(0, 0, 0),
        )?;

        let started_at = chrono::Local::now().naive_local();
        let sample_sink = CsvSampleSink::new(&plc.plc_name, started_at)?;
        let plan = ReadPlan::build(&plc.address_mappings);

        Ok(Self {
            plc_name: plc.plc_name.clone(),
            engine,
            plan,
            sleep_interval: Duration::from_secs_f64(plc.sleep_interval.max(0.0)),
            sample_sink: Some(Box::new(sample_sink)),
            publish_sink: Some(publish_sink),
            pending_sink_join: None,
            failed_to_read: 0,
            control_tx,
            stop_flag,
            wake_flag: None,
            too_many_errors_reported: false,
        })
    }

    /// Switches this Poller into signal-based mode (`--signal-based`): the
    /// inter-cycle wait becomes a bounded poll of `wake_flag` instead of an
    /// unconditional sleep, so an external SIGUSR1 handler can cut a cycle's
    /// idle wait short. The Poller still cycles on `sleep_interval` even if
    /// `wake_flag` is never set — this is a polling substitute for a true
    /// condition variable, which a signal handler cannot safely notify.
    pub fn with_wake_flag(mut self, wake_flag: Arc<AtomicBool>) -> Self {
        self.wake_flag = Some(wake_flag);
        self
    }

    /// The read plan this Poller built at construction time.
    pub fn plan(&self) -> &ReadPlan {
        &self.plan
    }

    /// Runs the polling loop until the stop flag is set or until
    /// [`PollerEvent::TooManyErrors`] is self-reported. Consumes `self`, so
    /// it is meant to be the body of the Poller's dedicated thread.
    pub fn run(mut self) {
        log::info!("[{}] poller starting", self.plc_name);

        // Startup connectivity probe. Redesigned to be non-fatal: a PLC that
        // is briefly unreachable at process start should not prevent the
        // Poller from running — it just reports failed cycles until the
        // device answers.
        match self.engine.cpu_unit_data_read() {
            Ok(_) => log::info!("[{}] startup connectivity probe succeeded", self.plc_name),
            Err(e) => log::warn!(
                "[{}] startup connectivity probe failed (non-fatal, will retry on normal cadence): {e}",
                self.plc_name
            ),
        }

        if let Some(publish_sink) = self.publish_sink.as_mut() {
            if let Err(e) = publish_sink.probe() {
                log::warn!(
                    "[{}] publish sink startup probe failed (non-fatal): {e}",
                    self.plc_name
                );
            }
        }

        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                break;
            }
            if !self.run_cycle() {
                break;
            }
            self.wait_for_next_cycle();
        }

        if let Some(handle) = self.pending_sink_join.take() {
            match handle.join() {
                Ok((sample_sink, publish_sink)) => {
                    self.sample_sink = Some(sample_sink);
                    self.publish_sink = Some(publish_sink);
                }
                Err(_) => log::error!("[{}] sink dispatch thread panicked", self.plc_name),
            }
        }

        // `TooManyErrors` already told the supervisor this Poller is done;
        // sending `Stopped` too would double-count it against the
        // supervisor's outstanding-poller tally.
        if !self.too_many_errors_reported {
            let _ = self.control_tx.send(PollerEvent::Stopped {
                plc_name: self.plc_name.clone(),
            });
        }
        log::info!("[{}] poller stopped", self.plc_name);
    }

    /// Waits until the next cycle is due. In continuous mode this is a plain
    /// sleep; in signal-based mode ([`Self::with_wake_flag`]) it polls the
    /// wake flag (and the stop flag) in short steps so a SIGUSR1 handler can
    /// cut the wait short, while still falling back to the normal cadence if
    /// no signal ever arrives.
    fn wait_for_next_cycle(&self) {
        let Some(wake_flag) = &self.wake_flag else {
            thread::sleep(self.sleep_interval);
            return;
        };

        const POLL_STEP: Duration = Duration::from_millis(20);
        let step = POLL_STEP.min(self.sleep_interval.max(POLL_STEP));
        let mut waited = Duration::ZERO;

        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                return;
            }
            if wake_flag.swap(false, Ordering::Relaxed) {
                return;
            }
            if waited >= self.sleep_interval {
                return;
            }
            thread::sleep(step);
            waited += step;
        }
    }

    /// Runs one polling cycle. Returns `false` if the Poller just reported
    /// `TooManyErrors` and should stop.
    fn run_cycle(&mut self) -> bool {
        // One-cycle sink pipeline depth: join the previous cycle's sink
        // dispatch before building this cycle's sample.
        if let Some(handle) = self.pending_sink_join.take() {
            match handle.join() {
                Ok((sample_sink, publish_sink)) => {
                    self.sample_sink = Some(sample_sink);
                    self.publish_sink = Some(publish_sink);
                }
                Err(_) => log::error!("[{}] sink dispatch thread panicked", self.plc_name),
            }
        }

        let timestamp = chrono::Local::now().naive_local();
        let mut results: HashMap<String, Option<Value>> = HashMap::new();
        let mut heartbeat = false;

        for group in &self.plan.multi_read_batches {
            let entries: Vec<(String, DataType)> = group
                .iter()
                .map(|(_, addr, dtype)| (addr.clone(), *dtype))
                .collect();

            match self.engine.multiple_read(&entries) {
                Ok(outcomes) => {
                    for ((tag, _, _), outcome) in group.iter().zip(outcomes.iter()) {
                        if outcome.success {
                            heartbeat = true;
                        }
                        results.insert(tag.clone(), outcome.value.clone());
                    }
                }
                Err(e) => {
                    log::warn!(
                        "[{}] multi-read group of {} addresses failed ({e}); falling back to per-address reads",
                        self.plc_name,
                        group.len()
                    );
                    for (tag, addr, dtype) in group {
                        let outcome = self.engine.read(addr, *dtype);
                        if outcome.success {
                            heartbeat = true;
                        }
                        results.insert(tag.clone(), outcome.value);
                    }
                }
            }
        }

        for entry in &self.plan.individual_reads {
            match entry {
                PlannedRead::Known {
                    tag,
                    address,
                    dtype,
                } => {
                    let outcome = self.engine.read(address, *dtype);
                    if outcome.success {
                        heartbeat = true;
                        results.insert(tag.clone(), outcome.value);
                    } else {
                        results.insert(tag.clone(), None);
                        self.failed_to_read += 1;
                        log::error!(
                            "[{}] missed reading {} ({address}): {}",
                            self.plc_name,
                            self.failed_to_read,
                            outcome.message
                        );
                    }
                }
                PlannedRead::Unknown {
                    tag,
                    address,
                    raw_type,
                } => {
                    results.insert(tag.clone(), None);
                    self.failed_to_read += 1;
                    log::error!(
                        "[{}] missed reading {} ({address}): unrecognized data type '{raw_type}'",
                        self.plc_name,
                        self.failed_to_read
                    );
                }
            }
        }

        let columns: Vec<(String, Option<Value>)> = self
            .plan
            .original_tags
            .iter()
            .map(|tag| {
                if self.plan.heartbeat_tag.as_deref() == Some(tag.as_str()) {
                    (tag.clone(), Some(Value::Bool(heartbeat)))
                } else {
                    (tag.clone(), results.remove(tag).unwrap_or(None))
                }
            })
            .collect();

        self.dispatch_to_sinks(timestamp, columns);

        if self.failed_to_read > THRESHOLD {
            log::error!(
                "[{}] too many errors encountered: {} reads have failed (threshold {THRESHOLD}); stopping",
                self.plc_name,
                self.failed_to_read
            );
            self.too_many_errors_reported = true;
            let _ = self.control_tx.send(PollerEvent::TooManyErrors {
                plc_name: self.plc_name.clone(),
                failed_to_read: self.failed_to_read,
            });
            return false;
        }
        true
    }

    /// Spawns the sink-dispatch thread for one cycle's sample, handing the
    /// sinks to the thread and recording its `JoinHandle` so the next cycle
    /// can reclaim them.
    fn dispatch_to_sinks(&mut self, timestamp: NaiveDateTime, columns: Vec<(String, Option<Value>)>) {
        let mut sample_sink = self.sample_sink.take().expect("sample sink missing between cycles");
        let mut publish_sink = self.publish_sink.take().expect("publish sink missing between cycles");
        let plc_name = self.plc_name.clone();
        let heartbeat_tag = self.plan.heartbeat_tag.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = sample_sink.write(timestamp, &columns) {
                log::error!("[{plc_name}] CSV sink write failed: {e}");
            }

            for (tag, value) in &columns {
                let Some(value) = value else { continue };

                let publish_value = if heartbeat_tag.as_deref() == Some(tag.as_str()) {
                    match value {
                        Value::Bool(b) => PublishValue::Bool(*b),
                        other => PublishValue::from_value(other, timestamp),
                    }
                } else {
                    PublishValue::from_value(value, timestamp)
                };

                if let Err(e) = publish_sink.write(tag, publish_value) {
                    log::error!("[{plc_name}] publish sink write failed for '{tag}': {e}");
                }
            }

            (sample_sink, publish_sink)
        });

        self.pending_sink_join = Some(handle);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.pending_sink_join.take() {
            let _ = handle.join();
        }
        log::debug!("[{}] poller resources released", self.plc_name);
    }
}
