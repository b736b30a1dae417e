//! # Omron FINS Protocol Bridge
//!
//! A Rust implementation of an industrial edge bridge that polls OMRON-family
//! PLCs (CS/CJ/CP/NJ) over the FINS/UDP protocol and republishes the samples
//! to CSV files and, via the [`sinks::PublishSink`] trait boundary, to an
//! OPC UA server.
//!
//! The crate is read-only by design: it has no facility for writing PLC
//! memory, controlling run/stop state, or forcing bits. Every operation in
//! this crate issues one FINS read request and decodes its response.
//!
//! ## Layering
//!
//! - [`memory`] — the static table of FINS memory-area codes.
//! - [`address`] — parses symbolic addresses (`D100`, `W0.05`, `EM12300`, …).
//! - [`data_type`] — the `DataType`/`Value` conversion layer.
//! - [`header`], [`command`], [`response`] — the FINS wire codec.
//! - [`transport`] — UDP send/receive with retries.
//! - [`engine`] — chunking, batching, and multi-area reads built on top of
//!   the transport and codec.
//! - [`poller`] — the per-PLC scheduling loop that drives an `Engine` on a
//!   fixed cycle and fans results out to sinks.
//! - [`config`], [`sinks`] — the ambient configuration loader and sink
//!   interfaces a deployable binary needs; see `src/bin/fins_bridge.rs` for
//!   how they are wired together.
//!
//! ## Example
//!
//! ```no_run
//! use omron_fins::engine::Engine;
//! use omron_fins::data_type::DataType;
//! use omron_fins::header::NodeAddress;
//! use std::time::Duration;
//!
//! let mut engine = Engine::new(
//!     "192.168.1.10:9600".parse().unwrap(),
//!     Duration::from_secs(5),
//!     NodeAddress::new(0, 1, 0),
//!     NodeAddress::new(0, 0, 0),
//! ).unwrap();
//!
//! let outcome = engine.read("D100", DataType::Int16);
//! if outcome.success {
//!     println!("D100 = {:?}", outcome.value);
//! }
//! ```
//!
//! ## Error handling
//!
//! Library code returns [`FinsError`] (protocol/address/data/transport
//! errors), [`config::ConfigError`] (configuration loading), or
//! [`sinks::SinkError`] (sink I/O), each a `thiserror`-derived enum. The
//! `fins-bridge` binary converts all of these to `anyhow::Error` at its top
//! level.
//!
//! ## Logging
//!
//! The crate uses the [`log`] facade throughout; it never installs a logger
//! itself. The `fins-bridge` binary installs `env_logger` at startup. Poller
//! log lines are prefixed with the PLC name in brackets, e.g. `[line1] ...`.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod address;
pub mod command;
pub mod config;
pub mod data_type;
pub mod engine;
pub mod error;
pub mod header;
pub mod memory;
pub mod poller;
pub mod response;
pub mod sinks;
pub mod transport;

// Public re-exports of the most commonly used types.
pub use address::Address;
pub use command::{
    ClockReadCommand, CpuUnitDataReadCommand, CpuUnitStatusReadCommand, MultiReadSpec,
    MultipleReadCommand, ReadWordCommand, WordAddress, MAX_MULTI_READ_ENTRIES,
    MAX_WORDS_PER_COMMAND,
};
pub use config::Config;
pub use data_type::{DataType, Value};
pub use engine::{BatchReadOutcome, Engine, ReadOutcome, MAX_CHUNK_SIZE, MAX_READ_SIZE};
pub use error::{FinsError, Result};
pub use header::{FinsHeader, NodeAddress, FINS_HEADER_SIZE};
pub use memory::MemoryArea;
pub use poller::{Poller, PollerEvent, ReadPlan};
pub use response::FinsResponse;
pub use sinks::{CsvSampleSink, PublishSink, PublishValue, SampleSink};
pub use transport::{UdpTransport, DEFAULT_FINS_PORT, DEFAULT_TIMEOUT, MAX_PACKET_SIZE};
