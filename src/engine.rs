//! Request engine: chunks oversized reads, issues single/batched/multiple
//! area reads, and aggregates the results the [`crate::poller::Poller`]
//! publishes.
//!
//! This is the layer above [`crate::transport::UdpTransport`] and below the
//! polling loop. It owns one socket (one PLC connection), never retries a
//! well-formed protocol error (only the transport retries on timeouts and
//! socket errors), and never issues two requests concurrently — the same
//! single-flight contract `UdpTransport` documents.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::address::{self, Address};
use crate::command::{
    ClockReadCommand, CpuUnitDataReadCommand, CpuUnitStatusReadCommand, MultiReadSpec,
    MultipleReadCommand, ReadWordCommand,
};
use crate::data_type::{self, DataType, Value};
use crate::error::{FinsError, Result};
use crate::header::NodeAddress;
use crate::response::{CpuMode, CpuStatus, FinsResponse};
use crate::transport::UdpTransport;

/// Maximum number of words requested per wire-level read. A request for more
/// words than this is split into several `0x0101` commands whose chunk sizes
/// sum to the total.
pub const MAX_CHUNK_SIZE: u16 = 990;

/// Maximum number of items [`Engine::batch_read`] will accept in one call.
pub const MAX_READ_SIZE: u32 = 65535;

/// Outcome of [`Engine::read`]: one address, one decoded value (or none, on
/// failure).
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    /// Whether the read succeeded.
    pub success: bool,
    /// Human-readable status message (`"ok"` on success, the error text on
    /// failure).
    pub message: String,
    /// The address string this outcome is for.
    pub address: String,
    /// The decoded value, present iff `success`.
    pub value: Option<Value>,
}

impl ReadOutcome {
    fn ok(address: &str, value: Value) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            address: address.to_string(),
            value: Some(value),
        }
    }

    fn err(address: &str, err: &FinsError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            address: address.to_string(),
            value: None,
        }
    }
}

/// Outcome of [`Engine::batch_read`]: one address, `n` decoded items. An
/// individual item can be `None` (a per-item BCD or decode failure) without
/// invalidating its siblings; the whole outcome is only `success = false`
/// when the request itself failed (address/data error, or a transport or
/// protocol error cut the read short).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReadOutcome {
    /// Whether the batch as a whole completed without a request-level error.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
    /// The address string this outcome is for.
    pub address: String,
    /// Decoded items, in request order. Shorter than the requested count if
    /// a transport or protocol error aborted the read partway through.
    pub values: Vec<Option<Value>>,
}

/// Owns one PLC's UDP socket and issues read requests against it.
///
/// Not `Sync` by convention: exactly one [`crate::poller::Poller`] thread
/// drives an `Engine` at a time, matching the transport's single-flight
/// contract.
pub struct Engine {
    transport: UdpTransport,
    source: NodeAddress,
    destination: NodeAddress,
    sid_counter: AtomicU8,
}

impl Engine {
    /// Creates a new engine connected to `plc_addr`, using `source` and
    /// `destination` as the FINS node addresses for every request it sends.
    ///
    /// # Errors
    ///
    /// Returns an error if the UDP socket cannot be created or configured.
    pub fn new(
        plc_addr: SocketAddr,
        timeout: Duration,
        source: NodeAddress,
        destination: NodeAddress,
    ) -> Result<Self> {
        Ok(Self {
            transport: UdpTransport::new(plc_addr, timeout)?,
            source,
            destination,
            sid_counter: AtomicU8::new(0),
        })
    }

    fn next_sid(&self) -> u8 {
        self.sid_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether the underlying transport is healthy.
    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    /// Reads one item of `dtype` from `addr`, chunking the underlying word
    /// read if `dtype` ever needed more than [`MAX_CHUNK_SIZE`] words (it
    /// never does in practice — the widest `DataType` is 4 words — but the
    /// chunking path is shared with [`Self::batch_read`]).
    pub fn read(&mut self, addr: &str, dtype: DataType) -> ReadOutcome {
        let parsed = match address::parse(addr, 0) {
            Ok(a) => a,
            Err(e) => return ReadOutcome::err(addr, &e),
        };

        let (bytes, read_err) = self.read_words(&parsed, dtype.words_per_item() as u32);
        match read_err {
            None => match data_type::decode(dtype, &bytes, parsed.bit()) {
                Ok(value) => ReadOutcome::ok(addr, value),
                Err(e) => ReadOutcome::err(addr, &e),
            },
            Some(e) => ReadOutcome::err(addr, &e),
        }
    }

    /// Reads `n` consecutive items of `dtype` starting at `addr`.
    ///
    /// On a mid-stream transport or protocol failure, returns the items
    /// successfully decoded before the failure with `success = false`.
    pub fn batch_read(&mut self, addr: &str, dtype: DataType, n: u16) -> BatchReadOutcome {
        if n == 0 {
            return BatchReadOutcome {
                success: false,
                message: "empty".to_string(),
                address: addr.to_string(),
                values: Vec::new(),
            };
        }
        if n as u32 > MAX_READ_SIZE {
            return BatchReadOutcome {
                success: false,
                message: "too large".to_string(),
                address: addr.to_string(),
                values: Vec::new(),
            };
        }

        let parsed = match address::parse(addr, 0) {
            Ok(a) => a,
            Err(e) => {
                return BatchReadOutcome {
                    success: false,
                    message: e.to_string(),
                    address: addr.to_string(),
                    values: Vec::new(),
                }
            }
        };

        let item_words = dtype.words_per_item() as u32;
        let total_words = item_words * n as u32;

        let (bytes, read_err) = self.read_words(&parsed, total_words);

        let item_size = item_words as usize * 2;
        let mut values = Vec::with_capacity(bytes.len() / item_size.max(1));
        for chunk in bytes.chunks_exact(item_size) {
            match data_type::decode(dtype, chunk, parsed.bit()) {
                Ok(value) => values.push(Some(value)),
                Err(e) => {
                    log::warn!("batch_read item decode failed for {addr}: {e}");
                    values.push(None);
                }
            }
        }

        match read_err {
            None => BatchReadOutcome {
                success: true,
                message: "ok".to_string(),
                address: addr.to_string(),
                values,
            },
            Some(e) => BatchReadOutcome {
                success: false,
                message: e.to_string(),
                address: addr.to_string(),
                values,
            },
        }
    }

    /// Reads `total_words` words starting at `parsed`, chunking the request
    /// into `0x0101` commands of at most [`MAX_CHUNK_SIZE`] words each and
    /// concatenating their raw big-endian bytes. Stops at the first
    /// unsuccessful chunk, returning the bytes accumulated from the chunks
    /// that already succeeded alongside the error that ended the read.
    fn read_words(&mut self, parsed: &Address, total_words: u32) -> (Vec<u8>, Option<FinsError>) {
        let mut bytes = Vec::with_capacity(total_words as usize * 2);
        for (chunk_offset, chunk_size) in chunk_words(total_words) {
            let word_address = match parsed.word_offset().checked_add(chunk_offset as u16) {
                Some(addr) => addr,
                None => return (bytes, Some(FinsError::address_error("word offset overflows u16"))),
            };

            let sid = self.next_sid();
            let cmd = match ReadWordCommand::new(
                self.destination,
                self.source,
                sid,
                parsed.area(),
                word_address,
                chunk_size,
            ) {
                Ok(cmd) => cmd,
                Err(e) => return (bytes, Some(e)),
            };
            let response_bytes = match self.transport.send_receive(&cmd.to_bytes()) {
                Ok(b) => b,
                Err(e) => return (bytes, Some(e)),
            };
            let response = match FinsResponse::from_bytes(&response_bytes) {
                Ok(r) => r,
                Err(e) => return (bytes, Some(e)),
            };
            if let Err(e) = response.check_sid(sid) {
                return (bytes, Some(e));
            }
            if let Err(e) = response.check_error() {
                return (bytes, Some(e));
            }
            bytes.extend_from_slice(&response.data);
        }
        (bytes, None)
    }

    /// Reads up to 20 addresses spanning different memory areas in a single
    /// `0x0104` request.
    ///
    /// # Errors
    ///
    /// Returns an error (no packet sent) if `entries` is empty, exceeds the
    /// protocol's 20-entry limit, or any address fails to parse.
    pub fn multiple_read(&mut self, entries: &[(String, DataType)]) -> Result<Vec<ReadOutcome>> {
        if entries.is_empty() {
            return Err(FinsError::data_error("empty"));
        }
        if entries.len() > crate::command::MAX_MULTI_READ_ENTRIES {
            return Err(FinsError::data_error("too large"));
        }

        let parsed: Vec<(String, DataType, Address)> = entries
            .iter()
            .map(|(addr, dtype)| address::parse(addr, 0).map(|a| (addr.clone(), *dtype, a)))
            .collect::<Result<_>>()?;

        let specs: Vec<MultiReadSpec> = parsed
            .iter()
            .map(|(_, _, addr)| MultiReadSpec {
                area: addr.area(),
                address: addr.word_offset(),
                bit: addr.bit(),
            })
            .collect();

        let sid = self.next_sid();
        let cmd = MultipleReadCommand::new(self.destination, self.source, sid, specs)?;
        let response_bytes = self.transport.send_receive(&cmd.to_bytes()?)?;
        let response = FinsResponse::from_bytes(&response_bytes)?;
        response.check_sid(sid)?;
        response.check_error()?;

        let mut cursor = &response.data[..];
        let mut outcomes = Vec::with_capacity(parsed.len());
        for (addr_str, dtype, addr) in &parsed {
            let item_size = dtype.words_per_item() as usize * 2;
            if cursor.len() < 1 + item_size {
                return Err(FinsError::invalid_response(
                    "multiple read response shorter than the request's entry count",
                ));
            }
            // One area-code byte precedes each entry's value bytes.
            let (_area_code, rest) = cursor.split_at(1);
            let (value_bytes, rest) = rest.split_at(item_size);
            cursor = rest;

            let outcome = match data_type::decode(*dtype, value_bytes, addr.bit()) {
                Ok(value) => ReadOutcome::ok(addr_str, value),
                Err(e) => ReadOutcome::err(addr_str, &e),
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Reads CPU unit data (`0x0501`). Used as the poller's startup
    /// connectivity probe; returns the raw response payload since the probe
    /// only cares whether the PLC answered.
    pub fn cpu_unit_data_read(&mut self) -> Result<Vec<u8>> {
        let sid = self.next_sid();
        let cmd = CpuUnitDataReadCommand::new(self.destination, self.source, sid);
        let response_bytes = self.transport.send_receive(&cmd.to_bytes())?;
        let response = FinsResponse::from_bytes(&response_bytes)?;
        response.check_sid(sid)?;
        response.check_error()?;
        Ok(response.data)
    }

    /// Reads CPU unit status (`0x0601`): operating mode and run status.
    pub fn cpu_unit_status_read(&mut self) -> Result<(CpuMode, CpuStatus)> {
        let sid = self.next_sid();
        let cmd = CpuUnitStatusReadCommand::new(self.destination, self.source, sid);
        let response_bytes = self.transport.send_receive(&cmd.to_bytes())?;
        let response = FinsResponse::from_bytes(&response_bytes)?;
        response.check_sid(sid)?;
        response.check_error()?;
        response.to_cpu_status()
    }

    /// Reads the PLC's real-time clock (`0x0701`).
    pub fn clock_read(&mut self) -> Result<chrono::NaiveDateTime> {
        let sid = self.next_sid();
        let cmd = ClockReadCommand::new(self.destination, self.source, sid);
        let response_bytes = self.transport.send_receive(&cmd.to_bytes())?;
        let response = FinsResponse::from_bytes(&response_bytes)?;
        response.check_sid(sid)?;
        response.check_error()?;
        response.to_clock()
    }
}

/// Splits `total_words` into `(offset, size)` pairs, each `size` at most
/// [`MAX_CHUNK_SIZE`], summing to `total_words`.
fn chunk_words(total_words: u32) -> Vec<(u32, u16)> {
    let mut chunks = Vec::new();
    let mut offset = 0u32;
    let mut remaining = total_words;
    while remaining > 0 {
        let size = remaining.min(MAX_CHUNK_SIZE as u32) as u16;
        chunks.push((offset, size));
        offset += size as u32;
        remaining -= size as u32;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_words_under_limit() {
        assert_eq!(chunk_words(4), vec![(0, 4)]);
    }

    #[test]
    fn test_chunk_words_zero() {
        assert_eq!(chunk_words(0), Vec::<(u32, u16)>::new());
    }

    #[test]
    fn test_chunk_words_2000() {
        let chunks = chunk_words(2000);
        assert_eq!(chunks, vec![(0, 990), (990, 990), (1980, 20)]);
        let total: u32 = chunks.iter().map(|(_, size)| *size as u32).sum();
        assert_eq!(total, 2000);
    }

    fn test_engine() -> Engine {
        Engine::new(
            "127.0.0.1:9600".parse().unwrap(),
            Duration::from_millis(50),
            NodeAddress::new(0, 1, 0),
            NodeAddress::new(0, 10, 0),
        )
        .unwrap()
    }

    #[test]
    fn test_read_with_unparseable_address_never_touches_the_network() {
        let mut engine = test_engine();
        let outcome = engine.read("X100", DataType::Int16);
        assert!(!outcome.success);
        assert_eq!(outcome.address, "X100");
        assert!(outcome.value.is_none());
    }

    #[test]
    fn test_batch_read_rejects_zero_count() {
        let mut engine = test_engine();
        let outcome = engine.batch_read("D100", DataType::Int16, 0);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "empty");
    }

    #[test]
    fn test_batch_read_rejects_oversized_count() {
        let mut engine = test_engine();
        let outcome = engine.batch_read("D100", DataType::Int16, u16::MAX);
        assert!(outcome.success || outcome.message != "too large");
        // u16::MAX (65535) sits exactly at MAX_READ_SIZE, so this must not
        // be rejected as "too large"; only n > 65535 is rejected, which a
        // u16 cannot represent.
    }

    #[test]
    fn test_multiple_read_rejects_empty_entries() {
        let mut engine = test_engine();
        assert!(engine.multiple_read(&[]).is_err());
    }

    #[test]
    fn test_multiple_read_rejects_too_many_entries() {
        let mut engine = test_engine();
        let entries: Vec<(String, DataType)> = (0..21)
            .map(|i| (format!("D{i}"), DataType::Int16))
            .collect();
        assert!(engine.multiple_read(&entries).is_err());
    }

    #[test]
    fn test_multiple_read_rejects_bad_address_without_sending() {
        let mut engine = test_engine();
        let entries = vec![
            ("D100".to_string(), DataType::Int16),
            ("X1".to_string(), DataType::Int16),
        ];
        assert!(engine.multiple_read(&entries).is_err());
    }

    #[test]
    fn test_read_words_zero_words_returns_empty_bytes_no_error() {
        let mut engine = test_engine();
        let parsed = address::parse("D100", 0).unwrap();
        let (bytes, err) = engine.read_words(&parsed, 0);
        assert!(bytes.is_empty());
        assert!(err.is_none());
    }

    #[test]
    fn test_batch_read_reports_failure_address_error_with_no_values() {
        // An address error is detected before any chunk is attempted, so
        // `batch_read` must report failure with an empty `values` vec
        // rather than panicking on the now-tuple-shaped `read_words` return.
        let mut engine = test_engine();
        let outcome = engine.batch_read("X1", DataType::Int16, 5);
        assert!(!outcome.success);
        assert!(outcome.values.is_empty());
    }

    proptest::proptest! {
        /// For any total word count, `chunk_words` produces chunks that sum
        /// back to the total and never exceed `MAX_CHUNK_SIZE`.
        #[test]
        fn prop_chunk_words_sums_and_bounds(total in 0u32..200_000) {
            let chunks = chunk_words(total);
            let sum: u32 = chunks.iter().map(|(_, size)| *size as u32).sum();
            prop_assert_eq!(sum, total);
            for (_, size) in &chunks {
                prop_assert!(*size <= MAX_CHUNK_SIZE);
            }
        }

        /// Chunk offsets are contiguous and strictly increasing.
        #[test]
        fn prop_chunk_words_offsets_contiguous(total in 1u32..200_000) {
            let chunks = chunk_words(total);
            let mut expected_offset = 0u32;
            for (offset, size) in &chunks {
                prop_assert_eq!(*offset, expected_offset);
                expected_offset += *size as u32;
            }
        }
    }
}
