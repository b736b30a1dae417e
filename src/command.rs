//! FINS command structures and serialization.
//!
//! This module contains the read-side FINS command structures issued by the
//! request engine. Each command handles its own serialization to bytes for
//! transmission. Writes and PLC-control commands (run/stop/force/fill/
//! transfer) are out of scope for this crate and have no counterpart here.
//!
//! # Command Types
//!
//! - [`ReadWordCommand`] - Read a run of words from one memory area (0x0101)
//! - [`MultipleReadCommand`] / [`MultiReadSpec`] - Read from up to 20
//!   addresses spanning different memory areas in one request (0x0104)
//! - [`CpuUnitDataReadCommand`] - Read CPU unit data (0x0501)
//! - [`CpuUnitStatusReadCommand`] - Read CPU unit status (0x0601)
//! - [`ClockReadCommand`] - Read the PLC's real-time clock (0x0701)
//!
//! # Example
//!
//! ```
//! use omron_fins::{ReadWordCommand, MemoryArea, NodeAddress};
//!
//! let dest = NodeAddress::new(0, 10, 0);
//! let src = NodeAddress::new(0, 1, 0);
//!
//! let cmd = ReadWordCommand::new(dest, src, 0x01, MemoryArea::DM, 100, 10).unwrap();
//! let bytes = cmd.to_bytes();
//! // bytes can now be sent over UDP
//! ```
//!
//! # Constants
//!
//! - [`MAX_WORDS_PER_COMMAND`] - Maximum number of words a single read
//!   command may request (999, the protocol's wire limit; the request
//!   engine chunks larger reads before they reach this layer)
//! - [`MAX_MULTI_READ_ENTRIES`] - Maximum number of specs in one
//!   [`MultipleReadCommand`] (20)

use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, NodeAddress, FINS_HEADER_SIZE};
use crate::memory::MemoryArea;

/// Memory Read command code (MRC).
pub(crate) const MRC_MEMORY_READ: u8 = 0x01;
/// Memory Read command sub-code (SRC).
pub(crate) const SRC_MEMORY_READ: u8 = 0x01;
/// Multiple Memory Area Read command sub-code (SRC).
pub(crate) const SRC_MULTIPLE_READ: u8 = 0x04;
/// CPU Unit Data Read command code (MRC).
pub(crate) const MRC_CPU_UNIT_DATA_READ: u8 = 0x05;
/// CPU Unit Data Read command sub-code (SRC).
pub(crate) const SRC_CPU_UNIT_DATA_READ: u8 = 0x01;
/// CPU Unit Status Read command code (MRC).
pub(crate) const MRC_CPU_UNIT_STATUS_READ: u8 = 0x06;
/// CPU Unit Status Read command sub-code (SRC).
pub(crate) const SRC_CPU_UNIT_STATUS_READ: u8 = 0x01;
/// Clock Read command code (MRC).
pub(crate) const MRC_CLOCK_READ: u8 = 0x07;
/// Clock Read command sub-code (SRC).
pub(crate) const SRC_CLOCK_READ: u8 = 0x01;

/// Maximum number of words that can be requested in a single read command.
pub const MAX_WORDS_PER_COMMAND: u16 = 999;

/// Maximum number of specs accepted by [`MultipleReadCommand::new`].
pub const MAX_MULTI_READ_ENTRIES: usize = 20;

/// Word/bit address as it appears on the wire inside a command body.
///
/// Distinct from [`crate::address::Address`], which is the parsed form of a
/// symbolic string like `D1000` or `W100.03` — this type is the 3-byte
/// encoding every read command embeds after the area code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordAddress {
    /// Word address in the memory area.
    pub word: u16,
    /// Bit position (0-15) for bit access, or 0 for word access.
    pub bit: u8,
}

impl WordAddress {
    /// Creates a new word address (bit = 0).
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::command::WordAddress;
    ///
    /// let addr = WordAddress::word(100);
    /// assert_eq!(addr.word, 100);
    /// assert_eq!(addr.bit, 0);
    /// ```
    pub fn word(word: u16) -> Self {
        Self { word, bit: 0 }
    }

    /// Creates a new bit address.
    ///
    /// # Errors
    ///
    /// Returns an error if bit > 15.
    pub fn bit(word: u16, bit: u8) -> Result<Self> {
        if bit > 15 {
            return Err(FinsError::data_error("bit position must be 0-15"));
        }
        Ok(Self { word, bit })
    }

    /// Serializes address to 3 bytes (word high, word low, bit).
    pub(crate) fn to_bytes(self) -> [u8; 3] {
        [(self.word >> 8) as u8, (self.word & 0xFF) as u8, self.bit]
    }
}

/// Command for reading a run of words from one PLC memory area.
#[derive(Debug, Clone)]
pub struct ReadWordCommand {
    header: FinsHeader,
    area: MemoryArea,
    address: WordAddress,
    count: u16,
}

impl ReadWordCommand {
    /// Creates a new read word command.
    ///
    /// # Arguments
    ///
    /// * `destination` - Destination node address
    /// * `source` - Source node address
    /// * `sid` - Service ID for request/response matching
    /// * `area` - Memory area to read from
    /// * `word_address` - Starting word address
    /// * `count` - Number of words to read (1-999)
    ///
    /// # Errors
    ///
    /// Returns an error if count is 0 or exceeds [`MAX_WORDS_PER_COMMAND`].
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::{ReadWordCommand, MemoryArea, NodeAddress};
    ///
    /// let cmd = ReadWordCommand::new(
    ///     NodeAddress::new(0, 10, 0),
    ///     NodeAddress::new(0, 1, 0),
    ///     0x01,
    ///     MemoryArea::DM,
    ///     100,
    ///     10,
    /// ).unwrap();
    /// ```
    pub fn new(
        destination: NodeAddress,
        source: NodeAddress,
        sid: u8,
        area: MemoryArea,
        word_address: u16,
        count: u16,
    ) -> Result<Self> {
        if count == 0 {
            return Err(FinsError::data_error("count must be greater than 0"));
        }
        if count > MAX_WORDS_PER_COMMAND {
            return Err(FinsError::data_error(format!(
                "count must not exceed {MAX_WORDS_PER_COMMAND}"
            )));
        }

        Ok(Self {
            header: FinsHeader::new_command(destination, source, sid),
            area,
            address: WordAddress::word(word_address),
            count,
        })
    }

    /// Returns the service ID.
    pub fn sid(&self) -> u8 {
        self.header.sid
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FINS_HEADER_SIZE + 8);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.push(MRC_MEMORY_READ);
        bytes.push(SRC_MEMORY_READ);
        bytes.push(self.area.word_code());
        bytes.extend_from_slice(&self.address.to_bytes());
        bytes.push((self.count >> 8) as u8);
        bytes.push((self.count & 0xFF) as u8);
        bytes
    }
}

/// Specification for one entry of a [`MultipleReadCommand`].
#[derive(Debug, Clone)]
pub struct MultiReadSpec {
    /// Memory area to read from.
    pub area: MemoryArea,
    /// Word address.
    pub address: u16,
    /// Optional bit position (`None` for word, `Some(n)` for bit n).
    pub bit: Option<u8>,
}

/// Command for reading from multiple memory areas in a single request.
///
/// Limited to [`MAX_MULTI_READ_ENTRIES`] specs; a request needing more than
/// that is the request engine's job to split into several commands.
#[derive(Debug, Clone)]
pub struct MultipleReadCommand {
    header: FinsHeader,
    specs: Vec<MultiReadSpec>,
}

impl MultipleReadCommand {
    /// Creates a new multiple memory area read command.
    ///
    /// # Arguments
    ///
    /// * `destination` - Destination node address
    /// * `source` - Source node address
    /// * `sid` - Service ID for request/response matching
    /// * `specs` - List of read specifications (1-20 entries)
    ///
    /// # Errors
    ///
    /// Returns an error if `specs` is empty, exceeds
    /// [`MAX_MULTI_READ_ENTRIES`], any bit area doesn't support bit access,
    /// or any bit position is > 15.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::{MultipleReadCommand, MultiReadSpec, MemoryArea, NodeAddress};
    ///
    /// let cmd = MultipleReadCommand::new(
    ///     NodeAddress::new(0, 10, 0),
    ///     NodeAddress::new(0, 1, 0),
    ///     0x01,
    ///     vec![
    ///         MultiReadSpec { area: MemoryArea::DM, address: 100, bit: None },
    ///         MultiReadSpec { area: MemoryArea::DM, address: 200, bit: None },
    ///     ],
    /// ).unwrap();
    /// ```
    pub fn new(
        destination: NodeAddress,
        source: NodeAddress,
        sid: u8,
        specs: Vec<MultiReadSpec>,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(FinsError::data_error("specs must not be empty"));
        }
        if specs.len() > MAX_MULTI_READ_ENTRIES {
            return Err(FinsError::data_error(format!(
                "specs must not exceed {MAX_MULTI_READ_ENTRIES} entries"
            )));
        }

        for spec in &specs {
            if let Some(bit) = spec.bit {
                spec.area.bit_code()?;
                if bit > 15 {
                    return Err(FinsError::data_error("bit position must be 0-15"));
                }
            }
        }

        Ok(Self {
            header: FinsHeader::new_command(destination, source, sid),
            specs,
        })
    }

    /// Returns the service ID.
    pub fn sid(&self) -> u8 {
        self.header.sid
    }

    /// Number of specs carried by this command.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether this command carries no specs. Always `false`: [`Self::new`]
    /// rejects an empty spec list.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Serializes the command to bytes for transmission.
    ///
    /// The payload leads with the two-byte entry count (big-endian) before
    /// the per-entry records, per the multiple-read wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(FINS_HEADER_SIZE + 4 + self.specs.len() * 4);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.push(MRC_MEMORY_READ);
        bytes.push(SRC_MULTIPLE_READ);
        bytes.push((self.specs.len() >> 8) as u8);
        bytes.push((self.specs.len() & 0xFF) as u8);

        for spec in &self.specs {
            if let Some(bit) = spec.bit {
                bytes.push(spec.area.bit_code()?);
                bytes.push((spec.address >> 8) as u8);
                bytes.push((spec.address & 0xFF) as u8);
                bytes.push(bit);
            } else {
                bytes.push(spec.area.word_code());
                bytes.push((spec.address >> 8) as u8);
                bytes.push((spec.address & 0xFF) as u8);
                bytes.push(0x00);
            }
        }

        Ok(bytes)
    }
}

/// Command for reading CPU unit data (model, version, system information).
///
/// Carries no parameters beyond the header; used by the poller's startup
/// connectivity probe.
#[derive(Debug, Clone)]
pub struct CpuUnitDataReadCommand {
    header: FinsHeader,
}

impl CpuUnitDataReadCommand {
    /// Creates a new CPU unit data read command.
    pub fn new(destination: NodeAddress, source: NodeAddress, sid: u8) -> Self {
        Self {
            header: FinsHeader::new_command(destination, source, sid),
        }
    }

    /// Returns the service ID.
    pub fn sid(&self) -> u8 {
        self.header.sid
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FINS_HEADER_SIZE + 2);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.push(MRC_CPU_UNIT_DATA_READ);
        bytes.push(SRC_CPU_UNIT_DATA_READ);
        bytes
    }
}

/// Command for reading CPU unit status (run/program/monitor mode).
#[derive(Debug, Clone)]
pub struct CpuUnitStatusReadCommand {
    header: FinsHeader,
}

impl CpuUnitStatusReadCommand {
    /// Creates a new CPU unit status read command.
    pub fn new(destination: NodeAddress, source: NodeAddress, sid: u8) -> Self {
        Self {
            header: FinsHeader::new_command(destination, source, sid),
        }
    }

    /// Returns the service ID.
    pub fn sid(&self) -> u8 {
        self.header.sid
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FINS_HEADER_SIZE + 2);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.push(MRC_CPU_UNIT_STATUS_READ);
        bytes.push(SRC_CPU_UNIT_STATUS_READ);
        bytes
    }
}

/// Command for reading the PLC's real-time clock.
#[derive(Debug, Clone)]
pub struct ClockReadCommand {
    header: FinsHeader,
}

impl ClockReadCommand {
    /// Creates a new clock read command.
    pub fn new(destination: NodeAddress, source: NodeAddress, sid: u8) -> Self {
        Self {
            header: FinsHeader::new_command(destination, source, sid),
        }
    }

    /// Returns the service ID.
    pub fn sid(&self) -> u8 {
        self.header.sid
    }

    /// Serializes the command to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FINS_HEADER_SIZE + 2);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.push(MRC_CLOCK_READ);
        bytes.push(SRC_CLOCK_READ);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> NodeAddress {
        NodeAddress::new(0, 10, 0)
    }

    fn src() -> NodeAddress {
        NodeAddress::new(0, 1, 0)
    }

    #[test]
    fn test_word_address_word() {
        let addr = WordAddress::word(100);
        assert_eq!(addr.word, 100);
        assert_eq!(addr.bit, 0);
    }

    #[test]
    fn test_word_address_bit_out_of_range() {
        assert!(WordAddress::bit(100, 16).is_err());
    }

    #[test]
    fn test_read_word_command_rejects_zero_count() {
        let result = ReadWordCommand::new(dest(), src(), 0x01, MemoryArea::DM, 100, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_word_command_rejects_oversized_count() {
        let result = ReadWordCommand::new(
            dest(),
            src(),
            0x01,
            MemoryArea::DM,
            100,
            MAX_WORDS_PER_COMMAND + 1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_read_word_command_to_bytes() {
        let cmd = ReadWordCommand::new(dest(), src(), 0x01, MemoryArea::DM, 100, 10).unwrap();
        let bytes = cmd.to_bytes();
        assert_eq!(bytes.len(), FINS_HEADER_SIZE + 8);
        assert_eq!(&bytes[FINS_HEADER_SIZE..FINS_HEADER_SIZE + 2], &[0x01, 0x01]);
        assert_eq!(bytes[FINS_HEADER_SIZE + 2], MemoryArea::DM.word_code());
        assert_eq!(
            &bytes[FINS_HEADER_SIZE + 3..FINS_HEADER_SIZE + 6],
            &[0x00, 0x64, 0x00]
        );
        assert_eq!(&bytes[FINS_HEADER_SIZE + 6..], &[0x00, 0x0A]);
    }

    #[test]
    fn test_multiple_read_command_rejects_empty_specs() {
        let result = MultipleReadCommand::new(dest(), src(), 0x01, vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_multiple_read_command_rejects_too_many_specs() {
        let specs = (0..=MAX_MULTI_READ_ENTRIES)
            .map(|i| MultiReadSpec {
                area: MemoryArea::DM,
                address: i as u16,
                bit: None,
            })
            .collect();
        let result = MultipleReadCommand::new(dest(), src(), 0x01, specs);
        assert!(result.is_err());
    }

    #[test]
    fn test_multiple_read_command_rejects_bit_on_dm() {
        let specs = vec![MultiReadSpec {
            area: MemoryArea::DM,
            address: 100,
            bit: Some(3),
        }];
        let result = MultipleReadCommand::new(dest(), src(), 0x01, specs);
        assert!(result.is_err());
    }

    #[test]
    fn test_multiple_read_command_to_bytes() {
        let specs = vec![
            MultiReadSpec {
                area: MemoryArea::DM,
                address: 100,
                bit: None,
            },
            MultiReadSpec {
                area: MemoryArea::CIO,
                address: 5,
                bit: Some(2),
            },
        ];
        let cmd = MultipleReadCommand::new(dest(), src(), 0x01, specs).unwrap();
        assert_eq!(cmd.len(), 2);
        let bytes = cmd.to_bytes().unwrap();
        assert_eq!(&bytes[FINS_HEADER_SIZE..FINS_HEADER_SIZE + 2], &[0x01, 0x04]);
        let body = &bytes[FINS_HEADER_SIZE + 2..];
        assert_eq!(&body[0..2], &[0x00, 0x02]);
        assert_eq!(&body[2..6], &[MemoryArea::DM.word_code(), 0x00, 0x64, 0x00]);
        assert_eq!(
            &body[6..10],
            &[MemoryArea::CIO.bit_code().unwrap(), 0x00, 0x05, 0x02]
        );
    }

    #[test]
    fn test_cpu_unit_data_read_command_to_bytes() {
        let cmd = CpuUnitDataReadCommand::new(dest(), src(), 0x01);
        let bytes = cmd.to_bytes();
        assert_eq!(bytes.len(), FINS_HEADER_SIZE + 2);
        assert_eq!(&bytes[FINS_HEADER_SIZE..], &[0x05, 0x01]);
    }

    #[test]
    fn test_cpu_unit_status_read_command_to_bytes() {
        let cmd = CpuUnitStatusReadCommand::new(dest(), src(), 0x01);
        let bytes = cmd.to_bytes();
        assert_eq!(&bytes[FINS_HEADER_SIZE..], &[0x06, 0x01]);
    }

    #[test]
    fn test_clock_read_command_to_bytes() {
        let cmd = ClockReadCommand::new(dest(), src(), 0x01);
        let bytes = cmd.to_bytes();
        assert_eq!(&bytes[FINS_HEADER_SIZE..], &[0x07, 0x01]);
    }
}
