//! Memory area definitions for FINS protocol.

use crate::error::{FinsError, Result};

/// Memory areas available in Omron PLCs.
///
/// Each area has a FINS code for word access and, for every area except
/// `DM`, a FINS code for bit access. Across the whole table the bit code is
/// always the word code minus `0x80` — a pattern this module relies on
/// instead of hard-coding every pair twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryArea {
    /// CIO (Core I/O) area - general purpose I/O and internal relays.
    CIO,
    /// WR (Work) area - work bits/words.
    WR,
    /// HR (Holding) area - holding bits/words that retain values.
    HR,
    /// AR (Auxiliary) area - system/auxiliary relay bits/words.
    AR,
    /// DM (Data Memory) area - word-only data storage.
    DM,
    /// Timer present value / completion flag area.
    Timer,
    /// Counter present value / completion flag area. Word addressing carries
    /// an implicit `+0x0800` offset (see [`crate::address`]) because Timer
    /// and Counter share one 4096-entry numbering space.
    Counter,
    /// Extended memory bank, either a single hex digit (0-F) or a two-digit
    /// decimal bank (10-18).
    Extended(EmBank),
}

/// One extended-memory bank selector.
///
/// `Hex(n)` covers banks `EM0`..`EMF` (`n` in `0..=15`); `Decimal(n)` covers
/// the second-generation banks `EM10`..`EM18` (`n` in `10..=18`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmBank {
    /// Single hex-digit bank 0-15 (`E0`..`EF` in address text).
    Hex(u8),
    /// Two-digit decimal bank 10-18 (`EM10`..`EM18` in address text).
    Decimal(u8),
}

impl MemoryArea {
    /// Returns the FINS code for word access to this memory area.
    ///
    /// These codes are used in FINS commands to identify the memory area.
    pub(crate) fn word_code(self) -> u8 {
        match self {
            MemoryArea::CIO => 0xB0,
            MemoryArea::WR => 0xB1,
            MemoryArea::HR => 0xB2,
            MemoryArea::AR => 0xB3,
            MemoryArea::DM => 0x82,
            MemoryArea::Timer | MemoryArea::Counter => 0x89,
            MemoryArea::Extended(EmBank::Hex(bank)) => 0xA0 + bank,
            MemoryArea::Extended(EmBank::Decimal(bank)) => 0xE0 + (bank - 10),
        }
    }

    /// Returns the FINS code for bit access to this memory area.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::AddressError` if the memory area does not support
    /// bit access (DM area).
    pub(crate) fn bit_code(self) -> Result<u8> {
        match self {
            MemoryArea::DM => Err(FinsError::address_error(
                "DM area does not support bit access",
            )),
            other => Ok(other.word_code() - 0x80),
        }
    }

    /// Returns whether this memory area supports bit access.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::MemoryArea;
    ///
    /// assert!(MemoryArea::CIO.supports_bit_access());
    /// assert!(!MemoryArea::DM.supports_bit_access());
    /// ```
    pub fn supports_bit_access(self) -> bool {
        !matches!(self, MemoryArea::DM)
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryArea::CIO => write!(f, "CIO"),
            MemoryArea::WR => write!(f, "WR"),
            MemoryArea::HR => write!(f, "HR"),
            MemoryArea::AR => write!(f, "AR"),
            MemoryArea::DM => write!(f, "DM"),
            MemoryArea::Timer => write!(f, "TIMER"),
            MemoryArea::Counter => write!(f, "COUNTER"),
            MemoryArea::Extended(EmBank::Hex(bank)) => write!(f, "EM{:X}", bank),
            MemoryArea::Extended(EmBank::Decimal(bank)) => write!(f, "EM{}", bank),
        }
    }
}
