//! FINS response parsing and validation.
//!
//! This module handles parsing and validation of FINS responses received from PLCs.
//!
//! # Response Structure
//!
//! A FINS response consists of:
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Header | 10 bytes | FINS header (same structure as command) |
//! | MRC | 1 byte | Main Response Code |
//! | SRC | 1 byte | Sub Response Code |
//! | Main Code | 1 byte | Error main code (0x00 = success) |
//! | Sub Code | 1 byte | Error sub code (0x00 = success) |
//! | Data | Variable | Response data (if any) |
//!
//! # Error Codes
//!
//! A response is successful if both main_code and sub_code are 0x00.
//! Non-zero codes indicate specific errors - refer to Omron documentation
//! for the complete error code reference.
//!
//! # Example
//!
//! ```
//! use omron_fins::FinsResponse;
//!
//! // Parse a successful response with data
//! let bytes = [
//!     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01, // header
//!     0x01, 0x01, // MRC, SRC
//!     0x00, 0x00, // success codes
//!     0x12, 0x34, 0x56, 0x78, // data: 0x1234, 0x5678
//! ];
//!
//! let response = FinsResponse::from_bytes(&bytes).unwrap();
//! assert!(response.is_success());
//!
//! let words = response.to_words().unwrap();
//! assert_eq!(words, vec![0x1234, 0x5678]);
//! ```

use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, FINS_HEADER_SIZE};

/// Minimum response size: header (10) + MRC (1) + SRC (1) + main code (1) + sub code (1) = 14 bytes.
pub const MIN_RESPONSE_SIZE: usize = FINS_HEADER_SIZE + 4;

/// Parsed FINS response.
#[derive(Debug, Clone)]
pub struct FinsResponse {
    /// Response header.
    pub header: FinsHeader,
    /// Main Response Code (MRC).
    pub mrc: u8,
    /// Sub Response Code (SRC).
    pub src: u8,
    /// Main error code (0x00 = success).
    pub main_code: u8,
    /// Sub error code (0x00 = success).
    pub sub_code: u8,
    /// Response data (if any).
    pub data: Vec<u8>,
}

impl FinsResponse {
    /// Parses a FINS response from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The response is too short
    /// - The header is invalid
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsResponse;
    ///
    /// let bytes = [
    ///     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01, // header
    ///     0x01, 0x01, // MRC, SRC
    ///     0x00, 0x00, // main/sub codes (success)
    ///     0x12, 0x34, // data
    /// ];
    /// let response = FinsResponse::from_bytes(&bytes).unwrap();
    /// assert!(response.is_success());
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_RESPONSE_SIZE {
            return Err(FinsError::invalid_response(format!(
                "response too short: expected at least {} bytes, got {}",
                MIN_RESPONSE_SIZE,
                data.len()
            )));
        }

        let header = FinsHeader::from_bytes(&data[..FINS_HEADER_SIZE])?;

        Ok(Self {
            header,
            mrc: data[FINS_HEADER_SIZE],
            src: data[FINS_HEADER_SIZE + 1],
            main_code: data[FINS_HEADER_SIZE + 2],
            sub_code: data[FINS_HEADER_SIZE + 3],
            data: data[MIN_RESPONSE_SIZE..].to_vec(),
        })
    }

    /// Returns whether the response indicates success (main_code == 0 && sub_code == 0).
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsResponse;
    ///
    /// let success_bytes = [
    ///     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01,
    ///     0x01, 0x01, 0x00, 0x00,
    /// ];
    /// let response = FinsResponse::from_bytes(&success_bytes).unwrap();
    /// assert!(response.is_success());
    /// ```
    pub fn is_success(&self) -> bool {
        self.main_code == 0x00 && self.sub_code == 0x00
    }

    /// Validates the response and returns an error if it did not complete
    /// successfully.
    ///
    /// Service-canceled (`00 01`) is a distinct terminal outcome, neither
    /// success nor a protocol error: it surfaces as
    /// [`FinsError::ServiceCanceled`] rather than [`FinsError::ProtocolError`]
    /// so callers can tell "the PLC rejected this" apart from "the PLC
    /// canceled this" instead of the engine trying to decode a likely-empty
    /// payload and failing with a confusing data error.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::ServiceCanceled` for the `00 01` pair, or
    /// `FinsError::ProtocolError` for any other non-zero main/sub code.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsResponse;
    ///
    /// let error_bytes = [
    ///     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01,
    ///     0x01, 0x01, 0x01, 0x01, // error codes
    /// ];
    /// let response = FinsResponse::from_bytes(&error_bytes).unwrap();
    /// assert!(response.check_error().is_err());
    /// ```
    pub fn check_error(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else if self.main_code == 0x00 && self.sub_code == 0x01 {
            Err(FinsError::ServiceCanceled)
        } else {
            Err(FinsError::protocol_error(self.main_code, self.sub_code))
        }
    }

    /// Validates the Service ID matches the expected value.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::SidMismatch` if the SID doesn't match.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsResponse;
    ///
    /// let bytes = [
    ///     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x05,
    ///     0x01, 0x01, 0x00, 0x00,
    /// ];
    /// let response = FinsResponse::from_bytes(&bytes).unwrap();
    /// assert!(response.check_sid(0x05).is_ok());
    /// assert!(response.check_sid(0x01).is_err());
    /// ```
    pub fn check_sid(&self, expected: u8) -> Result<()> {
        if self.header.sid == expected {
            Ok(())
        } else {
            Err(FinsError::sid_mismatch(expected, self.header.sid))
        }
    }

    /// Converts response data to words (big-endian u16 values).
    ///
    /// # Errors
    ///
    /// Returns an error if the data length is not even.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsResponse;
    ///
    /// let bytes = [
    ///     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01,
    ///     0x01, 0x01, 0x00, 0x00,
    ///     0x12, 0x34, 0x56, 0x78, // data: 0x1234, 0x5678
    /// ];
    /// let response = FinsResponse::from_bytes(&bytes).unwrap();
    /// let words = response.to_words().unwrap();
    /// assert_eq!(words, vec![0x1234, 0x5678]);
    /// ```
    pub fn to_words(&self) -> Result<Vec<u16>> {
        if !self.data.len().is_multiple_of(2) {
            return Err(FinsError::invalid_response(
                "data length must be even for word conversion",
            ));
        }

        Ok(self
            .data
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect())
    }

    /// Converts response data to a single bit value.
    ///
    /// # Errors
    ///
    /// Returns an error if there's no data or the first byte is invalid.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsResponse;
    ///
    /// let bytes = [
    ///     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01,
    ///     0x01, 0x01, 0x00, 0x00,
    ///     0x01, // bit value: true
    /// ];
    /// let response = FinsResponse::from_bytes(&bytes).unwrap();
    /// assert_eq!(response.to_bit().unwrap(), true);
    /// ```
    pub fn to_bit(&self) -> Result<bool> {
        if self.data.is_empty() {
            return Err(FinsError::invalid_response("no data for bit conversion"));
        }

        Ok(self.data[0] != 0)
    }

    /// Decodes this response's data as a CPU unit status read (`0x0601`)
    /// result: `(mode, status)`.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::invalid_response` if fewer than 2 data bytes are
    /// present.
    pub fn to_cpu_status(&self) -> Result<(CpuMode, CpuStatus)> {
        if self.data.len() < 2 {
            return Err(FinsError::invalid_response(
                "CPU unit status read needs at least 2 data bytes",
            ));
        }
        Ok((CpuMode::from_code(self.data[0]), CpuStatus::from_code(self.data[1])))
    }

    /// Decodes this response's data as a clock read (`0x0701`) result.
    ///
    /// The PLC returns 6 packed-BCD bytes `YY MM DD HH mm SS`; the two-digit
    /// year is taken as `2000 + YY`, matching the source's `%y%m%d%H%M%S`
    /// parse.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidResponse` if fewer than 6 data bytes are
    /// present, or `FinsError::BcdError` if a byte is not valid packed BCD or
    /// the resulting fields do not form a valid date/time.
    pub fn to_clock(&self) -> Result<chrono::NaiveDateTime> {
        if self.data.len() < 6 {
            return Err(FinsError::invalid_response(
                "clock read needs at least 6 data bytes",
            ));
        }

        let year = 2000 + bcd_byte(self.data[0])? as i32;
        let month = bcd_byte(self.data[1])?;
        let day = bcd_byte(self.data[2])?;
        let hour = bcd_byte(self.data[3])?;
        let minute = bcd_byte(self.data[4])?;
        let second = bcd_byte(self.data[5])?;

        let date = chrono::NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .ok_or_else(|| FinsError::invalid_response("clock read has an invalid calendar date"))?;
        let time = chrono::NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)
            .ok_or_else(|| FinsError::invalid_response("clock read has an invalid time of day"))?;

        Ok(chrono::NaiveDateTime::new(date, time))
    }
}

/// Decodes one packed-BCD byte (two decimal digits, one per nibble).
fn bcd_byte(byte: u8) -> Result<u8> {
    let hi = byte >> 4;
    let lo = byte & 0x0F;
    if hi > 9 || lo > 9 {
        return Err(FinsError::BcdError { word: byte as u16 });
    }
    Ok(hi * 10 + lo)
}

/// Decoded PLC operating mode from a CPU unit status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    /// Mode code `0x00`.
    Program,
    /// Mode code `0x02`.
    Monitor,
    /// Mode code `0x04`.
    Run,
    /// Any other mode code, preserved for diagnostics.
    Unknown(u8),
}

impl CpuMode {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => CpuMode::Program,
            0x02 => CpuMode::Monitor,
            0x04 => CpuMode::Run,
            other => CpuMode::Unknown(other),
        }
    }
}

/// Decoded PLC run status from a CPU unit status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuStatus {
    /// Status code `0x00`.
    Stop,
    /// Status code `0x01`.
    Run,
    /// Status code `0x80`.
    CpuOnStandby,
    /// Status code `0x05`.
    NoDataAvailable,
    /// Any other status code, preserved for diagnostics.
    Unknown(u8),
}

impl CpuStatus {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => CpuStatus::Stop,
            0x01 => CpuStatus::Run,
            0x80 => CpuStatus::CpuOnStandby,
            0x05 => CpuStatus::NoDataAvailable,
            other => CpuStatus::Unknown(other),
        }
    }
}

/// Looks up a human-readable description for a FINS end code.
///
/// Covers the codes this crate's own requests can provoke; anything else
/// falls back to a generic message carrying the raw bytes, since the full
/// Omron end-code table runs to roughly 40 entries and this crate never
/// issues the commands that provoke most of them.
pub fn end_code_description(main_code: u8, sub_code: u8) -> &'static str {
    match (main_code, sub_code) {
        (0x00, 0x00) => "success",
        (0x00, 0x01) => "service canceled",
        (0x01, 0x01) => "local node not part of network",
        (0x01, 0x02) => "token timeout",
        (0x01, 0x03) => "retransmission limit exceeded",
        (0x01, 0x04) => "max number of frames exceeded",
        (0x01, 0x05) => "node address range error",
        (0x01, 0x06) => "node address duplication",
        (0x02, 0x01) => "destination node not part of network",
        (0x02, 0x02) => "no node with the specified node number",
        (0x02, 0x03) => "destination node busy",
        (0x02, 0x04) => "response timeout",
        (0x03, 0x01) => "communications controller error",
        (0x03, 0x02) => "CPU unit error",
        (0x04, 0x01) => "undefined command",
        (0x04, 0x02) => "not supported by model/version",
        (0x05, 0x01) => "destination address setting error",
        (0x05, 0x02) => "no routing tables",
        (0x05, 0x03) => "routing table error",
        (0x05, 0x04) => "too many relays",
        (0x10, 0x01) => "command too long",
        (0x10, 0x02) => "command too short",
        (0x10, 0x03) => "elements/data do not match",
        (0x10, 0x04) => "command format error",
        (0x10, 0x05) => "header error",
        (0x11, 0x01) => "area classification missing",
        (0x11, 0x02) => "access size error",
        (0x11, 0x03) => "address range error",
        (0x11, 0x04) => "address range exceeded",
        (0x11, 0x0A) => "the area is protected",
        (0x22, 0x03) => "cannot change monitor mode",
        (0x22, 0x04) => "cannot change run mode",
        (0x23, 0x01) => "not executable in current mode",
        (0x25, 0x02) => "memory does not exist",
        (0x25, 0x06) => "I/O setting error",
        (0x25, 0x09) => "memory error",
        (0x26, 0x01) => "no protection",
        (0x26, 0x02) => "incorrect password",
        (0x30, 0x01) => "FINS command not supported",
        _ => "unrecognized end code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(main_code: u8, sub_code: u8, data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![
            0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01, // header
            0x01, 0x01, // MRC, SRC
            main_code, sub_code,
        ];
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_response_from_bytes_success() {
        let bytes = make_response(0x00, 0x00, &[0x12, 0x34]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();

        assert_eq!(response.header.icf, 0xC0);
        assert_eq!(response.header.sid, 0x01);
        assert_eq!(response.mrc, 0x01);
        assert_eq!(response.src, 0x01);
        assert_eq!(response.main_code, 0x00);
        assert_eq!(response.sub_code, 0x00);
        assert_eq!(response.data, vec![0x12, 0x34]);
    }

    #[test]
    fn test_response_from_bytes_too_short() {
        let bytes = [0xC0, 0x00, 0x02];
        let result = FinsResponse::from_bytes(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_is_success() {
        let success = FinsResponse::from_bytes(&make_response(0x00, 0x00, &[])).unwrap();
        assert!(success.is_success());

        let error = FinsResponse::from_bytes(&make_response(0x01, 0x00, &[])).unwrap();
        assert!(!error.is_success());

        let error2 = FinsResponse::from_bytes(&make_response(0x00, 0x01, &[])).unwrap();
        assert!(!error2.is_success());
    }

    #[test]
    fn test_check_error() {
        let success = FinsResponse::from_bytes(&make_response(0x00, 0x00, &[])).unwrap();
        assert!(success.check_error().is_ok());

        let error = FinsResponse::from_bytes(&make_response(0x02, 0x03, &[])).unwrap();
        let err = error.check_error().unwrap_err();
        match err {
            FinsError::ProtocolError {
                main_code,
                sub_code,
                ..
            } => {
                assert_eq!(main_code, 0x02);
                assert_eq!(sub_code, 0x03);
            }
            _ => panic!("Expected ProtocolError"),
        }
    }

    #[test]
    fn test_check_error_service_canceled_is_distinct_from_protocol_error() {
        let canceled = FinsResponse::from_bytes(&make_response(0x00, 0x01, &[])).unwrap();
        let err = canceled.check_error().unwrap_err();
        assert!(err.is_service_canceled());
        assert!(!matches!(err, FinsError::ProtocolError { .. }));
    }

    #[test]
    fn test_to_cpu_status() {
        let bytes = make_response(0x00, 0x00, &[0x04, 0x01]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        let (mode, status) = response.to_cpu_status().unwrap();
        assert_eq!(mode, CpuMode::Run);
        assert_eq!(status, CpuStatus::Run);
    }

    #[test]
    fn test_to_clock() {
        // 26-07-27 14:30:05 packed BCD.
        let bytes = make_response(0x00, 0x00, &[0x26, 0x07, 0x27, 0x14, 0x30, 0x05]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        let dt = response.to_clock().unwrap();
        assert_eq!(dt.to_string(), "2026-07-27 14:30:05");
    }

    #[test]
    fn test_to_clock_invalid_bcd() {
        let bytes = make_response(0x00, 0x00, &[0x26, 0x1A, 0x27, 0x14, 0x30, 0x05]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_clock().is_err());
    }

    #[test]
    fn test_check_sid() {
        let response = FinsResponse::from_bytes(&make_response(0x00, 0x00, &[])).unwrap();
        assert!(response.check_sid(0x01).is_ok());
        assert!(response.check_sid(0x02).is_err());
    }

    #[test]
    fn test_to_words() {
        let bytes = make_response(0x00, 0x00, &[0x12, 0x34, 0x56, 0x78, 0xAB, 0xCD]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        let words = response.to_words().unwrap();
        assert_eq!(words, vec![0x1234, 0x5678, 0xABCD]);
    }

    #[test]
    fn test_to_words_empty() {
        let bytes = make_response(0x00, 0x00, &[]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        let words = response.to_words().unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn test_to_words_odd_length() {
        let bytes = make_response(0x00, 0x00, &[0x12, 0x34, 0x56]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_words().is_err());
    }

    #[test]
    fn test_to_bit_true() {
        let bytes = make_response(0x00, 0x00, &[0x01]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_bit().unwrap());
    }

    #[test]
    fn test_to_bit_false() {
        let bytes = make_response(0x00, 0x00, &[0x00]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        assert!(!response.to_bit().unwrap());
    }

    #[test]
    fn test_to_bit_empty() {
        let bytes = make_response(0x00, 0x00, &[]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();
        assert!(response.to_bit().is_err());
    }
}
