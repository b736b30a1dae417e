//! Error types for the FINS protocol.

use std::io;
use thiserror::Error;

/// Result type alias for FINS operations.
pub type Result<T> = std::result::Result<T, FinsError>;

/// Errors that can occur during FINS communication.
///
/// The variants follow the error taxonomy used throughout the request engine
/// and poller: `AddressError`/`DataError` are fatal for a single mapping entry
/// but never abort a cycle, `TimeoutError`/`ConnectionError` come out of the
/// transport's retry budget, `ProtocolError` is a PLC-reported end code, and
/// `BcdError` is a per-item decode failure that does not affect sibling items
/// in the same response.
#[derive(Debug, Error)]
pub enum FinsError {
    /// A symbolic address could not be parsed, or carries an out-of-range
    /// component (bit index, unknown prefix, unknown EM bank).
    #[error("address error: {reason}")]
    AddressError {
        /// Description of the addressing error.
        reason: String,
    },

    /// A data type, item count, or other request parameter is invalid.
    #[error("data error: {reason}")]
    DataError {
        /// Description of the data error.
        reason: String,
    },

    /// The transport exhausted its retry budget waiting for a response.
    #[error("timed out waiting for PLC response")]
    TimeoutError,

    /// The transport's socket is unhealthy and cannot be used until the
    /// owning Poller re-establishes it.
    #[error("connection error: {0}")]
    ConnectionError(#[from] io::Error),

    /// The PLC returned a non-success end code.
    #[error("PLC protocol error: main 0x{main_code:02X} sub 0x{sub_code:02X} ({description})")]
    ProtocolError {
        /// Main error code from PLC response.
        main_code: u8,
        /// Sub error code from PLC response.
        sub_code: u8,
        /// Human-readable description looked up from the end-code table.
        description: String,
    },

    /// A packed-BCD nibble was out of the 0-9 range.
    #[error("BCD decode error: word 0x{word:04X} has an invalid nibble")]
    BcdError {
        /// The raw word that failed to decode.
        word: u16,
    },

    /// A response frame was malformed or too short to parse.
    #[error("invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// The PLC reported the request as service-canceled (main `0x00`, sub
    /// `0x01`): a distinct terminal outcome, neither success nor a protocol
    /// error.
    #[error("service canceled")]
    ServiceCanceled,

    /// The response's service id did not match the request's.
    #[error("SID mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    SidMismatch {
        /// Expected SID value.
        expected: u8,
        /// Received SID value.
        received: u8,
    },
}

impl FinsError {
    /// Creates a new [`FinsError::AddressError`].
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsError;
    ///
    /// let err = FinsError::address_error("unknown area prefix 'X'");
    /// ```
    pub fn address_error(reason: impl Into<String>) -> Self {
        Self::AddressError {
            reason: reason.into(),
        }
    }

    /// Creates a new [`FinsError::DataError`].
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsError;
    ///
    /// let err = FinsError::data_error("count must be greater than 0");
    /// ```
    pub fn data_error(reason: impl Into<String>) -> Self {
        Self::DataError {
            reason: reason.into(),
        }
    }

    /// Creates a new [`FinsError::ProtocolError`] from main and sub codes,
    /// looking up a human-readable description from the end-code table.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsError;
    ///
    /// let err = FinsError::protocol_error(0x11, 0x01);
    /// ```
    pub fn protocol_error(main_code: u8, sub_code: u8) -> Self {
        Self::ProtocolError {
            main_code,
            sub_code,
            description: crate::response::end_code_description(main_code, sub_code).to_string(),
        }
    }

    /// Creates a new [`FinsError::InvalidResponse`] error.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsError;
    ///
    /// let err = FinsError::invalid_response("response too short");
    /// ```
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new [`FinsError::SidMismatch`] error.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins::FinsError;
    ///
    /// let err = FinsError::sid_mismatch(0x01, 0x02);
    /// ```
    pub fn sid_mismatch(expected: u8, received: u8) -> Self {
        Self::SidMismatch { expected, received }
    }

    /// Returns `true` if this error is the kind the transport retries on its
    /// own (timeouts and connection errors), as opposed to protocol or
    /// address/data errors which are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TimeoutError | Self::ConnectionError(_))
    }

    /// Returns `true` if this is the PLC reporting service-canceled (`00
    /// 01`), as opposed to an actual protocol or transport failure.
    pub fn is_service_canceled(&self) -> bool {
        matches!(self, Self::ServiceCanceled)
    }
}
