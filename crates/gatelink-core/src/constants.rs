//! Core constants for the gate controller RS-485 protocol.
//!
//! # Frame Structure
//!
//! ```text
//! [0xFF][address][size][type][payload: size-1 bytes][checksum]
//! ```
//!
//! Where:
//! - `0xFF` - Start-of-message sentinel (SOM)
//! - `address` - Device address on the bus (0-254)
//! - `size` - Count of the type byte plus payload bytes (checksum excluded)
//! - `type` - ASCII message type
//! - `payload` - ASCII payload bytes
//! - `checksum` - Two's complement of the byte sum, so the whole frame
//!   (SOM included) sums to zero mod 256
//!
//! No byte after the SOM may be `0xFF`, the checksum included.
//!
//! # Usage
//!
//! ```
//! use gatelink_core::constants::*;
//!
//! assert_eq!(START_OF_MESSAGE, 0xFF);
//! assert!(MAX_ADDRESS < START_OF_MESSAGE);
//!
//! use std::time::Duration;
//! assert_eq!(BYTE_TIMEOUT, Duration::from_millis(500));
//! ```

use std::time::Duration;

// ============================================================================
// Framing
// ============================================================================

/// Start-of-message sentinel marking the first byte of every frame.
pub const START_OF_MESSAGE: u8 = 0xFF;

/// Highest valid device address.
pub const MAX_ADDRESS: u8 = 254;

/// Highest valid message size (type byte + payload).
pub const MAX_MESSAGE_SIZE: u8 = 254;

/// Highest valid payload length (message size minus the type byte).
pub const MAX_PAYLOAD_LEN: usize = MAX_MESSAGE_SIZE as usize - 1;

/// Highest valid value for the type byte and each payload byte (7-bit ASCII).
pub const MAX_ASCII: u8 = 127;

/// Bytes in a frame besides the payload: SOM, address, size, type, checksum.
pub const FRAME_OVERHEAD: usize = 5;

// ============================================================================
// Message Types
// ============================================================================

/// Reset request (`R`). The device sends no response.
pub const MSG_RESET: u8 = b'R';

/// Firmware version request and response (`V`).
pub const MSG_VERSION: u8 = b'V';

/// Gate control request and acknowledgment (`C`).
pub const MSG_GATE_CONTROL: u8 = b'C';

/// Gate status request (`S`).
pub const MSG_GATE_STATUS: u8 = b'S';

/// Gate status response as observed on the reference deployment (`N`).
///
/// Differs from the request type; firmware revisions disagree, so the value
/// is configurable per transaction.
pub const MSG_GATE_STATUS_RESPONSE: u8 = b'N';

/// Gate fault request and response (`F`).
pub const MSG_GATE_FAULT: u8 = b'F';

// ============================================================================
// Timing
// ============================================================================

/// Deadline for each byte once a frame has started.
pub const BYTE_TIMEOUT: Duration = Duration::from_millis(500);

/// Deadline for handing an outbound packet to the writer.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Deadline for a response after a request was written.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default outer bound for a whole transaction including retries.
pub const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Write/response attempts per transaction.
pub const MAX_ATTEMPTS: u32 = 3;

/// Default bound for a multi-step gate operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between consecutive status polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Default time allowed for opening the serial device.
pub const SERIAL_OPEN_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// Serial
// ============================================================================

/// Baud rate used by the gate operators.
pub const DEFAULT_BAUD_RATE: u32 = 38_400;

/// Default gate address on the RS-485 bus.
pub const DEFAULT_ADDRESS: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_outside_valid_ranges() {
        assert!(MAX_ADDRESS < START_OF_MESSAGE);
        assert!(MAX_MESSAGE_SIZE < START_OF_MESSAGE);
        assert!(MAX_ASCII < START_OF_MESSAGE);
    }

    #[test]
    fn test_message_types_are_ascii() {
        for t in [
            MSG_RESET,
            MSG_VERSION,
            MSG_GATE_CONTROL,
            MSG_GATE_STATUS,
            MSG_GATE_STATUS_RESPONSE,
            MSG_GATE_FAULT,
        ] {
            assert!(t <= MAX_ASCII);
        }
    }

    #[test]
    fn test_retry_budget_fits_transaction_timeout() {
        let per_attempt = WRITE_TIMEOUT + RESPONSE_TIMEOUT;
        assert!(per_attempt * MAX_ATTEMPTS <= TRANSACTION_TIMEOUT);
    }
}
