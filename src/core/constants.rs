//! Link constants.
//!
//! The framing values are part of the wire format and MUST NOT be changed
//! without breaking compatibility with existing peers.

use uuid::Uuid;

// =============================================================================
// TRANSPORT LIMITS
// =============================================================================

/// Maximum number of bytes a single transport read delivers.
///
/// RFCOMM sockets never hand out more than this per read call, whatever the
/// size of the buffer passed in.
pub const MAX_READ_CHUNK: usize = 990;

/// Payloads longer than this are sent behind a size header.
pub const WRITE_THRESHOLD: usize = 990;

/// Default read buffer handed to the transport by a session.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

// =============================================================================
// FRAME HEADER
// =============================================================================

/// ASCII marker opening a size header.
pub const HEADER_MARKER: &[u8; 11] = b"BU_MSG_SIZE";

/// Number of decimal digits in the length field.
pub const HEADER_LENGTH_DIGITS: usize = 7;

/// Total header size (marker + length digits).
pub const HEADER_SIZE: usize = HEADER_MARKER.len() + HEADER_LENGTH_DIGITS;

/// Payloads must be strictly shorter than this to be encodable.
pub const MAX_PAYLOAD_SIZE: usize = 10_000_000;

// =============================================================================
// SERVICE RECORD
// =============================================================================

/// Default service name advertised by the host.
pub const DEFAULT_SERVICE_NAME: &str = "BluetoothSecure";

/// Default service identifier shared by host and client.
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0xdf6b743c_1959_4442_9c8a_3b9204dc164b);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(HEADER_SIZE, 18);
    }

    #[test]
    fn test_default_uuid() {
        assert_eq!(
            DEFAULT_SERVICE_UUID.to_string(),
            "df6b743c-1959-4442-9c8a-3b9204dc164b"
        );
    }

    #[test]
    fn test_max_payload_fits_digits() {
        assert_eq!((MAX_PAYLOAD_SIZE - 1).to_string().len(), HEADER_LENGTH_DIGITS);
    }
}
