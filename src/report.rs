//! HID report framing
//!
//! Reports on the wire are `[report_id, payload...]`, sized to the endpoint
//! buffer. Devices without numbered reports still get a placeholder id byte.

use serde::{Deserialize, Serialize};

/// Default report id for devices that do not use numbered reports
pub const DEFAULT_REPORT_ID: u8 = 0x00;

/// A decoded HID report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: u8,
    /// Payload without the id byte
    pub data: Vec<u8>,
}

impl Report {
    /// Split a raw input buffer into report id and payload
    ///
    /// An empty buffer yields the given fallback id and no payload.
    pub fn decode(buf: &[u8], fallback_id: u8) -> Self {
        match buf.split_first() {
            Some((&report_id, data)) => Self {
                report_id,
                data: data.to_vec(),
            },
            None => Self {
                report_id: fallback_id,
                data: Vec::new(),
            },
        }
    }
}

/// Payload capacity of a report buffer of `buffer_size` bytes
pub fn payload_capacity(buffer_size: usize) -> usize {
    buffer_size.saturating_sub(1)
}

/// Frame an outbound report
///
/// The result is exactly `buffer_size` bytes (at least one, for the id):
/// the id followed by the payload, zero-padded or truncated to fit.
pub fn encode(report_id: u8, payload: &[u8], buffer_size: usize) -> Vec<u8> {
    let size = buffer_size.max(1);
    let mut buf = vec![0u8; size];
    buf[0] = report_id;
    let len = payload.len().min(size - 1);
    buf[1..=len].copy_from_slice(&payload[..len]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prepends_id_and_pads() {
        let buf = encode(0x05, &[0x10, 0x20], 8);
        assert_eq!(buf, vec![0x05, 0x10, 0x20, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_truncates_to_buffer() {
        let buf = encode(0x00, &[1, 2, 3, 4, 5], 4);
        assert_eq!(buf, vec![0x00, 1, 2, 3]);
    }

    #[test]
    fn test_encode_zero_sized_buffer_keeps_id() {
        assert_eq!(encode(0x07, &[1, 2], 0), vec![0x07]);
    }

    #[test]
    fn test_decode_splits_id() {
        let mut raw = vec![0u8; 64];
        raw[0] = 0x02;
        raw[1] = 0xAA;
        raw[2] = 0xBB;
        let report = Report::decode(&raw, DEFAULT_REPORT_ID);
        assert_eq!(report.report_id, 0x02);
        assert_eq!(report.data.len(), 63);
        assert_eq!(&report.data[..3], &[0xAA, 0xBB, 0x00]);
    }

    #[test]
    fn test_decode_empty_buffer() {
        let report = Report::decode(&[], 0x03);
        assert_eq!(report.report_id, 0x03);
        assert!(report.data.is_empty());
    }

    #[test]
    fn test_payload_capacity() {
        assert_eq!(payload_capacity(65), 64);
        assert_eq!(payload_capacity(0), 0);
    }
}
