//! Feature report framing.
//!
//! Layout of a tagged report (`REPORT_SIZE` bytes):
//!
//! | offset | size | field                        |
//! |--------|------|------------------------------|
//! | 0      | 1    | report ID (`REPORT_ID`)      |
//! | 1      | 2    | recipient (little endian)    |
//! | 3      | 1    | event ID (module / option)   |
//! | 4      | 1    | status                       |
//! | 5      | 1    | data length                  |
//! | 6      | n    | data, zero padded            |
//!
//! Some transports hand back responses without the leading report ID; those
//! are decoded with [`ReportFraming::Untagged`].

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use thiserror::Error;

use super::constants::{HEADER_SIZE, MAX_DATA_LEN, REPORT_ID, REPORT_SIZE, UNTAGGED_HEADER_SIZE};
use super::status::ConfigStatus;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Improper report ID: expected 0x{expected:02X}, got 0x{actual:02X}")]
    BadTag { expected: u8, actual: u8 },
    #[error("Declared data length {declared} exceeds {available} bytes present")]
    BadLength { declared: usize, available: usize },
    #[error("Unknown status code {0}")]
    UnknownStatus(u8),
    #[error("Payload too large: {len} bytes, at most {max} allowed")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether a response buffer starts with the report ID byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFraming {
    #[default]
    Tagged,
    Untagged,
}

impl ReportFraming {
    pub fn header_size(self) -> usize {
        match self {
            ReportFraming::Tagged => HEADER_SIZE,
            ReportFraming::Untagged => UNTAGGED_HEADER_SIZE,
        }
    }
}

/// Decoded configuration channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub recipient: u16,
    pub event_id: u8,
    pub status: ConfigStatus,
    /// `None` when the frame declares no data.
    pub data: Option<Vec<u8>>,
}

impl Frame {
    /// Payload bytes, empty when the frame carries none.
    pub fn payload(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Encode this frame as a request report.
    pub fn encode(&self) -> Result<[u8; REPORT_SIZE], FrameError> {
        encode(self.recipient, self.event_id, self.status, self.payload())
    }

    /// Parse a response report.
    pub fn decode(raw: &[u8], framing: ReportFraming) -> Result<Self, FrameError> {
        let header_size = framing.header_size();
        if raw.len() < header_size {
            return Err(FrameError::Truncated {
                expected: header_size,
                actual: raw.len(),
            });
        }

        let mut cursor = Cursor::new(raw);
        if framing == ReportFraming::Tagged {
            let tag = cursor.read_u8()?;
            if tag != REPORT_ID {
                return Err(FrameError::BadTag {
                    expected: REPORT_ID,
                    actual: tag,
                });
            }
        }
        let recipient = cursor.read_u16::<LittleEndian>()?;
        let event_id = cursor.read_u8()?;
        let status_code = cursor.read_u8()?;
        let data_len = cursor.read_u8()? as usize;

        let body = &raw[header_size..];
        if data_len > body.len() {
            return Err(FrameError::BadLength {
                declared: data_len,
                available: body.len(),
            });
        }

        let status = ConfigStatus::from_u8(status_code).ok_or(FrameError::UnknownStatus(status_code))?;
        let data = (data_len > 0).then(|| body[..data_len].to_vec());

        Ok(Self {
            recipient,
            event_id,
            status,
            data,
        })
    }
}

/// Render a text payload, dropping the NUL padding devices append.
pub fn payload_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).replace('\0', "")
}

/// Encode a request report.
///
/// # Panics
///
/// Panics when `status` is not a request status, when a device query carries
/// a non-zero event ID or a payload, or when a fetch carries a payload. These
/// are caller bugs; an oversized `Set` payload is reported as an error instead.
pub fn encode(
    recipient: u16,
    event_id: u8,
    status: ConfigStatus,
    data: &[u8],
) -> Result<[u8; REPORT_SIZE], FrameError> {
    assert!(status.is_request(), "{status} is not a request status");
    if status.is_device_query() {
        assert_eq!(event_id, 0, "{status} must not address a module");
        assert!(data.is_empty(), "{status} must not carry data");
    } else if status == ConfigStatus::Fetch {
        assert!(data.is_empty(), "FETCH must not carry data");
    }

    if data.len() > MAX_DATA_LEN {
        return Err(FrameError::PayloadTooLarge {
            len: data.len(),
            max: MAX_DATA_LEN,
        });
    }

    let mut report = [0u8; REPORT_SIZE];
    let mut cursor = Cursor::new(&mut report[..]);
    cursor.write_u8(REPORT_ID)?;
    cursor.write_u16::<LittleEndian>(recipient)?;
    cursor.write_u8(event_id)?;
    cursor.write_u8(status.code())?;
    cursor.write_u8(data.len() as u8)?;
    cursor.write_all(data)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let report = encode(0x52DE, 0x21, ConfigStatus::Set, &[0xAA, 0xBB]).unwrap();
        assert_eq!(report.len(), REPORT_SIZE);
        assert_eq!(&report[..8], &[REPORT_ID, 0xDE, 0x52, 0x21, 4, 2, 0xAA, 0xBB]);
        assert!(report[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_roundtrip_tagged() {
        let frame = Frame {
            recipient: 0x1234,
            event_id: 0x13,
            status: ConfigStatus::Set,
            data: Some(b"hello".to_vec()),
        };
        let report = frame.encode().unwrap();
        assert_eq!(Frame::decode(&report, ReportFraming::Tagged).unwrap(), frame);
    }

    #[test]
    fn test_roundtrip_untagged() {
        let report = encode(0x52DC, 0, ConfigStatus::GetHwid, &[]).unwrap();
        let parsed = Frame::decode(&report[1..], ReportFraming::Untagged).unwrap();
        assert_eq!(parsed.recipient, 0x52DC);
        assert_eq!(parsed.status, ConfigStatus::GetHwid);
        assert_eq!(parsed.data, None);
    }

    #[test]
    fn test_max_payload() {
        let data = [0x5Au8; MAX_DATA_LEN];
        let report = encode(1, 0x10, ConfigStatus::Set, &data).unwrap();
        let parsed = Frame::decode(&report, ReportFraming::Tagged).unwrap();
        assert_eq!(parsed.payload(), &data[..]);

        let too_long = [0u8; MAX_DATA_LEN + 1];
        assert!(matches!(
            encode(1, 0x10, ConfigStatus::Set, &too_long),
            Err(FrameError::PayloadTooLarge { len: 25, max: 24 })
        ));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            Frame::decode(&[REPORT_ID, 0, 0, 0, 6], ReportFraming::Tagged),
            Err(FrameError::Truncated { expected: 6, actual: 5 })
        ));
        assert!(matches!(
            Frame::decode(&[0, 0, 0, 6], ReportFraming::Untagged),
            Err(FrameError::Truncated { expected: 5, actual: 4 })
        ));
    }

    #[test]
    fn test_decode_bad_tag() {
        let mut report = encode(1, 0, ConfigStatus::GetBoardName, &[]).unwrap();
        report[0] = 5;
        assert!(matches!(
            Frame::decode(&report, ReportFraming::Tagged),
            Err(FrameError::BadTag { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_decode_bad_length() {
        let raw = [REPORT_ID, 0x01, 0x00, 0x10, 6, 4, b'a', b'b'];
        assert!(matches!(
            Frame::decode(&raw, ReportFraming::Tagged),
            Err(FrameError::BadLength { declared: 4, available: 2 })
        ));
    }

    #[test]
    fn test_decode_unknown_status() {
        let raw = [REPORT_ID, 0x01, 0x00, 0x10, 42, 0];
        assert!(matches!(
            Frame::decode(&raw, ReportFraming::Tagged),
            Err(FrameError::UnknownStatus(42))
        ));
    }

    #[test]
    fn test_payload_text_strips_padding() {
        assert_eq!(payload_text(b"nrf52840dk\0\0\0"), "nrf52840dk");
        assert_eq!(payload_text(b"\0cpi\0"), "cpi");
        assert_eq!(payload_text(b""), "");
    }

    #[test]
    #[should_panic]
    fn test_encode_rejects_response_status() {
        let _ = encode(1, 0, ConfigStatus::Success, &[]);
    }

    #[test]
    #[should_panic]
    fn test_encode_rejects_fetch_payload() {
        let _ = encode(1, 0x11, ConfigStatus::Fetch, &[1]);
    }

    #[test]
    #[should_panic]
    fn test_encode_rejects_addressed_query() {
        let _ = encode(1, 0x10, ConfigStatus::GetMaxModuleId, &[]);
    }
}
