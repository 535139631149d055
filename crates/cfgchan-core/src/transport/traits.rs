//! HID transport layer abstraction.
//!
//! Defines the `HidBackend` and `HidTransport` traits for feature report
//! access, allowing different implementations (nusb, mock, etc.).

use std::fmt;

use thiserror::Error;

use crate::protocol::ReportFraming;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    #[error("Device not found: VID={vid:04X} PID={pid:04X}")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("No HID interface on device {path}")]
    HidInterfaceNotFound { path: String },

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Device handle is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Physical device found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Backend specific location used to reopen the device.
    pub path: String,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X}:{:04X} at {}",
            self.vendor_id, self.product_id, self.path
        )?;
        if let Some(product) = &self.product {
            write!(f, " ({product})")?;
        }
        Ok(())
    }
}

/// An open device handle able to exchange feature reports.
///
/// Handles are used by one session at a time; `Send` lets independent
/// sessions live on separate threads.
pub trait HidTransport: Send {
    /// Send one feature report. The first byte is the report ID.
    fn send_feature_report(&self, report: &[u8]) -> Result<(), TransportError>;

    /// Read one feature report of up to `len` bytes.
    fn get_feature_report(&self, report_id: u8, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Whether buffers returned by `get_feature_report` start with the report ID.
    fn response_framing(&self) -> ReportFraming {
        ReportFraming::Tagged
    }

    /// Release the device. Further I/O fails with `TransportError::Closed`.
    fn close(&mut self);

    /// Device this handle was opened from.
    fn descriptor(&self) -> &DeviceDescriptor;
}

/// Platform access layer: enumerates and opens devices.
pub trait HidBackend {
    type Handle: HidTransport;

    /// List devices matching `vid`/`pid`.
    fn enumerate(&self, vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open a previously enumerated device.
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Self::Handle, TransportError>;
}
