//! Error taxonomy for configuration channel operations.

use thiserror::Error;

use crate::protocol::{ConfigStatus, FrameError};
use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot encode request: {0}")]
    Encode(FrameError),

    #[error("Send feature report problem: {0}")]
    Send(TransportError),

    #[error("Get feature report problem: {0}")]
    Receive(TransportError),

    #[error("Parsing response failed: {0}")]
    Decode(FrameError),

    #[error(
        "Response does not match the request: expected recipient {expected_recipient:04X} \
         event 0x{expected_event_id:02X}, got recipient {recipient:04X} event 0x{event_id:02X}"
    )]
    Mismatch {
        expected_recipient: u16,
        expected_event_id: u8,
        recipient: u16,
        event_id: u8,
    },

    #[error("No response after {polls} polls")]
    Timeout { polls: u32 },

    #[error("Device timed out processing the request")]
    DeviceTimeout,

    #[error("Device rejected the request")]
    Rejected,

    #[error("Device failed to store the value")]
    DeviceWriteError,

    #[error("Peripheral is disconnected from the dongle")]
    DeviceDisconnected,

    #[error("Device reported a fault")]
    DeviceFault,

    #[error("Unexpected response status {0}")]
    UnexpectedStatus(ConfigStatus),

    #[error(
        "Improper device description{}: {reason}",
        .module_id.map(|id| format!(" (module {id})")).unwrap_or_default()
    )]
    MalformedSchema { module_id: Option<u8>, reason: String },

    #[error("No module: {0}")]
    UnknownModule(String),

    #[error("No option {option} in module {module}")]
    UnknownOption { module: String, option: String },

    #[error("Device is not initialized")]
    NotInitialized,

    #[error("Device not found: VID={vid:04X} PID={pid:04X}")]
    NotFound { vid: u16, pid: u16 },
}

impl ConfigError {
    /// Map a terminal, non-success status reported by the device.
    pub(crate) fn from_device_status(status: ConfigStatus) -> Self {
        match status {
            ConfigStatus::Timeout => Self::DeviceTimeout,
            ConfigStatus::Reject => Self::Rejected,
            ConfigStatus::WriteError => Self::DeviceWriteError,
            ConfigStatus::DisconnectedError => Self::DeviceDisconnected,
            ConfigStatus::Fault => Self::DeviceFault,
            other => Self::UnexpectedStatus(other),
        }
    }

    /// Status an exchange failure is classified as, if this error came out of one.
    pub fn status(&self) -> Option<ConfigStatus> {
        let status = match self {
            Self::Send(_) | Self::DeviceWriteError => ConfigStatus::WriteError,
            Self::Receive(_) | Self::Decode(_) | Self::Mismatch { .. } | Self::DeviceFault => {
                ConfigStatus::Fault
            }
            Self::Timeout { .. } | Self::DeviceTimeout => ConfigStatus::Timeout,
            Self::Rejected => ConfigStatus::Reject,
            Self::DeviceDisconnected => ConfigStatus::DisconnectedError,
            Self::UnexpectedStatus(status) => *status,
            _ => return None,
        };
        Some(status)
    }

    pub(crate) fn malformed(module_id: Option<u8>, reason: impl Into<String>) -> Self {
        Self::MalformedSchema {
            module_id,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_status_mapping() {
        assert!(matches!(
            ConfigError::from_device_status(ConfigStatus::Reject),
            ConfigError::Rejected
        ));
        assert!(matches!(
            ConfigError::from_device_status(ConfigStatus::Fetch),
            ConfigError::UnexpectedStatus(ConfigStatus::Fetch)
        ));
    }

    #[test]
    fn test_failure_status() {
        assert_eq!(
            ConfigError::Send(TransportError::Closed).status(),
            Some(ConfigStatus::WriteError)
        );
        assert_eq!(
            ConfigError::Receive(TransportError::Closed).status(),
            Some(ConfigStatus::Fault)
        );
        assert_eq!(
            ConfigError::Timeout { polls: 200 }.status(),
            Some(ConfigStatus::Timeout)
        );
        assert_eq!(
            ConfigError::DeviceDisconnected.status(),
            Some(ConfigStatus::DisconnectedError)
        );
        assert_eq!(ConfigError::NotInitialized.status(), None);
        assert_eq!(ConfigError::UnknownModule("led".into()).status(), None);
    }

    #[test]
    fn test_malformed_display() {
        assert_eq!(
            ConfigError::malformed(Some(3), "no end-of-transfer entry").to_string(),
            "Improper device description (module 3): no end-of-transfer entry"
        );
        assert_eq!(
            ConfigError::malformed(None, "empty maximum module ID response").to_string(),
            "Improper device description: empty maximum module ID response"
        );
    }
}
