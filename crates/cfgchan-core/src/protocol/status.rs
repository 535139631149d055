//! Configuration channel status codes.
//!
//! Every frame carries a status byte. Hosts put one of the request statuses
//! into outgoing frames; devices answer with `Pending` until the request is
//! processed and then with one of the terminal statuses.

use std::fmt;

/// Status field of a configuration channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConfigStatus {
    Pending = 0,
    GetMaxModuleId = 1,
    GetHwid = 2,
    GetBoardName = 3,
    Set = 4,
    Fetch = 5,
    Success = 6,
    Timeout = 7,
    Reject = 8,
    WriteError = 9,
    DisconnectedError = 10,
    Fault = 99,
}

impl ConfigStatus {
    /// Parse a wire status code.
    pub fn from_u8(code: u8) -> Option<Self> {
        let status = match code {
            0 => Self::Pending,
            1 => Self::GetMaxModuleId,
            2 => Self::GetHwid,
            3 => Self::GetBoardName,
            4 => Self::Set,
            5 => Self::Fetch,
            6 => Self::Success,
            7 => Self::Timeout,
            8 => Self::Reject,
            9 => Self::WriteError,
            10 => Self::DisconnectedError,
            99 => Self::Fault,
            _ => return None,
        };
        Some(status)
    }

    /// Wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Statuses a host may put into a request frame.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::GetMaxModuleId | Self::GetHwid | Self::GetBoardName | Self::Set | Self::Fetch
        )
    }

    /// Device-level queries that address no module and carry no payload.
    pub fn is_device_query(self) -> bool {
        matches!(self, Self::GetMaxModuleId | Self::GetHwid | Self::GetBoardName)
    }

    /// Anything but `Pending` ends the polling of an exchange.
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::GetMaxModuleId => "GET_MAX_MOD_ID",
            Self::GetHwid => "GET_HWID",
            Self::GetBoardName => "GET_BOARD_NAME",
            Self::Set => "SET",
            Self::Fetch => "FETCH",
            Self::Success => "SUCCESS",
            Self::Timeout => "TIMEOUT",
            Self::Reject => "REJECT",
            Self::WriteError => "WRITE_ERROR",
            Self::DisconnectedError => "DISCONNECTED_ERROR",
            Self::Fault => "FAULT",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for ConfigStatus {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_u8(code).ok_or(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(ConfigStatus::from_u8(0), Some(ConfigStatus::Pending));
        assert_eq!(ConfigStatus::from_u8(6), Some(ConfigStatus::Success));
        assert_eq!(ConfigStatus::from_u8(99), Some(ConfigStatus::Fault));
        assert_eq!(ConfigStatus::from_u8(11), None);
        assert_eq!(ConfigStatus::Fault.code(), 99);
        assert_eq!(ConfigStatus::try_from(42), Err(42));
    }

    #[test]
    fn test_request_statuses() {
        let requests: Vec<_> = (0..=u8::MAX)
            .filter_map(ConfigStatus::from_u8)
            .filter(|s| s.is_request())
            .collect();
        assert_eq!(
            requests,
            vec![
                ConfigStatus::GetMaxModuleId,
                ConfigStatus::GetHwid,
                ConfigStatus::GetBoardName,
                ConfigStatus::Set,
                ConfigStatus::Fetch,
            ]
        );
        assert!(!ConfigStatus::Success.is_request());
        assert!(!ConfigStatus::Pending.is_terminal());
        assert!(ConfigStatus::Reject.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConfigStatus::DisconnectedError.to_string(), "DISCONNECTED_ERROR");
    }
}
