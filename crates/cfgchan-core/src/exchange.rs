//! Request/response exchange over the configuration channel.
//!
//! One exchange sends a single request report and then polls the device
//! until it answers with a terminal status or the poll budget runs out.
//! Only `Pending` responses are waited out; everything else ends the exchange.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, trace};

use crate::error::{ConfigError, Result};
use crate::protocol::constants::{POLL_INTERVAL_DEFAULT_MS, POLL_RETRY_COUNT, REPORT_ID, REPORT_SIZE};
use crate::protocol::{ConfigStatus, Frame, encode};
use crate::transport::HidTransport;

/// How long an exchange waits for the device.
///
/// The interval has whole-millisecond resolution; `new` rounds sub-millisecond
/// remainders up so a non-zero interval never becomes a busy poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Delay before each poll, in milliseconds.
    pub interval_ms: u64,
    /// Maximum number of polls.
    pub retry_budget: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, retry_budget: u32) -> Self {
        Self {
            interval_ms: interval.as_micros().div_ceil(1000) as u64,
            retry_budget,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Longest time an exchange can block.
    pub fn worst_case(&self) -> Duration {
        self.interval() * self.retry_budget
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: POLL_INTERVAL_DEFAULT_MS,
            retry_budget: POLL_RETRY_COUNT,
        }
    }
}

/// A request frame before encoding.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub recipient: u16,
    pub event_id: u8,
    pub status: ConfigStatus,
    pub data: &'a [u8],
}

impl<'a> Request<'a> {
    /// Device-level query (max module ID, HW ID, board name).
    pub fn query(recipient: u16, status: ConfigStatus) -> Self {
        Self {
            recipient,
            event_id: 0,
            status,
            data: &[],
        }
    }

    pub fn fetch(recipient: u16, event_id: u8) -> Self {
        Self {
            recipient,
            event_id,
            status: ConfigStatus::Fetch,
            data: &[],
        }
    }

    pub fn set(recipient: u16, event_id: u8, data: &'a [u8]) -> Self {
        Self {
            recipient,
            event_id,
            status: ConfigStatus::Set,
            data,
        }
    }
}

/// Run one exchange.
///
/// Returns the response payload on `SUCCESS` (`None` when the device sent no
/// data). A failed send, read or decode ends the exchange at once; a terminal
/// response for another recipient or event is treated as a fault.
#[instrument(
    level = "debug",
    skip(transport, request, policy),
    fields(
        recipient = %format!("{:04X}", request.recipient),
        event_id = %format!("0x{:02X}", request.event_id),
        status = %request.status,
    )
)]
pub fn exchange<T: HidTransport + ?Sized>(
    transport: &T,
    request: &Request<'_>,
    policy: &PollPolicy,
) -> Result<Option<Vec<u8>>> {
    let report = encode(request.recipient, request.event_id, request.status, request.data)
        .map_err(ConfigError::Encode)?;

    transport.send_feature_report(&report).map_err(|e| {
        debug!(error = %e, "Send feature report problem");
        ConfigError::Send(e)
    })?;

    let framing = transport.response_framing();

    for poll in 0..policy.retry_budget {
        thread::sleep(policy.interval());

        let raw = transport
            .get_feature_report(REPORT_ID, REPORT_SIZE)
            .map_err(|e| {
                error!(error = %e, "Get feature report problem");
                ConfigError::Receive(e)
            })?;

        let response = Frame::decode(&raw, framing).map_err(|e| {
            error!(error = %e, "Parsing response failed");
            ConfigError::Decode(e)
        })?;

        if !response.status.is_terminal() {
            trace!(poll, "Response not ready");
            continue;
        }

        if response.recipient != request.recipient || response.event_id != request.event_id {
            error!(
                rsp_recipient = %format!("{:04X}", response.recipient),
                rsp_event_id = %format!("0x{:02X}", response.event_id),
                "Response does not match the request"
            );
            return Err(ConfigError::Mismatch {
                expected_recipient: request.recipient,
                expected_event_id: request.event_id,
                recipient: response.recipient,
                event_id: response.event_id,
            });
        }

        if response.status == ConfigStatus::Success {
            debug!(polls = poll + 1, len = response.payload().len(), "Exchange complete");
            return Ok(response.data);
        }

        error!(rsp_status = %response.status, "Device reported failure");
        return Err(ConfigError::from_device_status(response.status));
    }

    error!(polls = policy.retry_budget, "No terminal response");
    Err(ConfigError::Timeout {
        polls: policy.retry_budget,
    })
}
