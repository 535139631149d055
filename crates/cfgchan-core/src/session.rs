//! Device session - name-based access to one discovered device.

use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, info, instrument};

use crate::error::{ConfigError, Result};
use crate::exchange::{PollPolicy, Request, exchange};
use crate::protocol::{ConfigStatus, payload_text};
use crate::schema::DeviceSchema;
use crate::transport::{DeviceDescriptor, HidTransport};

/// Board name and hardware ID reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub board_name: String,
    pub hwid: Vec<u8>,
}

impl DeviceIdentity {
    /// Hardware ID as lowercase hex.
    pub fn hwid_hex(&self) -> String {
        hex::encode(&self.hwid)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HW ID: {})", self.board_name, self.hwid_hex())
    }
}

/// Read board name and hardware ID.
#[instrument(level = "debug", skip(transport, policy), fields(recipient = %format!("{:04X}", recipient)))]
pub fn read_identity<T: HidTransport + ?Sized>(
    transport: &T,
    recipient: u16,
    policy: &PollPolicy,
) -> Result<DeviceIdentity> {
    let board_name = exchange(
        transport,
        &Request::query(recipient, ConfigStatus::GetBoardName),
        policy,
    )?
    .map(|data| payload_text(&data))
    .unwrap_or_default();

    let hwid = exchange(
        transport,
        &Request::query(recipient, ConfigStatus::GetHwid),
        policy,
    )?
    .unwrap_or_default();

    Ok(DeviceIdentity { board_name, hwid })
}

struct OpenDevice<T> {
    transport: T,
    identity: DeviceIdentity,
    schema: DeviceSchema,
}

/// An open device with its discovered schema.
///
/// Requests are strictly sequential: `get` and `set` borrow the session
/// mutably for the whole exchange. Sessions are created by the locator.
pub struct DeviceSession<T: HidTransport> {
    device: Option<OpenDevice<T>>,
    recipient: u16,
    policy: PollPolicy,
}

impl<T: HidTransport> DeviceSession<T> {
    pub(crate) fn new(
        transport: T,
        recipient: u16,
        identity: DeviceIdentity,
        schema: DeviceSchema,
        policy: PollPolicy,
    ) -> Self {
        Self {
            device: Some(OpenDevice {
                transport,
                identity,
                schema,
            }),
            recipient,
            policy,
        }
    }

    fn open_device(&self) -> Result<&OpenDevice<T>> {
        self.device.as_ref().ok_or(ConfigError::NotInitialized)
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Recipient every request is addressed to.
    pub fn recipient(&self) -> u16 {
        self.recipient
    }

    /// Default polling for `get` and `set`.
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn identity(&self) -> Result<&DeviceIdentity> {
        Ok(&self.open_device()?.identity)
    }

    pub fn board_name(&self) -> Result<&str> {
        Ok(&self.identity()?.board_name)
    }

    pub fn hwid(&self) -> Result<String> {
        Ok(self.identity()?.hwid_hex())
    }

    pub fn schema(&self) -> Result<&DeviceSchema> {
        Ok(&self.open_device()?.schema)
    }

    /// Module name to option names.
    pub fn listing(&self) -> Result<IndexMap<String, Vec<String>>> {
        Ok(self.schema()?.listing())
    }

    pub fn descriptor(&self) -> Result<&DeviceDescriptor> {
        Ok(self.open_device()?.transport.descriptor())
    }

    /// Read an option value.
    pub fn get(&mut self, module: &str, option: &str) -> Result<Vec<u8>> {
        let policy = self.policy;
        self.get_with_policy(module, option, &policy)
    }

    #[instrument(level = "debug", skip(self, policy))]
    pub fn get_with_policy(
        &mut self,
        module: &str,
        option: &str,
        policy: &PollPolicy,
    ) -> Result<Vec<u8>> {
        let device = self.open_device()?;
        let event_id = device.schema.resolve(module, option)?;

        let value = exchange(
            &device.transport,
            &Request::fetch(self.recipient, event_id),
            policy,
        )?
        .unwrap_or_default();

        debug!(value = %hex::encode(&value), "Fetched option");
        Ok(value)
    }

    /// Write an option value. Success means the device accepted the value.
    pub fn set(&mut self, module: &str, option: &str, value: &[u8]) -> Result<()> {
        let policy = self.policy;
        self.set_with_policy(module, option, value, &policy)
    }

    #[instrument(level = "debug", skip(self, value, policy), fields(value = %hex::encode(value)))]
    pub fn set_with_policy(
        &mut self,
        module: &str,
        option: &str,
        value: &[u8],
        policy: &PollPolicy,
    ) -> Result<()> {
        let device = self.open_device()?;
        let event_id = device.schema.resolve(module, option)?;

        exchange(
            &device.transport,
            &Request::set(self.recipient, event_id, value),
            policy,
        )?;
        Ok(())
    }

    /// Release the device. The session cannot be used afterwards.
    pub fn close(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.transport.close();
            info!(board = %device.identity.board_name, "Device closed");
        }
    }
}

impl<T: HidTransport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: HidTransport> fmt::Debug for DeviceSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DeviceSession");
        s.field("recipient", &format_args!("{:04X}", self.recipient));
        match &self.device {
            Some(device) => s
                .field("identity", &device.identity)
                .field("modules", &device.schema.len()),
            None => s.field("closed", &true),
        };
        s.finish()
    }
}
