//! Locator configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::exchange::PollPolicy;
use crate::protocol::constants::{NORDIC_VENDOR_ID, NRF_DESKTOP_DONGLE_PID, NRF_DESKTOP_MOUSE_PID};

/// Which device to look for and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// USB vendor ID.
    pub vendor_id: u16,
    /// Product ID of the device itself; also the recipient of every request.
    pub product_id: u16,
    /// Product ID of a dongle that relays requests to the device.
    pub dongle_product_id: Option<u16>,
    /// Only accept the device with this hardware ID (hex).
    pub hwid: Option<String>,
    /// Polling used for discovery and by default for get/set.
    pub poll: PollPolicy,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            vendor_id: NORDIC_VENDOR_ID,
            product_id: NRF_DESKTOP_MOUSE_PID,
            dongle_product_id: Some(NRF_DESKTOP_DONGLE_PID),
            hwid: None,
            poll: PollPolicy::default(),
        }
    }
}

impl LocatorConfig {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            dongle_product_id: None,
            ..Default::default()
        }
    }

    pub fn with_dongle(mut self, dongle_product_id: u16) -> Self {
        self.dongle_product_id = Some(dongle_product_id);
        self
    }

    pub fn with_hwid(mut self, hwid: impl Into<String>) -> Self {
        self.hwid = Some(hwid.into());
        self
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Required hardware ID normalised for comparison with `DeviceIdentity::hwid_hex`.
    pub fn normalized_hwid(&self) -> Option<String> {
        self.hwid
            .as_deref()
            .map(|h| h.trim().trim_start_matches("0x").to_ascii_lowercase())
            .filter(|h| !h.is_empty())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: LocatorConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
