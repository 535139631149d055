//! nusb-based HID feature report transport.
//!
//! Feature reports travel over the default control pipe as HID class
//! requests addressed to the device's HID interface:
//! - SET_REPORT (`0x09`) with `wValue = 0x0300 | report_id`
//! - GET_REPORT (`0x01`) with the same `wValue`
//!
//! GET_REPORT answers include the report ID byte, so responses are tagged.

use std::time::Duration;

use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::{DeviceInfo, Interface, MaybeFuture, list_devices};
use tracing::{debug, info, instrument};

use super::traits::{DeviceDescriptor, HidBackend, HidTransport, TransportError};
use crate::protocol::constants::{
    HID_REPORT_TYPE_FEATURE, HID_REQ_GET_REPORT, HID_REQ_SET_REPORT, USB_CLASS_HID,
};

/// Timeout for a single control transfer.
const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Device access through nusb.
#[derive(Debug, Default, Clone, Copy)]
pub struct NusbBackend;

impl NusbBackend {
    pub fn new() -> Self {
        Self
    }
}

fn device_path(info: &DeviceInfo) -> String {
    format!("{}-{}", info.bus_id(), info.device_address())
}

fn descriptor_from_info(info: &DeviceInfo) -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        path: device_path(info),
        product: info.product_string().map(str::to_string),
        serial_number: info.serial_number().map(str::to_string),
    }
}

impl HidBackend for NusbBackend {
    type Handle = NusbHidTransport;

    #[instrument(level = "debug", fields(vid = %format!("{:04X}", vid), pid = %format!("{:04X}", pid)))]
    fn enumerate(&self, vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let devices: Vec<DeviceDescriptor> = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
            .filter(|d| d.vendor_id() == vid && d.product_id() == pid)
            .map(|d| descriptor_from_info(&d))
            .collect();

        debug!(count = devices.len(), "Enumerated devices");
        Ok(devices)
    }

    #[instrument(level = "info", skip(self), fields(path = %descriptor.path))]
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<NusbHidTransport, TransportError> {
        let device_info = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
            .find(|d| {
                d.vendor_id() == descriptor.vendor_id
                    && d.product_id() == descriptor.product_id
                    && device_path(d) == descriptor.path
            })
            .ok_or(TransportError::DeviceNotFound {
                vid: descriptor.vendor_id,
                pid: descriptor.product_id,
            })?;

        let interface_number = device_info
            .interfaces()
            .find(|i| i.class() == USB_CLASS_HID)
            .map(|i| i.interface_number())
            .ok_or_else(|| TransportError::HidInterfaceNotFound {
                path: descriptor.path.clone(),
            })?;

        let device = device_info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        // usbhid owns the interface on Linux; detach it for the lifetime of the handle.
        let interface = device
            .detach_and_claim_interface(interface_number)
            .wait()
            .map_err(|e| TransportError::ClaimInterfaceFailed {
                interface: interface_number,
                message: e.to_string(),
            })?;

        info!(
            vendor_id = %format!("{:04X}", descriptor.vendor_id),
            product_id = %format!("{:04X}", descriptor.product_id),
            interface = interface_number,
            "Device opened successfully"
        );

        Ok(NusbHidTransport {
            interface: Some(interface),
            interface_number,
            descriptor: descriptor.clone(),
        })
    }
}

/// Open HID interface of one device.
pub struct NusbHidTransport {
    interface: Option<Interface>,
    interface_number: u8,
    descriptor: DeviceDescriptor,
}

impl NusbHidTransport {
    fn interface(&self) -> Result<&Interface, TransportError> {
        self.interface.as_ref().ok_or(TransportError::Closed)
    }

    fn report_value(report_id: u8) -> u16 {
        (HID_REPORT_TYPE_FEATURE << 8) | report_id as u16
    }
}

impl HidTransport for NusbHidTransport {
    #[instrument(level = "trace", skip(self, report), fields(len = report.len()))]
    fn send_feature_report(&self, report: &[u8]) -> Result<(), TransportError> {
        let report_id = *report
            .first()
            .ok_or_else(|| TransportError::WriteFailed("empty report".into()))?;

        self.interface()?
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_REQ_SET_REPORT,
                    value: Self::report_value(report_id),
                    index: self.interface_number as u16,
                    data: report,
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    fn get_feature_report(&self, report_id: u8, len: usize) -> Result<Vec<u8>, TransportError> {
        let data = self
            .interface()?
            .control_in(
                ControlIn {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_REQ_GET_REPORT,
                    value: Self::report_value(report_id),
                    index: self.interface_number as u16,
                    length: len as u16,
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;

        Ok(data)
    }

    fn close(&mut self) {
        if self.interface.take().is_some() {
            debug!(path = %self.descriptor.path, "Device closed");
        }
    }

    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}
