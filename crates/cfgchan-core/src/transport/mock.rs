//! Mock HID transport for testing.
//!
//! `MockTransport` either replays queued response reports or answers requests
//! through a `SimulatedDevice`, a small model of a configuration channel
//! peripheral. `MockBackend` serves simulated devices to the locator and keeps
//! a log of opened and closed handles.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::traits::{DeviceDescriptor, HidBackend, HidTransport, TransportError};
use crate::protocol::constants::{
    MOD_FIELD_POS, NORDIC_VENDOR_ID, NRF_DESKTOP_MOUSE_PID, OPT_FIELD_MASK, OPT_MODULE_DESCR,
    REPORT_ID, REPORT_SIZE,
};
use crate::protocol::{ConfigStatus, Frame, ReportFraming};

/// Build a raw response report. Unlike `protocol::encode`, any status is allowed.
pub fn response_report(
    recipient: u16,
    event_id: u8,
    status: ConfigStatus,
    data: &[u8],
    framing: ReportFraming,
) -> Vec<u8> {
    let mut report = Vec::with_capacity(REPORT_SIZE);
    if framing == ReportFraming::Tagged {
        report.push(REPORT_ID);
    }
    report.extend_from_slice(&recipient.to_le_bytes());
    report.push(event_id);
    report.push(status.code());
    report.push(data.len() as u8);
    report.extend_from_slice(data);

    let size = match framing {
        ReportFraming::Tagged => REPORT_SIZE,
        ReportFraming::Untagged => REPORT_SIZE - 1,
    };
    if report.len() < size {
        report.resize(size, 0);
    }
    report
}

/// Behavioural model of a configuration channel peripheral.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    board_name: String,
    hwid: Vec<u8>,
    /// Descriptor entries per module, in the order the device cycles through them.
    modules: Vec<Vec<String>>,
    cursors: Vec<usize>,
    values: HashMap<u8, Vec<u8>>,
    failures: HashMap<(ConfigStatus, u8), ConfigStatus>,
    max_module_id: Option<u8>,
    pending_polls: usize,
    framing: ReportFraming,
}

impl SimulatedDevice {
    pub fn new(board_name: &str, hwid: &[u8]) -> Self {
        Self {
            board_name: board_name.to_string(),
            hwid: hwid.to_vec(),
            modules: Vec::new(),
            cursors: Vec::new(),
            values: HashMap::new(),
            failures: HashMap::new(),
            max_module_id: None,
            pending_polls: 0,
            framing: ReportFraming::Tagged,
        }
    }

    /// Add a module whose description fetches cycle through `entries`.
    pub fn with_module(mut self, entries: &[&str]) -> Self {
        self.modules
            .push(entries.iter().map(|e| e.to_string()).collect());
        self.cursors.push(0);
        self
    }

    /// Preset the value stored for an option.
    pub fn with_value(mut self, module_id: u8, option_id: u8, value: &[u8]) -> Self {
        self.values
            .insert(crate::protocol::event_id(module_id, option_id), value.to_vec());
        self
    }

    /// Answer every request with `polls` pending reports before the result.
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Report a maximum module ID different from the number of modules.
    pub fn with_max_module_id(mut self, id: u8) -> Self {
        self.max_module_id = Some(id);
        self
    }

    /// Answer `request` for `event_id` with the terminal status `reply`.
    pub fn with_failure(mut self, request: ConfigStatus, event_id: u8, reply: ConfigStatus) -> Self {
        self.failures.insert((request, event_id), reply);
        self
    }

    pub fn with_framing(mut self, framing: ReportFraming) -> Self {
        self.framing = framing;
        self
    }

    pub fn framing(&self) -> ReportFraming {
        self.framing
    }

    /// Value currently stored for an option.
    pub fn value(&self, module_id: u8, option_id: u8) -> Option<&[u8]> {
        self.values
            .get(&crate::protocol::event_id(module_id, option_id))
            .map(Vec::as_slice)
    }

    fn respond(&mut self, request: &Frame) -> (ConfigStatus, Vec<u8>) {
        if let Some(&reply) = self.failures.get(&(request.status, request.event_id)) {
            return (reply, Vec::new());
        }

        match request.status {
            ConfigStatus::GetBoardName => (ConfigStatus::Success, self.board_name.as_bytes().to_vec()),
            ConfigStatus::GetHwid => (ConfigStatus::Success, self.hwid.clone()),
            ConfigStatus::GetMaxModuleId => {
                let max = self
                    .max_module_id
                    .or_else(|| self.modules.len().checked_sub(1).map(|m| m as u8));
                match max {
                    Some(max) => (ConfigStatus::Success, vec![max]),
                    None => (ConfigStatus::Reject, Vec::new()),
                }
            }
            ConfigStatus::Fetch if request.event_id & OPT_FIELD_MASK == OPT_MODULE_DESCR => {
                let module = (request.event_id >> MOD_FIELD_POS) as usize;
                match self.modules.get(module) {
                    Some(entries) if !entries.is_empty() => {
                        let cursor = &mut self.cursors[module];
                        let entry = entries[*cursor % entries.len()].as_bytes().to_vec();
                        *cursor += 1;
                        (ConfigStatus::Success, entry)
                    }
                    _ => (ConfigStatus::Reject, Vec::new()),
                }
            }
            ConfigStatus::Fetch => match self.values.get(&request.event_id) {
                Some(value) => (ConfigStatus::Success, value.clone()),
                None => (ConfigStatus::Reject, Vec::new()),
            },
            ConfigStatus::Set => {
                self.values
                    .insert(request.event_id, request.payload().to_vec());
                (ConfigStatus::Success, Vec::new())
            }
            _ => (ConfigStatus::Fault, Vec::new()),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    device: Option<SimulatedDevice>,
    responses: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    reads: usize,
    fail_writes: bool,
    closed: bool,
}

/// Opened and closed handle paths, in order.
#[derive(Debug, Default, Clone)]
pub struct HandleLog {
    pub opened: Vec<String>,
    pub closed: Vec<String>,
}

/// Mock transport for unit testing exchange and discovery logic.
///
/// Clones share state, so a test can keep a probe while a session owns the handle.
#[derive(Clone)]
pub struct MockTransport {
    descriptor: DeviceDescriptor,
    framing: ReportFraming,
    state: Arc<Mutex<MockState>>,
    handle_log: Option<Arc<Mutex<HandleLog>>>,
}

impl MockTransport {
    /// Transport that replays queued responses.
    pub fn new() -> Self {
        Self {
            descriptor: DeviceDescriptor {
                vendor_id: NORDIC_VENDOR_ID,
                product_id: NRF_DESKTOP_MOUSE_PID,
                path: "mock".into(),
                product: None,
                serial_number: None,
            },
            framing: ReportFraming::Tagged,
            state: Arc::new(Mutex::new(MockState::default())),
            handle_log: None,
        }
    }

    /// Transport answering requests through a simulated device.
    pub fn with_device(device: SimulatedDevice) -> Self {
        let mut transport = Self::new();
        transport.framing = device.framing();
        transport.state.lock().unwrap().device = Some(device);
        transport
    }

    /// Framing of queued responses.
    pub fn set_framing(&mut self, framing: ReportFraming) {
        self.framing = framing;
    }

    /// Queue a raw report to be returned on the next read.
    pub fn queue_response(&self, raw: &[u8]) {
        self.state.lock().unwrap().responses.push_back(raw.to_vec());
    }

    /// Queue a response frame in this transport's framing.
    pub fn queue_frame(&self, recipient: u16, event_id: u8, status: ConfigStatus, data: &[u8]) {
        self.queue_response(&response_report(
            recipient,
            event_id,
            status,
            data,
            self.framing,
        ));
    }

    /// Make every following send fail.
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    /// Get all captured writes.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Number of feature report reads performed.
    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Snapshot of the simulated device.
    pub fn device(&self) -> Option<SimulatedDevice> {
        self.state.lock().unwrap().device.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTransport for MockTransport {
    fn send_feature_report(&self, report: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(TransportError::WriteFailed("simulated write failure".into()));
        }
        state.writes.push(report.to_vec());

        let Ok(request) = Frame::decode(report, ReportFraming::Tagged) else {
            return Ok(());
        };
        let Some(device) = state.device.as_mut() else {
            return Ok(());
        };

        let pending = device.pending_polls;
        let framing = device.framing;
        let (status, data) = device.respond(&request);
        for _ in 0..pending {
            state.responses.push_back(response_report(
                request.recipient,
                request.event_id,
                ConfigStatus::Pending,
                &[],
                framing,
            ));
        }
        state.responses.push_back(response_report(
            request.recipient,
            request.event_id,
            status,
            &data,
            framing,
        ));
        Ok(())
    }

    fn get_feature_report(&self, _report_id: u8, _len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.reads += 1;
        state
            .responses
            .pop_front()
            .ok_or_else(|| TransportError::ReadFailed("no report available".into()))
    }

    fn response_framing(&self) -> ReportFraming {
        self.framing
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.closed = true;
        if let Some(log) = &self.handle_log {
            log.lock().unwrap().closed.push(self.descriptor.path.clone());
        }
    }

    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}

/// Backend serving simulated devices.
#[derive(Default)]
pub struct MockBackend {
    devices: Vec<(DeviceDescriptor, SimulatedDevice)>,
    unopenable: Vec<String>,
    log: Arc<Mutex<HandleLog>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a simulated device at `path`.
    pub fn with_device(mut self, vid: u16, pid: u16, path: &str, device: SimulatedDevice) -> Self {
        let descriptor = DeviceDescriptor {
            vendor_id: vid,
            product_id: pid,
            path: path.to_string(),
            product: Some("Simulated configuration channel device".into()),
            serial_number: None,
        };
        self.devices.push((descriptor, device));
        self
    }

    /// Make opening the device at `path` fail.
    pub fn with_unopenable(mut self, path: &str) -> Self {
        self.unopenable.push(path.to_string());
        self
    }

    pub fn handle_log(&self) -> HandleLog {
        self.log.lock().unwrap().clone()
    }
}

impl HidBackend for MockBackend {
    type Handle = MockTransport;

    fn enumerate(&self, vid: u16, pid: u16) -> Result<Vec<DeviceDescriptor>, TransportError> {
        Ok(self
            .devices
            .iter()
            .filter(|(d, _)| d.vendor_id == vid && d.product_id == pid)
            .map(|(d, _)| d.clone())
            .collect())
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<MockTransport, TransportError> {
        if self.unopenable.contains(&descriptor.path) {
            return Err(TransportError::OpenFailed(format!(
                "{} is busy",
                descriptor.path
            )));
        }
        let (descriptor, device) = self
            .devices
            .iter()
            .find(|(d, _)| d == descriptor)
            .ok_or(TransportError::DeviceNotFound {
                vid: descriptor.vendor_id,
                pid: descriptor.product_id,
            })?;

        self.log.lock().unwrap().opened.push(descriptor.path.clone());

        let mut transport = MockTransport::with_device(device.clone());
        transport.descriptor = descriptor.clone();
        transport.handle_log = Some(Arc::clone(&self.log));
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;

    #[test]
    fn test_mock_response_queue() {
        let mock = MockTransport::new();
        mock.queue_frame(1, 0x10, ConfigStatus::Pending, &[]);
        mock.queue_frame(1, 0x10, ConfigStatus::Success, b"on");

        let first = mock.get_feature_report(REPORT_ID, REPORT_SIZE).unwrap();
        assert_eq!(first.len(), REPORT_SIZE);
        let second = mock.get_feature_report(REPORT_ID, REPORT_SIZE).unwrap();
        let frame = Frame::decode(&second, ReportFraming::Tagged).unwrap();
        assert_eq!(frame.payload(), b"on");

        // Queue is empty now
        assert!(mock.get_feature_report(REPORT_ID, REPORT_SIZE).is_err());
        assert_eq!(mock.read_count(), 3);
    }

    #[test]
    fn test_simulated_device_cycles_descriptors() {
        let mock = MockTransport::with_device(
            SimulatedDevice::new("board", &[1, 2]).with_module(&["led", "on", "\n"]),
        );
        let request = encode(7, 0x00, ConfigStatus::Fetch, &[]).unwrap();
        let mut names = Vec::new();
        for _ in 0..4 {
            mock.send_feature_report(&request).unwrap();
            let raw = mock.get_feature_report(REPORT_ID, REPORT_SIZE).unwrap();
            let frame = Frame::decode(&raw, ReportFraming::Tagged).unwrap();
            assert_eq!(frame.recipient, 7);
            names.push(String::from_utf8(frame.payload().to_vec()).unwrap());
        }
        assert_eq!(names, vec!["led", "on", "\n", "led"]);
    }

    #[test]
    fn test_simulated_device_stores_values() {
        let mock = MockTransport::with_device(SimulatedDevice::new("board", &[1]));
        let request = encode(7, 0x12, ConfigStatus::Set, &[0x20, 0x03]).unwrap();
        mock.send_feature_report(&request).unwrap();
        let raw = mock.get_feature_report(REPORT_ID, REPORT_SIZE).unwrap();
        let frame = Frame::decode(&raw, ReportFraming::Tagged).unwrap();
        assert_eq!(frame.status, ConfigStatus::Success);
        assert_eq!(mock.device().unwrap().value(1, 2), Some(&[0x20, 0x03][..]));
    }

    #[test]
    fn test_closed_handle() {
        let mut mock = MockTransport::new();
        mock.close();
        assert!(mock.is_closed());
        assert!(matches!(
            mock.send_feature_report(&[REPORT_ID]),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_backend_logs_handles() {
        let backend = MockBackend::new().with_device(
            NORDIC_VENDOR_ID,
            NRF_DESKTOP_MOUSE_PID,
            "usb-1",
            SimulatedDevice::new("board", &[1]),
        );
        let found = backend
            .enumerate(NORDIC_VENDOR_ID, NRF_DESKTOP_MOUSE_PID)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(backend.enumerate(NORDIC_VENDOR_ID, 0x0001).unwrap().is_empty());

        let mut handle = backend.open(&found[0]).unwrap();
        handle.close();
        handle.close();
        let log = backend.handle_log();
        assert_eq!(log.opened, vec!["usb-1"]);
        assert_eq!(log.closed, vec!["usb-1"]);
    }
}
