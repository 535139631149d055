//! Device locator - picks the device a session talks to.
//!
//! Candidates connected directly come first, followed by candidates reached
//! through a dongle. Every request is addressed to the direct product ID, as
//! the dongle forwards frames by recipient.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::LocatorConfig;
use crate::discovery::discover_device;
use crate::error::{ConfigError, Result};
use crate::events::{ConfigEvent, ConfigObserver, TracingObserver};
use crate::schema::DeviceSchema;
use crate::session::{DeviceIdentity, DeviceSession, read_identity};
use crate::transport::{DeviceDescriptor, HidBackend, HidTransport};

/// Finds and opens a configurable device.
pub struct Locator<B: HidBackend, O: ConfigObserver = TracingObserver> {
    backend: B,
    config: LocatorConfig,
    observer: Arc<O>,
}

impl<B: HidBackend> Locator<B, TracingObserver> {
    /// Create a locator with the default tracing observer.
    pub fn new(backend: B, config: LocatorConfig) -> Self {
        Self::with_observer(backend, config, Arc::new(TracingObserver))
    }
}

impl<B: HidBackend, O: ConfigObserver> Locator<B, O> {
    /// Create a locator with a custom observer.
    pub fn with_observer(backend: B, config: LocatorConfig, observer: Arc<O>) -> Self {
        Self {
            backend,
            config,
            observer,
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn emit(&self, event: ConfigEvent) {
        self.observer.on_event(&event);
    }

    fn enumerate(&self, pid: u16) -> Vec<DeviceDescriptor> {
        match self.backend.enumerate(self.config.vendor_id, pid) {
            Ok(devices) => devices,
            Err(e) => {
                warn!(pid = %format!("{:04X}", pid), error = %e, "Enumeration failed");
                Vec::new()
            }
        }
    }

    /// Candidates in priority order: direct devices, then dongles.
    pub fn candidates(&self) -> Vec<DeviceDescriptor> {
        let mut candidates = self.enumerate(self.config.product_id);
        let direct = candidates.len();
        if let Some(dongle_pid) = self.config.dongle_product_id {
            candidates.extend(self.enumerate(dongle_pid));
        }
        self.emit(ConfigEvent::CandidatesFound {
            direct,
            dongle: candidates.len() - direct,
        });
        candidates
    }

    /// Open the first candidate that identifies itself, matches the required
    /// hardware ID and describes its configuration. Every other opened handle
    /// is closed.
    #[instrument(
        skip(self),
        fields(
            vid = %format!("{:04X}", self.config.vendor_id),
            pid = %format!("{:04X}", self.config.product_id),
        )
    )]
    pub fn find(&self) -> Result<DeviceSession<B::Handle>> {
        let mut opened = VecDeque::new();
        for descriptor in self.candidates() {
            match self.backend.open(&descriptor) {
                Ok(handle) => {
                    self.emit(ConfigEvent::CandidateOpened {
                        path: descriptor.path.clone(),
                        product_id: descriptor.product_id,
                    });
                    opened.push_back(handle);
                }
                Err(e) => {
                    warn!(device = %descriptor, error = %e, "Cannot open candidate");
                }
            }
        }

        let mut selected = None;
        while let Some(mut handle) = opened.pop_front() {
            match self.probe(&handle) {
                Ok((identity, schema)) => {
                    selected = Some((handle, identity, schema));
                    break;
                }
                Err(reason) => {
                    self.emit(ConfigEvent::CandidateSkipped {
                        path: handle.descriptor().path.clone(),
                        reason,
                    });
                    handle.close();
                }
            }
        }

        for mut handle in opened {
            self.emit(ConfigEvent::CandidateSkipped {
                path: handle.descriptor().path.clone(),
                reason: "another device was selected".into(),
            });
            handle.close();
        }

        let Some((handle, identity, schema)) = selected else {
            info!("Device not found");
            return Err(ConfigError::NotFound {
                vid: self.config.vendor_id,
                pid: self.config.product_id,
            });
        };

        self.emit(ConfigEvent::DeviceSelected {
            path: handle.descriptor().path.clone(),
            board_name: identity.board_name.clone(),
            hwid: identity.hwid_hex(),
            modules: schema.len(),
        });

        Ok(DeviceSession::new(
            handle,
            self.config.product_id,
            identity,
            schema,
            self.config.poll,
        ))
    }

    /// Identity check and discovery for one candidate. Errors carry the reason
    /// the candidate was rejected.
    fn probe(&self, handle: &B::Handle) -> std::result::Result<(DeviceIdentity, DeviceSchema), String> {
        let recipient = self.config.product_id;
        let policy = &self.config.poll;
        let path = handle.descriptor().path.clone();

        let identity = read_identity(handle, recipient, policy)
            .map_err(|e| format!("cannot read device info: {e}"))?;
        self.emit(ConfigEvent::IdentityRead {
            path,
            board_name: identity.board_name.clone(),
            hwid: identity.hwid_hex(),
        });

        if let Some(required) = self.config.normalized_hwid() {
            let hwid = identity.hwid_hex();
            if hwid != required {
                return Err(format!("HW ID {hwid} does not match {required}"));
            }
        }

        let schema = discover_device(handle, recipient, policy, self.observer.as_ref())
            .map_err(|e| format!("configuration discovery failed: {e}"))?;

        Ok((identity, schema))
    }
}

/// Find a device with the default tracing observer.
pub fn find<B: HidBackend>(
    backend: B,
    vendor_id: u16,
    product_id: u16,
    dongle_product_id: Option<u16>,
    required_hwid: Option<&str>,
) -> Result<DeviceSession<B::Handle>> {
    let mut config = LocatorConfig::new(vendor_id, product_id);
    config.dongle_product_id = dongle_product_id;
    config.hwid = required_hwid.map(str::to_string);
    Locator::new(backend, config).find()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::exchange::PollPolicy;
    use crate::protocol::ConfigStatus;
    use crate::transport::{MockBackend, SimulatedDevice};

    const VID: u16 = 0x1915;
    const PID: u16 = 0x52DE;
    const DONGLE_PID: u16 = 0x52DC;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<ConfigEvent>>,
    }

    impl ConfigObserver for RecordingObserver {
        fn on_event(&self, event: &ConfigEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn config() -> LocatorConfig {
        LocatorConfig::new(VID, PID)
            .with_dongle(DONGLE_PID)
            .with_poll(PollPolicy::new(Duration::ZERO, 3))
    }

    fn mouse(hwid: &[u8]) -> SimulatedDevice {
        SimulatedDevice::new("desktop_mouse", hwid)
            .with_module(&["\n", "motion", "cpi"])
            .with_module(&["led", "on", "off", "\n"])
    }

    fn paths(session: &DeviceSession<crate::transport::MockTransport>) -> String {
        session.descriptor().unwrap().path.clone()
    }

    #[test]
    fn test_single_direct_device() {
        let backend = MockBackend::new().with_device(VID, PID, "usb-1", mouse(&[0x11, 0x22]));
        let session = Locator::new(backend, config()).find().unwrap();

        assert_eq!(session.board_name().unwrap(), "desktop_mouse");
        assert_eq!(session.hwid().unwrap(), "1122");
        assert_eq!(session.recipient(), PID);
        let schema = session.schema().unwrap();
        assert_eq!(schema.resolve("motion", "cpi").unwrap(), 0x01);
        assert_eq!(schema.resolve("led", "off").unwrap(), 0x12);
    }

    #[test]
    fn test_direct_preferred_over_dongle() {
        let backend = MockBackend::new()
            .with_device(VID, DONGLE_PID, "dongle", mouse(&[0x02]))
            .with_device(VID, PID, "direct", mouse(&[0x01]));
        let locator = Locator::new(backend, config());

        let session = locator.find().unwrap();
        assert_eq!(paths(&session), "direct");

        let log = locator.backend().handle_log();
        assert_eq!(log.opened, vec!["direct", "dongle"]);
        assert_eq!(log.closed, vec!["dongle"]);
    }

    #[test]
    fn test_dongle_used_when_no_direct_device() {
        let backend = MockBackend::new().with_device(VID, DONGLE_PID, "dongle", mouse(&[0x02]));
        let locator = Locator::new(backend, config());
        let mut session = locator.find().unwrap();
        assert_eq!(paths(&session), "dongle");

        // requests through the dongle still address the device
        session.set("led", "on", &[1]).unwrap();
        assert_eq!(session.get("led", "on").unwrap(), vec![1]);
    }

    #[test]
    fn test_dongle_ignored_without_dongle_pid() {
        let backend = MockBackend::new().with_device(VID, DONGLE_PID, "dongle", mouse(&[0x02]));
        let locator = Locator::new(backend, LocatorConfig::new(VID, PID));
        assert!(matches!(
            locator.find(),
            Err(ConfigError::NotFound { vid: VID, pid: PID })
        ));
        assert!(locator.backend().handle_log().opened.is_empty());
    }

    #[test]
    fn test_hwid_filter() {
        let backend = MockBackend::new()
            .with_device(VID, PID, "first", mouse(&[0xAA, 0x01]))
            .with_device(VID, PID, "second", mouse(&[0xAA, 0x02]));
        let locator = Locator::new(backend, config().with_hwid("AA02"));

        let session = locator.find().unwrap();
        assert_eq!(paths(&session), "second");
        assert_eq!(locator.backend().handle_log().closed, vec!["first"]);
    }

    #[test]
    fn test_broken_candidate_is_skipped() {
        let broken = SimulatedDevice::new("broken", &[0x01]).with_module(&["led", "on"]);
        let backend = MockBackend::new()
            .with_device(VID, PID, "broken", broken)
            .with_device(VID, PID, "good", mouse(&[0x02]))
            .with_device(VID, DONGLE_PID, "dongle", mouse(&[0x03]));
        let observer = Arc::new(RecordingObserver::default());
        let locator = Locator::with_observer(backend, config(), Arc::clone(&observer));

        let session = locator.find().unwrap();
        assert_eq!(paths(&session), "good");

        let log = locator.backend().handle_log();
        assert_eq!(log.opened, vec!["broken", "good", "dongle"]);
        assert_eq!(log.closed, vec!["broken", "dongle"]);

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            ConfigEvent::CandidateSkipped { path, reason }
                if path == "broken" && reason.contains("discovery")
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ConfigEvent::DeviceSelected { path, modules: 2, .. } if path == "good"
        )));
    }

    #[test]
    fn test_identity_failure_skips_candidate() {
        let silent = mouse(&[0x01]).with_failure(ConfigStatus::GetBoardName, 0, ConfigStatus::Fault);
        let backend = MockBackend::new()
            .with_device(VID, PID, "silent", silent)
            .with_device(VID, PID, "good", mouse(&[0x02]));
        let locator = Locator::new(backend, config());
        assert_eq!(paths(&locator.find().unwrap()), "good");
        assert_eq!(locator.backend().handle_log().closed, vec!["silent"]);
    }

    #[test]
    fn test_not_found_closes_everything() {
        let backend = MockBackend::new()
            .with_device(VID, PID, "a", mouse(&[0x01]))
            .with_device(VID, DONGLE_PID, "b", mouse(&[0x02]));
        let locator = Locator::new(backend, config().with_hwid("ffff"));

        assert!(matches!(locator.find(), Err(ConfigError::NotFound { .. })));
        let log = locator.backend().handle_log();
        assert_eq!(log.opened, vec!["a", "b"]);
        assert_eq!(log.closed, vec!["a", "b"]);
    }

    #[test]
    fn test_unopenable_candidate() {
        let backend = MockBackend::new()
            .with_device(VID, PID, "busy", mouse(&[0x01]))
            .with_device(VID, PID, "free", mouse(&[0x02]))
            .with_unopenable("busy");
        let locator = Locator::new(backend, config());
        assert_eq!(paths(&locator.find().unwrap()), "free");
        assert_eq!(locator.backend().handle_log().opened, vec!["free"]);
    }

    #[test]
    fn test_session_close_releases_adopted_handle() {
        let backend = MockBackend::new().with_device(VID, PID, "usb-1", mouse(&[0x01]));
        let locator = Locator::new(backend, config());
        let mut session = locator.find().unwrap();
        assert!(locator.backend().handle_log().closed.is_empty());

        session.close();
        assert_eq!(locator.backend().handle_log().closed, vec!["usb-1"]);
        assert!(matches!(session.get("led", "on"), Err(ConfigError::NotInitialized)));
    }

    #[test]
    fn test_find_function() {
        let backend = MockBackend::new().with_device(VID, PID, "usb-1", mouse(&[0xBE, 0xEF]));
        let session = find(backend, VID, PID, None, Some("beef")).unwrap();
        assert_eq!(session.hwid().unwrap(), "beef");
    }
}
