//! Event system for UI decoupling.
//!
//! Lets a CLI or GUI follow device lookup and schema discovery without
//! tight coupling to the core logic.

/// Events emitted while locating and using a device.
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// Candidate devices found for the direct and dongle product IDs.
    CandidatesFound { direct: usize, dongle: usize },
    /// A candidate handle was opened.
    CandidateOpened { path: String, product_id: u16 },
    /// A candidate was closed without being used.
    CandidateSkipped { path: String, reason: String },
    /// Board name and hardware ID read from a candidate.
    IdentityRead {
        path: String,
        board_name: String,
        hwid: String,
    },
    /// One module description was assembled.
    ModuleDiscovered {
        id: u8,
        name: String,
        options: usize,
    },
    /// A candidate passed all checks and now backs a session.
    DeviceSelected {
        path: String,
        board_name: String,
        hwid: String,
        modules: usize,
    },
}

/// Observer trait for receiving configuration channel events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait ConfigObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &ConfigEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl ConfigObserver for NullObserver {
    fn on_event(&self, _event: &ConfigEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl ConfigObserver for TracingObserver {
    fn on_event(&self, event: &ConfigEvent) {
        match event {
            ConfigEvent::CandidatesFound { direct, dongle } => {
                tracing::debug!(direct, dongle, "Candidates found");
            }
            ConfigEvent::CandidateOpened { path, product_id } => {
                tracing::debug!(path = %path, pid = %format!("{:04X}", product_id), "Candidate opened");
            }
            ConfigEvent::CandidateSkipped { path, reason } => {
                tracing::warn!(path = %path, "Skipping candidate: {}", reason);
            }
            ConfigEvent::IdentityRead {
                path,
                board_name,
                hwid,
            } => {
                tracing::debug!(path = %path, board = %board_name, hwid = %hwid, "Identity read");
            }
            ConfigEvent::ModuleDiscovered { id, name, options } => {
                tracing::debug!(id, module = %name, options, "Module discovered");
            }
            ConfigEvent::DeviceSelected {
                path,
                board_name,
                hwid,
                modules,
            } => {
                tracing::info!(path = %path, modules, "Device board name is {} (HW ID: {})", board_name, hwid);
            }
        }
    }
}
