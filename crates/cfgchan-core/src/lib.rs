//! cfgchan-core: HID configuration channel client in Rust.
//!
//! This crate talks to peripherals that expose their settings over HID
//! feature reports. The device describes its own configuration as named
//! modules and options; the host discovers that description once and then
//! reads and writes option values by name.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, status codes, report frame codec
//! - **Transport**: HID feature report abstraction (nusb, mock)
//! - **Exchange**: Request/response with bounded polling
//! - **Discovery**: Module and option descriptions read from the device
//! - **Session**: Name-based get/set on an open device
//! - **Locator**: Candidate enumeration and device selection
//! - **Events**: Observer pattern for UI decoupling
//!
//! # Example
//!
//! ```no_run
//! use cfgchan_core::{Locator, LocatorConfig, NusbBackend};
//!
//! let config = LocatorConfig::default();
//! let mut session = Locator::new(NusbBackend, config).find()?;
//!
//! println!("{}", session.identity()?);
//! session.set("motion", "cpi", &800u16.to_le_bytes())?;
//! println!("cpi: {:02x?}", session.get("motion", "cpi")?);
//! # Ok::<(), cfgchan_core::ConfigError>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod exchange;
pub mod locator;
pub mod protocol;
pub mod schema;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use config::LocatorConfig;
pub use error::{ConfigError, Result};
pub use events::{ConfigEvent, ConfigObserver, NullObserver, TracingObserver};
pub use exchange::{PollPolicy, Request, exchange};
pub use locator::{Locator, find};
pub use protocol::{ConfigStatus, Frame, FrameError, ReportFraming};
pub use schema::{DeviceSchema, ModuleSchema};
pub use session::{DeviceIdentity, DeviceSession};
pub use transport::{
    DeviceDescriptor, HidBackend, HidTransport, MockBackend, MockTransport, NusbBackend,
    TransportError,
};
