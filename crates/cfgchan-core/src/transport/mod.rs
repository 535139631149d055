//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod traits;

pub use mock::{HandleLog, MockBackend, MockTransport, SimulatedDevice};
pub use self::nusb::{NusbBackend, NusbHidTransport};
pub use traits::{DeviceDescriptor, HidBackend, HidTransport, TransportError};
