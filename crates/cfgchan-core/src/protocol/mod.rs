//! Protocol module - configuration channel wire definitions.

pub mod constants;
pub mod frame;
pub mod status;

pub use constants::*;
pub use frame::{Frame, FrameError, ReportFraming, encode, payload_text};
pub use status::ConfigStatus;
