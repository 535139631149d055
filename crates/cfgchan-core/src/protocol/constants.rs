//! Configuration channel wire constants.

/// HID report ID carrying configuration channel frames.
pub const REPORT_ID: u8 = 6;

/// Total feature report length, including the report ID byte.
pub const REPORT_SIZE: usize = 30;

/// Header length of a tagged frame: tag, recipient (2), event id, status, data length.
pub const HEADER_SIZE: usize = 6;

/// Header length when the transport strips the report ID from responses.
pub const UNTAGGED_HEADER_SIZE: usize = HEADER_SIZE - 1;

/// Largest payload a single frame can carry.
pub const MAX_DATA_LEN: usize = REPORT_SIZE - HEADER_SIZE;

// Event ID layout
pub const MOD_FIELD_POS: u8 = 4;
pub const OPT_FIELD_POS: u8 = 0;
pub const MOD_FIELD_MASK: u8 = 0xF0;
pub const OPT_FIELD_MASK: u8 = 0x0F;

/// Highest module ID the 4-bit module field can address.
pub const MOD_FIELD_MAX_MOD_ID: u8 = MOD_FIELD_MASK >> MOD_FIELD_POS;

/// Highest option index the 4-bit option field can address.
pub const OPT_FIELD_MAX_OPT_CNT: u8 = 0x0F;

/// Option index reserved for fetching the module description.
pub const OPT_MODULE_DESCR: u8 = 0x00;

/// Distinct descriptor entries a module may report: sentinel, module name and options.
pub const MAX_DESCRIPTOR_ENTRIES: usize = OPT_FIELD_MAX_OPT_CNT as usize + 2;

/// First character of the entry marking the end of a module description.
pub const END_OF_TRANSFER_CHAR: char = '\n';

// Polling defaults
pub const POLL_INTERVAL_DEFAULT_MS: u64 = 20;
pub const POLL_RETRY_COUNT: u32 = 200;

// HID class requests used by the USB backend
pub const HID_REQ_GET_REPORT: u8 = 0x01;
pub const HID_REQ_SET_REPORT: u8 = 0x09;
pub const HID_REPORT_TYPE_FEATURE: u16 = 0x03;
pub const USB_CLASS_HID: u8 = 0x03;

// Nordic Semiconductor vendor ID and nRF Desktop product IDs
pub const NORDIC_VENDOR_ID: u16 = 0x1915;
pub const NRF_DESKTOP_MOUSE_PID: u16 = 0x52DE;
pub const NRF_DESKTOP_KEYBOARD_PID: u16 = 0x52DD;
pub const NRF_DESKTOP_DONGLE_PID: u16 = 0x52DC;

/// Build an event ID from a module ID and option index.
pub const fn event_id(module_id: u8, option_id: u8) -> u8 {
    ((module_id << MOD_FIELD_POS) & MOD_FIELD_MASK) | ((option_id << OPT_FIELD_POS) & OPT_FIELD_MASK)
}
