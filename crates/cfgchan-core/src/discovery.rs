//! Schema discovery.
//!
//! A device exposes its configuration as modules, each with up to 15 options.
//! Discovery first asks for the highest module ID and then, for every module,
//! repeatedly fetches option 0. Each fetch returns the next entry of a cyclic
//! list: the module name, its option names and one entry starting with
//! `'\n'` that marks where the list wraps. Fetching stops once an entry comes
//! back a second time.
//!
//! Note that an option name repeated by firmware looks exactly like the list
//! wrapping and ends enumeration early.

use tracing::{debug, instrument};

use crate::error::{ConfigError, Result};
use crate::events::{ConfigEvent, ConfigObserver};
use crate::exchange::{PollPolicy, Request, exchange};
use crate::protocol::constants::{
    END_OF_TRANSFER_CHAR, MAX_DESCRIPTOR_ENTRIES, MOD_FIELD_MAX_MOD_ID, OPT_MODULE_DESCR,
};
use crate::protocol::{ConfigStatus, event_id, payload_text};
use crate::schema::{DeviceSchema, ModuleSchema};
use crate::transport::HidTransport;

/// Outcome of adding one fetched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collect {
    /// Keep fetching.
    More,
    /// The entry was seen before; the list is complete.
    WrappedAround,
}

/// Accumulates the descriptor entries of one module.
#[derive(Debug)]
pub struct DescriptorCollector {
    module_id: u8,
    entries: Vec<String>,
    end_of_transfer: Option<usize>,
}

impl DescriptorCollector {
    pub fn new(module_id: u8) -> Self {
        Self {
            module_id,
            entries: Vec::new(),
            end_of_transfer: None,
        }
    }

    fn malformed(&self, reason: &str) -> ConfigError {
        ConfigError::malformed(Some(self.module_id), reason)
    }

    /// Add the next fetched entry.
    pub fn push(&mut self, entry: String) -> Result<Collect> {
        if entry.is_empty() {
            return Err(self.malformed("empty description entry"));
        }
        if self.entries.contains(&entry) {
            return Ok(Collect::WrappedAround);
        }
        if entry.starts_with(END_OF_TRANSFER_CHAR) {
            if self.end_of_transfer.is_some() {
                return Err(self.malformed("more than one end-of-transfer entry"));
            }
            self.end_of_transfer = Some(self.entries.len());
        }
        self.entries.push(entry);

        if self.entries.len() > MAX_DESCRIPTOR_ENTRIES {
            return Err(self.malformed("description does not wrap around"));
        }
        Ok(Collect::More)
    }

    /// Rotate the entries so the end-of-transfer marker comes first, drop it
    /// and split the rest into module name and options.
    pub fn finish(self) -> Result<ModuleSchema> {
        let Some(eot) = self.end_of_transfer else {
            return Err(self.malformed("no end-of-transfer entry"));
        };

        let mut entries = self.entries;
        entries.rotate_left(eot);
        let mut entries = entries.into_iter().skip(1);

        let Some(name) = entries.next() else {
            return Err(ConfigError::malformed(
                Some(self.module_id),
                "missing module name",
            ));
        };

        Ok(ModuleSchema::with_options(self.module_id, name, entries))
    }
}

/// Build a module schema from entries in the order the device returned them.
/// Entries after the first repeated one are ignored.
pub fn module_from_entries<I, S>(module_id: u8, entries: I) -> Result<ModuleSchema>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut collector = DescriptorCollector::new(module_id);
    for entry in entries {
        if collector.push(entry.into())? == Collect::WrappedAround {
            break;
        }
    }
    collector.finish()
}

/// Highest module ID present on the device. IDs past what the event ID's
/// module field can address are rejected.
pub fn read_max_module_id<T: HidTransport + ?Sized>(
    transport: &T,
    recipient: u16,
    policy: &PollPolicy,
) -> Result<u8> {
    let data = exchange(
        transport,
        &Request::query(recipient, ConfigStatus::GetMaxModuleId),
        policy,
    )?;

    let max_module_id = data
        .as_deref()
        .and_then(|d| d.first().copied())
        .ok_or_else(|| ConfigError::malformed(None, "empty maximum module ID response"))?;

    if max_module_id > MOD_FIELD_MAX_MOD_ID {
        return Err(ConfigError::malformed(
            None,
            format!("maximum module ID {max_module_id} exceeds {MOD_FIELD_MAX_MOD_ID}"),
        ));
    }
    Ok(max_module_id)
}

/// Fetch the next descriptor entry of a module.
pub fn fetch_next_entry<T: HidTransport + ?Sized>(
    transport: &T,
    recipient: u16,
    module_id: u8,
    policy: &PollPolicy,
) -> Result<String> {
    let request = Request::fetch(recipient, event_id(module_id, OPT_MODULE_DESCR));
    let data = exchange(transport, &request, policy)?.unwrap_or_default();
    Ok(payload_text(&data))
}

/// Discover the name and options of one module.
#[instrument(level = "debug", skip(transport, policy))]
pub fn discover_module<T: HidTransport + ?Sized>(
    transport: &T,
    recipient: u16,
    module_id: u8,
    policy: &PollPolicy,
) -> Result<ModuleSchema> {
    let mut collector = DescriptorCollector::new(module_id);

    // One fetch past the largest valid description sees the wrap-around.
    for _ in 0..=MAX_DESCRIPTOR_ENTRIES {
        let entry = fetch_next_entry(transport, recipient, module_id, policy)?;
        if collector.push(entry)? == Collect::WrappedAround {
            break;
        }
    }

    let module = collector.finish()?;
    debug!(module = %module.name(), options = module.len(), "Module description complete");
    Ok(module)
}

/// Discover the full configuration schema of a device.
#[instrument(level = "debug", skip(transport, policy, observer), fields(recipient = %format!("{:04X}", recipient)))]
pub fn discover_device<T, O>(
    transport: &T,
    recipient: u16,
    policy: &PollPolicy,
    observer: &O,
) -> Result<DeviceSchema>
where
    T: HidTransport + ?Sized,
    O: ConfigObserver + ?Sized,
{
    let max_module_id = read_max_module_id(transport, recipient, policy)?;
    debug!(max_module_id, "Discovering modules");

    let mut schema = DeviceSchema::new();
    for module_id in 0..=max_module_id {
        let module = discover_module(transport, recipient, module_id, policy)?;
        observer.on_event(&ConfigEvent::ModuleDiscovered {
            id: module.id(),
            name: module.name().to_string(),
            options: module.len(),
        });
        schema.insert(module);
    }

    Ok(schema)
}
