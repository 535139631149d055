//! Discovered device configuration schema.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{ConfigError, Result};
use crate::protocol::event_id;

/// One module and its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSchema {
    id: u8,
    name: String,
    /// Option name to option ID, in ID order. ID 0 is the module descriptor.
    options: IndexMap<String, u8>,
}

impl ModuleSchema {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            options: IndexMap::new(),
        }
    }

    /// Build a module whose options are numbered from 1 in iteration order.
    pub fn with_options<I, S>(id: u8, name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut module = Self::new(id, name);
        for (idx, option) in options.into_iter().enumerate() {
            module.options.insert(option.into(), idx as u8 + 1);
        }
        module
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn option_id(&self, option: &str) -> Option<u8> {
        self.options.get(option).copied()
    }

    /// `(name, id)` pairs in ID order.
    pub fn options(&self) -> impl Iterator<Item = (&str, u8)> {
        self.options.iter().map(|(name, &id)| (name.as_str(), id))
    }

    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Event ID addressing `option` in this module.
    pub fn event_id(&self, option: &str) -> Option<u8> {
        self.option_id(option).map(|opt| event_id(self.id, opt))
    }
}

/// All modules of a device, keyed by module name in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSchema {
    modules: IndexMap<String, ModuleSchema>,
}

impl DeviceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module. A module with the same name is replaced and returned.
    pub fn insert(&mut self, module: ModuleSchema) -> Option<ModuleSchema> {
        self.modules.insert(module.name.clone(), module)
    }

    pub fn module(&self, name: &str) -> Option<&ModuleSchema> {
        self.modules.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleSchema> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Resolve a module/option pair to its event ID.
    pub fn resolve(&self, module: &str, option: &str) -> Result<u8> {
        let schema = self
            .module(module)
            .ok_or_else(|| ConfigError::UnknownModule(module.to_string()))?;
        schema
            .event_id(option)
            .ok_or_else(|| ConfigError::UnknownOption {
                module: module.to_string(),
                option: option.to_string(),
            })
    }

    /// Module name to option names, for listing the device configuration.
    pub fn listing(&self) -> IndexMap<String, Vec<String>> {
        self.modules
            .iter()
            .map(|(name, module)| {
                (
                    name.clone(),
                    module.option_names().map(str::to_string).collect(),
                )
            })
            .collect()
    }
}

impl fmt::Display for DeviceSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for module in self.modules() {
            writeln!(f, "{} (module {})", module.name(), module.id())?;
            for (option, id) in module.options() {
                writeln!(f, "  {option} (option {id})")?;
            }
        }
        Ok(())
    }
}
