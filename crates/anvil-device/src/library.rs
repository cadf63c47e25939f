//! Library: the loadable unit that creates devices and answers
//! introspection queries without one.

use std::sync::Arc;

use anvil_types::{DataType, InfoValue, Registry};
use anyhow::{ensure, Result};

use crate::device::{Device, DeviceConfig};

/// Owns the object registry shared by every device it creates.
#[derive(Debug, Clone)]
pub struct Library {
    name: String,
    registry: Arc<Registry>,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(name, Registry::builtin())
    }

    pub fn with_registry(name: impl Into<String>, registry: Registry) -> Self {
        Self { name: name.into(), registry: Arc::new(registry) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Device subtypes this library can create: `"default"` and its own name.
    pub fn device_subtypes(&self) -> Vec<&str> {
        let mut subtypes = vec!["default"];
        if self.name != "default" {
            subtypes.push(&self.name);
        }
        subtypes
    }

    pub fn new_device(&self, subtype: &str) -> Result<Device> {
        self.new_device_with(subtype, DeviceConfig::named(self.name.clone()))
    }

    pub fn new_device_with(&self, subtype: &str, config: DeviceConfig) -> Result<Device> {
        ensure!(
            self.device_subtypes().contains(&subtype),
            "library '{}' has no device subtype '{subtype}' (available: {})",
            self.name,
            self.device_subtypes().join(", ")
        );
        Ok(Device::with_registry(config, Arc::clone(&self.registry)))
    }

    pub fn object_subtypes(&self, ty: DataType) -> Vec<&str> {
        self.registry.object_subtypes(ty)
    }

    pub fn object_info(
        &self,
        ty: DataType,
        subtype: Option<&str>,
        info_name: &str,
        info_type: DataType,
    ) -> Option<InfoValue<'_>> {
        self.registry.object_info(ty, subtype, info_name, info_type)
    }

    pub fn parameter_info(
        &self,
        ty: DataType,
        subtype: Option<&str>,
        param_name: &str,
        param_type: DataType,
        info_name: &str,
        info_type: DataType,
    ) -> Option<InfoValue<'_>> {
        self.registry.parameter_info(ty, subtype, param_name, param_type, info_name, info_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_subtypes_include_the_library_name() {
        let library = Library::new("tree");
        assert_eq!(library.device_subtypes(), ["default", "tree"]);
        assert_eq!(Library::new("default").device_subtypes(), ["default"]);
    }

    #[test]
    fn creation_is_gated_on_subtype() {
        let library = Library::new("tree");
        assert!(library.new_device("default").is_ok());
        let device = library.new_device("tree").unwrap();
        assert_eq!(device.name(), "tree");

        let err = library.new_device("vulkan").unwrap_err();
        assert!(err.to_string().contains("no device subtype 'vulkan'"));
    }

    #[test]
    fn queries_forward_to_the_registry() {
        let library = Library::new("tree");
        assert!(library.object_subtypes(DataType::Geometry).contains(&"sphere"));
        assert_eq!(
            library.parameter_info(DataType::Frame, None, "size", DataType::UInt32Vec2, "required", DataType::Bool),
            Some(InfoValue::Bool(true))
        );
        assert!(library.object_info(DataType::World, None, "description", DataType::Int32).is_none());
    }
}
