use std::ffi::c_void;
use std::sync::Arc;

use anvil_types::{DataType, StatusCode, StatusSeverity, WaitMask};

use super::{write_str, write_value, Object, ObjectContext};
use crate::device::debug::{debug_factory, DebugFactoryFn};
use crate::param::{Parameter, Parameters};
use crate::status::{CallbackSink, RawStatusCallback};

const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");

/// The object behind [`Handle::DEVICE`](crate::Handle::DEVICE).
pub(crate) struct DeviceObject {
    name: String,
    params: Parameters,
}

impl DeviceObject {
    pub(crate) fn new(name: &str) -> Self {
        Self { name: name.to_owned(), params: Parameters::new() }
    }

    /// Installs the sink described by the committed `statusCallback` /
    /// `statusCallbackUserData` parameters.
    fn rewire_status(&self, ctx: &ObjectContext<'_>) {
        let rt = ctx.runtime();
        let committed = self.params.committed();
        let callback = committed.get("statusCallback");

        match callback.map(|p| (p.ty(), p.as_address())) {
            None => rt.status().restore_default(),
            Some((DataType::StatusCallback, Some(0))) => rt.status().install(None),
            Some((DataType::StatusCallback, Some(address))) => {
                let user_data = committed
                    .get("statusCallbackUserData")
                    .and_then(Parameter::as_address)
                    .unwrap_or(0);
                // SAFETY: a STATUS_CALLBACK parameter can only be staged through
                // `Device::set_status_callback` or the C ABI, whose contracts
                // require a `RawStatusCallback` that satisfies `CallbackSink::new`.
                let sink = unsafe {
                    let callback = std::mem::transmute::<usize, RawStatusCallback>(address);
                    CallbackSink::new(callback, user_data as *const c_void, rt.device_address())
                };
                rt.status().install(Some(Arc::new(sink)));
            }
            Some((ty, _)) => {
                rt.status().restore_default();
                ctx.report_status(
                    StatusSeverity::Warning,
                    StatusCode::InvalidArgument,
                    format_args!("statusCallback must be STATUS_CALLBACK, got {ty}; using the default sink"),
                );
            }
        }
    }
}

fn version_part(text: &str) -> i32 {
    text.parse().unwrap_or(0)
}

impl Object for DeviceObject {
    fn kind(&self) -> DataType {
        DataType::Device
    }

    fn params(&self) -> &Parameters {
        &self.params
    }

    fn commit(&self, ctx: &ObjectContext<'_>) {
        self.params.commit(ctx);
        self.rewire_status(ctx);
    }

    fn get_property(&self, name: &str, ty: DataType, out: &mut [u8], _mask: WaitMask) -> bool {
        match (name, ty) {
            ("debugObjects", DataType::FunctionPointer) => {
                let entry: DebugFactoryFn = debug_factory;
                write_value(out, entry as usize)
            }
            ("version", DataType::Int32) => {
                let version = version_part(VERSION_MAJOR) * 10_000
                    + version_part(VERSION_MINOR) * 100
                    + version_part(VERSION_PATCH);
                write_value(out, version)
            }
            ("version.major", DataType::Int32) => write_value(out, version_part(VERSION_MAJOR)),
            ("version.minor", DataType::Int32) => write_value(out, version_part(VERSION_MINOR)),
            ("version.name", DataType::String) => {
                write_str(out, &format!("{} {}", self.name, env!("CARGO_PKG_VERSION")))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_properties() {
        let device = DeviceObject::new("anvil");
        let mut out = [0u8; 64];
        assert!(device.get_property("version.major", DataType::Int32, &mut out, WaitMask::NoWait));
        assert_eq!(i32::from_ne_bytes(out[..4].try_into().unwrap()), version_part(VERSION_MAJOR));

        assert!(device.get_property("version.name", DataType::String, &mut out, WaitMask::NoWait));
        let end = out.iter().position(|&b| b == 0).unwrap();
        assert!(std::str::from_utf8(&out[..end]).unwrap().starts_with("anvil "));
        assert!(!device.get_property("version.name", DataType::String, &mut [0u8; 3], WaitMask::NoWait));
    }

    #[test]
    fn debug_objects_is_the_factory_address() {
        let device = DeviceObject::new("anvil");
        let mut out = [0u8; size_of::<usize>()];
        assert!(device.get_property("debugObjects", DataType::FunctionPointer, &mut out, WaitMask::NoWait));
        let entry: DebugFactoryFn = debug_factory;
        assert_eq!(usize::from_ne_bytes(out), entry as usize);
        assert!(!device.get_property("debugObjects", DataType::VoidPointer, &mut out, WaitMask::NoWait));
    }
}
