//! Entry point handed out through the `"debugObjects"` device property.
//!
//! Debug layers interpose on the C ABI and use the factory to label the
//! objects they wrap. Only the entry point and its table live here.

use std::ffi::c_char;

use anvil_types::DataType;

/// Version of [`DebugObjectFactory`]'s layout.
pub const DEBUG_FACTORY_ABI: u32 = 1;

/// Function table returned by [`debug_factory`].
#[repr(C)]
#[derive(Debug)]
pub struct DebugObjectFactory {
    pub abi_version: u32,
    /// NUL-terminated name of a raw type tag; null for unknown tags.
    pub type_name: extern "C" fn(ty: u32) -> *const c_char,
}

/// Signature of [`debug_factory`], as written by the `"debugObjects"` property.
pub type DebugFactoryFn = extern "C" fn() -> *const DebugObjectFactory;

static FACTORY: DebugObjectFactory = DebugObjectFactory { abi_version: DEBUG_FACTORY_ABI, type_name };

extern "C" fn type_name(ty: u32) -> *const c_char {
    DataType::from_raw(ty).map_or(std::ptr::null(), |ty| ty.c_name().as_ptr())
}

/// Returns the process-wide debug object factory.
pub extern "C" fn debug_factory() -> *const DebugObjectFactory {
    &FACTORY
}
