//! Object model.
//!
//! Every handle in the table resolves to an [`ObjectCell`]: the handle it was
//! issued under, its reference counts, and a boxed [`Object`] implementation.
//! Entry points only ever talk to the trait; the variants live in submodules.

mod array;
mod device_object;
mod frame;
mod generic;

use std::fmt;

use anvil_types::{DataType, StatusCode, StatusSeverity, WaitMask};
use bytemuck::Pod;

use crate::device::Runtime;
use crate::param::{ParamError, Parameters};
use crate::refcount::{RefCountError, RefCounts};
use crate::Handle;

pub use array::{ArrayError, ArrayObject};
pub use frame::{FrameImage, FrameObject, MappedFrame};
pub(crate) use device_object::DeviceObject;
pub(crate) use generic::GenericObject;

/// Uniform operation surface of every object variant.
pub trait Object: Send + Sync {
    fn kind(&self) -> DataType;

    fn subtype(&self) -> Option<&str> {
        None
    }

    fn params(&self) -> &Parameters;

    fn set(&self, name: &str, ty: DataType, data: &[u8]) -> Result<(), ParamError> {
        self.params().set(name, ty, data)
    }

    fn unset(&self, name: &str) -> bool {
        self.params().unset(name)
    }

    fn get(&self, name: &str, ty: DataType, out: &mut [u8], _mask: WaitMask) -> bool {
        self.params().get(name, ty, out)
    }

    /// Promotes staged parameters. Variants that derive state from their
    /// parameters override this and call `params().commit(ctx)` first.
    fn commit(&self, ctx: &ObjectContext<'_>) {
        self.params().commit(ctx);
    }

    /// Runtime-computed values. Unknown names and mismatched types return
    /// `false` and leave `out` untouched.
    fn get_property(&self, _name: &str, _ty: DataType, _out: &mut [u8], _mask: WaitMask) -> bool {
        false
    }

    /// Called once when both reference counts reach zero, before the object
    /// is dropped. Must give back every internal reference the object holds.
    fn finalize(&self, ctx: &ObjectContext<'_>) {
        self.params().release_held(ctx);
    }

    fn as_array(&self) -> Option<&ArrayObject> {
        None
    }

    fn as_frame(&self) -> Option<&FrameObject> {
        None
    }
}

/// Table entry: one live object and its counts.
pub struct ObjectCell {
    handle: Handle,
    refs: RefCounts,
    object: Box<dyn Object>,
}

impl ObjectCell {
    pub(crate) fn new(handle: Handle, object: Box<dyn Object>) -> Self {
        Self { handle, refs: RefCounts::new(), object }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn kind(&self) -> DataType {
        self.object.kind()
    }

    #[inline]
    pub fn subtype(&self) -> Option<&str> {
        self.object.subtype()
    }

    #[inline]
    pub fn refs(&self) -> &RefCounts {
        &self.refs
    }

    #[inline]
    pub fn object(&self) -> &dyn Object {
        self.object.as_ref()
    }
}

impl fmt::Debug for ObjectCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCell")
            .field("handle", &self.handle)
            .field("kind", &self.kind())
            .field("subtype", &self.subtype())
            .field("public", &self.refs.public())
            .field("internal", &self.refs.internal())
            .finish()
    }
}

/// Why [`ObjectContext::try_retain_internal`] took no reference.
pub(crate) enum Refusal {
    Device,
    Unknown(Handle),
    Violation(std::sync::Arc<ObjectCell>, RefCountError),
}

/// What an object may do to the rest of the runtime while it runs.
///
/// Internal references taken through the context are owned by `this`.
pub struct ObjectContext<'a> {
    rt: &'a Runtime,
    this: Handle,
    kind: DataType,
}

impl<'a> ObjectContext<'a> {
    pub(crate) fn new(rt: &'a Runtime, this: Handle, kind: DataType) -> Self {
        Self { rt, this, kind }
    }

    #[inline]
    pub fn this(&self) -> Handle {
        self.this
    }

    pub(crate) fn runtime(&self) -> &'a Runtime {
        self.rt
    }

    /// Takes an internal reference on `target`. Returns `false` (after
    /// reporting why) when `target` cannot be held.
    pub fn retain_internal(&self, target: Handle) -> bool {
        match self.try_retain_internal(target) {
            Ok(()) => true,
            Err(refusal) => {
                self.report_refusal(&refusal);
                false
            }
        }
    }

    /// [`retain_internal`](Self::retain_internal) without reporting, for
    /// callers that hold a lock a status sink could re-enter.
    pub(crate) fn try_retain_internal(&self, target: Handle) -> Result<(), Refusal> {
        if target.is_device() {
            return Err(Refusal::Device);
        }
        let Some(cell) = self.rt.resolve(target) else {
            return Err(Refusal::Unknown(target));
        };
        cell.refs()
            .retain_internal(self.this)
            .map_err(|err| Refusal::Violation(cell, err))
    }

    pub(crate) fn report_refusal(&self, refusal: &Refusal) {
        match refusal {
            Refusal::Device => self.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidArgument,
                format_args!("{} cannot hold a reference to the device", self.this),
            ),
            Refusal::Unknown(target) => self.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidArgument,
                format_args!("{} references unknown handle {target}", self.this),
            ),
            Refusal::Violation(cell, err) => self.rt.violation(cell, "retain_internal", err),
        }
    }

    pub fn release_internal(&self, target: Handle) {
        self.rt.release_internal(target, self.this);
    }

    pub fn resolve(&self, handle: Handle) -> Option<std::sync::Arc<ObjectCell>> {
        self.rt.resolve(handle)
    }

    pub fn report_status(&self, severity: StatusSeverity, code: StatusCode, args: fmt::Arguments<'_>) {
        self.rt.emit(self.this, self.kind, severity, code, args);
    }
}

/// Copies `value` into the front of `out`; `false` if `out` is too short.
pub fn write_value<T: Pod>(out: &mut [u8], value: T) -> bool {
    let bytes = bytemuck::bytes_of(&value);
    match out.get_mut(..bytes.len()) {
        Some(dst) => {
            dst.copy_from_slice(bytes);
            true
        }
        None => false,
    }
}

/// Writes `text` NUL-terminated; `false` if `out` is too short.
pub fn write_str(out: &mut [u8], text: &str) -> bool {
    match out.get_mut(..text.len() + 1) {
        Some(dst) => {
            dst[..text.len()].copy_from_slice(text.as_bytes());
            dst[text.len()] = 0;
            true
        }
        None => false,
    }
}
