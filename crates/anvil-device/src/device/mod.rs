//! Runtime instance and its entry points.
//!
//! A [`Device`] is a cheap, cloneable reference to one runtime: its handle
//! table, its device object and its status channel. Every entry point takes
//! an opaque [`Handle`], resolves it, and dispatches through the [`Object`]
//! surface. Unknown or destroyed handles make every entry point a no-op.
//!
//! Reference counts are separate from `Device` clones. The device object
//! starts with one public reference; releasing it tears the runtime down and
//! leaves every remaining clone inert.

mod config;
pub(crate) mod debug;

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anvil_types::{DataType, Registry, StatusCode, StatusSeverity, WaitMask};
use bytemuck::Pod;

use crate::object::{
    ArrayObject, DeviceObject, FrameImage, FrameObject, GenericObject, MappedFrame, Object, ObjectCell,
    ObjectContext,
};
use crate::param::ParamValue;
use crate::refcount::{RefCountError, Transition};
use crate::status::{RawStatusCallback, StatusChannel};
use crate::table::HandleTable;
use crate::Handle;

pub use config::DeviceConfig;
pub use debug::{debug_factory, DebugFactoryFn, DebugObjectFactory, DEBUG_FACTORY_ABI};

/// Shared state behind every [`Device`] clone.
pub(crate) struct Runtime {
    name: String,
    registry: Arc<Registry>,
    table: HandleTable,
    device_cell: Arc<ObjectCell>,
    status: StatusChannel,
    alive: AtomicBool,
    /// Address C callers know the device by; reported to C status callbacks.
    ffi_address: AtomicUsize,
}

impl Runtime {
    pub(crate) fn resolve(&self, handle: Handle) -> Option<Arc<ObjectCell>> {
        if handle.is_null() || !self.alive.load(Ordering::Acquire) {
            return None;
        }
        if handle.is_device() {
            return Some(Arc::clone(&self.device_cell));
        }
        self.table.resolve(handle)
    }

    pub(crate) fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub(crate) fn device_address(&self) -> usize {
        match self.ffi_address.load(Ordering::Acquire) {
            0 => Handle::DEVICE.raw(),
            address => address,
        }
    }

    pub(crate) fn emit(
        &self,
        source: Handle,
        source_type: DataType,
        severity: StatusSeverity,
        code: StatusCode,
        args: fmt::Arguments<'_>,
    ) {
        if !self.alive.load(Ordering::Acquire) {
            return;
        }
        self.status.emit(Handle::DEVICE, source, source_type, severity, code, args);
    }

    fn context(&self, cell: &ObjectCell) -> ObjectContext<'_> {
        ObjectContext::new(self, cell.handle(), cell.kind())
    }

    pub(crate) fn violation(&self, cell: &ObjectCell, op: &str, err: &RefCountError) {
        log::error!("{op} on {} {}: {err}", cell.kind(), cell.handle());
        self.emit(
            cell.handle(),
            cell.kind(),
            StatusSeverity::FatalError,
            StatusCode::InvalidOperation,
            format_args!("{op} on {} {}: {err}", cell.kind(), cell.handle()),
        );
    }

    fn retain(&self, handle: Handle) {
        let Some(cell) = self.resolve(handle) else {
            return;
        };
        if let Err(err) = cell.refs().retain() {
            self.violation(&cell, "retain", &err);
        }
    }

    fn release(&self, handle: Handle) {
        let Some(cell) = self.resolve(handle) else {
            return;
        };
        match cell.refs().release() {
            Ok(Transition::Live) => {}
            Ok(Transition::Destroy) => self.destroy(cell),
            Err(err) => self.violation(&cell, "release", &err),
        }
    }

    fn retain_internal(&self, handle: Handle, owner: Handle) {
        let Some(cell) = self.resolve(handle) else {
            return;
        };
        if let Err(err) = cell.refs().retain_internal(owner) {
            self.violation(&cell, "retain_internal", &err);
        }
    }

    pub(crate) fn release_internal(&self, handle: Handle, owner: Handle) {
        let Some(cell) = self.resolve(handle) else {
            return;
        };
        match cell.refs().release_internal(owner) {
            Ok(Transition::Live) => {}
            Ok(Transition::Destroy) => self.destroy(cell),
            Err(err) => self.violation(&cell, "release_internal", &err),
        }
    }

    /// Runs exactly once per object, from the call that zeroed its counts.
    fn destroy(&self, cell: Arc<ObjectCell>) {
        if cell.handle().is_device() {
            self.teardown();
            return;
        }
        self.table.remove(cell.handle());
        log::debug!("destroying {} {}", cell.kind(), cell.handle());
        cell.object().finalize(&self.context(&cell));
    }

    fn teardown(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        let cells = self.table.drain();
        log::debug!("device '{}': tearing down {} remaining object(s)", self.name, cells.len());
        // Finalizer releases resolve nothing once `alive` is cleared.
        for cell in &cells {
            cell.object().finalize(&self.context(cell));
        }
        self.device_cell.object().finalize(&self.context(&self.device_cell));
        self.status.install(None);
    }
}

/// Handle to one runtime instance.
#[derive(Clone)]
pub struct Device {
    rt: Arc<Runtime>,
}

impl Device {
    /// A device describing its objects with [`Registry::builtin`].
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_registry(config, Arc::new(Registry::builtin()))
    }

    pub fn with_registry(config: DeviceConfig, registry: Arc<Registry>) -> Self {
        let device_object = DeviceObject::new(&config.name);
        let rt = Runtime {
            device_cell: Arc::new(ObjectCell::new(Handle::DEVICE, Box::new(device_object))),
            status: StatusChannel::new(config.default_sink, config.status_threshold),
            name: config.name,
            registry,
            table: HandleTable::new(),
            alive: AtomicBool::new(true),
            ffi_address: AtomicUsize::new(0),
        };
        log::debug!("device '{}' created", rt.name);
        Self { rt: Arc::new(rt) }
    }

    pub fn name(&self) -> &str {
        &self.rt.name
    }

    pub fn registry(&self) -> &Registry {
        &self.rt.registry
    }

    /// `false` once the device object's counts reached zero.
    pub fn is_alive(&self) -> bool {
        self.rt.alive.load(Ordering::Acquire)
    }

    /// Resolves `handle` to its live object.
    pub fn resolve(&self, handle: Handle) -> Option<Arc<ObjectCell>> {
        self.rt.resolve(handle)
    }

    /// Every live table handle, ascending. The device alias is not listed.
    pub fn live_objects(&self) -> Vec<Handle> {
        self.rt.table.live_handles()
    }

    pub(crate) fn set_ffi_address(&self, address: usize) {
        self.rt.ffi_address.store(address, Ordering::Release);
    }

    fn warn(&self, source: Handle, code: StatusCode, args: fmt::Arguments<'_>) {
        let source_type = self.rt.resolve(source).map_or(DataType::Unknown, |cell| cell.kind());
        self.rt.emit(source, source_type, StatusSeverity::Warning, code, args);
    }

    // ── creation ──────────────────────────────────────────────────────────

    /// Teardown closes the table, so an insert racing it yields
    /// [`Handle::NULL`] instead of an object nothing will finalize.
    fn insert(&self, object: Box<dyn Object>) -> Handle {
        let kind = object.kind();
        match self.rt.table.allocate(|handle| ObjectCell::new(handle, object)) {
            Some(handle) => {
                log::debug!("created {kind} {handle}");
                handle
            }
            None => Handle::NULL,
        }
    }

    /// Creates a scene object (camera, renderer, world, ...). Subtypes the
    /// registry does not know are accepted with a warning.
    pub fn new_object(&self, ty: DataType, subtype: Option<&str>) -> Handle {
        if !GenericObject::handles_kind(ty) {
            self.warn(
                Handle::DEVICE,
                StatusCode::InvalidArgument,
                format_args!("{ty} objects cannot be created through new_object"),
            );
            return Handle::NULL;
        }
        let info = self.rt.registry.lookup(ty, subtype);
        if info.is_none() {
            self.warn(
                Handle::DEVICE,
                StatusCode::InvalidArgument,
                format_args!("unsupported {ty} subtype '{}'", subtype.unwrap_or("")),
            );
        }
        self.insert(Box::new(GenericObject::new(ty, subtype, info)))
    }

    pub fn new_array1d(&self, element_type: DataType, items: usize) -> Handle {
        self.new_array(DataType::Array1D, element_type, [items, 1, 1])
    }

    pub fn new_array2d(&self, element_type: DataType, items_x: usize, items_y: usize) -> Handle {
        self.new_array(DataType::Array2D, element_type, [items_x, items_y, 1])
    }

    pub fn new_array3d(&self, element_type: DataType, items_x: usize, items_y: usize, items_z: usize) -> Handle {
        self.new_array(DataType::Array3D, element_type, [items_x, items_y, items_z])
    }

    fn new_array(&self, kind: DataType, element_type: DataType, dims: [usize; 3]) -> Handle {
        match ArrayObject::with_kind(kind, element_type, dims) {
            Ok(array) => self.insert(Box::new(array)),
            Err(err) => {
                self.rt.emit(
                    Handle::DEVICE,
                    DataType::Device,
                    StatusSeverity::Error,
                    StatusCode::InvalidArgument,
                    format_args!("cannot create {kind}: {err}"),
                );
                Handle::NULL
            }
        }
    }

    pub fn new_frame(&self) -> Handle {
        self.insert(Box::new(FrameObject::new()))
    }

    // ── parameters ────────────────────────────────────────────────────────

    /// Stages `data`, interpreted as one value of `ty`, under `name`.
    ///
    /// STATUS_CALLBACK values are rejected here; install callbacks with
    /// [`set_status_callback`](Self::set_status_callback).
    pub fn set_parameter(&self, handle: Handle, name: &str, ty: DataType, data: &[u8]) {
        if ty == DataType::StatusCallback {
            self.warn(
                handle,
                StatusCode::InvalidArgument,
                format_args!("'{name}': STATUS_CALLBACK values are set with set_status_callback"),
            );
            return;
        }
        self.set_parameter_raw(handle, name, ty, data);
    }

    /// [`set_parameter`](Self::set_parameter) without the STATUS_CALLBACK
    /// guard. Callers vouch for callback addresses.
    pub(crate) fn set_parameter_raw(&self, handle: Handle, name: &str, ty: DataType, data: &[u8]) {
        let Some(cell) = self.rt.resolve(handle) else {
            return;
        };
        if let Err(err) = cell.object().set(name, ty, data) {
            self.rt.emit(handle, cell.kind(), StatusSeverity::Warning, StatusCode::InvalidArgument, format_args!("{err}"));
        }
    }

    /// Stages the device's `statusCallback` and `statusCallbackUserData`.
    /// The sink changes on the next `commit_parameters(Handle::DEVICE)`;
    /// `None` installs no sink at all.
    ///
    /// # Safety
    ///
    /// `callback` must satisfy the contract of
    /// [`CallbackSink::new`](crate::status::CallbackSink::new) for `user_data`
    /// for as long as it stays installed.
    pub unsafe fn set_status_callback(&self, callback: Option<RawStatusCallback>, user_data: *const c_void) {
        let address = callback.map_or(0, |callback| callback as usize);
        self.set_parameter_raw(Handle::DEVICE, "statusCallback", DataType::StatusCallback, &address.to_ne_bytes());
        self.set_parameter_raw(
            Handle::DEVICE,
            "statusCallbackUserData",
            DataType::VoidPointer,
            &(user_data as usize).to_ne_bytes(),
        );
    }

    pub fn set_value<T: ParamValue>(&self, handle: Handle, name: &str, value: T) {
        self.set_parameter(handle, name, T::TYPE, bytemuck::bytes_of(&value));
    }

    pub fn set_string(&self, handle: Handle, name: &str, value: &str) {
        self.set_parameter(handle, name, DataType::String, value.as_bytes());
    }

    pub fn set_bool(&self, handle: Handle, name: &str, value: bool) {
        self.set_parameter(handle, name, DataType::Bool, &u32::from(value).to_ne_bytes());
    }

    pub fn set_data_type(&self, handle: Handle, name: &str, value: DataType) {
        self.set_parameter(handle, name, DataType::DataType, &value.raw().to_ne_bytes());
    }

    /// Stages a reference to `target`, typed `ty`. No reference is taken
    /// until the object is committed.
    pub fn set_object(&self, handle: Handle, name: &str, ty: DataType, target: Handle) {
        if !ty.is_object() {
            self.warn(handle, StatusCode::InvalidArgument, format_args!("'{name}': {ty} is not an object type"));
            return;
        }
        self.set_parameter(handle, name, ty, bytemuck::bytes_of(&target));
    }

    pub fn unset_parameter(&self, handle: Handle, name: &str) {
        if let Some(cell) = self.rt.resolve(handle) {
            cell.object().unset(name);
        }
    }

    pub fn commit_parameters(&self, handle: Handle) {
        if let Some(cell) = self.rt.resolve(handle) {
            cell.object().commit(&self.rt.context(&cell));
        }
    }

    /// Copies the staged value of `name` into `out` if its type is `ty`.
    pub fn get_parameter(&self, handle: Handle, name: &str, ty: DataType, out: &mut [u8]) -> bool {
        self.rt
            .resolve(handle)
            .is_some_and(|cell| cell.object().get(name, ty, out, WaitMask::NoWait))
    }

    pub fn get_value<T: ParamValue>(&self, handle: Handle, name: &str) -> Option<T> {
        let mut value = T::zeroed();
        self.get_parameter(handle, name, T::TYPE, bytemuck::bytes_of_mut(&mut value))
            .then_some(value)
    }

    pub fn get_string(&self, handle: Handle, name: &str) -> Option<String> {
        let cell = self.rt.resolve(handle)?;
        cell.object().params().staged().get(name)?.as_str().map(str::to_owned)
    }

    // ── properties ────────────────────────────────────────────────────────

    pub fn get_property(&self, handle: Handle, name: &str, ty: DataType, out: &mut [u8], mask: WaitMask) -> bool {
        self.rt
            .resolve(handle)
            .is_some_and(|cell| cell.object().get_property(name, ty, out, mask))
    }

    pub fn property<T: ParamValue>(&self, handle: Handle, name: &str, mask: WaitMask) -> Option<T> {
        let mut value = T::zeroed();
        self.get_property(handle, name, T::TYPE, bytemuck::bytes_of_mut(&mut value), mask)
            .then_some(value)
    }

    // ── reference counts ──────────────────────────────────────────────────

    pub fn retain(&self, handle: Handle) {
        self.rt.retain(handle);
    }

    /// Drops one public reference. Releasing [`Handle::DEVICE`] to zero tears
    /// the runtime down.
    pub fn release(&self, handle: Handle) {
        self.rt.release(handle);
    }

    pub fn retain_internal(&self, handle: Handle, owner: Handle) {
        self.rt.retain_internal(handle, owner);
    }

    pub fn release_internal(&self, handle: Handle, owner: Handle) {
        self.rt.release_internal(handle, owner);
    }

    // ── arrays ────────────────────────────────────────────────────────────

    fn with_array<R>(&self, handle: Handle, f: impl FnOnce(&ArrayObject, &ObjectContext<'_>) -> R) -> Option<R> {
        let cell = self.rt.resolve(handle)?;
        let array = cell.object().as_array()?;
        Some(f(array, &self.rt.context(&cell)))
    }

    /// Start of the array's element storage; `None` for non-array handles.
    pub fn map_array(&self, handle: Handle) -> Option<NonNull<u8>> {
        self.with_array(handle, |array, ctx| array.map(ctx))
    }

    pub fn unmap_array(&self, handle: Handle) {
        self.with_array(handle, |array, ctx| array.unmap(ctx));
    }

    /// Maps the array, hands its elements to `f` as `[T]`, and unmaps it.
    ///
    /// `None` when `handle` is not an array or `T` does not match the
    /// element size. `f` must not call back into the same array.
    pub fn with_mapped_array<T: Pod, R>(&self, handle: Handle, f: impl FnOnce(&mut [T]) -> R) -> Option<R> {
        self.with_array(handle, |array, ctx| {
            if size_of::<T>() != array.element_type().size_of() {
                ctx.report_status(
                    StatusSeverity::Warning,
                    StatusCode::InvalidArgument,
                    format_args!("{} elements are {} bytes, not {}", array.element_type(), array.element_type().size_of(), size_of::<T>()),
                );
                return None;
            }
            array.map(ctx);
            let result = array.with_bytes_mut(|bytes| bytemuck::try_cast_slice_mut(bytes).ok().map(f));
            array.unmap(ctx);
            result
        })
        .flatten()
    }

    // ── frames ────────────────────────────────────────────────────────────

    fn with_frame<R>(&self, handle: Handle, f: impl FnOnce(&FrameObject, &ObjectContext<'_>) -> R) -> Option<R> {
        let cell = self.rt.resolve(handle)?;
        let frame = cell.object().as_frame()?;
        Some(f(frame, &self.rt.context(&cell)))
    }

    pub fn map_frame(&self, handle: Handle, channel: &str) -> Option<MappedFrame> {
        self.with_frame(handle, |frame, ctx| frame.map(channel, ctx)).flatten()
    }

    pub fn unmap_frame(&self, handle: Handle, channel: &str) {
        self.with_frame(handle, |frame, _| frame.unmap(channel));
    }

    /// Renders synchronously; the frame is ready when this returns.
    pub fn render_frame(&self, handle: Handle) {
        self.with_frame(handle, |frame, ctx| frame.render(ctx));
    }

    pub fn frame_ready(&self, handle: Handle, mask: WaitMask) -> bool {
        self.with_frame(handle, |frame, _| frame.ready(mask)).unwrap_or(false)
    }

    pub fn discard_frame(&self, handle: Handle) {
        self.with_frame(handle, |frame, _| frame.discard());
    }

    /// Owned copy of a frame channel.
    pub fn read_frame(&self, handle: Handle, channel: &str) -> Option<FrameImage> {
        self.with_frame(handle, |frame, _| frame.read(channel)).flatten()
    }

    // ── status ────────────────────────────────────────────────────────────

    /// Emits a message attributed to `source`. See also [`report!`](crate::report).
    pub fn report_status(&self, source: Handle, severity: StatusSeverity, code: StatusCode, args: fmt::Arguments<'_>) {
        let source_type = self.rt.resolve(source).map_or(DataType::Unknown, |cell| cell.kind());
        self.rt.emit(source, source_type, severity, code, args);
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.rt.name)
            .field("alive", &self.is_alive())
            .field("objects", &self.rt.table.live_count())
            .field("slots", &self.rt.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::status::StatusReport;

    fn quiet() -> Device {
        Device::new(DeviceConfig::default().without_sink())
    }

    fn capturing() -> (Device, Arc<Mutex<Vec<(StatusSeverity, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let config = DeviceConfig::default().with_sink(move |r: &StatusReport<'_>| {
            sink_seen.lock().unwrap().push((r.severity, r.message.as_str().to_owned()));
        });
        (Device::new(config), seen)
    }

    // ── handles ───────────────────────────────────────────────────────────

    #[test]
    fn null_never_resolves_and_device_always_does() {
        let device = quiet();
        assert!(device.resolve(Handle::NULL).is_none());
        let cell = device.resolve(Handle::DEVICE).unwrap();
        assert_eq!(cell.kind(), DataType::Device);
    }

    #[test]
    fn creation_rejects_non_scene_types() {
        let (device, seen) = capturing();
        assert!(device.new_object(DataType::Frame, None).is_null());
        assert!(device.new_object(DataType::Float32, None).is_null());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn unknown_subtypes_are_created_with_a_warning() {
        let (device, seen) = capturing();
        let camera = device.new_object(DataType::Camera, Some("fisheye"));
        assert!(!camera.is_null());
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, StatusSeverity::Warning);
        assert!(seen[0].1.contains("fisheye"));
    }

    // ── parameters ────────────────────────────────────────────────────────

    #[test]
    fn typed_helpers_round_trip() {
        let device = quiet();
        let camera = device.new_object(DataType::Camera, Some("perspective"));
        device.set_value(camera, "position", [1.0f32, 2.0, 3.0]);
        device.set_string(camera, "name", "main");
        device.set_bool(camera, "enabled", true);

        assert_eq!(device.get_value::<[f32; 3]>(camera, "position"), Some([1.0, 2.0, 3.0]));
        assert_eq!(device.get_value::<[f32; 4]>(camera, "position"), None);
        assert_eq!(device.get_string(camera, "name").as_deref(), Some("main"));
        assert_eq!(device.get_value::<u32>(camera, "enabled"), None);

        device.unset_parameter(camera, "position");
        assert_eq!(device.get_value::<[f32; 3]>(camera, "position"), None);
    }

    #[test]
    fn short_data_is_reported_and_ignored() {
        let (device, seen) = capturing();
        let light = device.new_object(DataType::Light, Some("directional"));
        device.set_parameter(light, "color", DataType::Float32Vec3, &[0u8; 4]);
        assert_eq!(device.get_value::<[f32; 3]>(light, "color"), None);
        assert!(seen.lock().unwrap()[0].1.contains("needs 12 bytes"));
    }

    #[test]
    fn status_callback_type_is_guarded() {
        let (device, seen) = capturing();
        device.set_parameter(Handle::DEVICE, "statusCallback", DataType::StatusCallback, &1usize.to_ne_bytes());
        let mut out = [0u8; 8];
        assert!(!device.get_parameter(Handle::DEVICE, "statusCallback", DataType::StatusCallback, &mut out));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    // ── status ────────────────────────────────────────────────────────────

    #[test]
    fn null_status_callback_silences_the_device() {
        let (device, seen) = capturing();
        // SAFETY: no callback is installed.
        unsafe { device.set_status_callback(None, std::ptr::null()) };
        device.commit_parameters(Handle::DEVICE);
        crate::report!(device, Handle::DEVICE, StatusSeverity::Error, StatusCode::UnknownError, "dropped");
        assert!(seen.lock().unwrap().is_empty());

        device.unset_parameter(Handle::DEVICE, "statusCallback");
        device.commit_parameters(Handle::DEVICE);
        crate::report!(device, Handle::DEVICE, StatusSeverity::Error, StatusCode::UnknownError, "back");
        assert_eq!(seen.lock().unwrap()[0].1, "back");
    }

    // ── teardown ──────────────────────────────────────────────────────────

    #[test]
    fn releasing_the_device_makes_everything_inert() {
        let device = quiet();
        let world = device.new_object(DataType::World, None);
        device.release(Handle::DEVICE);

        assert!(!device.is_alive());
        assert!(device.resolve(world).is_none());
        assert!(device.resolve(Handle::DEVICE).is_none());
        assert!(device.new_frame().is_null());
        assert!(device.live_objects().is_empty());
        device.release(world);
    }
}
