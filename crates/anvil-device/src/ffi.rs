//! C ABI.
//!
//! Libraries and devices cross the boundary as opaque pointers to boxed
//! state; objects cross as their raw handle value. The device pointer itself
//! is accepted wherever an object handle is, and names the device object.
//!
//! Failures are reported as null / `0` sentinels and through the log. A panic
//! inside any of these functions aborts the process.

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::{Mutex, PoisonError};

use anvil_types::{DataType, InfoValue, StatusCode, StatusSeverity, WaitMask};

use crate::device::Device;
use crate::library::Library;
use crate::logging::{init_logging, LoggingConfig};
use crate::Handle;

/// NUL-terminated array of C strings with owned storage.
struct CStringList {
    _strings: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringList {
    fn new<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        let strings: Vec<CString> = items.into_iter().filter_map(|s| CString::new(s).ok()).collect();
        let mut ptrs: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        Self { _strings: strings, ptrs }
    }

    fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }
}

/// One `"parameter"` list entry as seen from C. The list ends with a null name.
#[repr(C)]
pub struct ParameterEntry {
    pub name: *const c_char,
    pub ty: u32,
}

/// Info query result with a stable address.
enum CachedInfo {
    Text(CString),
    Bytes(Vec<u8>),
    List { _names: Vec<CString>, entries: Vec<ParameterEntry> },
}

impl CachedInfo {
    fn from_value(value: &InfoValue<'_>) -> Option<Self> {
        Some(match value {
            InfoValue::String(text) => CachedInfo::Text(CString::new(*text).ok()?),
            InfoValue::Bool(flag) => CachedInfo::Bytes(u32::from(*flag).to_ne_bytes().to_vec()),
            InfoValue::Value { bytes, .. } => CachedInfo::Bytes(bytes.to_vec()),
            InfoValue::ParameterList(list) => {
                let names: Vec<CString> = list.iter().filter_map(|p| CString::new(p.name.as_str()).ok()).collect();
                let mut entries: Vec<ParameterEntry> = names
                    .iter()
                    .zip(list)
                    .map(|(name, p)| ParameterEntry { name: name.as_ptr(), ty: p.ty.raw() })
                    .collect();
                entries.push(ParameterEntry { name: std::ptr::null(), ty: DataType::Unknown.raw() });
                CachedInfo::List { _names: names, entries }
            }
        })
    }

    fn as_ptr(&self) -> *const c_void {
        match self {
            CachedInfo::Text(text) => text.as_ptr().cast(),
            CachedInfo::Bytes(bytes) => bytes.as_ptr().cast(),
            CachedInfo::List { entries, .. } => entries.as_ptr().cast(),
        }
    }
}

/// Behind every `ANVILLibrary` pointer.
pub struct LibraryState {
    library: Library,
    device_subtypes: CStringList,
    object_subtypes: HashMap<DataType, CStringList>,
    /// Query results stay allocated until the library is released.
    info: Mutex<HashMap<String, CachedInfo>>,
}

impl LibraryState {
    fn new(library: Library) -> Self {
        let device_subtypes = CStringList::new(library.device_subtypes());
        let object_subtypes = DataType::ALL
            .iter()
            .filter(|ty| ty.is_object())
            .map(|&ty| (ty, CStringList::new(library.object_subtypes(ty))))
            .collect();
        Self { library, device_subtypes, object_subtypes, info: Mutex::new(HashMap::new()) }
    }

    fn cache(&self, key: String, value: Option<InfoValue<'_>>) -> *const c_void {
        let Some(value) = value else {
            return std::ptr::null();
        };
        let mut info = self.info.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = info.get(&key) {
            return cached.as_ptr();
        }
        match CachedInfo::from_value(&value) {
            Some(cached) => info.entry(key).or_insert(cached).as_ptr(),
            None => std::ptr::null(),
        }
    }
}

/// Behind every `ANVILDevice` pointer.
pub struct DeviceState {
    device: Device,
}

// ── helpers ───────────────────────────────────────────────────────────────

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string alive for `'a`.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: upheld by the caller.
    match unsafe { CStr::from_ptr(ptr) }.to_str() {
        Ok(text) => Some(text),
        Err(_) => {
            log::error!("string argument is not valid UTF-8");
            None
        }
    }
}

/// # Safety
///
/// `lib` must be null or a live pointer from [`anvilNewLibrary`].
unsafe fn library<'a>(lib: *const LibraryState) -> Option<&'a LibraryState> {
    // SAFETY: upheld by the caller.
    unsafe { lib.as_ref() }
}

/// # Safety
///
/// `dev` must be null or a live pointer from [`anvilNewDevice`].
unsafe fn device<'a>(dev: *const DeviceState) -> Option<&'a Device> {
    // SAFETY: upheld by the caller.
    unsafe { dev.as_ref() }.map(|state| &state.device)
}

fn handle_of(dev: *const DeviceState, raw: usize) -> Handle {
    if raw == dev as usize { Handle::DEVICE } else { Handle::from_raw(raw) }
}

fn data_type(raw: u32) -> DataType {
    DataType::from_raw(raw).unwrap_or(DataType::Unknown)
}

/// Frees the device state once its runtime has been torn down.
///
/// # Safety
///
/// `dev` must be a live pointer from [`anvilNewDevice`] that no other thread
/// is using.
unsafe fn reclaim_if_dead(dev: *mut DeviceState) {
    // SAFETY: upheld by the caller.
    let dead = unsafe { device(dev) }.is_some_and(|device| !device.is_alive());
    if dead {
        // SAFETY: `dev` came from `Box::into_raw` in `anvilNewDevice`.
        drop(unsafe { Box::from_raw(dev) });
    }
}

// ── library ───────────────────────────────────────────────────────────────

/// Creates a library. `name` may be null (`"default"`). Initializes
/// `env_logger` unless a logger is already installed.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilNewLibrary(name: *const c_char) -> *mut LibraryState {
    init_logging(LoggingConfig::default());
    // SAFETY: upheld by the caller.
    let name = unsafe { str_arg(name) }.unwrap_or("default");
    log::debug!("library '{name}' loaded");
    Box::into_raw(Box::new(LibraryState::new(Library::new(name))))
}

/// # Safety
///
/// `lib` must be null or a pointer from [`anvilNewLibrary`] not yet released.
/// Pointers previously returned by queries on it become dangling.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilReleaseLibrary(lib: *mut LibraryState) {
    if !lib.is_null() {
        // SAFETY: `lib` came from `Box::into_raw` in `anvilNewLibrary`.
        drop(unsafe { Box::from_raw(lib) });
    }
}

/// Null-terminated list of device subtypes, owned by the library.
///
/// # Safety
///
/// `lib` must be null or a live library pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilGetDeviceSubtypes(lib: *const LibraryState) -> *const *const c_char {
    // SAFETY: upheld by the caller.
    unsafe { library(lib) }.map_or(std::ptr::null(), |state| state.device_subtypes.as_ptr())
}

/// Null-terminated list of subtypes of `object_type`, owned by the library.
///
/// # Safety
///
/// `lib` must be null or a live library pointer; `device_subtype` must be
/// null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilGetObjectSubtypes(
    lib: *const LibraryState,
    device_subtype: *const c_char,
    object_type: u32,
) -> *const *const c_char {
    // SAFETY: upheld by the caller.
    let Some(state) = (unsafe { library(lib) }) else {
        return std::ptr::null();
    };
    // SAFETY: upheld by the caller.
    let subtype = unsafe { str_arg(device_subtype) }.unwrap_or("default");
    if !state.library.device_subtypes().contains(&subtype) {
        return std::ptr::null();
    }
    state
        .object_subtypes
        .get(&data_type(object_type))
        .map_or(std::ptr::null(), CStringList::as_ptr)
}

/// Typed object metadata: `"description"` (STRING, `const char*`) or
/// `"parameter"` (PARAMETER_LIST, array of [`ParameterEntry`]).
///
/// # Safety
///
/// `lib` must be null or a live library pointer; string arguments must be
/// null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilGetObjectInfo(
    lib: *const LibraryState,
    device_subtype: *const c_char,
    object_subtype: *const c_char,
    object_type: u32,
    info_name: *const c_char,
    info_type: u32,
) -> *const c_void {
    // SAFETY: upheld by the caller.
    let (Some(state), Some(info_name)) = (unsafe { library(lib) }, unsafe { str_arg(info_name) }) else {
        return std::ptr::null();
    };
    // SAFETY: upheld by the caller.
    let (device_subtype, object_subtype) = unsafe { (str_arg(device_subtype), str_arg(object_subtype)) };
    if !state.library.device_subtypes().contains(&device_subtype.unwrap_or("default")) {
        return std::ptr::null();
    }
    let ty = data_type(object_type);
    let info_ty = data_type(info_type);
    let key = format!("{ty}/{object_subtype:?}/{info_name}/{info_ty}");
    state.cache(key, state.library.object_info(ty, object_subtype, info_name, info_ty))
}

/// Typed parameter metadata: `"description"` (STRING), `"required"` (BOOL),
/// `"default"` (the parameter's type).
///
/// # Safety
///
/// As [`anvilGetObjectInfo`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilGetParameterInfo(
    lib: *const LibraryState,
    device_subtype: *const c_char,
    object_subtype: *const c_char,
    object_type: u32,
    param_name: *const c_char,
    param_type: u32,
    info_name: *const c_char,
    info_type: u32,
) -> *const c_void {
    // SAFETY: upheld by the caller.
    let (Some(state), Some(param_name), Some(info_name)) =
        (unsafe { library(lib) }, unsafe { str_arg(param_name) }, unsafe { str_arg(info_name) })
    else {
        return std::ptr::null();
    };
    // SAFETY: upheld by the caller.
    let (device_subtype, object_subtype) = unsafe { (str_arg(device_subtype), str_arg(object_subtype)) };
    if !state.library.device_subtypes().contains(&device_subtype.unwrap_or("default")) {
        return std::ptr::null();
    }
    let ty = data_type(object_type);
    let param_ty = data_type(param_type);
    let info_ty = data_type(info_type);
    let key = format!("{ty}/{object_subtype:?}/{param_name}:{param_ty}/{info_name}/{info_ty}");
    state.cache(key, state.library.parameter_info(ty, object_subtype, param_name, param_ty, info_name, info_ty))
}

// ── device & objects ──────────────────────────────────────────────────────

/// Creates a device with one public reference. Null if `subtype` is unknown.
///
/// # Safety
///
/// `lib` must be null or a live library pointer; `subtype` must be null or a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilNewDevice(lib: *const LibraryState, subtype: *const c_char) -> *mut DeviceState {
    // SAFETY: upheld by the caller.
    let Some(state) = (unsafe { library(lib) }) else {
        return std::ptr::null_mut();
    };
    // SAFETY: upheld by the caller.
    let subtype = unsafe { str_arg(subtype) }.unwrap_or("default");
    match state.library.new_device(subtype) {
        Ok(device) => {
            let dev = Box::into_raw(Box::new(DeviceState { device }));
            // SAFETY: `dev` was just created and is not shared yet.
            unsafe { (*dev).device.set_ffi_address(dev as usize) };
            dev
        }
        Err(err) => {
            log::error!("anvilNewDevice: {err:#}");
            std::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `dev` must be null or a live device pointer; `subtype` must be null or a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilNewObject(dev: *const DeviceState, object_type: u32, subtype: *const c_char) -> usize {
    // SAFETY: upheld by the caller.
    let (Some(device), subtype) = (unsafe { device(dev) }, unsafe { str_arg(subtype) }) else {
        return 0;
    };
    device.new_object(data_type(object_type), subtype).raw()
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilNewArray1D(dev: *const DeviceState, element_type: u32, items: u64) -> usize {
    // SAFETY: upheld by the caller.
    unsafe { new_array(dev, element_type, [items, 1, 1], DataType::Array1D) }
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilNewArray2D(dev: *const DeviceState, element_type: u32, items_x: u64, items_y: u64) -> usize {
    // SAFETY: upheld by the caller.
    unsafe { new_array(dev, element_type, [items_x, items_y, 1], DataType::Array2D) }
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilNewArray3D(
    dev: *const DeviceState,
    element_type: u32,
    items_x: u64,
    items_y: u64,
    items_z: u64,
) -> usize {
    // SAFETY: upheld by the caller.
    unsafe { new_array(dev, element_type, [items_x, items_y, items_z], DataType::Array3D) }
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
unsafe fn new_array(dev: *const DeviceState, element_type: u32, dims: [u64; 3], kind: DataType) -> usize {
    // SAFETY: upheld by the caller.
    let Some(device) = (unsafe { device(dev) }) else {
        return 0;
    };
    let (Ok(x), Ok(y), Ok(z)) = (usize::try_from(dims[0]), usize::try_from(dims[1]), usize::try_from(dims[2])) else {
        log::error!("anvilNew{kind}: dimensions {dims:?} exceed the address space");
        return 0;
    };
    let ty = data_type(element_type);
    match kind {
        DataType::Array1D => device.new_array1d(ty, x),
        DataType::Array2D => device.new_array2d(ty, x, y),
        _ => device.new_array3d(ty, x, y, z),
    }
    .raw()
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilNewFrame(dev: *const DeviceState) -> usize {
    // SAFETY: upheld by the caller.
    unsafe { device(dev) }.map_or(0, |device| device.new_frame().raw())
}

// ── parameters ────────────────────────────────────────────────────────────

/// Stages a parameter. `mem` points to one value of `ty`; for STRING it is
/// the `const char*` itself. An object-typed value equal to the device
/// pointer names the device, like the `object` argument does.
///
/// # Safety
///
/// `dev` must be null or a live device pointer; `name` must be
/// NUL-terminated; `mem` must be valid for reads of `ty`'s size (or be a
/// NUL-terminated string for STRING). A STATUS_CALLBACK value must be a
/// [`RawStatusCallback`](crate::status::RawStatusCallback) that is safe to call from any thread with the
/// user data staged next to it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilSetParameter(
    dev: *const DeviceState,
    object: usize,
    name: *const c_char,
    ty: u32,
    mem: *const c_void,
) {
    // SAFETY: upheld by the caller.
    let (Some(device), Some(name)) = (unsafe { device(dev) }, unsafe { str_arg(name) }) else {
        return;
    };
    if mem.is_null() {
        log::error!("anvilSetParameter('{name}'): null value pointer");
        return;
    }
    let handle = handle_of(dev, object);
    let ty = data_type(ty);
    if ty == DataType::String {
        // SAFETY: upheld by the caller.
        let text = unsafe { CStr::from_ptr(mem.cast()) };
        device.set_parameter_raw(handle, name, ty, text.to_bytes());
        return;
    }
    if ty.is_object() {
        // SAFETY: upheld by the caller; object tags are pointer sized.
        let raw = unsafe { mem.cast::<usize>().read_unaligned() };
        let value = handle_of(dev, raw).raw();
        device.set_parameter_raw(handle, name, ty, &value.to_ne_bytes());
        return;
    }
    // SAFETY: upheld by the caller; unknown tags have size 0.
    let data = unsafe { std::slice::from_raw_parts(mem.cast::<u8>(), ty.size_of()) };
    device.set_parameter_raw(handle, name, ty, data);
}

/// # Safety
///
/// `dev` must be null or a live device pointer; `name` must be NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilUnsetParameter(dev: *const DeviceState, object: usize, name: *const c_char) {
    // SAFETY: upheld by the caller.
    if let (Some(device), Some(name)) = (unsafe { device(dev) }, unsafe { str_arg(name) }) {
        device.unset_parameter(handle_of(dev, object), name);
    }
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilCommitParameters(dev: *const DeviceState, object: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.commit_parameters(handle_of(dev, object));
    }
}

// ── reference counts ──────────────────────────────────────────────────────

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilRetain(dev: *const DeviceState, object: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.retain(handle_of(dev, object));
    }
}

/// Releasing the device's last reference frees `dev`.
///
/// # Safety
///
/// `dev` must be null or a live device pointer. When the call may release
/// the device's last reference, no other thread may be using `dev`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilRelease(dev: *mut DeviceState, object: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.release(handle_of(dev, object));
        // SAFETY: upheld by the caller.
        unsafe { reclaim_if_dead(dev) };
    }
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilRetainInternal(dev: *const DeviceState, object: usize, owner: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.retain_internal(handle_of(dev, object), handle_of(dev, owner));
    }
}

/// # Safety
///
/// As [`anvilRelease`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilReleaseInternal(dev: *mut DeviceState, object: usize, owner: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.release_internal(handle_of(dev, object), handle_of(dev, owner));
        // SAFETY: upheld by the caller.
        unsafe { reclaim_if_dead(dev) };
    }
}

// ── properties ────────────────────────────────────────────────────────────

/// Returns 1 and writes the value into `mem` if the property exists with
/// type `ty` and fits in `size` bytes; 0 otherwise.
///
/// # Safety
///
/// `dev` must be null or a live device pointer; `name` must be
/// NUL-terminated; `mem` must be valid for writes of `size` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilGetProperty(
    dev: *const DeviceState,
    object: usize,
    name: *const c_char,
    ty: u32,
    mem: *mut c_void,
    size: u64,
    mask: u32,
) -> i32 {
    // SAFETY: upheld by the caller.
    let (Some(device), Some(name)) = (unsafe { device(dev) }, unsafe { str_arg(name) }) else {
        return 0;
    };
    let Ok(size) = usize::try_from(size) else {
        return 0;
    };
    if mem.is_null() {
        return 0;
    }
    // SAFETY: upheld by the caller.
    let out = unsafe { std::slice::from_raw_parts_mut(mem.cast::<u8>(), size) };
    i32::from(device.get_property(handle_of(dev, object), name, data_type(ty), out, WaitMask::from_raw(mask)))
}

// ── arrays ────────────────────────────────────────────────────────────────

/// Maps an array's storage. Object arrays hold raw handles; elements are
/// not translated, so a device pointer written into one is an unknown
/// handle when the array is unmapped.
///
/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilMapArray(dev: *const DeviceState, array: usize) -> *mut c_void {
    // SAFETY: upheld by the caller.
    unsafe { device(dev) }
        .and_then(|device| device.map_array(handle_of(dev, array)))
        .map_or(std::ptr::null_mut(), |ptr| ptr.as_ptr().cast())
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilUnmapArray(dev: *const DeviceState, array: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.unmap_array(handle_of(dev, array));
    }
}

// ── frames ────────────────────────────────────────────────────────────────

/// Maps a frame channel. Width, height and pixel type are written through
/// the non-null out pointers.
///
/// # Safety
///
/// `dev` must be null or a live device pointer; `channel` must be
/// NUL-terminated; each out pointer must be null or valid for a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilMapFrame(
    dev: *const DeviceState,
    frame: usize,
    channel: *const c_char,
    width: *mut u32,
    height: *mut u32,
    pixel_type: *mut u32,
) -> *const c_void {
    // SAFETY: upheld by the caller.
    let (Some(device), Some(channel)) = (unsafe { device(dev) }, unsafe { str_arg(channel) }) else {
        return std::ptr::null();
    };
    let Some(mapped) = device.map_frame(handle_of(dev, frame), channel) else {
        return std::ptr::null();
    };
    // SAFETY: upheld by the caller.
    unsafe {
        if let Some(width) = width.as_mut() {
            *width = mapped.width;
        }
        if let Some(height) = height.as_mut() {
            *height = mapped.height;
        }
        if let Some(pixel_type) = pixel_type.as_mut() {
            *pixel_type = mapped.pixel_type.raw();
        }
    }
    mapped.data.as_ptr().cast_const().cast()
}

/// # Safety
///
/// `dev` must be null or a live device pointer; `channel` must be NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilUnmapFrame(dev: *const DeviceState, frame: usize, channel: *const c_char) {
    // SAFETY: upheld by the caller.
    if let (Some(device), Some(channel)) = (unsafe { device(dev) }, unsafe { str_arg(channel) }) {
        device.unmap_frame(handle_of(dev, frame), channel);
    }
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilRenderFrame(dev: *const DeviceState, frame: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.render_frame(handle_of(dev, frame));
    }
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilFrameReady(dev: *const DeviceState, frame: usize, mask: u32) -> i32 {
    // SAFETY: upheld by the caller.
    unsafe { device(dev) }
        .map_or(0, |device| i32::from(device.frame_ready(handle_of(dev, frame), WaitMask::from_raw(mask))))
}

/// # Safety
///
/// `dev` must be null or a live device pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilDiscardFrame(dev: *const DeviceState, frame: usize) {
    // SAFETY: upheld by the caller.
    if let Some(device) = unsafe { device(dev) } {
        device.discard_frame(handle_of(dev, frame));
    }
}

// ── status ────────────────────────────────────────────────────────────────

/// Emits a pre-rendered message through the device's status channel.
///
/// # Safety
///
/// `dev` must be null or a live device pointer; `message` must be
/// NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn anvilReportStatus(
    dev: *const DeviceState,
    source: usize,
    severity: u32,
    code: u32,
    message: *const c_char,
) {
    // SAFETY: upheld by the caller.
    let (Some(device), Some(message)) = (unsafe { device(dev) }, unsafe { str_arg(message) }) else {
        return;
    };
    let severity = StatusSeverity::from_raw(severity).unwrap_or(StatusSeverity::Info);
    let code = StatusCode::from_raw(code).unwrap_or(StatusCode::UnknownError);
    device.report_status(handle_of(dev, source), severity, code, format_args!("{message}"));
}
