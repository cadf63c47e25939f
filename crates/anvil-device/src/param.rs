//! Typed parameter storage.
//!
//! Parameters arrive as a name, a [`DataType`] tag, and untyped bytes. The
//! store copies exactly `tag.size_of()` bytes (strings: the given UTF-8
//! payload) and only hands values back to readers asking for the same tag.
//!
//! Each object keeps two sets: `set`/`unset` edit the *staged* set, and
//! `commit` promotes it to the *committed* set that the object's behavior
//! reads from.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anvil_types::DataType;
use bytemuck::Pod;

use crate::Handle;
use crate::object::ObjectContext;

/// Rust types that map one-to-one onto a fixed-size [`DataType`].
pub trait ParamValue: Pod {
    const TYPE: DataType;
}

macro_rules! param_values {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $( impl ParamValue for $ty { const TYPE: DataType = DataType::$tag; } )*
    };
}

param_values! {
    i8 => Int8,
    u8 => UInt8,
    i32 => Int32,
    [i32; 2] => Int32Vec2,
    [i32; 3] => Int32Vec3,
    [i32; 4] => Int32Vec4,
    u32 => UInt32,
    [u32; 2] => UInt32Vec2,
    [u32; 3] => UInt32Vec3,
    [u32; 4] => UInt32Vec4,
    i64 => Int64,
    u64 => UInt64,
    [u8; 4] => UFixed8Vec4,
    f32 => Float32,
    [f32; 2] => Float32Vec2,
    [f32; 3] => Float32Vec3,
    [f32; 4] => Float32Vec4,
    [f32; 9] => Float32Mat3,
    [f32; 16] => Float32Mat4,
    f64 => Float64,
}

/// Rejected `set`: the object is left unchanged.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParamError {
    UnknownType { name: String },
    ShortData { name: String, ty: DataType, expected: usize, got: usize },
    InvalidString { name: String },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::UnknownType { name } => {
                write!(f, "parameter '{name}' has no data type")
            }
            ParamError::ShortData { name, ty, expected, got } => {
                write!(f, "parameter '{name}' ({ty}) needs {expected} bytes, got {got}")
            }
            ParamError::InvalidString { name } => {
                write!(f, "parameter '{name}' is not valid UTF-8")
            }
        }
    }
}

impl std::error::Error for ParamError {}

/// One stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    ty: DataType,
    data: Vec<u8>,
}

impl Parameter {
    pub fn new(name: &str, ty: DataType, data: &[u8]) -> Result<Self, ParamError> {
        if ty == DataType::Unknown {
            return Err(ParamError::UnknownType { name: name.to_owned() });
        }
        if ty.is_variable_length() {
            if std::str::from_utf8(data).is_err() {
                return Err(ParamError::InvalidString { name: name.to_owned() });
            }
            return Ok(Self { ty, data: data.to_vec() });
        }
        let size = ty.size_of();
        let Some(bytes) = data.get(..size) else {
            return Err(ParamError::ShortData {
                name: name.to_owned(),
                ty,
                expected: size,
                got: data.len(),
            });
        };
        Ok(Self { ty, data: bytes.to_vec() })
    }

    #[inline]
    pub fn ty(&self) -> DataType {
        self.ty
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn value<T: ParamValue>(&self) -> Option<T> {
        (self.ty == T::TYPE).then(|| bytemuck::pod_read_unaligned(&self.data))
    }

    pub fn as_str(&self) -> Option<&str> {
        if self.ty != DataType::String {
            return None;
        }
        std::str::from_utf8(&self.data).ok()
    }

    /// Referenced handle if this is an object-typed parameter.
    pub fn as_handle(&self) -> Option<Handle> {
        self.ty.is_object().then(|| bytemuck::pod_read_unaligned(&self.data))
    }

    /// Pointer-sized payload of STATUS_CALLBACK / FUNCTION_POINTER / VOID_POINTER values.
    pub fn as_address(&self) -> Option<usize> {
        matches!(
            self.ty,
            DataType::StatusCallback | DataType::FunctionPointer | DataType::VoidPointer
        )
        .then(|| bytemuck::pod_read_unaligned(&self.data))
    }

    /// DATA_TYPE payload.
    pub fn as_data_type(&self) -> Option<DataType> {
        (self.ty == DataType::DataType)
            .then(|| bytemuck::pod_read_unaligned::<u32>(&self.data))
            .and_then(DataType::from_raw)
    }

    /// Copies the value into `out` when the tag matches and `out` is large
    /// enough. Strings are written NUL-terminated.
    pub fn read_into(&self, ty: DataType, out: &mut [u8]) -> bool {
        if ty != self.ty {
            return false;
        }
        let needed = self.data.len() + usize::from(self.ty.is_variable_length());
        let Some(dst) = out.get_mut(..needed) else {
            return false;
        };
        dst[..self.data.len()].copy_from_slice(&self.data);
        if self.ty.is_variable_length() {
            dst[self.data.len()] = 0;
        }
        true
    }
}

/// Insertion-ordered name → [`Parameter`] map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, Parameter)>,
}

impl ParameterSet {
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn insert(&mut self, name: &str, param: Parameter) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = param,
            None => self.entries.push((name.to_owned(), param)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-null handles referenced by object-typed parameters, in order.
    pub fn handles(&self) -> Vec<Handle> {
        self.entries
            .iter()
            .filter_map(|(_, p)| p.as_handle())
            .filter(|h| !h.is_null())
            .collect()
    }
}

#[derive(Debug, Default)]
struct ParamState {
    staged: ParameterSet,
    committed: ParameterSet,
    /// Handles this object currently holds an internal reference on.
    held: Vec<Handle>,
}

/// Staged and committed parameter sets of one object.
#[derive(Debug, Default)]
pub struct Parameters {
    state: Mutex<ParamState>,
    /// Serializes commits so `held` matches what was actually retained.
    commit_gate: Mutex<()>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ParamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, name: &str, ty: DataType, data: &[u8]) -> Result<(), ParamError> {
        let param = Parameter::new(name, ty, data)?;
        self.lock().staged.insert(name, param);
        Ok(())
    }

    /// Returns `true` if the parameter was staged.
    pub fn unset(&self, name: &str) -> bool {
        self.lock().staged.remove(name).is_some()
    }

    /// Reads a staged value; see [`Parameter::read_into`].
    pub fn get(&self, name: &str, ty: DataType, out: &mut [u8]) -> bool {
        self.lock().staged.get(name).is_some_and(|p| p.read_into(ty, out))
    }

    pub fn staged(&self) -> ParameterSet {
        self.lock().staged.clone()
    }

    pub fn committed(&self) -> ParameterSet {
        self.lock().committed.clone()
    }

    pub fn committed_value<T: ParamValue>(&self, name: &str) -> Option<T> {
        self.lock().committed.get(name).and_then(Parameter::value)
    }

    pub fn committed_handle(&self, name: &str) -> Option<Handle> {
        self.lock()
            .committed
            .get(name)
            .and_then(Parameter::as_handle)
            .filter(|h| !h.is_null())
    }

    pub fn committed_data_type(&self, name: &str) -> Option<DataType> {
        self.lock().committed.get(name).and_then(Parameter::as_data_type)
    }

    pub fn committed_address(&self, name: &str) -> Option<usize> {
        self.lock().committed.get(name).and_then(Parameter::as_address)
    }

    /// Promotes the staged set and moves internal references from the
    /// previously committed referents to the new ones.
    ///
    /// New referents are retained before old ones are released, so a handle
    /// present in both sets never passes through zero. Refusals are reported
    /// and releases run only after every lock is dropped: status sinks and
    /// destruction chains may re-enter this object.
    pub(crate) fn commit(&self, ctx: &ObjectContext<'_>) {
        let mut refusals = Vec::new();
        let released = {
            let _gate = self.commit_gate.lock().unwrap_or_else(PoisonError::into_inner);
            let wanted = {
                let mut state = self.lock();
                state.committed = state.staged.clone();
                state.committed.handles()
            };
            let mut retained = Vec::with_capacity(wanted.len());
            for target in wanted {
                match ctx.try_retain_internal(target) {
                    Ok(()) => retained.push(target),
                    Err(refusal) => refusals.push(refusal),
                }
            }
            std::mem::replace(&mut self.lock().held, retained)
        };
        for refusal in &refusals {
            ctx.report_refusal(refusal);
        }
        for target in released {
            ctx.release_internal(target);
        }
    }

    /// Drops every internal reference this object holds.
    pub(crate) fn release_held(&self, ctx: &ObjectContext<'_>) {
        let released = {
            let _gate = self.commit_gate.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut self.lock().held)
        };
        for target in released {
            ctx.release_internal(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_with_matching_tag() {
        let params = Parameters::new();
        params.set("color", DataType::Float32Vec3, bytemuck::bytes_of(&[0.5f32, 0.25, 1.0])).unwrap();

        let mut out = [0u8; 12];
        assert!(params.get("color", DataType::Float32Vec3, &mut out));
        assert_eq!(bytemuck::pod_read_unaligned::<[f32; 3]>(&out), [0.5, 0.25, 1.0]);
    }

    #[test]
    fn mismatched_tag_reads_nothing() {
        let params = Parameters::new();
        params.set("radius", DataType::Float32, &2.0f32.to_ne_bytes()).unwrap();

        let mut out = [0xAAu8; 8];
        assert!(!params.get("radius", DataType::Int32, &mut out));
        assert!(!params.get("radius", DataType::Float64, &mut out));
        assert_eq!(out, [0xAA; 8]);
        assert!(!params.get("missing", DataType::Float32, &mut out));
    }

    #[test]
    fn copies_exactly_size_of_bytes() {
        let long = [1u8, 0, 0, 0, 99, 99, 99];
        let p = Parameter::new("n", DataType::UInt32, &long).unwrap();
        assert_eq!(p.bytes(), &[1, 0, 0, 0]);
        assert_eq!(p.value::<u32>(), Some(1));
    }

    #[test]
    fn short_data_is_rejected() {
        let err = Parameter::new("v", DataType::Float32Vec4, &[0u8; 8]).unwrap_err();
        assert_eq!(
            err,
            ParamError::ShortData { name: "v".into(), ty: DataType::Float32Vec4, expected: 16, got: 8 }
        );
        assert!(Parameter::new("u", DataType::Unknown, &[]).is_err());
    }

    #[test]
    fn out_buffer_too_small() {
        let p = Parameter::new("m", DataType::Float32Mat4, &[0u8; 64]).unwrap();
        assert!(!p.read_into(DataType::Float32Mat4, &mut [0u8; 63]));
        assert!(p.read_into(DataType::Float32Mat4, &mut [0u8; 64]));
    }

    #[test]
    fn strings_are_stored_by_value_and_read_terminated() {
        let p = Parameter::new("name", DataType::String, b"hello").unwrap();
        assert_eq!(p.as_str(), Some("hello"));
        let mut out = [0xFFu8; 8];
        assert!(p.read_into(DataType::String, &mut out));
        assert_eq!(&out[..6], b"hello\0");
        assert!(!p.read_into(DataType::String, &mut [0u8; 5]));
        assert!(Parameter::new("bad", DataType::String, &[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn unset_and_reinsert_keep_order() {
        let mut set = ParameterSet::default();
        set.insert("a", Parameter::new("a", DataType::Int32, &1i32.to_ne_bytes()).unwrap());
        set.insert("b", Parameter::new("b", DataType::Int32, &2i32.to_ne_bytes()).unwrap());
        set.insert("a", Parameter::new("a", DataType::Int32, &3i32.to_ne_bytes()).unwrap());
        let names: Vec<_> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(set.get("a").and_then(Parameter::value::<i32>), Some(3));
        assert!(set.remove("a").is_some());
        assert!(set.remove("a").is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn handle_and_data_type_payloads() {
        let target = Handle::from_raw(42);
        let p = Parameter::new("world", DataType::World, bytemuck::bytes_of(&target)).unwrap();
        assert_eq!(p.as_handle(), Some(target));
        assert_eq!(p.value::<u32>(), None);

        let p = Parameter::new("fmt", DataType::DataType, &DataType::Float32.raw().to_ne_bytes()).unwrap();
        assert_eq!(p.as_data_type(), Some(DataType::Float32));
    }

    #[test]
    fn staged_values_are_not_committed_until_commit() {
        let params = Parameters::new();
        params.set("n", DataType::Int32, &5i32.to_ne_bytes()).unwrap();
        assert_eq!(params.committed_value::<i32>("n"), None);
        assert_eq!(params.staged().len(), 1);
        assert!(params.unset("n"));
        assert!(!params.unset("n"));
    }
}
