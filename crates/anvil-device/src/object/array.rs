use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anvil_types::{DataType, StatusCode, StatusSeverity, WaitMask};

use super::{write_value, Object, ObjectContext};
use crate::param::Parameters;
use crate::Handle;

/// Why an array could not be created.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ArrayError {
    /// Element type has no fixed size (unknown, string, ...).
    ElementType(DataType),
    /// Element count or byte size does not fit in `usize`.
    TooLarge,
}

impl std::fmt::Display for ArrayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayError::ElementType(ty) => write!(f, "{ty} cannot be an array element type"),
            ArrayError::TooLarge => f.write_str("array size overflows the address space"),
        }
    }
}

impl std::error::Error for ArrayError {}

struct ArrayState {
    /// `u64` words keep every element type naturally aligned.
    storage: Vec<u64>,
    mapped: bool,
    /// Element handles currently held with an internal reference.
    held: Vec<Handle>,
}

/// 1D/2D/3D array with runtime-owned storage.
pub struct ArrayObject {
    kind: DataType,
    element_type: DataType,
    byte_len: usize,
    params: Parameters,
    state: Mutex<ArrayState>,
}

impl ArrayObject {
    /// Zero-filled array of `dims[0] * dims[1] * dims[2]` elements.
    pub fn new(element_type: DataType, dims: [usize; 3]) -> Result<Self, ArrayError> {
        let kind = match dims {
            [_, 1, 1] => DataType::Array1D,
            [_, _, 1] => DataType::Array2D,
            _ => DataType::Array3D,
        };
        Self::with_kind(kind, element_type, dims)
    }

    pub(crate) fn with_kind(kind: DataType, element_type: DataType, dims: [usize; 3]) -> Result<Self, ArrayError> {
        let elem_size = element_type.size_of();
        if elem_size == 0 || element_type.is_variable_length() {
            return Err(ArrayError::ElementType(element_type));
        }
        let byte_len = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .and_then(|n| n.checked_mul(elem_size))
            .ok_or(ArrayError::TooLarge)?;
        let words = byte_len.div_ceil(8);
        Ok(Self {
            kind,
            element_type,
            byte_len,
            params: Parameters::new(),
            state: Mutex::new(ArrayState { storage: vec![0; words], mapped: false, held: Vec::new() }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ArrayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn element_type(&self) -> DataType {
        self.element_type
    }

    /// Total element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.byte_len.checked_div(self.element_type.size_of()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.byte_len == 0
    }

    /// Start of the element storage. The pointer stays valid until the array
    /// is destroyed; writes through it are only defined while mapped.
    pub fn map(&self, ctx: &ObjectContext<'_>) -> NonNull<u8> {
        let (ptr, was_mapped) = {
            let mut state = self.lock();
            let was_mapped = std::mem::replace(&mut state.mapped, true);
            (state.storage.as_mut_ptr().cast::<u8>(), was_mapped)
        };
        if was_mapped {
            ctx.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidOperation,
                format_args!("array {} mapped twice", ctx.this()),
            );
        }
        NonNull::new(ptr).unwrap_or(NonNull::dangling())
    }

    /// Ends a mapping. Object arrays re-sync their internal references to
    /// the non-null element handles.
    pub fn unmap(&self, ctx: &ObjectContext<'_>) {
        let (was_mapped, wanted) = {
            let mut state = self.lock();
            let was_mapped = std::mem::replace(&mut state.mapped, false);
            let wanted = self.element_type.is_object().then(|| handles_in(&state.storage, self.byte_len));
            (was_mapped, wanted)
        };
        if !was_mapped {
            ctx.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidOperation,
                format_args!("array {} unmapped without being mapped", ctx.this()),
            );
        }
        let Some(wanted) = wanted else {
            return;
        };
        let retained: Vec<Handle> = wanted.into_iter().filter(|&h| ctx.retain_internal(h)).collect();
        let released = std::mem::replace(&mut self.lock().held, retained);
        for target in released {
            ctx.release_internal(target);
        }
    }

    /// Runs `f` over the element bytes under the array lock. `f` must not
    /// call back into this array.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut state = self.lock();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(state.storage.as_mut_slice());
        f(&mut bytes[..self.byte_len])
    }

    /// Copy of the element bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let state = self.lock();
        let bytes: &[u8] = bytemuck::cast_slice(state.storage.as_slice());
        bytes[..self.byte_len].to_vec()
    }

    /// Non-null element handles, in storage order. Empty for non-object arrays.
    pub fn handles(&self) -> Vec<Handle> {
        if !self.element_type.is_object() {
            return Vec::new();
        }
        handles_in(&self.lock().storage, self.byte_len)
    }
}

fn handles_in(storage: &[u64], byte_len: usize) -> Vec<Handle> {
    let bytes: &[u8] = bytemuck::cast_slice(storage);
    bytes[..byte_len]
        .chunks_exact(size_of::<Handle>())
        .map(bytemuck::pod_read_unaligned::<Handle>)
        .filter(|h| !h.is_null())
        .collect()
}

impl Object for ArrayObject {
    fn kind(&self) -> DataType {
        self.kind
    }

    fn params(&self) -> &Parameters {
        &self.params
    }

    fn get_property(&self, name: &str, ty: DataType, out: &mut [u8], _mask: WaitMask) -> bool {
        match (name, ty) {
            ("size", DataType::UInt64) => write_value(out, self.len() as u64),
            ("elementType", DataType::DataType) => write_value(out, self.element_type.raw()),
            _ => false,
        }
    }

    fn finalize(&self, ctx: &ObjectContext<'_>) {
        self.params.release_held(ctx);
        let held = std::mem::take(&mut self.lock().held);
        for target in held {
            ctx.release_internal(target);
        }
    }

    fn as_array(&self) -> Option<&ArrayObject> {
        Some(self)
    }
}
