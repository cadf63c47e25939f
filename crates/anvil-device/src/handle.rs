use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Opaque object handle issued by one runtime instance.
///
/// The value is an index into that runtime's handle table and has no meaning
/// anywhere else. [`Handle::NULL`] never resolves; [`Handle::DEVICE`] always
/// names the device object of the instance it is passed to.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    /// Reserved null handle (table slot 0 stays empty forever).
    pub const NULL: Handle = Handle(0);

    /// Reserved alias of the device object, resolved without a table lookup.
    pub const DEVICE: Handle = Handle(usize::MAX);

    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_device(self) -> bool {
        self.0 == usize::MAX
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Handle::NULL => f.write_str("null"),
            Handle::DEVICE => f.write_str("device"),
            Handle(i) => write!(f, "#{i}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_values() {
        assert!(Handle::NULL.is_null());
        assert!(Handle::DEVICE.is_device());
        assert!(!Handle::from_raw(3).is_null());
        assert_eq!(Handle::default(), Handle::NULL);
    }

    #[test]
    fn display() {
        assert_eq!(Handle::from_raw(7).to_string(), "#7");
        assert_eq!(Handle::DEVICE.to_string(), "device");
        assert_eq!(Handle::NULL.to_string(), "null");
    }

    #[test]
    fn bytes_are_the_raw_value() {
        let h = Handle::from_raw(0x1234);
        assert_eq!(bytemuck::bytes_of(&h), 0x1234usize.to_ne_bytes());
    }
}
