use std::ffi::CStr;
use std::fmt;

const PTR: usize = core::mem::size_of::<usize>();

/// Scalar representation of one component of a [`DataType`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    I8,
    U8,
    I32,
    U32,
    I64,
    U64,
    /// Normalized unsigned 8-bit fixed point (`0..=255` maps to `0.0..=1.0`).
    UFixed8,
    F32,
    F64,
    /// Pointer-sized opaque value (handles, function and user-data pointers).
    Address,
}

impl ScalarKind {
    /// Byte width of a single component.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            ScalarKind::I8 | ScalarKind::U8 | ScalarKind::UFixed8 => 1,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 => 8,
            ScalarKind::Address => PTR,
        }
    }
}

macro_rules! data_types {
    ($(
        $(#[$doc:meta])*
        $variant:ident = $raw:literal, $name:literal, $scalar:expr, $components:literal;
    )*) => {
        /// Type tag attached to every parameter, property, array element, and object.
        ///
        /// Values are stable across releases and travel through the C ABI as `u32`.
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        pub enum DataType {
            $( $(#[$doc])* $variant = $raw, )*
        }

        impl DataType {
            /// Every known tag, in declaration order.
            pub const ALL: &'static [DataType] = &[ $( DataType::$variant, )* ];

            /// Converts a raw ABI value back into a tag.
            pub const fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $( $raw => Some(DataType::$variant), )*
                    _ => None,
                }
            }

            /// Stable, upper-case name used in diagnostics and tree dumps.
            pub const fn name(self) -> &'static str {
                match self {
                    $( DataType::$variant => $name, )*
                }
            }

            /// [`name`](Self::name) as a NUL-terminated string for C callers.
            pub const fn c_name(self) -> &'static CStr {
                match self {
                    $( DataType::$variant => match CStr::from_bytes_with_nul(concat!($name, "\0").as_bytes()) {
                        Ok(name) => name,
                        Err(_) => panic!("type names never contain NUL"),
                    }, )*
                }
            }

            /// Scalar kind of each component, or `None` for [`DataType::Unknown`].
            pub const fn scalar(self) -> Option<ScalarKind> {
                match self {
                    $( DataType::$variant => $scalar, )*
                }
            }

            /// Number of scalar components.
            pub const fn components(self) -> usize {
                match self {
                    $( DataType::$variant => $components, )*
                }
            }
        }
    };
}

data_types! {
    Unknown = 0, "UNKNOWN", None, 0;

    /// A `DataType` value stored as its raw `u32`.
    DataType = 100, "DATA_TYPE", Some(ScalarKind::U32), 1;
    /// UTF-8 string. At the C ABI the value is a `const char*`.
    String = 101, "STRING", Some(ScalarKind::Address), 1;
    VoidPointer = 102, "VOID_POINTER", Some(ScalarKind::Address), 1;
    StatusCallback = 103, "STATUS_CALLBACK", Some(ScalarKind::Address), 1;
    FunctionPointer = 104, "FUNCTION_POINTER", Some(ScalarKind::Address), 1;
    ParameterList = 105, "PARAMETER_LIST", Some(ScalarKind::Address), 1;

    /// Boolean stored as a 32-bit integer (`0` = false).
    Bool = 200, "BOOL", Some(ScalarKind::U32), 1;
    Int8 = 201, "INT8", Some(ScalarKind::I8), 1;
    UInt8 = 202, "UINT8", Some(ScalarKind::U8), 1;
    Int32 = 203, "INT32", Some(ScalarKind::I32), 1;
    Int32Vec2 = 204, "INT32_VEC2", Some(ScalarKind::I32), 2;
    Int32Vec3 = 205, "INT32_VEC3", Some(ScalarKind::I32), 3;
    Int32Vec4 = 206, "INT32_VEC4", Some(ScalarKind::I32), 4;
    UInt32 = 207, "UINT32", Some(ScalarKind::U32), 1;
    UInt32Vec2 = 208, "UINT32_VEC2", Some(ScalarKind::U32), 2;
    UInt32Vec3 = 209, "UINT32_VEC3", Some(ScalarKind::U32), 3;
    UInt32Vec4 = 210, "UINT32_VEC4", Some(ScalarKind::U32), 4;
    Int64 = 211, "INT64", Some(ScalarKind::I64), 1;
    UInt64 = 212, "UINT64", Some(ScalarKind::U64), 1;

    UFixed8 = 220, "UFIXED8", Some(ScalarKind::UFixed8), 1;
    UFixed8Vec4 = 221, "UFIXED8_VEC4", Some(ScalarKind::UFixed8), 4;
    /// Same layout as [`DataType::UFixed8Vec4`], color channels sRGB encoded.
    UFixed8RgbaSrgb = 222, "UFIXED8_RGBA_SRGB", Some(ScalarKind::UFixed8), 4;

    Float32 = 230, "FLOAT32", Some(ScalarKind::F32), 1;
    Float32Vec2 = 231, "FLOAT32_VEC2", Some(ScalarKind::F32), 2;
    Float32Vec3 = 232, "FLOAT32_VEC3", Some(ScalarKind::F32), 3;
    Float32Vec4 = 233, "FLOAT32_VEC4", Some(ScalarKind::F32), 4;
    Float32Mat3 = 235, "FLOAT32_MAT3", Some(ScalarKind::F32), 9;
    /// Column-major 4x4 matrix.
    Float32Mat4 = 236, "FLOAT32_MAT4", Some(ScalarKind::F32), 16;
    Float64 = 240, "FLOAT64", Some(ScalarKind::F64), 1;

    Object = 500, "OBJECT", Some(ScalarKind::Address), 1;
    Device = 501, "DEVICE", Some(ScalarKind::Address), 1;
    Array1D = 502, "ARRAY1D", Some(ScalarKind::Address), 1;
    Array2D = 503, "ARRAY2D", Some(ScalarKind::Address), 1;
    Array3D = 504, "ARRAY3D", Some(ScalarKind::Address), 1;
    Frame = 505, "FRAME", Some(ScalarKind::Address), 1;
    Camera = 506, "CAMERA", Some(ScalarKind::Address), 1;
    Renderer = 507, "RENDERER", Some(ScalarKind::Address), 1;
    World = 508, "WORLD", Some(ScalarKind::Address), 1;
    Instance = 509, "INSTANCE", Some(ScalarKind::Address), 1;
    Group = 510, "GROUP", Some(ScalarKind::Address), 1;
    Surface = 511, "SURFACE", Some(ScalarKind::Address), 1;
    Geometry = 512, "GEOMETRY", Some(ScalarKind::Address), 1;
    Material = 513, "MATERIAL", Some(ScalarKind::Address), 1;
    Sampler = 514, "SAMPLER", Some(ScalarKind::Address), 1;
    SpatialField = 515, "SPATIAL_FIELD", Some(ScalarKind::Address), 1;
    Volume = 516, "VOLUME", Some(ScalarKind::Address), 1;
    Light = 517, "LIGHT", Some(ScalarKind::Address), 1;
}

impl DataType {
    /// Size of one value of this type in bytes.
    ///
    /// Strings report pointer size: that is what crosses the C ABI. Their
    /// stored form is the variable-length UTF-8 payload, see
    /// [`is_variable_length`](Self::is_variable_length).
    #[inline]
    pub const fn size_of(self) -> usize {
        match self.scalar() {
            Some(s) => s.width() * self.components(),
            None => 0,
        }
    }

    /// `true` for types whose stored payload is not `size_of()` bytes.
    #[inline]
    pub const fn is_variable_length(self) -> bool {
        matches!(self, DataType::String)
    }

    /// `true` for every tag that names an object (including the device).
    #[inline]
    pub const fn is_object(self) -> bool {
        (self as u32) >= 500 && (self as u32) < 600
    }

    /// `true` for the three array object tags.
    #[inline]
    pub const fn is_array(self) -> bool {
        matches!(self, DataType::Array1D | DataType::Array2D | DataType::Array3D)
    }

    /// `true` for tags that are valid frame color channel formats.
    #[inline]
    pub const fn is_color_format(self) -> bool {
        matches!(
            self,
            DataType::UFixed8Vec4 | DataType::UFixed8RgbaSrgb | DataType::Float32Vec4
        )
    }

    /// Raw ABI value of the tag.
    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Unknown
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_round_trip_for_every_tag() {
        for &ty in DataType::ALL {
            assert_eq!(DataType::from_raw(ty.raw()), Some(ty), "{ty}");
        }
        assert_eq!(DataType::from_raw(9999), None);
    }

    #[test]
    fn sizes_follow_components() {
        assert_eq!(DataType::Float32Vec3.size_of(), 12);
        assert_eq!(DataType::Float32Mat4.size_of(), 64);
        assert_eq!(DataType::UFixed8RgbaSrgb.size_of(), 4);
        assert_eq!(DataType::Bool.size_of(), 4);
        assert_eq!(DataType::Unknown.size_of(), 0);
    }

    #[test]
    fn object_tags_are_pointer_sized() {
        for &ty in DataType::ALL.iter().filter(|t| t.is_object()) {
            assert_eq!(ty.size_of(), core::mem::size_of::<usize>(), "{ty}");
        }
        assert!(DataType::Device.is_object());
        assert!(!DataType::FunctionPointer.is_object());
    }

    #[test]
    fn c_names_match_names() {
        for &ty in DataType::ALL {
            assert_eq!(ty.c_name().to_str(), Ok(ty.name()));
        }
    }

    #[test]
    fn array_and_color_classification() {
        assert!(DataType::Array2D.is_array());
        assert!(!DataType::Frame.is_array());
        assert!(DataType::Float32Vec4.is_color_format());
        assert!(!DataType::Float32.is_color_format());
    }
}
