//! Static metadata about the object types a device implements.
//!
//! The registry is an ordinary value: the library that owns it constructs it
//! once and passes it by reference to every device it creates. Nothing here is
//! global.

use crate::DataType;

/// Metadata about one parameter of an object subtype.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub ty: DataType,
    pub required: bool,
    /// Default value encoded as `ty.size_of()` native-endian bytes.
    pub default: Option<Vec<u8>>,
    pub description: String,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.default = Some(bytes.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

/// Metadata about one object type/subtype pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectInfo {
    pub description: String,
    pub parameters: Vec<ParamInfo>,
}

impl ObjectInfo {
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into(), parameters: Vec::new() }
    }

    pub fn param(mut self, info: ParamInfo) -> Self {
        self.parameters.push(info);
        self
    }

    pub fn parameter(&self, name: &str, ty: DataType) -> Option<&ParamInfo> {
        self.parameters.iter().find(|p| p.name == name && p.ty == ty)
    }
}

/// Entry of a `"parameter"` list: name and declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamListEntry {
    pub name: String,
    pub ty: DataType,
}

/// Result of an info query. The variant always agrees with the requested
/// info type; a query with a mismatched type returns `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue<'a> {
    String(&'a str),
    Bool(bool),
    /// Raw bytes of a value of the given type (parameter defaults).
    Value { ty: DataType, bytes: &'a [u8] },
    ParameterList(Vec<ParamListEntry>),
}

impl InfoValue<'_> {
    pub fn data_type(&self) -> DataType {
        match self {
            InfoValue::String(_) => DataType::String,
            InfoValue::Bool(_) => DataType::Bool,
            InfoValue::Value { ty, .. } => *ty,
            InfoValue::ParameterList(_) => DataType::ParameterList,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    ty: DataType,
    subtype: Option<String>,
    info: ObjectInfo,
}

/// Introspection table: object type → subtypes → [`ObjectInfo`].
///
/// Subtypes enumerate in registration order. Types without subtypes (world,
/// frame, arrays, ...) are registered with `subtype = None` and never show up
/// in [`object_subtypes`](Self::object_subtypes).
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the info for `ty`/`subtype`.
    pub fn object(mut self, ty: DataType, subtype: Option<&str>, info: ObjectInfo) -> Self {
        let subtype = subtype.map(str::to_owned);
        match self.entries.iter_mut().find(|e| e.ty == ty && e.subtype == subtype) {
            Some(existing) => existing.info = info,
            None => self.entries.push(Entry { ty, subtype, info }),
        }
        self
    }

    /// Subtype names registered for `ty`.
    pub fn object_subtypes(&self, ty: DataType) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.ty == ty)
            .filter_map(|e| e.subtype.as_deref())
            .collect()
    }

    /// `true` if `ty`/`subtype` is registered.
    pub fn is_supported(&self, ty: DataType, subtype: Option<&str>) -> bool {
        self.lookup(ty, subtype).is_some()
    }

    pub fn lookup(&self, ty: DataType, subtype: Option<&str>) -> Option<&ObjectInfo> {
        self.entries
            .iter()
            .find(|e| e.ty == ty && e.subtype.as_deref() == subtype)
            .map(|e| &e.info)
    }

    /// Named, typed metadata about an object type/subtype.
    ///
    /// Known names: `"description"` (STRING), `"parameter"` (PARAMETER_LIST).
    pub fn object_info(
        &self,
        ty: DataType,
        subtype: Option<&str>,
        info_name: &str,
        info_type: DataType,
    ) -> Option<InfoValue<'_>> {
        let info = self.lookup(ty, subtype)?;
        let value = match info_name {
            "description" => InfoValue::String(&info.description),
            "parameter" => InfoValue::ParameterList(
                info.parameters
                    .iter()
                    .map(|p| ParamListEntry { name: p.name.clone(), ty: p.ty })
                    .collect(),
            ),
            _ => return None,
        };
        (value.data_type() == info_type).then_some(value)
    }

    /// Named, typed metadata about one parameter of an object type/subtype.
    ///
    /// Known names: `"description"` (STRING), `"required"` (BOOL), `"default"`
    /// (the parameter's own type, only when a default exists).
    pub fn parameter_info(
        &self,
        ty: DataType,
        subtype: Option<&str>,
        param_name: &str,
        param_type: DataType,
        info_name: &str,
        info_type: DataType,
    ) -> Option<InfoValue<'_>> {
        let param = self.lookup(ty, subtype)?.parameter(param_name, param_type)?;
        let value = match info_name {
            "description" => InfoValue::String(&param.description),
            "required" => InfoValue::Bool(param.required),
            "default" => InfoValue::Value { ty: param.ty, bytes: param.default.as_deref()? },
            _ => return None,
        };
        (value.data_type() == info_type).then_some(value)
    }

    /// Metadata for every object this runtime implements.
    pub fn builtin() -> Self {
        use DataType as T;

        let eye = || ParamInfo::new("position", T::Float32Vec3).with_default(f32s(&[0.0, 0.0, 0.0]));
        let dir = || ParamInfo::new("direction", T::Float32Vec3).with_default(f32s(&[0.0, 0.0, -1.0]));
        let up = || ParamInfo::new("up", T::Float32Vec3).with_default(f32s(&[0.0, 1.0, 0.0]));
        let aspect = || ParamInfo::new("aspect", T::Float32).with_default(f32s(&[1.0]));

        Registry::new()
            .object(
                T::Device,
                None,
                ObjectInfo::new("runtime device")
                    .param(
                        ParamInfo::new("statusCallback", T::StatusCallback)
                            .describe("callback receiving status messages"),
                    )
                    .param(
                        ParamInfo::new("statusCallbackUserData", T::VoidPointer)
                            .describe("opaque pointer passed to the status callback"),
                    ),
            )
            .object(
                T::Camera,
                Some("perspective"),
                ObjectInfo::new("pinhole perspective camera")
                    .param(eye())
                    .param(dir())
                    .param(up())
                    .param(
                        ParamInfo::new("fovy", T::Float32)
                            .with_default(f32s(&[std::f32::consts::FRAC_PI_3]))
                            .describe("vertical field of view in radians"),
                    )
                    .param(aspect()),
            )
            .object(
                T::Camera,
                Some("orthographic"),
                ObjectInfo::new("orthographic camera")
                    .param(eye())
                    .param(dir())
                    .param(up())
                    .param(ParamInfo::new("height", T::Float32).with_default(f32s(&[1.0])))
                    .param(aspect()),
            )
            .object(
                T::Renderer,
                Some("default"),
                ObjectInfo::new("clear-color renderer").param(
                    ParamInfo::new("background", T::Float32Vec4)
                        .with_default(f32s(&[0.0, 0.0, 0.0, 1.0]))
                        .describe("color written to every pixel"),
                ),
            )
            .object(
                T::World,
                None,
                ObjectInfo::new("top level scene container")
                    .param(ParamInfo::new("instance", T::Array1D))
                    .param(ParamInfo::new("surface", T::Array1D))
                    .param(ParamInfo::new("light", T::Array1D)),
            )
            .object(
                T::Instance,
                Some("transform"),
                ObjectInfo::new("transformed group instance")
                    .param(ParamInfo::new("group", T::Group).required())
                    .param(ParamInfo::new("transform", T::Float32Mat4).with_default(f32s(&IDENTITY))),
            )
            .object(
                T::Group,
                None,
                ObjectInfo::new("collection of surfaces, volumes and lights")
                    .param(ParamInfo::new("surface", T::Array1D))
                    .param(ParamInfo::new("volume", T::Array1D))
                    .param(ParamInfo::new("light", T::Array1D)),
            )
            .object(
                T::Surface,
                None,
                ObjectInfo::new("geometry bound to a material")
                    .param(ParamInfo::new("geometry", T::Geometry).required())
                    .param(ParamInfo::new("material", T::Material).required()),
            )
            .object(
                T::Geometry,
                Some("triangle"),
                ObjectInfo::new("indexed or soup triangle mesh")
                    .param(ParamInfo::new("vertex.position", T::Array1D).required())
                    .param(ParamInfo::new("primitive.index", T::Array1D)),
            )
            .object(
                T::Geometry,
                Some("sphere"),
                ObjectInfo::new("sphere per vertex")
                    .param(ParamInfo::new("vertex.position", T::Array1D).required())
                    .param(ParamInfo::new("radius", T::Float32).with_default(f32s(&[0.01]))),
            )
            .object(
                T::Material,
                Some("matte"),
                ObjectInfo::new("lambertian material")
                    .param(ParamInfo::new("color", T::Float32Vec3).with_default(f32s(&[0.8, 0.8, 0.8])))
                    .param(ParamInfo::new("opacity", T::Float32).with_default(f32s(&[1.0]))),
            )
            .object(
                T::Light,
                Some("directional"),
                ObjectInfo::new("light at infinity")
                    .param(ParamInfo::new("color", T::Float32Vec3).with_default(f32s(&[1.0, 1.0, 1.0])))
                    .param(dir())
                    .param(ParamInfo::new("irradiance", T::Float32).with_default(f32s(&[1.0]))),
            )
            .object(
                T::Sampler,
                Some("image2D"),
                ObjectInfo::new("2D image lookup")
                    .param(ParamInfo::new("image", T::Array2D).required()),
            )
            .object(
                T::Frame,
                None,
                ObjectInfo::new("render target")
                    .param(ParamInfo::new("size", T::UInt32Vec2).required())
                    .param(
                        ParamInfo::new("channel.color", T::DataType)
                            .with_default(T::UFixed8RgbaSrgb.raw().to_ne_bytes()),
                    )
                    .param(ParamInfo::new("channel.depth", T::DataType))
                    .param(ParamInfo::new("renderer", T::Renderer))
                    .param(ParamInfo::new("camera", T::Camera))
                    .param(ParamInfo::new("world", T::World).required()),
            )
            .object(T::Array1D, None, ObjectInfo::new("one dimensional array"))
            .object(T::Array2D, None, ObjectInfo::new("two dimensional array"))
            .object(T::Array3D, None, ObjectInfo::new("three dimensional array"))
    }
}

const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

fn f32s(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtypes_enumerate_in_registration_order() {
        let reg = Registry::builtin();
        assert_eq!(reg.object_subtypes(DataType::Camera), ["perspective", "orthographic"]);
        assert!(reg.object_subtypes(DataType::World).is_empty());
        assert!(reg.object_subtypes(DataType::Volume).is_empty());
    }

    #[test]
    fn object_info_checks_the_requested_type() {
        let reg = Registry::builtin();
        let desc = reg.object_info(DataType::Renderer, Some("default"), "description", DataType::String);
        assert_eq!(desc, Some(InfoValue::String("clear-color renderer")));
        assert!(reg
            .object_info(DataType::Renderer, Some("default"), "description", DataType::Bool)
            .is_none());
        assert!(reg.object_info(DataType::Renderer, Some("nope"), "description", DataType::String).is_none());
    }

    #[test]
    fn parameter_list_names_every_parameter() {
        let reg = Registry::builtin();
        let Some(InfoValue::ParameterList(list)) =
            reg.object_info(DataType::Surface, None, "parameter", DataType::ParameterList)
        else {
            panic!("surface has a parameter list");
        };
        let names: Vec<_> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["geometry", "material"]);
    }

    #[test]
    fn parameter_defaults_and_required_flags() {
        let reg = Registry::builtin();
        let required = reg.parameter_info(
            DataType::Frame, None, "world", DataType::World, "required", DataType::Bool,
        );
        assert_eq!(required, Some(InfoValue::Bool(true)));

        let default = reg.parameter_info(
            DataType::Renderer, Some("default"), "background", DataType::Float32Vec4,
            "default", DataType::Float32Vec4,
        );
        let Some(InfoValue::Value { bytes, .. }) = default else { panic!("background has a default") };
        assert_eq!(bytes, f32s(&[0.0, 0.0, 0.0, 1.0]).as_slice());

        // Declared with another type.
        assert!(reg
            .parameter_info(DataType::Renderer, Some("default"), "background", DataType::Float32Vec3,
                "default", DataType::Float32Vec3)
            .is_none());
    }

    #[test]
    fn registering_twice_replaces() {
        let reg = Registry::new()
            .object(DataType::Light, Some("point"), ObjectInfo::new("a"))
            .object(DataType::Light, Some("point"), ObjectInfo::new("b"));
        assert_eq!(reg.object_subtypes(DataType::Light), ["point"]);
        assert_eq!(reg.lookup(DataType::Light, Some("point")).map(|i| i.description.as_str()), Some("b"));
    }
}
