//! **anvil-tree**: dumps a live anvil object graph as an indented tree.
//!
//! Every object prints a header line (`TYPE subtype handle`) followed by one
//! `- name TYPE value` line per staged parameter. Object-typed parameters and
//! arrays of objects are descended into, three spaces deeper per level.
//!
//! ```rust
//! use anvil_device::{DataType, Device, DeviceConfig};
//!
//! let device = Device::new(DeviceConfig::default().without_sink());
//! let light = device.new_object(DataType::Light, Some("directional"));
//! device.set_value(light, "irradiance", 2.5f32);
//!
//! let tree = anvil_tree::tree_string(&device, light);
//! assert_eq!(tree, "LIGHT directional #1\n- irradiance FLOAT32 2.5\n");
//! ```

pub mod scene;

use std::fmt;
use std::io::{self, Write};

use anvil_device::{Device, Handle, Parameter};
use anvil_types::{DataType, ScalarKind};

const INDENT: &str = "   ";

/// Writes the tree rooted at `root` to `out`.
///
/// Shared objects are printed once per path that reaches them; an object
/// that is already an ancestor on the current path is marked `(cycle)` and
/// not descended into again.
pub fn print_tree(device: &Device, root: Handle, out: &mut impl Write) -> io::Result<()> {
    write!(out, "{}", Tree { device, root })
}

/// [`print_tree`] into a `String`.
pub fn tree_string(device: &Device, root: Handle) -> String {
    Tree { device, root }.to_string()
}

/// Displays as the tree rooted at `root`.
#[derive(Clone, Copy)]
pub struct Tree<'a> {
    pub device: &'a Device,
    pub root: Handle,
}

impl fmt::Display for Tree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TreePrinter { device: self.device, path: Vec::new(), out: f }.visit(self.root, 0)
    }
}

struct TreePrinter<'a, 'f> {
    device: &'a Device,
    /// Handles currently being printed, outermost first.
    path: Vec<Handle>,
    out: &'a mut fmt::Formatter<'f>,
}

impl TreePrinter<'_, '_> {
    fn indent(&mut self, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            self.out.write_str(INDENT)?;
        }
        Ok(())
    }

    fn visit(&mut self, handle: Handle, depth: usize) -> fmt::Result {
        self.indent(depth)?;
        let Some(cell) = self.device.resolve(handle) else {
            log::debug!("tree reaches released object {handle}");
            return writeln!(self.out, "{handle} (released)");
        };

        write!(self.out, "{} ", cell.kind())?;
        if let Some(subtype) = cell.subtype() {
            write!(self.out, "{subtype} ")?;
        }
        if self.path.contains(&handle) {
            return writeln!(self.out, "{handle} (cycle)");
        }
        writeln!(self.out, "{handle}")?;

        self.path.push(handle);
        for (name, param) in cell.object().params().staged().iter() {
            self.indent(depth)?;
            writeln!(self.out, "- {name} {} {}", param.ty(), ParamDisplay(param))?;
            if let Some(child) = param.as_handle().filter(|h| !h.is_null()) {
                self.visit(child, depth + 1)?;
            }
        }
        if let Some(array) = cell.object().as_array() {
            for element in array.handles() {
                self.visit(element, depth + 1)?;
            }
        }
        self.path.pop();
        Ok(())
    }
}

/// Value part of a parameter line: scalars bare, vectors as `(a, b, c)`.
struct ParamDisplay<'a>(&'a Parameter);

impl fmt::Display for ParamDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let param = self.0;
        let ty = param.ty();
        if let Some(text) = param.as_str() {
            return f.write_str(text);
        }
        if let Some(handle) = param.as_handle() {
            return write!(f, "{handle}");
        }
        if ty == DataType::DataType {
            return match param.as_data_type() {
                Some(value) => write!(f, "{value}"),
                None => f.write_str("?"),
            };
        }
        let Some(scalar) = ty.scalar() else {
            return f.write_str("nil");
        };

        let components: Vec<String> = param
            .bytes()
            .chunks_exact(scalar.width())
            .map(|c| format_component(ty, scalar, c))
            .collect();
        match components.as_slice() {
            [one] => f.write_str(one),
            many => write!(f, "({})", many.join(", ")),
        }
    }
}

fn format_component(ty: DataType, scalar: ScalarKind, bytes: &[u8]) -> String {
    fn ne<const N: usize>(bytes: &[u8]) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        out
    }

    match scalar {
        ScalarKind::U32 if ty == DataType::Bool => (u32::from_ne_bytes(ne(bytes)) != 0).to_string(),
        ScalarKind::I8 => i8::from_ne_bytes(ne(bytes)).to_string(),
        ScalarKind::U8 | ScalarKind::UFixed8 => bytes[0].to_string(),
        ScalarKind::I32 => i32::from_ne_bytes(ne(bytes)).to_string(),
        ScalarKind::U32 => u32::from_ne_bytes(ne(bytes)).to_string(),
        ScalarKind::I64 => i64::from_ne_bytes(ne(bytes)).to_string(),
        ScalarKind::U64 => u64::from_ne_bytes(ne(bytes)).to_string(),
        ScalarKind::F32 => f32::from_ne_bytes(ne(bytes)).to_string(),
        ScalarKind::F64 => f64::from_ne_bytes(ne(bytes)).to_string(),
        ScalarKind::Address => format!("{:#x}", usize::from_ne_bytes(ne(bytes))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_device::DeviceConfig;

    fn quiet() -> Device {
        Device::new(DeviceConfig::default().without_sink())
    }

    #[test]
    fn nested_objects_indent_by_three() {
        let device = quiet();
        let sphere = device.new_object(DataType::Geometry, Some("sphere"));
        let matte = device.new_object(DataType::Material, Some("matte"));
        let surface = device.new_object(DataType::Surface, None);
        device.set_value(sphere, "radius", 0.5f32);
        device.set_value(matte, "color", [1.0f32, 0.5, 0.0]);
        device.set_object(surface, "geometry", DataType::Geometry, sphere);
        device.set_object(surface, "material", DataType::Material, matte);

        let expected = "\
SURFACE #3
- geometry GEOMETRY #1
   GEOMETRY sphere #1
   - radius FLOAT32 0.5
- material MATERIAL #2
   MATERIAL matte #2
   - color FLOAT32_VEC3 (1, 0.5, 0)
";
        assert_eq!(tree_string(&device, surface), expected);
    }

    #[test]
    fn object_arrays_list_their_elements() {
        let device = quiet();
        let a = device.new_object(DataType::Light, Some("directional"));
        let b = device.new_object(DataType::Light, Some("directional"));
        let lights = device.new_array1d(DataType::Light, 2);
        device.with_mapped_array::<Handle, _>(lights, |items| items.copy_from_slice(&[a, b]));
        let world = device.new_object(DataType::World, None);
        device.set_object(world, "light", DataType::Array1D, lights);

        let expected = "\
WORLD #4
- light ARRAY1D #3
   ARRAY1D #3
      LIGHT directional #1
      LIGHT directional #2
";
        assert_eq!(tree_string(&device, world), expected);
    }

    #[test]
    fn cycles_are_cut() {
        let device = quiet();
        let a = device.new_object(DataType::Group, None);
        let b = device.new_object(DataType::Group, None);
        device.set_object(a, "next", DataType::Group, b);
        device.set_object(b, "next", DataType::Group, a);

        let expected = "\
GROUP #1
- next GROUP #2
   GROUP #2
   - next GROUP #1
      GROUP #1 (cycle)
";
        assert_eq!(tree_string(&device, a), expected);
    }

    #[test]
    fn shared_objects_print_on_every_path() {
        let device = quiet();
        let geometry = device.new_object(DataType::Geometry, Some("triangle"));
        let left = device.new_object(DataType::Surface, None);
        let right = device.new_object(DataType::Surface, None);
        let group = device.new_object(DataType::Group, None);
        for surface in [left, right] {
            device.set_object(surface, "geometry", DataType::Geometry, geometry);
        }
        device.set_object(group, "left", DataType::Surface, left);
        device.set_object(group, "right", DataType::Surface, right);

        let tree = tree_string(&device, group);
        assert_eq!(tree.matches("GEOMETRY triangle #1").count(), 2);
        assert!(!tree.contains("(cycle)"));
    }

    #[test]
    fn released_referents_and_null_handles() {
        let device = quiet();
        let geometry = device.new_object(DataType::Geometry, Some("sphere"));
        let surface = device.new_object(DataType::Surface, None);
        device.set_object(surface, "geometry", DataType::Geometry, geometry);
        device.set_object(surface, "material", DataType::Material, Handle::NULL);
        device.release(geometry);

        let expected = "\
SURFACE #2
- geometry GEOMETRY #1
   #1 (released)
- material MATERIAL null
";
        assert_eq!(tree_string(&device, surface), expected);
    }

    #[test]
    fn scalar_formatting() {
        let device = quiet();
        let frame = device.new_frame();
        device.set_value(frame, "size", [640u32, 480]);
        device.set_data_type(frame, "channel.color", DataType::UFixed8Vec4);
        device.set_bool(frame, "accumulate", true);
        device.set_string(frame, "label", "main view");
        device.set_value(frame, "seed", -3i64);

        let tree = tree_string(&device, frame);
        let lines: Vec<_> = tree.lines().collect();
        assert_eq!(
            lines,
            [
                "FRAME #1",
                "- size UINT32_VEC2 (640, 480)",
                "- channel.color DATA_TYPE UFIXED8_VEC4",
                "- accumulate BOOL true",
                "- label STRING main view",
                "- seed INT64 -3",
            ]
        );
    }

    #[test]
    fn print_tree_writes_to_any_sink() {
        let device = quiet();
        let camera = device.new_object(DataType::Camera, Some("perspective"));
        let mut out = Vec::new();
        print_tree(&device, camera, &mut out).unwrap();
        assert_eq!(out, b"CAMERA perspective #1\n");
    }

    #[test]
    fn sink_errors_reach_the_caller() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let device = quiet();
        let group = device.new_object(DataType::Group, None);
        let err = print_tree(&device, group, &mut Full).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
    }

    #[test]
    fn tree_displays_inline() {
        let device = quiet();
        let light = device.new_object(DataType::Light, Some("point"));
        let line = format!("[{}]", Tree { device: &device, root: light });
        assert_eq!(line, "[LIGHT point #1\n]");
    }
}
