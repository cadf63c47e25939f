//! Small demo scene: one triangle lit by a directional light.

use anyhow::{Context, Result, ensure};

use anvil_device::{DataType, Device, Handle, WaitMask};

/// Handles the demo keeps after building the scene.
#[derive(Debug, Clone, Copy)]
pub struct Scene {
    pub frame: Handle,
    pub world: Handle,
}

fn checked(handle: Handle, what: &str) -> Result<Handle> {
    ensure!(!handle.is_null(), "device refused to create {what}");
    Ok(handle)
}

/// One-dimensional object array holding `items`.
fn object_list(device: &Device, element_type: DataType, items: &[Handle]) -> Result<Handle> {
    let array = checked(device.new_array1d(element_type, items.len()), "object list")?;
    device
        .with_mapped_array::<Handle, _>(array, |slots| slots.copy_from_slice(items))
        .with_context(|| format!("array {array} cannot be mapped as handles"))?;
    // The array holds its own references now.
    for &item in items {
        device.release(item);
    }
    Ok(array)
}

/// Builds the scene, commits every object, and releases the client's
/// references on everything except the frame and world.
pub fn build(device: &Device, size: [u32; 2], background: [f32; 4]) -> Result<Scene> {
    let positions = checked(device.new_array1d(DataType::Float32Vec3, 3), "vertex positions")?;
    device
        .with_mapped_array::<[f32; 3], _>(positions, |v| {
            v.copy_from_slice(&[[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0]]);
        })
        .context("vertex positions are not FLOAT32_VEC3")?;

    let geometry = checked(device.new_object(DataType::Geometry, Some("triangle")), "geometry")?;
    device.set_object(geometry, "vertex.position", DataType::Array1D, positions);
    device.commit_parameters(geometry);

    let material = checked(device.new_object(DataType::Material, Some("matte")), "material")?;
    device.set_value(material, "color", [0.8f32, 0.1, 0.1]);
    device.commit_parameters(material);

    let surface = checked(device.new_object(DataType::Surface, None), "surface")?;
    device.set_object(surface, "geometry", DataType::Geometry, geometry);
    device.set_object(surface, "material", DataType::Material, material);
    device.commit_parameters(surface);

    let surfaces = object_list(device, DataType::Surface, &[surface])?;

    let group = checked(device.new_object(DataType::Group, None), "group")?;
    device.set_object(group, "surface", DataType::Array1D, surfaces);
    device.commit_parameters(group);

    let instance = checked(device.new_object(DataType::Instance, Some("transform")), "instance")?;
    device.set_object(instance, "group", DataType::Group, group);
    device.commit_parameters(instance);

    let instances = object_list(device, DataType::Instance, &[instance])?;

    let light = checked(device.new_object(DataType::Light, Some("directional")), "light")?;
    device.set_value(light, "direction", [0.0f32, -1.0, -1.0]);
    device.commit_parameters(light);

    let lights = object_list(device, DataType::Light, &[light])?;

    let world = checked(device.new_object(DataType::World, None), "world")?;
    device.set_object(world, "instance", DataType::Array1D, instances);
    device.set_object(world, "light", DataType::Array1D, lights);
    device.commit_parameters(world);

    let camera = checked(device.new_object(DataType::Camera, Some("perspective")), "camera")?;
    device.set_value(camera, "position", [0.0f32, 0.0, 3.0]);
    device.set_value(camera, "aspect", size[0] as f32 / size[1].max(1) as f32);
    device.commit_parameters(camera);

    let renderer = checked(device.new_object(DataType::Renderer, Some("default")), "renderer")?;
    device.set_value(renderer, "background", background);
    device.commit_parameters(renderer);

    let frame = checked(device.new_frame(), "frame")?;
    device.set_value(frame, "size", size);
    device.set_data_type(frame, "channel.color", DataType::UFixed8RgbaSrgb);
    device.set_data_type(frame, "channel.depth", DataType::Float32);
    device.set_object(frame, "world", DataType::World, world);
    device.set_object(frame, "camera", DataType::Camera, camera);
    device.set_object(frame, "renderer", DataType::Renderer, renderer);
    device.commit_parameters(frame);

    // The graph now keeps everything alive through internal references.
    for handle in [positions, geometry, material, surfaces, group, instances, lights, camera, renderer] {
        device.release(handle);
    }

    Ok(Scene { frame, world })
}

/// Renders once and waits for completion.
pub fn render(device: &Device, scene: Scene) -> Result<()> {
    device.render_frame(scene.frame);
    ensure!(device.frame_ready(scene.frame, WaitMask::Wait), "frame {} did not complete", scene.frame);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_device::DeviceConfig;

    #[test]
    fn scene_survives_client_releases() {
        let device = Device::new(DeviceConfig::default().without_sink());
        let scene = build(&device, [8, 4], [0.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(device.live_objects().len(), 14);

        render(&device, scene).unwrap();
        let color = device.read_frame(scene.frame, "color").unwrap();
        assert_eq!((color.width, color.height), (8, 4));
        assert!(color.bytes.chunks_exact(4).all(|px| px == [0, 0, 255, 255]));

        let tree = crate::tree_string(&device, scene.frame);
        assert!(tree.contains("      GEOMETRY triangle"));
        assert!(tree.starts_with("FRAME #14\n"));

        device.release(scene.frame);
        device.release(scene.world);
        assert!(device.live_objects().is_empty());
    }
}
