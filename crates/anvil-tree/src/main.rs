use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use anvil_device::logging::{LoggingConfig, init_logging};
use anvil_device::{DataType, Device, Handle, Library};
use anvil_tree::scene;

const SIZE: [u32; 2] = [320, 240];
const BACKGROUND: [f32; 4] = [0.1, 0.2, 0.4, 1.0];

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let library = Library::new("tree");
    let device = library.new_device("default").context("creating the tree device")?;
    log::info!("using device '{}'", device.name());

    let scene = scene::build(&device, SIZE, BACKGROUND)?;
    scene::render(&device, scene)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    anvil_tree::print_tree(&device, scene.frame, &mut out)?;
    out.flush()?;

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        save_color(&device, scene.frame, &path)?;
        log::info!("wrote {}", path.display());
    }

    device.release(scene.frame);
    device.release(scene.world);
    device.release(Handle::DEVICE);
    Ok(())
}

fn save_color(device: &Device, frame: Handle, path: &std::path::Path) -> Result<()> {
    let color = device.read_frame(frame, "channel.color").context("frame has no color channel")?;
    if !matches!(color.pixel_type, DataType::UFixed8RgbaSrgb | DataType::UFixed8Vec4) {
        bail!("cannot save {} pixels as PNG", color.pixel_type);
    }
    let image = image::RgbaImage::from_raw(color.width, color.height, color.bytes)
        .context("color channel size does not match its dimensions")?;
    image.save(path).with_context(|| format!("saving {}", path.display()))?;
    Ok(())
}
