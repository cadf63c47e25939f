use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anvil_types::{DataType, StatusCode, StatusSeverity, WaitMask};

use super::{write_value, Object, ObjectContext};
use crate::param::Parameters;

const DEFAULT_BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Mapped view of one frame channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedFrame {
    pub data: NonNull<u8>,
    pub width: u32,
    pub height: u32,
    pub pixel_type: DataType,
}

/// Owned copy of one frame channel.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixel_type: DataType,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Color,
    Depth,
}

impl Channel {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "channel.color" | "color" => Some(Channel::Color),
            "channel.depth" | "depth" => Some(Channel::Depth),
            _ => None,
        }
    }
}

#[derive(Default)]
struct FrameState {
    width: u32,
    height: u32,
    color_type: Option<DataType>,
    /// Color pixels; `u32` words keep both 8-bit and float formats aligned.
    color: Vec<u32>,
    depth: Option<Vec<f32>>,
    color_mapped: bool,
    depth_mapped: bool,
    ready: bool,
    completed: u64,
    duration: f32,
}

impl FrameState {
    fn is_mapped(&self) -> bool {
        self.color_mapped || self.depth_mapped
    }

    fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Render target with color and depth channels.
pub struct FrameObject {
    params: Parameters,
    state: Mutex<FrameState>,
}

impl FrameObject {
    pub fn new() -> Self {
        Self { params: Parameters::new(), state: Mutex::new(FrameState::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        let state = self.lock();
        (state.width, state.height)
    }

    pub fn map(&self, channel: &str, ctx: &ObjectContext<'_>) -> Option<MappedFrame> {
        let Some(which) = Channel::parse(channel) else {
            ctx.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidArgument,
                format_args!("frame {} has no channel '{channel}'", ctx.this()),
            );
            return None;
        };
        let mut state = self.lock();
        let (width, height) = (state.width, state.height);
        let mapped = match which {
            Channel::Color => {
                let pixel_type = state.color_type?;
                state.color_mapped = true;
                MappedFrame { data: dangling_or(state.color.as_mut_ptr().cast()), width, height, pixel_type }
            }
            Channel::Depth => {
                let ptr = state.depth.as_mut()?.as_mut_ptr();
                state.depth_mapped = true;
                MappedFrame { data: dangling_or(ptr.cast()), width, height, pixel_type: DataType::Float32 }
            }
        };
        Some(mapped)
    }

    pub fn unmap(&self, channel: &str) {
        let mut state = self.lock();
        match Channel::parse(channel) {
            Some(Channel::Color) => state.color_mapped = false,
            Some(Channel::Depth) => state.depth_mapped = false,
            None => {}
        }
    }

    /// Clears every channel to the renderer background (color) and
    /// `f32::INFINITY` (depth). Runs to completion on the calling thread.
    pub fn render(&self, ctx: &ObjectContext<'_>) {
        let background = self
            .params
            .committed_handle("renderer")
            .and_then(|h| ctx.resolve(h))
            .and_then(|renderer| renderer.object().params().committed_value::<[f32; 4]>("background"))
            .unwrap_or(DEFAULT_BACKGROUND);

        let start = Instant::now();
        let mut state = self.lock();
        if state.is_mapped() {
            drop(state);
            ctx.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidOperation,
                format_args!("frame {} rendered while mapped; skipped", ctx.this()),
            );
            return;
        }
        if state.pixels() == 0 {
            drop(state);
            ctx.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidOperation,
                format_args!("frame {} rendered without a committed size", ctx.this()),
            );
            return;
        }

        if let Some(ty) = state.color_type {
            let pixel = encode_pixel(ty, background);
            let stride = pixel.len();
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(state.color.as_mut_slice());
            for dst in bytes.chunks_exact_mut(stride) {
                dst.copy_from_slice(&pixel);
            }
        }
        if let Some(depth) = state.depth.as_mut() {
            depth.fill(f32::INFINITY);
        }

        state.completed += 1;
        state.ready = true;
        state.duration = start.elapsed().as_secs_f32();
    }

    /// Whether a completed, non-discarded render is available. Rendering is
    /// synchronous, so waiting never blocks.
    pub fn ready(&self, _mask: WaitMask) -> bool {
        self.lock().ready
    }

    pub fn discard(&self) {
        self.lock().ready = false;
    }

    pub fn read(&self, channel: &str) -> Option<FrameImage> {
        let state = self.lock();
        let (width, height) = (state.width, state.height);
        match Channel::parse(channel)? {
            Channel::Color => Some(FrameImage {
                width,
                height,
                pixel_type: state.color_type?,
                bytes: bytemuck::cast_slice(state.color.as_slice()).to_vec(),
            }),
            Channel::Depth => Some(FrameImage {
                width,
                height,
                pixel_type: DataType::Float32,
                bytes: bytemuck::cast_slice(state.depth.as_ref()?.as_slice()).to_vec(),
            }),
        }
    }

    fn reconfigure(&self, ctx: &ObjectContext<'_>) {
        let [width, height] = self.params.committed_value::<[u32; 2]>("size").unwrap_or([0, 0]);

        let color_type = match self.params.committed_data_type("channel.color") {
            None => Some(DataType::UFixed8RgbaSrgb),
            Some(ty) if ty.is_color_format() => Some(ty),
            Some(ty) => {
                ctx.report_status(
                    StatusSeverity::Warning,
                    StatusCode::InvalidArgument,
                    format_args!("frame {}: {ty} is not a color format; color channel disabled", ctx.this()),
                );
                None
            }
        };
        let depth = match self.params.committed_data_type("channel.depth") {
            None => false,
            Some(DataType::Float32) => true,
            Some(ty) => {
                ctx.report_status(
                    StatusSeverity::Warning,
                    StatusCode::InvalidArgument,
                    format_args!("frame {}: {ty} is not a depth format; depth channel disabled", ctx.this()),
                );
                false
            }
        };

        let mut state = self.lock();
        if state.is_mapped() {
            drop(state);
            ctx.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidOperation,
                format_args!("frame {} committed while mapped; storage unchanged", ctx.this()),
            );
            return;
        }
        let pixels = width as usize * height as usize;
        let Some(color_bytes) = pixels.checked_mul(color_type.map_or(0, DataType::size_of)) else {
            drop(state);
            ctx.report_status(
                StatusSeverity::Error,
                StatusCode::OutOfMemory,
                format_args!("frame {}: {width}x{height} is too large", ctx.this()),
            );
            return;
        };
        let color_words = color_bytes / size_of::<u32>();

        state.width = width;
        state.height = height;
        state.color_type = color_type;
        state.color = vec![0; color_words];
        state.depth = depth.then(|| vec![0.0; pixels]);
        state.ready = false;
    }
}

impl Default for FrameObject {
    fn default() -> Self {
        Self::new()
    }
}

impl Object for FrameObject {
    fn kind(&self) -> DataType {
        DataType::Frame
    }

    fn params(&self) -> &Parameters {
        &self.params
    }

    fn commit(&self, ctx: &ObjectContext<'_>) {
        self.params.commit(ctx);
        self.reconfigure(ctx);
    }

    fn get_property(&self, name: &str, ty: DataType, out: &mut [u8], _mask: WaitMask) -> bool {
        let state = self.lock();
        match (name, ty) {
            ("duration", DataType::Float32) => write_value(out, state.duration),
            ("frameCompleted", DataType::UInt64) => write_value(out, state.completed),
            _ => false,
        }
    }

    fn as_frame(&self) -> Option<&FrameObject> {
        Some(self)
    }
}

fn dangling_or(ptr: *mut u8) -> NonNull<u8> {
    NonNull::new(ptr).unwrap_or(NonNull::dangling())
}

/// One pixel of `color` in format `ty`.
fn encode_pixel(ty: DataType, color: [f32; 4]) -> Vec<u8> {
    let unorm = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    match ty {
        DataType::Float32Vec4 => bytemuck::bytes_of(&color).to_vec(),
        DataType::UFixed8RgbaSrgb => {
            let [r, g, b, a] = color;
            vec![unorm(to_srgb(r)), unorm(to_srgb(g)), unorm(to_srgb(b)), unorm(a)]
        }
        _ => color.iter().map(|&c| unorm(c)).collect(),
    }
}

fn to_srgb(linear: f32) -> f32 {
    let c = linear.clamp(0.0, 1.0);
    if c <= 0.003_130_8 { c * 12.92 } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 }
}
