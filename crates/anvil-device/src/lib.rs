//! **anvil** device runtime.
//!
//! Backs a C-ABI scene API with opaque integer handles. Each handle resolves to
//! a polymorphic object that carries typed parameters and two reference
//! counts: public (held by API clients) and internal (held by other objects).
//! An object is destroyed when both reach zero, never earlier, so a handle a
//! caller still holds is never invalidated.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`device`] | `Device` entry points, `DeviceConfig`, debug factory |
//! | [`library`] | `Library`: device creation and introspection |
//! | [`object`] | `Object` trait, `ObjectCell`, array and frame objects |
//! | [`param`] | typed parameter storage |
//! | [`refcount`] | dual reference counts |
//! | [`status`] | status channel, sinks, `report!` |
//! | [`ffi`] | `extern "C"` entry points |
//! | [`logging`] | `env_logger` setup |
//!
//! # Quick start
//!
//! ```rust
//! use anvil_device::{DataType, Library, WaitMask};
//!
//! let library = Library::new("tree");
//! let device = library.new_device("default").unwrap();
//!
//! let frame = device.new_frame();
//! device.set_value(frame, "size", [64u32, 32]);
//! device.commit_parameters(frame);
//! device.render_frame(frame);
//! assert!(device.frame_ready(frame, WaitMask::Wait));
//!
//! let color = device.read_frame(frame, "color").unwrap();
//! assert_eq!(color.pixel_type, DataType::UFixed8RgbaSrgb);
//! assert_eq!(color.bytes.len(), 64 * 32 * 4);
//! ```

pub mod device;
pub mod ffi;
pub mod library;
pub mod logging;
pub mod object;
pub mod param;
pub mod refcount;
pub mod status;

mod handle;
mod table;

pub use anvil_types::{DataType, Registry, StatusCode, StatusSeverity, WaitMask};

pub use device::{Device, DeviceConfig};
pub use handle::Handle;
pub use library::Library;
pub use object::{FrameImage, MappedFrame, Object, ObjectCell};
pub use param::{ParamValue, Parameter, ParameterSet};
pub use refcount::{RefCountError, RefCounts, Transition};
pub use status::{CallbackSink, LogSink, StatusReport, StatusSink};
