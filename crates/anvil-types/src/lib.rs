//! Shared vocabulary of the **anvil** device runtime.
//!
//! This crate is intentionally dependency-free so loader and query glue can
//! inspect data types and object metadata without linking the runtime.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`data_type`] | `DataType`, `ScalarKind` |
//! | [`status`] | `StatusSeverity`, `StatusCode`, `WaitMask` |
//! | [`registry`] | `Registry`, `ObjectInfo`, `ParamInfo`, `InfoValue` |
//!
//! # Quick start
//!
//! ```rust
//! use anvil_types::{DataType, Registry};
//!
//! let registry = Registry::builtin();
//! assert!(registry.object_subtypes(DataType::Camera).contains(&"perspective"));
//! assert_eq!(DataType::Float32Vec3.size_of(), 12);
//! ```

pub mod data_type;
pub mod registry;
pub mod status;

pub use data_type::{DataType, ScalarKind};
pub use registry::{InfoValue, ObjectInfo, ParamInfo, ParamListEntry, Registry};
pub use status::{StatusCode, StatusSeverity, WaitMask};
