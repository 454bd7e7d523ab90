#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

//! Host abstraction layer for kiln
//!
//! The engine talks to the outside world through this crate only:
//! - Process execution for build tools and verification probes, with
//!   per-child environment scoping and event emission
//! - Filesystem operations used by the installer
//! - Host description (OS, architecture, OS release) for platform predicates

pub mod core;
pub mod filesystem;
pub mod host;
pub mod implementations;
pub mod process;

pub use crate::core::{Platform, PlatformContext};
pub use host::HostInfo;

/// Re-export commonly used types
pub use filesystem::FilesystemOperations;
pub use process::{CommandOutput, PlatformCommand, ProcessOperations};
