#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Source builds for kiln
//!
//! This crate turns a verified source archive into built artifacts:
//! unpacking into a private work directory, computing the phase
//! environment, and driving configure, build, test and smoke-run as
//! child processes through the platform layer.

mod archive;
mod environment;
mod stage;

pub use archive::{unpack_source, UnpackedSource};
pub use environment::BuildEnvironment;
pub use stage::{PhaseOutcome, PhaseRecord, StageReport, StageRunner, StageState};
