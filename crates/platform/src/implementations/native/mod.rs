//! Portable implementation on top of tokio

pub mod filesystem;
pub mod process;
