#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Installation for kiln
//!
//! This crate places a finished build into the install root:
//! - Conditional install actions with a conflict-checking dry pass
//! - A journaled transaction that can roll the root back to where it was
//! - Post-install verification probes
//! - Durable manifests of what was installed, used for uninstall and checks

mod installer;
mod manifest;
mod transaction;
mod uninstall;
mod verify;

pub use installer::{ConditionalInstaller, InstallOutcome, Placement, PlacementPlan, SkippedAction};
pub use manifest::{EntryKind, InstalledManifest, IntegrityReport, ManifestEntry, ManifestStore};
pub use transaction::{InstallTransaction, RollbackSummary};
pub use uninstall::{UninstallReport, Uninstaller};
pub use verify::VerificationHarness;
