#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for kiln
//!
//! Given a root recipe, the resolver asks the host which declared
//! dependencies it already satisfies and looks the rest up in a recipe
//! catalog, producing an [`InstallPlan`] in which every dependency comes
//! before the recipes that need it. Resolution is deterministic: siblings
//! keep their declaration order.

mod capability;
mod plan;
mod resolver;

pub use capability::{
    CapabilityQuery, CompositeCapabilities, InstalledPackage, ManifestCapabilities,
    PathCapabilities, StaticCapabilities,
};
pub use plan::{InstallPlan, PlanAction, PlanStep};
pub use resolver::Resolver;
