#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Declarative recipe documents for kiln
//!
//! A recipe describes one package: where its source archive lives and how
//! to verify it, which other packages it needs, the phase commands that
//! build it, the conditional install actions that place its outputs and
//! the checks that prove the installation works.

pub mod catalog;
pub mod model;
pub mod parser;
pub mod platform;
pub mod vars;

pub use catalog::{DirectoryCatalog, LayeredCatalog, MemoryCatalog, RecipeCatalog};
pub use model::{
    Dependency, Environment, Expectation, InstallAction, InstallPredicate, Metadata,
    OptionalPhase, Phases, PlatformConstraint, Recipe, Source, VerificationCheck,
};
pub use parser::{parse_recipe, parse_recipe_from_str};
pub use platform::check_platform;
pub use vars::Variables;
