//! Ordered install plan produced by the resolver

use kiln_recipe::Recipe;
use kiln_types::DependencyPhase;

/// What the transaction must do for one plan step
#[derive(Clone, Debug)]
pub enum PlanAction {
    /// The host already provides it
    Satisfied,
    /// Build and install it from this recipe
    Install(Box<Recipe>),
}

/// One entry of an [`InstallPlan`]
#[derive(Clone, Debug)]
pub struct PlanStep {
    pub name: String,
    /// Recipe version for installs; `None` for host-satisfied steps
    pub version: Option<String>,
    /// `Runtime` wins when a package is needed both ways
    pub phase: DependencyPhase,
    /// Who asked for it (`requested` for the root)
    pub reason: String,
    pub action: PlanAction,
}

impl PlanStep {
    #[must_use]
    pub fn recipe(&self) -> Option<&Recipe> {
        match &self.action {
            PlanAction::Install(recipe) => Some(recipe),
            PlanAction::Satisfied => None,
        }
    }

    #[must_use]
    pub fn is_install(&self) -> bool {
        matches!(self.action, PlanAction::Install(_))
    }
}

/// Dependencies first, the requested recipe last
#[derive(Clone, Debug, Default)]
pub struct InstallPlan {
    steps: Vec<PlanStep>,
}

impl InstallPlan {
    pub(crate) fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The requested recipe's step
    #[must_use]
    pub fn root(&self) -> Option<&PlanStep> {
        self.steps.last()
    }

    #[must_use]
    pub fn step(&self, name: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Recipes to build and install, in plan order
    pub fn to_install(&self) -> impl Iterator<Item = &Recipe> {
        self.steps.iter().filter_map(PlanStep::recipe)
    }

    /// Names needed only at build time
    #[must_use]
    pub fn build_only(&self) -> Vec<String> {
        self.names_with(DependencyPhase::Build)
    }

    /// Names needed by the installed result
    #[must_use]
    pub fn runtime(&self) -> Vec<String> {
        self.names_with(DependencyPhase::Runtime)
    }

    fn names_with(&self, phase: DependencyPhase) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.phase == phase)
            .map(|s| s.name.clone())
            .collect()
    }
}
