//! Main dependency resolver implementation

use crate::capability::CapabilityQuery;
use crate::plan::{InstallPlan, PlanAction, PlanStep};
use kiln_errors::{Error, ResolveError};
use kiln_events::{AppEvent, EventEmitter, EventSender, FailureContext, ResolverEvent};
use kiln_recipe::{Dependency, Recipe, RecipeCatalog};
use kiln_types::{DependencyPhase, VersionSpec};
use std::collections::HashMap;
use std::sync::Arc;

/// Dependency resolver
#[derive(Clone)]
pub struct Resolver {
    capabilities: Arc<dyn CapabilityQuery>,
    catalog: Arc<dyn RecipeCatalog>,
    event_sender: Option<EventSender>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl EventEmitter for Resolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

/// Traversal state: planned steps plus the chain of recipes being expanded
#[derive(Default)]
struct Walk {
    steps: Vec<PlanStep>,
    index: HashMap<String, usize>,
    stack: Vec<String>,
}

impl Walk {
    fn push(&mut self, step: PlanStep) {
        self.index.insert(step.name.clone(), self.steps.len());
        self.steps.push(step);
    }
}

impl Resolver {
    #[must_use]
    pub fn new(capabilities: Arc<dyn CapabilityQuery>, catalog: Arc<dyn RecipeCatalog>) -> Self {
        Self {
            capabilities,
            catalog,
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    /// Resolve `root` into an install plan
    ///
    /// Dependencies are expanded depth-first in declaration order, so a
    /// dependency's own dependencies precede it and siblings keep the order
    /// the recipe lists them in. The root is always the last step.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedDependency` when neither the host nor the catalog
    /// can provide a dependency in a matching version, and
    /// `DependencyCycle` when a recipe transitively depends on itself.
    pub async fn resolve(&self, root: &Recipe) -> Result<InstallPlan, Error> {
        self.emit(AppEvent::Resolver(ResolverEvent::Started {
            root: root.name().to_string(),
        }));

        let mut walk = Walk::default();
        match self.visit(root, DependencyPhase::Runtime, &mut walk).await {
            Ok(()) => {}
            Err(err) => {
                self.emit(AppEvent::Resolver(ResolverEvent::Failed {
                    root: root.name().to_string(),
                    failure: FailureContext::from_error(&err),
                }));
                return Err(err);
            }
        }

        walk.push(PlanStep {
            name: root.name().to_string(),
            version: Some(root.version().to_string()),
            phase: DependencyPhase::Runtime,
            reason: "requested".to_string(),
            action: PlanAction::Install(Box::new(root.clone())),
        });

        let plan = InstallPlan::new(walk.steps);
        self.emit(AppEvent::Resolver(ResolverEvent::Completed {
            total_steps: plan.len(),
            to_install: plan.to_install().count(),
        }));
        Ok(plan)
    }

    /// Plan every dependency of `recipe` (but not `recipe` itself)
    async fn visit(
        &self,
        recipe: &Recipe,
        phase: DependencyPhase,
        walk: &mut Walk,
    ) -> Result<(), Error> {
        walk.stack.push(recipe.name().to_string());

        for dep in &recipe.dependencies {
            // Everything below a build-only dependency is build-only too
            let dep_phase = match phase {
                DependencyPhase::Build => DependencyPhase::Build,
                DependencyPhase::Runtime => dep.phase,
            };

            if let Some(pos) = walk.stack.iter().position(|n| *n == dep.name) {
                let mut cycle = walk.stack[pos..].to_vec();
                cycle.push(dep.name.clone());
                return Err(ResolveError::DependencyCycle { cycle }.into());
            }

            if let Some(&i) = walk.index.get(&dep.name) {
                let compatible = match &walk.steps[i].action {
                    PlanAction::Install(planned) => recipe_satisfies(planned, &dep.version),
                    PlanAction::Satisfied => {
                        self.capabilities.is_satisfied(&dep.name, &dep.version)
                    }
                };
                if !compatible {
                    return Err(unresolved(dep, recipe));
                }
                if dep_phase == DependencyPhase::Runtime {
                    promote_to_runtime(&dep.name, walk);
                }
                continue;
            }

            if self.capabilities.is_satisfied(&dep.name, &dep.version) {
                self.emit(AppEvent::Resolver(ResolverEvent::CapabilitySatisfied {
                    name: dep.name.clone(),
                    constraint: dep.version.to_string(),
                    phase: dep_phase,
                }));
                walk.push(PlanStep {
                    name: dep.name.clone(),
                    version: None,
                    phase: dep_phase,
                    reason: recipe.name().to_string(),
                    action: PlanAction::Satisfied,
                });
                continue;
            }

            let Some(candidate) = self.catalog.lookup(&dep.name).await? else {
                return Err(unresolved(dep, recipe));
            };
            if !recipe_satisfies(&candidate, &dep.version) {
                tracing::debug!(
                    name = %dep.name,
                    found = candidate.version(),
                    wanted = %dep.version,
                    "catalog recipe version does not match"
                );
                return Err(unresolved(dep, recipe));
            }

            Box::pin(self.visit(&candidate, dep_phase, walk)).await?;

            self.emit(AppEvent::Resolver(ResolverEvent::RecipeScheduled {
                name: dep.name.clone(),
                version: candidate.version().to_string(),
                phase: dep_phase,
                required_by: recipe.name().to_string(),
            }));
            walk.push(PlanStep {
                name: dep.name.clone(),
                version: Some(candidate.version().to_string()),
                phase: dep_phase,
                reason: recipe.name().to_string(),
                action: PlanAction::Install(Box::new(candidate)),
            });
        }

        walk.stack.pop();
        Ok(())
    }
}

fn recipe_satisfies(recipe: &Recipe, spec: &VersionSpec) -> bool {
    spec.is_any() || recipe.semver().is_some_and(|v| spec.matches(&v))
}

fn unresolved(dep: &Dependency, required_by: &Recipe) -> Error {
    ResolveError::UnresolvedDependency {
        name: dep.name.clone(),
        constraint: dep.version.to_string(),
        required_by: required_by.name().to_string(),
    }
    .into()
}

/// A package first reached through a build-only edge turned out to be
/// needed at runtime; so are its own runtime dependencies
fn promote_to_runtime(name: &str, walk: &mut Walk) {
    let Some(&i) = walk.index.get(name) else {
        return;
    };
    if walk.steps[i].phase == DependencyPhase::Runtime {
        return;
    }
    walk.steps[i].phase = DependencyPhase::Runtime;

    let runtime_deps = walk.steps[i]
        .recipe()
        .map(Recipe::runtime_dependencies)
        .unwrap_or_default();
    for dep in runtime_deps {
        promote_to_runtime(&dep, walk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::StaticCapabilities;
    use kiln_recipe::{parse_recipe_from_str, MemoryCatalog};

    fn recipe(name: &str, version: &str, deps: &str) -> Recipe {
        let content = format!(
            r#"
metadata: {{ name: {name}, version: "{version}" }}
source: {{ url: "https://example.invalid/{name}.tar.gz" }}
dependencies: {deps}
verify:
  - {{ run: ["true"], expect: {{ exit_code: 0 }} }}
"#
        );
        parse_recipe_from_str(&content, &format!("{name}.yml")).unwrap()
    }

    fn resolver(provides: &[&str], catalog: MemoryCatalog) -> Resolver {
        Resolver::new(
            Arc::new(StaticCapabilities::from_provides(provides).unwrap()),
            Arc::new(catalog),
        )
    }

    fn names(plan: &InstallPlan) -> Vec<&str> {
        plan.steps().iter().map(|s| s.name.as_str()).collect()
    }

    #[tokio::test]
    async fn dependencies_precede_root_in_declaration_order() {
        let root = recipe(
            "app",
            "1.0.0",
            "[{ name: a, phase: build }, { name: b }]",
        );
        let catalog = MemoryCatalog::new()
            .with(recipe("a", "1.0.0", "[]"))
            .with(recipe("b", "2.0.0", "[]"));

        let plan = resolver(&[], catalog).resolve(&root).await.unwrap();
        assert_eq!(names(&plan), vec!["a", "b", "app"]);
        assert_eq!(plan.build_only(), vec!["a"]);
        assert_eq!(plan.runtime(), vec!["b", "app"]);
        assert_eq!(plan.root().unwrap().reason, "requested");
    }

    #[tokio::test]
    async fn transitive_dependencies_come_first() {
        let root = recipe("app", "1.0.0", "[{ name: b }]");
        let catalog = MemoryCatalog::new()
            .with(recipe("b", "1.0.0", "[{ name: c }]"))
            .with(recipe("c", "1.0.0", "[]"));

        let plan = resolver(&[], catalog).resolve(&root).await.unwrap();
        assert_eq!(names(&plan), vec!["c", "b", "app"]);
        assert_eq!(plan.step("c").unwrap().reason, "b");
    }

    #[tokio::test]
    async fn satisfied_dependencies_are_not_expanded() {
        let root = recipe("app", "1.0.0", "[{ name: cmake, phase: build }]");
        let plan = resolver(&["cmake@3.29.0"], MemoryCatalog::new())
            .resolve(&root)
            .await
            .unwrap();

        let step = plan.step("cmake").unwrap();
        assert!(!step.is_install());
        assert_eq!(plan.to_install().count(), 1);
    }

    #[tokio::test]
    async fn missing_dependency_is_unresolved() {
        let root = recipe("app", "1.0.0", "[{ name: libffi }]");
        let err = resolver(&[], MemoryCatalog::new())
            .resolve(&root)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::UnresolvedDependency { ref name, ref required_by, .. })
                if name == "libffi" && required_by == "app"
        ));
    }

    #[tokio::test]
    async fn catalog_version_must_match_constraint() {
        let root = recipe("app", "1.0.0", "[{ name: ninja, version: '>=1.10' }]");
        let catalog = MemoryCatalog::new().with(recipe("ninja", "1.9.0", "[]"));
        let err = resolver(&[], catalog).resolve(&root).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::UnresolvedDependency { .. })
        ));
    }

    #[tokio::test]
    async fn cycles_are_reported_with_their_path() {
        let root = recipe("app", "1.0.0", "[{ name: a }]");
        let catalog = MemoryCatalog::new()
            .with(recipe("a", "1.0.0", "[{ name: b }]"))
            .with(recipe("b", "1.0.0", "[{ name: app }]"));

        let err = resolver(&[], catalog).resolve(&root).await.unwrap_err();
        match err {
            Error::Resolve(ResolveError::DependencyCycle { cycle }) => {
                assert_eq!(cycle, vec!["app", "a", "b", "app"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn self_dependency_is_a_cycle() {
        let root = recipe("app", "1.0.0", "[{ name: app }]");
        let err = resolver(&[], MemoryCatalog::new())
            .resolve(&root)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::DependencyCycle { .. })
        ));
    }

    #[tokio::test]
    async fn shared_dependency_is_planned_once_and_promoted() {
        let root = recipe(
            "app",
            "1.0.0",
            "[{ name: tool, phase: build }, { name: lib }]",
        );
        let catalog = MemoryCatalog::new()
            .with(recipe("tool", "1.0.0", "[{ name: lib }]"))
            .with(recipe("lib", "1.0.0", "[]"));

        let plan = resolver(&[], catalog).resolve(&root).await.unwrap();
        assert_eq!(names(&plan), vec!["lib", "tool", "app"]);
        assert_eq!(plan.step("lib").unwrap().phase, DependencyPhase::Runtime);
        assert_eq!(plan.step("tool").unwrap().phase, DependencyPhase::Build);
    }

    #[tokio::test]
    async fn events_describe_resolution() {
        let (tx, mut rx) = kiln_events::channel();
        let root = recipe("app", "1.0.0", "[{ name: cmake, phase: build }]");
        resolver(&["cmake"], MemoryCatalog::new())
            .with_event_sender(tx)
            .resolve(&root)
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Resolver(e) = event {
                kinds.push(match e {
                    ResolverEvent::Started { .. } => "started",
                    ResolverEvent::CapabilitySatisfied { .. } => "satisfied",
                    ResolverEvent::RecipeScheduled { .. } => "scheduled",
                    ResolverEvent::Completed { .. } => "completed",
                    ResolverEvent::Failed { .. } => "failed",
                });
            }
        }
        assert_eq!(kinds, vec!["started", "satisfied", "completed"]);
    }
}
