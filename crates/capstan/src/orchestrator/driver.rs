//! The orchestration driver: sequences apply and teardown against the
//! platform client.

use std::collections::BTreeMap;
use std::time::Duration;

use log::info;
use tracing::info_span;

use crate::blueprint::{graph, Blueprint, Kustomization, Source, SubstituteReference, TemplateData};
use crate::context::{ConfigStore, Shell};
use crate::platform::{PlatformClient, PostBuildSpec, SourceKind, SourceSelector, UnitSpec};
use crate::projection::{
    generate_build_id, load_value_overrides, origin_of, project_git_source, project_oci_source,
    resolve_component_paths, resolve_component_sources, resolve_patches, system_values,
    unit_substitutions, Origin, ProjectionError, VALUES_OVERRIDE_FILE,
};

use super::error::{OrchestrationError, Result};
use super::progress::{OrchestrationPhase, ProgressEvent, ProgressReporter};
use super::wait::{ConvergenceWaiter, POLL_INTERVAL};

/// Namespace all blueprint resources are applied into.
pub const PLATFORM_NAMESPACE: &str = "gitops-system";

/// Isolated namespace for derived cleanup units during teardown.
pub const CLEANUP_NAMESPACE: &str = "gitops-cleanup";

/// Name of the shared values resource every unit references.
pub const SHARED_VALUES_NAME: &str = "blueprint-values";

/// One orchestration session: owns the canonical blueprint and drives the
/// platform through the collaborator seams.
pub struct Orchestrator<'a> {
    blueprint: Blueprint,
    template_data: TemplateData,
    store: &'a dyn ConfigStore,
    shell: &'a dyn Shell,
    client: &'a dyn PlatformClient,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        blueprint: Blueprint,
        template_data: TemplateData,
        store: &'a dyn ConfigStore,
        shell: &'a dyn Shell,
        client: &'a dyn PlatformClient,
    ) -> Self {
        Self {
            blueprint,
            template_data,
            store,
            shell,
            client,
        }
    }

    /// The canonical, unresolved blueprint owned by this session.
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// Returns the enriched apply-time form: component sources resolved to
    /// locators and module paths derived. The canonical blueprint stays
    /// untouched.
    pub fn resolve(&self) -> Result<Blueprint> {
        let mut resolved = self.blueprint.clone();
        resolve_component_sources(&mut resolved)?;
        let project_root = self.shell.project_root()?;
        resolve_component_paths(&mut resolved, &project_root);
        Ok(resolved)
    }

    /// Applies the blueprint and blocks until the platform reports every
    /// unit ready, the failure threshold trips, or the deadline elapses.
    /// Without an explicit `timeout` the deadline is the dependency graph's
    /// worst-case wait estimate.
    pub fn up(&self, timeout: Option<Duration>, progress: &dyn ProgressReporter) -> Result<()> {
        let _run_span = info_span!("orchestrate_up",
            context = %self.store.context_name(),
            blueprint = %self.blueprint.metadata.name,
        )
        .entered();

        {
            let _step = info_span!("ensure_namespace").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Namespace,
                message: format!("Ensuring namespace {}...", PLATFORM_NAMESPACE),
            });
            if let Err(e) = self
                .client
                .create_namespace(PLATFORM_NAMESPACE)
                .map_err(|e| OrchestrationError::operation("create namespace", PLATFORM_NAMESPACE, e))
            {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        let resolved = {
            let _step = info_span!("resolve_blueprint").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Resolve,
                message: "Resolving module sources...".to_string(),
            });
            match self.resolve() {
                Ok(resolved) => resolved,
                Err(e) => {
                    progress.report(ProgressEvent::Failed {
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        };

        {
            let _step = info_span!("apply_sources").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Sources,
                message: "Applying module sources...".to_string(),
            });
            if let Err(e) = self.step_apply_sources(&resolved) {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        let system = {
            let _step = info_span!("apply_shared_values").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Values,
                message: "Publishing shared values...".to_string(),
            });
            let build_id = generate_build_id();
            let system = system_values(self.store, &build_id);
            if let Err(e) = self
                .client
                .apply_config_values(SHARED_VALUES_NAME, PLATFORM_NAMESPACE, &system)
                .map_err(|e| {
                    OrchestrationError::operation("apply shared values", SHARED_VALUES_NAME, e)
                })
            {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
            system
        };

        let order = graph::apply_order(&resolved.kustomizations);
        {
            let _step = info_span!("apply_units").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Units,
                message: format!("Applying {} units...", order.len()),
            });
            if let Err(e) = self.step_apply_units(&resolved, &order, &system) {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        {
            let _step = info_span!("wait_ready").entered();
            let deadline = timeout
                .unwrap_or_else(|| graph::max_wait(&resolved.kustomizations).max(POLL_INTERVAL));
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Wait,
                message: format!("Waiting up to {}s for convergence...", deadline.as_secs()),
            });
            if let Err(e) = ConvergenceWaiter::new(self.client).wait_ready(&order, deadline) {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        info!(
            "Blueprint '{}' converged ({} units)",
            self.blueprint.metadata.name,
            order.len()
        );
        progress.report(ProgressEvent::Completed { units: order });
        Ok(())
    }

    /// Tears the blueprint down in reverse dependency order. Every failure
    /// aborts the remaining sequence immediately.
    pub fn down(&self, progress: &dyn ProgressReporter) -> Result<()> {
        let _run_span = info_span!("orchestrate_down",
            context = %self.store.context_name(),
            blueprint = %self.blueprint.metadata.name,
        )
        .entered();

        let units = &self.blueprint.kustomizations;
        let order = graph::teardown_order(units);

        {
            let _step = info_span!("suspend_units").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Suspend,
                message: format!("Suspending {} units...", order.len()),
            });
            if let Err(e) = self.step_suspend_units(&order) {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        let cleanup_units: Vec<Kustomization> = order
            .iter()
            .filter_map(|name| units.iter().find(|u| u.name == *name))
            .filter(|u| !u.cleanup.is_empty())
            .map(Self::synthesize_cleanup)
            .collect();

        let cleanup_namespace_created = if cleanup_units.is_empty() {
            false
        } else {
            let _step = info_span!("apply_cleanup_units").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Cleanup,
                message: format!("Applying {} cleanup units...", cleanup_units.len()),
            });
            if let Err(e) = self.step_apply_cleanup(&cleanup_units) {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
            true
        };

        {
            let _step = info_span!("delete_units").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Delete,
                message: format!("Deleting {} units...", order.len()),
            });
            if let Err(e) = self.step_delete_units(&order, PLATFORM_NAMESPACE) {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        let deadline = graph::max_wait(units).max(POLL_INTERVAL);
        let waiter = ConvergenceWaiter::new(self.client);
        {
            let _step = info_span!("wait_units_deleted").entered();
            progress.report(ProgressEvent::Phase {
                phase: OrchestrationPhase::Wait,
                message: "Waiting for units to be removed...".to_string(),
            });
            if let Err(e) = waiter.wait_deleted(&order, deadline) {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        if !cleanup_units.is_empty() {
            let cleanup_names: Vec<String> =
                cleanup_units.iter().map(|u| u.name.clone()).collect();
            {
                let _step = info_span!("delete_cleanup_units").entered();
                if let Err(e) = self.step_delete_units(&cleanup_names, CLEANUP_NAMESPACE) {
                    progress.report(ProgressEvent::Failed {
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
            {
                let _step = info_span!("wait_cleanup_deleted").entered();
                if let Err(e) = waiter.wait_deleted(&cleanup_names, deadline) {
                    progress.report(ProgressEvent::Failed {
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        if cleanup_namespace_created {
            let _step = info_span!("delete_cleanup_namespace").entered();
            if let Err(e) = self
                .client
                .delete_namespace(CLEANUP_NAMESPACE)
                .map_err(|e| OrchestrationError::operation("delete namespace", CLEANUP_NAMESPACE, e))
            {
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        info!("Blueprint '{}' torn down", self.blueprint.metadata.name);
        progress.report(ProgressEvent::Completed { units: order });
        Ok(())
    }

    fn step_apply_sources(&self, resolved: &Blueprint) -> Result<()> {
        if resolved.repository.url.trim().is_empty() {
            info!("Primary repository url is empty, skipping");
        } else {
            let primary = Source {
                name: resolved.metadata.name.clone(),
                url: resolved.repository.url.clone(),
                reference: resolved.repository.reference.clone(),
                path_prefix: None,
                secret_name: resolved.repository.secret_name.clone(),
            };
            self.apply_source(&primary)?;
        }
        for source in &resolved.sources {
            self.apply_source(source)?;
        }
        Ok(())
    }

    fn apply_source(&self, source: &Source) -> Result<()> {
        match origin_of(&source.url) {
            Origin::Oci => {
                let spec = project_oci_source(source, PLATFORM_NAMESPACE);
                info!("Applying OCI source '{}' ({})", spec.name, spec.url);
                self.client
                    .apply_oci_source(&spec)
                    .map_err(|e| OrchestrationError::operation("apply OCI source", &source.name, e))
            }
            Origin::Git => {
                let spec = project_git_source(source, PLATFORM_NAMESPACE);
                info!("Applying Git source '{}' ({})", spec.name, spec.url);
                self.client
                    .apply_git_source(&spec)
                    .map_err(|e| OrchestrationError::operation("apply Git source", &source.name, e))
            }
        }
    }

    fn step_apply_units(
        &self,
        resolved: &Blueprint,
        order: &[String],
        system: &BTreeMap<String, String>,
    ) -> Result<()> {
        for name in order {
            let Some(unit) = resolved.kustomizations.iter().find(|u| u.name == *name) else {
                continue;
            };
            let spec = self.project_unit(resolved, unit, system, PLATFORM_NAMESPACE)?;
            info!("Applying unit '{}' ({})", spec.name, spec.path);
            self.client
                .apply_unit(&spec)
                .map_err(|e| OrchestrationError::operation("apply unit", name, e))?;
        }
        Ok(())
    }

    fn step_suspend_units(&self, order: &[String]) -> Result<()> {
        for name in order {
            info!("Suspending unit '{}'", name);
            self.client
                .suspend_unit(name, PLATFORM_NAMESPACE)
                .map_err(|e| OrchestrationError::operation("suspend unit", name, e))?;
            let dependents = self
                .client
                .list_dependents(name, PLATFORM_NAMESPACE)
                .map_err(|e| OrchestrationError::operation("list dependents of", name, e))?;
            for dependent in dependents {
                self.client
                    .suspend_dependent(&dependent, PLATFORM_NAMESPACE)
                    .map_err(|e| {
                        OrchestrationError::operation("suspend dependent", &dependent, e)
                    })?;
            }
        }
        Ok(())
    }

    fn step_apply_cleanup(&self, cleanup_units: &[Kustomization]) -> Result<()> {
        self.client
            .create_namespace(CLEANUP_NAMESPACE)
            .map_err(|e| OrchestrationError::operation("create namespace", CLEANUP_NAMESPACE, e))?;
        let build_id = generate_build_id();
        let system = system_values(self.store, &build_id);
        for unit in cleanup_units {
            let spec = self.project_unit(&self.blueprint, unit, &system, CLEANUP_NAMESPACE)?;
            info!("Applying cleanup unit '{}' ({})", spec.name, spec.path);
            self.client
                .apply_unit(&spec)
                .map_err(|e| OrchestrationError::operation("apply cleanup unit", &unit.name, e))?;
        }
        Ok(())
    }

    fn step_delete_units(&self, names: &[String], namespace: &str) -> Result<()> {
        for name in names {
            info!("Deleting unit '{}'", name);
            self.client
                .delete_unit(name, namespace)
                .map_err(|e| OrchestrationError::operation("delete unit", name, e))?;
        }
        Ok(())
    }

    /// Projects one unit into the platform's native shape: normalized path,
    /// resolved source selector, patches, and layered substitution values.
    /// Every projected unit references the shared values resource.
    fn project_unit(
        &self,
        resolved: &Blueprint,
        unit: &Kustomization,
        system: &BTreeMap<String, String>,
        namespace: &str,
    ) -> Result<UnitSpec> {
        let config_root = self.store.config_root()?;
        let patches = resolve_patches(unit, &self.template_data, &config_root)?;
        let overrides = load_value_overrides(&config_root)?;
        let substitutions = unit_substitutions(
            unit,
            system,
            self.template_data.get(VALUES_OVERRIDE_FILE),
            overrides.as_ref(),
            self.store,
        )?;

        let inline = unit.post_build.clone().unwrap_or_default();
        let mut substitute = inline.substitute;
        substitute.extend(substitutions);
        let mut substitute_from = inline.substitute_from;
        if !substitute_from.iter().any(|r| r.name == SHARED_VALUES_NAME) {
            substitute_from.push(SubstituteReference {
                kind: "ConfigMap".to_string(),
                name: SHARED_VALUES_NAME.to_string(),
                optional: false,
            });
        }

        Ok(UnitSpec {
            name: unit.name.clone(),
            namespace: namespace.to_string(),
            path: unit.normalized_path(),
            source: self.unit_source(resolved, unit)?,
            depends_on: unit.depends_on.clone(),
            interval: unit.effective_interval().as_secs(),
            retry_interval: unit.effective_retry_interval().as_secs(),
            timeout: unit.effective_timeout().as_secs(),
            wait: unit.effective_wait(),
            force: unit.effective_force(),
            prune: unit.effective_prune(),
            components: unit.components.clone(),
            patches,
            post_build: PostBuildSpec {
                substitute,
                substitute_from,
            },
        })
    }

    fn unit_source(&self, resolved: &Blueprint, unit: &Kustomization) -> Result<SourceSelector> {
        if let Some(name) = unit.source.as_deref().filter(|s| !s.trim().is_empty()) {
            let source =
                resolved
                    .source_named(name)
                    .ok_or_else(|| ProjectionError::UnknownSource {
                        component: unit.name.clone(),
                        source: name.to_string(),
                    })?;
            return Ok(SourceSelector {
                kind: kind_of(&source.url),
                name: source.name.clone(),
            });
        }
        Ok(SourceSelector {
            kind: kind_of(&resolved.repository.url),
            name: resolved.metadata.name.clone(),
        })
    }

    /// Derives the teardown-only unit for a declaration with `cleanup`
    /// components: forced, waited, pointed at the cleanup sub-path, isolated
    /// to the cleanup namespace, with no dependencies of its own.
    fn synthesize_cleanup(unit: &Kustomization) -> Kustomization {
        Kustomization {
            name: format!("{}-cleanup", unit.name),
            path: format!("{}/cleanup", unit.normalized_path()),
            source: unit.source.clone(),
            depends_on: Vec::new(),
            interval: unit.interval,
            retry_interval: unit.retry_interval,
            timeout: unit.timeout,
            wait: Some(true),
            force: Some(true),
            prune: unit.prune,
            components: unit.cleanup.clone(),
            patches: Vec::new(),
            post_build: None,
            cleanup: Vec::new(),
        }
    }
}

fn kind_of(url: &str) -> SourceKind {
    match origin_of(url) {
        Origin::Git => SourceKind::Git,
        Origin::Oci => SourceKind::Oci,
    }
}
