//! Wires a UI test target into a project in one idempotent pass.
//!
//! [`ProjectConfigurator::configure`] loads the descriptor, resolves the test
//! framework, applies every edit in memory, validates the result and only
//! then writes it back. Any failure before the write leaves the project on
//! disk exactly as it was. A second run against an already configured
//! project reports no changes and writes nothing.
//!
//! The descriptor is always written back to the bundle it was loaded from,
//! whatever its `name` field says. Only the configured scheme's XML file is
//! ever rendered; it is rewritten when the scheme changed or when the file
//! on disk is missing or no longer tests the target.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, info_span};

use super::model::{
    ensure_shared_scheme, ensure_target_dependency, ensure_test_target, Change, Edited, ModelError,
    TargetKind, SCHEME_EXTENSION,
};
use super::registry::{DependencyRegistry, RegistryError};
use super::store::{ProjectStore, StoreError};

#[derive(Error, Debug)]
pub enum ConfigureError {
    #[error("project not found: {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("dependency '{name}' not found for pin '{version}'")]
    DependencyNotFound { name: String, version: String },

    /// The dependency registry itself could not be read.
    #[error(transparent)]
    Registry(RegistryError),

    #[error("project '{project}' has no application target to host UI tests")]
    NoHostApplication { project: String },

    #[error("target '{name}' already exists as {kind}, not a UI test bundle")]
    TargetKindConflict { name: String, kind: TargetKind },

    #[error("scheme file name '{0}' must end in {SCHEME_EXTENSION}")]
    InvalidSchemeName(String),

    #[error("invalid project descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("failed to persist project: {0}")]
    PersistError(#[source] StoreError),
}

impl From<ModelError> for ConfigureError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NoHostApplication { project } => ConfigureError::NoHostApplication { project },
            ModelError::TargetKindConflict { name, kind } => ConfigureError::TargetKindConflict { name, kind },
            ModelError::InvalidSchemeName(name) => ConfigureError::InvalidSchemeName(name),
            ModelError::Invariant(msg) => ConfigureError::InvalidDescriptor(msg),
        }
    }
}

impl From<RegistryError> for ConfigureError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { name, version } => ConfigureError::DependencyNotFound { name, version },
            other => ConfigureError::Registry(other),
        }
    }
}

/// Name and version pin of the test framework to link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkPin {
    pub name: String,
    /// Exact version, `N.x` prefix or `*`.
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureSettings {
    pub project_name: String,
    pub test_target_name: String,
    pub scheme_file_name: String,
    pub framework: FrameworkPin,
}

impl Default for ConfigureSettings {
    fn default() -> Self {
        Self {
            project_name: "Example".to_string(),
            test_target_name: "ExampleEarlGrey".to_string(),
            scheme_file_name: "ExampleEarlGrey.xcscheme".to_string(),
            framework: FrameworkPin {
                name: "EarlGrey".to_string(),
                version: "1.x".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigureOutcome {
    pub descriptor_path: PathBuf,
    /// Empty when the project was already configured.
    pub changes: Vec<Change>,
    /// Whether anything was written.
    pub persisted: bool,
}

pub struct ProjectConfigurator<R> {
    store: ProjectStore,
    registry: R,
}

impl<R: DependencyRegistry> ProjectConfigurator<R> {
    pub fn new(store: ProjectStore, registry: R) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Computes the edits `configure` would make, without writing.
    pub fn plan(&self, settings: &ConfigureSettings) -> Result<Edited, ConfigureError> {
        if !settings.scheme_file_name.ends_with(SCHEME_EXTENSION)
            || settings.scheme_file_name.len() == SCHEME_EXTENSION.len()
        {
            return Err(ConfigureError::InvalidSchemeName(settings.scheme_file_name.clone()));
        }

        let project = self.store.load(&settings.project_name).map_err(|e| match e {
            StoreError::NotFound(path) => ConfigureError::ProjectNotFound(path),
            StoreError::Parse { .. } => ConfigureError::InvalidDescriptor(e.to_string()),
            other => ConfigureError::PersistError(other),
        })?;

        let dependency = self
            .registry
            .resolve(&settings.framework.name, &settings.framework.version)?;

        let target = settings.test_target_name.as_str();
        let scheme = settings.scheme_file_name.as_str();
        let mut edited = Edited::unchanged(project)
            .then(|p| ensure_test_target(p, target))?
            .then(|p| ensure_target_dependency(p, target, &dependency))?
            .then(|p| ensure_shared_scheme(p, scheme, target))?;

        edited.project.validate_ui_test_wiring(target, scheme)?;

        // The descriptor may already be complete while the rendered scheme
        // file is missing or was edited to drop the test target.
        let scheme_touched = edited.changes.iter().any(|c| c.scheme() == Some(scheme));
        if !scheme_touched && !self.store.shared_scheme_is_current(&settings.project_name, scheme, target) {
            edited.changes.push(Change::SchemeFileWritten { scheme: scheme.to_string() });
        }
        Ok(edited)
    }

    /// Runs every step and persists the result if anything changed.
    pub fn configure(&self, settings: &ConfigureSettings) -> Result<ConfigureOutcome, ConfigureError> {
        let _span = info_span!("configure", project = %settings.project_name).entered();
        let descriptor_path = self.store.descriptor_path(&settings.project_name);

        let edited = self.plan(settings)?;
        if edited.is_unchanged() {
            info!("project already configured");
            return Ok(ConfigureOutcome {
                descriptor_path,
                changes: Vec::new(),
                persisted: false,
            });
        }

        for change in &edited.changes {
            info!(%change, "change");
        }
        let scheme = settings.scheme_file_name.as_str();
        let render: &[&str] = if edited.changes.iter().any(|c| c.scheme() == Some(scheme)) {
            &[scheme]
        } else {
            &[]
        };
        self.store
            .persist(&settings.project_name, &edited.project, render)
            .map_err(ConfigureError::PersistError)?;
        info!(changes = edited.changes.len(), path = %descriptor_path.display(), "project persisted");

        Ok(ConfigureOutcome {
            descriptor_path,
            changes: edited.changes,
            persisted: true,
        })
    }
}
