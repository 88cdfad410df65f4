//! In-memory project descriptor and the "ensure" edits applied to it.
//!
//! Every edit takes a [`ProjectDescriptor`] by value and returns an
//! [`Edited`] holding the new descriptor plus the [`Change`]s it made. An edit
//! that finds the project already in the desired state returns it untouched
//! with no changes, which is what makes a configuration run safe to repeat.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File extension every scheme file name must carry.
pub const SCHEME_EXTENSION: &str = ".xcscheme";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The project has no application target to host the tests.
    #[error("project '{project}' has no application target to host UI tests")]
    NoHostApplication { project: String },

    /// A target with the requested name exists but is not a test bundle.
    #[error("target '{name}' already exists as {kind}, not a UI test bundle")]
    TargetKindConflict { name: String, kind: TargetKind },

    #[error("scheme file name '{0}' must end in {SCHEME_EXTENSION}")]
    InvalidSchemeName(String),

    /// The edited descriptor does not satisfy the UI test wiring invariant.
    #[error("project invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Application,
    UiTestBundle,
    UnitTestBundle,
    Framework,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Application => "application",
            TargetKind::UiTestBundle => "UI test bundle",
            TargetKind::UnitTestBundle => "unit test bundle",
            TargetKind::Framework => "framework",
        };
        f.write_str(name)
    }
}

/// A resolved third-party dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub name: String,
    pub version: String,
    /// Where the dependency is fetched from (repository URL or path).
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub kind: TargetKind,
    /// The application target a test bundle is launched alongside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_target: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
}

impl Target {
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            host_target: None,
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    /// File name, including the `.xcscheme` extension.
    pub name: String,
    /// Shared schemes are stored with the project and visible to every user.
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub build_targets: Vec<String>,
    /// Targets run by the scheme's test action.
    #[serde(default)]
    pub test_targets: Vec<String>,
}

impl Scheme {
    /// Scheme name without the file extension.
    pub fn display_name(&self) -> &str {
        self.name.strip_suffix(SCHEME_EXTENSION).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub schemes: Vec<Scheme>,
    /// Every third-party dependency referenced by any target.
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
}

/// One mutation made by an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    TargetCreated { target: String },
    HostLinked { target: String, host: String },
    DependencyAdded { target: String, name: String, version: String },
    DependencyUpdated { target: String, name: String, from: String, to: String },
    ProjectDependencyRecorded { name: String, version: String },
    SchemeCreated { scheme: String },
    SchemeShared { scheme: String },
    SchemeBuildTargetAdded { scheme: String, target: String },
    SchemeTestTargetAdded { scheme: String, target: String },
    /// The scheme's XML file was missing or no longer tests the target.
    SchemeFileWritten { scheme: String },
}

impl Change {
    /// The scheme this change touches, if any.
    pub fn scheme(&self) -> Option<&str> {
        match self {
            Change::SchemeCreated { scheme }
            | Change::SchemeShared { scheme }
            | Change::SchemeBuildTargetAdded { scheme, .. }
            | Change::SchemeTestTargetAdded { scheme, .. }
            | Change::SchemeFileWritten { scheme } => Some(scheme),
            _ => None,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::TargetCreated { target } => write!(f, "created target {target}"),
            Change::HostLinked { target, host } => write!(f, "linked {target} to host application {host}"),
            Change::DependencyAdded { target, name, version } => {
                write!(f, "added {name} {version} to {target}")
            }
            Change::DependencyUpdated { target, name, from, to } => {
                write!(f, "updated {name} in {target} from {from} to {to}")
            }
            Change::ProjectDependencyRecorded { name, version } => {
                write!(f, "recorded project dependency {name} {version}")
            }
            Change::SchemeCreated { scheme } => write!(f, "created scheme {scheme}"),
            Change::SchemeShared { scheme } => write!(f, "marked scheme {scheme} as shared"),
            Change::SchemeBuildTargetAdded { scheme, target } => {
                write!(f, "added {target} to the build action of {scheme}")
            }
            Change::SchemeTestTargetAdded { scheme, target } => {
                write!(f, "added {target} to the test action of {scheme}")
            }
            Change::SchemeFileWritten { scheme } => write!(f, "rewrote shared scheme file {scheme}"),
        }
    }
}

/// A descriptor together with the changes that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Edited {
    pub project: ProjectDescriptor,
    pub changes: Vec<Change>,
}

impl Edited {
    /// Starts an edit chain with no changes.
    pub fn unchanged(project: ProjectDescriptor) -> Self {
        Self { project, changes: Vec::new() }
    }

    /// Applies another edit, accumulating its changes.
    pub fn then<F>(self, edit: F) -> Result<Self, ModelError>
    where
        F: FnOnce(ProjectDescriptor) -> Result<Edited, ModelError>,
    {
        let mut changes = self.changes;
        let next = edit(self.project)?;
        changes.extend(next.changes);
        Ok(Self { project: next.project, changes })
    }

    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }
}

impl ProjectDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            schemes: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn scheme(&self, name: &str) -> Option<&Scheme> {
        self.schemes.iter().find(|s| s.name == name)
    }

    /// The first application target, which hosts UI tests.
    pub fn primary_application(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.kind == TargetKind::Application)
    }

    /// Checks that `test_target` is a hosted UI test bundle run by the shared
    /// scheme `scheme`.
    pub fn validate_ui_test_wiring(&self, test_target: &str, scheme: &str) -> Result<(), ModelError> {
        let host = self.primary_application().ok_or_else(|| ModelError::NoHostApplication {
            project: self.name.clone(),
        })?;
        let target = self
            .target(test_target)
            .ok_or_else(|| ModelError::Invariant(format!("target '{test_target}' is missing")))?;
        if target.kind != TargetKind::UiTestBundle {
            return Err(ModelError::Invariant(format!("target '{test_target}' is not a UI test bundle")));
        }
        if target.host_target.as_deref() != Some(host.name.as_str()) {
            return Err(ModelError::Invariant(format!(
                "target '{test_target}' is not hosted by '{}'",
                host.name
            )));
        }
        if self.targets.iter().filter(|t| t.name == test_target).count() != 1 {
            return Err(ModelError::Invariant(format!("target '{test_target}' is duplicated")));
        }
        let found = self
            .scheme(scheme)
            .ok_or_else(|| ModelError::Invariant(format!("scheme '{scheme}' is missing")))?;
        if !found.shared {
            return Err(ModelError::Invariant(format!("scheme '{scheme}' is not shared")));
        }
        if !found.test_targets.iter().any(|t| t == test_target) {
            return Err(ModelError::Invariant(format!(
                "scheme '{scheme}' does not test '{test_target}'"
            )));
        }
        if self.schemes.iter().filter(|s| s.name == scheme).count() != 1 {
            return Err(ModelError::Invariant(format!("scheme '{scheme}' is duplicated")));
        }
        Ok(())
    }
}

/// Ensures a UI test bundle named `name` exists and is hosted by the primary
/// application target.
pub fn ensure_test_target(mut project: ProjectDescriptor, name: &str) -> Result<Edited, ModelError> {
    let host = project
        .primary_application()
        .map(|t| t.name.clone())
        .ok_or_else(|| ModelError::NoHostApplication { project: project.name.clone() })?;

    let mut changes = Vec::new();
    let index = match project.targets.iter().position(|t| t.name == name) {
        Some(i) => {
            let kind = project.targets[i].kind;
            if kind != TargetKind::UiTestBundle {
                return Err(ModelError::TargetKindConflict { name: name.to_string(), kind });
            }
            i
        }
        None => {
            project.targets.push(Target::new(name, TargetKind::UiTestBundle));
            changes.push(Change::TargetCreated { target: name.to_string() });
            project.targets.len() - 1
        }
    };

    let target = &mut project.targets[index];
    if target.host_target.as_deref() != Some(host.as_str()) {
        target.host_target = Some(host.clone());
        changes.push(Change::HostLinked { target: name.to_string(), host });
    }

    Ok(Edited { project, changes })
}

/// Ensures `target` depends on `dependency` at exactly its version, and that
/// the project-level dependency list records it.
///
/// An existing reference to the same dependency name at another version is
/// replaced rather than duplicated.
pub fn ensure_target_dependency(
    mut project: ProjectDescriptor,
    target: &str,
    dependency: &DependencyRef,
) -> Result<Edited, ModelError> {
    let mut changes = Vec::new();

    let entry = project
        .targets
        .iter_mut()
        .find(|t| t.name == target)
        .ok_or_else(|| ModelError::Invariant(format!("target '{target}' is missing")))?;

    match entry.dependencies.iter_mut().find(|d| d.name == dependency.name) {
        Some(existing) if existing == dependency => {}
        Some(existing) => {
            changes.push(Change::DependencyUpdated {
                target: target.to_string(),
                name: dependency.name.clone(),
                from: existing.version.clone(),
                to: dependency.version.clone(),
            });
            *existing = dependency.clone();
        }
        None => {
            entry.dependencies.push(dependency.clone());
            changes.push(Change::DependencyAdded {
                target: target.to_string(),
                name: dependency.name.clone(),
                version: dependency.version.clone(),
            });
        }
    }

    let recorded = project.dependencies.iter().any(|d| d == dependency);
    if !recorded {
        // Keep one entry per name and version; older pins of the same name
        // may still be used by other targets.
        project.dependencies.push(dependency.clone());
        changes.push(Change::ProjectDependencyRecorded {
            name: dependency.name.clone(),
            version: dependency.version.clone(),
        });
    }

    Ok(Edited { project, changes })
}

/// Ensures a shared scheme named `scheme` builds and tests `test_target`.
pub fn ensure_shared_scheme(
    mut project: ProjectDescriptor,
    scheme: &str,
    test_target: &str,
) -> Result<Edited, ModelError> {
    if !scheme.ends_with(SCHEME_EXTENSION) || scheme.len() == SCHEME_EXTENSION.len() {
        return Err(ModelError::InvalidSchemeName(scheme.to_string()));
    }

    let mut changes = Vec::new();
    let index = match project.schemes.iter().position(|s| s.name == scheme) {
        Some(i) => i,
        None => {
            project.schemes.push(Scheme {
                name: scheme.to_string(),
                shared: false,
                build_targets: Vec::new(),
                test_targets: Vec::new(),
            });
            changes.push(Change::SchemeCreated { scheme: scheme.to_string() });
            project.schemes.len() - 1
        }
    };

    let entry = &mut project.schemes[index];
    if !entry.shared {
        entry.shared = true;
        changes.push(Change::SchemeShared { scheme: scheme.to_string() });
    }
    if !entry.build_targets.iter().any(|t| t == test_target) {
        entry.build_targets.push(test_target.to_string());
        changes.push(Change::SchemeBuildTargetAdded {
            scheme: scheme.to_string(),
            target: test_target.to_string(),
        });
    }
    if !entry.test_targets.iter().any(|t| t == test_target) {
        entry.test_targets.push(test_target.to_string());
        changes.push(Change::SchemeTestTargetAdded {
            scheme: scheme.to_string(),
            target: test_target.to_string(),
        });
    }

    Ok(Edited { project, changes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> ProjectDescriptor {
        let mut project = ProjectDescriptor::new("Example");
        project.targets.push(Target::new("Example", TargetKind::Application));
        project
    }

    fn earlgrey(version: &str) -> DependencyRef {
        DependencyRef {
            name: "EarlGrey".into(),
            version: version.into(),
            source: "https://github.com/google/EarlGrey.git".into(),
        }
    }

    #[test]
    fn creates_hosted_test_target() {
        let edited = ensure_test_target(example(), "ExampleEarlGrey").unwrap();
        let target = edited.project.target("ExampleEarlGrey").unwrap();
        assert_eq!(target.kind, TargetKind::UiTestBundle);
        assert_eq!(target.host_target.as_deref(), Some("Example"));
        assert_eq!(
            edited.changes,
            vec![
                Change::TargetCreated { target: "ExampleEarlGrey".into() },
                Change::HostLinked { target: "ExampleEarlGrey".into(), host: "Example".into() },
            ]
        );
    }

    #[test]
    fn existing_test_target_is_left_alone() {
        let once = ensure_test_target(example(), "ExampleEarlGrey").unwrap().project;
        let twice = ensure_test_target(once.clone(), "ExampleEarlGrey").unwrap();
        assert!(twice.is_unchanged());
        assert_eq!(twice.project, once);
    }

    #[test]
    fn unhosted_test_target_gets_relinked() {
        let mut project = example();
        project.targets.push(Target::new("ExampleEarlGrey", TargetKind::UiTestBundle));
        let edited = ensure_test_target(project, "ExampleEarlGrey").unwrap();
        assert_eq!(edited.changes.len(), 1);
        assert!(matches!(edited.changes[0], Change::HostLinked { .. }));
    }

    #[test]
    fn missing_application_target_is_an_error() {
        let err = ensure_test_target(ProjectDescriptor::new("Empty"), "Tests").unwrap_err();
        assert_eq!(err, ModelError::NoHostApplication { project: "Empty".into() });
    }

    #[test]
    fn name_clash_with_non_test_target_is_an_error() {
        let mut project = example();
        project.targets.push(Target::new("Kit", TargetKind::Framework));
        let err = ensure_test_target(project, "Kit").unwrap_err();
        assert!(matches!(err, ModelError::TargetKindConflict { kind: TargetKind::Framework, .. }));
    }

    #[test]
    fn dependency_is_added_once() {
        let project = ensure_test_target(example(), "ExampleEarlGrey").unwrap().project;
        let edited = ensure_target_dependency(project, "ExampleEarlGrey", &earlgrey("1.15.0")).unwrap();
        assert_eq!(edited.changes.len(), 2);
        assert_eq!(edited.project.dependencies.len(), 1);

        let again = ensure_target_dependency(edited.project, "ExampleEarlGrey", &earlgrey("1.15.0")).unwrap();
        assert!(again.is_unchanged());
        assert_eq!(again.project.target("ExampleEarlGrey").unwrap().dependencies.len(), 1);
    }

    #[test]
    fn dependency_pin_change_replaces_reference() {
        let project = ensure_test_target(example(), "ExampleEarlGrey").unwrap().project;
        let old = ensure_target_dependency(project, "ExampleEarlGrey", &earlgrey("1.14.0")).unwrap().project;
        let edited = ensure_target_dependency(old, "ExampleEarlGrey", &earlgrey("1.15.0")).unwrap();

        let deps = &edited.project.target("ExampleEarlGrey").unwrap().dependencies;
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].version, "1.15.0");
        assert!(matches!(edited.changes[0], Change::DependencyUpdated { .. }));
    }

    #[test]
    fn shared_scheme_is_created_and_wired() {
        let edited = ensure_shared_scheme(example(), "ExampleEarlGrey.xcscheme", "ExampleEarlGrey").unwrap();
        let scheme = edited.project.scheme("ExampleEarlGrey.xcscheme").unwrap();
        assert!(scheme.shared);
        assert_eq!(scheme.test_targets, vec!["ExampleEarlGrey"]);
        assert_eq!(scheme.display_name(), "ExampleEarlGrey");
        assert_eq!(edited.changes.len(), 4);
        assert!(edited.changes.iter().all(|c| c.scheme() == Some("ExampleEarlGrey.xcscheme")));
        assert_eq!(Change::TargetCreated { target: "T".into() }.scheme(), None);
    }

    #[test]
    fn private_scheme_becomes_shared() {
        let mut project = example();
        project.schemes.push(Scheme {
            name: "ExampleEarlGrey.xcscheme".into(),
            shared: false,
            build_targets: vec!["ExampleEarlGrey".into()],
            test_targets: vec!["ExampleEarlGrey".into()],
        });
        let edited = ensure_shared_scheme(project, "ExampleEarlGrey.xcscheme", "ExampleEarlGrey").unwrap();
        assert_eq!(edited.changes, vec![Change::SchemeShared { scheme: "ExampleEarlGrey.xcscheme".into() }]);
    }

    #[test]
    fn scheme_name_needs_extension() {
        assert_eq!(
            ensure_shared_scheme(example(), "ExampleEarlGrey", "ExampleEarlGrey").unwrap_err(),
            ModelError::InvalidSchemeName("ExampleEarlGrey".into())
        );
        assert!(ensure_shared_scheme(example(), ".xcscheme", "ExampleEarlGrey").is_err());
    }

    #[test]
    fn chained_edits_accumulate_changes_and_validate() {
        let edited = Edited::unchanged(example())
            .then(|p| ensure_test_target(p, "ExampleEarlGrey"))
            .and_then(|e| e.then(|p| ensure_target_dependency(p, "ExampleEarlGrey", &earlgrey("1.15.0"))))
            .and_then(|e| e.then(|p| ensure_shared_scheme(p, "ExampleEarlGrey.xcscheme", "ExampleEarlGrey")))
            .unwrap();
        assert_eq!(edited.changes.len(), 8);
        edited
            .project
            .validate_ui_test_wiring("ExampleEarlGrey", "ExampleEarlGrey.xcscheme")
            .unwrap();
    }

    #[test]
    fn validation_catches_unshared_scheme() {
        let mut project = ensure_test_target(example(), "T").unwrap().project;
        project.schemes.push(Scheme {
            name: "T.xcscheme".into(),
            shared: false,
            build_targets: vec![],
            test_targets: vec!["T".into()],
        });
        assert!(matches!(
            project.validate_ui_test_wiring("T", "T.xcscheme"),
            Err(ModelError::Invariant(_))
        ));
    }

    #[test]
    fn descriptor_json_defaults_optional_lists() {
        let project: ProjectDescriptor = serde_json::from_str(
            r#"{"name":"Example","targets":[{"name":"Example","kind":"application"}]}"#,
        )
        .unwrap();
        assert_eq!(project, example());
    }
}
