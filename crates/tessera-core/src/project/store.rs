//! On-disk location, loading and persisting of project descriptors.
//!
//! A project named `Example` under `root` lives at
//! `root/Example.xcodeproj/project.json`. Shared schemes the caller asks for
//! are also rendered as XML into `root/Example.xcodeproj/xcshareddata/xcschemes/`;
//! other scheme files in that directory are never rewritten.
//!
//! Persisting stages every file next to its destination first and only
//! renames once all of them were written, with the descriptor renamed last.
//! A failure while staging leaves the previous files untouched.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::model::{ProjectDescriptor, TargetKind};

pub const BUNDLE_EXTENSION: &str = "xcodeproj";
pub const DESCRIPTOR_FILE: &str = "project.json";
const SHARED_SCHEMES_DIR: &str = "xcshareddata/xcschemes";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("project descriptor not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed project descriptor {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize project descriptor: {0}")]
    Serialize(#[source] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Projects stored under one root directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root/<name>.xcodeproj`
    pub fn bundle_dir(&self, project_name: &str) -> PathBuf {
        self.root.join(format!("{project_name}.{BUNDLE_EXTENSION}"))
    }

    pub fn descriptor_path(&self, project_name: &str) -> PathBuf {
        self.bundle_dir(project_name).join(DESCRIPTOR_FILE)
    }

    pub fn shared_scheme_path(&self, project_name: &str, scheme: &str) -> PathBuf {
        self.bundle_dir(project_name).join(SHARED_SCHEMES_DIR).join(scheme)
    }

    pub fn load(&self, project_name: &str) -> Result<ProjectDescriptor, StoreError> {
        let path = self.descriptor_path(project_name);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StoreError::NotFound(path)),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let project = serde_json::from_str(&text).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "project descriptor loaded");
        Ok(project)
    }

    /// Whether the rendered XML of `scheme` exists and lists `test_target`
    /// as a testable.
    pub fn shared_scheme_is_current(&self, project_name: &str, scheme: &str, test_target: &str) -> bool {
        let path = self.shared_scheme_path(project_name, scheme);
        let Ok(xml) = std::fs::read_to_string(&path) else {
            return false;
        };
        let blueprint = format!("BlueprintName = \"{}\"", escape_attr(test_target));
        xml.split("<TestableReference").skip(1).any(|testable| testable.contains(&blueprint))
    }

    /// Writes the descriptor back under `project_name`, the name it was
    /// loaded from, together with the XML of the shared schemes listed in
    /// `schemes`.
    ///
    /// Scheme files not listed are left alone.
    pub fn persist(
        &self,
        project_name: &str,
        project: &ProjectDescriptor,
        schemes: &[&str],
    ) -> Result<(), StoreError> {
        let mut files = Vec::new();
        for scheme in project.schemes.iter().filter(|s| s.shared && schemes.contains(&s.name.as_str())) {
            files.push((
                self.shared_scheme_path(project_name, &scheme.name),
                render_scheme_xml(project_name, project, &scheme.name),
            ));
        }
        let json = serde_json::to_string_pretty(project).map_err(StoreError::Serialize)?;
        // Descriptor last: it is only replaced once every scheme is in place.
        files.push((self.descriptor_path(project_name), json + "\n"));

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
        for (dest, contents) in &files {
            match stage(dest, contents) {
                Ok(tmp) => staged.push((tmp, dest.clone())),
                Err(e) => {
                    discard(&staged);
                    return Err(e);
                }
            }
        }

        for (i, (tmp, dest)) in staged.iter().enumerate() {
            if let Err(source) = std::fs::rename(tmp, dest) {
                discard(&staged[i..]);
                return Err(StoreError::Io {
                    path: dest.clone(),
                    source,
                });
            }
            debug!(path = %dest.display(), "written");
        }
        Ok(())
    }
}

/// Writes `contents` to a temporary sibling of `dest` and returns its path.
fn stage(dest: &Path, contents: &str) -> Result<PathBuf, StoreError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;

    let file_name = dest.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    if let Err(source) = std::fs::write(&tmp, contents) {
        std::fs::remove_file(&tmp).ok();
        return Err(StoreError::Io { path: tmp, source });
    }
    Ok(tmp)
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        if let Err(e) = std::fs::remove_file(tmp) {
            warn!(path = %tmp.display(), error = %e, "failed to remove staged file");
        }
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn product_name(project: &ProjectDescriptor, target: &str) -> String {
    let extension = match project.target(target).map(|t| t.kind) {
        Some(TargetKind::Application) => "app",
        Some(TargetKind::Framework) => "framework",
        _ => "xctest",
    };
    format!("{target}.{extension}")
}

fn buildable_reference(out: &mut String, indent: &str, container: &str, project: &ProjectDescriptor, target: &str) {
    let _ = writeln!(out, "{indent}<BuildableReference");
    let _ = writeln!(out, "{indent}   BuildableIdentifier = \"primary\"");
    let _ = writeln!(out, "{indent}   BuildableName = \"{}\"", escape_attr(&product_name(project, target)));
    let _ = writeln!(out, "{indent}   BlueprintName = \"{}\"", escape_attr(target));
    let _ = writeln!(
        out,
        "{indent}   ReferencedContainer = \"container:{}.{BUNDLE_EXTENSION}\">",
        escape_attr(container)
    );
    let _ = writeln!(out, "{indent}</BuildableReference>");
}

/// Renders the scheme named `scheme` in Xcode's scheme XML format, with
/// targets referenced from the `<container>.xcodeproj` bundle.
///
/// Returns a scheme with empty build and test actions if `project` has no
/// such scheme.
pub fn render_scheme_xml(container: &str, project: &ProjectDescriptor, scheme: &str) -> String {
    let (build_targets, test_targets) = project
        .scheme(scheme)
        .map(|s| (s.build_targets.as_slice(), s.test_targets.as_slice()))
        .unwrap_or_default();

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<Scheme\n   version = \"1.7\">\n");

    out.push_str("   <BuildAction\n      parallelizeBuildables = \"YES\"\n      buildImplicitDependencies = \"YES\">\n");
    out.push_str("      <BuildActionEntries>\n");
    for target in build_targets {
        let testing_only = test_targets.contains(target);
        let running = if testing_only { "NO" } else { "YES" };
        let _ = writeln!(out, "         <BuildActionEntry");
        let _ = writeln!(out, "            buildForTesting = \"YES\"");
        let _ = writeln!(out, "            buildForRunning = \"{running}\">");
        buildable_reference(&mut out, "            ", container, project, target);
        out.push_str("         </BuildActionEntry>\n");
    }
    out.push_str("      </BuildActionEntries>\n");
    out.push_str("   </BuildAction>\n");

    out.push_str("   <TestAction\n      buildConfiguration = \"Debug\">\n");
    out.push_str("      <Testables>\n");
    for target in test_targets {
        out.push_str("         <TestableReference\n            skipped = \"NO\">\n");
        buildable_reference(&mut out, "            ", container, project, target);
        out.push_str("         </TestableReference>\n");
    }
    out.push_str("      </Testables>\n");
    out.push_str("   </TestAction>\n");
    out.push_str("</Scheme>\n");
    out
}
