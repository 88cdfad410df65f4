//! Dependency registry: turns a name and version pin into a concrete
//! [`DependencyRef`].
//!
//! A pin is either an exact version (`1.15.0`), a prefix wildcard (`1.x`,
//! `1.15.x`) or `*`. When several releases match, the highest wins.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::model::DependencyRef;

const EARLGREY_SOURCE: &str = "https://github.com/google/EarlGrey.git";

/// Releases known without an index file.
const BUILTIN: &[(&str, &str, &str)] = &[
    ("EarlGrey", "1.12.0", EARLGREY_SOURCE),
    ("EarlGrey", "1.13.0", EARLGREY_SOURCE),
    ("EarlGrey", "1.14.0", EARLGREY_SOURCE),
    ("EarlGrey", "1.15.0", EARLGREY_SOURCE),
    ("EarlGrey", "1.15.1", EARLGREY_SOURCE),
    ("EarlGrey", "1.16.0", EARLGREY_SOURCE),
];

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no release of '{name}' matches '{version}'")]
    NotFound { name: String, version: String },

    #[error("cannot read registry index {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid registry index {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolves dependency pins.
pub trait DependencyRegistry {
    fn resolve(&self, name: &str, version: &str) -> Result<DependencyRef, RegistryError>;
}

/// One published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub version: String,
    pub source: String,
}

/// Registry over an in-memory list of releases.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    entries: Vec<RegistryEntry>,
}

impl StaticRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    /// The built-in EarlGrey releases.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(name, version, source)| RegistryEntry {
                    name: name.to_string(),
                    version: version.to_string(),
                    source: source.to_string(),
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }
}

impl DependencyRegistry for StaticRegistry {
    fn resolve(&self, name: &str, version: &str) -> Result<DependencyRef, RegistryError> {
        let best = self
            .entries
            .iter()
            .filter(|e| e.name.eq_ignore_ascii_case(name) && pin_matches(version, &e.version))
            .max_by(|a, b| compare_versions(&a.version, &b.version));

        match best {
            Some(entry) => {
                debug!(name, pin = version, resolved = %entry.version, "dependency resolved");
                Ok(DependencyRef {
                    name: entry.name.clone(),
                    version: entry.version.clone(),
                    source: entry.source.clone(),
                })
            }
            None => Err(RegistryError::NotFound {
                name: name.to_string(),
                version: version.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    packages: Vec<RegistryEntry>,
}

/// Registry loaded from a JSON index of the form
/// `{"packages": [{"name": ..., "version": ..., "source": ...}]}`.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
    inner: StaticRegistry,
}

impl FileRegistry {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index: IndexFile = serde_json::from_str(&text).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), packages = index.packages.len(), "registry index loaded");
        Ok(Self {
            path: path.to_path_buf(),
            inner: StaticRegistry::new(index.packages),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DependencyRegistry for FileRegistry {
    fn resolve(&self, name: &str, version: &str) -> Result<DependencyRef, RegistryError> {
        self.inner.resolve(name, version)
    }
}

impl<R: DependencyRegistry + ?Sized> DependencyRegistry for Box<R> {
    fn resolve(&self, name: &str, version: &str) -> Result<DependencyRef, RegistryError> {
        (**self).resolve(name, version)
    }
}

/// Whether `version` satisfies `pin`.
pub fn pin_matches(pin: &str, version: &str) -> bool {
    let pin = pin.trim();
    if pin == "*" || pin.is_empty() {
        return true;
    }
    match pin.strip_suffix(".x") {
        Some(prefix) => {
            let want: Vec<&str> = prefix.split('.').collect();
            let have: Vec<&str> = version.split('.').collect();
            have.len() > want.len() && want.iter().zip(&have).all(|(w, h)| w == h)
        }
        None => pin == version,
    }
}

/// Orders dotted versions numerically, component by component.
///
/// Non-numeric components compare as text.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
