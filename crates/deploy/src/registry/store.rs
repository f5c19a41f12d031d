//! A keyed JSON document persisted with a full rewrite on every mutation.

use std::{
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{DeployError, DeployResult},
    fs::FsHandler,
};

/// A `(section, field)` pair that holds no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no `{field}` recorded under section `{section}`")]
pub struct NotFound {
    pub section: String,
    pub field: String,
}

impl From<NotFound> for DeployError {
    fn from(NotFound { section, field }: NotFound) -> Self {
        DeployError::MissingDependency { section, field }
    }
}

/// Section name to `{ field: value }`, in insertion order.
///
/// Top-level entries that are not objects are kept verbatim but are not
/// addressable as sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryDocument(IndexMap<String, Value>);

impl RegistryDocument {
    pub fn get(&self, section: &str, field: &str) -> Option<&Value> {
        self.section(section)?.get(field)
    }

    pub fn section(&self, section: &str) -> Option<&Map<String, Value>> {
        self.0.get(section)?.as_object()
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, value)| value.is_object())
            .map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert `value` under `(section, field)`.
    ///
    /// Creates the section if absent. Fails if `section` names a non-object
    /// entry, which is never overwritten.
    pub fn insert(&mut self, section: &str, field: &str, value: Value) -> io::Result<Insertion> {
        let created_section = !self.0.contains_key(section);
        let entry = self
            .0
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        let fields = entry.as_object_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("registry entry `{section}` is not a section"),
            )
        })?;

        Ok(Insertion {
            previous: fields.insert(field.to_string(), value),
            created_section,
        })
    }

    /// Undo an [`RegistryDocument::insert`].
    fn restore(&mut self, section: &str, field: &str, insertion: Insertion) {
        if insertion.created_section {
            self.0.shift_remove(section);
            return;
        }

        let Some(fields) = self.0.get_mut(section).and_then(Value::as_object_mut) else {
            return;
        };
        match insertion.previous {
            Some(value) => {
                fields.insert(field.to_string(), value);
            }
            None => {
                fields.remove(field);
            }
        }
    }
}

/// What [`RegistryDocument::insert`] replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    /// The value previously stored under the field.
    pub previous: Option<Value>,
    /// Whether the section did not exist before.
    pub created_section: bool,
}

/// A [`RegistryDocument`] bound to its backing file.
///
/// The file is read once in [`RegistryStore::open`]. Afterwards the in-memory
/// copy is authoritative and every [`RegistryStore::set`] rewrites the whole
/// file before returning, so the two never diverge.
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    document: RegistryDocument,
}

impl RegistryStore {
    /// Load the document at `path`; a missing or empty file yields an empty document.
    pub fn open(path: impl Into<PathBuf>) -> DeployResult<Self> {
        let path = path.into();

        let document = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => RegistryDocument::default(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| DeployError::Registry {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No registry document yet, starting empty");
                RegistryDocument::default()
            }
            Err(e) => {
                return Err(DeployError::Registry {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        tracing::debug!(
            path = %path.display(),
            sections = document.sections().count(),
            "Registry document loaded"
        );

        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &RegistryDocument {
        &self.document
    }

    pub fn get(&self, section: &str, field: &str) -> Result<&Value, NotFound> {
        self.document.get(section, field).ok_or_else(|| NotFound {
            section: section.to_string(),
            field: field.to_string(),
        })
    }

    /// Merge `value` into `(section, field)` and persist the whole document.
    ///
    /// An existing value is overwritten. If the write fails the in-memory
    /// document is rolled back, so it keeps matching what is on disk.
    pub fn set(&mut self, section: &str, field: &str, value: impl Into<Value>) -> io::Result<()> {
        let insertion = self.document.insert(section, field, value.into())?;
        let overwritten = insertion.previous.is_some();

        if let Err(e) = self.persist() {
            self.document.restore(section, field, insertion);
            return Err(e);
        }

        if overwritten {
            tracing::debug!(section, field, path = %self.path.display(), "Registry entry overwritten");
        } else {
            tracing::debug!(section, field, path = %self.path.display(), "Registry entry written");
        }

        Ok(())
    }

    fn persist(&self) -> io::Result<()> {
        let mut content = serde_json::to_string_pretty(&self.document).map_err(io::Error::other)?;
        content.push('\n');
        FsHandler::write_atomic(&self.path, content.as_bytes())
    }
}
