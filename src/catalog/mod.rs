//! Language catalog
//!
//! Loaded once at startup from a directory containing one subdirectory per
//! language. Each subdirectory holds a `meta.json` descriptor plus the
//! compile and run scripts it references. The catalog is read-only after
//! load and can be shared across threads without locking.

mod descriptor;

pub use descriptor::{LanguageDescriptor, LanguageMeta, META_FILE};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use codefort_core::{CodefortError, Result};
use log::{debug, info};

/// Registry of supported languages keyed by case-folded id
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    root: PathBuf,
    languages: BTreeMap<String, LanguageDescriptor>,
}

impl LanguageCatalog {
    /// Load every language directory beneath `root`.
    ///
    /// Non-directory entries are ignored. Any malformed descriptor fails the
    /// whole load.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = fs::canonicalize(root).map_err(|e| {
            CodefortError::Catalog(format!(
                "Cannot open languages directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let mut descriptors = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let id = entry.file_name().to_string_lossy().into_owned();
            let dir = entry.path();
            let meta_path = dir.join(META_FILE);
            let raw = fs::read_to_string(&meta_path).map_err(|e| {
                CodefortError::Catalog(format!("{}: cannot read {}: {}", id, META_FILE, e))
            })?;
            let meta: LanguageMeta = serde_json::from_str(&raw).map_err(|e| {
                CodefortError::Catalog(format!("{}: invalid {}: {}", id, META_FILE, e))
            })?;

            let descriptor = LanguageDescriptor::from_meta(&id, &dir, meta)?;
            debug!(
                "loaded language {} ({}, compiled: {})",
                descriptor.id,
                descriptor.name,
                descriptor.has_compile_step()
            );
            descriptors.push(descriptor);
        }

        let catalog = Self::from_descriptors(root, descriptors)?;
        info!(
            "language catalog loaded from {}: {} language(s)",
            catalog.root.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Build a catalog from already validated descriptors.
    pub fn from_descriptors(
        root: impl Into<PathBuf>,
        descriptors: impl IntoIterator<Item = LanguageDescriptor>,
    ) -> Result<Self> {
        let mut languages = BTreeMap::new();
        for descriptor in descriptors {
            let key = descriptor.id.to_lowercase();
            if languages.contains_key(&key) {
                return Err(CodefortError::Catalog(format!(
                    "duplicate language id: {}",
                    descriptor.id
                )));
            }
            languages.insert(key, descriptor);
        }

        Ok(Self {
            root: root.into(),
            languages,
        })
    }

    /// Find a language by id, ignoring ASCII case.
    pub fn lookup(&self, id: &str) -> Result<&LanguageDescriptor> {
        self.languages
            .get(&id.to_lowercase())
            .ok_or_else(|| CodefortError::LanguageNotFound(id.to_string()))
    }

    /// Descriptors in id order
    pub fn iter(&self) -> impl Iterator<Item = &LanguageDescriptor> {
        self.languages.values()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Directory the catalog was loaded from; granted read-only to every sandbox
    pub fn root(&self) -> &Path {
        &self.root
    }
}
