//! Language descriptors and their on-disk `meta.json` schema

use std::path::{Component, Path, PathBuf};

use codefort_core::{CodefortError, Result};
use serde::Deserialize;

/// Name of the descriptor file inside each language directory
pub const META_FILE: &str = "meta.json";

/// Raw `meta.json` contents, validated against a fixed schema
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LanguageMeta {
    /// Free-form note for catalog maintainers
    #[serde(rename = "#comment", default)]
    pub comment: Option<String>,
    /// Display name
    pub name: String,
    /// File the submitted source is written to
    pub file_name: String,
    /// Extra host paths the toolchain needs, granted read-only
    #[serde(default)]
    pub needed_dirs: Vec<PathBuf>,
    /// Compile script, relative to the language directory
    #[serde(default)]
    pub compile_script: Option<String>,
    /// Run script, relative to the language directory
    pub run_script: String,
}

/// How to compile and run one supported language.
///
/// Immutable after catalog load; all script paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDescriptor {
    /// Unique id (the directory name)
    pub id: String,
    pub name: String,
    pub file_name: String,
    pub needed_dirs: Vec<PathBuf>,
    pub compile_path: Option<PathBuf>,
    pub run_path: PathBuf,
    /// The language's own directory
    pub root: PathBuf,
}

impl LanguageDescriptor {
    /// Validate `meta` and resolve its scripts against `dir`.
    pub fn from_meta(id: &str, dir: &Path, meta: LanguageMeta) -> Result<Self> {
        let invalid = |msg: String| CodefortError::Catalog(format!("{}: {}", id, msg));

        if id.is_empty() {
            return Err(CodefortError::Catalog("empty language id".to_string()));
        }
        if meta.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if !is_plain_file_name(&meta.file_name) {
            return Err(invalid(format!(
                "fileName must be a bare file name, got {:?}",
                meta.file_name
            )));
        }
        if let Some(dir) = meta.needed_dirs.iter().find(|d| !d.is_absolute()) {
            return Err(invalid(format!(
                "neededDirs entries must be absolute, got {}",
                dir.display()
            )));
        }

        let compile_path = meta
            .compile_script
            .as_deref()
            .map(|script| resolve_script(dir, script))
            .transpose()
            .map_err(invalid)?;
        let run_path = resolve_script(dir, &meta.run_script).map_err(invalid)?;

        Ok(Self {
            id: id.to_string(),
            name: meta.name,
            file_name: meta.file_name,
            needed_dirs: meta.needed_dirs,
            compile_path,
            run_path,
            root: dir.to_path_buf(),
        })
    }

    pub fn has_compile_step(&self) -> bool {
        self.compile_path.is_some()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('/')
}

/// Resolve `script` inside `dir`, refusing anything that could escape it.
fn resolve_script(dir: &Path, script: &str) -> std::result::Result<PathBuf, String> {
    let relative = Path::new(script);
    if script.is_empty()
        || !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(format!(
            "script path must be relative to the language directory, got {:?}",
            script
        ));
    }

    let path = dir.join(relative);
    if !path.is_file() {
        return Err(format!("script {} does not exist", path.display()));
    }
    Ok(path)
}
