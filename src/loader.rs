//! Contract for the isolated module loader collaborator.
//!
//! Executing arbitrary user code (file reads, network calls, async work) is
//! deliberately outside this crate. The pipeline hands the loader an entry
//! path plus per-file content overrides and gets back resolved export values
//! and the transitive dependency file list it touched.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::value::Value;

/// Failure reported by the evaluation context. The message and stack are
/// surfaced verbatim in the build error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LoadError {
    pub message: String,
    pub stack: Option<String>,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        LoadError {
            message: message.into(),
            stack: None,
        }
    }
}

/// Result of executing a module graph.
#[derive(Debug, Clone, Default)]
pub struct LoadedModule {
    /// Resolved value of every named export of the entry module.
    pub exports: BTreeMap<String, Value>,
    /// Every file the loader touched while resolving and executing.
    pub dependencies: Vec<PathBuf>,
}

/// Result of executing an external compile-time module's default export.
#[derive(Debug, Clone, Default)]
pub struct CompileTimeOutput {
    /// Value to serialize as a literal.
    pub data: Option<Value>,
    /// Generated code to splice verbatim; consulted when `data` is absent.
    pub code: Option<String>,
    /// Extra files the module wants watched.
    pub watch_files: Vec<PathBuf>,
    /// Files the loader touched while executing the module.
    pub dependencies: Vec<PathBuf>,
}

pub trait ModuleLoader {
    /// Resolves a specifier relative to the importing file.
    fn resolve(&mut self, specifier: &str, importer: &Path) -> Option<PathBuf>;

    /// Bundles and executes `entry`, reading file contents from `overrides`
    /// where present and from disk otherwise. The entry is keyed by its real
    /// path so relative imports resolve correctly.
    fn load(
        &mut self,
        entry: &Path,
        overrides: &HashMap<PathBuf, String>,
    ) -> Result<LoadedModule, LoadError>;

    /// Executes an external compile-time module: its default export is
    /// called with the project root and its result describes what to splice.
    fn load_compile_time_module(
        &mut self,
        target: &Path,
        root: &Path,
    ) -> Result<CompileTimeOutput, LoadError>;
}
