//! Per-build session state: the registry populated by phase one and the
//! result cache consulted by phase two.
//!
//! One session lives for one build or watch run. `reset()` is bound to
//! "build start" and clears both maps unconditionally; in-flight work is not
//! interrupted, its eventual writes just become moot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cache::EvalCache;
use crate::compile_file;
use crate::error::TransformResult;
use crate::extract::{self, Match};
use crate::include;
use crate::loader::ModuleLoader;
use crate::options::Options;
use crate::substitute;

/// A file's state between the two passes: the original source snapshot and
/// the ordered call sites recorded against it.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub source: String,
    pub matches: Vec<Match>,
}

/// Result of a transform operation. Exactly one of `map` and `dependencies`
/// is populated, per [`Options::use_source_map`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformed {
    pub code: String,
    pub map: Option<serde_json::Value>,
    pub dependencies: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct Session {
    options: Options,
    registry: HashMap<PathBuf, PendingFile>,
    cache: EvalCache,
}

impl Session {
    pub fn new(options: Options) -> Self {
        Session {
            options,
            registry: HashMap::new(),
            cache: EvalCache::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Phase one. Stubs marked calls and records them in the registry,
    /// replacing any prior entry for the path. Returns `None` when the file
    /// passes through untouched.
    pub fn insert_placeholders(
        &mut self,
        code: &str,
        file_path: &Path,
    ) -> TransformResult<Option<Transformed>> {
        self.registry.remove(file_path);
        let Some(extraction) = extract::extract(code, file_path, self.options.use_source_map)?
        else {
            return Ok(None);
        };
        self.registry.insert(
            file_path.to_path_buf(),
            PendingFile {
                source: code.to_string(),
                matches: extraction.matches,
            },
        );
        Ok(Some(Transformed {
            code: extraction.code,
            map: extraction.map,
            dependencies: Vec::new(),
        }))
    }

    /// Phase two. Requires a registry entry written by
    /// [`Session::insert_placeholders`] for this exact path; silently skips
    /// files that have none.
    pub fn replace_with_data(
        &mut self,
        file_path: &Path,
        loader: &mut dyn ModuleLoader,
    ) -> TransformResult<Option<Transformed>> {
        if !extract::is_supported(file_path) {
            return Ok(None);
        }
        let Some(pending) = self.registry.get(file_path) else {
            return Ok(None);
        };
        if pending.matches.is_empty() {
            return Ok(None);
        }
        substitute::replace_with_data(file_path, pending, &self.options, &mut self.cache, loader)
            .map(Some)
    }

    /// Expands `import.meta.compileTime("...")` references.
    pub fn apply_includes(
        &mut self,
        code: &str,
        file_path: &Path,
        loader: &mut dyn ModuleLoader,
    ) -> TransformResult<Option<Transformed>> {
        include::apply_includes(code, file_path, &self.options, &mut self.cache, loader)
    }

    /// Evaluates a whole-file-convention module and regenerates it as
    /// literal exports.
    pub fn compile_file(
        &mut self,
        code: &str,
        file_path: &Path,
        loader: &mut dyn ModuleLoader,
    ) -> TransformResult<Option<Transformed>> {
        compile_file::evaluate(code, file_path, &self.options, loader)
    }

    /// File-change notification from the watcher: evicts every cached result
    /// that tracked the file.
    pub fn invalidate(&mut self, changed: &Path) {
        let evicted = self.cache.invalidate(changed);
        if evicted > 0 {
            tracing::debug!(file = %changed.display(), evicted, "invalidated compile-time results");
        }
    }

    /// Clears all session state. Invoked at build start.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.cache.reset();
    }

    /// Registry snapshot for a path, if phase one recorded one.
    pub fn pending(&self, file_path: &Path) -> Option<&PendingFile> {
        self.registry.get(file_path)
    }
}
