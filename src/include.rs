//! The `import.meta.compileTime("path")` surface: each occurrence resolves
//! to an external module whose default export runs once at build time and
//! decides what gets spliced (serialized data, verbatim code, or `null`).
//!
//! Results are cached per resolved target file, so repeated references to
//! the same module across the project reuse one execution.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::cache::{CacheEntry, CacheKey, EvalCache};
use crate::error::{TransformError, TransformResult};
use crate::extract::is_supported;
use crate::loader::ModuleLoader;
use crate::options::Options;
use crate::patch::Patcher;
use crate::session::Transformed;
use crate::stringify::stringify_value;

lazy_static! {
    /// Tolerates a type argument and a trailing comma, the shapes the
    /// TypeScript surface produces.
    pub(crate) static ref INCLUDE_RE: Regex =
        Regex::new(r#"import\.meta\.compileTime(?:<\w*>)?\(\s*['"`]([^'"`]+)['"`],?\s*\)"#)
            .unwrap();
}

pub fn apply_includes(
    code: &str,
    file_path: &Path,
    options: &Options,
    cache: &mut EvalCache,
    loader: &mut dyn ModuleLoader,
) -> TransformResult<Option<Transformed>> {
    let file = file_path.display().to_string();
    if file.contains("node_modules") || !is_supported(file_path) {
        return Ok(None);
    }

    let captures: Vec<(usize, usize, String)> = INCLUDE_RE
        .captures_iter(code)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            (whole.start(), whole.end(), caps[1].to_string())
        })
        .collect();
    if captures.is_empty() {
        return Ok(None);
    }

    let mut patcher = Patcher::new(code);
    let mut dependencies: HashSet<PathBuf> = HashSet::new();

    for (start, end, specifier) in captures {
        let resolved =
            loader
                .resolve(&specifier, file_path)
                .ok_or_else(|| TransformError::Resolution {
                    file: file.clone(),
                    specifier: specifier.clone(),
                })?;
        let key = CacheKey::External(resolved.clone());

        let entry = match cache.get(&key, None) {
            Some(entry) => entry.clone(),
            None => {
                let output = loader
                    .load_compile_time_module(&resolved, &options.root)
                    .map_err(|e| TransformError::evaluation(&file, e))?;
                let literal = if let Some(data) = &output.data {
                    stringify_value(data)?
                } else if let Some(code) = &output.code {
                    code.clone()
                } else {
                    "null".to_string()
                };
                let mut watch: HashSet<PathBuf> = HashSet::new();
                watch.insert(resolved.clone());
                watch.extend(output.watch_files.iter().cloned());
                watch.extend(output.dependencies.iter().cloned());
                let entry = CacheEntry {
                    output: literal,
                    dependencies: watch,
                    fingerprint: None,
                };
                cache.insert(key, entry.clone());
                tracing::debug!(target = %resolved.display(), "evaluated compile-time module");
                entry
            }
        };

        dependencies.extend(entry.dependencies.iter().cloned());
        patcher.replace(start as u32, end as u32, entry.output);
    }

    if options.use_source_map {
        let (out, map) = patcher.apply_with_map(&file);
        Ok(Some(Transformed {
            code: out,
            map: Some(map),
            dependencies: Vec::new(),
        }))
    } else {
        let mut dependencies: Vec<PathBuf> = dependencies.into_iter().collect();
        dependencies.sort();
        Ok(Some(Transformed {
            code: patcher.apply(),
            map: None,
            dependencies,
        }))
    }
}
