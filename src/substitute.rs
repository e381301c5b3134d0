//! Phase two of the transform: evaluate the recorded call sites and splice
//! the resulting literals into the original text.
//!
//! The executable variant is synthesized from the ORIGINAL snapshot, not the
//! stubbed output: a result-bag export and a permissive marker definition
//! are prepended, and every matched call is prefixed with an assignment that
//! awaits its value into the bag. The loader runs that variant keyed by the
//! real file path so relative imports resolve normally.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::cache::{CacheEntry, CacheKey, EvalCache};
use crate::error::{TransformError, TransformResult};
use crate::extract::Match;
use crate::loader::ModuleLoader;
use crate::options::Options;
use crate::patch::Patcher;
use crate::session::{PendingFile, Transformed};
use crate::stringify::{string_literal, stringify_value};
use crate::value::Value;

/// Export name of the synthesized result bag.
pub const DATA_EXPORT: &str = "__compile_time_data__";

/// Builds the executable variant of the original text.
pub fn build_probe(source: &str, matches: &[Match]) -> String {
    let mut patcher = Patcher::new(source);
    patcher.insert_before(
        0,
        format!(
            "export const {DATA_EXPORT} = {{}};const {} = (fn) => typeof fn === \"function\" ? fn() : fn;",
            crate::extract::MARKER
        ),
    );
    for m in matches {
        patcher.insert_before(
            m.start,
            format!("{DATA_EXPORT}[{}] = await ", string_literal(&m.name)),
        );
    }
    patcher.apply()
}

pub fn replace_with_data(
    file_path: &Path,
    pending: &PendingFile,
    options: &Options,
    cache: &mut EvalCache,
    loader: &mut dyn ModuleLoader,
) -> TransformResult<Transformed> {
    let file = file_path.display().to_string();
    let fingerprint = EvalCache::compute_fingerprint(&pending.source);

    let mut literals: Vec<String> = Vec::with_capacity(pending.matches.len());
    let mut dependencies: HashSet<PathBuf> = HashSet::new();
    let mut hit = true;
    for index in 0..pending.matches.len() {
        let key = CacheKey::Inline(file_path.to_path_buf(), index);
        match cache.get(&key, Some(&fingerprint)) {
            Some(entry) => {
                literals.push(entry.output.clone());
                dependencies.extend(entry.dependencies.iter().cloned());
            }
            None => {
                hit = false;
                break;
            }
        }
    }

    if hit {
        tracing::debug!(file = %file, "compile-time results served from cache");
    } else {
        literals.clear();
        dependencies.clear();

        let augmented = build_probe(&pending.source, &pending.matches);
        let mut overrides = HashMap::new();
        overrides.insert(file_path.to_path_buf(), augmented);

        let loaded = loader
            .load(file_path, &overrides)
            .map_err(|e| TransformError::evaluation(&file, e))?;
        let bag = loaded
            .exports
            .get(DATA_EXPORT)
            .cloned()
            .unwrap_or_else(|| Value::object(Vec::<(String, Value)>::new()));

        dependencies.extend(loaded.dependencies.iter().cloned());
        dependencies.insert(file_path.to_path_buf());

        for (index, m) in pending.matches.iter().enumerate() {
            // A slot the module never assigned resolves to `undefined`.
            let value = bag.get(&m.name).unwrap_or_else(Value::undefined);
            let literal = stringify_value(&value)?;
            cache.insert(
                CacheKey::Inline(file_path.to_path_buf(), index),
                CacheEntry {
                    output: literal.clone(),
                    dependencies: dependencies.clone(),
                    fingerprint: Some(fingerprint.clone()),
                },
            );
            literals.push(literal);
        }
        tracing::debug!(file = %file, matches = literals.len(), "evaluated compile-time call sites");
    }

    let mut patcher = Patcher::new(&pending.source);
    for (m, literal) in pending.matches.iter().zip(&literals) {
        patcher.replace(m.start, m.end, literal.clone());
    }

    if options.use_source_map {
        let (code, map) = patcher.apply_with_map(&file);
        Ok(Transformed {
            code,
            map: Some(map),
            dependencies: Vec::new(),
        })
    } else {
        let mut dependencies: Vec<PathBuf> = dependencies.into_iter().collect();
        dependencies.sort();
        Ok(Transformed {
            code: patcher.apply(),
            map: None,
            dependencies,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
use napi_derive::napi;

#[cfg(feature = "napi")]
#[napi]
pub fn build_probe_native(source: String, matches: serde_json::Value) -> napi::Result<String> {
    let matches: Vec<Match> =
        serde_json::from_value(matches).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    Ok(build_probe(&source, &matches))
}

/// Splices pre-evaluated values into the original text. JS hosts that run
/// the probe themselves hand the bag contents back through this entry point.
#[cfg(feature = "napi")]
#[napi]
pub fn splice_values_native(
    source: String,
    matches: serde_json::Value,
    values: serde_json::Value,
    file_path: String,
    use_source_map: bool,
) -> napi::Result<serde_json::Value> {
    let matches: Vec<Match> =
        serde_json::from_value(matches).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let mut patcher = Patcher::new(&source);
    for m in &matches {
        let value = values
            .get(&m.name)
            .map(Value::from_json)
            .unwrap_or_else(Value::undefined);
        let literal =
            stringify_value(&value).map_err(|e| napi::Error::from_reason(e.to_string()))?;
        patcher.replace(m.start, m.end, literal);
    }
    let (code, map) = if use_source_map {
        let (code, map) = patcher.apply_with_map(&file_path);
        (code, Some(map))
    } else {
        (patcher.apply(), None)
    };
    Ok(serde_json::json!({ "code": code, "map": map }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
