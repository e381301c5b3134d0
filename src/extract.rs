//! Phase one of the transform: locate compile-time call sites, validate
//! their usage shape, stub them out, and drop declarations that only fed
//! the stubbed calls.
//!
//! Spans recorded here point into the ORIGINAL text. Phase two re-reads the
//! original snapshot, never the stubbed output, so the stubbed code handed
//! to the bundler can be rewritten freely by later stages.

use std::collections::HashSet;
use std::path::Path;

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    AwaitExpression, BindingPattern, CallExpression, Expression, IdentifierReference, TSTypeName,
    VariableDeclarator,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::compile_file::is_compile_file;
use crate::dce;
use crate::error::{TransformError, TransformResult};
use crate::patch::Patcher;

/// The compile-time marker identifier.
pub const MARKER: &str = "compileTime";

pub(crate) const MARKER_CALL: &str = "compileTime(";

lazy_static! {
    static ref EXTENSIONS_RE: Regex =
        Regex::new(r"\.(([jt]sx?)|mjs|cjs|mts|cts|vue|astro|svelte)$").unwrap();
}

pub(crate) fn is_supported(path: &Path) -> bool {
    EXTENSIONS_RE.is_match(&path.to_string_lossy())
}

pub(crate) fn source_type_for(path: &Path) -> SourceType {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let base = SourceType::default().with_module(true);
    match ext {
        "ts" | "mts" | "cts" => base.with_typescript(true),
        "tsx" => base.with_typescript(true).with_jsx(true),
        "jsx" => base.with_jsx(true),
        // Framework single-file components reach this pass pre-transformed;
        // parse with the widest grammar.
        "vue" | "astro" | "svelte" => base.with_typescript(true).with_jsx(true),
        _ => base,
    }
}

/// One recorded compile-time call site. `start`/`end` are byte offsets of
/// the whole `compileTime(...)` call expression in the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub name: String,
    pub start: u32,
    pub end: u32,
}

/// Output of a successful extraction pass.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub code: String,
    pub map: Option<serde_json::Value>,
    pub matches: Vec<Match>,
}

/// Parses `code`, stubs every valid `compileTime(...)` call with `null`, and
/// removes top-level declarations that no longer have any reader. Returns
/// `None` when the file is not eligible or contains no marker calls.
pub fn extract(
    code: &str,
    file_path: &Path,
    use_source_map: bool,
) -> TransformResult<Option<Extraction>> {
    if !code.contains(MARKER_CALL) || !is_supported(file_path) || is_compile_file(file_path) {
        return Ok(None);
    }
    let file = file_path.display().to_string();

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type_for(file_path)).parse();
    if !ret.errors.is_empty() {
        return Err(TransformError::Parse {
            file,
            message: format!("{:?}", ret.errors),
        });
    }
    let program = ret.program;

    let mut finder = MarkerFinder::default();
    finder.visit_program(&program);
    if let Some(message) = finder.violation {
        return Err(TransformError::usage(file, message));
    }
    if finder.matches.is_empty() {
        return Ok(None);
    }
    let mut matches = finder.matches;
    matches.sort_by_key(|m| m.start);

    let mut patcher = Patcher::new(code);
    let mut removed: Vec<(u32, u32)> = Vec::with_capacity(matches.len());
    for m in &matches {
        patcher.replace(m.start, m.end, "null");
        removed.push((m.start, m.end));
    }
    dce::prune(code, &program, &finder.references, removed, &mut patcher);

    tracing::debug!(file = %file, matches = matches.len(), "stubbed compile-time call sites");

    let (out, map) = if use_source_map {
        let (out, map) = patcher.apply_with_map(&file);
        (out, Some(map))
    } else {
        (patcher.apply(), None)
    };
    Ok(Some(Extraction {
        code: out,
        map,
        matches,
    }))
}

fn is_marker_call(call: &CallExpression) -> bool {
    matches!(&call.callee, Expression::Identifier(ident) if ident.name == MARKER)
}

fn usage_message() -> String {
    format!("missing assignment, {MARKER} must be used as export const foo = {MARKER}(...)")
}

/// Single traversal collecting valid matches, usage violations, and every
/// identifier reference (for the later dead-code pass).
#[derive(Default)]
struct MarkerFinder {
    matches: Vec<Match>,
    /// Call spans already claimed by a declarator or an `await`.
    claimed: HashSet<u32>,
    violation: Option<String>,
    references: Vec<(String, u32)>,
}

impl<'a> Visit<'a> for MarkerFinder {
    fn visit_variable_declarator(&mut self, decl: &VariableDeclarator<'a>) {
        if let Some(Expression::CallExpression(call)) = &decl.init {
            if is_marker_call(call) {
                if let BindingPattern::BindingIdentifier(id) = &decl.id {
                    self.claimed.insert(call.span.start);
                    self.matches.push(Match {
                        name: id.name.to_string(),
                        start: call.span.start,
                        end: call.span.end,
                    });
                } else if self.violation.is_none() {
                    self.violation = Some(usage_message());
                }
            }
        }
        walk::walk_variable_declarator(self, decl);
    }

    fn visit_await_expression(&mut self, expr: &AwaitExpression<'a>) {
        // `await compileTime(...)` is left untouched, matching the marker's
        // documented surface.
        if let Expression::CallExpression(call) = &expr.argument {
            if is_marker_call(call) {
                self.claimed.insert(call.span.start);
            }
        }
        walk::walk_await_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if is_marker_call(call) && !self.claimed.contains(&call.span.start) {
            if self.violation.is_none() {
                self.violation = Some(usage_message());
            }
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.references.push((ident.name.to_string(), ident.span.start));
    }

    fn visit_ts_type_name(&mut self, name: &TSTypeName<'a>) {
        // Type positions must keep their imports alive too.
        if let TSTypeName::IdentifierReference(ident) = name {
            self.references.push((ident.name.to_string(), ident.span.start));
        }
        walk::walk_ts_type_name(self, name);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
use napi_derive::napi;

#[cfg(feature = "napi")]
#[napi]
pub fn insert_placeholders_native(
    code: String,
    file_path: String,
    use_source_map: bool,
) -> napi::Result<serde_json::Value> {
    let extraction = extract(&code, Path::new(&file_path), use_source_map)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    match extraction {
        Some(extraction) => {
            serde_json::to_value(extraction).map_err(|e| napi::Error::from_reason(e.to_string()))
        }
        None => Ok(serde_json::Value::Null),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
