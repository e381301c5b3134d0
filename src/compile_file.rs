//! Whole-file compile-time evaluation for the `<name>.compile.<ext>`
//! convention.
//!
//! Every export of such a file is evaluated at build time. Zero-parameter
//! function exports are invoked; the file is regenerated so each export
//! becomes a literal constant or a zero-argument function returning the
//! literal, preserving call-site shape for importers.

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, Declaration, Expression, FormalParameters, Program, Statement,
};
use oxc_parser::Parser;
use regex::Regex;

use crate::error::{TransformError, TransformResult};
use crate::extract::source_type_for;
use crate::loader::ModuleLoader;
use crate::options::Options;
use crate::session::Transformed;
use crate::stringify::{is_valid_identifier, string_literal, stringify_value};
use crate::substitute::DATA_EXPORT;
use crate::value::Value;

lazy_static! {
    static ref COMPILE_FILE_RE: Regex = Regex::new(r"\.compile\.([cm]?[jt]s|[jt]sx)$").unwrap();
}

/// True for paths following the whole-file convention, e.g. `data.compile.ts`.
pub fn is_compile_file(path: &Path) -> bool {
    COMPILE_FILE_RE.is_match(&path.to_string_lossy())
}

#[derive(Debug, Clone)]
struct ExportShape {
    local: String,
    export_as: String,
    /// Function-valued exports are invoked during evaluation and regenerated
    /// as zero-argument functions.
    callable: bool,
}

pub fn evaluate(
    code: &str,
    file_path: &Path,
    _options: &Options,
    loader: &mut dyn ModuleLoader,
) -> TransformResult<Option<Transformed>> {
    if !is_compile_file(file_path) {
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

    let shapes = analyze_exports(&ret.program, &file)?;
    if shapes.is_empty() {
        return Ok(None);
    }

    let augmented = build_probe(code, &shapes);
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

    let mut out = String::new();
    for shape in &shapes {
        let value = bag.get(&shape.export_as).unwrap_or_else(Value::undefined);
        let literal = stringify_value(&value)?;
        if shape.callable {
            out.push_str(&format!(
                "export function {}() {{\n  return {};\n}}\n",
                shape.export_as, literal
            ));
        } else {
            out.push_str(&format!("export const {} = {};\n", shape.export_as, literal));
        }
    }
    tracing::debug!(file = %file, exports = shapes.len(), "regenerated compile-time file");

    let mut dependencies: Vec<_> = loaded.dependencies;
    if !dependencies.contains(&file_path.to_path_buf()) {
        dependencies.push(file_path.to_path_buf());
    }
    dependencies.sort();
    // Regeneration keeps none of the original positions, so this path always
    // reports dependencies rather than a map.
    Ok(Some(Transformed {
        code: out,
        map: None,
        dependencies,
    }))
}

/// Prepends a pass-through marker definition and appends a result-bag export
/// that awaits every binding, invoking the function-valued ones.
fn build_probe(source: &str, shapes: &[ExportShape]) -> String {
    let mut out = String::with_capacity(source.len() + 256);
    out.push_str(&format!(
        "const {} = (fn) => typeof fn === \"function\" ? fn() : fn;\n",
        crate::extract::MARKER
    ));
    out.push_str(source);
    out.push_str(&format!("\nexport const {DATA_EXPORT} = {{ "));
    for (index, shape) in shapes.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        let call = if shape.callable { "()" } else { "" };
        out.push_str(&format!(
            "{}: await ({}{})",
            string_literal(&shape.export_as),
            shape.local,
            call
        ));
    }
    out.push_str(" };\n");
    out
}

fn analyze_exports(program: &Program, file: &str) -> TransformResult<Vec<ExportShape>> {
    // First pass: kinds of top-level local declarations, so `export { x }`
    // can be classified.
    let mut locals: HashMap<String, bool> = HashMap::new();
    for stmt in &program.body {
        match stmt {
            Statement::VariableDeclaration(var) => {
                for decl in &var.declarations {
                    if let BindingPattern::BindingIdentifier(id) = &decl.id {
                        locals.insert(id.name.to_string(), init_is_callable(decl.init.as_ref()));
                    }
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    locals.insert(id.name.to_string(), true);
                }
            }
            _ => {}
        }
    }

    let mut shapes = Vec::new();
    for stmt in &program.body {
        match stmt {
            Statement::ExportNamedDeclaration(export) => {
                if let Some(decl) = &export.declaration {
                    match decl {
                        Declaration::VariableDeclaration(var) => {
                            for d in &var.declarations {
                                let BindingPattern::BindingIdentifier(id) = &d.id else {
                                    return Err(TransformError::usage(
                                        file,
                                        "destructured exports are not supported in compile-time files",
                                    ));
                                };
                                let callable = init_is_callable(d.init.as_ref());
                                if callable {
                                    ensure_zero_params(
                                        init_params(d.init.as_ref()),
                                        &id.name,
                                        file,
                                    )?;
                                }
                                shapes.push(ExportShape {
                                    local: id.name.to_string(),
                                    export_as: id.name.to_string(),
                                    callable,
                                });
                            }
                        }
                        Declaration::FunctionDeclaration(func) => {
                            let Some(id) = &func.id else {
                                return Err(TransformError::usage(
                                    file,
                                    "exported functions must be named in compile-time files",
                                ));
                            };
                            ensure_zero_params(Some(&*func.params), &id.name, file)?;
                            shapes.push(ExportShape {
                                local: id.name.to_string(),
                                export_as: id.name.to_string(),
                                callable: true,
                            });
                        }
                        _ => {
                            return Err(TransformError::usage(
                                file,
                                "only const and function exports are supported in compile-time files",
                            ));
                        }
                    }
                }
                if export.source.is_some() {
                    return Err(TransformError::usage(
                        file,
                        "re-exports are not supported in compile-time files",
                    ));
                }
                for specifier in &export.specifiers {
                    let local = export_name(&specifier.local);
                    let export_as = export_name(&specifier.exported);
                    if !is_valid_identifier(&export_as) {
                        return Err(TransformError::usage(
                            file,
                            format!("cannot regenerate export named {:?}", export_as),
                        ));
                    }
                    shapes.push(ExportShape {
                        callable: locals.get(&local).copied().unwrap_or(false),
                        local,
                        export_as,
                    });
                }
            }
            Statement::ExportDefaultDeclaration(_) => {
                return Err(TransformError::usage(
                    file,
                    "default exports are not supported in compile-time files",
                ));
            }
            Statement::ExportAllDeclaration(_) => {
                return Err(TransformError::usage(
                    file,
                    "re-exports are not supported in compile-time files",
                ));
            }
            _ => {}
        }
    }
    Ok(shapes)
}

fn init_is_callable(init: Option<&Expression>) -> bool {
    matches!(
        init,
        Some(Expression::ArrowFunctionExpression(_)) | Some(Expression::FunctionExpression(_))
    )
}

fn init_params<'a>(init: Option<&'a Expression<'a>>) -> Option<&'a FormalParameters<'a>> {
    match init {
        Some(Expression::ArrowFunctionExpression(func)) => Some(&*func.params),
        Some(Expression::FunctionExpression(func)) => Some(&*func.params),
        _ => None,
    }
}

fn ensure_zero_params(
    params: Option<&FormalParameters>,
    name: &str,
    file: &str,
) -> TransformResult<()> {
    let empty = params
        .map(|p| p.items.is_empty() && p.rest.is_none())
        .unwrap_or(true);
    if empty {
        Ok(())
    } else {
        Err(TransformError::usage(
            file,
            format!(
                "exported function \"{}\" takes parameters; compile-time exports are evaluated without arguments",
                name
            ),
        ))
    }
}

fn export_name(name: &oxc_ast::ast::ModuleExportName) -> String {
    match name {
        oxc_ast::ast::ModuleExportName::IdentifierName(id) => id.name.to_string(),
        oxc_ast::ast::ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        oxc_ast::ast::ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(code: &str) -> TransformResult<Vec<ExportShape>> {
        let allocator = Allocator::default();
        let ret = Parser::new(
            &allocator,
            code,
            source_type_for(Path::new("/x/data.compile.ts")),
        )
        .parse();
        assert!(ret.errors.is_empty());
        analyze_exports(&ret.program, "/x/data.compile.ts")
    }

    #[test]
    fn test_naming_convention() {
        assert!(is_compile_file(Path::new("/a/data.compile.ts")));
        assert!(is_compile_file(Path::new("b.compile.mjs")));
        assert!(!is_compile_file(Path::new("/a/data.ts")));
        assert!(!is_compile_file(Path::new("/a/compile.ts")));
    }

    #[test]
    fn test_export_classification() {
        let shapes = analyze(concat!(
            "export const count = 1\n",
            "export const fn2 = async () => \"hi\"\n",
            "export function fn() { return \"hi\" }\n",
        ))
        .unwrap();
        assert_eq!(shapes.len(), 3);
        assert!(!shapes[0].callable);
        assert!(shapes[1].callable);
        assert!(shapes[2].callable);
    }

    #[test]
    fn test_parametered_function_is_rejected() {
        let err = analyze("export function fn(x) { return x }\n").unwrap_err();
        assert!(matches!(err, TransformError::Usage { .. }));
        let err = analyze("export const fn = (x) => x\n").unwrap_err();
        assert!(matches!(err, TransformError::Usage { .. }));
    }

    #[test]
    fn test_default_export_is_rejected() {
        let err = analyze("export default 1\n").unwrap_err();
        assert!(matches!(err, TransformError::Usage { .. }));
    }

    #[test]
    fn test_aliased_specifier_export() {
        let shapes = analyze(concat!(
            "const inner = () => 1\n",
            "export { inner as outer }\n",
        ))
        .unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].local, "inner");
        assert_eq!(shapes[0].export_as, "outer");
        assert!(shapes[0].callable);
    }

    #[test]
    fn test_probe_invokes_functions() {
        let shapes = vec![
            ExportShape {
                local: "count".into(),
                export_as: "count".into(),
                callable: false,
            },
            ExportShape {
                local: "fn".into(),
                export_as: "fn".into(),
                callable: true,
            },
        ];
        let probe = build_probe("export const count = 1\n", &shapes);
        assert!(probe.starts_with("const compileTime = (fn) =>"));
        assert!(probe.contains("\"count\": await (count)"));
        assert!(probe.contains("\"fn\": await (fn())"));
    }
}
