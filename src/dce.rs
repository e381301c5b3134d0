//! Removal of top-level declarations orphaned by call-site stubbing.
//!
//! After marked calls are replaced with `null`, imports and helpers that
//! existed solely to feed those calls have no readers left in the stubbed
//! module. They are pruned to a fixpoint: removing one declaration can strip
//! the last reference to another.
//!
//! The pass is deliberately conservative: exported bindings are never
//! touched, a variable declarator is only removed when its initializer
//! cannot observe the removal (no side effects), and a reference anywhere
//! outside the removed regions keeps a binding alive even if it is shadowed.

use std::collections::HashSet;

use oxc_ast::ast::{
    BindingPattern, Declaration, ExportDefaultDeclarationKind, Expression,
    ImportDeclarationSpecifier, ModuleExportName, Program, Statement,
};

use crate::patch::Patcher;

struct Item {
    span: (u32, u32),
    names: Vec<String>,
    removable: bool,
}

struct Group {
    stmt_span: (u32, u32),
    items: Vec<Item>,
}

/// Prunes dead top-level declarations, pushing deletions onto `patcher`.
/// `references` is every identifier reference in the file with its byte
/// offset; `removed` is the set of already-stubbed spans whose contents no
/// longer count as references.
pub fn prune(
    source: &str,
    program: &Program,
    references: &[(String, u32)],
    removed: Vec<(u32, u32)>,
    patcher: &mut Patcher,
) {
    let mut exported: HashSet<String> = HashSet::new();
    let mut groups: Vec<Group> = Vec::new();

    for stmt in &program.body {
        match stmt {
            Statement::ImportDeclaration(import) => {
                let Some(specifiers) = &import.specifiers else {
                    // Side-effect import, never removed.
                    continue;
                };
                if specifiers.is_empty() {
                    continue;
                }
                let items = specifiers
                    .iter()
                    .map(|specifier| {
                        let (name, span) = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                (s.local.name.to_string(), (s.span.start, s.span.end))
                            }
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                (s.local.name.to_string(), (s.span.start, s.span.end))
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                (s.local.name.to_string(), (s.span.start, s.span.end))
                            }
                        };
                        Item {
                            span,
                            names: vec![name],
                            removable: true,
                        }
                    })
                    .collect();
                groups.push(Group {
                    stmt_span: (import.span.start, import.span.end),
                    items,
                });
            }
            Statement::VariableDeclaration(var) => {
                let items = var
                    .declarations
                    .iter()
                    .map(|decl| {
                        let mut names = Vec::new();
                        collect_pattern_names(&decl.id, &mut names);
                        Item {
                            span: (decl.span.start, decl.span.end),
                            names,
                            removable: init_is_inert(decl.init.as_ref()),
                        }
                    })
                    .collect();
                groups.push(Group {
                    stmt_span: (var.span.start, var.span.end),
                    items,
                });
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    groups.push(Group {
                        stmt_span: (func.span.start, func.span.end),
                        items: vec![Item {
                            span: (func.span.start, func.span.end),
                            names: vec![id.name.to_string()],
                            removable: true,
                        }],
                    });
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    groups.push(Group {
                        stmt_span: (class.span.start, class.span.end),
                        items: vec![Item {
                            span: (class.span.start, class.span.end),
                            names: vec![id.name.to_string()],
                            removable: true,
                        }],
                    });
                }
            }
            Statement::ExportNamedDeclaration(export) => {
                if let Some(decl) = &export.declaration {
                    match decl {
                        Declaration::VariableDeclaration(var) => {
                            for d in &var.declarations {
                                let mut names = Vec::new();
                                collect_pattern_names(&d.id, &mut names);
                                exported.extend(names);
                            }
                        }
                        Declaration::FunctionDeclaration(func) => {
                            if let Some(id) = &func.id {
                                exported.insert(id.name.to_string());
                            }
                        }
                        Declaration::ClassDeclaration(class) => {
                            if let Some(id) = &class.id {
                                exported.insert(id.name.to_string());
                            }
                        }
                        _ => {}
                    }
                }
                if export.source.is_none() {
                    for specifier in &export.specifiers {
                        if let Some(name) = module_export_name(&specifier.local) {
                            exported.insert(name);
                        }
                    }
                }
            }
            Statement::ExportDefaultDeclaration(export) => match &export.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                    if let Some(id) = &func.id {
                        exported.insert(id.name.to_string());
                    }
                }
                ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        exported.insert(id.name.to_string());
                    }
                }
                // Expression defaults keep their bindings alive through the
                // collected identifier references.
                _ => {}
            },
            _ => {}
        }
    }

    // Fixpoint: a binding dies when every reference to it sits inside a
    // removed region or its own declaration.
    let mut dead: HashSet<(u32, u32)> = HashSet::new();
    loop {
        let mut newly: Vec<(u32, u32)> = Vec::new();
        for group in &groups {
            for item in &group.items {
                if !item.removable || item.names.is_empty() || dead.contains(&item.span) {
                    continue;
                }
                if item.names.iter().any(|n| exported.contains(n.as_str())) {
                    continue;
                }
                let alive = item.names.iter().any(|name| {
                    references.iter().any(|(n, at)| {
                        n == name
                            && !within(*at, item.span)
                            && !removed.iter().any(|r| within(*at, *r))
                            && !dead.iter().any(|r| within(*at, *r))
                    })
                });
                if !alive {
                    newly.push(item.span);
                }
            }
        }
        if newly.is_empty() {
            break;
        }
        dead.extend(newly);
    }

    if dead.is_empty() {
        return;
    }
    tracing::debug!(count = dead.len(), "eliminating dead declarations");

    for group in &groups {
        let group_dead: Vec<&Item> = group
            .items
            .iter()
            .filter(|item| dead.contains(&item.span))
            .collect();
        if group_dead.is_empty() {
            continue;
        }
        if group_dead.len() == group.items.len() {
            let (start, end) = expand_statement(source, group.stmt_span);
            patcher.delete(start, end);
        } else {
            for item in group_dead {
                let (start, end) = expand_list_item(source, item.span);
                patcher.delete(start, end);
            }
        }
    }
}

fn within(at: u32, span: (u32, u32)) -> bool {
    at >= span.0 && at < span.1
}

/// True when dropping the declarator cannot change runtime behavior. The
/// stubbed marker call itself counts: it is `null` by the time the output is
/// generated.
fn init_is_inert(init: Option<&Expression>) -> bool {
    match init {
        None => true,
        Some(expr) => matches!(
            expr,
            Expression::NullLiteral(_)
                | Expression::BooleanLiteral(_)
                | Expression::NumericLiteral(_)
                | Expression::StringLiteral(_)
                | Expression::BigIntLiteral(_)
                | Expression::Identifier(_)
                | Expression::ArrowFunctionExpression(_)
                | Expression::FunctionExpression(_)
        ) || is_stubbed_marker_call(expr),
    }
}

fn is_stubbed_marker_call(expr: &Expression) -> bool {
    match expr {
        Expression::CallExpression(call) => {
            matches!(&call.callee, Expression::Identifier(ident) if ident.name == crate::extract::MARKER)
        }
        _ => false,
    }
}

fn module_export_name(name: &ModuleExportName) -> Option<String> {
    match name {
        ModuleExportName::IdentifierName(id) => Some(id.name.to_string()),
        ModuleExportName::IdentifierReference(id) => Some(id.name.to_string()),
        ModuleExportName::StringLiteral(s) => Some(s.value.to_string()),
    }
}

fn collect_pattern_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_pattern_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                collect_pattern_names(element, names);
            }
            if let Some(rest) = &arr.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        _ => {}
    }
}

/// Widens a whole-statement removal over its trailing semicolon and line
/// break so no blank line is left behind.
fn expand_statement(source: &str, span: (u32, u32)) -> (u32, u32) {
    let bytes = source.as_bytes();
    let mut end = span.1 as usize;
    while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b';' {
        end += 1;
    }
    while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\r' {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        end += 1;
    }
    (span.0, end as u32)
}

/// Widens a list-item removal over one adjacent comma: the following comma
/// when there is one, otherwise the preceding one.
fn expand_list_item(source: &str, span: (u32, u32)) -> (u32, u32) {
    let bytes = source.as_bytes();
    let mut end = span.1 as usize;
    let mut probe = end;
    while probe < bytes.len() && (bytes[probe] as char).is_ascii_whitespace() {
        probe += 1;
    }
    if probe < bytes.len() && bytes[probe] == b',' {
        end = probe + 1;
        while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
            end += 1;
        }
        return (span.0, end as u32);
    }
    let mut start = span.0 as usize;
    let mut probe = start;
    while probe > 0 && (bytes[probe - 1] as char).is_ascii_whitespace() {
        probe -= 1;
    }
    if probe > 0 && bytes[probe - 1] == b',' {
        start = probe - 1;
    }
    (start as u32, end as u32)
}
