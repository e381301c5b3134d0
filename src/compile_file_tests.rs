//! Whole-file convention: evaluation and regeneration tests.

use std::path::Path;

use crate::error::TransformError;
use crate::options::Options;
use crate::session::Session;
use crate::transform_tests::MockLoader;
use crate::value::Value;

fn path() -> &'static Path {
    Path::new("/proj/data.compile.ts")
}

#[test]
fn test_exports_are_regenerated_as_literals() {
    let mut session = Session::new(Options::default());
    let code = concat!(
        "export const count = 1\n",
        "export function fn() { return \"hi\" }\n",
    );
    let mut loader = MockLoader {
        bag: vec![
            ("count".to_string(), Value::number(1.0)),
            ("fn".to_string(), Value::string("hi")),
        ],
        ..Default::default()
    };
    let out = session.compile_file(code, path(), &mut loader).unwrap().unwrap();
    assert_eq!(
        out.code,
        concat!(
            "export const count = 1;\n",
            "export function fn() {\n  return \"hi\";\n}\n",
        )
    );
    assert!(out.dependencies.contains(&path().to_path_buf()));

    // The probe passes the marker through and invokes the function export.
    let probe = loader.last_override.unwrap();
    assert!(probe.starts_with("const compileTime = (fn) =>"));
    assert!(probe.contains("\"count\": await (count)"));
    assert!(probe.contains("\"fn\": await (fn())"));
}

#[test]
fn test_function_export_returning_bytes() {
    let mut session = Session::new(Options::default());
    let code = "export function fn() { return makeBytes() }\n";
    let mut loader = MockLoader {
        bag: vec![("fn".to_string(), Value::bytes(b"hi".to_vec()))],
        ..Default::default()
    };
    let out = session.compile_file(code, path(), &mut loader).unwrap().unwrap();
    assert_eq!(
        out.code,
        "export function fn() {\n  return Buffer.from(new Uint8Array([104,105]));\n}\n"
    );
}

#[test]
fn test_parametered_export_fails_before_any_execution() {
    let mut session = Session::new(Options::default());
    let code = "export function fn(input) { return input }\n";
    let mut loader = MockLoader::default();
    let err = session.compile_file(code, path(), &mut loader).unwrap_err();
    assert!(matches!(err, TransformError::Usage { .. }));
    assert_eq!(loader.load_calls, 0);
}

#[test]
fn test_only_convention_files_are_evaluated() {
    let mut session = Session::new(Options::default());
    let mut loader = MockLoader::default();
    assert!(session
        .compile_file("export const a = 1\n", Path::new("/proj/data.ts"), &mut loader)
        .unwrap()
        .is_none());
    assert_eq!(loader.load_calls, 0);
}

#[test]
fn test_response_export_is_reconstructed() {
    let mut session = Session::new(Options::default());
    let code = "export const res = fetchSomething()\n";
    let mut loader = MockLoader {
        bag: vec![(
            "res".to_string(),
            Value::response(
                200,
                vec![("content-type".to_string(), "application/json".to_string())],
                b"hi".to_vec(),
            ),
        )],
        ..Default::default()
    };
    let out = session.compile_file(code, path(), &mut loader).unwrap().unwrap();
    assert!(out
        .code
        .contains("new Response(new Uint8Array([104,105]).buffer, { status: 200"));
}
