//! Native core for build-time partial evaluation of JavaScript/TypeScript
//! modules.
//!
//! Source files mark expressions as compile-time with `compileTime(...)`.
//! The pipeline runs per file, in two ordered passes driven by the host
//! bundler:
//!
//! 1. [`Session::insert_placeholders`] parses the file, records every marked
//!    call site against the original text, replaces each call with an inert
//!    `null`, and drops declarations that only fed the stubbed calls.
//! 2. [`Session::replace_with_data`] synthesizes an executable variant of
//!    the original snapshot that captures each call's resolved value into a
//!    result bag, hands it to the external [`ModuleLoader`], serializes the
//!    resolved values back into source literals, and splices them into the
//!    original text.
//!
//! The two passes must run in that order for a given file; the host's
//! ordered hook stages guarantee it, nothing here locks.
//!
//! Two more surfaces ride on the same session: `import.meta.compileTime`
//! references to external modules (one shared, cached execution per resolved
//! target) and the `<name>.compile.<ext>` whole-file convention, which
//! evaluates every export and regenerates the file as literals.
//!
//! Results are memoized per session and evicted when the watcher reports a
//! change to a tracked dependency file. `Session::reset()` is bound to build
//! start and clears everything.
//!
//! Arbitrary code execution lives entirely behind the [`ModuleLoader`]
//! contract; the evaluation context is trusted, not security-isolated.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod cache;
mod compile_file;
mod dce;
mod discovery;
mod error;
mod extract;
mod include;
mod loader;
mod options;
mod patch;
mod session;
mod stringify;
mod substitute;
mod value;

pub use cache::{CacheEntry, CacheKey, EvalCache};
pub use compile_file::is_compile_file;
pub use discovery::find_compile_time_files;
pub use error::{TransformError, TransformResult};
pub use extract::{extract, Extraction, Match, MARKER};
pub use loader::{CompileTimeOutput, LoadError, LoadedModule, ModuleLoader};
pub use options::Options;
pub use patch::Patcher;
pub use session::{PendingFile, Session, Transformed};
pub use stringify::{stringify_value, uneval};
pub use substitute::{build_probe, DATA_EXPORT};
pub use value::{Node, NodeId, ResponseParts, Value, ValueBuilder};

#[cfg(feature = "napi")]
pub use extract::insert_placeholders_native;
#[cfg(feature = "napi")]
pub use stringify::serialize_value_native;
#[cfg(feature = "napi")]
pub use substitute::{build_probe_native, splice_values_native};

#[cfg(feature = "napi")]
#[napi]
pub fn compile_bridge() -> String {
    "Compile-Time Native Bridge Connected".to_string()
}

#[cfg(test)]
mod compile_file_tests;
