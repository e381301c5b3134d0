//! Session configuration handed in by the host pipeline.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Options {
    /// When true, phase-two output carries a generated source map instead of
    /// a raw dependency list. Only one of the two is ever produced per call.
    pub use_source_map: bool,
    /// Project root, forwarded to external compile-time modules.
    pub root: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            use_source_map: false,
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}
