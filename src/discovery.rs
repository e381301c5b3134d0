//! Discovery of compile-time-bearing files under a project root.
//!
//! Hosts use this to seed their watchers before the first build: whole-file
//! convention modules plus any source containing a marker token or an
//! `import.meta.compileTime` reference.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::compile_file::is_compile_file;
use crate::extract::{is_supported, MARKER_CALL};
use crate::include::INCLUDE_RE;

pub fn find_compile_time_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() || !is_supported(path) {
            continue;
        }
        if path.components().any(|c| c.as_os_str() == "node_modules") {
            continue;
        }
        if is_compile_file(path) {
            files.push(path.to_path_buf());
            continue;
        }
        if let Ok(content) = fs::read_to_string(path) {
            if content.contains(MARKER_CALL) || INCLUDE_RE.is_match(&content) {
                files.push(path.to_path_buf());
            }
        }
    }

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_filters_by_content_and_convention() {
        let root = std::env::temp_dir().join(format!("comptime-discovery-{}", std::process::id()));
        let nested = root.join("src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.ts"), "export const a = compileTime(() => 1)\n").unwrap();
        fs::write(nested.join("plain.ts"), "export const b = 2\n").unwrap();
        fs::write(nested.join("data.compile.ts"), "export const c = 3\n").unwrap();
        fs::write(
            nested.join("inc.ts"),
            "const d = import.meta.compileTime(\"./gen\")\n",
        )
        .unwrap();
        fs::write(nested.join("style.css"), "compileTime(").unwrap();

        let found = find_compile_time_files(&root);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.ts", "data.compile.ts", "inc.ts"]);

        fs::remove_dir_all(&root).unwrap();
    }
}
