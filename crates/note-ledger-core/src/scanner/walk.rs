use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::AppConfig;

/// Enumerate every regular file under `root` whose extension is in the
/// allow-list and whose path contains no excluded directory component.
/// Symlinks are not followed; unreadable entries are logged and skipped.
pub fn iter_source_files(root: &Path, config: &AppConfig) -> Vec<PathBuf> {
    let ignore_patterns: Vec<Pattern> = config
        .ignore_patterns
        .iter()
        .filter_map(|g| match Pattern::new(g) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", g, e);
                None
            }
        })
        .collect();

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, &config.exclude_dirs))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_allowed_ext(e.path(), &config.scan_exts))
        .filter(|e| !ignore_patterns.iter().any(|p| p.matches_path(e.path())))
        .map(DirEntry::into_path)
        .collect()
}

fn is_excluded_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude_dirs.iter().any(|d| d == name))
            .unwrap_or(false)
}

fn has_allowed_ext(path: &Path, scan_exts: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| scan_exts.iter().any(|allowed| allowed == ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walk_filters_extensions_and_excluded_dirs() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/a.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/a.bin"), [0u8; 4]).unwrap();
        fs::write(root.join("node_modules/pkg/b.js"), "x").unwrap();
        fs::write(root.join("README.md"), "# hi").unwrap();

        let config = AppConfig::default();
        let mut files = iter_source_files(root, &config);
        files.sort();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["README.md".to_string(), "src/a.rs".to_string()]);
    }

    #[test]
    fn walk_honors_ignore_patterns() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("keep.md"), "keep").unwrap();
        fs::write(root.join("drop.md"), "drop").unwrap();

        let config = AppConfig {
            ignore_patterns: vec!["**/drop.md".to_string()],
            ..AppConfig::default()
        };
        let files = iter_source_files(root, &config);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.md"));
    }
}
