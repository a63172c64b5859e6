pub mod diff;
pub mod tags;
pub mod walk;

use std::path::Path;

/// Root-relative path with forward-slash separators, as stored in the ledger.
pub(crate) fn rel_unix_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn rel_unix_path_joins_with_forward_slashes() {
        let root = PathBuf::from("/repo");
        let path = root.join("src").join("lib.rs");
        assert_eq!(rel_unix_path(&root, &path).unwrap(), "src/lib.rs");
    }

    #[test]
    fn rel_unix_path_rejects_paths_outside_root() {
        let root = PathBuf::from("/repo");
        assert!(rel_unix_path(&root, Path::new("/elsewhere/f.rs")).is_none());
    }
}
