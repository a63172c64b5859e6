use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::AppConfig;

pub const REPO_ROOT_ENV: &str = "LEDGER_REPO_ROOT";

const REPO_MARKERS: [&str; 4] = [".git", "Cargo.toml", "pyproject.toml", "package.json"];
const MAX_MARKER_DEPTH: usize = 10;

/// Resolves the directory to scan. Inputs are captured at construction so the
/// resolver itself never touches process environment.
///
/// Priority: explicit request → env root → upward marker search from the
/// start directory → configured fallback. Rejected candidates are logged as
/// warnings; the caller is expected to validate the result again before
/// scanning.
#[derive(Debug, Clone)]
pub struct RootResolver {
    env_root: Option<PathBuf>,
    start_dir: Option<PathBuf>,
    fallback: Option<PathBuf>,
}

impl RootResolver {
    pub fn new(
        env_root: Option<PathBuf>,
        start_dir: Option<PathBuf>,
        fallback: Option<PathBuf>,
    ) -> Self {
        Self {
            env_root,
            start_dir,
            fallback,
        }
    }

    pub fn from_env(config: &AppConfig) -> Self {
        Self {
            env_root: std::env::var_os(REPO_ROOT_ENV).map(PathBuf::from),
            start_dir: std::env::current_dir().ok(),
            fallback: config.fallback_root.as_ref().map(PathBuf::from),
        }
    }

    pub fn resolve(&self, requested: Option<&Path>) -> PathBuf {
        if let Some(p) = requested {
            if p.is_dir() {
                return absolutize(p);
            }
            warn!("Requested root invalid: {}, falling back", p.display());
        }

        if let Some(p) = &self.env_root {
            if p.is_dir() {
                return absolutize(p);
            }
            warn!("Env root invalid: {}, falling back", p.display());
        }

        if let Some(start) = &self.start_dir {
            if let Some(found) = detect_repo_root(start) {
                return found;
            }
        }

        if let Some(p) = &self.fallback {
            return p.clone();
        }

        self.start_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn absolutize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Walk upward from `start` looking for a repository marker, bounded to a
/// fixed number of parent levels.
fn detect_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    for _ in 0..MAX_MARKER_DEPTH {
        if REPO_MARKERS.iter().any(|m| current.join(m).exists()) {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_root_wins_over_everything() {
        let explicit = tempdir().unwrap();
        let env = tempdir().unwrap();
        let resolver = RootResolver::new(Some(env.path().to_path_buf()), None, None);
        let resolved = resolver.resolve(Some(explicit.path()));
        assert_eq!(resolved, explicit.path().canonicalize().unwrap());
    }

    #[test]
    fn invalid_explicit_root_falls_back_to_env() {
        let env = tempdir().unwrap();
        let resolver = RootResolver::new(Some(env.path().to_path_buf()), None, None);
        let resolved = resolver.resolve(Some(Path::new("/definitely/not/here")));
        assert_eq!(resolved, env.path().canonicalize().unwrap());
    }

    #[test]
    fn marker_search_walks_upward() {
        let tmp = tempdir().unwrap();
        let repo = tmp.path().join("repo");
        let nested = repo.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(repo.join(".git")).unwrap();

        let resolver = RootResolver::new(None, Some(nested), None);
        assert_eq!(resolver.resolve(None), repo);
    }

    #[test]
    fn fallback_is_returned_even_when_nonexistent() {
        let fallback = PathBuf::from("/no/such/fallback");
        let resolver = RootResolver::new(None, None, Some(fallback.clone()));
        // The resolver hands the fallback back as-is; the caller validates.
        assert_eq!(resolver.resolve(None), fallback);
    }
}
