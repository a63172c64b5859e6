use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;

/// Scan configuration. Loaded from an optional `ledger.toml` next to the
/// working directory; every field has a usable default so the file may be
/// omitted entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// File extensions (without the dot) eligible for scanning.
    #[serde(default = "default_scan_exts")]
    pub scan_exts: Vec<String>,
    /// Directory names pruned from the walk wherever they appear.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Additional glob patterns matched against whole paths.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Last-resort scan root when nothing else resolves.
    #[serde(default)]
    pub fallback_root: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan_exts: default_scan_exts(),
            exclude_dirs: default_exclude_dirs(),
            ignore_patterns: Vec::new(),
            db_path: default_db_path(),
            fallback_root: None,
        }
    }
}

fn default_scan_exts() -> Vec<String> {
    ["py", "rs", "md", "ts", "tsx", "js", "jsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        ".venv",
        "venv",
        "__pycache__",
        ".pytest_cache",
        ".mypy_cache",
        ".ruff_cache",
        "node_modules",
        "dist",
        "build",
        "target",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_db_path() -> String {
    "note_ledger.db".to_string()
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("ledger").required(false))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
