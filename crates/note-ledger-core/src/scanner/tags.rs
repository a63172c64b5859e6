use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::rel_unix_path;

// Case-insensitivity applies to the tag keyword only; the slug is any run of
// non-whitespace and may contain non-ASCII.
static NOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)NOTE\(vNext\):\s*(\S+)").expect("valid note tag regex"));
static DONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)DONE\(vNext\):\s*(\S+)").expect("valid done tag regex"));

const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Note,
    Done,
}

/// One matched tag occurrence.
#[derive(Debug, Clone)]
pub struct Hit {
    pub kind: TagKind,
    pub slug: String,
    pub path: String,
    pub line: i64,
    pub snippet: String,
}

/// Extract tag hits from the given files. Files that cannot be opened or are
/// not valid UTF-8 are logged and skipped; extraction never fails the scan.
pub fn collect_hits(root: &Path, files: &[PathBuf]) -> Vec<Hit> {
    let mut hits = Vec::new();

    for path in files {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                debug!("Skipping non-UTF-8 file {}", path.display());
                continue;
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        let Some(rel) = rel_unix_path(root, path) else {
            continue;
        };

        for (i, line_text) in text.lines().enumerate() {
            let line_no = (i + 1) as i64;
            push_matches(&mut hits, &NOTE_RE, TagKind::Note, line_text, &rel, line_no);
            push_matches(&mut hits, &DONE_RE, TagKind::Done, line_text, &rel, line_no);
        }
    }

    hits
}

fn push_matches(
    hits: &mut Vec<Hit>,
    re: &Regex,
    kind: TagKind,
    line_text: &str,
    rel: &str,
    line_no: i64,
) {
    for caps in re.captures_iter(line_text) {
        let slug = caps[1].to_string();
        hits.push(Hit {
            kind,
            slug,
            path: rel.to_string(),
            line: line_no,
            snippet: snippet_of(line_text),
        });
    }
}

fn snippet_of(line: &str) -> String {
    line.trim().chars().take(SNIPPET_MAX_CHARS).collect()
}
