//! Artifact discovery: find the file an engine produced for the target format.
//!
//! Engines name their output themselves (LibreOffice keeps the input stem,
//! pdftoppm appends page suffixes, some tools append qualifiers), so the
//! resolver matches on extension suffix rather than on an exact path.
//!
//! When several candidates match, the most recently modified wins, ties
//! broken by the lexicographically smallest name. Directory-listing order is
//! never relied on.

use crate::format::Format;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// A candidate output file found in a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
}

impl Artifact {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Look for a non-empty file in `dir` whose name ends with one of the
/// target's extensions, skipping every name in `exclude`.
pub async fn resolve(
    dir: &Path,
    target: Format,
    exclude: &BTreeSet<String>,
) -> std::io::Result<Option<Artifact>> {
    let mut best: Option<(SystemTime, String, Artifact)> = None;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if exclude.contains(&name) || !matches_extension(&name, target) {
            continue;
        }
        let meta = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                debug!("Skipping {}: {}", name, e);
                continue;
            }
        };
        if !meta.is_file() || meta.len() == 0 {
            debug!("Skipping {} (not a non-empty file)", name);
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let candidate = Artifact {
            path: entry.path(),
            size: meta.len(),
        };

        let better = match &best {
            None => true,
            Some((t, n, _)) => modified > *t || (modified == *t && name < *n),
        };
        if better {
            best = Some((modified, name, candidate));
        }
    }

    Ok(best.map(|(_, _, a)| a))
}

/// Case-insensitive suffix match against every extension the format may be
/// written with.
pub fn matches_extension(file_name: &str, target: Format) -> bool {
    let lower = file_name.to_ascii_lowercase();
    target
        .artifact_extensions()
        .iter()
        .any(|ext| lower.len() > ext.len() + 1 && lower.ends_with(&format!(".{ext}")))
}
