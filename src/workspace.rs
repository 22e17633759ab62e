//! Per-request scratch directories.
//!
//! A [`Workspace`] is acquired once per request, owns every intermediate and
//! candidate file produced by the strategy chain, and is released exactly
//! once when the request ends.
//!
//! ## Release guarantee
//!
//! The directory is a [`tempfile::TempDir`]. [`Workspace::release`] is the
//! normal exit path and logs (never returns) deletion errors so they cannot
//! mask the conversion outcome. If the owning future is dropped or panics
//! before `release` runs, `TempDir`'s `Drop` removes the directory anyway.

use crate::error::ConvertError;
use crate::format::Format;
use crate::request::CorrelationId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

const MAX_STEM_LEN: usize = 64;

/// An isolated directory owned by a single request.
#[derive(Debug)]
pub struct Workspace {
    id: CorrelationId,
    dir: TempDir,
    input: PathBuf,
}

impl Workspace {
    /// Create the directory under `root` and write the source bytes into it
    /// under a normalised name.
    pub async fn acquire(
        root: &Path,
        id: &CorrelationId,
        original_name: &str,
        source: Format,
        bytes: &[u8],
    ) -> Result<Self, ConvertError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| ConvertError::Workspace {
                path: root.to_path_buf(),
                source: e,
            })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("docconv-{id}-"))
            .tempdir_in(root)
            .map_err(|e| ConvertError::Workspace {
                path: root.to_path_buf(),
                source: e,
            })?;

        let input = dir.path().join(normalized_file_name(original_name, source));
        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| ConvertError::Workspace {
                path: input.clone(),
                source: e,
            })?;

        debug!(
            "Workspace {} acquired, input {}",
            dir.path().display(),
            input.display()
        );

        Ok(Self {
            id: id.clone(),
            dir,
            input,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The current normalised input file.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Stem shared by the input and every engine output derived from it.
    pub fn input_stem(&self) -> &str {
        self.input
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("input")
    }

    /// Path for a new file inside the workspace.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }

    /// Swap the input for a derived artifact (e.g. the decrypted copy).
    /// The previous input is deleted.
    pub async fn replace_input(&mut self, new_input: PathBuf) {
        if new_input == self.input {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&self.input).await {
            warn!("Failed to remove replaced input {}: {}", self.input.display(), e);
        }
        self.input = new_input;
    }

    /// Names of entries currently in the workspace root.
    pub async fn snapshot(&self) -> Result<BTreeSet<String>, std::io::Error> {
        let mut names = BTreeSet::new();
        let mut entries = tokio::fs::read_dir(self.dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Delete every entry not present in `keep`. Used to discard the partial
    /// output of a failed attempt.
    pub async fn discard_except(&self, keep: &BTreeSet<String>) {
        let current = match self.snapshot().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to list workspace {}: {}", self.root().display(), e);
                return;
            }
        };
        for name in current.difference(keep) {
            let path = self.path_for(name);
            let result = if path.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => debug!("Discarded partial output {}", name),
                Err(e) => warn!("Failed to discard {}: {}", path.display(), e),
            }
        }
    }

    /// Delete the workspace and everything in it.
    ///
    /// Errors are logged, never returned.
    pub async fn release(self) {
        let path = self.dir.path().to_path_buf();
        let id = self.id;
        let result = tokio::task::spawn_blocking(move || self.dir.close()).await;
        match result {
            Ok(Ok(())) => debug!("Workspace for {} released", id),
            Ok(Err(e)) => warn!("Failed to delete workspace {} for {}: {}", path.display(), id, e),
            Err(e) => warn!("Workspace cleanup task for {} failed: {}", path.display(), e),
        }
    }
}

/// Reduce a client file name to a shell- and engine-safe name with the
/// resolved source extension.
pub fn normalized_file_name(original: &str, format: Format) -> String {
    let stem = Path::new(original)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut clean = UNSAFE_CHARS.replace_all(&stem, "_").into_owned();
    clean = clean.trim_matches('_').to_string();
    if clean.len() > MAX_STEM_LEN {
        clean.truncate(MAX_STEM_LEN);
    }
    if clean.is_empty() {
        clean = "input".to_string();
    }
    format!("{clean}.{}", format.extension())
}
