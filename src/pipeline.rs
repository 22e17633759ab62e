//! The pipeline driver: runs a strategy chain against one workspace.
//!
//! ## Loop
//!
//! For each strategy, in order:
//!
//! 1. Stop with [`ChainOutcome::Cancelled`] if the request was cancelled.
//! 2. Snapshot the workspace.
//! 3. Run the attempt.
//! 4. On [`Step::Produced`], ask the artifact resolver for a new, non-empty
//!    file with the target extension. Files from the snapshot, the chain
//!    input and retained bridges are excluded.
//! 5. First hit wins. On any failure the attempt's partial output is
//!    discarded and the next strategy runs.
//!
//! Attempt failures are logged and recorded, never returned. Bridges are
//! deleted when the chain ends, whatever the outcome.

use crate::artifact::{self, Artifact};
use crate::error::{AttemptError, ErrorKind};
use crate::observer::ConversionObserver;
use crate::strategy::{AttemptContext, ChainState, Step, Strategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of one strategy invocation. Ephemeral: reported to observers and
/// carried in the result, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionAttempt {
    pub strategy: String,
    pub engine: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub elapsed_ms: u64,
}

impl ConversionAttempt {
    /// Re-label an attempt made inside a bridge's nested chain.
    pub fn nested_under(mut self, parent: &str) -> Self {
        self.strategy = format!("{parent}/{}", self.strategy);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    /// Produced an intermediate for later strategies, not the target.
    Bridged,
    Failure,
}

/// The artifact that ended a chain.
#[derive(Debug, Clone)]
pub struct Winner {
    pub artifact: Artifact,
    pub strategy: String,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub enum ChainOutcome {
    Produced(Winner),
    Exhausted { last_error: String },
    Cancelled,
}

/// Everything a chain run reports back.
#[derive(Debug, Clone)]
pub struct ChainRun {
    pub attempts: Vec<ConversionAttempt>,
    pub outcome: ChainOutcome,
}

/// Drive `chain` until a strategy produces the target or all have failed.
pub async fn run_chain(
    ctx: &AttemptContext<'_>,
    chain: &[Box<dyn Strategy>],
    state: &mut ChainState,
    observer: &dyn ConversionObserver,
) -> ChainRun {
    let workspace = ctx.workspace;
    let mut attempts = Vec::with_capacity(chain.len());
    let mut last_error = String::from("no strategy applies to this format pair");

    debug!(
        "Chain for {} → {}: {}",
        state.source,
        ctx.target,
        chain
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" → ")
    );

    let outcome = 'chain: {
        for (index, strategy) in chain.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                break 'chain ChainOutcome::Cancelled;
            }

            observer.on_attempt_start(index, strategy.name());
            let before = match workspace.snapshot().await {
                Ok(names) => names,
                Err(e) => {
                    warn!("Workspace snapshot failed: {}", e);
                    BTreeSet::new()
                }
            };

            let start = Instant::now();
            let result = match strategy.attempt(ctx, state).await {
                Ok(Step::Produced) => {
                    let mut exclude = before.clone();
                    exclude.extend(state.protected_names());
                    match artifact::resolve(workspace.root(), ctx.target, &exclude).await {
                        Ok(Some(found)) => Ok(Some(found)),
                        Ok(None) => Err(AttemptError::ArtifactMissing {
                            extension: ctx.target.to_string(),
                        }),
                        Err(e) => Err(AttemptError::Io(e)),
                    }
                }
                Ok(Step::Bridged) => Ok(None),
                Err(e) => Err(e),
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            attempts.append(&mut state.nested_attempts);
            let mut record = ConversionAttempt {
                strategy: strategy.name().to_string(),
                engine: strategy.engine().to_string(),
                outcome: AttemptOutcome::Failure,
                artifact: None,
                error: None,
                error_kind: None,
                elapsed_ms,
            };

            match result {
                Ok(Some(found)) => {
                    info!(
                        "{} produced {} ({} bytes) in {}ms",
                        strategy.name(),
                        found.file_name(),
                        found.size,
                        elapsed_ms
                    );
                    record.outcome = AttemptOutcome::Success;
                    record.artifact = Some(found.path.clone());
                    observer.on_attempt_complete(&record);
                    attempts.push(record);
                    break 'chain ChainOutcome::Produced(Winner {
                        artifact: found,
                        strategy: strategy.name().to_string(),
                        degraded: strategy.degraded(),
                    });
                }
                Ok(None) => {
                    debug!("{} retained a bridge", strategy.name());
                    record.outcome = AttemptOutcome::Bridged;
                    record.artifact = state.intermediates.last().map(|(p, _)| p.clone());
                    observer.on_attempt_complete(&record);
                    attempts.push(record);
                }
                Err(e) => {
                    let cancelled = e.is_cancelled() || ctx.cancel.is_cancelled();
                    if cancelled {
                        debug!("{} cancelled", strategy.name());
                    } else {
                        warn!("Strategy {} failed: {}", strategy.name(), e);
                    }
                    record.error = Some(e.to_string());
                    record.error_kind = Some(e.kind());
                    observer.on_attempt_complete(&record);
                    attempts.push(record);

                    let mut keep = before;
                    keep.extend(state.protected_names());
                    workspace.discard_except(&keep).await;

                    if cancelled {
                        break 'chain ChainOutcome::Cancelled;
                    }
                    last_error = e.to_string();
                }
            }
        }
        ChainOutcome::Exhausted { last_error }
    };

    for (path, _) in state.intermediates.drain(..) {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed bridge {}", path.display()),
            Err(e) => warn!("Failed to remove bridge {}: {}", path.display(), e),
        }
    }

    ChainRun { attempts, outcome }
}
