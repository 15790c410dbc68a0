use anyhow::Result;
use futures::stream::{Stream, StreamExt};
use glob::glob;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration for batch file discovery behavior
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Whether to fail fast on first error or continue discovering
    pub fail_fast: bool,
}

/// A discovered candidate file with its validation status
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub error: Option<String>,
}

/// Discovers all `*.txt` files recursively under the given root directory.
/// Returns an async stream of validated candidate paths; per-file validation
/// problems travel inside the item unless fail-fast escalates them.
pub fn discover_text_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> impl Stream<Item = Result<DiscoveredFile>> {
    let root_path = root_dir.as_ref().to_path_buf();

    futures::stream::unfold(
        DiscoveryState::new(root_path, config),
        |mut state| async move { state.next_file().await.map(|result| (result, state)) },
    )
}

/// Internal state for file discovery iteration
struct DiscoveryState {
    root_dir: PathBuf,
    config: DiscoveryConfig,
    glob_iter: Option<glob::Paths>,
}

impl DiscoveryState {
    fn new(root_dir: PathBuf, config: DiscoveryConfig) -> Self {
        Self {
            root_dir,
            config,
            glob_iter: None,
        }
    }

    async fn next_file(&mut self) -> Option<Result<DiscoveredFile>> {
        if self.glob_iter.is_none() {
            let pattern = format!("{}/**/*.txt", self.root_dir.display());
            debug!("Starting discovery with pattern: {}", pattern);
            match glob(&pattern) {
                Ok(paths) => self.glob_iter = Some(paths),
                Err(e) => {
                    return Some(Err(anyhow::anyhow!("Failed to create glob pattern: {e}")));
                }
            }
        }

        let glob_iter = self.glob_iter.as_mut()?;
        loop {
            match glob_iter.next() {
                Some(Ok(path)) => {
                    debug!("Found candidate file: {}", path.display());
                    return Some(self.validate_file(path).await);
                }
                Some(Err(e)) => {
                    let error_msg = format!("Glob iteration error: {e}");
                    warn!("{}", error_msg);
                    if self.config.fail_fast {
                        return Some(Err(anyhow::anyhow!(error_msg)));
                    }
                    // Non-fatal: move on to the next candidate.
                }
                None => {
                    info!("Discovery completed under {}", self.root_dir.display());
                    return None;
                }
            }
        }
    }

    async fn validate_file(&self, path: PathBuf) -> Result<DiscoveredFile> {
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(DiscoveredFile { path, error: None }),
            Ok(_) => {
                let error = format!("Path is not a file: {}", path.display());
                warn!("{}", error);
                Ok(DiscoveredFile {
                    path,
                    error: Some(error),
                })
            }
            Err(e) => {
                let error = format!("Cannot access file {}: {}", path.display(), e);
                warn!("{}", error);
                if self.config.fail_fast {
                    Err(anyhow::anyhow!(error))
                } else {
                    Ok(DiscoveredFile {
                        path,
                        error: Some(error),
                    })
                }
            }
        }
    }
}

/// Collect all discovered files into a Vec for easier processing
pub async fn collect_text_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<DiscoveredFile>> {
    let mut files = Vec::new();
    let mut stream = Box::pin(discover_text_files(root_dir, config));

    while let Some(result) = stream.next().await {
        files.push(result?);
    }

    let valid_count = files.iter().filter(|f| f.error.is_none()).count();
    info!(
        "Discovery summary: {} valid, {} invalid",
        valid_count,
        files.len() - valid_count
    );

    Ok(files)
}
