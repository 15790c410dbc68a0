// Run orchestration: one automaton per run, one ordered index shared across
// every source, machine-readable stats at the end. Sources are processed
// sequentially; the automaton is only read after construction.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::automaton::PatternAutomaton;
use crate::discovery::{collect_text_files, DiscoveryConfig};
use crate::index::OrderedIndex;
use crate::sentence::SentenceSplitter;
use crate::source::{acquire_file, acquire_url, AcquiredText, SourceConfig, TextSource};

/// Configuration for a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Abort on first acquisition error instead of degrading to empty text
    pub fail_fast: bool,
    /// Use memory-mapped I/O for file sources
    pub use_mmap: bool,
    /// Show a progress bar when scanning multiple sources
    pub show_progress: bool,
}

/// Per-source processing statistics
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceStats {
    /// File path or URL the text came from
    pub origin: String,
    /// Bytes acquired before any HTML reduction
    pub bytes_read: u64,
    /// Sentence units scanned by the automaton
    pub sentences_scanned: u64,
    /// Sentence units containing at least one keyword occurrence
    pub sentences_matched: u64,
    /// Acquisition time in milliseconds
    pub acquire_ms: u64,
    /// Split-and-scan time in milliseconds
    pub scan_ms: u64,
    /// Processing status (success, failed)
    pub status: String,
    /// Error message if acquisition failed
    pub error: Option<String>,
}

/// Whole-run statistics, serialized to the stats output file
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunStats {
    pub keywords: Vec<String>,
    pub sources: Vec<SourceStats>,
    pub sentences_scanned: u64,
    pub sentences_matched: u64,
    /// Total occurrence count per keyword across all sources
    pub keyword_occurrences: BTreeMap<String, u64>,
    pub elapsed_ms: u64,
}

/// Result of a pipeline run: the sorted sentence report plus run stats.
///
/// `sentences` preserves duplicates: a sentence matched twice (in one source
/// or across sources) appears twice, in sorted position.
pub struct MatchReport {
    pub sentences: Vec<String>,
    pub stats: RunStats,
}

enum Leaf {
    File(PathBuf),
    Url(String),
}

impl Leaf {
    fn origin(&self) -> String {
        match self {
            Leaf::File(path) => path.display().to_string(),
            Leaf::Url(url) => url.clone(),
        }
    }
}

/// Run the full scan: acquire each source, split into sentences, scan each
/// sentence with a single shared automaton, and collect every matching
/// sentence (normalized) into one ordered index.
pub async fn run_pipeline(
    source: &TextSource,
    keywords: &[String],
    config: &PipelineConfig,
) -> Result<MatchReport> {
    let started = Instant::now();

    // Built once for the whole run, then shared read-only across every
    // sentence scan.
    let automaton = PatternAutomaton::build(keywords.iter().cloned());
    let splitter = SentenceSplitter::new()?;
    let mut index = OrderedIndex::new();

    let mut keyword_occurrences: BTreeMap<String, u64> = automaton
        .keywords()
        .iter()
        .map(|k| (k.clone(), 0))
        .collect();

    let source_config = SourceConfig {
        fail_fast: config.fail_fast,
        use_mmap: config.use_mmap,
        ..Default::default()
    };

    let leaves = resolve_leaves(source, config).await?;
    info!("Scanning {} source(s)", leaves.len());

    let progress = if config.show_progress && leaves.len() > 1 {
        let bar = ProgressBar::new(leaves.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .context("Invalid progress bar template")?,
        );
        Some(bar)
    } else {
        None
    };

    let mut source_stats = Vec::with_capacity(leaves.len());
    for leaf in &leaves {
        if let Some(bar) = &progress {
            bar.set_message(leaf.origin());
        }

        let acquired = match leaf {
            Leaf::File(path) => acquire_file(path, &source_config).await?,
            Leaf::Url(url) => acquire_url(url, &source_config).await?,
        };

        let stats = scan_source(
            &acquired,
            &automaton,
            &splitter,
            &mut index,
            &mut keyword_occurrences,
        );
        debug!(
            origin = %stats.origin,
            scanned = stats.sentences_scanned,
            matched = stats.sentences_matched,
            "scanned source"
        );
        source_stats.push(stats);

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    let sentences: Vec<String> = index.iter().map(str::to_string).collect();

    let stats = RunStats {
        keywords: automaton.keywords().to_vec(),
        sentences_scanned: source_stats.iter().map(|s| s.sentences_scanned).sum(),
        sentences_matched: source_stats.iter().map(|s| s.sentences_matched).sum(),
        sources: source_stats,
        keyword_occurrences,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Run complete: {} sentence(s) matched out of {} scanned in {}ms",
        stats.sentences_matched, stats.sentences_scanned, stats.elapsed_ms
    );

    Ok(MatchReport { sentences, stats })
}

/// Expand a source into the flat list of acquirable leaves: a directory
/// becomes its discovered `*.txt` files, everything else is itself.
async fn resolve_leaves(source: &TextSource, config: &PipelineConfig) -> Result<Vec<Leaf>> {
    match source {
        TextSource::File(path) => Ok(vec![Leaf::File(path.clone())]),
        TextSource::Url(url) => Ok(vec![Leaf::Url(url.clone())]),
        TextSource::Directory(root) => {
            let discovery_config = DiscoveryConfig {
                fail_fast: config.fail_fast,
            };
            let discovered = collect_text_files(root, discovery_config).await?;
            let mut leaves = Vec::new();
            for file in discovered {
                match file.error {
                    None => leaves.push(Leaf::File(file.path)),
                    Some(error) => {
                        // Validation problems were already degraded by
                        // discovery under non-fail-fast runs.
                        warn!("Skipping {}: {}", file.path.display(), error);
                    }
                }
            }
            Ok(leaves)
        }
    }
}

fn scan_source(
    acquired: &AcquiredText,
    automaton: &PatternAutomaton,
    splitter: &SentenceSplitter,
    index: &mut OrderedIndex,
    keyword_occurrences: &mut BTreeMap<String, u64>,
) -> SourceStats {
    let scan_started = Instant::now();
    let mut scanned = 0u64;
    let mut matched = 0u64;

    for unit in splitter.split(&acquired.text) {
        scanned += 1;

        // Cheap reject first; full offset accounting only for sentences that
        // actually contain a keyword.
        if !automaton.has_match(unit.raw()) {
            continue;
        }

        for (keyword, offsets) in automaton.search(unit.raw()) {
            if let Some(count) = keyword_occurrences.get_mut(&keyword) {
                *count += offsets.len() as u64;
            }
        }

        index.insert(unit.normalize());
        matched += 1;
    }

    SourceStats {
        origin: acquired.origin.clone(),
        bytes_read: acquired.bytes_read,
        sentences_scanned: scanned,
        sentences_matched: matched,
        acquire_ms: acquired.duration_ms,
        scan_ms: scan_started.elapsed().as_millis() as u64,
        status: if acquired.error.is_none() {
            "success".to_string()
        } else {
            "failed".to_string()
        },
        error: acquired.error.clone(),
    }
}

/// Write run statistics as pretty-printed JSON
pub fn write_stats(stats: &RunStats, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(stats).context("Failed to serialize run stats")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write stats file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            show_progress: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_single_file_run() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("story.txt");
        std::fs::write(
            &path,
            "The cat sat near the car. Nothing here. A car passed the cat.",
        )
        .unwrap();

        let source = TextSource::File(path);
        let keywords = vec!["cat".to_string(), "car".to_string()];
        let report = run_pipeline(&source, &keywords, &test_config())
            .await
            .unwrap();

        assert_eq!(
            report.sentences,
            ["A car passed the cat.", "The cat sat near the car."]
        );
        assert_eq!(report.stats.sentences_scanned, 3);
        assert_eq!(report.stats.sentences_matched, 2);
        assert_eq!(report.stats.keyword_occurrences["cat"], 2);
        assert_eq!(report.stats.keyword_occurrences["car"], 2);
    }

    #[tokio::test]
    async fn test_duplicate_sentences_preserved_across_sources() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "The cat sat.").unwrap();
        std::fs::write(temp_dir.path().join("b.txt"), "The cat sat.").unwrap();

        let source = TextSource::Directory(temp_dir.path().to_path_buf());
        let keywords = vec!["cat".to_string()];
        let report = run_pipeline(&source, &keywords, &test_config())
            .await
            .unwrap();

        assert_eq!(report.sentences, ["The cat sat.", "The cat sat."]);
        assert_eq!(report.stats.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_source_degrades_to_zero_matches() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let source = TextSource::File(missing);
        let keywords = vec!["cat".to_string()];
        let report = run_pipeline(&source, &keywords, &test_config())
            .await
            .unwrap();

        assert!(report.sentences.is_empty());
        assert_eq!(report.stats.sources.len(), 1);
        assert_eq!(report.stats.sources[0].status, "failed");
        assert!(report.stats.sources[0].error.is_some());
    }

    #[tokio::test]
    async fn test_matched_sentences_are_normalized() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wrapped.txt");
        std::fs::write(&path, "The cat\nsat on\r\nthe mat.").unwrap();

        let source = TextSource::File(path);
        let keywords = vec!["cat".to_string()];
        let report = run_pipeline(&source, &keywords, &test_config())
            .await
            .unwrap();

        assert_eq!(report.sentences, ["The cat sat on the mat."]);
    }

    #[tokio::test]
    async fn test_write_stats_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        std::fs::write(&path, "The cat sat.").unwrap();

        let source = TextSource::File(path);
        let keywords = vec!["cat".to_string()];
        let report = run_pipeline(&source, &keywords, &test_config())
            .await
            .unwrap();

        let stats_path = temp_dir.path().join("run_stats.json");
        write_stats(&report.stats, &stats_path).unwrap();

        let json = std::fs::read_to_string(&stats_path).unwrap();
        let parsed: RunStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sentences_matched, 1);
        assert_eq!(parsed.keyword_occurrences["cat"], 1);
    }
}
