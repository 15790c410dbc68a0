pub mod automaton;
pub mod discovery;
pub mod index;
pub mod pipeline;
pub mod sentence;
pub mod source;

// Re-export main types for convenient access
pub use automaton::PatternAutomaton;
pub use index::OrderedIndex;
pub use pipeline::{run_pipeline, write_stats, MatchReport, PipelineConfig, RunStats, SourceStats};
pub use sentence::{normalize_text, SentenceSplitter, SentenceUnit};
pub use source::{AcquiredText, SourceConfig, TextSource};
