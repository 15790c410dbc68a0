use anyhow::Result;
use clap::Parser;
use kwsift::pipeline::{run_pipeline, write_stats, PipelineConfig};
use kwsift::source::TextSource;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kwsift")]
#[command(about = "Find keyword occurrences and report matching sentences in sorted order")]
#[command(version)]
struct Args {
    /// Text source: a file path, a directory of *.txt files, or an http(s) URL
    source: String,

    /// Keyword to search for (repeatable)
    #[arg(short = 'k', long = "keyword", required = true)]
    keywords: Vec<String>,

    /// Abort on first acquisition error instead of degrading to empty text
    #[arg(long)]
    fail_fast: bool,

    /// Use memory-mapped I/O for file sources instead of async buffered reads
    #[arg(long)]
    use_mmap: bool,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long, default_value = "run_stats.json")]
    stats_out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging on stderr keeps runs inspectable without
    // polluting the sorted sentence report on stdout
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();

    info!("Starting kwsift");
    info!(?args, "Parsed CLI arguments");

    // Keywords are a set: trim and drop empties early so a stray "" never
    // reaches the automaton.
    let keywords: Vec<String> = args
        .keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        anyhow::bail!("No non-empty keywords given");
    }

    let source = TextSource::parse(&args.source);
    if let TextSource::File(path) = &source {
        if !path.exists() {
            anyhow::bail!("Source does not exist: {}", path.display());
        }
    }

    let config = PipelineConfig {
        fail_fast: args.fail_fast,
        use_mmap: args.use_mmap,
        show_progress: !args.no_progress,
    };

    let report = run_pipeline(&source, &keywords, &config).await?;

    for sentence in &report.sentences {
        println!("{sentence}");
    }

    println!();
    println!("kwsift v{} - scan complete", env!("CARGO_PKG_VERSION"));
    println!("Sources processed: {}", report.stats.sources.len());
    println!("Sentences scanned: {}", report.stats.sentences_scanned);
    println!("Sentences with matches: {}", report.stats.sentences_matched);
    for (keyword, count) in &report.stats.keyword_occurrences {
        println!("  {keyword}: {count} occurrence(s)");
    }

    write_stats(&report.stats, &args.stats_out)?;
    info!("Stats written to {}", args.stats_out.display());

    Ok(())
}
