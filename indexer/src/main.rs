use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pubsearch_core::persist::{load_documents, load_index, load_snapshot, save_documents, save_index};
use pubsearch_core::{normalize, Hit, Index, SearchEngine};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Normalize crawled publications, build the TF-IDF index and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn the crawler's detail snapshot into canonical documents
    Normalize {
        /// Detail snapshot written by the crawler
        #[arg(long, default_value = "data/data.json")]
        input: PathBuf,
        /// Output documents file (doc_id -> document)
        #[arg(long, default_value = "data/processed_documents.json")]
        output: PathBuf,
    },
    /// Build the index from normalized documents
    Build {
        #[arg(long, default_value = "data/processed_documents.json")]
        input: PathBuf,
        /// Output index blob
        #[arg(long, default_value = "data/index.bin")]
        output: PathBuf,
    },
    /// Run one query against a built index
    Query {
        #[arg(long, default_value = "data/index.bin")]
        index: PathBuf,
        /// Query text
        #[arg(long)]
        q: String,
        /// Number of results
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Also print authors, year, journal, citations and url
        #[arg(long, default_value_t = false)]
        full: bool,
    },
    /// Print index and engine statistics
    Stats {
        #[arg(long, default_value = "data/index.bin")]
        index: PathBuf,
    },
    /// Normalize, build and verify in one go
    Pipeline {
        #[arg(long, default_value = "data/data.json")]
        snapshot: PathBuf,
        #[arg(long, default_value = "data/processed_documents.json")]
        documents: PathBuf,
        #[arg(long, default_value = "data/index.bin")]
        index: PathBuf,
        /// Reuse the existing documents file instead of normalizing again
        #[arg(long, default_value_t = false)]
        skip_normalize: bool,
        /// Query used to check the fresh index
        #[arg(long, default_value = "machine learning")]
        probe: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { input, output } => normalize_snapshot(&input, &output).map(|_| ()),
        Commands::Build { input, output } => build_index(&input, &output),
        Commands::Query { index, q, k, full } => run_query(&index, &q, k, full),
        Commands::Stats { index } => print_stats(&index),
        Commands::Pipeline { snapshot, documents, index, skip_normalize, probe } => {
            run_pipeline(&snapshot, &documents, &index, skip_normalize, &probe)
        }
    }
}

fn normalize_snapshot(input: &Path, output: &Path) -> Result<usize> {
    if !input.exists() {
        bail!("snapshot {} not found; run the crawler first", input.display());
    }
    let snapshot = load_snapshot(input).with_context(|| format!("reading {}", input.display()))?;
    let documents = normalize(&snapshot);
    save_documents(output, &documents).with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(publications = snapshot.len(), documents = documents.len(), output = %output.display(), "normalization complete");
    Ok(documents.len())
}

fn build_index(input: &Path, output: &Path) -> Result<()> {
    let documents = load_documents(input).with_context(|| format!("reading {}", input.display()))?;
    let start = Instant::now();
    let index = Index::build(documents);
    let header = save_index(output, &index).with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(
        num_docs = header.num_docs,
        num_terms = header.num_terms,
        took_s = start.elapsed().as_secs_f64(),
        output = %output.display(),
        "index build complete"
    );
    Ok(())
}

fn print_hits(hits: &[Hit<'_>], full: bool) {
    for (rank, hit) in hits.iter().enumerate() {
        let doc = hit.document;
        println!("{:>2}. [{:.4}] {} {}", rank + 1, hit.score, hit.doc_id, doc.title);
        if !full {
            continue;
        }
        let authors: Vec<&str> = doc.authors.iter().map(|a| a.name.as_str()).collect();
        println!("    authors:   {}", if authors.is_empty() { "-".to_string() } else { authors.join("; ") });
        println!("    year:      {}", doc.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into()));
        println!("    journal:   {}", if doc.journal.is_empty() { "-" } else { &doc.journal });
        println!("    citations: {}", doc.citations);
        println!("    url:       {}", doc.publication_url);
    }
}

fn run_query(index: &Path, q: &str, k: usize, full: bool) -> Result<()> {
    let engine = SearchEngine::load(index).with_context(|| format!("loading {}", index.display()))?;
    let start = Instant::now();
    let hits = engine.search(q, k.max(1));
    tracing::info!(query = q, hits = hits.len(), took_s = start.elapsed().as_secs_f64(), "query done");
    if hits.is_empty() {
        println!("no results for {q:?}");
    } else {
        print_hits(&hits, full);
    }
    Ok(())
}

fn print_stats(index: &Path) -> Result<()> {
    let index = load_index(index).with_context(|| format!("loading {}", index.display()))?;
    let stats = index.stats();
    let engine = SearchEngine::new(index);
    let engine_stats = engine.statistics();
    println!("documents:       {}", stats.documents);
    println!("unique terms:    {}", stats.unique_terms);
    println!("total postings:  {}", stats.total_postings);
    println!("avg doc norm:    {:.4}", stats.avg_norm);
    println!("avg doc length:  {:.2} tokens", engine_stats.avg_doc_length);
    Ok(())
}

fn run_pipeline(snapshot: &Path, documents: &Path, index: &Path, skip_normalize: bool, probe: &str) -> Result<()> {
    if skip_normalize {
        tracing::info!(documents = %documents.display(), "skipping normalization");
    } else {
        normalize_snapshot(snapshot, documents).context("normalize step failed")?;
    }
    build_index(documents, index).context("build step failed")?;

    let engine = SearchEngine::load(index).context("verify step failed")?;
    let hits = engine.search(probe, 3);
    tracing::info!(probe, hits = hits.len(), "index verified");
    print_hits(&hits, false);
    Ok(())
}
