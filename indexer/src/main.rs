use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};
use trawl_core::{IndexSet, StoreOptions};

mod maintenance;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Inspect and maintain the crawled index", long_about = None)]
struct Cli {
    /// Index root directory written by the crawler
    #[arg(long, default_value = "./db")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every entry of one store as JSON lines
    Dump {
        /// Store name, e.g. document_ids or content_postings
        store: String,
    },
    /// Copy every store into a fresh directory
    Snapshot {
        #[arg(long)]
        dest: PathBuf,
    },
    /// Rank the corpus against a query
    Query {
        text: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
    /// Rebuild child->parent links from the parent->child index
    Relink,
    /// Delete one document and everything indexed for it
    Remove {
        url: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();
    let indexes = IndexSet::open(&cli.db, &StoreOptions::default())?;
    let result = run(&indexes, cli.command);
    indexes.close()?;
    result
}

fn run(indexes: &IndexSet, command: Commands) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match command {
        Commands::Dump { store } => {
            let n = maintenance::dump(indexes, &store, &mut out)?;
            tracing::info!(store = %store, entries = n, "dump complete");
        }
        Commands::Snapshot { dest } => {
            indexes.snapshot(&dest)?;
            tracing::info!(dest = %dest.display(), "snapshot complete");
        }
        Commands::Query { text, k } => {
            let n = maintenance::query(indexes, &text, k, &mut out)?;
            tracing::info!(query = %text, hits = n, "query complete");
        }
        Commands::Relink => {
            let edges = crawler::link_parents(indexes)?;
            tracing::info!(edges, "relink complete");
        }
        Commands::Remove { url } => {
            let doc_id = maintenance::remove(indexes, &url)?;
            tracing::info!(url = %url, doc_id, "document removed");
        }
    }
    out.flush()?;
    Ok(())
}
