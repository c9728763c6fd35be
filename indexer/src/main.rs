use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use wikidx_core::persist::{self, IndexPaths};
use wikidx_core::{
    IdfTable, IndexConfig, JsonlBatchReader, NonEmptyText, Pass, Pipeline, StandardTermProcessor,
    TfVariant,
};

use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(
    about = "Build DF/IDF statistics, a sharded inverted index and document norms",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Directory holding wiki-NNN.jsonl batch files
    #[arg(long, global = true, default_value = "./data/wiki-pages")]
    data_dir: PathBuf,
    /// Output directory for generated statistics, shards and norms
    #[arg(long, global = true, default_value = "./generated")]
    output: PathBuf,
    /// JSON configuration file; flags below override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Only use a subset of the batches (DF/IDF values will be invalid)
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    /// Number of index shards
    #[arg(long, global = true)]
    shards: Option<u32>,
    /// Number of documents in the collection after filtering
    #[arg(long, global = true)]
    collection_size: Option<u64>,
    /// TF weighting variant for document norms: raw_count or relative
    #[arg(long, global = true)]
    variant: Option<String>,
    /// Worker threads (defaults to the number of CPUs)
    #[arg(long, global = true)]
    workers: Option<usize>,
    /// First batch id (inclusive)
    #[arg(long, global = true)]
    first_batch: Option<u32>,
    /// Last batch id (exclusive)
    #[arg(long, global = true)]
    last_batch: Option<u32>,
    /// Disable English stemming in term processing
    #[arg(long, global = true, default_value_t = false)]
    no_stem: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Count raw term occurrences over the collection
    Count,
    /// Compute document frequencies and IDF values
    Idf,
    /// Build the sharded inverted index from previously generated IDF values
    Index,
    /// Compute TF-IDF vector norms per document from previously generated IDF values
    Norms,
    /// Run statistics, index and norm passes in sequence
    All,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = load_config(&cli.common)?;

    let source = JsonlBatchReader::new(&cli.common.data_dir);
    let filter = NonEmptyText;
    let processor = if cli.common.no_stem {
        StandardTermProcessor::without_stemming()
    } else {
        StandardTermProcessor::new()
    };
    let pipeline = Pipeline::new(config, &source, &filter, &processor)?;
    let paths = IndexPaths::new(&cli.common.output);

    let start = Instant::now();
    match cli.command {
        Commands::Count => {
            let counts = pipeline.term_counts(&pipeline.batches(Pass::Statistics))?;
            persist::save_term_counts(&paths, &counts)?;
            tracing::info!(
                vocabulary = counts.len(),
                total = counts.total(),
                "counted term frequencies"
            );
        }
        Commands::Idf => {
            let idf = pipeline.run_statistics(&paths)?;
            tracing::info!(vocabulary = idf.len(), "generated IDF values");
        }
        Commands::Index => {
            let idf = load_idf(&paths)?;
            let shards = pipeline.run_index(&paths, &idf)?;
            pipeline.commit(&paths, &idf)?;
            tracing::info!(shards = shards.len(), "index generation complete");
        }
        Commands::Norms => {
            let idf = load_idf(&paths)?;
            let norms = pipeline.run_norms(&paths, &idf)?;
            if paths.shards_dir().exists() {
                pipeline.commit(&paths, &idf)?;
            }
            tracing::info!(documents = norms.len(), "document norm mapping complete");
        }
        Commands::All => {
            let idf = pipeline.run_statistics(&paths)?;
            let shards = pipeline.run_index(&paths, &idf)?;
            let norms = pipeline.run_norms(&paths, &idf)?;
            pipeline.commit(&paths, &idf)?;
            tracing::info!(
                vocabulary = idf.len(),
                shards = shards.len(),
                documents = norms.len(),
                "all passes complete"
            );
        }
    }
    tracing::info!(
        secs = start.elapsed().as_secs_f64(),
        output = %paths.root.display(),
        "finished"
    );
    Ok(())
}

fn load_idf(paths: &IndexPaths) -> Result<IdfTable> {
    persist::load_idf_table(paths).context("loading IDF values; run `indexer idf` first")
}

fn load_config(args: &CommonArgs) -> Result<IndexConfig> {
    let mut config = match &args.config {
        Some(path) => IndexConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    config.debug |= args.debug;
    if let Some(shards) = args.shards {
        config.num_shards = shards;
    }
    if let Some(size) = args.collection_size {
        config.collection_size = size;
    }
    if let Some(variant) = &args.variant {
        config.variant = variant.parse::<TfVariant>()?;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if let Some(first) = args.first_batch {
        config.first_batch = first;
    }
    if let Some(last) = args.last_batch {
        config.last_batch_exclusive = last;
    }
    config.validate()?;
    Ok(config)
}
