use anyhow::Context;
use clap::Parser;
use record_batcher::{
    OversizedPolicy,
    batch::{BatchPipeline, Batcher},
    config::Config,
    input::read_records,
    logging,
    observer::TracingObserver,
    output::BatchWriter,
    size::{byte_len, json_line_size},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::info;

/// Split newline-delimited records into size- and count-bounded batches
#[derive(Parser, Debug)]
#[command(name = "record-batcher", version)]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input file with one record per line (stdin when omitted); blank lines are skipped
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Treat each line as a JSON value and measure its compact serialized size
    #[arg(long)]
    json: bool,

    /// Fail on the first oversized record instead of discarding it
    #[arg(long)]
    strict: bool,

    /// Write each batch to `<dir>/batch-NNNN.txt` (zero-padded, from 0001);
    /// nothing is written unless the whole run succeeds
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

/// Size of one input line, raw bytes or compact JSON
fn measure(line: &str, json: bool) -> Result<u64, serde_json::Error> {
    if json {
        json_line_size(line)
    } else {
        Ok(byte_len(line))
    }
}

/// The main entry point for the batcher.
///
/// Loads the configuration, starts a reader task feeding records into the
/// batch pipeline, and prints a summary of the batches produced.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    logging::init(&config.logging);
    info!("Batcher starting with config: {:?}", config);

    let mut limits = config.limits()?;
    if args.strict {
        limits.oversized = OversizedPolicy::Reject;
    }
    let batcher = Batcher::new(limits)?.with_observer(Arc::new(TracingObserver));

    // Dropped without commit on any error below, discarding staged batches
    let mut writer = match &args.output_dir {
        Some(dir) => Some(BatchWriter::create(dir).await?),
        None => None,
    };

    let capacity = config.pipeline.channel_capacity.max(1);
    let (record_tx, record_rx) = mpsc::channel(capacity);
    let (batch_tx, mut batch_rx) = mpsc::channel(capacity);

    let reader = tokio::spawn(read_input(args.input.clone(), record_tx));

    let json = args.json;
    let pipeline = BatchPipeline::try_new(batcher, move |line: &String| measure(line, json))
        .with_linger(Duration::from_millis(config.pipeline.linger_ms));
    let pipeline = tokio::spawn(pipeline.run(record_rx, batch_tx));

    let mut summaries = Vec::new();
    while let Some(batch) = batch_rx.recv().await {
        let size = batch
            .iter()
            .map(|line| measure(line, json))
            .sum::<Result<u64, _>>()?;
        if let Some(writer) = writer.as_mut() {
            writer.write(&batch).await?;
        }
        summaries.push((batch.len(), size));
    }

    // The pipeline error explains why the reader may have stopped early
    let stats = pipeline.await??;
    reader.await??;

    if let Some(writer) = writer {
        writer.commit().await?;
    }

    println!("Number of batches: {}", summaries.len());
    for (i, (count, size)) in summaries.iter().enumerate() {
        println!("Batch {}: {} records, Size: {} bytes", i + 1, count, size);
    }
    if stats.records_discarded > 0 {
        println!(
            "Discarded {} of {} records above {} bytes",
            stats.records_discarded, stats.records_in, limits.max_record_size
        );
    }

    Ok(())
}

/// Open the input file, or stdin, and feed its records to the pipeline
async fn read_input(input: Option<PathBuf>, records: mpsc::Sender<String>) -> anyhow::Result<usize> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => {
            let file = File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    read_records(reader, records).await
}
