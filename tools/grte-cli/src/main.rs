//! GRTE command-line tool
//!
//! Builds word vocabularies, turns annotated JSON-lines datasets into
//! relation-table labels, and decodes predicted tables back into triples.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use grte_core::tokenizer::{CLS_TOKEN, MIN_LEN, SEP_TOKEN};
use grte_core::{
    Example, HfTokenizer, PredicateSchema, SpanTokenizer, TableTag, TagTable, TripleExtractor,
    Vocab, WordTokenizer, load_examples,
};
use grte_trainer::{DataGenerator, RunConfig, SpanErrorPolicy, TrainBatch, dump_config};
use serde::{Deserialize, Serialize};
use tracing::{Level, info, warn};

/// CLI arguments
#[derive(Parser)]
#[command(name = "grte")]
#[command(about = "Table-filling labels for joint relation extraction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log per-example details
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a word vocabulary from a dataset
    Vocab {
        /// JSON-lines dataset
        #[arg(short, long, env = "GRTE_INPUT")]
        input: PathBuf,
        /// Where to write the vocabulary
        #[arg(short, long)]
        output: PathBuf,
        /// Drop words seen fewer times than this
        #[arg(short, long, default_value_t = 0)]
        threshold: usize,
    },
    /// Encode a dataset into relation-table labels
    Encode {
        #[command(flatten)]
        common: CommonArgs,
        /// Directory for config.txt and labels.jsonl
        #[arg(short, long, env = "GRTE_OUTPUT_DIR")]
        output_dir: PathBuf,
        /// Examples per batch
        #[arg(short, long, default_value_t = 6)]
        batch_size: usize,
        /// Shuffle examples before batching
        #[arg(long)]
        shuffle: bool,
        /// Shuffle seed
        #[arg(long, default_value_t = grte_trainer::DEFAULT_SEED)]
        seed: u64,
        /// Stop at the first example whose spans cannot be resolved
        #[arg(long)]
        abort_on_span_error: bool,
    },
    /// Decode predicted table cells into triples
    Decode {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON-lines input
    #[arg(short, long, env = "GRTE_INPUT")]
    input: PathBuf,
    /// Predicate schema (rel2id.json)
    #[arg(short, long, env = "GRTE_SCHEMA")]
    schema: PathBuf,
    /// Hugging Face tokenizer.json
    #[arg(
        long,
        env = "GRTE_TOKENIZER",
        conflicts_with = "vocab",
        required_unless_present = "vocab"
    )]
    tokenizer: Option<PathBuf>,
    /// Word vocabulary for the built-in word tokenizer
    #[arg(long, env = "GRTE_VOCAB")]
    vocab: Option<PathBuf>,
    /// Maximum tokens per example, sentinels included
    #[arg(
        short,
        long,
        default_value_t = 100,
        value_parser = RangedU64ValueParser::<usize>::new().range((MIN_LEN as u64)..)
    )]
    max_len: usize,
}

impl CommonArgs {
    fn load_tokenizer(&self) -> Result<Box<dyn SpanTokenizer>> {
        if let Some(path) = &self.tokenizer {
            let tokenizer = HfTokenizer::from_file(path)
                .with_context(|| format!("Failed to load tokenizer from {}", path.display()))?;
            return Ok(Box::new(tokenizer));
        }
        let path = self
            .vocab
            .as_ref()
            .context("Either --tokenizer or --vocab is required")?;
        let vocab = Vocab::load(path)
            .with_context(|| format!("Failed to load vocabulary from {}", path.display()))?;
        Ok(Box::new(WordTokenizer::new(vocab)?))
    }

    fn load_schema(&self) -> Result<PredicateSchema> {
        PredicateSchema::load(&self.schema)
            .with_context(|| format!("Failed to load schema from {}", self.schema.display()))
    }
}

/// One line of `labels.jsonl`, and of the decode input.
#[derive(Debug, Serialize, Deserialize)]
struct CellRecord {
    text: String,
    cells: Vec<(usize, usize, usize, String)>,
}

fn build_vocab(input: &Path, output: &Path, threshold: usize) -> Result<()> {
    let examples = load_examples(input)
        .with_context(|| format!("Failed to read dataset {}", input.display()))?;
    let splitter = WordTokenizer::new(Vocab::from_words(Vec::new()))?;

    let mut counter: HashMap<String, usize> = HashMap::new();
    for example in &examples {
        for word in splitter.words(&example.text) {
            *counter.entry(word).or_insert(0) += 1;
        }
    }
    // Sentinels occur once per example and must survive the threshold.
    for sentinel in [CLS_TOKEN, SEP_TOKEN] {
        counter.insert(sentinel.to_string(), examples.len().max(threshold));
    }

    let vocab = Vocab::from_counter(&counter, threshold);
    vocab.save(output)?;
    let size = vocab.len();
    println!("Vocab size {size} saved to file {}", output.display());
    Ok(())
}

/// Non-`NONE` cells of every example in a training batch.
fn batch_cells(batch: &TrainBatch) -> Result<Vec<Vec<(usize, usize, usize, String)>>> {
    let (size, len, _, num_predicates) = batch.labels.dims4()?;
    let flat: Vec<u32> = batch.labels.flatten_all()?.to_vec1()?;
    let stride = len * len * num_predicates;

    let mut out = Vec::with_capacity(size);
    for b in 0..size {
        let chunk = &flat[b * stride..(b + 1) * stride];
        let table = TagTable::from_ids(len, num_predicates, chunk)?;
        out.push(
            table
                .cells()
                .map(|(l1, l2, p, tag)| (l1, l2, p, tag.to_string()))
                .collect(),
        );
    }
    Ok(out)
}

/// Write one `labels.jsonl` record per kept example. Returns the batch and
/// example counts.
fn write_labels<T, W>(generator: &DataGenerator<'_, T>, out: &mut W) -> Result<(usize, usize)>
where
    T: SpanTokenizer + ?Sized,
    W: Write,
{
    let mut batches = 0usize;
    let mut kept = 0usize;
    for batch in generator.train_batches() {
        let batch = batch.context("Failed to build training batch")?;
        for (example, cells) in batch.examples.iter().zip(batch_cells(&batch)?) {
            let record = CellRecord {
                text: example.text.clone(),
                cells,
            };
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        }
        batches += 1;
        kept += batch.len();
    }
    Ok((batches, kept))
}

fn encode(common: &CommonArgs, run: &RunConfig) -> Result<()> {
    let examples = load_examples(&common.input)
        .with_context(|| format!("Failed to read dataset {}", common.input.display()))?;
    let schema = common.load_schema()?;
    let tokenizer = common.load_tokenizer()?;

    dump_config(&run.output_dir, run)?;
    let labels_path = run.output_dir.join("labels.jsonl");
    let mut out = BufWriter::new(
        File::create(&labels_path)
            .with_context(|| format!("Failed to create {}", labels_path.display()))?,
    );

    let config = run.generator_config();
    let generator = DataGenerator::new(&examples, tokenizer.as_ref(), &schema, config);

    let (batches, kept) = write_labels(&generator, &mut out)?;
    out.flush()?;

    info!(
        batches,
        kept,
        skipped = examples.len() - kept,
        "encoding complete"
    );
    println!(
        "Encoded {} of {} examples into {} batches at {}",
        kept,
        examples.len(),
        batches,
        labels_path.display()
    );
    Ok(())
}

/// Rebuild a predicted table. Unknown tags and cells outside the table are
/// skipped.
fn record_table(record: &CellRecord, len: usize, num_predicates: usize) -> TagTable {
    let mut table = TagTable::new(len, num_predicates);
    for (l1, l2, p, tag) in &record.cells {
        let Ok(parsed) = tag.parse::<TableTag>() else {
            warn!(l1, l2, p, tag = %tag, "ignoring cell with unknown tag");
            continue;
        };
        if table.set(*l1, *l2, *p, parsed).is_err() {
            warn!(l1, l2, p, tag = %parsed, "ignoring cell outside the table");
        }
    }
    table
}

/// Decode `{text, cells}` lines into one example line each. Returns the
/// number of decoded lines.
fn decode_records<R, W>(
    reader: R,
    out: &mut W,
    tokenizer: &dyn SpanTokenizer,
    schema: &PredicateSchema,
    max_len: usize,
) -> Result<usize>
where
    R: BufRead,
    W: Write,
{
    let extractor = TripleExtractor::new(schema);
    let mut decoded = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: CellRecord = serde_json::from_str(line)
            .context("Invalid prediction line")?;
        let encoding = tokenizer.encode(&record.text, max_len)?;
        let table = record_table(&record, encoding.len(), schema.len());

        let triples = extractor.extract_table(&record.text, &encoding, &table);
        let example = Example::new(record.text, triples);
        writeln!(out, "{}", serde_json::to_string(&example)?)?;
        decoded += 1;
    }
    Ok(decoded)
}

fn decode(common: &CommonArgs) -> Result<()> {
    let schema = common.load_schema()?;
    let tokenizer = common.load_tokenizer()?;

    let reader = BufReader::new(
        File::open(&common.input)
            .with_context(|| format!("Failed to open {}", common.input.display()))?,
    );
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let max_len = common.max_len;
    let decoded = decode_records(reader, &mut out, tokenizer.as_ref(), &schema, max_len)?;
    info!(decoded, "decoding complete");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Vocab {
            input,
            output,
            threshold,
        } => build_vocab(&input, &output, threshold),
        Commands::Encode {
            common,
            output_dir,
            batch_size,
            shuffle,
            seed,
            abort_on_span_error,
        } => {
            let run = RunConfig {
                input: common.input.clone(),
                schema: common.schema.clone(),
                tokenizer: common.tokenizer.clone(),
                vocab: common.vocab.clone(),
                output_dir,
                max_len: common.max_len,
                batch_size,
                shuffle,
                seed,
                on_span_error: if abort_on_span_error {
                    SpanErrorPolicy::Abort
                } else {
                    SpanErrorPolicy::Skip
                },
            };
            encode(&common, &run)
        }
        Commands::Decode { common } => decode(&common),
    }
}
