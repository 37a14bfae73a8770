//! Run and batch generation configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use grte_core::tokenizer::MIN_LEN;
use grte_core::{GrteError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::seed::DEFAULT_SEED;

/// What the batch generator does when an example's spans cannot be mapped
/// onto tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanErrorPolicy {
    /// Log a warning and leave the example out.
    #[default]
    Skip,
    /// Yield the error and stop producing batches.
    Abort,
}

/// Configuration for [`DataGenerator`](crate::generator::DataGenerator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Maximum tokens per example, sentinels included.
    pub max_len: usize,
    /// Examples per batch.
    pub batch_size: usize,
    /// Shuffle examples before batching.
    pub shuffle: bool,
    /// Seed for the shuffle.
    pub seed: u64,
    /// How to treat unresolvable spans.
    pub on_span_error: SpanErrorPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_len: 100,
            batch_size: 6,
            shuffle: false,
            seed: DEFAULT_SEED,
            on_span_error: SpanErrorPolicy::Skip,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token budget per example (at least room for both sentinels).
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(MIN_LEN);
        self
    }

    /// Set the batch size (at least one).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool, seed: u64) -> Self {
        self.shuffle = shuffle;
        self.seed = seed;
        self
    }

    pub fn with_span_error_policy(mut self, policy: SpanErrorPolicy) -> Self {
        self.on_span_error = policy;
        self
    }
}

/// Options of one labeling or decoding run, as recorded in `config.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    pub schema: PathBuf,
    pub tokenizer: Option<PathBuf>,
    pub vocab: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub max_len: usize,
    pub batch_size: usize,
    pub shuffle: bool,
    pub seed: u64,
    pub on_span_error: SpanErrorPolicy,
}

impl RunConfig {
    /// The batch generator settings of this run.
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new()
            .with_max_len(self.max_len)
            .with_batch_size(self.batch_size)
            .with_shuffle(self.shuffle, self.seed)
            .with_span_error_policy(self.on_span_error)
    }
}

/// Render a config as `key = value` lines sorted by key.
pub fn render_config<T: Serialize>(config: &T) -> Result<String> {
    let Value::Object(fields) = serde_json::to_value(config)? else {
        return Err(GrteError::InvalidConfig("configuration must serialize to a map".into()));
    };

    let sorted: BTreeMap<String, Value> = fields.into_iter().collect();
    let mut out = String::new();
    for (key, value) in sorted {
        let value = match value {
            Value::String(s) => s,
            Value::Null => "None".to_string(),
            other => other.to_string(),
        };
        out.push_str(&format!("{key} = {value}\n"));
    }
    Ok(out)
}

/// Write `config.txt` into `dir`, creating the directory if needed.
pub fn dump_config<T: Serialize>(dir: &Path, config: &T) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join("config.txt");
    fs::write(&path, render_config(config)?)?;
    info!(path = %path.display(), "wrote run configuration");
    Ok(path)
}
