//! # Batch Generator
//!
//! Pull-based batching of annotated examples. Training batches carry padded
//! label tables and masks; evaluation batches carry only token ids and the
//! encodings needed to map predictions back onto text. Dropping an iterator
//! stops batch production.

use candle_core::{Device, Tensor};
use grte_core::{
    Encoding, Example, ExampleEncoder, GrteError, LabeledExample, PredicateSchema, Result,
    SpanTokenizer,
};
use tracing::{debug, info, warn};

use crate::config::{GeneratorConfig, SpanErrorPolicy};
use crate::padding::{mask_padding, sequence_padding, table_padding};
use crate::seed::{seeded_rng, shuffle};

/// A padded training batch.
#[derive(Debug, Clone)]
pub struct TrainBatch {
    /// `(B, L)` u32
    pub token_ids: Tensor,
    /// `(B, L)` u32, 1 on real tokens
    pub attention_mask: Tensor,
    /// `(B, L, L, P)` u32 tag ids
    pub labels: Tensor,
    /// `(B, L, L, P)` f32
    pub label_mask: Tensor,
    pub examples: Vec<Example>,
}

impl TrainBatch {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

/// A padded inference batch.
#[derive(Debug, Clone)]
pub struct EvalBatch {
    /// `(B, L)` u32
    pub token_ids: Tensor,
    /// `(B, L)` u32, 1 on real tokens
    pub attention_mask: Tensor,
    pub encodings: Vec<Encoding>,
    pub examples: Vec<Example>,
}

impl EvalBatch {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Real token count of every example, for the decoder's boundary filter.
    pub fn token_counts(&self) -> Vec<usize> {
        self.encodings.iter().map(Encoding::len).collect()
    }
}

/// Errors that concern a single example's annotations rather than the run.
fn is_annotation_error(err: &GrteError) -> bool {
    matches!(
        err,
        GrteError::SpanResolution { .. }
            | GrteError::SpanOutOfBounds { .. }
            | GrteError::UnknownPredicate(_)
            | GrteError::UnknownPredicateId { .. }
    )
}

/// Produces batches from a list of examples.
pub struct DataGenerator<'a, T: SpanTokenizer + ?Sized> {
    examples: &'a [Example],
    tokenizer: &'a T,
    schema: &'a PredicateSchema,
    config: GeneratorConfig,
    device: Device,
}

impl<'a, T: SpanTokenizer + ?Sized> DataGenerator<'a, T> {
    pub fn new(
        examples: &'a [Example],
        tokenizer: &'a T,
        schema: &'a PredicateSchema,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            examples,
            tokenizer,
            schema,
            config,
            device: Device::Cpu,
        }
    }

    /// Place batch tensors on `device`.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.examples.len()).collect();
        if self.config.shuffle {
            shuffle(&mut order, &mut seeded_rng(self.config.seed));
        }
        order
    }

    fn encoder(&self) -> ExampleEncoder<'a, T> {
        ExampleEncoder::new(self.tokenizer, self.schema, self.config.max_len)
    }

    /// Labeled batches. Malformed and unlabeled examples are skipped.
    pub fn train_batches(&self) -> TrainBatches<'_, 'a, T> {
        info!(
            examples = self.examples.len(),
            batch_size = self.config.batch_size,
            "generating training batches"
        );
        TrainBatches {
            generator: self,
            encoder: self.encoder(),
            order: self.order().into_iter(),
            done: false,
        }
    }

    /// Unlabeled batches over every example.
    pub fn eval_batches(&self) -> EvalBatches<'_, 'a, T> {
        EvalBatches {
            generator: self,
            encoder: self.encoder(),
            order: self.order().into_iter(),
            done: false,
        }
    }

    fn id_tensors(&self, encodings: &[&Encoding]) -> Result<(Tensor, Tensor)> {
        let ids: Vec<Vec<u32>> = encodings.iter().map(|e| e.ids.clone()).collect();
        let ones: Vec<Vec<u32>> = encodings.iter().map(|e| vec![1; e.len()]).collect();
        Ok((
            sequence_padding(&ids, 0, &self.device)?,
            sequence_padding(&ones, 0, &self.device)?,
        ))
    }

    fn train_batch(&self, pending: Vec<(LabeledExample, Example)>) -> Result<TrainBatch> {
        let encodings: Vec<&Encoding> = pending.iter().map(|(l, _)| &l.encoding).collect();
        let (token_ids, attention_mask) = self.id_tensors(&encodings)?;
        let tables: Vec<_> = pending.iter().map(|(l, _)| &l.table.labels).collect();
        let masks: Vec<_> = pending.iter().map(|(l, _)| &l.table.mask).collect();

        let batch = TrainBatch {
            token_ids,
            attention_mask,
            labels: table_padding(&tables, &self.device)?,
            label_mask: mask_padding(&masks, &self.device)?,
            examples: pending.into_iter().map(|(_, ex)| ex).collect(),
        };
        debug!(size = batch.len(), "built training batch");
        Ok(batch)
    }

    fn eval_batch(&self, pending: Vec<(Encoding, Example)>) -> Result<EvalBatch> {
        let encodings: Vec<&Encoding> = pending.iter().map(|(e, _)| e).collect();
        let (token_ids, attention_mask) = self.id_tensors(&encodings)?;
        let (encodings, examples) = pending.into_iter().unzip();
        Ok(EvalBatch {
            token_ids,
            attention_mask,
            encodings,
            examples,
        })
    }
}

/// Iterator over training batches.
pub struct TrainBatches<'g, 'a, T: SpanTokenizer + ?Sized> {
    generator: &'g DataGenerator<'a, T>,
    encoder: ExampleEncoder<'a, T>,
    order: std::vec::IntoIter<usize>,
    done: bool,
}

impl<T: SpanTokenizer + ?Sized> Iterator for TrainBatches<'_, '_, T> {
    type Item = Result<TrainBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let batch_size = self.generator.config.batch_size.max(1);
        let mut pending = Vec::with_capacity(batch_size);
        while pending.len() < batch_size {
            let Some(idx) = self.order.next() else {
                self.done = true;
                break;
            };
            let example = &self.generator.examples[idx];
            if !example.is_well_formed() {
                warn!(text = %example.text, "skipping malformed example");
                continue;
            }

            match self.encoder.encode(example) {
                Ok(Some(labeled)) => pending.push((labeled, example.clone())),
                Ok(None) => {}
                Err(err)
                    if is_annotation_error(&err)
                        && self.generator.config.on_span_error == SpanErrorPolicy::Skip =>
                {
                    warn!(error = %err, text = %example.text, "skipping example");
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }

        if pending.is_empty() {
            return None;
        }
        Some(self.generator.train_batch(pending))
    }
}

/// Iterator over evaluation batches.
pub struct EvalBatches<'g, 'a, T: SpanTokenizer + ?Sized> {
    generator: &'g DataGenerator<'a, T>,
    encoder: ExampleEncoder<'a, T>,
    order: std::vec::IntoIter<usize>,
    done: bool,
}

impl<T: SpanTokenizer + ?Sized> Iterator for EvalBatches<'_, '_, T> {
    type Item = Result<EvalBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let batch_size = self.generator.config.batch_size.max(1);
        let mut pending = Vec::with_capacity(batch_size);
        for idx in self.order.by_ref().take(batch_size) {
            let example = &self.generator.examples[idx];
            match self.encoder.tokenize(example) {
                Ok(encoding) => pending.push((encoding, example.clone())),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }

        if pending.is_empty() {
            self.done = true;
            return None;
        }
        Some(self.generator.eval_batch(pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::{Arc, Mutex};

    use grte_core::{Mention, RelationTriple, TableTag, Vocab, WordTokenizer};
    use tracing::Level;

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn spo(s: (usize, usize, &str), p: &str, o: (usize, usize, &str)) -> RelationTriple {
        RelationTriple(
            Mention(s.0, s.1, s.2.into()),
            p.into(),
            Mention(o.0, o.1, o.2.into()),
        )
    }

    fn dataset() -> Vec<Example> {
        vec![
            // [CLS] a b [SEP]
            Example::new("a b", vec![spo((0, 1, "a"), "p", (2, 3, "b"))]),
            // malformed: "z" is not in the text
            Example::new("a b", vec![spo((0, 1, "z"), "p", (2, 3, "b"))]),
            // [CLS] c d e f [SEP]
            Example::new("c d e f", vec![spo((0, 1, "c"), "q", (2, 7, "d e f"))]),
            // no triples
            Example::new("g h", vec![]),
            // [CLS] i j k [SEP]
            Example::new("i j k", vec![spo((0, 3, "i j"), "p", (4, 5, "k"))]),
        ]
    }

    fn fixtures() -> (WordTokenizer, PredicateSchema) {
        let vocab = Vocab::from_words(
            ["**PAD**", "**UNK**", "[CLS]", "[SEP]", "a", "b"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        (
            WordTokenizer::new(vocab).unwrap(),
            PredicateSchema::from_names(["p", "q"]).unwrap(),
        )
    }

    #[test]
    fn test_malformed_example_is_warned() {
        let (tok, schema) = fixtures();
        let examples = dataset();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let generator = DataGenerator::new(&examples, &tok, &schema, GeneratorConfig::new());
            assert_eq!(generator.train_batches().count(), 1);
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"));
        assert!(logs.contains("skipping malformed example"));
    }

    #[test]
    fn test_train_batches_skip_and_pad() {
        let (tok, schema) = fixtures();
        let examples = dataset();
        let config = GeneratorConfig::new().with_batch_size(2);
        let generator = DataGenerator::new(&examples, &tok, &schema, config);

        let batches: Vec<TrainBatch> = generator.train_batches().collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        // Final partial batch is still produced.
        assert_eq!(batches[1].len(), 1);

        let first = &batches[0];
        assert_eq!(first.examples[0].text, "a b");
        assert_eq!(first.examples[1].text, "c d e f");
        assert_eq!(first.token_ids.dims(), &[2, 6]);
        assert_eq!(first.labels.dims(), &[2, 6, 6, 2]);
        assert_eq!(first.label_mask.dims(), &[2, 6, 6, 2]);

        let ids: Vec<Vec<u32>> = first.token_ids.to_vec2().unwrap();
        assert_eq!(ids[0], vec![2, 4, 5, 3, 0, 0]);
        let mask: Vec<Vec<u32>> = first.attention_mask.to_vec2().unwrap();
        assert_eq!(mask[0], vec![1, 1, 1, 1, 0, 0]);
        assert_eq!(mask[1], vec![1; 6]);

        let flat: Vec<u32> = first.labels.flatten_all().unwrap().to_vec1().unwrap();
        let at = |b: usize, l1: usize, l2: usize, p: usize| flat[((b * 6 + l1) * 6 + l2) * 2 + p];
        assert_eq!(at(0, 1, 2, 0), TableTag::SingleSingle.index() as u32);
        assert_eq!(at(1, 1, 2, 1), TableTag::SingleMultiHead.index() as u32);
        assert_eq!(at(1, 1, 4, 1), TableTag::SingleMultiTail.index() as u32);
    }

    #[test]
    fn test_eval_batches_keep_everything() {
        let (tok, schema) = fixtures();
        let examples = dataset();
        let config = GeneratorConfig::new().with_batch_size(2);
        let generator = DataGenerator::new(&examples, &tok, &schema, config);

        let batches: Vec<EvalBatch> = generator.eval_batches().collect::<Result<_>>().unwrap();
        let sizes: Vec<usize> = batches.iter().map(EvalBatch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[1].token_counts(), vec![6, 4]);
    }

    #[test]
    fn test_span_error_policy() {
        let (tok, schema) = fixtures();
        // Truncation to 3 tokens cuts off every object.
        let examples = vec![Example::new("a b", vec![spo((0, 1, "a"), "p", (2, 3, "b"))])];

        let skip = GeneratorConfig::new().with_max_len(3);
        let generator = DataGenerator::new(&examples, &tok, &schema, skip);
        assert_eq!(generator.train_batches().count(), 0);

        let abort = GeneratorConfig::new()
            .with_max_len(3)
            .with_span_error_policy(SpanErrorPolicy::Abort);
        let generator = DataGenerator::new(&examples, &tok, &schema, abort);
        let results: Vec<_> = generator.train_batches().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(GrteError::SpanResolution { .. })));
    }

    #[test]
    fn test_shuffle_is_reproducible() {
        let (tok, schema) = fixtures();
        let examples = dataset();
        let texts = |seed| {
            let config = GeneratorConfig::new()
                .with_batch_size(1)
                .with_shuffle(true, seed);
            DataGenerator::new(&examples, &tok, &schema, config)
                .eval_batches()
                .map(|b| b.unwrap().examples[0].text.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(texts(3), texts(3));
        assert_eq!(texts(3).len(), examples.len());
    }
}
