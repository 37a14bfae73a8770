//! # Annotated Examples
//!
//! Dataset records and their conversion into label tables.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::encoder::{EncodedTable, TableEncoder};
use crate::error::{GrteError, Result};
use crate::schema::PredicateSchema;
use crate::tokenizer::{Encoding, SpanTokenizer};
use crate::types::{RelationTriple, TokenSpan, TokenTriple};

/// One annotated sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    #[serde(default)]
    pub spos: Vec<RelationTriple>,
}

impl Example {
    pub fn new(text: impl Into<String>, spos: Vec<RelationTriple>) -> Self {
        Self {
            text: text.into(),
            spos,
        }
    }

    /// Returns `false` when any subject or object text is empty or does not
    /// occur verbatim in the sentence. Such examples are skipped for training.
    pub fn is_well_formed(&self) -> bool {
        self.spos.iter().all(|spo| {
            let (s, o) = (spo.subject().text(), spo.object().text());
            !s.is_empty() && !o.is_empty() && self.text.contains(s) && self.text.contains(o)
        })
    }
}

/// Read examples from a JSON-lines file, one object per line.
pub fn load_examples<P: AsRef<Path>>(path: P) -> Result<Vec<Example>> {
    let reader = BufReader::new(File::open(path)?);
    let mut examples = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        examples.push(serde_json::from_str(line)?);
    }
    Ok(examples)
}

/// An example with its token encoding and label table.
#[derive(Debug, Clone)]
pub struct LabeledExample {
    pub encoding: Encoding,
    pub table: EncodedTable,
}

/// Tokenizes examples and builds their label tables.
pub struct ExampleEncoder<'a, T: SpanTokenizer + ?Sized> {
    tokenizer: &'a T,
    schema: &'a PredicateSchema,
    encoder: TableEncoder,
    max_len: usize,
}

impl<'a, T: SpanTokenizer + ?Sized> ExampleEncoder<'a, T> {
    pub fn new(tokenizer: &'a T, schema: &'a PredicateSchema, max_len: usize) -> Self {
        Self {
            tokenizer,
            schema,
            encoder: TableEncoder::new(schema.len()),
            max_len,
        }
    }

    /// Tokenize only, for inference.
    pub fn tokenize(&self, example: &Example) -> Result<Encoding> {
        self.tokenizer.encode(&example.text, self.max_len)
    }

    /// Map the example's character-level triples onto token triples.
    ///
    /// Triples are grouped by subject in first-seen order, which fixes the
    /// write order for the encoder.
    pub fn token_triples(
        &self,
        example: &Example,
        encoding: &Encoding,
    ) -> Result<Vec<TokenTriple>> {
        let mut resolved: HashMap<(usize, usize), TokenSpan> = HashMap::new();
        let mut resolve = |start: usize, end: usize| -> Result<TokenSpan> {
            if let Some(span) = resolved.get(&(start, end)) {
                return Ok(*span);
            }
            let span = encoding.resolve_span(start, end)?;
            resolved.insert((start, end), span);
            Ok(span)
        };

        let mut groups: Vec<(TokenSpan, Vec<TokenTriple>)> = Vec::new();
        for spo in &example.spos {
            let subject = resolve(spo.subject().start(), spo.subject().end())?;
            let object = resolve(spo.object().start(), spo.object().end())?;
            let predicate = self
                .schema
                .id(spo.predicate())
                .ok_or_else(|| GrteError::UnknownPredicate(spo.predicate().to_string()))?;

            let triple = TokenTriple::new(subject, predicate, object);
            match groups.iter_mut().find(|(s, _)| *s == subject) {
                Some((_, triples)) => triples.push(triple),
                None => groups.push((subject, vec![triple])),
            }
        }

        Ok(groups.into_iter().flat_map(|(_, triples)| triples).collect())
    }

    /// Tokenize and label an example.
    ///
    /// `Ok(None)` means the example has no triples and carries no supervision.
    pub fn encode(&self, example: &Example) -> Result<Option<LabeledExample>> {
        let encoding = self.tokenize(example)?;
        let triples = self.token_triples(example, &encoding)?;

        let Some(table) = self.encoder.encode(encoding.len(), &triples)? else {
            debug!(text = %example.text, "example has no triples");
            return Ok(None);
        };

        Ok(Some(LabeledExample { encoding, table }))
    }
}

/// Keep only well-formed examples, logging the rest.
pub fn filter_well_formed(examples: Vec<Example>) -> Vec<Example> {
    let total = examples.len();
    let kept: Vec<Example> = examples
        .into_iter()
        .filter(|ex| {
            let ok = ex.is_well_formed();
            if !ok {
                warn!(text = %ex.text, "skipping malformed example");
            }
            ok
        })
        .collect();
    debug!(total, kept = kept.len(), "filtered examples");
    kept
}
