//! Maps decoded token triples back onto the source text.

use tracing::warn;

use crate::decoder::TripleDecoder;
use crate::schema::PredicateSchema;
use crate::table::TagTable;
use crate::tokenizer::Encoding;
use crate::types::{DecodedTriple, Mention, RelationTriple, TokenSpan};

/// Turns decoder output into text-level triples.
pub struct TripleExtractor<'a> {
    schema: &'a PredicateSchema,
    decoder: TripleDecoder,
}

impl<'a> TripleExtractor<'a> {
    pub fn new(schema: &'a PredicateSchema) -> Self {
        Self {
            schema,
            decoder: TripleDecoder::new(),
        }
    }

    /// Resolve decoded triples against `text` and its `encoding`.
    ///
    /// Triples with an unknown predicate id, or whose spans cover no source
    /// characters, are dropped.
    pub fn extract(
        &self,
        text: &str,
        encoding: &Encoding,
        decoded: &[DecodedTriple],
    ) -> Vec<RelationTriple> {
        let chars: Vec<char> = text.chars().collect();
        let mention = |span: TokenSpan| {
            encoding.char_range(span).and_then(|(start, end)| {
                let slice = chars.get(start..end)?;
                Some(Mention(start, end, slice.iter().collect()))
            })
        };

        decoded
            .iter()
            .filter_map(|triple| {
                let Some(predicate) = self.schema.name(triple.predicate) else {
                    warn!(
                        predicate = triple.predicate,
                        "dropping triple with unknown predicate id"
                    );
                    return None;
                };
                match (mention(triple.subject), mention(triple.object)) {
                    (Some(subject), Some(object)) => {
                        Some(RelationTriple(subject, predicate.to_string(), object))
                    }
                    _ => {
                        warn!(
                            subject = %triple.subject,
                            object = %triple.object,
                            "dropping triple with spans outside the text"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Decode a predicted table for one example and extract its triples.
    pub fn extract_table(
        &self,
        text: &str,
        encoding: &Encoding,
        table: &TagTable,
    ) -> Vec<RelationTriple> {
        let decoded = self.decoder.decode_table(table, encoding.len());
        self.extract(text, encoding, &decoded)
    }
}
