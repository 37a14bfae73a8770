//! # Label Encoder
//!
//! Writes token-level relation triples into a [`TagTable`].
//!
//! A single-token subject/object pair takes one `SS` cell. Any multi-token
//! side takes a head cell at the span starts and a tail cell at the span
//! ends, both on the same predicate slice:
//!
//! | subject | object | head cell          | tail cell          |
//! |---------|--------|--------------------|--------------------|
//! | single  | single | `SS  (s1, o1, p)`  |                    |
//! | single  | multi  | `SMH (s1, o1, p)`  | `SMT (s1, o2, p)`  |
//! | multi   | single | `MSH (s1, o1, p)`  | `MST (s2, o1, p)`  |
//! | multi   | multi  | `MMH (s1, o1, p)`  | `MMT (s2, o2, p)`  |
//!
//! Triples are written in order and a later triple overwrites any cell an
//! earlier one already tagged. Overlapping annotations can therefore lose a
//! head or a tail without any diagnostic.

use tracing::debug;

use crate::error::{GrteError, Result};
use crate::table::{TagTable, ValidityMask};
use crate::tags::TableTag;
use crate::types::{TokenSpan, TokenTriple};

/// A label table together with its validity mask.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    pub labels: TagTable,
    pub mask: ValidityMask,
}

/// Encodes token triples into `(len, len, num_predicates)` tables.
#[derive(Debug, Clone)]
pub struct TableEncoder {
    num_predicates: usize,
}

impl TableEncoder {
    /// Create an encoder for a schema with `num_predicates` relation types.
    pub fn new(num_predicates: usize) -> Self {
        Self { num_predicates }
    }

    pub fn num_predicates(&self) -> usize {
        self.num_predicates
    }

    /// Encode `triples` for a sequence of `seq_len` tokens.
    ///
    /// Returns `Ok(None)` when there is nothing to encode; such an example
    /// carries no supervision and must be left out of the batch.
    pub fn encode(&self, seq_len: usize, triples: &[TokenTriple]) -> Result<Option<EncodedTable>> {
        if triples.is_empty() {
            return Ok(None);
        }

        let mut labels = TagTable::new(seq_len, self.num_predicates);
        for triple in triples {
            self.write_triple(&mut labels, triple)?;
        }

        debug!(
            seq_len,
            triples = triples.len(),
            cells = labels.count_tagged(),
            "encoded relation table"
        );

        Ok(Some(EncodedTable {
            labels,
            mask: ValidityMask::new(seq_len, self.num_predicates),
        }))
    }

    fn write_triple(&self, labels: &mut TagTable, triple: &TokenTriple) -> Result<()> {
        let len = labels.len();
        check_span(triple.subject, len)?;
        check_span(triple.object, len)?;
        if triple.predicate >= self.num_predicates {
            return Err(GrteError::UnknownPredicateId {
                id: triple.predicate,
                count: self.num_predicates,
            });
        }

        let (s1, s2) = (triple.subject.start, triple.subject.end);
        let (o1, o2) = (triple.object.start, triple.object.end);
        let p = triple.predicate;

        match (s1 == s2, o1 == o2) {
            (true, true) => labels.set(s1, o1, p, TableTag::SingleSingle)?,
            (true, false) => {
                labels.set(s1, o1, p, TableTag::SingleMultiHead)?;
                labels.set(s1, o2, p, TableTag::SingleMultiTail)?;
            }
            (false, true) => {
                labels.set(s1, o1, p, TableTag::MultiSingleHead)?;
                labels.set(s2, o1, p, TableTag::MultiSingleTail)?;
            }
            (false, false) => {
                labels.set(s1, o1, p, TableTag::MultiMultiHead)?;
                labels.set(s2, o2, p, TableTag::MultiMultiTail)?;
            }
        }
        Ok(())
    }
}

fn check_span(span: TokenSpan, len: usize) -> Result<()> {
    if span.start > span.end || span.end >= len {
        return Err(GrteError::SpanOutOfBounds {
            start: span.start,
            end: span.end,
            len,
        });
    }
    Ok(())
}
