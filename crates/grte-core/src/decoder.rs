//! # Triple Decoder
//!
//! Recovers `(subject, predicate, object)` token triples from predicted
//! relation tables.
//!
//! Every non-`None` cell away from the sentinel rows/columns is a candidate.
//! `SS` cells emit a triple directly. Head cells (`SMH`, `MMH`, `MSH`) pair
//! with the first candidate, in row-major order, that carries the matching
//! tail tag on the same predicate and sits in a structurally valid position.
//! Tail cells never emit on their own.
//!
//! Pairing is greedy: the first structural match wins even when a later tail
//! would give a better span. When several heads and tails share a predicate
//! slice this can pair the wrong boundaries.

use candle_core::{D, DType, Tensor};
use tracing::{debug, warn};

use crate::error::Result;
use crate::table::TagTable;
use crate::tags::TableTag;
use crate::types::{DecodedTriple, TokenSpan};

#[derive(Debug, Clone, Copy)]
struct Candidate {
    l1: usize,
    l2: usize,
    predicate: usize,
    tag: TableTag,
}

/// Decoder for predicted relation tables.
#[derive(Debug, Clone, Default)]
pub struct TripleDecoder;

impl TripleDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one `(L, L, P)` table.
    ///
    /// `token_count` is the real length of the tokenized example including
    /// the `[CLS]`/`[SEP]` sentinels; cells on position 0 or on
    /// `token_count - 1` and beyond are ignored.
    pub fn decode_table(&self, table: &TagTable, token_count: usize) -> Vec<DecodedTriple> {
        let last = token_count.saturating_sub(1);
        let candidates: Vec<Candidate> = table
            .cells()
            .filter(|&(l1, l2, _, _)| l1 != 0 && l2 != 0 && l1 < last && l2 < last)
            .map(|(l1, l2, predicate, tag)| Candidate {
                l1,
                l2,
                predicate,
                tag,
            })
            .collect();

        let mut triples = Vec::new();
        for head in &candidates {
            let triple = match head.tag {
                TableTag::SingleSingle => Some(DecodedTriple {
                    subject: TokenSpan::single(head.l1),
                    predicate: head.predicate,
                    object: TokenSpan::single(head.l2),
                }),
                tag if tag.is_head() => find_tail(&candidates, head).map(|tail| DecodedTriple {
                    subject: TokenSpan::new(head.l1, tail.l1),
                    predicate: head.predicate,
                    object: TokenSpan::new(head.l2, tail.l2),
                }),
                _ => None,
            };

            if let Some(triple) = triple {
                triples.push(triple);
            }
        }

        debug!(
            candidates = candidates.len(),
            triples = triples.len(),
            "decoded relation table"
        );
        triples
    }

    /// Decode a batch of tables. Examples without a token count decode to nothing.
    pub fn decode_batch(
        &self,
        tables: &[TagTable],
        token_counts: &[usize],
    ) -> Vec<Vec<DecodedTriple>> {
        tables
            .iter()
            .enumerate()
            .map(|(i, table)| self.decode_table(table, token_counts.get(i).copied().unwrap_or(0)))
            .collect()
    }

    /// Decode model output.
    ///
    /// Accepts either tag ids of shape `(B, L, L, P)` or per-class scores of
    /// shape `(B, L, L, P, C)`, which are argmaxed over the class axis first.
    /// A tensor of any other shape yields one empty list per token count.
    pub fn decode_tensor(
        &self,
        predictions: &Tensor,
        token_counts: &[usize],
    ) -> Result<Vec<Vec<DecodedTriple>>> {
        let ids = match predictions.rank() {
            5 => predictions.argmax(D::Minus1)?,
            4 => predictions.to_dtype(DType::U32)?,
            rank => {
                warn!(
                    rank,
                    "prediction tensor must be 4-D or 5-D, decoding nothing"
                );
                return Ok(vec![Vec::new(); token_counts.len()]);
            }
        };

        let (batch, len, len2, num_predicates) = ids.dims4()?;
        if len != len2 {
            warn!(
                len,
                len2,
                "prediction tables are not square, decoding nothing"
            );
            return Ok(vec![Vec::new(); batch]);
        }

        let flat: Vec<u32> = ids.flatten_all()?.to_vec1()?;
        let stride = len * len * num_predicates;
        let mut out = Vec::with_capacity(batch);
        for (b, chunk) in flat.chunks(stride.max(1)).take(batch).enumerate() {
            let table = TagTable::from_ids(len, num_predicates, chunk)?;
            out.push(self.decode_table(&table, token_counts.get(b).copied().unwrap_or(0)));
        }
        out.resize(batch, Vec::new());
        Ok(out)
    }
}

/// First candidate, in row-major order, that closes `head` on its predicate.
fn find_tail<'a>(candidates: &'a [Candidate], head: &Candidate) -> Option<&'a Candidate> {
    let tail_tag = head.tag.tail()?;
    candidates.iter().find(|t| {
        t.predicate == head.predicate
            && t.tag == tail_tag
            && match head.tag {
                TableTag::SingleMultiHead => t.l1 == head.l1 && t.l2 > head.l2,
                TableTag::MultiSingleHead => t.l1 > head.l1 && t.l2 == head.l2,
                _ => t.l1 > head.l1 && t.l2 > head.l2,
            }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn table_with(
        len: usize,
        num_predicates: usize,
        cells: &[(usize, usize, usize, TableTag)],
    ) -> TagTable {
        let mut table = TagTable::new(len, num_predicates);
        for &(l1, l2, p, tag) in cells {
            table.set(l1, l2, p, tag).unwrap();
        }
        table
    }

    fn tuples(triples: &[DecodedTriple]) -> Vec<(usize, usize, usize, usize, usize)> {
        triples.iter().map(DecodedTriple::as_tuple).collect()
    }

    #[test]
    fn test_single_single() {
        let table = table_with(5, 2, &[(1, 3, 1, TableTag::SingleSingle)]);
        let out = TripleDecoder::new().decode_table(&table, 5);
        assert_eq!(tuples(&out), vec![(1, 1, 1, 3, 3)]);
    }

    #[test]
    fn test_single_multi_scenario() {
        // [CLS] T1 T2 T3 [SEP]
        let table = table_with(
            5,
            1,
            &[
                (1, 2, 0, TableTag::SingleMultiHead),
                (1, 3, 0, TableTag::SingleMultiTail),
            ],
        );
        let out = TripleDecoder::new().decode_table(&table, 5);
        assert_eq!(tuples(&out), vec![(1, 1, 0, 2, 3)]);
    }

    #[test]
    fn test_multi_single() {
        let table = table_with(
            7,
            1,
            &[
                (1, 4, 0, TableTag::MultiSingleHead),
                (3, 4, 0, TableTag::MultiSingleTail),
            ],
        );
        let out = TripleDecoder::new().decode_table(&table, 7);
        assert_eq!(tuples(&out), vec![(1, 3, 0, 4, 4)]);
    }

    #[test]
    fn test_multi_multi() {
        let table = table_with(
            8,
            2,
            &[
                (1, 4, 1, TableTag::MultiMultiHead),
                (2, 6, 1, TableTag::MultiMultiTail),
            ],
        );
        let out = TripleDecoder::new().decode_table(&table, 8);
        assert_eq!(tuples(&out), vec![(1, 2, 1, 4, 6)]);
    }

    #[test]
    fn test_tail_needs_same_predicate() {
        let table = table_with(
            6,
            2,
            &[
                (1, 2, 0, TableTag::SingleMultiHead),
                (1, 4, 1, TableTag::SingleMultiTail),
            ],
        );
        assert!(TripleDecoder::new().decode_table(&table, 6).is_empty());
    }

    #[test]
    fn test_tail_must_follow_head() {
        let table = table_with(
            7,
            1,
            &[
                (1, 2, 0, TableTag::SingleMultiTail),
                (1, 4, 0, TableTag::SingleMultiHead),
            ],
        );
        assert!(TripleDecoder::new().decode_table(&table, 7).is_empty());
    }

    #[test]
    fn test_first_tail_wins() {
        let table = table_with(
            8,
            1,
            &[
                (1, 2, 0, TableTag::SingleMultiHead),
                (1, 3, 0, TableTag::SingleMultiTail),
                (1, 5, 0, TableTag::SingleMultiTail),
            ],
        );
        let out = TripleDecoder::new().decode_table(&table, 8);
        assert_eq!(tuples(&out), vec![(1, 1, 0, 2, 3)]);
    }

    #[test]
    fn test_tail_alone_emits_nothing() {
        let table = table_with(
            6,
            1,
            &[
                (2, 3, 0, TableTag::MultiMultiTail),
                (2, 2, 0, TableTag::MultiSingleTail),
            ],
        );
        assert!(TripleDecoder::new().decode_table(&table, 6).is_empty());
    }

    #[test]
    fn test_boundary_cells_are_ignored() {
        let table = table_with(
            6,
            1,
            &[
                (0, 2, 0, TableTag::SingleSingle),
                (2, 0, 0, TableTag::SingleSingle),
                (4, 2, 0, TableTag::SingleSingle),
                (2, 4, 0, TableTag::SingleSingle),
                (5, 5, 0, TableTag::SingleSingle),
            ],
        );
        // Real length 5 ([CLS] a b c [SEP]) padded to 6.
        assert!(TripleDecoder::new().decode_table(&table, 5).is_empty());
    }

    #[test]
    fn test_tail_on_boundary_is_not_paired() {
        let table = table_with(
            5,
            1,
            &[
                (1, 2, 0, TableTag::SingleMultiHead),
                (1, 4, 0, TableTag::SingleMultiTail),
            ],
        );
        assert!(TripleDecoder::new().decode_table(&table, 5).is_empty());
    }

    #[test]
    fn test_all_none_is_empty() {
        let decoder = TripleDecoder::new();
        assert!(decoder.decode_table(&TagTable::new(6, 3), 6).is_empty());
        assert!(decoder.decode_table(&TagTable::new(0, 3), 0).is_empty());
    }

    #[test]
    fn test_decode_batch_missing_count() {
        let table = table_with(5, 1, &[(1, 2, 0, TableTag::SingleSingle)]);
        let out = TripleDecoder::new().decode_batch(&[table.clone(), table], &[5]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 1);
        assert!(out[1].is_empty());
    }

    #[test]
    fn test_decode_tensor_ids() {
        let device = Device::Cpu;
        let a = table_with(5, 1, &[(1, 3, 0, TableTag::SingleSingle)]);
        let b = TagTable::new(5, 1);
        let mut ids = a.to_ids();
        ids.extend(b.to_ids());
        let tensor = Tensor::from_vec(ids, (2, 5, 5, 1), &device).unwrap();

        let decoded = TripleDecoder::new().decode_tensor(&tensor, &[5, 5]);
        let out = decoded.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(tuples(&out[0]), vec![(1, 1, 0, 3, 3)]);
        assert!(out[1].is_empty());
    }

    #[test]
    fn test_decode_tensor_logits() {
        let device = Device::Cpu;
        let (len, classes) = (4usize, TableTag::NUM_TAGS);
        let mut scores = vec![0f32; len * len * classes];
        // Every cell prefers NONE except (1, 2) which prefers SS.
        for cell in 0..len * len {
            scores[cell * classes] = 1.0;
        }
        let cell = len + 2;
        scores[cell * classes + TableTag::SingleSingle.index()] = 5.0;
        let tensor = Tensor::from_vec(scores, (1, len, len, 1, classes), &device).unwrap();

        let out = TripleDecoder::new().decode_tensor(&tensor, &[4]).unwrap();
        assert_eq!(tuples(&out[0]), vec![(1, 1, 0, 2, 2)]);
    }

    #[test]
    fn test_decode_tensor_wrong_rank() {
        let device = Device::Cpu;
        let tensor = Tensor::zeros((3, 3), DType::U32, &device).unwrap();
        let decoded = TripleDecoder::new().decode_tensor(&tensor, &[3, 3]);
        let out = decoded.unwrap();
        assert_eq!(out, vec![Vec::new(), Vec::new()]);
    }
}
