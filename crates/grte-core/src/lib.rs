//! # GRTE Core
//!
//! Table-filling labels for joint entity and relation extraction. Every
//! `(subject boundary, object boundary, predicate)` cell of a relation table
//! carries one [`TableTag`]; the [`TableEncoder`] writes gold triples into a
//! table and the [`TripleDecoder`] reads predicted tables back into triples.
//!
//! ## Quick Start
//!
//! ```rust
//! use grte_core::{TableEncoder, TripleDecoder, TokenSpan, TokenTriple};
//!
//! // [CLS] T1 T2 T3 [SEP], subject T1, object T2..T3, predicate 0
//! let triple = TokenTriple::new(TokenSpan::single(1), 0, TokenSpan::new(2, 3));
//! let encoded = TableEncoder::new(1).encode(5, &[triple]).unwrap().unwrap();
//!
//! let decoded = TripleDecoder::new().decode_table(&encoded.labels, 5);
//! assert_eq!(decoded[0].as_tuple(), (1, 1, 0, 2, 3));
//! ```
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod example;
pub mod extract;
pub mod schema;
pub mod table;
pub mod tags;
pub mod tokenizer;
pub mod types;
pub mod vocab;

// Re-export primary API
pub use decoder::TripleDecoder;
pub use encoder::{EncodedTable, TableEncoder};
pub use error::{GrteError, Result};
pub use example::{Example, ExampleEncoder, LabeledExample, filter_well_formed, load_examples};
pub use extract::TripleExtractor;
pub use schema::PredicateSchema;
pub use table::{TagTable, ValidityMask};
pub use tags::TableTag;
pub use tokenizer::{Encoding, HfTokenizer, SpanTokenizer, Token, WordTokenizer};
pub use types::{DecodedTriple, Mention, RelationTriple, TokenSpan, TokenTriple};
pub use vocab::Vocab;
