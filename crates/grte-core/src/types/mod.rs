pub mod span;
pub mod triple;

pub use span::{Mention, TokenSpan};
pub use triple::{DecodedTriple, RelationTriple, TokenTriple};
