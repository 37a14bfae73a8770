use serde::{Deserialize, Serialize};

use super::span::{Mention, TokenSpan};

/// A relation between two token spans, ready to be written into a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenTriple {
    pub subject: TokenSpan,
    pub predicate: usize,
    pub object: TokenSpan,
}

impl TokenTriple {
    #[must_use]
    pub fn new(subject: TokenSpan, predicate: usize, object: TokenSpan) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// A triple recovered from a predicted table, in token indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedTriple {
    pub subject: TokenSpan,
    pub predicate: usize,
    pub object: TokenSpan,
}

impl DecodedTriple {
    /// Flat `(subject_start, subject_end, predicate, object_start, object_end)` form.
    #[must_use]
    pub fn as_tuple(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.subject.start,
            self.subject.end,
            self.predicate,
            self.object.start,
            self.object.end,
        )
    }
}

impl From<(usize, usize, usize, usize, usize)> for DecodedTriple {
    fn from((ss, se, p, os, oe): (usize, usize, usize, usize, usize)) -> Self {
        Self {
            subject: TokenSpan::new(ss, se),
            predicate: p,
            object: TokenSpan::new(os, oe),
        }
    }
}

impl From<TokenTriple> for DecodedTriple {
    fn from(t: TokenTriple) -> Self {
        Self {
            subject: t.subject,
            predicate: t.predicate,
            object: t.object,
        }
    }
}

/// A text-level `(subject, predicate, object)` triple.
///
/// This is both the gold annotation format of the dataset and the output of
/// extraction; it serializes as `[[s, e, "subj"], "pred", [s, e, "obj"]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationTriple(pub Mention, pub String, pub Mention);

impl RelationTriple {
    pub fn subject(&self) -> &Mention {
        &self.0
    }

    pub fn predicate(&self) -> &str {
        &self.1
    }

    pub fn object(&self) -> &Mention {
        &self.2
    }
}
