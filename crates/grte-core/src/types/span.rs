use serde::{Deserialize, Serialize};

/// Closed `[start, end]` range of token indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenSpan {
    /// First token of the mention.
    pub start: usize,
    /// Last token of the mention (inclusive).
    pub end: usize,
}

impl TokenSpan {
    /// Creates a span covering `start..=end`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Creates a span covering a single token.
    #[must_use]
    pub fn single(index: usize) -> Self {
        Self::new(index, index)
    }

    /// Returns `true` if the span covers exactly one token.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Number of tokens covered (0 for a reversed span).
    #[must_use]
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Returns `true` for a reversed span.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for TokenSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// An entity mention in character offsets: `(start, end_exclusive, text)`.
///
/// Serialized as a three-element JSON array, matching the dataset format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mention(pub usize, pub usize, pub String);

impl Mention {
    /// Character start offset.
    pub fn start(&self) -> usize {
        self.0
    }

    /// Character end offset (exclusive).
    pub fn end(&self) -> usize {
        self.1
    }

    /// Surface text of the mention.
    pub fn text(&self) -> &str {
        &self.2
    }
}
