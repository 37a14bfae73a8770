use thiserror::Error;

/// Errors that can occur while building or reading relation tables.
#[derive(Debug, Error)]
pub enum GrteError {
    /// A character span could not be mapped onto the token sequence.
    #[error("cannot resolve span [{start}, {end}) to tokens: {reason}")]
    SpanResolution {
        /// Character start offset of the span.
        start: usize,
        /// Character end offset of the span (exclusive).
        end: usize,
        /// Why the mapping failed.
        reason: String,
    },

    /// A token span does not fit inside the label table.
    #[error("token span [{start}, {end}] is invalid for a sequence of {len} tokens")]
    SpanOutOfBounds {
        /// First token of the span.
        start: usize,
        /// Last token of the span (inclusive).
        end: usize,
        /// Length of the tokenized sequence.
        len: usize,
    },

    /// A predicate name is missing from the schema.
    #[error("unknown predicate: {0:?}")]
    UnknownPredicate(String),

    /// A predicate id is outside the predicate axis of the table.
    #[error("predicate id {id} out of range (schema has {count} predicates)")]
    UnknownPredicateId {
        /// Offending predicate id.
        id: usize,
        /// Number of predicates in the schema.
        count: usize,
    },

    /// A tag label did not match any known table tag.
    #[error("unknown table tag: {0:?}")]
    UnknownTag(String),

    /// Tensor or vector shapes disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The predicate schema file is malformed.
    #[error("invalid predicate schema: {0}")]
    InvalidSchema(String),

    /// A run configuration cannot be used or recorded.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Hugging Face tokenizer failure.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Candle tensor framework error.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for GRTE operations.
pub type Result<T> = std::result::Result<T, GrteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = GrteError::SpanResolution {
            start: 3,
            end: 7,
            reason: "no overlapping token".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot resolve span [3, 7) to tokens: no overlapping token"
        );

        let err = GrteError::UnknownPredicate("born_in".into());
        assert!(err.to_string().contains("born_in"));

        let err = GrteError::SpanOutOfBounds {
            start: 4,
            end: 9,
            len: 5,
        };
        assert!(err.to_string().contains("5 tokens"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GrteError>();
    }
}
