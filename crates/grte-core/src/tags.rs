//! # Table Tags
//!
//! The closed tag set written into relation tables. Each tag says whether the
//! subject and the object are single-token ("S") or multi-token ("M") and, for
//! multi-token pairs, whether the cell marks the head or the tail boundary.

use std::fmt;
use std::str::FromStr;

use crate::error::GrteError;

/// Per-cell tag of a relation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableTag {
    /// No relation starts or ends at this cell.
    #[default]
    None,
    /// Single-token subject, single-token object.
    SingleSingle,
    /// Single-token subject, head of a multi-token object.
    SingleMultiHead,
    /// Single-token subject, tail of a multi-token object.
    SingleMultiTail,
    /// Heads of a multi-token subject and a multi-token object.
    MultiMultiHead,
    /// Tails of a multi-token subject and a multi-token object.
    MultiMultiTail,
    /// Head of a multi-token subject, single-token object.
    MultiSingleHead,
    /// Tail of a multi-token subject, single-token object.
    MultiSingleTail,
}

impl TableTag {
    /// Total number of distinct tags (the class axis of the model output).
    pub const NUM_TAGS: usize = 8;

    /// Get all possible tags in class-id order.
    pub fn all_tags() -> &'static [TableTag] {
        &[
            TableTag::None,
            TableTag::SingleSingle,
            TableTag::SingleMultiHead,
            TableTag::SingleMultiTail,
            TableTag::MultiMultiHead,
            TableTag::MultiMultiTail,
            TableTag::MultiSingleHead,
            TableTag::MultiSingleTail,
        ]
    }

    /// Get the class id for tensor operations.
    pub fn index(&self) -> usize {
        match self {
            TableTag::None => 0,
            TableTag::SingleSingle => 1,
            TableTag::SingleMultiHead => 2,
            TableTag::SingleMultiTail => 3,
            TableTag::MultiMultiHead => 4,
            TableTag::MultiMultiTail => 5,
            TableTag::MultiSingleHead => 6,
            TableTag::MultiSingleTail => 7,
        }
    }

    /// Get tag from class id.
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(TableTag::None),
            1 => Some(TableTag::SingleSingle),
            2 => Some(TableTag::SingleMultiHead),
            3 => Some(TableTag::SingleMultiTail),
            4 => Some(TableTag::MultiMultiHead),
            5 => Some(TableTag::MultiMultiTail),
            6 => Some(TableTag::MultiSingleHead),
            7 => Some(TableTag::MultiSingleTail),
            _ => None,
        }
    }

    /// Check if this tag opens a multi-token pair.
    pub fn is_head(&self) -> bool {
        matches!(
            self,
            TableTag::SingleMultiHead | TableTag::MultiMultiHead | TableTag::MultiSingleHead
        )
    }

    /// Check if this tag closes a multi-token pair.
    pub fn is_tail(&self) -> bool {
        matches!(
            self,
            TableTag::SingleMultiTail | TableTag::MultiMultiTail | TableTag::MultiSingleTail
        )
    }

    /// The tail tag that closes this head tag.
    pub fn tail(&self) -> Option<TableTag> {
        match self {
            TableTag::SingleMultiHead => Some(TableTag::SingleMultiTail),
            TableTag::MultiMultiHead => Some(TableTag::MultiMultiTail),
            TableTag::MultiSingleHead => Some(TableTag::MultiSingleTail),
            _ => None,
        }
    }

    /// Short label used in datasets and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TableTag::None => "N/A",
            TableTag::SingleSingle => "SS",
            TableTag::SingleMultiHead => "SMH",
            TableTag::SingleMultiTail => "SMT",
            TableTag::MultiMultiHead => "MMH",
            TableTag::MultiMultiTail => "MMT",
            TableTag::MultiSingleHead => "MSH",
            TableTag::MultiSingleTail => "MST",
        }
    }
}

impl fmt::Display for TableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableTag {
    type Err = GrteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N/A" | "NONE" => Ok(TableTag::None),
            "SS" => Ok(TableTag::SingleSingle),
            "SMH" => Ok(TableTag::SingleMultiHead),
            "SMT" => Ok(TableTag::SingleMultiTail),
            "MMH" => Ok(TableTag::MultiMultiHead),
            "MMT" => Ok(TableTag::MultiMultiTail),
            "MSH" => Ok(TableTag::MultiSingleHead),
            "MST" => Ok(TableTag::MultiSingleTail),
            other => Err(GrteError::UnknownTag(other.to_string())),
        }
    }
}
