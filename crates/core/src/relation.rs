//! Relation kinds
//!
//! The storage access method that governs a relation's page layout. Only
//! used to look up known, documented exceptions to the change-tracking
//! invariant; page comparison itself is layout-agnostic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storage access method of a tracked relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Plain table storage
    Heap,
    /// B-tree index
    Btree,
    /// Sequence
    Seq,
    /// Space-partitioned GiST index
    Spgist,
    /// Block range index
    Brin,
    /// Generalized search tree index
    Gist,
    /// Generalized inverted index
    Gin,
    /// Hash index
    Hash,
    /// Bloom filter index
    Bloom,
}

impl RelationKind {
    /// All known relation kinds
    pub const ALL: [RelationKind; 9] = [
        RelationKind::Heap,
        RelationKind::Btree,
        RelationKind::Seq,
        RelationKind::Spgist,
        RelationKind::Brin,
        RelationKind::Gist,
        RelationKind::Gin,
        RelationKind::Hash,
        RelationKind::Bloom,
    ];

    /// Access-method name as stored in the catalog
    pub fn am_name(&self) -> &'static str {
        match self {
            RelationKind::Heap => "heap",
            RelationKind::Btree => "btree",
            RelationKind::Seq => "seq",
            RelationKind::Spgist => "spgist",
            RelationKind::Brin => "brin",
            RelationKind::Gist => "gist",
            RelationKind::Gin => "gin",
            RelationKind::Hash => "hash",
            RelationKind::Bloom => "bloom",
        }
    }

    /// Check if this kind is an index access method
    pub fn is_index(&self) -> bool {
        !matches!(self, RelationKind::Heap | RelationKind::Seq)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.am_name())
    }
}

/// Error parsing a relation kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown relation kind: {0}")]
pub struct UnknownRelationKind(String);

impl FromStr for RelationKind {
    type Err = UnknownRelationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.am_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRelationKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_am_name_round_trip() {
        for kind in RelationKind::ALL {
            assert_eq!(kind.am_name().parse::<RelationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("SPGIST".parse::<RelationKind>().unwrap(), RelationKind::Spgist);
        assert_eq!(" btree ".parse::<RelationKind>().unwrap(), RelationKind::Btree);
        assert!("rtree".parse::<RelationKind>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&RelationKind::Spgist).unwrap();
        assert_eq!(json, "\"spgist\"");
    }

    #[test]
    fn test_is_index() {
        assert!(!RelationKind::Heap.is_index());
        assert!(!RelationKind::Seq.is_index());
        assert!(RelationKind::Gin.is_index());
    }
}
