//! Exclusion policy
//!
//! An [`ExclusionSet`] lists (file, page) pairs known to diverge for benign
//! reasons. It is the only suppression mechanism the differ honours. The
//! pairs come from [`KNOWN_DIVERGENCES`], a reviewable table keyed by
//! access method, resolved against the live catalogs by [`build`].

use std::collections::{BTreeMap, BTreeSet};

use pageaudit_core::RelationKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::CatalogConnection;
use crate::error::VerifyResult;

/// A page range of one access method that may legitimately differ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDivergence {
    /// Access method the divergence applies to
    pub access_method: RelationKind,
    /// Pages of every such relation to exclude
    pub pages: &'static [u64],
    /// Why the pages may differ
    pub reason: &'static str,
}

/// Every sanctioned divergence
///
/// Shared by the differ (pages excluded from comparison) and the sanity
/// checker (changed pages tolerated without a flag).
pub const KNOWN_DIVERGENCES: &[KnownDivergence] = &[KnownDivergence {
    access_method: RelationKind::Spgist,
    pages: &[0],
    reason: "SP-GiST metapage is updated without being marked dirty",
}];

/// Relative file path -> page indices ignored during comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    pages: BTreeMap<String, BTreeSet<u64>>,
}

impl ExclusionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude one page of a file
    pub fn insert(&mut self, file: impl Into<String>, page: u64) {
        self.pages.entry(file.into()).or_default().insert(page);
    }

    /// True if any page of `file` is excluded
    pub fn contains_file(&self, file: &str) -> bool {
        self.pages.contains_key(file)
    }

    /// True if `page` of `file` is excluded
    pub fn is_excluded(&self, file: &str, page: u64) -> bool {
        self.pages.get(file).is_some_and(|p| p.contains(&page))
    }

    /// Excluded pages of a file
    pub fn pages(&self, file: &str) -> Option<&BTreeSet<u64>> {
        self.pages.get(file)
    }

    /// Number of files with exclusions
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True if nothing is excluded
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterate files and their excluded pages
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<u64>)> {
        self.pages.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut set = ExclusionSet::new();
        for (file, page) in iter {
            set.insert(file, page);
        }
        set
    }
}

fn relations_using(access_method: RelationKind) -> String {
    format!(
        "SELECT pg_catalog.pg_relation_filepath(pg_class.oid) \
         FROM pg_am, pg_class \
         WHERE pg_am.amname = '{}' AND pg_class.relam = pg_am.oid",
        access_method.am_name()
    )
}

/// Build the exclusion set from the live catalogs
///
/// Resolves every [`KNOWN_DIVERGENCES`] entry to the relations that use its
/// access method. Empty when no such relation exists.
pub fn build<C: CatalogConnection + ?Sized>(conn: &mut C) -> VerifyResult<ExclusionSet> {
    let mut set = ExclusionSet::new();

    for divergence in KNOWN_DIVERGENCES {
        let rows = conn.query(&relations_using(divergence.access_method))?;
        for row in rows {
            let Some(path) = row.into_iter().next().filter(|p| !p.is_empty()) else {
                continue;
            };
            debug!(
                target: "pageaudit::exclusion",
                path = %path,
                access_method = %divergence.access_method,
                pages = ?divergence.pages,
                "Excluding pages"
            );
            for &page in divergence.pages {
                set.insert(path.clone(), page);
            }
        }
    }

    info!(target: "pageaudit::exclusion", files = set.len(), "Exclusion set built");
    Ok(set)
}
