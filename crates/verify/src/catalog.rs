//! Catalog connection seam
//!
//! The engine never talks to a database server itself. Everything it needs
//! from the live catalogs goes through [`CatalogConnection`], which returns
//! rows of text values. Test harnesses implement it over whatever client
//! they drive the server with; [`MemoryCatalog`] answers from canned rows.

use std::collections::HashMap;

use pageaudit_core::PAGE_SIZE;
use thiserror::Error;

/// One result row, every column rendered as text
pub type Row = Vec<String>;

/// Catalog query failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The query itself failed
    #[error("query failed: {message} ({sql})")]
    Query {
        /// Statement that failed
        sql: String,
        /// Message reported by the collaborator
        message: String,
    },

    /// A row did not have the expected shape
    #[error("unexpected row {row:?} for {sql}: {reason}")]
    MalformedRow {
        /// Statement that produced the row
        sql: String,
        /// Offending row
        row: Row,
        /// What was wrong with it
        reason: String,
    },
}

/// Query interface onto the live system catalogs
///
/// Only [`query`](CatalogConnection::query) is required. The relation
/// lookups are provided on top of it.
pub trait CatalogConnection {
    /// Run a statement and return all rows
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, CatalogError>;

    /// Size of a relation's main fork in pages
    fn relation_size_pages(&mut self, relation: &str) -> Result<u64, CatalogError> {
        let sql = format!(
            "select pg_relation_size('{}')/{}",
            quote_literal(relation),
            PAGE_SIZE
        );
        let rows = self.query(&sql)?;
        let value = single_value(&sql, &rows)?;
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| CatalogError::MalformedRow {
                sql: sql.clone(),
                row: rows[0].clone(),
                reason: e.to_string(),
            })
    }

    /// On-disk path of a relation, relative to the data directory
    fn relation_filepath(&mut self, relation: &str) -> Result<String, CatalogError> {
        let sql = format!(
            "select pg_relation_filepath('{}')",
            quote_literal(relation)
        );
        let rows = self.query(&sql)?;
        Ok(single_value(&sql, &rows)?.to_string())
    }
}

impl<C: CatalogConnection + ?Sized> CatalogConnection for &mut C {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, CatalogError> {
        (**self).query(sql)
    }
}

fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn single_value<'a>(sql: &str, rows: &'a [Row]) -> Result<&'a str, CatalogError> {
    match rows {
        [row] if row.len() == 1 => Ok(&row[0]),
        [row, ..] => Err(CatalogError::MalformedRow {
            sql: sql.to_string(),
            row: row.clone(),
            reason: format!("expected exactly one row with one column, got {} rows", rows.len()),
        }),
        [] => Err(CatalogError::MalformedRow {
            sql: sql.to_string(),
            row: Vec::new(),
            reason: "no rows".to_string(),
        }),
    }
}

/// Catalog answering from canned responses keyed by statement text
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    responses: HashMap<String, Vec<Row>>,
    log: Vec<String>,
}

impl MemoryCatalog {
    /// Create an empty catalog; every query fails until responses are added
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rows returned for a statement
    pub fn with_response<I, R, S>(mut self, sql: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();
        self.responses.insert(sql.into(), rows);
        self
    }

    /// Register a relation's size and path for the provided lookups
    pub fn with_relation(self, relation: &str, size_pages: u64, filepath: &str) -> Self {
        let name = quote_literal(relation);
        self.with_response(
            format!("select pg_relation_size('{}')/{}", name, PAGE_SIZE),
            [[size_pages.to_string()]],
        )
        .with_response(
            format!("select pg_relation_filepath('{}')", name),
            [[filepath.to_string()]],
        )
    }

    /// Statements received so far, in order
    pub fn queries(&self) -> &[String] {
        &self.log
    }
}

impl CatalogConnection for MemoryCatalog {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, CatalogError> {
        self.log.push(sql.to_string());
        self.responses
            .get(sql)
            .cloned()
            .ok_or_else(|| CatalogError::Query {
                sql: sql.to_string(),
                message: "no canned response".to_string(),
            })
    }
}
