//! Tabular evidence: schema description and structured selection.

pub mod sqlite;
pub mod types;

use async_trait::async_trait;
use concierge_core::AppResult;
use types::{Operator, Row, SchemaDescriptor, SelectRequest};

/// A schema-aware structured data source.
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Collections this source can describe and query.
    fn collections(&self) -> Vec<String>;

    /// Operators `select` accepts. Others are skipped by the caller.
    fn supported_operators(&self) -> &[Operator] {
        &Operator::ALL
    }

    /// Fields, types, descriptions and `sample_rows` example rows of `collection`.
    async fn describe(&self, collection: &str, sample_rows: usize) -> AppResult<SchemaDescriptor>;

    async fn select(&self, request: &SelectRequest) -> AppResult<Vec<Row>>;
}
