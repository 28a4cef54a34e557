//! Evidence sources for the query pipeline.
//!
//! Two adapters live here: a document corpus ranked by trigram similarity and
//! a schema-aware tabular source backed by SQLite. The pipeline only sees the
//! [`DocumentSource`] and [`TabularSource`] traits.

pub mod document;
pub mod similarity;
pub mod tabular;


pub use document::{CorpusSource, DocumentSource, Passage};
pub use similarity::TrigramProfile;
pub use tabular::sqlite::SqliteSource;
pub use tabular::types::{
    FieldDescriptor, Filter, Operator, OrderBy, Predicate, Projection, QuerySpec, Row,
    SchemaDescriptor, SelectRequest, SortDirection, TabularResult,
};
pub use tabular::TabularSource;
