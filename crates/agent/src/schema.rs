//! Per-collection schema cache.

use concierge_core::AppResult;
use concierge_knowledge::{SchemaDescriptor, TabularSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Schema descriptors fetched once per collection and kept for the process.
pub struct SchemaCatalog {
    source: Arc<dyn TabularSource>,
    sample_rows: usize,
    cache: Mutex<HashMap<String, SchemaDescriptor>>,
}

impl SchemaCatalog {
    pub fn new(source: Arc<dyn TabularSource>, sample_rows: usize) -> Self {
        Self {
            source,
            sample_rows,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &dyn TabularSource {
        self.source.as_ref()
    }

    pub fn collections(&self) -> Vec<String> {
        self.source.collections()
    }

    fn cached(&self, collection: &str) -> Option<SchemaDescriptor> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(collection).cloned())
    }

    /// Descriptor for `collection`, from cache when available.
    ///
    /// Failures are not cached; the next turn asks the source again.
    pub async fn describe(&self, collection: &str) -> AppResult<SchemaDescriptor> {
        if let Some(schema) = self.cached(collection) {
            return Ok(schema);
        }

        let schema = self.source.describe(collection, self.sample_rows).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(collection.to_string(), schema.clone());
        }
        tracing::debug!("Cached schema for '{}'", collection);
        Ok(schema)
    }

    /// Descriptors for every collection that can be described.
    pub async fn describe_all(&self) -> Vec<SchemaDescriptor> {
        let mut schemas = Vec::new();
        for collection in self.collections() {
            match self.describe(&collection).await {
                Ok(schema) => schemas.push(schema),
                Err(e) => tracing::warn!("Skipping collection '{}': {}", collection, e),
            }
        }
        schemas
    }
}
