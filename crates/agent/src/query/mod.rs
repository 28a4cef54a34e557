//! Tabular evidence: collection choice, query synthesis, join planning and
//! execution.

pub mod execute;
pub mod join;
pub mod synthesize;

pub use join::{JoinPlan, JoinPlanner, JoinStep};
pub use synthesize::QuerySynthesizer;

use crate::schema::SchemaCatalog;
use concierge_core::config::Relationship;
use concierge_knowledge::{Operator, Predicate, QuerySpec, SchemaDescriptor, TabularResult};
use serde_json::Value;
use std::sync::Arc;

/// Most values pushed into one secondary `IN` filter; keeps the statement
/// well under SQLite's bound-parameter limit.
pub const MAX_JOIN_VALUES: usize = 500;

/// Everything needed to turn a question into tabular evidence.
pub struct TabularPipeline {
    catalog: Arc<SchemaCatalog>,
    synthesizer: QuerySynthesizer,
    planner: JoinPlanner,
    relationships: Vec<Relationship>,
    default_collection: Option<String>,
}

impl TabularPipeline {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        synthesizer: QuerySynthesizer,
        planner: JoinPlanner,
        relationships: Vec<Relationship>,
        default_collection: Option<String>,
    ) -> Self {
        Self {
            catalog,
            synthesizer,
            planner,
            relationships,
            default_collection,
        }
    }

    /// One result per executed (or skipped) collection; never fails.
    pub async fn fetch(&self, question: &str) -> Vec<TabularResult> {
        let collections = self.catalog.collections();

        if join::needs_join(question, collections.len()) {
            tracing::debug!("Question looks cross-collection, planning a join");
            return self.fetch_joined(question).await;
        }

        match join::choose_collection(question, &collections, self.default_collection.as_deref()) {
            Some(collection) => vec![self.fetch_single(question, &collection).await],
            None => vec![TabularResult::failed("", "No collections are configured")],
        }
    }

    async fn fetch_single(&self, question: &str, collection: &str) -> TabularResult {
        let schema = match self.catalog.describe(collection).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!("Could not describe '{}': {}", collection, e);
                return TabularResult::failed(collection, e.to_string());
            }
        };

        let spec = self.synthesizer.synthesize(question, &schema).await;
        execute::execute(self.catalog.source(), &spec, &schema).await
    }

    async fn fetch_joined(&self, question: &str) -> Vec<TabularResult> {
        let schemas = self.catalog.describe_all().await;
        let collections = self.catalog.collections();

        let plan = match self
            .planner
            .plan(question, &schemas, &self.relationships)
            .await
        {
            Some(plan) => plan,
            None => {
                let fallback = join::choose_collection(
                    question,
                    &collections,
                    self.default_collection.as_deref(),
                );
                return match fallback {
                    Some(collection) => vec![self.fetch_single(question, &collection).await],
                    None => vec![TabularResult::failed("", "No collections are configured")],
                };
            }
        };

        let schema_of = |name: &str| schemas.iter().find(|s| s.collection == name);
        let Some(primary_schema) = schema_of(&plan.primary) else {
            return vec![self.fetch_single(question, &plan.primary).await];
        };
        if plan.joins.is_empty() {
            return vec![self.run_primary(question, primary_schema, &plan).await];
        }

        let primary = self.run_primary(question, primary_schema, &plan).await;
        let mut results = Vec::with_capacity(plan.joins.len() + 1);

        for step in &plan.joins {
            let values = primary.distinct_values(&step.local_field);
            if primary.is_error() || values.is_empty() {
                tracing::debug!(
                    "No '{}' values from '{}', skipping '{}'",
                    step.local_field,
                    plan.primary,
                    step.collection
                );
                results.push(TabularResult::ok(&step.collection, Vec::new()));
                continue;
            }

            // Validated by the planner
            let Some(schema) = schema_of(&step.collection) else {
                continue;
            };

            let spec = secondary_spec(&step.collection, &step.foreign_field, values);
            results.push(execute::execute(self.catalog.source(), &spec, schema).await);
        }

        results.insert(0, primary);
        results
    }

    async fn run_primary(&self, question: &str, schema: &SchemaDescriptor, plan: &JoinPlan) -> TabularResult {
        let mut spec = self.synthesizer.synthesize(question, schema).await;
        for step in &plan.joins {
            spec.projection.include(&step.local_field);
        }
        execute::execute(self.catalog.source(), &spec, schema).await
    }
}

/// `foreign_field IN values` over every field of `collection`, keeping the
/// first [`MAX_JOIN_VALUES`] values.
fn secondary_spec(collection: &str, foreign_field: &str, mut values: Vec<Value>) -> QuerySpec {
    if values.len() > MAX_JOIN_VALUES {
        tracing::warn!(
            "Join into '{}' matched {} values, keeping the first {}",
            collection,
            values.len(),
            MAX_JOIN_VALUES
        );
        values.truncate(MAX_JOIN_VALUES);
    }

    let mut spec = QuerySpec::permissive(collection);
    spec.predicates
        .push(Predicate::new(foreign_field, Operator::In, Value::Array(values)));
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secondary_spec_filters_on_foreign_field() {
        let spec = secondary_spec("products", "product_id", vec![json!(42), json!(7)]);
        assert_eq!(spec.collection, "products");
        assert_eq!(
            spec.predicates,
            vec![Predicate::new("product_id", Operator::In, json!([42, 7]))]
        );
    }

    #[test]
    fn test_secondary_spec_caps_values() {
        let values = (0..MAX_JOIN_VALUES as u64 + 250).map(|v| json!(v)).collect();
        let spec = secondary_spec("products", "product_id", values);

        match &spec.predicates[0].value {
            Value::Array(kept) => {
                assert_eq!(kept.len(), MAX_JOIN_VALUES);
                assert_eq!(kept[0], json!(0));
                assert_eq!(kept[MAX_JOIN_VALUES - 1], json!(MAX_JOIN_VALUES as u64 - 1));
            }
            other => panic!("expected a list, got {:?}", other),
        }
    }
}
