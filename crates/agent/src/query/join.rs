//! Cross-collection join planning.
//!
//! A join is a chain of single-collection queries: the primary collection is
//! filtered first, then each secondary collection is filtered by the distinct
//! values of the join field found in the primary rows.

use crate::backend::{vars, PromptedBackend};
use crate::parse::{parse_object, string_field};
use concierge_core::config::Relationship;
use concierge_knowledge::SchemaDescriptor;
use concierge_prompt::defaults::QUERY_JOIN_PLAN;
use serde::Serialize;
use serde_json::Value;

/// Phrases that suggest a question spans collections.
pub const JOIN_KEYWORDS: &[&str] = &[
    "join",
    "related",
    "between",
    "purchase history",
    "transaction",
    "user who",
    "customer who",
    "bought",
    "purchased",
    "order",
];

/// Example rows per collection when every schema goes into one prompt.
const PLAN_SAMPLE_ROWS: usize = 3;

/// One secondary collection and the field pair linking it to the primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinStep {
    pub collection: String,
    /// Field in the primary collection.
    pub local_field: String,
    /// Field in `collection`.
    pub foreign_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinPlan {
    pub primary: String,
    pub joins: Vec<JoinStep>,
}

impl JoinPlan {
    /// Plan that runs only `primary`.
    pub fn single(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            joins: Vec::new(),
        }
    }
}

/// Whether `question` should take the join-planning path.
pub fn needs_join(question: &str, collection_count: usize) -> bool {
    if collection_count < 2 {
        return false;
    }
    let lower = question.to_lowercase();
    JOIN_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Collection named in `question` (plural or singular), else `default`.
pub fn choose_collection(question: &str, collections: &[String], default: Option<&str>) -> Option<String> {
    let lower = question.to_lowercase();

    collections
        .iter()
        .find(|collection| {
            let name = collection.to_lowercase();
            let singular = name.strip_suffix('s').unwrap_or(&name);
            lower.contains(&name) || lower.contains(singular)
        })
        .cloned()
        .or_else(|| default.map(str::to_string))
        .or_else(|| collections.first().cloned())
}

/// Asks the backend for a join plan and validates it.
pub struct JoinPlanner {
    backend: PromptedBackend,
}

impl JoinPlanner {
    pub fn new(backend: PromptedBackend) -> Self {
        Self { backend }
    }

    /// `None` when no usable primary collection came back.
    pub async fn plan(
        &self,
        question: &str,
        schemas: &[SchemaDescriptor],
        relationships: &[Relationship],
    ) -> Option<JoinPlan> {
        let rendered = schemas
            .iter()
            .map(|schema| {
                let mut trimmed = schema.clone();
                trimmed.sample_rows.truncate(PLAN_SAMPLE_ROWS);
                trimmed.render()
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let hints = relationships
            .iter()
            .map(|r| {
                format!(
                    "{}.{} -> {}.{}",
                    r.from_collection, r.from_field, r.to_collection, r.to_field
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let variables = vars([
            ("schemas", rendered),
            ("relationships", hints),
            ("question", question.to_string()),
        ]);

        match self.backend.complete(QUERY_JOIN_PLAN, variables).await {
            Ok(response) => {
                let plan = plan_from_response(&response, schemas);
                tracing::info!("Join plan: {:?}", plan);
                plan
            }
            Err(e) => {
                tracing::warn!("Join planning failed: {}", e);
                None
            }
        }
    }
}

/// Validate a plan against the known schemas.
///
/// An unknown primary yields `None`. Any join step naming an unknown
/// collection or field discards every join, leaving a single-collection plan
/// on the primary.
pub fn plan_from_response(response: &str, schemas: &[SchemaDescriptor]) -> Option<JoinPlan> {
    let object = parse_object(response)?;
    let primary = string_field(&object, "primary")?;
    let schema_of = |name: &str| schemas.iter().find(|s| s.collection == name);

    let Some(primary_schema) = schema_of(&primary) else {
        tracing::warn!("Join plan names unknown primary '{}'", primary);
        return None;
    };

    let raw_joins = match object.get("joins") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    let mut joins = Vec::new();
    for raw in raw_joins {
        let step = raw.as_object().and_then(|step| {
            Some(JoinStep {
                collection: string_field(step, "collection")?,
                local_field: string_field(step, "local_field")?,
                foreign_field: string_field(step, "foreign_field")?,
            })
        });

        let valid = step.filter(|step| {
            step.collection != primary
                && primary_schema.has_field(&step.local_field)
                && schema_of(&step.collection)
                    .map(|s| s.has_field(&step.foreign_field))
                    .unwrap_or(false)
        });

        match valid {
            Some(step) => joins.push(step),
            None => {
                tracing::warn!(
                    "Join plan has an unresolvable step {}, querying '{}' alone",
                    raw,
                    primary
                );
                return Some(JoinPlan::single(primary));
            }
        }
    }

    Some(JoinPlan { primary, joins })
}
