//! [`QuerySpec`] execution against a tabular source.

use crate::parse::strip_namespace;
use concierge_knowledge::{
    Filter, Operator, OrderBy, Projection, QuerySpec, SchemaDescriptor, SelectRequest,
    TabularResult, TabularSource,
};

/// Translate a spec into the adapter's request.
///
/// Filters are emitted grouped by operator in [`Operator::ALL`] order.
/// Operators the adapter does not support are skipped. An order field is
/// reduced to its last path segment and dropped if the schema lacks it.
pub fn to_request(spec: &QuerySpec, supported: &[Operator], schema: &SchemaDescriptor) -> SelectRequest {
    let mut request = SelectRequest::new(&spec.collection);

    request.columns = match &spec.projection {
        Projection::All => None,
        Projection::Fields(fields) => Some(fields.clone()),
    };

    for operator in Operator::ALL {
        for predicate in spec.predicates.iter().filter(|p| p.operator == operator) {
            if !supported.contains(&operator) {
                tracing::info!(
                    "Skipping unsupported operator '{}' on '{}'",
                    operator,
                    predicate.field
                );
                continue;
            }
            request.filters.push(Filter {
                column: predicate.field.clone(),
                operator,
                value: predicate.value.clone(),
            });
        }
    }

    request.order = spec.order_by.as_ref().and_then(|order| {
        let field = strip_namespace(&order.field);
        if schema.has_field(field) {
            Some(OrderBy {
                field: field.to_string(),
                direction: order.direction,
            })
        } else {
            tracing::debug!("Ignoring order on unknown field '{}'", order.field);
            None
        }
    });

    request.limit = spec.limit;
    request
}

/// Run `spec`. Adapter failures come back in [`TabularResult::error`].
pub async fn execute(source: &dyn TabularSource, spec: &QuerySpec, schema: &SchemaDescriptor) -> TabularResult {
    let request = to_request(spec, source.supported_operators(), schema);

    match source.select(&request).await {
        Ok(rows) => {
            tracing::debug!("'{}' returned {} rows", spec.collection, rows.len());
            TabularResult::ok(&spec.collection, rows)
        }
        Err(e) => {
            tracing::warn!("Query on '{}' failed: {}", spec.collection, e);
            TabularResult::failed(&spec.collection, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_core::{AppError, AppResult};
    use concierge_knowledge::{FieldDescriptor, Predicate, Row, SortDirection};
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor {
            collection: "products".to_string(),
            fields: ["product_id", "name", "price"]
                .iter()
                .map(|name| FieldDescriptor {
                    name: name.to_string(),
                    data_type: "TEXT".to_string(),
                    description: String::new(),
                })
                .collect(),
            sample_rows: Vec::new(),
        }
    }

    fn spec() -> QuerySpec {
        QuerySpec {
            collection: "products".to_string(),
            projection: Projection::Fields(vec!["name".to_string()]),
            predicates: vec![
                Predicate::new("product_id", Operator::In, json!([1, 2])),
                Predicate::new("name", Operator::Ilike, json!("cable")),
                Predicate::new("price", Operator::Lt, json!(20)),
                Predicate::new("product_id", Operator::Eq, json!(1)),
            ],
            order_by: Some(OrderBy {
                field: "products.price".to_string(),
                direction: SortDirection::Desc,
            }),
            limit: Some(5),
        }
    }

    struct DownSource;

    #[async_trait]
    impl TabularSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        fn collections(&self) -> Vec<String> {
            vec!["products".to_string()]
        }

        fn supported_operators(&self) -> &[Operator] {
            &[Operator::Eq, Operator::Lt]
        }

        async fn describe(&self, _collection: &str, _sample_rows: usize) -> AppResult<SchemaDescriptor> {
            Ok(schema())
        }

        async fn select(&self, _request: &SelectRequest) -> AppResult<Vec<Row>> {
            Err(AppError::Adapter("connection refused".to_string()))
        }
    }

    #[test]
    fn test_filters_follow_operator_order() {
        let request = to_request(&spec(), &Operator::ALL, &schema());
        let operators: Vec<Operator> = request.filters.iter().map(|f| f.operator).collect();
        assert_eq!(
            operators,
            vec![Operator::Eq, Operator::Lt, Operator::Ilike, Operator::In]
        );
        assert_eq!(request.columns, Some(vec!["name".to_string()]));
        assert_eq!(request.limit, Some(5));
    }

    #[test]
    fn test_namespaced_order_is_stripped() {
        let request = to_request(&spec(), &Operator::ALL, &schema());
        let order = request.order.unwrap();
        assert_eq!(order.field, "price");
        assert_eq!(order.direction, SortDirection::Desc);

        let mut unknown = spec();
        unknown.order_by = Some(OrderBy {
            field: "rating".to_string(),
            direction: SortDirection::Asc,
        });
        assert!(to_request(&unknown, &Operator::ALL, &schema()).order.is_none());
    }

    #[test]
    fn test_unsupported_operators_are_skipped() {
        let request = to_request(&spec(), &[Operator::Eq, Operator::Lt], &schema());
        assert_eq!(request.filters.len(), 2);
    }

    #[tokio::test]
    async fn test_adapter_error_is_captured() {
        let result = execute(&DownSource, &spec(), &schema()).await;
        assert_eq!(result.collection, "products");
        assert!(result.rows.is_empty());
        assert!(result.error.unwrap().contains("connection refused"));
    }
}
