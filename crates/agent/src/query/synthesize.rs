//! Natural language to [`QuerySpec`].
//!
//! The backend is asked for a JSON object with `select`, `filters`, `order`,
//! `order_direction` and `limit`. Each field is validated on its own against
//! the collection schema; anything unusable falls back to its permissive
//! default instead of failing the turn.

use crate::backend::{vars, PromptedBackend};
use crate::parse::{parse_object, strip_namespace, string_field};
use concierge_knowledge::{
    OrderBy, Operator, Predicate, Projection, QuerySpec, SchemaDescriptor, SortDirection,
};
use concierge_prompt::defaults::QUERY_SELECT;
use serde_json::{Map, Value};

/// Produces query specifications for one collection at a time.
pub struct QuerySynthesizer {
    backend: PromptedBackend,
}

impl QuerySynthesizer {
    pub fn new(backend: PromptedBackend) -> Self {
        Self { backend }
    }

    /// Never fails; a backend error yields [`QuerySpec::permissive`].
    pub async fn synthesize(&self, question: &str, schema: &SchemaDescriptor) -> QuerySpec {
        let variables = vars([
            ("schema", schema.render()),
            ("question", question.to_string()),
        ]);

        match self.backend.complete(QUERY_SELECT, variables).await {
            Ok(response) => {
                let spec = spec_from_response(&response, schema);
                tracing::info!(
                    "Query spec for '{}': {} predicates, limit {:?}",
                    spec.collection,
                    spec.predicates.len(),
                    spec.limit
                );
                tracing::debug!("Query spec: {:?}", spec);
                spec
            }
            Err(e) => {
                tracing::warn!(
                    "Query synthesis failed for '{}', using permissive query: {}",
                    schema.collection,
                    e
                );
                QuerySpec::permissive(&schema.collection)
            }
        }
    }
}

/// Validate a backend response into a spec for `schema`'s collection.
pub fn spec_from_response(response: &str, schema: &SchemaDescriptor) -> QuerySpec {
    let Some(object) = parse_object(response) else {
        tracing::warn!(
            "Unparseable query output for '{}', using permissive query",
            schema.collection
        );
        return QuerySpec::permissive(&schema.collection);
    };

    let predicates = object
        .get("filters")
        .and_then(Value::as_array)
        .map(|filters| {
            filters
                .iter()
                .filter_map(|filter| parse_predicate(filter, schema))
                .collect()
        })
        .unwrap_or_default();

    let order_by = string_field(&object, "order").map(|field| OrderBy {
        field,
        direction: parse_direction(object.get("order_direction")),
    });

    QuerySpec {
        collection: schema.collection.clone(),
        projection: parse_projection(object.get("select"), schema),
        predicates,
        order_by,
        limit: parse_limit(object.get("limit")),
    }
}

/// True when a field name reads like an identifier: an `id`/`ids` segment
/// (`product_id`, `id`, `order-ids`) or a camelCase `Id`/`ID` suffix.
pub fn is_identifier_field(field: &str) -> bool {
    let name = strip_namespace(field);
    if name.ends_with("Id") || name.ends_with("ID") {
        return true;
    }
    name.split(|c: char| !c.is_alphanumeric())
        .any(|segment| segment.eq_ignore_ascii_case("id") || segment.eq_ignore_ascii_case("ids"))
}

/// Best-effort integer coercion of numeric-looking strings on identifier fields.
///
/// Values that do not parse are kept as they are. Lists are coerced element-wise.
pub fn coerce_value(field: &str, value: Value) -> Value {
    if !is_identifier_field(field) {
        return value;
    }

    match value {
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| coerce_value(field, item))
                .collect(),
        ),
        other => other,
    }
}

/// List form of an `in` value: arrays lose their nulls, strings split on
/// commas. Anything else, or an empty list, drops the predicate.
fn normalize_in_value(value: &Value) -> Option<Value> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect(),
        _ => return None,
    };

    if items.is_empty() {
        None
    } else {
        Some(Value::Array(items))
    }
}

fn parse_predicate(filter: &Value, schema: &SchemaDescriptor) -> Option<Predicate> {
    let object: &Map<String, Value> = filter.as_object()?;

    let raw_field = string_field(object, "column").or_else(|| string_field(object, "field"))?;
    let field = strip_namespace(&raw_field).to_string();
    if !schema.has_field(&field) {
        tracing::debug!("Dropping filter on unknown field '{}'", raw_field);
        return None;
    }

    let operator = match string_field(object, "operator") {
        Some(name) => match Operator::parse(&name) {
            Some(op) => op,
            None => {
                tracing::debug!("Dropping filter with unknown operator '{}'", name);
                return None;
            }
        },
        None => Operator::Eq,
    };

    let value = match object.get("value") {
        None | Some(Value::Null) => {
            tracing::debug!("Dropping filter on '{}' with null value", field);
            return None;
        }
        Some(value) if operator == Operator::In => match normalize_in_value(value) {
            Some(list) => list,
            None => {
                tracing::debug!("Dropping 'in' filter on '{}' without a usable list", field);
                return None;
            }
        },
        Some(value) => value.clone(),
    };

    let value = coerce_value(&field, value);
    Some(Predicate::new(field, operator, value))
}

fn parse_projection(select: Option<&Value>, schema: &SchemaDescriptor) -> Projection {
    let requested: Vec<String> = match select {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .collect(),
        _ => return Projection::All,
    };

    if requested.iter().any(|f| f == "*") {
        return Projection::All;
    }

    let mut fields: Vec<String> = Vec::new();
    for name in requested {
        let name = strip_namespace(&name).to_string();
        if schema.has_field(&name) && !fields.contains(&name) {
            fields.push(name);
        }
    }

    if fields.is_empty() {
        Projection::All
    } else {
        Projection::Fields(fields)
    }
}

fn parse_direction(direction: Option<&Value>) -> SortDirection {
    match direction.and_then(Value::as_str).map(|s| s.trim().to_lowercase()) {
        Some(d) if d == "desc" || d == "descending" => SortDirection::Desc,
        _ => SortDirection::Asc,
    }
}

fn parse_limit(limit: Option<&Value>) -> Option<u32> {
    let n = match limit? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    if n == 0 {
        None
    } else {
        Some(u32::try_from(n).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_knowledge::FieldDescriptor;
    use serde_json::json;

    fn products() -> SchemaDescriptor {
        SchemaDescriptor {
            collection: "products".to_string(),
            fields: ["product_id", "name", "category", "price", "stock", "sellerId"]
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

    #[test]
    fn test_identifier_heuristic() {
        for field in ["product_id", "id", "ID", "userId", "sellerID", "order-ids", "products.product_id"] {
            assert!(is_identifier_field(field), "{field}");
        }
        for field in ["paid", "valid", "name", "idea", "width"] {
            assert!(!is_identifier_field(field), "{field}");
        }
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value("product_id", json!("42")), json!(42));
        assert_eq!(coerce_value("product_id", json!(" 7 ")), json!(7));
        assert_eq!(coerce_value("product_id", json!("SKU-9")), json!("SKU-9"));
        assert_eq!(coerce_value("name", json!("42")), json!("42"));
        assert_eq!(coerce_value("user_id", json!(["1", "x", 3])), json!([1, "x", 3]));
    }

    #[test]
    fn test_eq_filter_on_id_is_coerced() {
        let spec = spec_from_response(
            r#"```json
{"select": "name, stock", "filters": [{"column": "product_id", "operator": "eq", "value": "42"}]}
```"#,
            &products(),
        );

        assert_eq!(
            spec.projection,
            Projection::Fields(vec!["name".to_string(), "stock".to_string()])
        );
        assert_eq!(
            spec.predicates,
            vec![Predicate::new("product_id", Operator::Eq, json!(42))]
        );
        assert_eq!(spec.limit, None);
    }

    #[test]
    fn test_unparseable_output_is_permissive() {
        let spec = spec_from_response("SELECT * FROM products", &products());
        assert_eq!(spec, QuerySpec::permissive("products"));
    }

    #[test]
    fn test_in_values_are_lists_or_dropped() {
        let spec = spec_from_response(
            r#"{"filters": [
                {"column": "product_id", "operator": "in", "value": "1, 2,3"},
                {"column": "category", "operator": "in", "value": ["audio", null]},
                {"column": "name", "operator": "in", "value": 5},
                {"column": "stock", "operator": "in", "value": [null]},
                {"column": "price", "operator": "in", "value": []}
            ]}"#,
            &products(),
        );

        assert_eq!(spec.predicates.len(), 2);
        assert_eq!(spec.predicates[0].value, json!([1, 2, 3]));
        assert_eq!(spec.predicates[1].value, json!(["audio"]));
        assert!(spec
            .predicates
            .iter()
            .filter(|p| p.operator == Operator::In)
            .all(|p| p.value.is_array()));
    }

    #[test]
    fn test_invalid_filters_are_dropped() {
        let spec = spec_from_response(
            r#"{"filters": [
                {"column": "colour", "operator": "eq", "value": "red"},
                {"column": "price", "operator": "between", "value": [1, 5]},
                {"column": "name", "operator": "eq", "value": null},
                {"field": "products.price", "operator": "<=", "value": 50},
                "not an object"
            ]}"#,
            &products(),
        );

        assert_eq!(
            spec.predicates,
            vec![Predicate::new("price", Operator::Lte, json!(50))]
        );
    }

    #[test]
    fn test_projection_order_and_limit() {
        let spec = spec_from_response(
            r#"{"select": ["products.name", "unknown"], "order": "products.price",
                "order_direction": "DESC", "limit": "3"}"#,
            &products(),
        );
        assert_eq!(spec.projection, Projection::Fields(vec!["name".to_string()]));
        let order = spec.order_by.unwrap();
        assert_eq!(order.field, "products.price");
        assert_eq!(order.direction, SortDirection::Desc);
        assert_eq!(spec.limit, Some(3));

        let spec = spec_from_response(r#"{"select": "*", "limit": 0}"#, &products());
        assert_eq!(spec.projection, Projection::All);
        assert_eq!(spec.limit, None);

        let spec = spec_from_response(r#"{"select": "colour", "limit": -2}"#, &products());
        assert_eq!(spec.projection, Projection::All);
        assert_eq!(spec.limit, None);
    }
}
