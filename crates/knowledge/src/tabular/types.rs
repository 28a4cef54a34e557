//! Tabular data model: schema descriptors, query specifications and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One result row, column name to value, in column order.
pub type Row = serde_json::Map<String, Value>;

/// Predicate operators understood by the query model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    Ilike,
    In,
}

impl Operator {
    /// Every operator, in translation order.
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Like,
        Operator::Ilike,
        Operator::In,
    ];

    /// Parse an operator name or its symbolic alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "eq" | "=" | "==" | "equals" => Some(Self::Eq),
            "neq" | "ne" | "!=" | "<>" => Some(Self::Neq),
            "gt" | ">" => Some(Self::Gt),
            "lt" | "<" => Some(Self::Lt),
            "gte" | "ge" | ">=" => Some(Self::Gte),
            "lte" | "le" | "<=" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "ilike" => Some(Self::Ilike),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::In => "in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `field <operator> value`. The value is never null; for `In` it is an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Which fields to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    All,
    Fields(Vec<String>),
}

impl Projection {
    /// Add `field` to an explicit projection if missing. `All` is unchanged.
    pub fn include(&mut self, field: &str) {
        if let Projection::Fields(fields) = self {
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Adapter-agnostic selection over one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub collection: String,
    pub projection: Projection,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    /// Positive when present.
    pub limit: Option<u32>,
}

impl QuerySpec {
    /// All fields, no predicates, no ordering, no limit.
    pub fn permissive(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            projection: Projection::All,
            predicates: Vec::new(),
            order_by: None,
            limit: None,
        }
    }
}

/// A filter as the tabular adapter receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

/// The call a tabular adapter executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectRequest {
    pub collection: String,
    /// `None` selects every column.
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl SelectRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            columns: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }
}

/// One column of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub data_type: String,
    pub description: String,
}

/// Fields and example rows of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub collection: String,
    pub fields: Vec<FieldDescriptor>,
    pub sample_rows: Vec<Row>,
}

impl SchemaDescriptor {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Text form used in query prompts.
    pub fn render(&self) -> String {
        let mut out = format!("Table: {}\nColumns:\n", self.collection);
        for field in &self.fields {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                field.name, field.data_type, field.description
            ));
        }

        if !self.sample_rows.is_empty() {
            out.push_str("Example rows:\n");
            for row in &self.sample_rows {
                out.push_str(&Value::Object(row.clone()).to_string());
                out.push('\n');
            }
        }

        out.trim_end().to_string()
    }
}

/// Outcome of executing one query. Failures are carried, not thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub collection: String,
    pub rows: Vec<Row>,
    pub error: Option<String>,
}

impl TabularResult {
    pub fn ok(collection: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            collection: collection.into(),
            rows,
            error: None,
        }
    }

    pub fn failed(collection: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            rows: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The query ran but matched nothing.
    pub fn is_miss(&self) -> bool {
        self.error.is_none() && self.rows.is_empty()
    }

    /// Distinct non-null values of `field` across the rows, in first-seen order.
    pub fn distinct_values(&self, field: &str) -> Vec<Value> {
        let mut values: Vec<Value> = Vec::new();
        for row in &self.rows {
            if let Some(value) = row.get(field) {
                if !value.is_null() && !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        values
    }

    /// Text form used as answer evidence; empty for an error or no rows.
    pub fn render(&self) -> String {
        if self.error.is_some() || self.rows.is_empty() {
            return String::new();
        }

        self.rows
            .iter()
            .map(|row| {
                let fields = row
                    .iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => format!("{}: {}", k, s),
                        other => format!("{}: {}", k, other),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", self.collection, fields)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_operator_aliases() {
        assert_eq!(Operator::parse("=="), Some(Operator::Eq));
        assert_eq!(Operator::parse("<>"), Some(Operator::Neq));
        assert_eq!(Operator::parse(">="), Some(Operator::Gte));
        assert_eq!(Operator::parse("ILIKE"), Some(Operator::Ilike));
        assert_eq!(Operator::parse("between"), None);
    }

    #[test]
    fn test_projection_include() {
        let mut projection = Projection::Fields(vec!["name".to_string()]);
        projection.include("user_id");
        projection.include("name");
        assert_eq!(
            projection,
            Projection::Fields(vec!["name".to_string(), "user_id".to_string()])
        );

        let mut all = Projection::All;
        all.include("user_id");
        assert_eq!(all, Projection::All);
    }

    #[test]
    fn test_schema_render() {
        let schema = SchemaDescriptor {
            collection: "products".to_string(),
            fields: vec![FieldDescriptor {
                name: "product_id".to_string(),
                data_type: "INTEGER".to_string(),
                description: "Unique product identifier".to_string(),
            }],
            sample_rows: vec![row(json!({"product_id": 42}))],
        };

        let text = schema.render();
        assert!(text.starts_with("Table: products\nColumns:\n"));
        assert!(text.contains("- product_id (INTEGER): Unique product identifier"));
        assert!(text.ends_with("{\"product_id\":42}"));
    }

    #[test]
    fn test_distinct_values_skip_nulls_and_duplicates() {
        let result = TabularResult::ok(
            "transactions",
            vec![
                row(json!({"user_id": 1})),
                row(json!({"user_id": 1})),
                row(json!({"user_id": null})),
                row(json!({"user_id": 7})),
            ],
        );
        assert_eq!(result.distinct_values("user_id"), vec![json!(1), json!(7)]);
    }

    #[test]
    fn test_result_render() {
        let result = TabularResult::ok(
            "products",
            vec![row(json!({"name": "Headphones", "stock": 3}))],
        );
        assert_eq!(result.render(), "products: name: Headphones, stock: 3");
        assert_eq!(TabularResult::failed("products", "down").render(), "");
    }

    #[test]
    fn test_miss_is_empty_success_only() {
        assert!(TabularResult::ok("products", Vec::new()).is_miss());
        assert!(!TabularResult::failed("products", "down").is_miss());
        assert!(!TabularResult::ok("products", vec![row(json!({"stock": 0}))]).is_miss());
    }
}
