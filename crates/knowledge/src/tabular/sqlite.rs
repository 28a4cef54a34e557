//! SQLite-backed tabular source.
//!
//! Every table is a collection. Column descriptions come from an optional
//! `column_descriptions(table_name, column_name, description)` table.
//! Selections compile to parameterised SQL; identifiers are checked against
//! the table's columns before they are quoted into the statement.

use super::types::{
    FieldDescriptor, Operator, Row, SchemaDescriptor, SelectRequest,
};
use super::TabularSource;
use async_trait::async_trait;
use concierge_core::{AppError, AppResult};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DESCRIPTIONS_TABLE: &str = "column_descriptions";
const NO_DESCRIPTION: &str = "No description available";

/// Tabular source over one SQLite database.
pub struct SqliteSource {
    conn: Mutex<Connection>,
    collections: Vec<String>,
}

impl SqliteSource {
    /// Open an existing database read-only.
    ///
    /// An empty `collections` list exposes every user table.
    pub fn open(path: &Path, collections: &[String]) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Adapter(format!(
                "Database not found at {:?}",
                path
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| AppError::Adapter(format!("Failed to open {:?}: {}", path, e)))?;

        tracing::debug!("Opened tabular database at {:?}", path);
        Self::from_connection(conn, collections)
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: Connection, collections: &[String]) -> AppResult<Self> {
        let collections = if collections.is_empty() {
            discover_tables(&conn)?
        } else {
            collections.to_vec()
        };

        Ok(Self {
            conn: Mutex::new(conn),
            collections,
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Adapter("SQLite connection lock poisoned".to_string()))
    }

    fn check_collection(&self, collection: &str) -> AppResult<()> {
        if self.collections.iter().any(|c| c == collection) {
            Ok(())
        } else {
            Err(AppError::Adapter(format!(
                "Unknown collection '{}'",
                collection
            )))
        }
    }
}

#[async_trait]
impl TabularSource for SqliteSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn collections(&self) -> Vec<String> {
        self.collections.clone()
    }

    async fn describe(&self, collection: &str, sample_rows: usize) -> AppResult<SchemaDescriptor> {
        self.check_collection(collection)?;
        let conn = self.lock()?;

        let fields = load_fields(&conn, collection)?;
        let samples = if sample_rows == 0 {
            Vec::new()
        } else {
            let sql = format!("SELECT * FROM {} LIMIT ?1", quote_ident(collection));
            query_rows(&conn, &sql, &[SqlValue::Integer(sample_rows as i64)])?
        };

        tracing::debug!(
            "Described '{}': {} fields, {} sample rows",
            collection,
            fields.len(),
            samples.len()
        );

        Ok(SchemaDescriptor {
            collection: collection.to_string(),
            fields,
            sample_rows: samples,
        })
    }

    async fn select(&self, request: &SelectRequest) -> AppResult<Vec<Row>> {
        self.check_collection(&request.collection)?;
        let conn = self.lock()?;

        let columns: Vec<String> = load_fields(&conn, &request.collection)?
            .into_iter()
            .map(|f| f.name)
            .collect();
        let (sql, params) = compile_select(request, &columns)?;

        tracing::debug!("Executing: {} with {} params", sql, params.len());
        query_rows(&conn, &sql, &params)
    }
}

fn sql_error(err: rusqlite::Error) -> AppError {
    AppError::Adapter(format!("SQLite error: {}", err))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn discover_tables(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?1
             ORDER BY name",
        )
        .map_err(sql_error)?;

    let names = stmt
        .query_map([DESCRIPTIONS_TABLE], |row| row.get::<_, String>(0))
        .map_err(sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_error)?;
    Ok(names)
}

fn load_descriptions(conn: &Connection, table: &str) -> AppResult<HashMap<String, String>> {
    let exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [DESCRIPTIONS_TABLE],
            |row| row.get(0),
        )
        .map_err(sql_error)?;
    if exists == 0 {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT column_name, description FROM {} WHERE table_name = ?1",
        quote_ident(DESCRIPTIONS_TABLE)
    );
    let mut stmt = conn.prepare(&sql).map_err(sql_error)?;
    let pairs = stmt
        .query_map([table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .map_err(sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_error)?;

    Ok(pairs
        .into_iter()
        .filter_map(|(column, description)| description.map(|d| (column, d)))
        .collect())
}

fn load_fields(conn: &Connection, table: &str) -> AppResult<Vec<FieldDescriptor>> {
    let mut stmt = conn
        .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(sql_error)?;
    let columns = stmt
        .query_map([table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_error)?;

    if columns.is_empty() {
        return Err(AppError::Adapter(format!(
            "Collection '{}' does not exist",
            table
        )));
    }

    let mut descriptions = load_descriptions(conn, table)?;
    Ok(columns
        .into_iter()
        .map(|(name, data_type)| FieldDescriptor {
            description: descriptions
                .remove(&name)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            data_type: if data_type.is_empty() {
                "ANY".to_string()
            } else {
                data_type
            },
            name,
        })
        .collect())
}

/// Translate a request into SQL plus positional parameters.
fn compile_select(request: &SelectRequest, columns: &[String]) -> AppResult<(String, Vec<SqlValue>)> {
    let known = |name: &str| -> AppResult<String> {
        if columns.iter().any(|c| c == name) {
            Ok(quote_ident(name))
        } else {
            Err(AppError::Adapter(format!(
                "Unknown column '{}' in '{}'",
                name, request.collection
            )))
        }
    };

    let projection = match &request.columns {
        Some(selected) if !selected.is_empty() => selected
            .iter()
            .map(|c| known(c))
            .collect::<AppResult<Vec<_>>>()?
            .join(", "),
        _ => "*".to_string(),
    };

    let mut sql = format!(
        "SELECT {} FROM {}",
        projection,
        quote_ident(&request.collection)
    );
    let mut params = Vec::new();
    let mut clauses = Vec::new();

    for filter in &request.filters {
        let column = known(&filter.column)?;
        let clause = match filter.operator {
            Operator::Eq => binary(&column, "=", &filter.value, &mut params),
            Operator::Neq => binary(&column, "!=", &filter.value, &mut params),
            Operator::Gt => binary(&column, ">", &filter.value, &mut params),
            Operator::Lt => binary(&column, "<", &filter.value, &mut params),
            Operator::Gte => binary(&column, ">=", &filter.value, &mut params),
            Operator::Lte => binary(&column, "<=", &filter.value, &mut params),
            Operator::Like => {
                params.push(SqlValue::Text(format!("%{}%", text_of(&filter.value))));
                format!("{} LIKE ?", column)
            }
            Operator::Ilike => {
                params.push(SqlValue::Text(format!("%{}%", text_of(&filter.value))));
                format!("LOWER({}) LIKE LOWER(?)", column)
            }
            Operator::In => {
                let values = filter.value.as_array().ok_or_else(|| {
                    AppError::Adapter(format!(
                        "'in' filter on '{}' needs a list value",
                        filter.column
                    ))
                })?;
                if values.is_empty() {
                    "0 = 1".to_string()
                } else {
                    params.extend(values.iter().map(to_sql));
                    let placeholders = vec!["?"; values.len()].join(", ");
                    format!("{} IN ({})", column, placeholders)
                }
            }
        };
        clauses.push(clause);
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if let Some(order) = &request.order {
        sql.push_str(&format!(
            " ORDER BY {} {}",
            known(&order.field)?,
            order.direction.as_sql()
        ));
    }

    if let Some(limit) = request.limit {
        sql.push_str(" LIMIT ?");
        params.push(SqlValue::Integer(i64::from(limit)));
    }

    Ok((sql, params))
}

fn binary(column: &str, op: &str, value: &Value, params: &mut Vec<SqlValue>) -> String {
    params.push(to_sql(value));
    format!("{} {} ?", column, op)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

fn query_rows(conn: &Connection, sql: &str, params: &[SqlValue]) -> AppResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql).map_err(sql_error)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            let mut map = Row::new();
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            Ok(map)
        })
        .map_err(sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_error)?;
    Ok(rows)
}
