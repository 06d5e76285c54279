//! Builds parameterized statements for tenant-scoped tables.
//!
//! Every statement is predicated on `tenant_id = $1`; no builder takes an
//! unscoped predicate. Identifiers come from [`TableSpec`], values are always
//! parameters.

use super::params::SqlValue;
use crate::error::AppError;
use chrono::{DateTime, Utc};

/// Columns every tenant-scoped table carries and that callers cannot write.
pub const TENANT_COLUMN: &str = "tenant_id";
pub const ID_COLUMN: &str = "id";
pub const RESERVED_COLUMNS: &[&str] = &[ID_COLUMN, TENANT_COLUMN, "created_at", "updated_at"];

/// Static description of a tenant-scoped table.
#[derive(Clone, Copy, Debug)]
pub struct TableSpec {
    pub table: &'static str,
    /// All selected columns, reserved ones included.
    pub columns: &'static [&'static str],
}

impl TableSpec {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(&name)
    }

    /// Caller-writable columns.
    pub fn is_writable(&self, name: &str) -> bool {
        self.has_column(name) && !RESERVED_COLUMNS.contains(&name)
    }

    fn select_list(&self) -> String {
        self.columns.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
    }
}

/// Column equalities ANDed onto the tenant predicate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, SqlValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.clauses.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, SqlValue)] {
        &self.clauses
    }
}

/// Column values for insert/update, already mapped to bind values.
pub type Assignments = Vec<(String, SqlValue)>;

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl QueryBuf {
    fn scoped(tenant_id: &str) -> Self {
        QueryBuf {
            sql: String::new(),
            params: vec![SqlValue::Text(tenant_id.to_string())],
        }
    }

    fn push_param(&mut self, v: SqlValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// `tenant_id = $1 AND col = $n ...`. Unknown columns and `tenant_id` are rejected.
fn scoped_where(spec: &TableSpec, q: &mut QueryBuf, filter: &Filter) -> Result<String, AppError> {
    let mut parts = vec![format!("{} = $1", quoted(TENANT_COLUMN))];
    for (col, val) in filter.clauses() {
        if col == TENANT_COLUMN || !spec.has_column(col) {
            return Err(AppError::Validation(format!(
                "cannot filter {} by column '{}'",
                spec.table, col
            )));
        }
        let n = q.push_param(val.clone());
        parts.push(format!("{} = ${}", quoted(col), n));
    }
    Ok(parts.join(" AND "))
}

/// SELECT rows of the tenant matching `filter`, oldest first.
pub fn select_where(spec: &TableSpec, tenant_id: &str, filter: &Filter) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::scoped(tenant_id);
    let where_clause = scoped_where(spec, &mut q, filter)?;
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}, {}",
        spec.select_list(),
        quoted(spec.table),
        where_clause,
        quoted("created_at"),
        quoted(ID_COLUMN)
    );
    Ok(q)
}

pub fn count_where(spec: &TableSpec, tenant_id: &str, filter: &Filter) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::scoped(tenant_id);
    let where_clause = scoped_where(spec, &mut q, filter)?;
    q.sql = format!("SELECT COUNT(*) FROM {} WHERE {}", quoted(spec.table), where_clause);
    Ok(q)
}

/// SELECT one row by id within the tenant.
pub fn select_by_id(spec: &TableSpec, tenant_id: &str, id: &str) -> QueryBuf {
    let mut q = QueryBuf::scoped(tenant_id);
    let n = q.push_param(SqlValue::Text(id.to_string()));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1 AND {} = ${}",
        spec.select_list(),
        quoted(spec.table),
        quoted(TENANT_COLUMN),
        quoted(ID_COLUMN),
        n
    );
    q
}

/// INSERT with `id`, `tenant_id` and timestamps supplied here; `values` may only name writable columns.
pub fn insert(
    spec: &TableSpec,
    tenant_id: &str,
    id: &str,
    values: &Assignments,
    now: DateTime<Utc>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::scoped(tenant_id);
    let mut cols = vec![quoted(TENANT_COLUMN)];
    let mut placeholders = vec!["$1".to_string()];

    let n = q.push_param(SqlValue::Text(id.to_string()));
    cols.push(quoted(ID_COLUMN));
    placeholders.push(format!("${}", n));
    let n = q.push_param(SqlValue::Timestamp(now));
    cols.push(quoted("created_at"));
    placeholders.push(format!("${}", n));
    cols.push(quoted("updated_at"));
    placeholders.push(format!("${}", n));

    for (col, val) in values {
        if !spec.is_writable(col) {
            return Err(AppError::Validation(format!("{} has no writable column '{}'", spec.table, col)));
        }
        let n = q.push_param(val.clone());
        cols.push(quoted(col));
        placeholders.push(format!("${}", n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(spec.table),
        cols.join(", "),
        placeholders.join(", ")
    );
    Ok(q)
}

/// UPDATE one row by id within the tenant; `updated_at` is always refreshed.
pub fn update(
    spec: &TableSpec,
    tenant_id: &str,
    id: &str,
    values: &Assignments,
    now: DateTime<Utc>,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::scoped(tenant_id);
    let id_param = q.push_param(SqlValue::Text(id.to_string()));
    let mut sets = Vec::new();
    for (col, val) in values {
        if !spec.is_writable(col) {
            return Err(AppError::Validation(format!("{} has no writable column '{}'", spec.table, col)));
        }
        let n = q.push_param(val.clone());
        sets.push(format!("{} = ${}", quoted(col), n));
    }
    let n = q.push_param(SqlValue::Timestamp(now));
    sets.push(format!("{} = ${}", quoted("updated_at"), n));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = $1 AND {} = ${}",
        quoted(spec.table),
        sets.join(", "),
        quoted(TENANT_COLUMN),
        quoted(ID_COLUMN),
        id_param
    );
    Ok(q)
}

/// DELETE one row by id within the tenant.
pub fn delete(spec: &TableSpec, tenant_id: &str, id: &str) -> QueryBuf {
    let mut q = QueryBuf::scoped(tenant_id);
    let n = q.push_param(SqlValue::Text(id.to_string()));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1 AND {} = ${}",
        quoted(spec.table),
        quoted(TENANT_COLUMN),
        quoted(ID_COLUMN),
        n
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRIENDS: TableSpec = TableSpec {
        table: "friends",
        columns: &["id", "tenant_id", "name", "phone_number", "created_at", "updated_at"],
    };

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_select_where_always_scopes_tenant_first() {
        let q = select_where(&FRIENDS, "t1", &Filter::new().eq("name", "Alice")).unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"tenant_id\", \"name\", \"phone_number\", \"created_at\", \"updated_at\" FROM \"friends\" \
             WHERE \"tenant_id\" = $1 AND \"name\" = $2 ORDER BY \"created_at\", \"id\""
        );
        assert_eq!(q.params, vec![SqlValue::Text("t1".into()), SqlValue::Text("Alice".into())]);
    }

    #[test]
    fn test_filter_cannot_name_tenant_or_unknown_column() {
        let err = select_where(&FRIENDS, "t1", &Filter::new().eq("tenant_id", "t2")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = count_where(&FRIENDS, "t1", &Filter::new().eq("name; DROP TABLE friends", "x")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_by_id_statements_are_tenant_scoped() {
        for q in [select_by_id(&FRIENDS, "t1", "f1"), delete(&FRIENDS, "t1", "f1")] {
            assert!(q.sql.contains("WHERE \"tenant_id\" = $1 AND \"id\" = $2"), "{}", q.sql);
            assert_eq!(q.params, vec![SqlValue::Text("t1".into()), SqlValue::Text("f1".into())]);
        }
    }

    #[test]
    fn test_insert_forces_tenant_id_and_timestamps() {
        let values = vec![("name".to_string(), SqlValue::from("Alice"))];
        let q = insert(&FRIENDS, "t1", "f1", &values, now()).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"friends\" (\"tenant_id\", \"id\", \"created_at\", \"updated_at\", \"name\") VALUES ($1, $2, $3, $3, $4)"
        );
        assert_eq!(q.params[0], SqlValue::Text("t1".into()));

        let spoof = vec![("tenant_id".to_string(), SqlValue::from("t2"))];
        assert!(insert(&FRIENDS, "t1", "f1", &spoof, now()).is_err());
    }

    #[test]
    fn test_update_sets_updated_at_and_scopes() {
        let values = vec![("phone_number".to_string(), SqlValue::Null)];
        let q = update(&FRIENDS, "t1", "f1", &values, now()).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"friends\" SET \"phone_number\" = $3, \"updated_at\" = $4 WHERE \"tenant_id\" = $1 AND \"id\" = $2"
        );
        assert_eq!(q.params.len(), 4);
    }
}
