//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for one model table.

use crate::model::Row;
use serde_json::Value;
use std::collections::HashMap;

/// Column name to its PostgreSQL type as `format_type` prints it, e.g. `timestamp with time zone`.
pub type ColumnTypes = HashMap<String, String>;

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `schema.table` is quoted part by part; a bare name stays unqualified.
pub(crate) fn qualified_table(table: &str) -> String {
    match table.split_once('.') {
        Some((schema, name)) => format!("{}.{}", quoted(schema), quoted(name)),
        None => quoted(table),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// `$n`, cast to the column type when it is known. Parameters go out typed as text, json or
/// numbers, and only an explicit cast reaches types like `uuid` or `timestamptz`.
fn placeholder(n: usize, column: &str, types: &ColumnTypes) -> String {
    match types.get(column) {
        Some(pg_type) => format!("${}::{}", n, pg_type),
        None => format!("${}", n),
    }
}

/// SELECT every row ordered by identity.
pub fn select_all(table: &str, id_column: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT * FROM {} ORDER BY {}",
        qualified_table(table),
        quoted(id_column)
    );
    q
}

/// SELECT one row by identity.
pub fn select_by_id(table: &str, id_column: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "SELECT * FROM {} WHERE {} = ${}",
        qualified_table(table),
        quoted(id_column),
        n
    );
    q
}

/// INSERT the row's fields. A missing or null identity is left out so the column default
/// (sequence) assigns it.
pub fn insert(table: &str, id_column: &str, row: &Row, types: &ColumnTypes) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(row.len());
    let mut placeholders = Vec::with_capacity(row.len());
    for (name, val) in row {
        if name == id_column && (val.is_null() || *val == Value::from(0)) {
            continue;
        }
        let n = q.push_param(val.clone());
        cols.push(quoted(name));
        placeholders.push(placeholder(n, name, types));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", qualified_table(table))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            qualified_table(table),
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

/// UPDATE by identity: SET every column in `changes` except the identity itself.
/// Nothing to set degenerates into a plain SELECT of the row.
pub fn update(
    table: &str,
    id_column: &str,
    id: i64,
    changes: &Row,
    types: &ColumnTypes,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::with_capacity(changes.len());
    for (k, v) in changes {
        if k == id_column {
            continue;
        }
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(k), placeholder(n, k, types)));
    }
    if sets.is_empty() {
        return select_by_id(table, id_column, id);
    }
    let id_param = q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING *",
        qualified_table(table),
        sets.join(", "),
        quoted(id_column),
        id_param
    );
    q
}

/// DELETE by identity, returning the removed row.
pub fn delete(table: &str, id_column: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${} RETURNING *",
        qualified_table(table),
        quoted(id_column),
        n
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn untyped() -> ColumnTypes {
        ColumnTypes::new()
    }

    fn event_types() -> ColumnTypes {
        [
            ("ID", "bigint"),
            ("Ref", "uuid"),
            ("At", "timestamp with time zone"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn select_by_id_quotes_identifiers() {
        let q = select_by_id("shop.products", "ID", 3);
        assert_eq!(q.sql, r#"SELECT * FROM "shop"."products" WHERE "ID" = $1"#);
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn insert_skips_unassigned_identity() {
        let q = insert(
            "products",
            "ID",
            &row(json!({"ID": 0, "Code": "A1", "Price": 100})),
            &untyped(),
        );
        assert_eq!(
            q.sql,
            r#"INSERT INTO "products" ("Code", "Price") VALUES ($1, $2) RETURNING *"#
        );
        assert_eq!(q.params, vec![json!("A1"), json!(100)]);
    }

    #[test]
    fn insert_keeps_explicit_identity() {
        let q = insert("products", "ID", &row(json!({"ID": 9})), &untyped());
        assert_eq!(q.sql, r#"INSERT INTO "products" ("ID") VALUES ($1) RETURNING *"#);
    }

    #[test]
    fn insert_without_columns_uses_defaults() {
        let q = insert("products", "ID", &Row::new(), &untyped());
        assert_eq!(q.sql, r#"INSERT INTO "products" DEFAULT VALUES RETURNING *"#);
    }

    #[test]
    fn update_binds_id_last_and_ignores_identity_changes() {
        let q = update(
            "products",
            "ID",
            1,
            &row(json!({"ID": 2, "Price": 150})),
            &untyped(),
        );
        assert_eq!(
            q.sql,
            r#"UPDATE "products" SET "Price" = $1 WHERE "ID" = $2 RETURNING *"#
        );
        assert_eq!(q.params, vec![json!(150), json!(1)]);
    }

    #[test]
    fn empty_update_is_a_select() {
        let q = update("products", "ID", 4, &Row::new(), &untyped());
        assert!(q.sql.starts_with("SELECT * FROM"));
        assert_eq!(q.params, vec![json!(4)]);
    }

    #[test]
    fn typed_columns_get_cast_placeholders() {
        let q = insert(
            "events",
            "ID",
            &row(json!({
                "ID": 0,
                "Ref": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                "At": "2024-01-02T03:04:05Z",
                "Note": "x"
            })),
            &event_types(),
        );
        assert_eq!(
            q.sql,
            r#"INSERT INTO "events" ("At", "Note", "Ref") VALUES ($1::timestamp with time zone, $2, $3::uuid) RETURNING *"#
        );

        let q = update(
            "events",
            "ID",
            7,
            &row(json!({"At": null, "Ref": "67e55044-10b1-426f-9247-bb680e5fe0c8"})),
            &event_types(),
        );
        assert_eq!(
            q.sql,
            r#"UPDATE "events" SET "At" = $1::timestamp with time zone, "Ref" = $2::uuid WHERE "ID" = $3 RETURNING *"#
        );
    }

    #[test]
    fn quoted_escapes_double_quotes() {
        assert_eq!(quoted(r#"we"ird"#), r#""we""ird""#);
    }
}
