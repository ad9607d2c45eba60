//! Translation of a validated request into one PostgREST call.
//!
//! | Operation | Method | Query | Body |
//! |-----------|--------|-------|------|
//! | select | GET | `select`, filters, `order`, `limit`, `offset` | - |
//! | insert | POST | `select` (returning) | data |
//! | update | PATCH | `select` (returning), filters | data |
//! | delete | DELETE | `select` (returning), filters | - |
//!
//! Filters become `col=eq.<value>` (or `col=is.null`). Mutations ask for
//! `Prefer: return=representation` so the affected rows come back.

use reqwest::Method;
use serde_json::{Map, Value};

use crate::request::{Fields, Identifier, OrderBy, QueryRequest, Scalar};

/// Path prefix of the provider's REST API.
pub const REST_PREFIX: &str = "/rest/v1";

/// `Prefer` header value for mutations.
pub const RETURN_REPRESENTATION: &str = "return=representation";

/// Query parameter names PostgREST reads as directives rather than column
/// filters. A filter key with one of these names would carry no row
/// predicate, so the validator refuses them.
pub const RESERVED_PARAMETERS: &[&str] = &[
    "select",
    "columns",
    "order",
    "limit",
    "offset",
    "on_conflict",
    "and",
    "or",
    "not",
];

/// Whether `name` collides with a reserved PostgREST query parameter.
#[must_use]
pub fn is_reserved_parameter(name: &str) -> bool {
    RESERVED_PARAMETERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// A fully described outbound call, before credentials are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the project endpoint, e.g. `/rest/v1/users`.
    pub path: String,
    /// Query pairs in emission order.
    pub query: Vec<(String, String)>,
    /// JSON body for insert and update.
    pub body: Option<Value>,
    /// `Prefer` header, if any.
    pub prefer: Option<&'static str>,
}

/// Build the call for a validated request. Pure.
#[must_use]
pub fn prepare(request: &QueryRequest) -> PreparedCall {
    let path = format!("{REST_PREFIX}/{}", request.table());

    match request {
        QueryRequest::Select(q) => {
            let mut query = vec![projection(&q.columns)];
            push_filters(&mut query, &q.filters);
            if let Some(order) = &q.order_by {
                query.push(("order".into(), order_value(order)));
            }
            if let Some(limit) = q.limit {
                query.push(("limit".into(), limit.to_string()));
            }
            if let Some(offset) = q.offset {
                query.push(("offset".into(), offset.to_string()));
            }
            PreparedCall {
                method: Method::GET,
                path,
                query,
                body: None,
                prefer: None,
            }
        }
        QueryRequest::Insert(q) => PreparedCall {
            method: Method::POST,
            path,
            query: returning(&q.returning),
            body: Some(body(&q.data)),
            prefer: Some(RETURN_REPRESENTATION),
        },
        QueryRequest::Update(q) => {
            let mut query = returning(&q.returning);
            push_filters(&mut query, &q.filters);
            PreparedCall {
                method: Method::PATCH,
                path,
                query,
                body: Some(body(&q.data)),
                prefer: Some(RETURN_REPRESENTATION),
            }
        }
        QueryRequest::Delete(q) => {
            let mut query = returning(&q.returning);
            push_filters(&mut query, &q.filters);
            PreparedCall {
                method: Method::DELETE,
                path,
                query,
                body: None,
                prefer: Some(RETURN_REPRESENTATION),
            }
        }
    }
}

fn projection(columns: &[Identifier]) -> (String, String) {
    let value = if columns.is_empty() {
        "*".to_string()
    } else {
        join(columns)
    };
    ("select".into(), value)
}

fn returning(columns: &[Identifier]) -> Vec<(String, String)> {
    if columns.is_empty() {
        Vec::new()
    } else {
        vec![("select".into(), join(columns))]
    }
}

fn join(columns: &[Identifier]) -> String {
    columns
        .iter()
        .map(Identifier::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn push_filters(query: &mut Vec<(String, String)>, filters: &Fields) {
    for (column, value) in filters {
        query.push((column.to_string(), filter_value(value)));
    }
}

fn filter_value(value: &Scalar) -> String {
    match value {
        Scalar::Null => "is.null".to_string(),
        Scalar::Bool(b) => format!("eq.{b}"),
        Scalar::Number(n) => format!("eq.{n}"),
        Scalar::String(s) => format!("eq.{s}"),
    }
}

fn order_value(order: &OrderBy) -> String {
    let direction = if order.ascending { "asc" } else { "desc" };
    format!("{}.{direction}", order.column)
}

fn body(fields: &Fields) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(column, value)| {
            let json = match value {
                Scalar::Null => Value::Null,
                Scalar::Bool(b) => Value::Bool(*b),
                Scalar::Number(n) => Value::Number(n.clone()),
                Scalar::String(s) => Value::String(s.clone()),
            };
            (column.to_string(), json)
        })
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;
    use serde_json::json;

    fn prepared(raw: Value) -> PreparedCall {
        prepare(&validate(&raw).unwrap())
    }

    fn pairs(call: &PreparedCall) -> Vec<(&str, &str)> {
        call.query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn select_with_everything() {
        let call = prepared(json!({
            "operation": "select",
            "table": "todos",
            "columns": ["id", "title"],
            "filters": {"done": false, "owner": "u1"},
            "orderBy": {"column": "created_at", "ascending": false},
            "limit": 10,
            "offset": 20
        }));

        assert_eq!(call.method, Method::GET);
        assert_eq!(call.path, "/rest/v1/todos");
        assert_eq!(
            pairs(&call),
            vec![
                ("select", "id,title"),
                ("done", "eq.false"),
                ("owner", "eq.u1"),
                ("order", "created_at.desc"),
                ("limit", "10"),
                ("offset", "20"),
            ]
        );
        assert!(call.body.is_none());
        assert!(call.prefer.is_none());
    }

    #[test]
    fn select_defaults_to_all_columns() {
        let call = prepared(json!({"operation": "select", "table": "todos"}));
        assert_eq!(pairs(&call), vec![("select", "*")]);
    }

    #[test]
    fn insert_sends_data_and_returning() {
        let call = prepared(json!({
            "operation": "insert",
            "table": "todos",
            "data": {"title": "write tests", "priority": 2, "note": null},
            "returning": ["id"]
        }));

        assert_eq!(call.method, Method::POST);
        assert_eq!(pairs(&call), vec![("select", "id")]);
        assert_eq!(
            call.body,
            Some(json!({"title": "write tests", "priority": 2, "note": null}))
        );
        assert_eq!(call.prefer, Some(RETURN_REPRESENTATION));
    }

    #[test]
    fn update_filters_rows() {
        let call = prepared(json!({
            "operation": "update",
            "table": "todos",
            "filters": {"id": 7, "archived_at": null},
            "data": {"done": true}
        }));

        assert_eq!(call.method, Method::PATCH);
        assert_eq!(
            pairs(&call),
            vec![("archived_at", "is.null"), ("id", "eq.7")]
        );
        assert_eq!(call.body, Some(json!({"done": true})));
    }

    #[test]
    fn delete_has_no_body() {
        let call = prepared(json!({
            "operation": "delete",
            "table": "todos",
            "filters": {"id": 7}
        }));

        assert_eq!(call.method, Method::DELETE);
        assert_eq!(pairs(&call), vec![("id", "eq.7")]);
        assert!(call.body.is_none());
        assert_eq!(call.prefer, Some(RETURN_REPRESENTATION));
    }

    #[test]
    fn mutation_filters_are_always_row_predicates() {
        for name in RESERVED_PARAMETERS {
            let mut filters = Map::new();
            filters.insert((*name).to_string(), json!(1));
            let delete = json!({"operation": "delete", "table": "users", "filters": filters});
            let update = json!({
                "operation": "update",
                "table": "users",
                "filters": filters,
                "data": {"a": 1}
            });
            assert!(validate(&delete).is_err(), "delete filtered on {name}");
            assert!(validate(&update).is_err(), "update filtered on {name}");
        }

        let call = prepared(json!({
            "operation": "delete",
            "table": "users",
            "filters": {"id": 1, "owner": "u1"}
        }));
        let predicates: Vec<_> = call
            .query
            .iter()
            .filter(|(name, _)| !is_reserved_parameter(name))
            .collect();
        assert_eq!(predicates.len(), 2);
    }
}
