//! Query validation.
//!
//! [`validate()`] turns an untyped JSON body into a [`QueryRequest`]. It is
//! pure: no I/O, and the same input always gets the same answer. Checks run
//! in a fixed order so the reported error is deterministic:
//!
//! 1. `operation` is one of the four literals
//! 2. no field outside the operation's vocabulary
//! 3. `table` passes the identifier whitelist
//! 4. every column, filter key, data key, returning entry and order column
//!    passes the whitelist, and no filter key is a reserved PostgREST
//!    parameter name
//! 5. update/delete carry non-empty `filters`
//! 6. insert/update carry non-empty `data`
//! 7. `limit` is within `1..=MAX_LIMIT`, `offset` is non-negative
//! 8. filter and data values are scalars

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::request::{
    DeleteQuery, Fields, Identifier, InsertQuery, Operation, OrderBy, QueryRequest, Scalar,
    SelectQuery, UpdateQuery,
};
use crate::translate::is_reserved_parameter;

/// Largest accepted `limit`.
pub const MAX_LIMIT: u64 = 1000;

const SELECT_FIELDS: &[&str] = &[
    "operation", "table", "columns", "select", "filters", "orderBy", "order_by", "limit",
    "offset",
];
const INSERT_FIELDS: &[&str] = &["operation", "table", "data", "returning"];
const UPDATE_FIELDS: &[&str] = &["operation", "table", "filters", "data", "returning"];
const DELETE_FIELDS: &[&str] = &["operation", "table", "filters", "returning"];

type Result<T> = std::result::Result<T, ValidationError>;

/// Validate a raw request body.
///
/// # Errors
///
/// Returns the first rule the body breaks; see the module docs for the order.
pub fn validate(raw: &Value) -> Result<QueryRequest> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ValidationError::Malformed("request must be a JSON object".into()))?;

    let operation = parse_operation(obj)?;
    reject_unexpected(obj, operation)?;
    let table = parse_table(obj)?;

    // Identifiers everywhere, before any semantic rule.
    let columns = parse_columns(obj)?;
    let filters = field_entries(obj, "filters")?;
    reject_reserved_filters(filters.as_deref())?;
    let data = field_entries(obj, "data")?;
    let returning = identifier_list(obj, "returning")?.unwrap_or_default();
    let order_by = parse_order_by(obj)?;

    if matches!(operation, Operation::Update | Operation::Delete)
        && filters.as_ref().map_or(true, Vec::is_empty)
    {
        return Err(ValidationError::MissingFilter { operation });
    }
    if matches!(operation, Operation::Insert | Operation::Update)
        && data.as_ref().map_or(true, Vec::is_empty)
    {
        return Err(ValidationError::MissingData { operation });
    }

    let limit = parse_limit(obj)?;
    let offset = parse_offset(obj)?;

    let filters = scalars("filters", filters.unwrap_or_default())?;
    let data = scalars("data", data.unwrap_or_default())?;

    Ok(match operation {
        Operation::Select => QueryRequest::Select(SelectQuery {
            table,
            columns,
            filters,
            order_by,
            limit,
            offset,
        }),
        Operation::Insert => QueryRequest::Insert(InsertQuery {
            table,
            data,
            returning,
        }),
        Operation::Update => QueryRequest::Update(UpdateQuery {
            table,
            filters,
            data,
            returning,
        }),
        Operation::Delete => QueryRequest::Delete(DeleteQuery {
            table,
            filters,
            returning,
        }),
    })
}

/// Look up a field, treating JSON `null` as absent.
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn parse_operation(obj: &Map<String, Value>) -> Result<Operation> {
    match obj.get("operation") {
        Some(Value::String(s)) => Operation::from_literal(s)
            .ok_or_else(|| ValidationError::UnsupportedOperation(s.clone())),
        Some(other) => Err(ValidationError::UnsupportedOperation(other.to_string())),
        None => Err(ValidationError::UnsupportedOperation("missing".into())),
    }
}

fn reject_unexpected(obj: &Map<String, Value>, operation: Operation) -> Result<()> {
    let allowed = match operation {
        Operation::Select => SELECT_FIELDS,
        Operation::Insert => INSERT_FIELDS,
        Operation::Update => UPDATE_FIELDS,
        Operation::Delete => DELETE_FIELDS,
    };
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(field) => Err(ValidationError::UnexpectedField {
            field: field.clone(),
            operation,
        }),
        None => Ok(()),
    }
}

fn identifier(location: &'static str, value: &str) -> Result<Identifier> {
    Identifier::parse(value).ok_or_else(|| ValidationError::InvalidIdentifier {
        location,
        value: value.to_string(),
    })
}

fn parse_table(obj: &Map<String, Value>) -> Result<Identifier> {
    match obj.get("table") {
        Some(Value::String(s)) => identifier("table", s),
        Some(other) => Err(ValidationError::InvalidIdentifier {
            location: "table",
            value: other.to_string(),
        }),
        None => Err(ValidationError::InvalidIdentifier {
            location: "table",
            value: String::new(),
        }),
    }
}

fn identifier_list(obj: &Map<String, Value>, name: &'static str) -> Result<Option<Vec<Identifier>>> {
    let Some(value) = field(obj, name) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::Malformed(format!("{name} must be an array of names")))?;

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => identifier(name, s),
            _ => Err(ValidationError::Malformed(format!(
                "{name} must contain only strings"
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn parse_columns(obj: &Map<String, Value>) -> Result<Vec<Identifier>> {
    let columns = identifier_list(obj, "columns")?;
    let select = identifier_list(obj, "select")?;
    match (columns, select) {
        (Some(_), Some(_)) => Err(ValidationError::Malformed(
            "columns and select are aliases; give only one".into(),
        )),
        (Some(list), None) | (None, Some(list)) => Ok(list),
        (None, None) => Ok(Vec::new()),
    }
}

/// Whitelist-check the keys of a mapping; values are checked later.
fn field_entries<'a>(
    obj: &'a Map<String, Value>,
    name: &'static str,
) -> Result<Option<Vec<(Identifier, &'a Value)>>> {
    let Some(value) = field(obj, name) else {
        return Ok(None);
    };
    let map = value
        .as_object()
        .ok_or_else(|| ValidationError::Malformed(format!("{name} must be an object")))?;

    map.iter()
        .map(|(key, value)| Ok((identifier(name, key)?, value)))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn reject_reserved_filters(filters: Option<&[(Identifier, &Value)]>) -> Result<()> {
    match filters
        .unwrap_or_default()
        .iter()
        .find(|(key, _)| is_reserved_parameter(key.as_str()))
    {
        Some((key, _)) => Err(ValidationError::InvalidIdentifier {
            location: "filters",
            value: key.to_string(),
        }),
        None => Ok(()),
    }
}

fn parse_order_by(obj: &Map<String, Value>) -> Result<Option<OrderBy>> {
    let value = match (field(obj, "orderBy"), field(obj, "order_by")) {
        (Some(_), Some(_)) => {
            return Err(ValidationError::Malformed(
                "orderBy and order_by are aliases; give only one".into(),
            ))
        }
        (Some(v), None) | (None, Some(v)) => v,
        (None, None) => return Ok(None),
    };

    let spec = match value {
        Value::String(column) => {
            return Ok(Some(OrderBy {
                column: identifier("orderBy", column)?,
                ascending: true,
            }))
        }
        Value::Object(spec) => spec,
        _ => {
            return Err(ValidationError::Malformed(
                "orderBy must be a column name or an object".into(),
            ))
        }
    };

    if let Some(key) = spec
        .keys()
        .find(|k| !matches!(k.as_str(), "column" | "ascending" | "direction"))
    {
        return Err(ValidationError::Malformed(format!(
            "unknown orderBy field {key:?}"
        )));
    }

    let column = match spec.get("column") {
        Some(Value::String(s)) => identifier("orderBy", s)?,
        _ => {
            return Err(ValidationError::Malformed(
                "orderBy.column must be a string".into(),
            ))
        }
    };

    let ascending = match (spec.get("ascending"), spec.get("direction")) {
        (Some(_), Some(_)) => {
            return Err(ValidationError::Malformed(
                "give either orderBy.ascending or orderBy.direction".into(),
            ))
        }
        (Some(Value::Bool(b)), None) => *b,
        (None, Some(Value::String(d))) if d.eq_ignore_ascii_case("asc") => true,
        (None, Some(Value::String(d))) if d.eq_ignore_ascii_case("desc") => false,
        (None, None) => true,
        _ => {
            return Err(ValidationError::Malformed(
                "orderBy.ascending must be a boolean and orderBy.direction asc or desc".into(),
            ))
        }
    };

    Ok(Some(OrderBy { column, ascending }))
}

fn parse_limit(obj: &Map<String, Value>) -> Result<Option<u64>> {
    let Some(value) = field(obj, "limit") else {
        return Ok(None);
    };
    // Anything numerically above the cap is over it, whatever its encoding.
    #[allow(clippy::cast_precision_loss)]
    let over_cap = value.as_f64().is_some_and(|n| n > MAX_LIMIT as f64);
    if over_cap {
        return Err(ValidationError::LimitExceeded {
            limit: value.as_u64().unwrap_or(u64::MAX),
            max: MAX_LIMIT,
        });
    }
    match value.as_u64() {
        Some(0) | None => Err(ValidationError::Malformed(
            "limit must be a positive integer".into(),
        )),
        Some(limit) if limit > MAX_LIMIT => Err(ValidationError::LimitExceeded {
            limit,
            max: MAX_LIMIT,
        }),
        Some(limit) => Ok(Some(limit)),
    }
}

fn parse_offset(obj: &Map<String, Value>) -> Result<Option<u64>> {
    let Some(value) = field(obj, "offset") else {
        return Ok(None);
    };
    value.as_u64().map(Some).ok_or_else(|| {
        ValidationError::Malformed("offset must be a non-negative integer".into())
    })
}

fn scalars(location: &'static str, entries: Vec<(Identifier, &Value)>) -> Result<Fields> {
    entries
        .into_iter()
        .map(|(key, value)| match Scalar::from_json(value) {
            Some(scalar) => Ok((key, scalar)),
            None => Err(ValidationError::InvalidValueType {
                location,
                field: key.to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn err(raw: Value) -> ValidationError {
        validate(&raw).unwrap_err()
    }

    #[test]
    fn delete_requires_filters() {
        assert!(matches!(
            err(json!({"operation": "delete", "table": "users"})),
            ValidationError::MissingFilter {
                operation: Operation::Delete
            }
        ));
        assert!(matches!(
            err(json!({"operation": "delete", "table": "users", "filters": {}})),
            ValidationError::MissingFilter { .. }
        ));

        let ok = validate(&json!({"operation": "delete", "table": "users", "filters": {"id": 5}}))
            .unwrap();
        let QueryRequest::Delete(delete) = ok else {
            panic!("expected delete");
        };
        assert_eq!(delete.filters.len(), 1);
    }

    #[test]
    fn update_requires_filters_and_data() {
        assert!(matches!(
            err(json!({"operation": "update", "table": "users", "data": {"name": "a"}})),
            ValidationError::MissingFilter { .. }
        ));
        assert!(matches!(
            err(json!({"operation": "update", "table": "users", "filters": {"id": 1}})),
            ValidationError::MissingData {
                operation: Operation::Update
            }
        ));
        assert!(matches!(
            err(json!({"operation": "insert", "table": "users"})),
            ValidationError::MissingData {
                operation: Operation::Insert
            }
        ));
    }

    #[test]
    fn table_must_be_an_identifier() {
        assert!(matches!(
            err(json!({"operation": "select", "table": "users; DROP TABLE x"})),
            ValidationError::InvalidIdentifier {
                location: "table",
                ..
            }
        ));
        assert!(matches!(
            err(json!({"operation": "select"})),
            ValidationError::InvalidIdentifier { .. }
        ));
        assert!(validate(&json!({"operation": "select", "table": "users"})).is_ok());
    }

    #[test]
    fn every_identifier_is_checked() {
        let cases = [
            json!({"operation": "select", "table": "t", "columns": ["ok", "bad col"]}),
            json!({"operation": "select", "table": "t", "select": ["x)"]}),
            json!({"operation": "select", "table": "t", "filters": {"a=b": 1}}),
            json!({"operation": "insert", "table": "t", "data": {"1x": 1}}),
            json!({"operation": "insert", "table": "t", "data": {"a": 1}, "returning": ["*"]}),
            json!({"operation": "select", "table": "t", "orderBy": {"column": "a;b"}}),
        ];
        for case in cases {
            assert!(
                matches!(err(case.clone()), ValidationError::InvalidIdentifier { .. }),
                "{case}"
            );
        }
    }

    #[test]
    fn operation_must_be_one_of_four() {
        assert!(matches!(
            err(json!({"operation": "upsert", "table": "t"})),
            ValidationError::UnsupportedOperation(op) if op == "upsert"
        ));
        assert!(matches!(
            err(json!({"table": "t"})),
            ValidationError::UnsupportedOperation(_)
        ));
        assert!(matches!(
            err(json!({"operation": 3, "table": "t"})),
            ValidationError::UnsupportedOperation(_)
        ));
    }

    #[test]
    fn limit_is_rejected_not_clamped() {
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "limit": 1001})),
            ValidationError::LimitExceeded {
                limit: 1001,
                max: 1000
            }
        ));
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "limit": 0})),
            ValidationError::Malformed(_)
        ));
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "offset": -1})),
            ValidationError::Malformed(_)
        ));

        let QueryRequest::Select(select) =
            validate(&json!({"operation": "select", "table": "t", "limit": 1000, "offset": 20}))
                .unwrap()
        else {
            panic!("expected select");
        };
        assert_eq!(select.limit, Some(1000));
        assert_eq!(select.offset, Some(20));
    }

    #[test]
    fn oversized_limit_is_always_limit_exceeded() {
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "limit": 1e6})),
            ValidationError::LimitExceeded { max: 1000, .. }
        ));
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "limit": 1e30})),
            ValidationError::LimitExceeded {
                limit: u64::MAX,
                ..
            }
        ));
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "limit": 2.5})),
            ValidationError::Malformed(_)
        ));
    }

    #[test]
    fn reserved_parameter_names_are_not_filters() {
        for name in crate::translate::RESERVED_PARAMETERS {
            let mut filters = Map::new();
            filters.insert((*name).to_string(), json!(1));
            assert!(
                matches!(
                    err(json!({"operation": "delete", "table": "users", "filters": filters})),
                    ValidationError::InvalidIdentifier {
                        location: "filters",
                        ..
                    }
                ),
                "{name}"
            );
        }
        assert!(matches!(
            err(json!({"operation": "select", "table": "users", "filters": {"Order": 1}})),
            ValidationError::InvalidIdentifier { .. }
        ));

        // Reserved names stay fine as data keys and projected columns.
        assert!(validate(&json!({
            "operation": "update",
            "table": "users",
            "filters": {"id": 1},
            "data": {"order": 2},
            "returning": ["limit"]
        }))
        .is_ok());
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(matches!(
            err(json!({"operation": "insert", "table": "t", "data": {"tags": ["a"]}})),
            ValidationError::InvalidValueType {
                location: "data",
                ..
            }
        ));
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "filters": {"meta": {"a": 1}}})),
            ValidationError::InvalidValueType {
                location: "filters",
                ..
            }
        ));
    }

    #[test]
    fn fields_must_apply_to_the_operation() {
        assert!(matches!(
            err(json!({"operation": "insert", "table": "t", "data": {"a": 1}, "filters": {"id": 1}})),
            ValidationError::UnexpectedField { field, .. } if field == "filters"
        ));
        assert!(matches!(
            err(json!({"operation": "delete", "table": "t", "filters": {"id": 1}, "limit": 1})),
            ValidationError::UnexpectedField { .. }
        ));
        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "sql": "DROP"})),
            ValidationError::UnexpectedField { .. }
        ));
    }

    #[test]
    fn rules_apply_in_order() {
        // Bad table outranks the missing filter.
        assert!(matches!(
            err(json!({"operation": "delete", "table": "bad table"})),
            ValidationError::InvalidIdentifier { .. }
        ));
        // Bad filter key outranks the missing data.
        assert!(matches!(
            err(json!({"operation": "update", "table": "t", "filters": {"bad key": 1}})),
            ValidationError::InvalidIdentifier { .. }
        ));
    }

    #[test]
    fn order_by_forms() {
        let parse = |order: Value| {
            let QueryRequest::Select(select) =
                validate(&json!({"operation": "select", "table": "t", "orderBy": order})).unwrap()
            else {
                panic!("expected select");
            };
            select.order_by.unwrap()
        };

        assert!(!parse(json!({"column": "created_at", "ascending": false})).ascending);
        assert!(!parse(json!({"column": "created_at", "direction": "desc"})).ascending);
        assert!(parse(json!({"column": "created_at"})).ascending);
        assert_eq!(parse(json!("name")).column.as_str(), "name");

        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "orderBy": {"column": "a", "direction": "up"}})),
            ValidationError::Malformed(_)
        ));
    }

    #[test]
    fn columns_and_select_are_aliases() {
        let QueryRequest::Select(select) =
            validate(&json!({"operation": "select", "table": "t", "select": ["a", "b"]})).unwrap()
        else {
            panic!("expected select");
        };
        assert_eq!(select.columns.len(), 2);

        assert!(matches!(
            err(json!({"operation": "select", "table": "t", "select": ["a"], "columns": ["b"]})),
            ValidationError::Malformed(_)
        ));
    }

    #[test]
    fn validation_is_deterministic() {
        let raw = json!({"operation": "update", "table": "t", "filters": {"id": 1}, "data": {"n": null}});
        assert_eq!(validate(&raw), validate(&raw));
    }
}
