// Firebase MCP Gateway - Argument Validation
//
// Structural checks applied before any rate-limit or delegate call.
// All synchronous and side-effect free. Independent of whatever validation
// the Firebase platform applies on its side.

use crate::error::GateError;
use serde_json::Value;

/// Operators Firestore accepts in a where clause.
pub const WHERE_OPERATORS: &[&str] = &[
    "<", "<=", "==", "!=", ">=", ">",
    "array-contains", "array-contains-any", "in", "not-in",
];

/// Firestore commits at most 500 writes atomically.
pub const MAX_BATCH_OPERATIONS: usize = 500;

/// Firestore rejects maps/arrays nested deeper than 20 levels.
pub const MAX_DATA_DEPTH: usize = 20;

// ============================================================================
// SCHEMA CHECKS — raw arguments vs the tool's declared input schema
// ============================================================================

/// Validate `args` against a tool input schema of the MCP shape
/// {"type":"object","properties":{...},"required":[...]}. Checks required
/// presence and primitive JSON types; anything deeper is the per-field
/// validators' job.
pub fn validate_against_schema(schema: &Value, args: &Value) -> Result<(), GateError> {
    let obj = args
        .as_object()
        .ok_or_else(|| GateError::validation("Tool arguments must be a JSON object"))?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required {
            let name = field.as_str().unwrap_or("");
            if !obj.contains_key(name) || obj[name].is_null() {
                return Err(GateError::validation(format!(
                    "Missing required field '{}'",
                    name
                )));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, value) in obj {
            let Some(prop) = props.get(name) else {
                return Err(GateError::validation(format!("Unknown field '{}'", name)));
            };
            let expected = prop.get("type").and_then(|t| t.as_str()).unwrap_or("");
            if !value.is_null() && !json_type_matches(expected, value) {
                return Err(GateError::validation(format!(
                    "Field '{}' must be of type {}",
                    name, expected
                )));
            }
        }
    }

    Ok(())
}

fn json_type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        // Unconstrained property
        _ => true,
    }
}

// ============================================================================
// PATH SHAPE
// ============================================================================

fn split_segments(path: &str) -> Result<Vec<&str>, GateError> {
    if path.is_empty() {
        return Err(GateError::validation("Path must be a non-empty string"));
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(GateError::validation(format!(
            "Path '{}' contains an empty segment",
            path
        )));
    }
    Ok(segments)
}

/// Collection paths have an odd number of slash-delimited segments
/// ("users", "users/u1/posts").
pub fn validate_collection_path(path: &str) -> Result<(), GateError> {
    let segments = split_segments(path)?;
    if segments.len() % 2 == 0 {
        return Err(GateError::validation(format!(
            "'{}' is not a collection path: expected an odd number of segments, got {}",
            path,
            segments.len()
        )));
    }
    Ok(())
}

/// Document paths have an even number of segments ("users/u1").
pub fn validate_document_path(path: &str) -> Result<(), GateError> {
    let segments = split_segments(path)?;
    if segments.len() % 2 != 0 {
        return Err(GateError::validation(format!(
            "'{}' is not a document path: expected an even number of segments, got {}",
            path,
            segments.len()
        )));
    }
    Ok(())
}

// ============================================================================
// QUERY CLAUSES
// ============================================================================

/// Each where clause is a 3-tuple [field, operator, value].
pub fn validate_where_clauses(filters: &Value) -> Result<(), GateError> {
    let list = filters.as_array().ok_or_else(|| {
        GateError::validation("'where' must be an array of [field, operator, value] triples")
    })?;

    for (i, clause) in list.iter().enumerate() {
        let triple = clause.as_array().filter(|t| t.len() == 3).ok_or_else(|| {
            GateError::validation(format!(
                "where clause {} must be a [field, operator, value] triple",
                i
            ))
        })?;
        let field = triple[0].as_str().unwrap_or("");
        if field.is_empty() {
            return Err(GateError::validation(format!(
                "where clause {}: field must be a non-empty string",
                i
            )));
        }
        let op = triple[1].as_str().unwrap_or("");
        if !WHERE_OPERATORS.contains(&op) {
            return Err(GateError::validation(format!(
                "where clause {}: operator '{}' is not one of {}",
                i,
                op,
                WHERE_OPERATORS.join(", ")
            )));
        }
        if triple[2].is_null() {
            return Err(GateError::validation(format!(
                "where clause {}: value must not be null",
                i
            )));
        }
    }
    Ok(())
}

/// Each order-by clause is a [field, direction?] pair with direction
/// asc|desc (default asc).
pub fn validate_order_by(order_by: &Value) -> Result<(), GateError> {
    let list = order_by
        .as_array()
        .ok_or_else(|| GateError::validation("'order_by' must be an array"))?;

    for (i, clause) in list.iter().enumerate() {
        let pair = clause
            .as_array()
            .filter(|p| p.len() == 1 || p.len() == 2)
            .ok_or_else(|| {
                GateError::validation(format!(
                    "order_by clause {} must be a [field, direction?] pair",
                    i
                ))
            })?;
        let field = pair[0].as_str().unwrap_or("");
        if field.is_empty() {
            return Err(GateError::validation(format!(
                "order_by clause {}: field must be a non-empty string",
                i
            )));
        }
        let direction = pair.get(1).and_then(|d| d.as_str()).unwrap_or("asc");
        if direction != "asc" && direction != "desc" {
            return Err(GateError::validation(format!(
                "order_by clause {}: direction must be 'asc' or 'desc', got '{}'",
                i, direction
            )));
        }
    }
    Ok(())
}

/// Limit, when present, is a non-negative integer.
pub fn validate_limit(limit: &Value) -> Result<(), GateError> {
    match limit.as_i64() {
        Some(n) if n >= 0 => Ok(()),
        Some(n) => Err(GateError::validation(format!(
            "'limit' must be non-negative, got {}",
            n
        ))),
        None => Err(GateError::validation("'limit' must be a non-negative integer")),
    }
}

// ============================================================================
// DOCUMENT DATA
// ============================================================================

/// Recursively validate document data. Leaves are restricted to string,
/// number, boolean, and null; containers to arrays and plain objects. Field
/// names must be non-empty and nesting bounded by the platform ceiling.
/// Violations report the offending dotted path.
pub fn validate_document_data(data: &Value) -> Result<(), GateError> {
    let obj = data
        .as_object()
        .ok_or_else(|| GateError::validation("Document data must be a JSON object"))?;
    if obj.is_empty() {
        return Err(GateError::validation("Document data must not be empty"));
    }
    validate_value(data, "", 0)
}

fn validate_value(value: &Value, path: &str, depth: usize) -> Result<(), GateError> {
    if depth > MAX_DATA_DEPTH {
        return Err(GateError::validation(format!(
            "Field '{}' exceeds the maximum nesting depth of {}",
            path, MAX_DATA_DEPTH
        )));
    }
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if key.is_empty() {
                    return Err(GateError::validation(format!(
                        "Empty field name at '{}'",
                        if path.is_empty() { "(root)" } else { path }
                    )));
                }
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                validate_value(nested, &child, depth + 1)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let child = format!("{}[{}]", path, i);
                validate_value(item, &child, depth + 1)?;
            }
            Ok(())
        }
        // Primitive leaves: string, number, boolean, null.
        _ => Ok(()),
    }
}

// ============================================================================
// BATCH OPERATIONS
// ============================================================================

/// Validate a batch_write operations array: non-empty, within the atomic
/// commit ceiling, every entry well-formed.
pub fn validate_batch_operations(operations: &Value) -> Result<(), GateError> {
    let ops = operations
        .as_array()
        .ok_or_else(|| GateError::validation("'operations' must be an array"))?;
    if ops.is_empty() {
        return Err(GateError::validation("'operations' must not be empty"));
    }
    if ops.len() > MAX_BATCH_OPERATIONS {
        return Err(GateError::validation(format!(
            "Batch contains {} operations; the maximum is {}",
            ops.len(),
            MAX_BATCH_OPERATIONS
        )));
    }

    for (i, op) in ops.iter().enumerate() {
        let kind = op.get("type").and_then(|t| t.as_str()).unwrap_or("");
        if !matches!(kind, "set" | "update" | "delete") {
            return Err(GateError::validation(format!(
                "operation {}: type must be one of set, update, delete",
                i
            )));
        }
        let path = op.get("path").and_then(|p| p.as_str()).unwrap_or("");
        validate_document_path(path).map_err(|e| e.with_context(&format!("operation {}", i)))?;
        if kind != "delete" {
            let data = op.get("data").unwrap_or(&Value::Null);
            validate_document_data(data)
                .map_err(|e| e.with_context(&format!("operation {}", i)))?;
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
