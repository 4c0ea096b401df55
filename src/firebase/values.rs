// Firebase MCP Gateway - Firestore Typed Values
//
// Firestore's REST API wraps every field in a typed envelope
// ({"stringValue": ...}, {"integerValue": "42"}, ...). This module converts
// between plain JSON and that representation in both directions. Integers
// travel as strings on the wire.

use crate::error::GateError;
use serde_json::{json, Map, Value};

/// Plain JSON value to the Firestore typed envelope.
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({"integerValue": i.to_string()})
            } else {
                json!({"doubleValue": n.as_f64().unwrap_or(0.0)})
            }
        }
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(to_firestore_value).collect();
            json!({"arrayValue": {"values": values}})
        }
        Value::Object(map) => json!({"mapValue": {"fields": to_firestore_fields(map)}}),
    }
}

/// Plain JSON object to a Firestore `fields` map.
pub fn to_firestore_fields(map: &Map<String, Value>) -> Value {
    let mut fields = Map::new();
    for (k, v) in map {
        fields.insert(k.clone(), to_firestore_value(v));
    }
    Value::Object(fields)
}

/// Firestore typed envelope back to plain JSON. Unknown wrappers (timestamps,
/// references, geo points) pass through as their inner string form.
pub fn from_firestore_value(value: &Value) -> Value {
    let obj = match value.as_object() {
        Some(o) => o,
        None => return value.clone(),
    };
    if obj.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(b) = obj.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = obj.get("integerValue") {
        // Wire form is a decimal string.
        if let Some(s) = i.as_str() {
            if let Ok(n) = s.parse::<i64>() {
                return json!(n);
            }
        }
        return i.clone();
    }
    if let Some(d) = obj.get("doubleValue") {
        return d.clone();
    }
    if let Some(s) = obj.get("stringValue") {
        return s.clone();
    }
    if let Some(ts) = obj.get("timestampValue") {
        return ts.clone();
    }
    if let Some(r) = obj.get("referenceValue") {
        return r.clone();
    }
    if let Some(arr) = obj.get("arrayValue") {
        let items = arr
            .get("values")
            .and_then(|v| v.as_array())
            .map(|vs| vs.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(m) = obj.get("mapValue") {
        return from_firestore_fields(m.get("fields").unwrap_or(&Value::Null));
    }
    value.clone()
}

/// Firestore `fields` map back to a plain JSON object.
pub fn from_firestore_fields(fields: &Value) -> Value {
    let mut out = Map::new();
    if let Some(map) = fields.as_object() {
        for (k, v) in map {
            out.insert(k.clone(), from_firestore_value(v));
        }
    }
    Value::Object(out)
}

/// Flatten a full Firestore document resource into {id, path, data,
/// createTime?, updateTime?}. The resource `name` is the full path
/// "projects/{p}/databases/(default)/documents/{path}".
pub fn document_to_json(doc: &Value) -> Result<Value, GateError> {
    let name = doc
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| GateError::internal("Firestore document missing 'name'"))?;
    let path = name.split("/documents/").nth(1).unwrap_or(name);
    let id = path.rsplit('/').next().unwrap_or(path);

    let mut out = Map::new();
    out.insert("id".to_string(), json!(id));
    out.insert("path".to_string(), json!(path));
    out.insert(
        "data".to_string(),
        from_firestore_fields(doc.get("fields").unwrap_or(&Value::Null)),
    );
    if let Some(t) = doc.get("createTime") {
        out.insert("createTime".to_string(), t.clone());
    }
    if let Some(t) = doc.get("updateTime") {
        out.insert("updateTime".to_string(), t.clone());
    }
    Ok(Value::Object(out))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        for v in [json!(null), json!(true), json!(42), json!(2.5), json!("hi")] {
            assert_eq!(from_firestore_value(&to_firestore_value(&v)), v);
        }
    }

    #[test]
    fn integers_travel_as_strings() {
        let wire = to_firestore_value(&json!(42));
        assert_eq!(wire, json!({"integerValue": "42"}));
        assert_eq!(from_firestore_value(&wire), json!(42));
    }

    #[test]
    fn nested_structures_round_trip() {
        let v = json!({
            "name": "Ada",
            "tags": ["a", "b", 3],
            "profile": {"age": 36, "active": true, "note": null}
        });
        let wire = to_firestore_value(&v);
        assert_eq!(from_firestore_value(&wire), v);
    }

    #[test]
    fn document_flattening() {
        let doc = json!({
            "name": "projects/p1/databases/(default)/documents/users/u1",
            "fields": {"name": {"stringValue": "Ada"}},
            "createTime": "2026-01-01T00:00:00Z",
            "updateTime": "2026-01-02T00:00:00Z"
        });
        let flat = document_to_json(&doc).unwrap();
        assert_eq!(flat["id"], json!("u1"));
        assert_eq!(flat["path"], json!("users/u1"));
        assert_eq!(flat["data"]["name"], json!("Ada"));
        assert_eq!(flat["createTime"], json!("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn document_without_name_is_internal_error() {
        let err = document_to_json(&json!({"fields": {}})).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Internal);
    }

    #[test]
    fn timestamps_pass_through_on_decode() {
        let v = json!({"timestampValue": "2026-01-01T00:00:00Z"});
        assert_eq!(from_firestore_value(&v), json!("2026-01-01T00:00:00Z"));
    }
}
