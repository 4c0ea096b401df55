// Firebase MCP Gateway - Firestore REST
//
// Firestore v1 REST calls against the (default) database. Document payloads
// cross this boundary as plain JSON; the typed-value wrapping stays here.

use super::values::{document_to_json, to_firestore_fields, to_firestore_value};
use super::{encode_component, RestBackend};
use crate::error::GateError;
use reqwest::Method;
use serde_json::{json, Map, Value};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

impl RestBackend {
    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            FIRESTORE_BASE, self.project_id
        )
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}/{}",
            self.project_id, collection, id
        )
    }

    pub(crate) fn firestore_get(&self, collection: &str, id: &str) -> Result<Value, GateError> {
        let url = format!("{}/{}/{}", self.documents_root(), collection, id);
        let doc = self
            .send_json(self.authorized(Method::GET, &url)?, "firestore.get")
            .map_err(|e| {
                if e.kind == crate::error::ErrorKind::NotFound {
                    GateError::not_found(format!(
                        "Document '{}' not found in collection '{}'",
                        id, collection
                    ))
                } else {
                    e
                }
            })?;
        document_to_json(&doc)
    }

    pub(crate) fn firestore_create(
        &self,
        collection: &str,
        data: &Value,
    ) -> Result<Value, GateError> {
        let url = format!("{}/{}", self.documents_root(), collection);
        let body = json!({"fields": fields_of(data)?});
        let doc = self.send_json(
            self.authorized(Method::POST, &url)?.json(&body),
            "firestore.create",
        )?;
        document_to_json(&doc)
    }

    pub(crate) fn firestore_set(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
        merge: bool,
    ) -> Result<Value, GateError> {
        let mut url = format!("{}/{}/{}", self.documents_root(), collection, id);
        if merge {
            // Mask restricts the write to the supplied fields.
            url.push_str(&mask_query(data, '?')?);
        }
        let body = json!({"fields": fields_of(data)?});
        let doc = self.send_json(
            self.authorized(Method::PATCH, &url)?.json(&body),
            "firestore.set",
        )?;
        document_to_json(&doc)
    }

    pub(crate) fn firestore_update(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<Value, GateError> {
        // Unlike set, update requires the document to exist.
        let mut url = format!(
            "{}/{}/{}?currentDocument.exists=true",
            self.documents_root(),
            collection,
            id
        );
        url.push_str(&mask_query(data, '&')?);
        let body = json!({"fields": fields_of(data)?});
        let doc = self
            .send_json(
                self.authorized(Method::PATCH, &url)?.json(&body),
                "firestore.update",
            )
            .map_err(|e| {
                if e.kind == crate::error::ErrorKind::NotFound {
                    GateError::not_found(format!(
                        "Document '{}' not found in collection '{}'",
                        id, collection
                    ))
                } else {
                    e
                }
            })?;
        document_to_json(&doc)
    }

    pub(crate) fn firestore_delete(&self, collection: &str, id: &str) -> Result<Value, GateError> {
        let url = format!("{}/{}/{}", self.documents_root(), collection, id);
        self.send_json(self.authorized(Method::DELETE, &url)?, "firestore.delete")?;
        Ok(json!({"deleted": format!("{}/{}", collection, id)}))
    }

    pub(crate) fn firestore_list(
        &self,
        collection: &str,
        filters: &Value,
        order_by: &Value,
        limit: Option<i64>,
    ) -> Result<Value, GateError> {
        // Nested paths query the trailing collection under its parent doc.
        let (parent_suffix, collection_id) = match collection.rfind('/') {
            Some(idx) => (format!("/{}", &collection[..idx]), &collection[idx + 1..]),
            None => (String::new(), collection),
        };
        let query = structured_query(collection_id, false, filters, order_by, limit)?;
        self.run_query(&parent_suffix, query)
    }

    pub(crate) fn firestore_query_group(
        &self,
        collection_id: &str,
        filters: &Value,
        order_by: &Value,
        limit: Option<i64>,
    ) -> Result<Value, GateError> {
        let query = structured_query(collection_id, true, filters, order_by, limit)?;
        self.run_query("", query)
    }

    fn run_query(&self, parent_suffix: &str, query: Value) -> Result<Value, GateError> {
        let url = format!("{}{}:runQuery", self.documents_root(), parent_suffix);
        let body = json!({"structuredQuery": query});
        let rows = self.send_json(
            self.authorized(Method::POST, &url)?.json(&body),
            "firestore.query",
        )?;

        // Response rows without a "document" key are read-time markers.
        let mut documents = Vec::new();
        if let Some(rows) = rows.as_array() {
            for row in rows {
                if let Some(doc) = row.get("document") {
                    documents.push(document_to_json(doc)?);
                }
            }
        }
        Ok(json!({"count": documents.len(), "documents": documents}))
    }

    pub(crate) fn firestore_list_collections(
        &self,
        parent_document: Option<&str>,
    ) -> Result<Value, GateError> {
        let suffix = parent_document.map(|p| format!("/{}", p)).unwrap_or_default();
        let url = format!("{}{}:listCollectionIds", self.documents_root(), suffix);

        let mut ids: Vec<Value> = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({"pageSize": 300});
            if let Some(t) = &page_token {
                body["pageToken"] = json!(t);
            }
            let page = self.send_json(
                self.authorized(Method::POST, &url)?.json(&body),
                "firestore.listCollections",
            )?;
            if let Some(batch) = page.get("collectionIds").and_then(|v| v.as_array()) {
                ids.extend(batch.iter().cloned());
            }
            match page.get("nextPageToken").and_then(|t| t.as_str()) {
                Some(t) if !t.is_empty() => page_token = Some(t.to_string()),
                _ => break,
            }
        }
        Ok(json!({"collections": ids}))
    }

    pub(crate) fn firestore_batch_write(&self, operations: &Value) -> Result<Value, GateError> {
        let ops = operations
            .as_array()
            .ok_or_else(|| GateError::validation("operations must be an array"))?;

        let mut writes = Vec::with_capacity(ops.len());
        for op in ops {
            writes.push(self.write_of(op)?);
        }

        // :commit applies all writes atomically.
        let url = format!("{}:commit", self.documents_root());
        let body = json!({"writes": writes});
        let result = self.send_json(
            self.authorized(Method::POST, &url)?.json(&body),
            "firestore.batchWrite",
        )?;
        Ok(json!({
            "applied": writes.len(),
            "commitTime": result.get("commitTime").cloned().unwrap_or(Value::Null),
        }))
    }

    fn write_of(&self, op: &Value) -> Result<Value, GateError> {
        let op_type = op.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let path = op.get("path").and_then(|p| p.as_str()).unwrap_or("");
        let (collection, id) = path
            .rsplit_once('/')
            .ok_or_else(|| GateError::validation(format!("Invalid document path '{}'", path)))?;
        let name = self.document_name(collection, id);

        match op_type {
            "set" => Ok(json!({
                "update": {
                    "name": name,
                    "fields": fields_of(op.get("data").unwrap_or(&Value::Null))?,
                }
            })),
            "update" => {
                let data = op.get("data").unwrap_or(&Value::Null);
                Ok(json!({
                    "update": {"name": name, "fields": fields_of(data)?},
                    "updateMask": {"fieldPaths": top_level_keys(data)?},
                    "currentDocument": {"exists": true},
                }))
            }
            "delete" => Ok(json!({"delete": name})),
            other => Err(GateError::validation(format!(
                "Unknown batch operation type '{}'",
                other
            ))),
        }
    }
}

fn fields_of(data: &Value) -> Result<Value, GateError> {
    let map = data
        .as_object()
        .ok_or_else(|| GateError::validation("Document data must be a JSON object"))?;
    Ok(to_firestore_fields(map))
}

fn top_level_keys(data: &Value) -> Result<Vec<String>, GateError> {
    let map = data
        .as_object()
        .ok_or_else(|| GateError::validation("Document data must be a JSON object"))?;
    Ok(map.keys().cloned().collect())
}

fn mask_query(data: &Value, first_sep: char) -> Result<String, GateError> {
    let mut out = String::new();
    let mut sep = first_sep;
    for key in top_level_keys(data)? {
        out.push(sep);
        out.push_str("updateMask.fieldPaths=");
        // Field names are user data; encode so they stay one query value.
        out.push_str(&encode_component(&key));
        sep = '&';
    }
    Ok(out)
}

fn rest_operator(op: &str) -> Result<&'static str, GateError> {
    Ok(match op {
        "<" => "LESS_THAN",
        "<=" => "LESS_THAN_OR_EQUAL",
        "==" => "EQUAL",
        "!=" => "NOT_EQUAL",
        ">=" => "GREATER_THAN_OR_EQUAL",
        ">" => "GREATER_THAN",
        "array-contains" => "ARRAY_CONTAINS",
        "array-contains-any" => "ARRAY_CONTAINS_ANY",
        "in" => "IN",
        "not-in" => "NOT_IN",
        other => {
            return Err(GateError::validation(format!(
                "Unsupported where operator '{}'",
                other
            )))
        }
    })
}

fn structured_query(
    collection_id: &str,
    all_descendants: bool,
    filters: &Value,
    order_by: &Value,
    limit: Option<i64>,
) -> Result<Value, GateError> {
    let mut query = Map::new();
    query.insert(
        "from".to_string(),
        json!([{"collectionId": collection_id, "allDescendants": all_descendants}]),
    );

    if let Some(clauses) = filters.as_array() {
        if !clauses.is_empty() {
            let mut field_filters = Vec::with_capacity(clauses.len());
            for clause in clauses {
                let field = clause.get(0).and_then(|f| f.as_str()).unwrap_or("");
                let op = clause.get(1).and_then(|o| o.as_str()).unwrap_or("");
                let value = clause.get(2).unwrap_or(&Value::Null);
                field_filters.push(json!({
                    "fieldFilter": {
                        "field": {"fieldPath": field},
                        "op": rest_operator(op)?,
                        "value": to_firestore_value(value),
                    }
                }));
            }
            query.insert(
                "where".to_string(),
                json!({"compositeFilter": {"op": "AND", "filters": field_filters}}),
            );
        }
    }

    if let Some(orders) = order_by.as_array() {
        if !orders.is_empty() {
            let mut rendered = Vec::with_capacity(orders.len());
            for o in orders {
                let field = o.get(0).and_then(|f| f.as_str()).unwrap_or("");
                let dir = o.get(1).and_then(|d| d.as_str()).unwrap_or("asc");
                let direction = if dir == "desc" { "DESCENDING" } else { "ASCENDING" };
                rendered.push(json!({
                    "field": {"fieldPath": field},
                    "direction": direction,
                }));
            }
            query.insert("orderBy".to_string(), Value::Array(rendered));
        }
    }

    if let Some(n) = limit {
        if n > 0 {
            query.insert("limit".to_string(), json!(n));
        }
    }

    Ok(Value::Object(query))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_mapping() {
        assert_eq!(rest_operator("==").unwrap(), "EQUAL");
        assert_eq!(rest_operator("array-contains-any").unwrap(), "ARRAY_CONTAINS_ANY");
        assert_eq!(rest_operator("not-in").unwrap(), "NOT_IN");
        assert_eq!(
            rest_operator("~").unwrap_err().kind,
            crate::error::ErrorKind::Validation
        );
    }

    #[test]
    fn structured_query_shape() {
        let q = structured_query(
            "users",
            false,
            &json!([["age", ">=", 18], ["city", "==", "Oslo"]]),
            &json!([["age", "desc"]]),
            Some(10),
        )
        .unwrap();
        assert_eq!(q["from"][0]["collectionId"], json!("users"));
        assert_eq!(q["from"][0]["allDescendants"], json!(false));
        assert_eq!(q["where"]["compositeFilter"]["op"], json!("AND"));
        let filters = q["where"]["compositeFilter"]["filters"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0]["fieldFilter"]["op"], json!("GREATER_THAN_OR_EQUAL"));
        assert_eq!(
            filters[0]["fieldFilter"]["value"],
            json!({"integerValue": "18"})
        );
        assert_eq!(q["orderBy"][0]["direction"], json!("DESCENDING"));
        assert_eq!(q["limit"], json!(10));
    }

    #[test]
    fn group_query_spans_descendants() {
        let q = structured_query("posts", true, &json!([]), &json!([]), None).unwrap();
        assert_eq!(q["from"][0]["allDescendants"], json!(true));
        assert!(q.get("where").is_none());
        assert!(q.get("orderBy").is_none());
        assert!(q.get("limit").is_none());
    }

    #[test]
    fn order_direction_defaults_ascending() {
        let q = structured_query("users", false, &json!([]), &json!([["name"]]), None).unwrap();
        assert_eq!(q["orderBy"][0]["direction"], json!("ASCENDING"));
    }

    #[test]
    fn mask_query_lists_top_level_fields() {
        let data = json!({"a": 1, "b": {"c": 2}});
        let mask = mask_query(&data, '?').unwrap();
        assert_eq!(mask, "?updateMask.fieldPaths=a&updateMask.fieldPaths=b");
    }

    #[test]
    fn mask_query_encodes_reserved_characters() {
        let data = json!({"a&b=c": 1, "with space": 2});
        let mask = mask_query(&data, '?').unwrap();
        assert_eq!(
            mask,
            "?updateMask.fieldPaths=a%26b%3Dc&updateMask.fieldPaths=with%20space"
        );
        assert!(!mask.contains("a&b"), "raw separators must not leak into the query");
    }
}
