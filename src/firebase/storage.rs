// Firebase MCP Gateway - Cloud Storage REST
//
// Object operations through the Cloud Storage JSON API against the project's
// default bucket. Object names are percent-encoded into a single path
// segment, slashes included, as the API requires.

use super::{encode_component, RestBackend};
use crate::error::GateError;
use reqwest::Method;
use serde_json::{json, Map, Value};

const STORAGE_BASE: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

impl RestBackend {
    pub(crate) fn storage_list(
        &self,
        prefix: Option<&str>,
        page_token: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<Value, GateError> {
        let mut url = format!("{}/b/{}/o?maxResults={}", STORAGE_BASE, self.bucket,
            max_results.unwrap_or(1000));
        if let Some(p) = prefix {
            url.push_str("&prefix=");
            url.push_str(&encode_component(p));
        }
        if let Some(t) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&encode_component(t));
        }
        let result = self.send_json(self.authorized(Method::GET, &url)?, "storage.list")?;

        let files: Vec<Value> = result
            .get("items")
            .and_then(|i| i.as_array())
            .map(|items| items.iter().map(normalize_object).collect())
            .unwrap_or_default();
        let mut out = Map::new();
        out.insert("count".to_string(), json!(files.len()));
        out.insert("files".to_string(), Value::Array(files));
        if let Some(t) = result.get("nextPageToken").and_then(|t| t.as_str()) {
            out.insert("nextPageToken".to_string(), json!(t));
        }
        Ok(Value::Object(out))
    }

    pub(crate) fn storage_metadata(&self, path: &str) -> Result<Value, GateError> {
        let url = format!(
            "{}/b/{}/o/{}",
            STORAGE_BASE,
            self.bucket,
            encode_component(path)
        );
        let obj = self
            .send_json(self.authorized(Method::GET, &url)?, "storage.metadata")
            .map_err(|e| {
                if e.kind == crate::error::ErrorKind::NotFound {
                    GateError::not_found(format!(
                        "File '{}' not found in bucket '{}'",
                        path, self.bucket
                    ))
                } else {
                    e
                }
            })?;
        Ok(normalize_object(&obj))
    }

    pub(crate) fn storage_upload(
        &self,
        path: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<Value, GateError> {
        let url = format!(
            "{}/b/{}/o?uploadType=media&name={}",
            UPLOAD_BASE,
            self.bucket,
            encode_component(path)
        );
        let obj = self.send_json(
            self.authorized(Method::POST, &url)?
                .header("Content-Type", content_type)
                .body(content),
            "storage.upload",
        )?;
        Ok(normalize_object(&obj))
    }

    pub(crate) fn storage_delete(&self, path: &str) -> Result<Value, GateError> {
        let url = format!(
            "{}/b/{}/o/{}",
            STORAGE_BASE,
            self.bucket,
            encode_component(path)
        );
        self.send_json(self.authorized(Method::DELETE, &url)?, "storage.delete")
            .map_err(|e| {
                if e.kind == crate::error::ErrorKind::NotFound {
                    GateError::not_found(format!(
                        "File '{}' not found in bucket '{}'",
                        path, self.bucket
                    ))
                } else {
                    e
                }
            })?;
        Ok(json!({"deleted": path}))
    }
}

/// Keep the metadata fields tools care about, drop the API bookkeeping.
fn normalize_object(obj: &Value) -> Value {
    let mut out = Map::new();
    for key in [
        "name",
        "bucket",
        "size",
        "contentType",
        "timeCreated",
        "updated",
        "md5Hash",
        "mediaLink",
        "metadata",
    ] {
        if let Some(v) = obj.get(key) {
            out.insert(key.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_normalization_drops_bookkeeping() {
        let raw = json!({
            "name": "a.txt",
            "bucket": "b1",
            "size": "12",
            "contentType": "text/plain",
            "mediaLink": "https://example.test/a.txt",
            "selfLink": "noise",
            "etag": "noise"
        });
        let out = normalize_object(&raw);
        assert_eq!(out["name"], json!("a.txt"));
        assert_eq!(out["mediaLink"], json!("https://example.test/a.txt"));
        assert!(out.get("selfLink").is_none());
        assert!(out.get("etag").is_none());
    }
}
