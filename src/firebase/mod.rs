// Firebase MCP Gateway - Firebase Collaborator
//
// The backend trait is the seam between the dispatch pipeline and the
// Firebase REST surface. Handlers only ever see this trait; production uses
// RestBackend, tests use the recording mock.

pub mod auth;
pub mod firestore;
pub mod storage;
pub mod token;
pub mod values;

use crate::config::ServerConfig;
use crate::error::{classify_status, GateError};
use serde_json::Value;
use std::time::Duration;
use token::{ServiceAccountKey, TokenProvider};

/// Synchronous Firebase operations. One method per exposed tool; payloads
/// stay as plain JSON so handlers and tests do not carry wire types around.
pub trait FirebaseBackend: Send + Sync {
    // Firestore
    fn get_document(&self, collection: &str, id: &str) -> Result<Value, GateError>;
    fn create_document(&self, collection: &str, data: &Value) -> Result<Value, GateError>;
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
        merge: bool,
    ) -> Result<Value, GateError>;
    fn update_document(&self, collection: &str, id: &str, data: &Value)
        -> Result<Value, GateError>;
    fn delete_document(&self, collection: &str, id: &str) -> Result<Value, GateError>;
    fn list_documents(
        &self,
        collection: &str,
        filters: &Value,
        order_by: &Value,
        limit: Option<i64>,
    ) -> Result<Value, GateError>;
    fn list_collections(&self, parent_document: Option<&str>) -> Result<Value, GateError>;
    fn query_collection_group(
        &self,
        collection_id: &str,
        filters: &Value,
        order_by: &Value,
        limit: Option<i64>,
    ) -> Result<Value, GateError>;
    fn batch_write(&self, operations: &Value) -> Result<Value, GateError>;

    // Auth
    fn get_user(&self, uid: &str) -> Result<Value, GateError>;
    fn get_user_by_email(&self, email: &str) -> Result<Value, GateError>;
    fn list_users(&self, max_results: u32, page_token: Option<&str>)
        -> Result<Value, GateError>;
    fn create_user(&self, properties: &Value) -> Result<Value, GateError>;
    fn update_user(&self, uid: &str, properties: &Value) -> Result<Value, GateError>;
    fn delete_user(&self, uid: &str) -> Result<Value, GateError>;
    fn set_custom_claims(&self, uid: &str, claims: &Value) -> Result<Value, GateError>;

    // Storage
    fn list_files(
        &self,
        prefix: Option<&str>,
        page_token: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<Value, GateError>;
    fn get_file_metadata(&self, path: &str) -> Result<Value, GateError>;
    fn upload_file(
        &self,
        path: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<Value, GateError>;
    fn delete_file(&self, path: &str) -> Result<Value, GateError>;
}

/// Production backend over the Google REST APIs, blocking reqwest client.
pub struct RestBackend {
    pub(crate) client: reqwest::blocking::Client,
    pub(crate) tokens: TokenProvider,
    pub(crate) project_id: String,
    pub(crate) bucket: String,
}

impl RestBackend {
    pub fn from_config(config: &ServerConfig) -> Result<Self, GateError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("firebase-mcp/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        let key = ServiceAccountKey::load(std::path::Path::new(&config.service_account_path))?;
        let project_id = if config.project_id.is_empty() {
            key.project_id.clone()
        } else {
            config.project_id.clone()
        };
        let bucket = config.bucket();
        let tokens = TokenProvider::new(key, client.clone());

        Ok(Self { client, tokens, project_id, bucket })
    }

    /// Authorized request builder with the cached bearer token attached.
    pub(crate) fn authorized(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> Result<reqwest::blocking::RequestBuilder, GateError> {
        let token = self.tokens.token()?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    /// Send a request and decode the JSON body, classifying non-2xx statuses
    /// into the error taxonomy before anything else sees them.
    pub(crate) fn send_json(
        &self,
        request: reqwest::blocking::RequestBuilder,
        context: &str,
    ) -> Result<Value, GateError> {
        let response = request.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        if (200..300).contains(&status) {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&body)?);
        }

        // Google error bodies carry {"error": {"message": ...}}.
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.clone()
                }
            });
        log::debug!("{} returned status {}: {}", context, status, detail);
        Err(classify_status(status, format!("{}: {}", context, detail)))
    }
}

impl FirebaseBackend for RestBackend {
    fn get_document(&self, collection: &str, id: &str) -> Result<Value, GateError> {
        self.firestore_get(collection, id)
    }

    fn create_document(&self, collection: &str, data: &Value) -> Result<Value, GateError> {
        self.firestore_create(collection, data)
    }

    fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
        merge: bool,
    ) -> Result<Value, GateError> {
        self.firestore_set(collection, id, data, merge)
    }

    fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<Value, GateError> {
        self.firestore_update(collection, id, data)
    }

    fn delete_document(&self, collection: &str, id: &str) -> Result<Value, GateError> {
        self.firestore_delete(collection, id)
    }

    fn list_documents(
        &self,
        collection: &str,
        filters: &Value,
        order_by: &Value,
        limit: Option<i64>,
    ) -> Result<Value, GateError> {
        self.firestore_list(collection, filters, order_by, limit)
    }

    fn list_collections(&self, parent_document: Option<&str>) -> Result<Value, GateError> {
        self.firestore_list_collections(parent_document)
    }

    fn query_collection_group(
        &self,
        collection_id: &str,
        filters: &Value,
        order_by: &Value,
        limit: Option<i64>,
    ) -> Result<Value, GateError> {
        self.firestore_query_group(collection_id, filters, order_by, limit)
    }

    fn batch_write(&self, operations: &Value) -> Result<Value, GateError> {
        self.firestore_batch_write(operations)
    }

    fn get_user(&self, uid: &str) -> Result<Value, GateError> {
        self.auth_lookup_by_uid(uid)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Value, GateError> {
        self.auth_lookup_by_email(email)
    }

    fn list_users(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Value, GateError> {
        self.auth_list(max_results, page_token)
    }

    fn create_user(&self, properties: &Value) -> Result<Value, GateError> {
        self.auth_create(properties)
    }

    fn update_user(&self, uid: &str, properties: &Value) -> Result<Value, GateError> {
        self.auth_update(uid, properties)
    }

    fn delete_user(&self, uid: &str) -> Result<Value, GateError> {
        self.auth_delete(uid)
    }

    fn set_custom_claims(&self, uid: &str, claims: &Value) -> Result<Value, GateError> {
        self.auth_set_claims(uid, claims)
    }

    fn list_files(
        &self,
        prefix: Option<&str>,
        page_token: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<Value, GateError> {
        self.storage_list(prefix, page_token, max_results)
    }

    fn get_file_metadata(&self, path: &str) -> Result<Value, GateError> {
        self.storage_metadata(path)
    }

    fn upload_file(
        &self,
        path: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<Value, GateError> {
        self.storage_upload(path, content, content_type)
    }

    fn delete_file(&self, path: &str) -> Result<Value, GateError> {
        self.storage_delete(path)
    }
}

/// Percent-encode one URL component. Slashes are encoded too, so an object
/// name or field path always occupies a single query value or path segment.
pub(crate) fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_encoding_covers_reserved_bytes() {
        assert_eq!(encode_component("reports/2026 q1.pdf"), "reports%2F2026%20q1.pdf");
        assert_eq!(encode_component("a&b=c#d+e"), "a%26b%3Dc%23d%2Be");
        assert_eq!(encode_component("plain-name_1.txt"), "plain-name_1.txt");
    }
}

// ============================================================================
// TEST MOCK
// ============================================================================
