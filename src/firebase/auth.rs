// Firebase MCP Gateway - Identity Toolkit REST
//
// User management through the Identity Toolkit v1 admin endpoints. Records
// are normalized before leaving this module: `localId` becomes `uid` and the
// JSON-string `customAttributes` field is parsed into `customClaims`.

use super::{encode_component, RestBackend};
use crate::error::GateError;
use reqwest::Method;
use serde_json::{json, Map, Value};

const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com/v1";

impl RestBackend {
    fn accounts_url(&self, action: &str) -> String {
        format!(
            "{}/projects/{}/accounts{}",
            IDENTITY_BASE, self.project_id, action
        )
    }

    pub(crate) fn auth_lookup_by_uid(&self, uid: &str) -> Result<Value, GateError> {
        self.lookup(json!({"localId": [uid]}), &format!("uid '{}'", uid))
    }

    pub(crate) fn auth_lookup_by_email(&self, email: &str) -> Result<Value, GateError> {
        self.lookup(json!({"email": [email]}), &format!("email '{}'", email))
    }

    fn lookup(&self, body: Value, what: &str) -> Result<Value, GateError> {
        let url = self.accounts_url(":lookup");
        let result = self.send_json(
            self.authorized(Method::POST, &url)?.json(&body),
            "auth.lookup",
        )?;
        let user = result
            .get("users")
            .and_then(|u| u.as_array())
            .and_then(|u| u.first())
            .ok_or_else(|| GateError::not_found(format!("No user found for {}", what)))?;
        Ok(normalize_user(user))
    }

    pub(crate) fn auth_list(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Value, GateError> {
        let url = format!(
            "{}{}",
            self.accounts_url(":batchGet"),
            list_query(max_results, page_token)
        );
        let result = self.send_json(self.authorized(Method::GET, &url)?, "auth.list")?;
        let users: Vec<Value> = result
            .get("users")
            .and_then(|u| u.as_array())
            .map(|us| us.iter().map(normalize_user).collect())
            .unwrap_or_default();
        let mut out = Map::new();
        out.insert("count".to_string(), json!(users.len()));
        out.insert("users".to_string(), Value::Array(users));
        if let Some(t) = result.get("nextPageToken").and_then(|t| t.as_str()) {
            if !t.is_empty() {
                out.insert("nextPageToken".to_string(), json!(t));
            }
        }
        Ok(Value::Object(out))
    }

    pub(crate) fn auth_create(&self, properties: &Value) -> Result<Value, GateError> {
        let url = self.accounts_url("");
        let body = to_account_payload(properties, None);
        let created = self.send_json(
            self.authorized(Method::POST, &url)?.json(&body),
            "auth.create",
        )?;
        let uid = created
            .get("localId")
            .and_then(|u| u.as_str())
            .ok_or_else(|| GateError::internal("Account creation returned no localId"))?;
        self.auth_lookup_by_uid(uid)
    }

    pub(crate) fn auth_update(&self, uid: &str, properties: &Value) -> Result<Value, GateError> {
        let url = self.accounts_url(":update");
        let body = to_account_payload(properties, Some(uid));
        self.send_json(
            self.authorized(Method::POST, &url)?.json(&body),
            "auth.update",
        )?;
        self.auth_lookup_by_uid(uid)
    }

    pub(crate) fn auth_delete(&self, uid: &str) -> Result<Value, GateError> {
        let url = self.accounts_url(":delete");
        self.send_json(
            self.authorized(Method::POST, &url)?.json(&json!({"localId": uid})),
            "auth.delete",
        )?;
        Ok(json!({"deleted": uid}))
    }

    pub(crate) fn auth_set_claims(&self, uid: &str, claims: &Value) -> Result<Value, GateError> {
        let url = self.accounts_url(":update");
        // Claims travel as a JSON string inside customAttributes.
        let encoded = serde_json::to_string(claims)?;
        let body = json!({"localId": uid, "customAttributes": encoded});
        self.send_json(
            self.authorized(Method::POST, &url)?.json(&body),
            "auth.setClaims",
        )?;
        self.auth_lookup_by_uid(uid)
    }
}

/// Query string for the paged list endpoint. Page tokens are opaque and can
/// carry `+`/`=`, so they are percent-encoded.
fn list_query(max_results: u32, page_token: Option<&str>) -> String {
    let mut query = format!("?maxResults={}", max_results);
    if let Some(t) = page_token {
        query.push_str("&nextPageToken=");
        query.push_str(&encode_component(t));
    }
    query
}

/// Map the tool-facing property names onto the Identity Toolkit payload.
fn to_account_payload(properties: &Value, uid: Option<&str>) -> Value {
    let mut body = Map::new();
    if let Some(uid) = uid {
        body.insert("localId".to_string(), json!(uid));
    }
    if let Some(props) = properties.as_object() {
        for (key, value) in props {
            match key.as_str() {
                "email" => body.insert("email".to_string(), value.clone()),
                "password" => body.insert("password".to_string(), value.clone()),
                "display_name" | "displayName" => {
                    body.insert("displayName".to_string(), value.clone())
                }
                "phone_number" | "phoneNumber" => {
                    body.insert("phoneNumber".to_string(), value.clone())
                }
                "photo_url" | "photoUrl" => body.insert("photoUrl".to_string(), value.clone()),
                "email_verified" | "emailVerified" => {
                    body.insert("emailVerified".to_string(), value.clone())
                }
                "disabled" => body.insert("disableUser".to_string(), value.clone()),
                _ => None,
            };
        }
    }
    Value::Object(body)
}

/// Identity Toolkit record to the stable shape tools return.
fn normalize_user(user: &Value) -> Value {
    let mut out = Map::new();
    out.insert(
        "uid".to_string(),
        user.get("localId").cloned().unwrap_or(Value::Null),
    );
    for (from, to) in [
        ("email", "email"),
        ("displayName", "displayName"),
        ("phoneNumber", "phoneNumber"),
        ("photoUrl", "photoUrl"),
        ("emailVerified", "emailVerified"),
        ("disabled", "disabled"),
        ("createdAt", "createdAt"),
        ("lastLoginAt", "lastLoginAt"),
    ] {
        if let Some(v) = user.get(from) {
            out.insert(to.to_string(), v.clone());
        }
    }
    if let Some(attrs) = user.get("customAttributes").and_then(|a| a.as_str()) {
        if let Ok(claims) = serde_json::from_str::<Value>(attrs) {
            out.insert("customClaims".to_string(), claims);
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
    fn user_normalization() {
        let raw = json!({
            "localId": "u1",
            "email": "ada@example.com",
            "emailVerified": true,
            "customAttributes": "{\"role\":\"editor\"}",
            "passwordHash": "should-not-leak"
        });
        let user = normalize_user(&raw);
        assert_eq!(user["uid"], json!("u1"));
        assert_eq!(user["email"], json!("ada@example.com"));
        assert_eq!(user["customClaims"]["role"], json!("editor"));
        assert!(user.get("passwordHash").is_none());
        assert!(user.get("localId").is_none());
    }

    #[test]
    fn account_payload_field_mapping() {
        let body = to_account_payload(
            &json!({
                "email": "a@b.c",
                "display_name": "Ada",
                "disabled": true,
                "unknown_field": "dropped"
            }),
            Some("u1"),
        );
        assert_eq!(body["localId"], json!("u1"));
        assert_eq!(body["email"], json!("a@b.c"));
        assert_eq!(body["displayName"], json!("Ada"));
        assert_eq!(body["disableUser"], json!(true));
        assert!(body.get("unknown_field").is_none());
    }

    #[test]
    fn payload_accepts_camel_case_too() {
        let body = to_account_payload(&json!({"displayName": "Ada"}), None);
        assert_eq!(body["displayName"], json!("Ada"));
        assert!(body.get("localId").is_none());
    }

    #[test]
    fn list_query_encodes_page_tokens() {
        assert_eq!(list_query(100, None), "?maxResults=100");
        assert_eq!(
            list_query(50, Some("AbC+dE=/f")),
            "?maxResults=50&nextPageToken=AbC%2BdE%3D%2Ff"
        );
    }
}
