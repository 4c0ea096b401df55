// Firebase MCP Gateway - Tool Definitions
//
// Every exposed tool: input schema, structural validator, gate plan, and
// handler. The dispatcher runs schema checks and the validator before the
// policy gates and the rate limiter, so handlers only extract arguments and
// delegate to the backend.

use crate::error::GateError;
use crate::firebase::FirebaseBackend;
use crate::policy::Capability;
use crate::registry::{GatePlan, ToolDef, ToolRegistry};
use crate::validate::{
    validate_batch_operations, validate_collection_path, validate_document_data,
    validate_document_path, validate_limit, validate_order_by, validate_where_clauses,
};
use base64::Engine;
use serde_json::{json, Value};

const DEFAULT_LIST_USERS: u32 = 100;
const MAX_LIST_USERS: u32 = 1000;

/// Schema builder in the MCP input-schema shape.
fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn req_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, GateError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GateError::validation(format!("Missing required field '{}'", name)))
}

fn opt_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

fn opt_value<'a>(args: &'a Value, name: &str) -> &'a Value {
    args.get(name).unwrap_or(&Value::Null)
}

/// Register the full tool set. Errors only on duplicate names.
pub fn register_all(registry: &mut ToolRegistry) -> Result<(), GateError> {
    register_firestore(registry)?;
    register_auth(registry)?;
    register_storage(registry)?;
    Ok(())
}

// ============================================================================
// FIRESTORE
// ============================================================================

fn check_collection_and_data(args: &Value) -> Result<(), GateError> {
    validate_collection_path(req_str(args, "collection")?)?;
    validate_document_data(opt_value(args, "data"))
}

fn check_query_clauses(args: &Value) -> Result<(), GateError> {
    let filters = opt_value(args, "where");
    if !filters.is_null() {
        validate_where_clauses(filters)?;
    }
    let order_by = opt_value(args, "order_by");
    if !order_by.is_null() {
        validate_order_by(order_by)?;
    }
    let limit = opt_value(args, "limit");
    if !limit.is_null() {
        validate_limit(limit)?;
    }
    Ok(())
}

/// Query arguments, already validated by the dispatcher.
fn query_args(args: &Value) -> (&Value, &Value, Option<i64>) {
    (
        opt_value(args, "where"),
        opt_value(args, "order_by"),
        args.get("limit").and_then(|l| l.as_i64()),
    )
}

fn register_firestore(registry: &mut ToolRegistry) -> Result<(), GateError> {
    registry.register(ToolDef {
        name: "firestore_get_document",
        description: "Get a single Firestore document by collection and id",
        schema: schema(
            json!({
                "collection": {"type": "string", "description": "Collection path"},
                "id": {"type": "string", "description": "Document id"},
            }),
            &["collection", "id"],
        ),
        plan: GatePlan { collection_arg: Some("collection"), ..Default::default() },
        validate: Some(Box::new(|args| {
            validate_collection_path(req_str(args, "collection")?)
        })),
        handler: Box::new(|backend, args| {
            backend.get_document(req_str(args, "collection")?, req_str(args, "id")?)
        }),
    })?;

    registry.register(ToolDef {
        name: "firestore_add_document",
        description: "Add a document with an auto-generated id",
        schema: schema(
            json!({
                "collection": {"type": "string", "description": "Collection path"},
                "data": {"type": "object", "description": "Document fields"},
            }),
            &["collection", "data"],
        ),
        plan: GatePlan {
            write: true,
            collection_arg: Some("collection"),
            ..Default::default()
        },
        validate: Some(Box::new(check_collection_and_data)),
        handler: Box::new(|backend, args| {
            backend.create_document(req_str(args, "collection")?, opt_value(args, "data"))
        }),
    })?;

    registry.register(ToolDef {
        name: "firestore_set_document",
        description: "Create or overwrite a document at a known id; merge=true updates only the given fields",
        schema: schema(
            json!({
                "collection": {"type": "string", "description": "Collection path"},
                "id": {"type": "string", "description": "Document id"},
                "data": {"type": "object", "description": "Document fields"},
                "merge": {"type": "boolean", "description": "Merge instead of overwrite"},
            }),
            &["collection", "id", "data"],
        ),
        plan: GatePlan {
            write: true,
            collection_arg: Some("collection"),
            ..Default::default()
        },
        validate: Some(Box::new(check_collection_and_data)),
        handler: Box::new(|backend, args| {
            let merge = args.get("merge").and_then(|m| m.as_bool()).unwrap_or(false);
            backend.set_document(
                req_str(args, "collection")?,
                req_str(args, "id")?,
                opt_value(args, "data"),
                merge,
            )
        }),
    })?;

    registry.register(ToolDef {
        name: "firestore_update_document",
        description: "Update fields of an existing document; fails if it does not exist",
        schema: schema(
            json!({
                "collection": {"type": "string", "description": "Collection path"},
                "id": {"type": "string", "description": "Document id"},
                "data": {"type": "object", "description": "Fields to update"},
            }),
            &["collection", "id", "data"],
        ),
        plan: GatePlan {
            write: true,
            collection_arg: Some("collection"),
            ..Default::default()
        },
        validate: Some(Box::new(check_collection_and_data)),
        handler: Box::new(|backend, args| {
            backend.update_document(
                req_str(args, "collection")?,
                req_str(args, "id")?,
                opt_value(args, "data"),
            )
        }),
    })?;

    registry.register(ToolDef {
        name: "firestore_delete_document",
        description: "Delete a document",
        schema: schema(
            json!({
                "collection": {"type": "string", "description": "Collection path"},
                "id": {"type": "string", "description": "Document id"},
            }),
            &["collection", "id"],
        ),
        plan: GatePlan {
            write: true,
            collection_arg: Some("collection"),
            ..Default::default()
        },
        validate: Some(Box::new(|args| {
            validate_collection_path(req_str(args, "collection")?)
        })),
        handler: Box::new(|backend, args| {
            backend.delete_document(req_str(args, "collection")?, req_str(args, "id")?)
        }),
    })?;

    registry.register(ToolDef {
        name: "firestore_list_documents",
        description: "Query a collection with optional where/order_by/limit",
        schema: schema(
            json!({
                "collection": {"type": "string", "description": "Collection path"},
                "where": {"type": "array", "description": "[field, op, value] triples, AND-combined"},
                "order_by": {"type": "array", "description": "[field, direction] pairs"},
                "limit": {"type": "integer", "description": "Maximum documents to return"},
            }),
            &["collection"],
        ),
        plan: GatePlan { collection_arg: Some("collection"), ..Default::default() },
        validate: Some(Box::new(|args| {
            validate_collection_path(req_str(args, "collection")?)?;
            check_query_clauses(args)
        })),
        handler: Box::new(|backend, args| {
            let (filters, order_by, limit) = query_args(args);
            backend.list_documents(req_str(args, "collection")?, filters, order_by, limit)
        }),
    })?;

    registry.register(ToolDef {
        name: "firestore_list_collections",
        description: "List collection ids at the root or under a parent document",
        schema: schema(
            json!({
                "parent": {"type": "string", "description": "Optional parent document path"},
            }),
            &[],
        ),
        plan: GatePlan::default(),
        validate: Some(Box::new(|args| {
            match opt_str(args, "parent") {
                Some(parent) => validate_document_path(parent),
                None => Ok(()),
            }
        })),
        handler: Box::new(|backend, args| backend.list_collections(opt_str(args, "parent"))),
    })?;

    registry.register(ToolDef {
        name: "firestore_query_collection_group",
        description: "Query every collection with a given id, regardless of nesting",
        schema: schema(
            json!({
                "collection_id": {"type": "string", "description": "Collection id, single segment"},
                "where": {"type": "array", "description": "[field, op, value] triples, AND-combined"},
                "order_by": {"type": "array", "description": "[field, direction] pairs"},
                "limit": {"type": "integer", "description": "Maximum documents to return"},
            }),
            &["collection_id"],
        ),
        plan: GatePlan { collection_arg: Some("collection_id"), ..Default::default() },
        validate: Some(Box::new(|args| {
            let collection_id = req_str(args, "collection_id")?;
            if collection_id.is_empty() || collection_id.contains('/') {
                return Err(GateError::validation(
                    "'collection_id' must be a single path segment",
                ));
            }
            check_query_clauses(args)
        })),
        handler: Box::new(|backend, args| {
            let (filters, order_by, limit) = query_args(args);
            backend.query_collection_group(
                req_str(args, "collection_id")?,
                filters,
                order_by,
                limit,
            )
        }),
    })?;

    registry.register(ToolDef {
        name: "firestore_batch_write",
        description: "Apply up to 500 set/update/delete operations atomically",
        schema: schema(
            json!({
                "operations": {"type": "array", "description": "Operations: {type, path, data?}"},
            }),
            &["operations"],
        ),
        plan: GatePlan {
            write: true,
            batch_operations_arg: Some("operations"),
            ..Default::default()
        },
        validate: Some(Box::new(|args| {
            validate_batch_operations(opt_value(args, "operations"))
        })),
        handler: Box::new(|backend, args| backend.batch_write(opt_value(args, "operations"))),
    })?;

    Ok(())
}

// ============================================================================
// AUTH
// ============================================================================

fn user_properties(with_uid: bool) -> Value {
    let mut props = json!({
        "email": {"type": "string", "description": "Email address"},
        "password": {"type": "string", "description": "Password"},
        "display_name": {"type": "string", "description": "Display name"},
        "phone_number": {"type": "string", "description": "Phone number in E.164 form"},
        "photo_url": {"type": "string", "description": "Photo URL"},
        "email_verified": {"type": "boolean", "description": "Email verified flag"},
        "disabled": {"type": "boolean", "description": "Disable the account"},
    });
    if with_uid {
        props["uid"] = json!({"type": "string", "description": "User id"});
    }
    props
}

fn check_list_users_page(args: &Value) -> Result<(), GateError> {
    match args.get("max_results").and_then(|m| m.as_i64()) {
        None => Ok(()),
        Some(n) if n >= 1 && n <= MAX_LIST_USERS as i64 => Ok(()),
        Some(n) => Err(GateError::validation(format!(
            "'max_results' must be between 1 and {}, got {}",
            MAX_LIST_USERS, n
        ))),
    }
}

fn register_auth(registry: &mut ToolRegistry) -> Result<(), GateError> {
    let auth = |write, admin_only| GatePlan {
        capability: Some(Capability::Auth),
        write,
        admin_only,
        ..Default::default()
    };

    registry.register(ToolDef {
        name: "auth_get_user",
        description: "Look up a user by uid",
        schema: schema(
            json!({"uid": {"type": "string", "description": "User id"}}),
            &["uid"],
        ),
        plan: auth(false, false),
        validate: None,
        handler: Box::new(|backend, args| backend.get_user(req_str(args, "uid")?)),
    })?;

    registry.register(ToolDef {
        name: "auth_get_user_by_email",
        description: "Look up a user by email address",
        schema: schema(
            json!({"email": {"type": "string", "description": "Email address"}}),
            &["email"],
        ),
        plan: auth(false, false),
        validate: None,
        handler: Box::new(|backend, args| backend.get_user_by_email(req_str(args, "email")?)),
    })?;

    registry.register(ToolDef {
        name: "auth_list_users",
        description: "List users, paged",
        schema: schema(
            json!({
                "max_results": {"type": "integer", "description": "Page size, 1-1000, default 100"},
                "page_token": {"type": "string", "description": "Token from a previous page"},
            }),
            &[],
        ),
        plan: auth(false, false),
        validate: Some(Box::new(check_list_users_page)),
        handler: Box::new(|backend, args| {
            let max_results = args
                .get("max_results")
                .and_then(|m| m.as_i64())
                .map(|n| n as u32)
                .unwrap_or(DEFAULT_LIST_USERS);
            backend.list_users(max_results, opt_str(args, "page_token"))
        }),
    })?;

    registry.register(ToolDef {
        name: "auth_create_user",
        description: "Create a user account",
        schema: schema(user_properties(false), &[]),
        plan: auth(true, false),
        validate: None,
        handler: Box::new(|backend, args| backend.create_user(args)),
    })?;

    registry.register(ToolDef {
        name: "auth_update_user",
        description: "Update properties of an existing user",
        schema: schema(user_properties(true), &["uid"]),
        plan: auth(true, false),
        validate: None,
        handler: Box::new(|backend, args| {
            backend.update_user(req_str(args, "uid")?, args)
        }),
    })?;

    registry.register(ToolDef {
        name: "auth_delete_user",
        description: "Delete a user account",
        schema: schema(
            json!({"uid": {"type": "string", "description": "User id"}}),
            &["uid"],
        ),
        plan: auth(true, false),
        validate: None,
        handler: Box::new(|backend, args| backend.delete_user(req_str(args, "uid")?)),
    })?;

    registry.register(ToolDef {
        name: "auth_set_custom_claims",
        description: "Set custom claims on a user token (admin only)",
        schema: schema(
            json!({
                "uid": {"type": "string", "description": "User id"},
                "claims": {"type": "object", "description": "Claims object, replaces existing claims"},
            }),
            &["uid", "claims"],
        ),
        plan: auth(true, true),
        validate: None,
        handler: Box::new(|backend, args| {
            backend.set_custom_claims(req_str(args, "uid")?, opt_value(args, "claims"))
        }),
    })?;

    Ok(())
}

// ============================================================================
// STORAGE
// ============================================================================

fn check_upload_content(args: &Value) -> Result<(), GateError> {
    let encoding = opt_str(args, "encoding").unwrap_or("text");
    match encoding {
        "text" => Ok(()),
        "base64" => {
            let content = req_str(args, "content")?;
            base64::engine::general_purpose::STANDARD
                .decode(content)
                .map(|_| ())
                .map_err(|e| GateError::validation(format!("Invalid base64 content: {}", e)))
        }
        other => Err(GateError::validation(format!(
            "'encoding' must be 'text' or 'base64', got '{}'",
            other
        ))),
    }
}

fn register_storage(registry: &mut ToolRegistry) -> Result<(), GateError> {
    let storage = |write| GatePlan {
        capability: Some(Capability::Storage),
        write,
        ..Default::default()
    };

    registry.register(ToolDef {
        name: "storage_list_files",
        description: "List files in the default bucket, optionally under a prefix",
        schema: schema(
            json!({
                "prefix": {"type": "string", "description": "Object name prefix"},
                "page_token": {"type": "string", "description": "Token from a previous page"},
                "max_results": {"type": "integer", "description": "Page size"},
            }),
            &[],
        ),
        plan: storage(false),
        validate: Some(Box::new(|args| {
            match args.get("max_results").and_then(|m| m.as_i64()) {
                Some(n) if n < 1 => Err(GateError::validation(format!(
                    "'max_results' must be positive, got {}",
                    n
                ))),
                _ => Ok(()),
            }
        })),
        handler: Box::new(|backend, args| {
            let max_results = args
                .get("max_results")
                .and_then(|m| m.as_i64())
                .map(|n| n as u32);
            backend.list_files(
                opt_str(args, "prefix"),
                opt_str(args, "page_token"),
                max_results,
            )
        }),
    })?;

    registry.register(ToolDef {
        name: "storage_get_file_info",
        description: "Get metadata and download link for a file",
        schema: schema(
            json!({"path": {"type": "string", "description": "Object name"}}),
            &["path"],
        ),
        plan: storage(false),
        validate: None,
        handler: Box::new(|backend, args| backend.get_file_metadata(req_str(args, "path")?)),
    })?;

    registry.register(ToolDef {
        name: "storage_upload_file",
        description: "Upload a file; content is text or base64-encoded bytes",
        schema: schema(
            json!({
                "path": {"type": "string", "description": "Object name"},
                "content": {"type": "string", "description": "File content"},
                "content_type": {"type": "string", "description": "MIME type, default text/plain or application/octet-stream"},
                "encoding": {"type": "string", "description": "'text' (default) or 'base64'"},
            }),
            &["path", "content"],
        ),
        plan: storage(true),
        validate: Some(Box::new(check_upload_content)),
        handler: Box::new(|backend, args| {
            let path = req_str(args, "path")?;
            let content = req_str(args, "content")?;
            // Encoding already validated pre-dispatch.
            let (bytes, default_type) = match opt_str(args, "encoding").unwrap_or("text") {
                "base64" => {
                    let decoded = base64::engine::general_purpose::STANDARD
                        .decode(content)
                        .map_err(|e| {
                            GateError::validation(format!("Invalid base64 content: {}", e))
                        })?;
                    (decoded, "application/octet-stream")
                }
                _ => (content.as_bytes().to_vec(), "text/plain"),
            };
            let content_type = opt_str(args, "content_type").unwrap_or(default_type);
            backend.upload_file(path, bytes, content_type)
        }),
    })?;

    registry.register(ToolDef {
        name: "storage_delete_file",
        description: "Delete a file from the default bucket",
        schema: schema(
            json!({"path": {"type": "string", "description": "Object name"}}),
            &["path"],
        ),
        plan: storage(true),
        validate: None,
        handler: Box::new(|backend, args| backend.delete_file(req_str(args, "path")?)),
    })?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::firebase::mock::MockBackend;

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        register_all(&mut r).unwrap();
        r
    }

    fn check(r: &ToolRegistry, name: &str, args: &Value) -> Result<(), GateError> {
        let tool = r.get(name).unwrap();
        tool.validate
            .as_ref()
            .map(|v| v(args))
            .unwrap_or(Ok(()))
    }

    #[test]
    fn registers_expected_names() {
        let r = registry();
        let names = r.names();
        for expected in [
            "firestore_get_document",
            "firestore_add_document",
            "firestore_set_document",
            "firestore_update_document",
            "firestore_delete_document",
            "firestore_list_documents",
            "firestore_list_collections",
            "firestore_query_collection_group",
            "firestore_batch_write",
            "auth_get_user",
            "auth_get_user_by_email",
            "auth_list_users",
            "auth_create_user",
            "auth_update_user",
            "auth_delete_user",
            "auth_set_custom_claims",
            "storage_list_files",
            "storage_get_file_info",
            "storage_upload_file",
            "storage_delete_file",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn every_firestore_write_declares_structural_checks() {
        let r = registry();
        for name in [
            "firestore_add_document",
            "firestore_set_document",
            "firestore_update_document",
            "firestore_delete_document",
            "firestore_batch_write",
        ] {
            assert!(r.get(name).unwrap().validate.is_some(), "{} lacks a validator", name);
        }
    }

    #[test]
    fn validator_rejects_even_collection_path() {
        let r = registry();
        let err = check(
            &r,
            "firestore_get_document",
            &json!({"collection": "users/u1", "id": "x"}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn collection_group_id_must_be_single_segment() {
        let r = registry();
        let err = check(
            &r,
            "firestore_query_collection_group",
            &json!({"collection_id": "a/b"}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(check(
            &r,
            "firestore_query_collection_group",
            &json!({"collection_id": "posts"})
        )
        .is_ok());
    }

    #[test]
    fn list_users_bounds_page_size() {
        let r = registry();
        assert!(check(&r, "auth_list_users", &json!({})).is_ok());
        assert!(check(&r, "auth_list_users", &json!({"max_results": 1000})).is_ok());
        let err = check(&r, "auth_list_users", &json!({"max_results": 1001})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = check(&r, "auth_list_users", &json!({"max_results": 0})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn upload_decodes_base64() {
        let r = registry();
        let tool = r.get("storage_upload_file").unwrap();
        let backend = MockBackend::new();
        let args = json!({"path": "a.bin", "content": "aGVsbG8=", "encoding": "base64"});
        assert!(check(&r, "storage_upload_file", &args).is_ok());
        assert!((tool.handler)(&backend, &args).is_ok());
        let calls = backend.calls.lock().unwrap();
        assert!(calls[0].1.contains("5 bytes"), "got: {}", calls[0].1);
    }

    #[test]
    fn upload_rejects_bad_base64_and_encoding() {
        let r = registry();
        let err = check(
            &r,
            "storage_upload_file",
            &json!({"path": "a.bin", "content": "!!!", "encoding": "base64"}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = check(
            &r,
            "storage_upload_file",
            &json!({"path": "a.bin", "content": "x", "encoding": "hex"}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn where_clause_validation_is_structural() {
        let r = registry();
        let err = check(
            &r,
            "firestore_list_documents",
            &json!({"collection": "users", "where": [["age", "~", 1]]}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn handlers_only_delegate_once_validated() {
        let r = registry();
        let tool = r.get("firestore_get_document").unwrap();
        let backend = MockBackend::new();
        assert!((tool.handler)(&backend, &json!({"collection": "users", "id": "u1"})).is_ok());
        assert_eq!(backend.call_count("get_document"), 1);
    }
}
