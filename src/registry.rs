// Firebase MCP Gateway - Tool Registry & Dispatch
//
// Central pipeline for every tool invocation:
//   schema validation -> policy gates -> rate limit -> handler -> envelope.
// Policy violations are rejected before the limiter runs, so they never
// consume rate budget. Nothing but a ToolResponse ever leaves dispatch().

use crate::error::GateError;
use crate::firebase::FirebaseBackend;
use crate::policy::{check_admin, Capability, RequestContext, SecurityPolicy};
use crate::rate_limit::RateLimiter;
use crate::response::ToolResponse;
use crate::validate::validate_against_schema;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub type ToolHandler =
    Box<dyn Fn(&dyn FirebaseBackend, &Value) -> Result<Value, GateError> + Send + Sync>;

/// Structural argument checks beyond the schema (path shapes, query clauses,
/// data recursion, batch ceiling). Runs before the policy gates and the rate
/// limiter, so malformed requests never consume budget.
pub type ToolValidator = Box<dyn Fn(&Value) -> Result<(), GateError> + Send + Sync>;

/// Declarative gate requirements for one tool. The dispatcher reads this;
/// handlers never re-check policy themselves.
#[derive(Debug, Clone, Default)]
pub struct GatePlan {
    /// Capability group the tool belongs to; None means always available.
    pub capability: Option<Capability>,
    /// Tools that mutate state are rejected wholesale in read-only mode.
    pub write: bool,
    /// Argument naming the Firestore collection to check the allow-list
    /// against. None for tools outside Firestore.
    pub collection_arg: Option<&'static str>,
    /// Argument holding batch operations; every op path is allow-list
    /// checked by its root collection.
    pub batch_operations_arg: Option<&'static str>,
    pub admin_only: bool,
}

pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
    pub plan: GatePlan,
    pub validate: Option<ToolValidator>,
    pub handler: ToolHandler,
}

/// Name-indexed tool table, filled once at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicate names are a programming error and abort startup.
    pub fn register(&mut self, def: ToolDef) -> Result<(), GateError> {
        if self.index.contains_key(def.name) {
            return Err(GateError::internal(format!(
                "Tool '{}' is already registered",
                def.name
            )));
        }
        self.index.insert(def.name, self.tools.len());
        self.tools.push(def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    /// MCP tools/list entries, in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.schema,
                })
            })
            .collect()
    }
}

/// The gateway itself: registry plus the injected collaborators.
pub struct Dispatcher {
    registry: ToolRegistry,
    backend: Arc<dyn FirebaseBackend>,
    policy: SecurityPolicy,
    limiter: RateLimiter,
}

impl Dispatcher {
    pub fn new(
        registry: ToolRegistry,
        backend: Arc<dyn FirebaseBackend>,
        policy: SecurityPolicy,
        limiter: RateLimiter,
    ) -> Self {
        Self { registry, backend, policy, limiter }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run one tool call through the full pipeline. Every failure path
    /// terminates in an error envelope; nothing propagates.
    pub fn dispatch(&self, name: &str, args: &Value, ctx: &RequestContext) -> ToolResponse {
        match self.try_dispatch(name, args, ctx) {
            Ok(value) => ToolResponse::success(value),
            Err(err) => ToolResponse::failure(err.with_context(name)),
        }
    }

    fn try_dispatch(
        &self,
        name: &str,
        args: &Value,
        ctx: &RequestContext,
    ) -> Result<Value, GateError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| GateError::internal(format!("Unknown tool '{}'", name)))?;

        validate_against_schema(&tool.schema, args)?;
        if let Some(validate) = &tool.validate {
            validate(args)?;
        }

        if let Some(cap) = tool.plan.capability {
            self.policy.check_capability(cap)?;
        }
        let mut resource = name;
        if let Some(arg) = tool.plan.collection_arg {
            if let Some(collection) = args.get(arg).and_then(|v| v.as_str()) {
                self.policy.check_collection_allowed(collection)?;
                resource = collection;
            }
        }
        if let Some(arg) = tool.plan.batch_operations_arg {
            if let Some(ops) = args.get(arg).and_then(|v| v.as_array()) {
                for op in ops {
                    if let Some(path) = op.get("path").and_then(|p| p.as_str()) {
                        self.policy.check_collection_allowed(path)?;
                    }
                }
            }
        }
        if tool.plan.write {
            self.policy.check_write(resource)?;
        }
        if tool.plan.admin_only {
            check_admin(ctx)?;
        }

        self.limiter.enforce(&format!("{}:{}", name, ctx.caller))?;

        log::info!("dispatch {} caller={}", name, ctx.caller);
        (tool.handler)(self.backend.as_ref(), args)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::firebase::mock::MockBackend;
    use crate::rate_limit::RateLimitConfig;
    use crate::tools;
    use serde_json::json;

    fn gateway(policy: SecurityPolicy, limit: u32) -> (Dispatcher, Arc<MockBackend>) {
        let mut registry = ToolRegistry::new();
        tools::register_all(&mut registry).unwrap();
        let backend = Arc::new(MockBackend::new());
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: limit,
            window_ms: 60_000,
        });
        let dispatcher = Dispatcher::new(registry, backend.clone(), policy, limiter);
        (dispatcher, backend)
    }

    fn ctx() -> RequestContext {
        RequestContext::new("local", Default::default())
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        tools::register_all(&mut registry).unwrap();
        let err = registry
            .register(ToolDef {
                name: "firestore_get_document",
                description: "dup",
                schema: json!({"type": "object", "properties": {}}),
                plan: GatePlan::default(),
                validate: None,
                handler: Box::new(|_, _| Ok(json!(null))),
            })
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.contains("already registered"));
    }

    #[test]
    fn unknown_tool_is_internal() {
        let (gw, backend) = gateway(SecurityPolicy::default(), 100);
        let resp = gw.dispatch("no_such_tool", &json!({}), &ctx());
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::Internal));
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn not_found_document_names_doc_and_collection() {
        let (gw, backend) = gateway(SecurityPolicy::default(), 100);
        backend.stub(
            "get_document",
            Err(GateError::not_found(
                "Document 'u1' not found in collection 'users'",
            )),
        );
        let resp = gw.dispatch(
            "firestore_get_document",
            &json!({"collection": "users", "id": "u1"}),
            &ctx(),
        );
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::NotFound));
        assert!(resp.text().contains("u1"));
        assert!(resp.text().contains("users"));
    }

    #[test]
    fn read_only_blocks_write_before_backend() {
        let policy = SecurityPolicy { read_only: true, ..Default::default() };
        let (gw, backend) = gateway(policy, 100);
        let resp = gw.dispatch(
            "firestore_set_document",
            &json!({"collection": "users", "id": "u1", "data": {"a": 1}}),
            &ctx(),
        );
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::Authorization));
        assert_eq!(backend.total_calls(), 0, "backend must never see the write");
    }

    #[test]
    fn read_only_still_permits_reads() {
        let policy = SecurityPolicy { read_only: true, ..Default::default() };
        let (gw, backend) = gateway(policy, 100);
        let resp = gw.dispatch(
            "firestore_get_document",
            &json!({"collection": "users", "id": "u1"}),
            &ctx(),
        );
        assert!(!resp.is_error);
        assert_eq!(backend.call_count("get_document"), 1);
    }

    #[test]
    fn allow_list_gates_collections() {
        let policy = SecurityPolicy {
            allowed_collections: vec!["users".to_string()],
            ..Default::default()
        };
        let (gw, backend) = gateway(policy, 100);
        let ok = gw.dispatch(
            "firestore_get_document",
            &json!({"collection": "users", "id": "u1"}),
            &ctx(),
        );
        assert!(!ok.is_error);
        let denied = gw.dispatch(
            "firestore_get_document",
            &json!({"collection": "secrets", "id": "s1"}),
            &ctx(),
        );
        assert!(denied.is_error);
        assert_eq!(denied.error_kind, Some(ErrorKind::Authorization));
        assert_eq!(backend.call_count("get_document"), 1);
    }

    #[test]
    fn disabled_auth_capability_rejects_auth_tools() {
        let policy = SecurityPolicy { disable_auth: true, ..Default::default() };
        let (gw, backend) = gateway(policy, 100);
        let resp = gw.dispatch("auth_get_user", &json!({"uid": "u1"}), &ctx());
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::Authorization));
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn hundred_first_call_is_rate_limited() {
        let (gw, backend) = gateway(SecurityPolicy::default(), 100);
        for i in 0..100 {
            let resp = gw.dispatch("auth_list_users", &json!({}), &ctx());
            assert!(!resp.is_error, "call {} should pass", i + 1);
        }
        let resp = gw.dispatch("auth_list_users", &json!({}), &ctx());
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::RateLimit));
        assert_eq!(backend.call_count("list_users"), 100);
    }

    #[test]
    fn rate_budgets_are_per_tool_and_caller() {
        let (gw, _backend) = gateway(SecurityPolicy::default(), 1);
        assert!(!gw.dispatch("auth_list_users", &json!({}), &ctx()).is_error);
        // Different tool, same caller: separate budget.
        assert!(!gw
            .dispatch(
                "firestore_get_document",
                &json!({"collection": "users", "id": "u1"}),
                &ctx()
            )
            .is_error);
        // Same tool again: over budget.
        assert!(gw.dispatch("auth_list_users", &json!({}), &ctx()).is_error);
    }

    #[test]
    fn oversized_batch_fails_validation_before_backend() {
        let (gw, backend) = gateway(SecurityPolicy::default(), 1);
        let ops: Vec<Value> = (0..501)
            .map(|i| json!({"type": "delete", "path": format!("users/u{}", i)}))
            .collect();
        let resp = gw.dispatch(
            "firestore_batch_write",
            &json!({"operations": ops}),
            &ctx(),
        );
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::Validation));
        assert_eq!(backend.total_calls(), 0);
        assert!(
            gw.limiter().status("firestore_batch_write:local").is_none(),
            "rejected batch must not consume rate budget"
        );
    }

    #[test]
    fn invalid_arguments_consume_no_rate_budget() {
        let (gw, backend) = gateway(SecurityPolicy::default(), 1);
        // Even collection path fails structural validation.
        let resp = gw.dispatch(
            "firestore_get_document",
            &json!({"collection": "a/b", "id": "x"}),
            &ctx(),
        );
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::Validation));
        assert!(
            gw.limiter().status("firestore_get_document:local").is_none(),
            "invalid request must not consume rate budget"
        );

        // The single-request budget is still intact for a valid call.
        let resp = gw.dispatch(
            "firestore_get_document",
            &json!({"collection": "users", "id": "u1"}),
            &ctx(),
        );
        assert!(!resp.is_error);
        assert_eq!(backend.call_count("get_document"), 1);
    }

    #[test]
    fn schema_violation_names_the_field() {
        let (gw, backend) = gateway(SecurityPolicy::default(), 100);
        let resp = gw.dispatch("firestore_get_document", &json!({"id": "u1"}), &ctx());
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::Validation));
        assert!(resp.text().contains("collection"));
        assert_eq!(backend.total_calls(), 0);
    }

    #[test]
    fn admin_only_tool_requires_role() {
        let (gw, backend) = gateway(SecurityPolicy::default(), 100);
        let resp = gw.dispatch(
            "auth_set_custom_claims",
            &json!({"uid": "u1", "claims": {"role": "editor"}}),
            &ctx(),
        );
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::Authorization));
        assert_eq!(backend.total_calls(), 0);

        let mut roles = std::collections::BTreeSet::new();
        roles.insert("admin".to_string());
        let admin = RequestContext::new("ops", roles);
        let resp = gw.dispatch(
            "auth_set_custom_claims",
            &json!({"uid": "u1", "claims": {"role": "editor"}}),
            &admin,
        );
        assert!(!resp.is_error);
        assert_eq!(backend.call_count("set_custom_claims"), 1);
    }

    #[test]
    fn policy_rejection_consumes_no_rate_budget() {
        let policy = SecurityPolicy { read_only: true, ..Default::default() };
        let (gw, _backend) = gateway(policy, 100);
        for _ in 0..5 {
            gw.dispatch(
                "firestore_set_document",
                &json!({"collection": "users", "id": "u1", "data": {"a": 1}}),
                &ctx(),
            );
        }
        assert!(gw.limiter().status("firestore_set_document:local").is_none());
    }

    #[test]
    fn all_twenty_tools_registered() {
        let mut registry = ToolRegistry::new();
        tools::register_all(&mut registry).unwrap();
        assert_eq!(registry.len(), 20);
        let defs = registry.definitions();
        for def in &defs {
            assert!(def["name"].is_string());
            assert!(def["description"].is_string());
            assert_eq!(def["inputSchema"]["type"], json!("object"));
        }
    }
}
