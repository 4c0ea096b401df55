// Firebase MCP Gateway - Security Policy Gate
//
// Static, configuration-derived checks applied before any delegate call.
// Pure functions of (policy, request): no I/O, no mutation, safe on every
// request. Policy is loaded once at startup and never reloaded.

use crate::error::GateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capability groups that can be switched off wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Auth,
    Storage,
}

impl Capability {
    fn label(&self) -> &'static str {
        match self {
            Capability::Auth => "Authentication",
            Capability::Storage => "Storage",
        }
    }
}

/// Process-lifetime access policy. Immutable after config loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    pub read_only: bool,
    /// Empty list means every collection is permitted.
    pub allowed_collections: Vec<String>,
    pub disable_auth: bool,
    pub disable_storage: bool,
}

impl SecurityPolicy {
    /// Fails when the capability has been disabled by configuration.
    pub fn check_capability(&self, cap: Capability) -> Result<(), GateError> {
        let disabled = match cap {
            Capability::Auth => self.disable_auth,
            Capability::Storage => self.disable_storage,
        };
        if disabled {
            return Err(GateError::authorization(format!(
                "{} operations are disabled by server policy",
                cap.label()
            )));
        }
        Ok(())
    }

    /// Fails when an allow-list is set and `collection` is not on it.
    /// Nested paths are gated by their root collection.
    pub fn check_collection_allowed(&self, collection: &str) -> Result<(), GateError> {
        if self.allowed_collections.is_empty() {
            return Ok(());
        }
        let root = collection.split('/').next().unwrap_or(collection);
        if self.allowed_collections.iter().any(|c| c == root) {
            Ok(())
        } else {
            Err(GateError::authorization(format!(
                "Collection '{}' is not in the allowed collections list",
                root
            )))
        }
    }

    /// Fails for any write when the server runs read-only.
    pub fn check_write(&self, resource: &str) -> Result<(), GateError> {
        if self.read_only {
            return Err(GateError::authorization(format!(
                "Write to '{}' rejected: server is in read-only mode",
                resource
            )));
        }
        Ok(())
    }
}

/// Typed per-request context. Replaces the duck-typed "extra" object the
/// protocol hands around: handlers and gates only ever see this.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: String,
    pub roles: BTreeSet<String>,
}

impl RequestContext {
    pub fn new(caller: impl Into<String>, roles: BTreeSet<String>) -> Self {
        Self { caller: caller.into(), roles }
    }

    /// Context for the stdio transport, which carries no authenticated
    /// caller. Roles come from FIREBASE_MCP_CALLER_ROLES (comma list).
    pub fn local() -> Self {
        let roles = std::env::var("FIREBASE_MCP_CALLER_ROLES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { caller: "local".to_string(), roles }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains("admin")
    }
}

/// Admin-only gate: a pure function over the request context.
pub fn check_admin(ctx: &RequestContext) -> Result<(), GateError> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(GateError::authorization(format!(
            "Caller '{}' lacks the admin role required for this operation",
            ctx.caller
        )))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn policy() -> SecurityPolicy {
        SecurityPolicy::default()
    }

    #[test]
    fn read_only_blocks_every_write() {
        let p = SecurityPolicy { read_only: true, ..policy() };
        for resource in ["users", "orders/o1", "bucket/file.txt"] {
            let err = p.check_write(resource).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Authorization);
            assert!(err.message.contains(resource));
        }
    }

    #[test]
    fn writes_allowed_when_not_read_only() {
        assert!(policy().check_write("users").is_ok());
    }

    #[test]
    fn empty_allow_list_permits_everything() {
        assert!(policy().check_collection_allowed("anything").is_ok());
    }

    #[test]
    fn allow_list_membership() {
        let p = SecurityPolicy {
            allowed_collections: vec!["users".to_string(), "orders".to_string()],
            ..policy()
        };
        assert!(p.check_collection_allowed("users").is_ok());
        assert!(p.check_collection_allowed("orders").is_ok());
        // Subcollection paths are gated by their root.
        assert!(p.check_collection_allowed("users/u1/posts").is_ok());
        let err = p.check_collection_allowed("secrets").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authorization);
        assert!(err.message.contains("secrets"));
    }

    #[test]
    fn disabled_capabilities() {
        let p = SecurityPolicy { disable_auth: true, ..policy() };
        assert_eq!(
            p.check_capability(Capability::Auth).unwrap_err().kind,
            ErrorKind::Authorization
        );
        assert!(p.check_capability(Capability::Storage).is_ok());

        let p = SecurityPolicy { disable_storage: true, ..policy() };
        assert!(p.check_capability(Capability::Auth).is_ok());
        assert!(p.check_capability(Capability::Storage).is_err());
    }

    #[test]
    fn admin_gate_is_pure_over_context() {
        let ctx = RequestContext::new("local", BTreeSet::new());
        assert_eq!(check_admin(&ctx).unwrap_err().kind, ErrorKind::Authorization);

        let mut roles = BTreeSet::new();
        roles.insert("admin".to_string());
        let ctx = RequestContext::new("local", roles);
        assert!(check_admin(&ctx).is_ok());
    }
}
