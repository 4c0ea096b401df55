// Firebase MCP Gateway - Library Root
//
// All modules exported here for use by the binary and tests.

pub mod config;
pub mod error;
pub mod mcp;
pub mod policy;
pub mod rate_limit;
pub mod registry;
pub mod response;
pub mod tools;
pub mod validate;

/// Firebase collaborator: backend trait, REST implementation, token provider
pub mod firebase;
