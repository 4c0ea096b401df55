// Firebase MCP Gateway - Configuration
//
// Layered configuration, later layers win: built-in defaults < JSON config
// file < environment variables < CLI flags (applied in main.rs). The result
// is immutable for the process lifetime; there is no hot reload.

use crate::policy::SecurityPolicy;
use crate::rate_limit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Firebase project id; required to serve.
    pub project_id: String,
    /// Path to the service-account key JSON.
    pub service_account_path: String,
    /// Default Cloud Storage bucket; empty means "<project_id>.appspot.com".
    pub storage_bucket: String,
    pub security: SecurityPolicy,
    pub rate_limit: RateLimitConfig,
}

impl ServerConfig {
    /// Load from a JSON file, falling back to defaults when absent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            log::warn!("Config not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save the effective config as pretty JSON.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment overrides, applied on top of file values.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("FIREBASE_PROJECT_ID") {
            if !v.is_empty() {
                self.project_id = v;
            }
        }
        if let Ok(v) = std::env::var("SERVICE_ACCOUNT_KEY_PATH") {
            if !v.is_empty() {
                self.service_account_path = v;
            }
        }
        if let Ok(v) = std::env::var("FIREBASE_STORAGE_BUCKET") {
            if !v.is_empty() {
                self.storage_bucket = v;
            }
        }
        if let Some(v) = env_bool("FIREBASE_MCP_READ_ONLY") {
            self.security.read_only = v;
        }
        if let Ok(v) = std::env::var("FIREBASE_MCP_ALLOWED_COLLECTIONS") {
            let list: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !list.is_empty() {
                self.security.allowed_collections = list;
            }
        }
        if let Some(v) = env_bool("FIREBASE_MCP_DISABLE_AUTH") {
            self.security.disable_auth = v;
        }
        if let Some(v) = env_bool("FIREBASE_MCP_DISABLE_STORAGE") {
            self.security.disable_storage = v;
        }
        if let Ok(v) = std::env::var("FIREBASE_MCP_RATE_LIMIT") {
            if let Ok(n) = v.parse::<u32>() {
                if n > 0 {
                    self.rate_limit.max_requests = n;
                }
            }
        }
        if let Ok(v) = std::env::var("FIREBASE_MCP_RATE_WINDOW_MS") {
            if let Ok(n) = v.parse::<i64>() {
                if n > 0 {
                    self.rate_limit.window_ms = n;
                }
            }
        }
    }

    /// Bucket name with the project-default fallback.
    pub fn bucket(&self) -> String {
        if self.storage_bucket.is_empty() {
            format!("{}.appspot.com", self.project_id)
        } else {
            self.storage_bucket.clone()
        }
    }

    /// Sanity checks before serving.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project_id.is_empty() {
            anyhow::bail!(
                "project_id is not set (use --config, FIREBASE_PROJECT_ID, or the config file)"
            );
        }
        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("rate_limit.max_requests must be greater than zero");
        }
        if self.rate_limit.window_ms <= 0 {
            anyhow::bail!("rate_limit.window_ms must be greater than zero");
        }
        Ok(())
    }
}

fn env_bool(name: &str) -> Option<bool> {
    match std::env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        Err(_) => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
