// Firebase MCP Gateway - Fixed-Window Rate Limiter
//
// Per-key request counters, entirely in memory, nothing persisted across
// restarts. One limiter instance per process; each (tool, caller) pair gets
// its own window. Budgets are per instance — a horizontally scaled
// deployment does not share them.

use crate::error::GateError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Immutable limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 100, window_ms: 60_000 }
    }
}

/// One counter per key. Owned exclusively by the limiter.
#[derive(Debug, Clone)]
struct RateLimitRecord {
    count: u32,
    window_reset_at: DateTime<Utc>,
}

/// Read-only view returned by `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub count: u32,
    pub remaining_ms: i64,
}

/// Fixed-window limiter. The whole check-and-increment runs under one lock,
/// so the reject-before-exceed invariant holds on multi-threaded runtimes.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, records: Mutex::new(HashMap::new()) }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request for `key`. Never an error: rejection is
    /// an ordinary `false`. On admission the record is created or bumped;
    /// a rejected attempt still counts against the window.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Utc::now())
    }

    fn check_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        // Lazy cleanup: sweep expired windows on every call, no timer.
        records.retain(|k, rec| k == key || rec.window_reset_at > now);

        match records.get_mut(key) {
            Some(rec) if now < rec.window_reset_at => {
                rec.count += 1;
                rec.count <= self.config.max_requests
            }
            _ => {
                records.insert(
                    key.to_string(),
                    RateLimitRecord {
                        count: 1,
                        window_reset_at: now + Duration::milliseconds(self.config.window_ms),
                    },
                );
                true
            }
        }
    }

    /// Strict variant: rejection becomes a RATE_LIMIT error with a
    /// human-readable wait estimate, rounded up to whole seconds.
    pub fn enforce(&self, key: &str) -> Result<(), GateError> {
        self.enforce_at(key, Utc::now())
    }

    fn enforce_at(&self, key: &str, now: DateTime<Utc>) -> Result<(), GateError> {
        if self.check_at(key, now) {
            return Ok(());
        }
        let wait_secs = {
            let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records
                .get(key)
                .map(|rec| {
                    let ms = (rec.window_reset_at - now).num_milliseconds().max(0);
                    (ms + 999) / 1000
                })
                .unwrap_or(0)
        };
        Err(GateError::rate_limit(format!(
            "Rate limit exceeded for {}: maximum {} requests per {} ms. Try again in {} seconds.",
            key, self.config.max_requests, self.config.window_ms, wait_secs
        )))
    }

    /// Administrative override: forget a key entirely.
    pub fn reset(&self, key: &str) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.remove(key);
    }

    /// Introspection. None when the key has no live record.
    pub fn status(&self, key: &str) -> Option<RateLimitStatus> {
        self.status_at(key, Utc::now())
    }

    fn status_at(&self, key: &str, now: DateTime<Utc>) -> Option<RateLimitStatus> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(key).and_then(|rec| {
            if rec.window_reset_at <= now {
                return None;
            }
            Some(RateLimitStatus {
                count: rec.count,
                remaining_ms: (rec.window_reset_at - now).num_milliseconds(),
            })
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
