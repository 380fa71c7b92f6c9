//! Provider budget guard
//!
//! Caps outbound provider calls with a fixed rolling window per provider.
//! Every admission decision is local and synchronous; rejected calls are
//! not counted against the budget.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tracing::debug;

use crate::types::ProviderUsage;

/// Default window length in milliseconds
pub const DEFAULT_WINDOW_MS: i64 = 60_000;
/// Default calls allowed per window for providers without an override
pub const DEFAULT_CALL_LIMIT: u32 = 200;

/// Budget guard settings
#[derive(Debug, Clone)]
pub struct BudgetGuardConfig {
    /// Window length in milliseconds
    pub window_ms: i64,
    /// Limit applied to providers without an explicit entry
    pub default_limit: u32,
    /// Per-provider limit overrides
    pub limits: HashMap<String, u32>,
}

impl Default for BudgetGuardConfig {
    fn default() -> Self {
        BudgetGuardConfig {
            window_ms: DEFAULT_WINDOW_MS,
            default_limit: DEFAULT_CALL_LIMIT,
            limits: HashMap::new(),
        }
    }
}

/// Call counter for one provider inside its current window
#[derive(Debug, Clone, Copy)]
struct ProviderWindow {
    /// Wall-clock start of the window, epoch milliseconds
    window_start: i64,
    /// Admitted calls since `window_start`
    calls: u32,
}

/// Tracks per-provider call budgets over fixed rolling windows.
///
/// Shared across all ingestion tasks behind an `Arc`. Admission never
/// fails: callers get a plain yes/no and decide what to skip.
#[derive(Debug)]
pub struct ProviderBudgetGuard {
    config: BudgetGuardConfig,
    windows: Mutex<HashMap<String, ProviderWindow>>,
}

impl Default for ProviderBudgetGuard {
    fn default() -> Self {
        ProviderBudgetGuard::new(BudgetGuardConfig::default())
    }
}

impl ProviderBudgetGuard {
    pub fn new(config: BudgetGuardConfig) -> Self {
        ProviderBudgetGuard {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Limit applied to the given provider
    pub fn limit_for(&self, provider: &str) -> u32 {
        self.config
            .limits
            .get(provider)
            .copied()
            .unwrap_or(self.config.default_limit)
    }

    /// Ask permission to make one call to `provider` right now.
    ///
    /// Returns true and counts the call when budget remains. Returns
    /// false without counting when the window is exhausted. A provider
    /// seen for the first time starts a fresh window on this call.
    pub fn admit(&self, provider: &str) -> bool {
        self.admit_at(provider, Utc::now().timestamp_millis())
    }

    fn admit_at(&self, provider: &str, now_ms: i64) -> bool {
        let limit = self.limit_for(provider);
        let mut windows = self.lock_windows();
        let window = windows
            .entry(provider.to_string())
            .or_insert(ProviderWindow {
                window_start: now_ms,
                calls: 0,
            });

        // Reset first, then check, then count. A rejection still gets
        // the reset so the next call after expiry succeeds.
        if now_ms - window.window_start > self.config.window_ms {
            window.window_start = now_ms;
            window.calls = 0;
        }

        if window.calls >= limit {
            debug!(
                provider = provider,
                calls = window.calls,
                limit = limit,
                "provider budget exhausted"
            );
            return false;
        }

        window.calls += 1;
        true
    }

    /// Current usage for one provider. Providers that never asked for
    /// admission report zero calls against their configured limit.
    pub fn usage(&self, provider: &str) -> ProviderUsage {
        let limit = self.limit_for(provider);
        let calls = self
            .lock_windows()
            .get(provider)
            .map(|w| w.calls)
            .unwrap_or(0);
        ProviderUsage {
            provider: provider.to_string(),
            calls,
            limit,
            remaining: limit.saturating_sub(calls),
        }
    }

    /// Usage rows for every provider seen so far, sorted by name
    pub fn usage_all(&self) -> Vec<ProviderUsage> {
        let mut rows: Vec<ProviderUsage> = self
            .lock_windows()
            .iter()
            .map(|(provider, window)| {
                let limit = self.limit_for(provider);
                ProviderUsage {
                    provider: provider.clone(),
                    calls: window.calls,
                    limit,
                    remaining: limit.saturating_sub(window.calls),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.provider.cmp(&b.provider));
        rows
    }

    // Counter state must survive a poisoned lock, so recover the inner
    // map instead of skipping the update.
    fn lock_windows(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProviderWindow>> {
        match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_with_limit(limit: u32) -> ProviderBudgetGuard {
        ProviderBudgetGuard::new(BudgetGuardConfig {
            window_ms: DEFAULT_WINDOW_MS,
            default_limit: limit,
            limits: HashMap::new(),
        })
    }

    #[test]
    fn admits_until_limit_then_rejects() {
        let guard = guard_with_limit(3);
        let t0 = 1_000_000;

        assert!(guard.admit_at("coingecko", t0));
        assert!(guard.admit_at("coingecko", t0 + 10));
        assert!(guard.admit_at("coingecko", t0 + 20));
        assert!(!guard.admit_at("coingecko", t0 + 30));
        assert!(!guard.admit_at("coingecko", t0 + 40));

        let usage = guard.usage("coingecko");
        assert_eq!(usage.calls, 3);
        assert_eq!(usage.remaining, 0);
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let guard = guard_with_limit(2);
        let t0 = 5_000_000;

        assert!(guard.admit_at("vox", t0));
        assert!(guard.admit_at("vox", t0 + 1));
        assert!(!guard.admit_at("vox", t0 + 2));

        // An elapsed time of exactly window_ms is still inside the window.
        assert!(!guard.admit_at("vox", t0 + DEFAULT_WINDOW_MS));
        // One millisecond past it starts a fresh window.
        assert!(guard.admit_at("vox", t0 + DEFAULT_WINDOW_MS + 1));
        assert_eq!(guard.usage("vox").calls, 1);
    }

    #[test]
    fn rejected_calls_do_not_consume_budget() {
        let guard = guard_with_limit(1);
        let t0 = 42;

        assert!(guard.admit_at("defillama", t0));
        for i in 0..10 {
            assert!(!guard.admit_at("defillama", t0 + i));
        }
        assert_eq!(guard.usage("defillama").calls, 1);
    }

    #[test]
    fn providers_are_isolated() {
        let guard = guard_with_limit(1);
        let t0 = 0;

        assert!(guard.admit_at("a", t0));
        assert!(!guard.admit_at("a", t0 + 1));
        assert!(guard.admit_at("b", t0 + 2));

        assert_eq!(guard.usage("a").calls, 1);
        assert_eq!(guard.usage("b").calls, 1);
    }

    #[test]
    fn per_provider_override_beats_default() {
        let mut limits = HashMap::new();
        limits.insert("coingecko".to_string(), 1);
        let guard = ProviderBudgetGuard::new(BudgetGuardConfig {
            window_ms: DEFAULT_WINDOW_MS,
            default_limit: 5,
            limits,
        });

        assert!(guard.admit_at("coingecko", 0));
        assert!(!guard.admit_at("coingecko", 1));
        assert_eq!(guard.limit_for("coingecko"), 1);
        assert_eq!(guard.limit_for("anything_else"), 5);
    }

    #[test]
    fn usage_for_unseen_provider_is_zero_against_limit() {
        let guard = guard_with_limit(7);
        let usage = guard.usage("never_called");
        assert_eq!(usage.calls, 0);
        assert_eq!(usage.limit, 7);
        assert_eq!(usage.remaining, 7);
    }

    #[test]
    fn usage_all_lists_every_seen_provider_sorted() {
        let guard = guard_with_limit(10);
        guard.admit_at("zeta", 0);
        guard.admit_at("alpha", 0);
        guard.admit_at("alpha", 1);

        let rows = guard.usage_all();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].provider, "alpha");
        assert_eq!(rows[0].calls, 2);
        assert_eq!(rows[1].provider, "zeta");
        assert_eq!(rows[1].calls, 1);
    }

    #[test]
    fn remaining_plus_calls_equals_limit() {
        let guard = guard_with_limit(5);
        for i in 0..3 {
            guard.admit_at("p", i);
        }
        let usage = guard.usage("p");
        assert_eq!(usage.calls + usage.remaining, usage.limit);
    }
}
