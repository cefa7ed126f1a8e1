//! Per-client rate limiting using GCRA (Generic Cell Rate Algorithm)

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

/// Checks between sweeps of expired client entries
const PRUNE_EVERY: u64 = 1024;

/// Theoretical arrival times per client, for a single node
pub struct InMemoryStorage {
    state: DashMap<IpAddr, u64>,
    checks: AtomicU64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Returns `Some(retry_after_nanos)` when the request must be rejected
    pub fn check_and_update(
        &self,
        key: IpAddr,
        now_nanos: u64,
        emission_interval_nanos: u64,
        delay_tolerance_nanos: u64,
    ) -> Option<u64> {
        let verdict = {
            let initial_tat = now_nanos
                .saturating_sub(delay_tolerance_nanos.saturating_add(emission_interval_nanos));
            let mut entry = self.state.entry(key).or_insert(initial_tat);

            let tat = *entry;
            let allow_at = tat.saturating_sub(delay_tolerance_nanos);

            if now_nanos < allow_at {
                Some(allow_at - now_nanos)
            } else {
                *entry = tat.max(now_nanos).saturating_add(emission_interval_nanos);
                None
            }
        };

        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune(now_nanos);
        }

        verdict
    }

    /// Drop clients whose arrival time has passed; they are
    /// indistinguishable from clients never seen
    pub fn prune(&self, now_nanos: u64) {
        self.state.retain(|_, tat| *tat > now_nanos);
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limiter settings
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_capacity: u32,
}

impl RateLimitConfig {
    pub fn new(requests_per_minute: u32, burst_capacity: u32) -> Self {
        Self {
            requests_per_minute,
            burst_capacity,
        }
    }

    pub fn emission_interval_nanos(&self) -> u64 {
        (60_000_000_000 / u64::from(self.requests_per_minute.max(1))).max(1)
    }

    pub fn delay_tolerance_nanos(&self) -> u64 {
        // burst=1 -> tolerance=0; burst=n -> n requests may arrive at once
        self.emission_interval_nanos()
            .saturating_mul(u64::from(self.burst_capacity.saturating_sub(1)))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(10, 3)
    }
}

impl From<&crate::config::RateLimitConfig> for RateLimitConfig {
    fn from(config: &crate::config::RateLimitConfig) -> Self {
        Self::new(config.requests_per_minute, config.burst_capacity)
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    /// Rejected; retry after this many whole seconds
    Limited { retry_after: u32 },
}

/// Per-client GCRA limiter
pub struct RateLimiter {
    config: RateLimitConfig,
    storage: InMemoryStorage,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            storage: InMemoryStorage::new(),
        }
    }

    pub fn check(&self, ip: IpAddr) -> RateDecision {
        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        self.check_at(ip, now_nanos)
    }

    pub fn check_at(&self, ip: IpAddr, now_nanos: u64) -> RateDecision {
        match self.storage.check_and_update(
            ip,
            now_nanos,
            self.config.emission_interval_nanos(),
            self.config.delay_tolerance_nanos(),
        ) {
            Some(retry_after_nanos) => {
                let retry_after = retry_after_nanos.div_ceil(1_000_000_000).max(1);
                RateDecision::Limited {
                    retry_after: u32::try_from(retry_after).unwrap_or(u32::MAX),
                }
            }
            None => RateDecision::Allow,
        }
    }

    pub fn storage(&self) -> &InMemoryStorage {
        &self.storage
    }
}
