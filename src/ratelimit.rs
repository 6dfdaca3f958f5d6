use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::GatewayResult;

pub const WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

type LedgerKey = (String, Uuid);

// Per (credential, route) ledger of request timestamps. Strictly sliding:
// a request ages out exactly sixty seconds after it was admitted, not at
// a calendar-minute boundary.
pub struct SlidingWindowLimiter {
    ledger: DashMap<LedgerKey, Arc<Mutex<VecDeque<DateTime<Utc>>>>>,
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self {
            ledger: DashMap::new(),
        }
    }

    fn entry_for(&self, credential: &str, route_id: Uuid) -> Arc<Mutex<VecDeque<DateTime<Utc>>>> {
        self.ledger
            .entry((credential.to_string(), route_id))
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    pub async fn check(
        &self,
        credential: &str,
        route_id: Uuid,
        ceiling: u32,
    ) -> GatewayResult<RateDecision> {
        self.check_at(Utc::now(), credential, route_id, ceiling).await
    }

    // Timestamp injection keeps window-expiry behavior testable without
    // wall-clock waits.
    pub async fn check_at(
        &self,
        now: DateTime<Utc>,
        credential: &str,
        route_id: Uuid,
        ceiling: u32,
    ) -> GatewayResult<RateDecision> {
        let entries = self.entry_for(credential, route_id);
        let mut entries = entries.lock().await;

        let window_start = now - Duration::seconds(WINDOW_SECS);
        while let Some(front) = entries.front() {
            if *front <= window_start {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() >= ceiling as usize {
            let oldest = entries.front().copied().unwrap_or(now);
            return Ok(RateDecision {
                allowed: false,
                remaining: 0,
                reset_at: oldest + Duration::seconds(WINDOW_SECS),
            });
        }

        entries.push_back(now);
        Ok(RateDecision {
            allowed: true,
            remaining: ceiling.saturating_sub(entries.len() as u32),
            reset_at: now + Duration::seconds(WINDOW_SECS),
        })
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    // Evicts keys whose every timestamp has aged out. Keys mid-check hold
    // their mutex and are skipped rather than waited on.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let window_start = now - Duration::seconds(WINDOW_SECS);
        let before = self.ledger.len();
        self.ledger.retain(|_, state| match state.try_lock() {
            Ok(entries) => entries.back().is_some_and(|newest| *newest > window_start),
            Err(_) => true,
        });
        before - self.ledger.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.ledger.len()
    }
}
