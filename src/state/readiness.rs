//! Cycle-scoped readiness signal.
//!
//! `begin_cycle` marks the snapshot as not ready and hands back a [`Cycle`] token;
//! only consuming that token in `end_cycle` marks it ready again. A sweep that
//! never reaches its barrier therefore cannot publish "ready".

use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::state::kv_store::KvStore;

const READY: &str = "1";
const NOT_READY: &str = "0";

/// Proof that a cycle was opened. Not `Clone`: each cycle ends at most once.
#[derive(Debug)]
#[must_use = "a cycle that is never ended leaves the flag at not-ready"]
pub struct Cycle {
    sweep_no: u64,
}

impl Cycle {
    pub fn sweep_no(&self) -> u64 {
        self.sweep_no
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessFlag {
    store: KvStore,
    key: String,
    ttl: Duration,
}

impl ReadinessFlag {
    pub fn new(store: KvStore, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn begin_cycle(&self, sweep_no: u64) -> Result<Cycle> {
        self.store.set_ex(&self.key, NOT_READY, self.ttl).await?;
        debug!(key = %self.key, sweep_no, "Readiness cleared");
        Ok(Cycle { sweep_no })
    }

    pub async fn end_cycle(&self, cycle: Cycle) -> Result<()> {
        self.store.set_ex(&self.key, READY, self.ttl).await?;
        debug!(key = %self.key, sweep_no = cycle.sweep_no(), "Readiness set");
        Ok(())
    }

    /// Missing or expired reads as not ready.
    pub async fn is_ready(&self) -> Result<bool> {
        Ok(self.store.get(&self.key).await?.as_deref() == Some(READY))
    }
}
