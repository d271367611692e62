//! Revocation ledger: the only shared mutable state in the auth core.
//!
//! Callers must never cache a family's latest sequence across requests; every
//! refresh re-reads it and advances it through [`RevocationLedger::advance`],
//! which is the single compare-and-swap that serialises concurrent rotations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::models::{RevocationEntry, RevocationReason};

#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Record a new family at sequence 0 and index it under its subject.
    async fn open_family(&self, family: &str, subject_id: &str) -> Result<(), anyhow::Error>;

    async fn latest_sequence(&self, family: &str) -> Result<Option<u64>, anyhow::Error>;

    /// Atomically move `family` from `expected` to `next`. Returns `false`
    /// when the stored sequence differs, the family is unknown, or the family
    /// has been revoked.
    async fn advance(&self, family: &str, expected: u64, next: u64)
        -> Result<bool, anyhow::Error>;

    /// Idempotent: a second revocation overwrites the first entry.
    async fn revoke(&self, family: &str, reason: RevocationReason) -> Result<(), anyhow::Error>;

    async fn is_revoked(&self, family: &str) -> Result<bool, anyhow::Error>;

    async fn revocation(&self, family: &str) -> Result<Option<RevocationEntry>, anyhow::Error>;

    async fn families_for_subject(&self, subject_id: &str) -> Result<Vec<String>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone)]
struct FamilyRecord {
    subject_id: String,
    latest: u64,
    revoked: bool,
    touched_at: DateTime<Utc>,
}

/// Process-local ledger. Correct for a single replica; horizontally scaled
/// deployments need a shared backend such as [`crate::services::RedisLedger`].
pub struct InMemoryLedger {
    retention: Duration,
    families: DashMap<String, FamilyRecord>,
    revocations: DashMap<String, RevocationEntry>,
    subjects: DashMap<String, HashSet<String>>,
}

impl InMemoryLedger {
    /// `retention` must be at least the refresh-token lifetime.
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            families: DashMap::new(),
            revocations: DashMap::new(),
            subjects: DashMap::new(),
        }
    }

    /// Drop family records and revocation entries untouched for longer than
    /// the retention window. Every token they could vouch for has expired.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;

        self.families.retain(|_, record| {
            let keep = now - record.touched_at < self.retention;
            purged += usize::from(!keep);
            keep
        });
        self.revocations.retain(|_, entry| {
            let keep = now - entry.revoked_at < self.retention;
            purged += usize::from(!keep);
            keep
        });
        self.subjects.retain(|_, families| {
            families.retain(|family| self.families.contains_key(family));
            !families.is_empty()
        });

        purged
    }

    /// Run [`Self::purge_expired`] every `interval` until the handle is aborted.
    pub fn spawn_gc(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired(Utc::now());
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired ledger entries");
                }
            }
        })
    }
}

#[async_trait]
impl RevocationLedger for InMemoryLedger {
    async fn open_family(&self, family: &str, subject_id: &str) -> Result<(), anyhow::Error> {
        self.families.insert(
            family.to_string(),
            FamilyRecord {
                subject_id: subject_id.to_string(),
                latest: 0,
                revoked: false,
                touched_at: Utc::now(),
            },
        );
        self.subjects
            .entry(subject_id.to_string())
            .or_default()
            .insert(family.to_string());
        Ok(())
    }

    async fn latest_sequence(&self, family: &str) -> Result<Option<u64>, anyhow::Error> {
        Ok(self.families.get(family).map(|record| record.latest))
    }

    async fn advance(
        &self,
        family: &str,
        expected: u64,
        next: u64,
    ) -> Result<bool, anyhow::Error> {
        // The entry guard holds the shard lock for the whole compare-and-set.
        match self.families.get_mut(family) {
            Some(mut record) if !record.revoked && record.latest == expected => {
                record.latest = next;
                record.touched_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, family: &str, reason: RevocationReason) -> Result<(), anyhow::Error> {
        if let Some(mut record) = self.families.get_mut(family) {
            record.revoked = true;
        }
        self.revocations
            .insert(family.to_string(), RevocationEntry::new(family, reason));
        Ok(())
    }

    async fn is_revoked(&self, family: &str) -> Result<bool, anyhow::Error> {
        Ok(self.revocations.contains_key(family))
    }

    async fn revocation(&self, family: &str) -> Result<Option<RevocationEntry>, anyhow::Error> {
        Ok(self.revocations.get(family).map(|entry| entry.clone()))
    }

    async fn families_for_subject(&self, subject_id: &str) -> Result<Vec<String>, anyhow::Error> {
        let mut families: Vec<String> = self
            .subjects
            .get(subject_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        families.retain(|family| {
            self.families
                .get(family)
                .map(|record| record.subject_id == subject_id)
                .unwrap_or(false)
        });
        families.sort();
        Ok(families)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
