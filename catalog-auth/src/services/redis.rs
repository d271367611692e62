use async_trait::async_trait;
use chrono::Duration;
use redis::{aio::ConnectionManager, Client, Script};

use crate::models::{RevocationEntry, RevocationReason};
use crate::services::ledger::RevocationLedger;

// KEYS[1] = family sequence, KEYS[2] = revocation entry
// ARGV[1] = expected, ARGV[2] = next, ARGV[3] = retention seconds
const ADVANCE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 1 then
    return 0
end
local current = redis.call('GET', KEYS[1])
if current ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

fn family_key(family: &str) -> String {
    format!("ledger:family:{}", family)
}

fn revoked_key(family: &str) -> String {
    format!("ledger:revoked:{}", family)
}

fn subject_key(subject_id: &str) -> String {
    format!("ledger:subject:{}", subject_id)
}

/// Ledger shared by every replica. Keys expire after the retention window,
/// so Redis does the garbage collection.
#[derive(Clone)]
pub struct RedisLedger {
    _client: Client,
    manager: ConnectionManager,
    advance: Script,
    retention_seconds: i64,
}

impl RedisLedger {
    pub async fn new(url: &str, retention: Duration) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis revocation ledger");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
            advance: Script::new(ADVANCE_SCRIPT),
            retention_seconds: retention.num_seconds().max(1),
        })
    }
}

#[async_trait]
impl RevocationLedger for RedisLedger {
    async fn open_family(&self, family: &str, subject_id: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let subject = subject_key(subject_id);

        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(family_key(family))
            .arg(0u64)
            .arg("NX")
            .arg("EX")
            .arg(self.retention_seconds)
            .ignore()
            .cmd("SADD")
            .arg(&subject)
            .arg(family)
            .ignore()
            .cmd("EXPIRE")
            .arg(&subject)
            .arg(self.retention_seconds)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open token family: {}", e))
    }

    async fn latest_sequence(&self, family: &str) -> Result<Option<u64>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(family_key(family))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read family sequence: {}", e))
    }

    async fn advance(
        &self,
        family: &str,
        expected: u64,
        next: u64,
    ) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let swapped: i64 = self
            .advance
            .key(family_key(family))
            .key(revoked_key(family))
            .arg(expected)
            .arg(next)
            .arg(self.retention_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to advance family sequence: {}", e))?;

        Ok(swapped == 1)
    }

    async fn revoke(&self, family: &str, reason: RevocationReason) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let entry = serde_json::to_string(&RevocationEntry::new(family, reason))?;

        redis::cmd("SET")
            .arg(revoked_key(family))
            .arg(entry)
            .arg("EX")
            .arg(self.retention_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke token family: {}", e))
    }

    async fn is_revoked(&self, family: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(revoked_key(family))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check revocation: {}", e))?;

        Ok(exists)
    }

    async fn revocation(&self, family: &str) -> Result<Option<RevocationEntry>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(revoked_key(family))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read revocation: {}", e))?;

        raw.map(|json| serde_json::from_str(&json).map_err(anyhow::Error::from))
            .transpose()
    }

    async fn families_for_subject(&self, subject_id: &str) -> Result<Vec<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let mut families: Vec<String> = redis::cmd("SMEMBERS")
            .arg(subject_key(subject_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list subject families: {}", e))?;

        families.sort();
        Ok(families)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(family_key("abc"), "ledger:family:abc");
        assert_eq!(revoked_key("abc"), "ledger:revoked:abc");
        assert_eq!(subject_key("user_1"), "ledger:subject:user_1");
    }

    async fn connect() -> RedisLedger {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        RedisLedger::new(&url, Duration::minutes(5)).await.unwrap()
    }

    fn unique(prefix: &str) -> String {
        format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_advance_against_redis() {
        let ledger = connect().await;
        let family = unique("fam");
        ledger.open_family(&family, &unique("user")).await.unwrap();

        assert_eq!(ledger.latest_sequence(&family).await.unwrap(), Some(0));
        assert!(ledger.advance(&family, 0, 1).await.unwrap());
        assert!(!ledger.advance(&family, 0, 1).await.unwrap());

        ledger
            .revoke(&family, RevocationReason::Logout)
            .await
            .unwrap();
        assert!(!ledger.advance(&family, 1, 2).await.unwrap());

        let entry = ledger.revocation(&family).await.unwrap().unwrap();
        assert_eq!(entry.reason, RevocationReason::Logout);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_subject_index_against_redis() {
        let ledger = connect().await;
        let subject = unique("user");
        let first = unique("fam");
        let second = unique("fam");
        ledger.open_family(&first, &subject).await.unwrap();
        ledger.open_family(&second, &subject).await.unwrap();

        let families = ledger.families_for_subject(&subject).await.unwrap();
        assert_eq!(families.len(), 2);
        assert!(families.contains(&first) && families.contains(&second));
    }
}
