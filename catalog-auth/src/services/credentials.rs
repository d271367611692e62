use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::models::{Identity, Permission, Role, ShopId};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Read-only view of the user store. Registration, profile edits and
/// password changes live elsewhere.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Identity>, anyhow::Error>;

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Identity>, anyhow::Error>;

    async fn verify_secret(
        &self,
        identity: &Identity,
        password: &Password,
    ) -> Result<bool, anyhow::Error> {
        verify_hash(identity.secret_hash.clone(), password.clone()).await
    }
}

/// Argon2 verification off the async executor.
pub(crate) async fn verify_hash(hash: String, password: Password) -> Result<bool, anyhow::Error> {
    tokio::task::spawn_blocking(move || verify_password(&password, &PasswordHashString::new(hash)))
        .await
        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?
}

#[derive(Debug, Deserialize)]
struct SeedIdentity {
    #[serde(default)]
    id: Option<String>,
    email: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    password_hash: Option<String>,
    role: Role,
    shop: ShopId,
    #[serde(default)]
    permissions: BTreeSet<Permission>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default = "default_true")]
    verified: bool,
}

fn default_true() -> bool {
    true
}

/// Identities held in memory, keyed by id with a case-insensitive email index.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    identities: DashMap<String, Identity>,
    email_index: DashMap<String, String>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: Identity) {
        self.email_index
            .insert(identity.email.to_lowercase(), identity.id.clone());
        self.identities.insert(identity.id.clone(), identity);
    }

    /// Hash `password` and store a new active identity.
    pub fn register(
        &self,
        email: &str,
        password: &Password,
        role: Role,
        shop: ShopId,
    ) -> Result<Identity, anyhow::Error> {
        let hash = hash_password(password)?;
        let identity = Identity::new(
            uuid::Uuid::new_v4().to_string(),
            email,
            hash.into_string(),
            role,
            shop,
        );
        self.insert(identity.clone());
        Ok(identity)
    }

    /// Apply `change` to a stored identity. Returns `false` if the id is unknown.
    pub fn update(&self, id: &str, change: impl FnOnce(&mut Identity)) -> bool {
        match self.identities.get_mut(id) {
            Some(mut identity) => {
                let old_email = identity.email.to_lowercase();
                change(&mut *identity);
                let new_email = identity.email.to_lowercase();
                if old_email != new_email {
                    self.email_index.remove(&old_email);
                    self.email_index.insert(new_email, identity.id.clone());
                }
                true
            }
            None => false,
        }
    }

    pub fn set_active(&self, id: &str, active: bool) -> bool {
        self.update(id, |identity| identity.active = active)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Load identities from a JSON array. Each entry carries either a
    /// plaintext `password`, hashed here, or a precomputed `password_hash`.
    pub fn load_seed(&self, path: impl AsRef<Path>) -> Result<usize, anyhow::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read credentials seed {}: {}", path.display(), e)
        })?;
        let entries: Vec<SeedIdentity> = serde_json::from_str(&raw).map_err(|e| {
            anyhow::anyhow!("Failed to parse credentials seed {}: {}", path.display(), e)
        })?;

        let count = entries.len();
        for entry in entries {
            let secret_hash = match (entry.password_hash, entry.password) {
                (Some(hash), _) => hash,
                (None, Some(plain)) => hash_password(&Password::new(plain))?.into_string(),
                (None, None) => {
                    return Err(anyhow::anyhow!(
                        "Seed entry {} has neither password nor password_hash",
                        entry.email
                    ))
                }
            };

            let mut identity = Identity::new(
                entry.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                entry.email,
                secret_hash,
                entry.role,
                entry.shop,
            )
            .with_overrides(entry.permissions);
            identity.active = entry.active;
            identity.verified = entry.verified;

            self.insert(identity);
        }

        tracing::info!(count, path = %path.display(), "Loaded credentials seed");
        Ok(count)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Identity>, anyhow::Error> {
        let id = match self.email_index.get(&email.to_lowercase()) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        Ok(self.identities.get(&id).map(|identity| identity.clone()))
    }

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Identity>, anyhow::Error> {
        Ok(self.identities.get(id).map(|identity| identity.clone()))
    }
}
