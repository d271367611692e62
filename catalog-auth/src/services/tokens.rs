use chrono::{Duration, Utc};
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::JwtConfig;
use crate::models::{CredentialPair, Identity, RevocationReason, TokenClaims, TokenKind};
use crate::services::{AuthError, CredentialStore, JwtService, RevocationLedger};

/// Issues, rotates and revokes credential pairs.
///
/// Holds no per-family state of its own: every rotation re-reads the ledger,
/// so any number of replicas can share one ledger.
#[derive(Clone)]
pub struct TokenService {
    jwt: JwtService,
    ledger: Arc<dyn RevocationLedger>,
    credentials: Arc<dyn CredentialStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        jwt: JwtService,
        ledger: Arc<dyn RevocationLedger>,
        credentials: Arc<dyn CredentialStore>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            jwt,
            ledger,
            credentials,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(
        config: &JwtConfig,
        jwt: JwtService,
        ledger: Arc<dyn RevocationLedger>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self::new(
            jwt,
            ledger,
            credentials,
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        )
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Start a new family at sequence 0, bound to the identity's current
    /// shop and role.
    pub async fn issue(&self, identity: &Identity) -> Result<CredentialPair, AuthError> {
        let family = generate_family_id();
        self.ledger.open_family(&family, &identity.id).await?;

        let pair = self.sign_pair(identity, &family, 0)?;
        tracing::info!(
            subject = %identity.id,
            shop = %identity.shop,
            role = %identity.role,
            family = %family,
            "Issued credential pair"
        );
        Ok(pair)
    }

    /// Rotate a refresh token. Only the latest sequence of a family is
    /// redeemable; presenting any other revokes the whole family.
    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError> {
        let claims = self.jwt.decode(refresh_token, TokenKind::Refresh)?;
        let family = claims.fam.as_str();

        if self.ledger.is_revoked(family).await? {
            tracing::warn!(
                subject = %claims.sub,
                shop = %claims.shop,
                family = %family,
                sequence = claims.seq,
                "Refresh on revoked token family"
            );
            return Err(AuthError::Revoked);
        }

        // Unknown family: garbage-collected or never issued by this ledger.
        let latest = self
            .ledger
            .latest_sequence(family)
            .await?
            .ok_or(AuthError::Revoked)?;

        if claims.seq != latest {
            self.ledger
                .revoke(family, RevocationReason::ReplayDetected)
                .await?;
            tracing::warn!(
                subject = %claims.sub,
                shop = %claims.shop,
                family = %family,
                presented = claims.seq,
                latest,
                "Refresh token replay detected, family revoked"
            );
            return Err(AuthError::ReplayDetected);
        }

        let identity = match self.credentials.lookup_by_id(&claims.sub).await? {
            Some(identity) if identity.active => identity,
            _ => {
                self.ledger
                    .revoke(family, RevocationReason::AccountDeactivated)
                    .await?;
                tracing::warn!(
                    subject = %claims.sub,
                    family = %family,
                    "Refresh for missing or inactive account, family revoked"
                );
                return Err(AuthError::Revoked);
            }
        };

        let next = latest + 1;
        if !self.ledger.advance(family, latest, next).await? {
            if self.ledger.is_revoked(family).await? {
                return Err(AuthError::Revoked);
            }
            tracing::info!(family = %family, sequence = latest, "Lost concurrent refresh race");
            return Err(AuthError::Conflict);
        }

        let pair = self.sign_pair(&identity, family, next)?;
        tracing::debug!(subject = %identity.id, family = %family, sequence = next, "Rotated refresh token");
        Ok(pair)
    }

    /// Terminally revoke a family. Idempotent.
    pub async fn revoke(&self, family: &str, reason: RevocationReason) -> Result<(), AuthError> {
        self.ledger.revoke(family, reason).await?;
        tracing::info!(family = %family, reason = %reason, "Token family revoked");
        Ok(())
    }

    /// Revoke every family opened for `subject_id`. Returns how many were revoked.
    pub async fn revoke_all_for_subject(
        &self,
        subject_id: &str,
        reason: RevocationReason,
    ) -> Result<usize, AuthError> {
        let families = self.ledger.families_for_subject(subject_id).await?;
        for family in &families {
            self.ledger.revoke(family, reason).await?;
        }
        tracing::info!(
            subject = %subject_id,
            reason = %reason,
            count = families.len(),
            "Revoked all token families for subject"
        );
        Ok(families.len())
    }

    pub async fn is_revoked(&self, family: &str) -> Result<bool, AuthError> {
        Ok(self.ledger.is_revoked(family).await?)
    }

    /// Check signature, expiry and family revocation of an access token.
    pub async fn verify_access(&self, access_token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.jwt.decode(access_token, TokenKind::Access)?;
        if self.ledger.is_revoked(&claims.fam).await? {
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }

    fn sign_pair(
        &self,
        identity: &Identity,
        family: &str,
        sequence: u64,
    ) -> Result<CredentialPair, AuthError> {
        let now = Utc::now();
        let claims = |typ: TokenKind, ttl: Duration, perms: BTreeSet<_>| TokenClaims {
            sub: identity.id.clone(),
            iss: self.jwt.issuer().to_string(),
            shop: identity.shop.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            fam: family.to_string(),
            seq: sequence,
            typ,
            jti: uuid::Uuid::new_v4().to_string(),
            perms,
        };

        let access_token = self.jwt.encode(&claims(
            TokenKind::Access,
            self.access_ttl,
            identity.permission_overrides.clone(),
        ))?;
        let refresh_token =
            self.jwt
                .encode(&claims(TokenKind::Refresh, self.refresh_ttl, BTreeSet::new()))?;

        Ok(CredentialPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            token_family: family.to_string(),
            sequence,
        })
    }
}

/// 256 random bits, hex-encoded.
fn generate_family_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
