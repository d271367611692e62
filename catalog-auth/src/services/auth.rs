use std::sync::Arc;

use crate::models::{
    CredentialPair, Identity, Permission, RevocationReason, ShopId, TokenClaims, TokenKind,
};
use crate::services::credentials::verify_hash;
use crate::services::{
    AuthError, AuthorizationGuard, CredentialStore, Decision, TokenService,
};
use crate::utils::{hash_password, Password};

/// A successful login: the new pair and the identity it was issued for.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub tokens: CredentialPair,
    pub identity: Identity,
}

/// Entry points the HTTP handlers call.
#[derive(Clone)]
pub struct AuthService {
    tokens: TokenService,
    credentials: Arc<dyn CredentialStore>,
    guard: AuthorizationGuard,
    require_verified_email: bool,
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        tokens: TokenService,
        credentials: Arc<dyn CredentialStore>,
        require_verified_email: bool,
    ) -> Result<Self, anyhow::Error> {
        // Unknown emails are verified against this so both paths cost one argon2 run.
        let dummy_hash = hash_password(&Password::new(uuid::Uuid::new_v4().to_string()))?;

        Ok(Self {
            tokens,
            credentials,
            guard: AuthorizationGuard::new(),
            require_verified_email,
            dummy_hash: dummy_hash.into_string(),
        })
    }

    /// Account state is only revealed after the secret matches.
    pub async fn login(
        &self,
        email: &str,
        password: &Password,
    ) -> Result<AuthenticatedSession, AuthError> {
        let identity = match self.credentials.lookup_by_email(email.trim()).await? {
            Some(identity) => identity,
            None => {
                let _ = verify_hash(self.dummy_hash.clone(), password.clone()).await;
                tracing::warn!("Login failed: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let matches = match self.credentials.verify_secret(&identity, password).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(subject = %identity.id, "Stored credential hash unusable: {}", e);
                false
            }
        };
        if !matches {
            tracing::warn!(subject = %identity.id, "Login failed: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        if !identity.active || (self.require_verified_email && !identity.verified) {
            tracing::warn!(
                subject = %identity.id,
                active = identity.active,
                verified = identity.verified,
                "Login refused for inactive account"
            );
            return Err(AuthError::AccountInactive);
        }

        let tokens = self.tokens.issue(&identity).await?;
        tracing::info!(subject = %identity.id, shop = %identity.shop, "User logged in");

        Ok(AuthenticatedSession { tokens, identity })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError> {
        self.tokens.refresh(refresh_token).await
    }

    /// Revoke the family behind `refresh_token`. Succeeds for already revoked,
    /// expired or unusable tokens; only ledger failures surface.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = match self
            .tokens
            .jwt()
            .decode_ignoring_expiry(refresh_token, TokenKind::Refresh)
        {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(reason = e.code(), "Logout with unusable token ignored");
                return Ok(());
            }
        };

        // Keep the original reason, e.g. a replay, rather than overwriting it.
        if self.tokens.is_revoked(&claims.fam).await? {
            return Ok(());
        }

        self.tokens
            .revoke(&claims.fam, RevocationReason::Logout)
            .await?;
        tracing::info!(subject = %claims.sub, "User logged out");
        Ok(())
    }

    /// Verify `access_token` and run the guard. A token that fails
    /// verification yields `Deny(Unauthenticated)`; `Err` means the ledger
    /// could not be consulted.
    pub async fn authorize(
        &self,
        access_token: &str,
        required: &Permission,
        requested_shop: &ShopId,
    ) -> Result<Decision, AuthError> {
        let claims = match self.tokens.verify_access(access_token).await {
            Ok(claims) => Some(claims),
            Err(AuthError::Internal(e)) => return Err(AuthError::Internal(e)),
            Err(e) => {
                tracing::debug!(reason = e.code(), "Access token rejected");
                None
            }
        };

        Ok(self
            .guard
            .authorize(claims.as_ref(), required, requested_shop))
    }

    /// Revoke every session of `subject_id`, e.g. after a password change.
    pub async fn revoke_all_sessions(
        &self,
        subject_id: &str,
        reason: RevocationReason,
    ) -> Result<usize, AuthError> {
        self.tokens.revoke_all_for_subject(subject_id, reason).await
    }

    /// Current stored identity behind verified claims.
    pub async fn current_identity(&self, claims: &TokenClaims) -> Result<Identity, AuthError> {
        match self.credentials.lookup_by_id(&claims.sub).await? {
            Some(identity) if identity.active => Ok(identity),
            Some(_) => Err(AuthError::AccountInactive),
            None => Err(AuthError::Revoked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::{DenyReason, InMemoryCredentialStore, InMemoryLedger, JwtService};
    use chrono::Duration;

    async fn service(require_verified_email: bool) -> (AuthService, Arc<InMemoryCredentialStore>) {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let tokens = TokenService::new(
            JwtService::from_secret(b"session-test-signing-secret-0000", "catalog-auth"),
            Arc::new(InMemoryLedger::new(Duration::days(7))),
            credentials.clone(),
            Duration::minutes(15),
            Duration::days(7),
        );
        let auth = AuthService::new(tokens, credentials.clone(), require_verified_email).unwrap();
        (auth, credentials)
    }

    fn register(store: &InMemoryCredentialStore, email: &str, role: Role, shop: &str) -> Identity {
        store
            .register(email, &Password::new("hunter2hunter2"), role, ShopId::from(shop))
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_success() {
        let (auth, store) = service(false).await;
        let identity = register(&store, "ana@tinashop.test", Role::Admin, "tinashop");

        let session = auth
            .login("ana@tinashop.test", &Password::new("hunter2hunter2"))
            .await
            .unwrap();
        assert_eq!(session.identity.id, identity.id);
        assert_eq!(session.tokens.sequence, 0);
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_email_look_alike() {
        let (auth, store) = service(false).await;
        register(&store, "ana@tinashop.test", Role::Customer, "tinashop");

        assert!(matches!(
            auth.login("ana@tinashop.test", &Password::new("wrong")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@tinashop.test", &Password::new("wrong"))
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_inactive_account() {
        let (auth, store) = service(false).await;
        let identity = register(&store, "ana@tinashop.test", Role::Customer, "tinashop");
        store.set_active(&identity.id, false);

        assert!(matches!(
            auth.login("ana@tinashop.test", &Password::new("hunter2hunter2"))
                .await,
            Err(AuthError::AccountInactive)
        ));
        // Inactivity is not revealed to a wrong password.
        assert!(matches!(
            auth.login("ana@tinashop.test", &Password::new("wrong")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_unverified_when_required() {
        let (auth, store) = service(true).await;
        let identity = register(&store, "ana@tinashop.test", Role::Customer, "tinashop");
        store.update(&identity.id, |i| i.verified = false);

        assert!(matches!(
            auth.login("ana@tinashop.test", &Password::new("hunter2hunter2"))
                .await,
            Err(AuthError::AccountInactive)
        ));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_tolerates_garbage() {
        let (auth, store) = service(false).await;
        register(&store, "ana@tinashop.test", Role::Customer, "tinashop");
        let session = auth
            .login("ana@tinashop.test", &Password::new("hunter2hunter2"))
            .await
            .unwrap();

        auth.logout(&session.tokens.refresh_token).await.unwrap();
        auth.logout(&session.tokens.refresh_token).await.unwrap();
        auth.logout("not-a-token").await.unwrap();

        assert!(matches!(
            auth.refresh(&session.tokens.refresh_token).await,
            Err(AuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_authorize_with_bad_token_is_unauthenticated() {
        let (auth, _) = service(false).await;
        let decision = auth
            .authorize("garbage", &Permission::PRODUCT_READ, &ShopId::from("tinashop"))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
    }
}
