//! Services layer for catalog-auth.
//!
//! Token issuance and rotation, the revocation ledger, the permission
//! catalog and the authorization guard.

mod auth;
pub mod catalog;
mod credentials;
pub mod error;
mod guard;
mod jwt;
pub mod ledger;
pub mod redis;
mod tokens;

pub use auth::{AuthService, AuthenticatedSession};
pub use catalog::{base_permissions, effective_permissions, PermissionSet};
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use error::AuthError;
pub use guard::{AuthorizationGuard, Decision, DenyReason};
pub use jwt::JwtService;
pub use ledger::{InMemoryLedger, RevocationLedger};
pub use redis::RedisLedger;
pub use tokens::TokenService;
