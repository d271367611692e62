use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Permission, Role, ShopId};

/// Distinguishes the two halves of a credential pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed payload shared by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (identity ID)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Shop the identity belonged to at issuance
    pub shop: ShopId,
    /// Role at issuance
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token family, stable for one login session
    pub fam: String,
    /// Rotation counter within the family
    pub seq: u64,
    pub typ: TokenKind,
    /// Unique token ID
    pub jti: String,
    /// Additive permission overrides (access tokens only)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub perms: BTreeSet<Permission>,
}

/// Access/refresh token pair handed to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    #[serde(skip)]
    pub token_family: String,
    #[serde(skip)]
    pub sequence: u64,
}
