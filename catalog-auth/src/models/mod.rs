pub mod claims;
pub mod identity;
pub mod permission;
pub mod revocation;

pub use claims::{CredentialPair, TokenClaims, TokenKind};
pub use identity::{Identity, Role, ShopId};
pub use permission::Permission;
pub use revocation::{RevocationEntry, RevocationReason};
