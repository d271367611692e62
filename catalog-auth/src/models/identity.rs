use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Permission;

/// Privilege tier. Declaration order is the privilege order, so the derived
/// `Ord` gives `Customer < Admin < SuperAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Tenant identifier (e.g. `tinashop`). Compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopId(String);

impl ShopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShopId {
    fn from(value: &str) -> Self {
        ShopId::new(value)
    }
}

/// User record as held by the credential store. Read-only to the core.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub role: Role,
    pub shop: ShopId,
    /// Additive grants on top of the role's base permissions.
    pub permission_overrides: BTreeSet<Permission>,
    pub active: bool,
    pub verified: bool,
}

impl Identity {
    /// Active, verified identity with no overrides.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        secret_hash: impl Into<String>,
        role: Role,
        shop: ShopId,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            secret_hash: secret_hash.into(),
            role,
            shop,
            permission_overrides: BTreeSet::new(),
            active: true,
            verified: true,
        }
    }

    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = Permission>) -> Self {
        self.permission_overrides.extend(overrides);
        self
    }
}
