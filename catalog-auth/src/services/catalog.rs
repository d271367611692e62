//! Role → permission table.
//!
//! The table is compiled in: roles are a closed enum and their grants cannot
//! change while the process runs.

use std::collections::BTreeSet;

use serde::{Serialize, Serializer};

use crate::models::{Identity, Permission, Role, TokenClaims};

const CUSTOMER: &[Permission] = &[
    Permission::PRODUCT_READ,
    Permission::ORDER_READ,
    Permission::ORDER_WRITE,
];

const ADMIN: &[Permission] = &[
    Permission::USER_READ,
    Permission::USER_WRITE,
    Permission::PRODUCT_READ,
    Permission::PRODUCT_WRITE,
    Permission::PRODUCT_DELETE,
    Permission::ORDER_READ,
    Permission::ORDER_WRITE,
    Permission::ORDER_DELETE,
    Permission::ADMIN_PANEL,
];

/// A resolved set of permissions. `All` is the SuperAdmin sentinel and
/// contains every tag, including ones the table has never heard of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSet {
    All,
    Only(BTreeSet<Permission>),
}

impl PermissionSet {
    pub fn contains(&self, permission: &Permission) -> bool {
        match self {
            PermissionSet::All => true,
            PermissionSet::Only(set) => set.contains(permission),
        }
    }

    pub fn is_superset_of(&self, other: &PermissionSet) -> bool {
        match (self, other) {
            (PermissionSet::All, _) => true,
            (PermissionSet::Only(_), PermissionSet::All) => false,
            (PermissionSet::Only(mine), PermissionSet::Only(theirs)) => mine.is_superset(theirs),
        }
    }

    /// Union with additive overrides. Overrides never remove anything.
    pub fn with_overrides<'a>(self, overrides: impl IntoIterator<Item = &'a Permission>) -> Self {
        match self {
            PermissionSet::All => PermissionSet::All,
            PermissionSet::Only(mut set) => {
                set.extend(overrides.into_iter().cloned());
                PermissionSet::Only(set)
            }
        }
    }

    /// Tags for display; the sentinel renders as `*`.
    pub fn to_tags(&self) -> Vec<String> {
        match self {
            PermissionSet::All => vec!["*".to_string()],
            PermissionSet::Only(set) => set.iter().map(|p| p.as_str().to_string()).collect(),
        }
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tags().serialize(serializer)
    }
}

pub fn base_permissions(role: Role) -> PermissionSet {
    let table = match role {
        Role::SuperAdmin => return PermissionSet::All,
        Role::Admin => ADMIN,
        Role::Customer => CUSTOMER,
    };
    PermissionSet::Only(table.iter().cloned().collect())
}

pub fn effective_permissions(identity: &Identity) -> PermissionSet {
    base_permissions(identity.role).with_overrides(&identity.permission_overrides)
}

/// Same resolution as [`effective_permissions`], from verified access-token
/// claims instead of the stored identity.
pub fn effective_permissions_for_claims(claims: &TokenClaims) -> PermissionSet {
    base_permissions(claims.role).with_overrides(&claims.perms)
}
