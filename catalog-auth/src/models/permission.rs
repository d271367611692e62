use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission tag, e.g. `product:write`.
///
/// Permissions are opaque to the core: the catalog maps roles to tags and the
/// guard compares tags for equality. Nothing parses the `resource:action` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const USER_READ: Permission = Permission::from_static("user:read");
    pub const USER_WRITE: Permission = Permission::from_static("user:write");
    pub const USER_DELETE: Permission = Permission::from_static("user:delete");

    pub const PRODUCT_READ: Permission = Permission::from_static("product:read");
    pub const PRODUCT_WRITE: Permission = Permission::from_static("product:write");
    pub const PRODUCT_DELETE: Permission = Permission::from_static("product:delete");

    pub const ORDER_READ: Permission = Permission::from_static("order:read");
    pub const ORDER_WRITE: Permission = Permission::from_static("order:write");
    pub const ORDER_DELETE: Permission = Permission::from_static("order:delete");

    pub const ADMIN_PANEL: Permission = Permission::from_static("admin:panel");
    pub const SYSTEM_CONFIG: Permission = Permission::from_static("system:config");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Permission::new(value.to_string())
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Permission::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_and_static_tags_compare_equal() {
        assert_eq!(Permission::from("product:write"), Permission::PRODUCT_WRITE);
    }

    #[test]
    fn serializes_as_bare_string() {
        let json = serde_json::to_string(&Permission::ORDER_READ).unwrap();
        assert_eq!(json, "\"order:read\"");

        let back: Permission = serde_json::from_str("\"admin:panel\"").unwrap();
        assert_eq!(back, Permission::ADMIN_PANEL);
    }
}
