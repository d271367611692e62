mod common;

use catalog_auth::{
    models::{Permission, Role, ShopId},
    services::{
        base_permissions, effective_permissions, AuthError, CredentialStore, Decision, DenyReason,
    },
    utils::Password,
};
use common::{TestCore, PASSWORD};

async fn access_token(core: &TestCore, email: &str) -> String {
    core.auth
        .login(email, &Password::new(PASSWORD))
        .await
        .unwrap()
        .tokens
        .access_token
}

#[tokio::test]
async fn test_tinashop_admin_manages_own_catalog_only() {
    let core = TestCore::new();
    core.add_user("admin@tinashop.test", Role::Admin, "tinashop");
    let token = access_token(&core, "admin@tinashop.test").await;

    let own = core
        .auth
        .authorize(&token, &Permission::PRODUCT_WRITE, &ShopId::from("tinashop"))
        .await
        .unwrap();
    assert_eq!(own, Decision::Allow);

    let foreign = core
        .auth
        .authorize(&token, &Permission::PRODUCT_WRITE, &ShopId::from("othershop"))
        .await
        .unwrap();
    assert_eq!(foreign, Decision::Deny(DenyReason::TenantMismatch));
}

#[tokio::test]
async fn test_customer_cannot_write_products_anywhere() {
    let core = TestCore::new();
    core.add_user("buyer@tinashop.test", Role::Customer, "tinashop");
    let token = access_token(&core, "buyer@tinashop.test").await;

    for shop in ["tinashop", "othershop"] {
        let decision = core
            .auth
            .authorize(&token, &Permission::PRODUCT_WRITE, &ShopId::from(shop))
            .await
            .unwrap();
        // Permission is decided before the shop, so both read the same.
        assert_eq!(decision, Decision::Deny(DenyReason::InsufficientPermission));
    }

    let read = core
        .auth
        .authorize(&token, &Permission::PRODUCT_READ, &ShopId::from("tinashop"))
        .await
        .unwrap();
    assert!(read.is_allowed());
}

#[tokio::test]
async fn test_super_admin_is_the_only_cross_shop_role() {
    let core = TestCore::new();
    core.add_user("root@platform.test", Role::SuperAdmin, "platform");
    core.add_user("admin@tinashop.test", Role::Admin, "tinashop");
    core.add_user("buyer@tinashop.test", Role::Customer, "tinashop");

    let root = access_token(&core, "root@platform.test").await;
    for shop in ["tinashop", "othershop"] {
        let decision = core
            .auth
            .authorize(&root, &Permission::SYSTEM_CONFIG, &ShopId::from(shop))
            .await
            .unwrap();
        assert!(decision.is_allowed(), "super admin denied on {shop}");
    }

    for email in ["admin@tinashop.test", "buyer@tinashop.test"] {
        let token = access_token(&core, email).await;
        let decision = core
            .auth
            .authorize(&token, &Permission::PRODUCT_READ, &ShopId::from("othershop"))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::TenantMismatch), "{email}");
    }
}

#[tokio::test]
async fn test_revoked_or_garbage_token_is_unauthenticated() {
    let core = TestCore::new();
    core.add_user("admin@tinashop.test", Role::Admin, "tinashop");
    let session = core
        .auth
        .login("admin@tinashop.test", &Password::new(PASSWORD))
        .await
        .unwrap();
    core.auth.logout(&session.tokens.refresh_token).await.unwrap();

    for token in [session.tokens.access_token.as_str(), "garbage", ""] {
        let decision = core
            .auth
            .authorize(token, &Permission::PRODUCT_READ, &ShopId::from("tinashop"))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
    }
}

#[tokio::test]
async fn test_overrides_extend_but_never_shrink_role() {
    let core = TestCore::new();
    let identity = core.add_user("buyer@tinashop.test", Role::Customer, "tinashop");
    core.credentials.update(&identity.id, |i| {
        i.permission_overrides.insert(Permission::PRODUCT_WRITE);
    });

    let stored = core
        .credentials
        .lookup_by_id(&identity.id)
        .await
        .unwrap()
        .unwrap();
    assert!(effective_permissions(&stored).is_superset_of(&base_permissions(Role::Customer)));

    let token = access_token(&core, "buyer@tinashop.test").await;
    let decision = core
        .auth
        .authorize(&token, &Permission::PRODUCT_WRITE, &ShopId::from("tinashop"))
        .await
        .unwrap();
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_login_failures() {
    let core = TestCore::new();
    let identity = core.add_user("ana@tinashop.test", Role::Customer, "tinashop");

    assert!(matches!(
        core.auth
            .login("ana@tinashop.test", &Password::new("not-the-password"))
            .await,
        Err(AuthError::InvalidCredentials)
    ));

    core.credentials.set_active(&identity.id, false);
    assert!(matches!(
        core.auth
            .login("ana@tinashop.test", &Password::new(PASSWORD))
            .await,
        Err(AuthError::AccountInactive)
    ));
}
