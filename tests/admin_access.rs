//! Administrative access survives whatever the payment provider reports.

mod common;

use serde_json::json;

use entitlement_engine::application::{
    CheckPremiumAccessQuery, GetInactiveUsersHandler, GetInactiveUsersQuery, GetUserMetricsHandler,
    GrantAdminAccessCommand,
};
use entitlement_engine::domain::entitlement::AccessBasis;
use entitlement_engine::domain::foundation::{Timestamp, UserId};
use entitlement_engine::domain::subscription::{Plan, Subscription, SubscriptionStatus};
use entitlement_engine::domain::user::{Email, NewUser, User};
use entitlement_engine::ports::{SubscriptionRepository, UserRepository};

use common::{envelope, Engine};

/// A paying user whose subscription is linked to a provider subscription.
async fn subscriber(engine: &Engine, email: &str) -> (User, Subscription) {
    let now = Timestamp::now();
    let user = User::register(
        NewUser {
            name: "Operator".to_string(),
            email: Email::parse(email).unwrap(),
            password_hash: "hash".to_string(),
            is_verified: true,
            registration_promo_code: None,
        },
        now,
    )
    .unwrap();
    engine.users.insert(&user).await.unwrap();

    let mut sub = Subscription::new_inactive(user.id, now);
    sub.status = SubscriptionStatus::Active;
    sub.plan = Plan::Monthly;
    sub.current_period_end = Some(now.add_days(20));
    sub.external_subscription_id = Some("sub_ops".to_string());
    sub.external_customer_id = Some("cus_ops".to_string());
    engine.subscriptions.insert(&sub).await.unwrap();
    (user, sub)
}

fn provider_subscription(event_type: &str, status: &str, period_end: i64) -> serde_json::Value {
    let now = Timestamp::now().as_unix_secs();
    envelope(
        &format!("evt_{}", status),
        event_type,
        now,
        json!({
            "id": "sub_ops",
            "customer": "cus_ops",
            "status": status,
            "current_period_start": now - 40 * 24 * 3600,
            "current_period_end": period_end,
            "cancel_at_period_end": false,
        }),
    )
}

async fn grant_admin(engine: &Engine, user_id: UserId) {
    engine
        .grant_admin()
        .handle(GrantAdminAccessCommand {
            actor: UserId::new(),
            user_id,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn admin_access_survives_provider_deletion() {
    let engine = Engine::new();
    let (user, sub) = subscriber(&engine, "ops@example.com").await;
    grant_admin(&engine, user.id).await;

    let deleted = provider_subscription(
        "customer.subscription.deleted",
        "canceled",
        Timestamp::now().as_unix_secs(),
    );
    engine.deliver(&deleted).await.unwrap();

    let stored = engine.subscriptions.find_by_id(&sub.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubscriptionStatus::AdminAccess);
    assert_eq!(stored.plan, Plan::Admin);

    let access = engine
        .check_access()
        .handle(CheckPremiumAccessQuery { user_id: user.id })
        .await
        .unwrap();
    assert!(access.has_premium_access());
    assert_eq!(access.decision.basis, AccessBasis::AdminUser);
}

#[tokio::test]
async fn admin_access_ignores_lapsed_provider_period() {
    let engine = Engine::new();
    let (user, sub) = subscriber(&engine, "ops@example.com").await;
    grant_admin(&engine, user.id).await;

    let lapsed = provider_subscription(
        "customer.subscription.updated",
        "past_due",
        Timestamp::now().add_days(-10).as_unix_secs(),
    );
    engine.deliver(&lapsed).await.unwrap();

    let stored = engine.subscriptions.find_by_id(&sub.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubscriptionStatus::AdminAccess);
    assert_eq!(stored.current_period_end, None);

    let access = engine
        .check_access()
        .handle(CheckPremiumAccessQuery { user_id: user.id })
        .await
        .unwrap();
    assert!(access.has_premium_access());
}

#[tokio::test]
async fn grant_is_audited_and_counted() {
    let engine = Engine::new();
    let (admin, _) = subscriber(&engine, "ops@example.com").await;
    grant_admin(&engine, admin.id).await;

    assert_eq!(engine.audit.len().await, 1);

    let metrics = GetUserMetricsHandler::new(engine.reader())
        .handle()
        .await
        .unwrap();
    assert_eq!(metrics.total_users, 1);
    assert_eq!(metrics.admins, 1);
    assert_eq!(metrics.active, 1);
    assert_eq!(metrics.by_status.get("admin_access"), Some(&1));

    let inactive = GetInactiveUsersHandler::new(engine.reader())
        .handle(GetInactiveUsersQuery {
            since: Timestamp::now(),
        })
        .await
        .unwrap();
    assert!(inactive.is_empty());
}
