//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Provides persistent storage for Subscription aggregates. Updates are a
//! compare-and-swap on the `version` column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::domain::promo::PromoCodeName;
use crate::domain::subscription::{Plan, Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

use super::{db_error, is_unique_violation, parse_column};

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT id, user_id, external_customer_id, external_subscription_id, status, plan, amount,
           original_amount, discount_amount, current_period_start, current_period_end,
           cancel_at_period_end, cancelled_at, promo_code, last_provider_event_at, version,
           created_at, updated_at
    FROM subscriptions
"#;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_where(&self, clause: &str, value: &str) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("{} WHERE {} = $1", SELECT_SUBSCRIPTION, clause);
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find subscription", e))?
            .map(Subscription::try_from)
            .transpose()
    }

    async fn find_by_uuid(&self, column: &str, id: Uuid) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("{} WHERE {} = $1", SELECT_SUBSCRIPTION, column);
        sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find subscription", e))?
            .map(Subscription::try_from)
            .transpose()
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    external_customer_id: Option<String>,
    external_subscription_id: Option<String>,
    status: String,
    plan: String,
    amount: i64,
    original_amount: i64,
    discount_amount: i64,
    current_period_start: DateTime<Utc>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    cancelled_at: Option<DateTime<Utc>>,
    promo_code: Option<String>,
    last_provider_event_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let promo_code = row
            .promo_code
            .as_deref()
            .map(PromoCodeName::try_new)
            .transpose()
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid promo_code: {}", e))
            })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            external_customer_id: row.external_customer_id,
            external_subscription_id: row.external_subscription_id,
            status: parse_column("status", &row.status, SubscriptionStatus::parse)?,
            plan: parse_column("plan", &row.plan, |s| s.parse::<Plan>().ok())?,
            amount: row.amount,
            original_amount: row.original_amount,
            discount_amount: row.discount_amount,
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            promo_code,
            last_provider_event_at: row.last_provider_event_at.map(Timestamp::from_datetime),
            version: u64::try_from(row.version).map_err(|_| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Negative version: {}", row.version),
                )
            })?,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn version_param(version: u64) -> Result<i64, DomainError> {
    i64::try_from(version)
        .map_err(|_| DomainError::new(ErrorCode::InvariantViolation, "version overflow"))
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, external_customer_id, external_subscription_id, status, plan,
                amount, original_amount, discount_amount, current_period_start,
                current_period_end, cancel_at_period_end, cancelled_at, promo_code,
                last_provider_event_at, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 0, $16, $17)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_uuid())
        .bind(&subscription.external_customer_id)
        .bind(&subscription.external_subscription_id)
        .bind(subscription.status.as_str())
        .bind(subscription.plan.as_str())
        .bind(subscription.amount)
        .bind(subscription.original_amount)
        .bind(subscription.discount_amount)
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.promo_code.as_ref().map(|c| c.as_str().to_string()))
        .bind(subscription.last_provider_event_at.map(|t| *t.as_datetime()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "subscriptions_user_id_key") {
                return DomainError::already_exists(format!(
                    "User {} already has a subscription",
                    subscription.user_id
                ))
                .with_detail("user_id", subscription.user_id.to_string());
            }
            db_error("insert subscription", e)
        })?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                external_customer_id = $3,
                external_subscription_id = $4,
                status = $5,
                plan = $6,
                amount = $7,
                original_amount = $8,
                discount_amount = $9,
                current_period_start = $10,
                current_period_end = $11,
                cancel_at_period_end = $12,
                cancelled_at = $13,
                promo_code = $14,
                last_provider_event_at = $15,
                updated_at = $16,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(version_param(subscription.version)?)
        .bind(&subscription.external_customer_id)
        .bind(&subscription.external_subscription_id)
        .bind(subscription.status.as_str())
        .bind(subscription.plan.as_str())
        .bind(subscription.amount)
        .bind(subscription.original_amount)
        .bind(subscription.discount_amount)
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.promo_code.as_ref().map(|c| c.as_str().to_string()))
        .bind(subscription.last_provider_event_at.map(|t| *t.as_datetime()))
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update subscription", e))?;

        if result.rows_affected() == 1 {
            let mut stored = subscription.clone();
            stored.version += 1;
            return Ok(stored);
        }

        match self.find_by_id(&subscription.id).await? {
            None => Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription not found: {}", subscription.id),
            )),
            Some(current) => Err(DomainError::concurrent_modification(format!(
                "subscription {} is at version {}, update was based on {}",
                subscription.id, current.version, subscription.version
            ))
            .with_detail("subscription_id", subscription.id.to_string())),
        }
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        self.find_by_uuid("id", *id.as_uuid()).await
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        self.find_by_uuid("user_id", *user_id.as_uuid()).await
    }

    async fn find_by_external_subscription_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        self.find_where("external_subscription_id", external_id).await
    }

    async fn find_by_external_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        self.find_where("external_customer_id", customer_id).await
    }
}
