//! PostgreSQL implementation of PaymentRepository.
//!
//! `external_charge_id` is UNIQUE; `insert` uses `ON CONFLICT DO NOTHING`
//! so a replayed event reports `AlreadyExists` instead of failing.
//! Refunds are rows in `payment_refunds`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, SubscriptionId, Timestamp, UserId,
};
use crate::domain::payment::{Payment, PaymentSource, PaymentStatus, Refund};
use crate::domain::promo::PromoCodeName;
use crate::ports::{PaymentRepository, SaveResult};

use super::{db_error, parse_column};

const SELECT_PAYMENT: &str = r#"
    SELECT id, user_id, subscription_id, external_charge_id, payment_intent_id, amount,
           currency, status, payment_method, source, promo_code, original_amount,
           discount_amount, created_at, updated_at
    FROM payments
"#;

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, rows: Vec<PaymentRow>) -> Result<Vec<Payment>, DomainError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let refunds = sqlx::query_as::<_, RefundRow>(
            r#"
            SELECT payment_id, external_refund_id, amount, created_at
            FROM payment_refunds
            WHERE payment_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load refunds", e))?;

        rows.into_iter()
            .map(|row| {
                let own = refunds
                    .iter()
                    .filter(|r| r.payment_id == row.id)
                    .map(|r| Refund {
                        external_refund_id: r.external_refund_id.clone(),
                        amount: r.amount,
                        created_at: Timestamp::from_datetime(r.created_at),
                    })
                    .collect();
                row.into_payment(own)
            })
            .collect()
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Payment>, DomainError> {
        let sql = format!("{} WHERE {} = $1 ORDER BY created_at DESC LIMIT 1", SELECT_PAYMENT, column);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find payment", e))?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    subscription_id: Option<Uuid>,
    external_charge_id: String,
    payment_intent_id: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    payment_method: Option<String>,
    source: String,
    promo_code: Option<String>,
    original_amount: i64,
    discount_amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    payment_id: Uuid,
    external_refund_id: String,
    amount: i64,
    created_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Option<PaymentStatus> {
    match s {
        "succeeded" => Some(PaymentStatus::Succeeded),
        "failed" => Some(PaymentStatus::Failed),
        "partially_refunded" => Some(PaymentStatus::PartiallyRefunded),
        "refunded" => Some(PaymentStatus::Refunded),
        _ => None,
    }
}

fn source_to_string(source: PaymentSource) -> &'static str {
    match source {
        PaymentSource::Checkout => "checkout",
        PaymentSource::Invoice => "invoice",
    }
}

fn parse_source(s: &str) -> Option<PaymentSource> {
    match s {
        "checkout" => Some(PaymentSource::Checkout),
        "invoice" => Some(PaymentSource::Invoice),
        _ => None,
    }
}

impl PaymentRow {
    fn into_payment(self, refunds: Vec<Refund>) -> Result<Payment, DomainError> {
        let promo_code = self
            .promo_code
            .as_deref()
            .map(PromoCodeName::try_new)
            .transpose()
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid promo_code: {}", e))
            })?;

        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            subscription_id: self.subscription_id.map(SubscriptionId::from_uuid),
            external_charge_id: self.external_charge_id,
            payment_intent_id: self.payment_intent_id,
            amount: self.amount,
            currency: self.currency,
            status: parse_column("status", &self.status, parse_status)?,
            payment_method: self.payment_method,
            source: parse_column("source", &self.source, parse_source)?,
            promo_code,
            original_amount: self.original_amount,
            discount_amount: self.discount_amount,
            refunds,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, subscription_id, external_charge_id, payment_intent_id, amount,
                currency, status, payment_method, source, promo_code, original_amount,
                discount_amount, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (external_charge_id) DO NOTHING
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.subscription_id.map(|id| *id.as_uuid()))
        .bind(&payment.external_charge_id)
        .bind(&payment.payment_intent_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.payment_method)
        .bind(source_to_string(payment.source))
        .bind(payment.promo_code.as_ref().map(|c| c.as_str().to_string()))
        .bind(payment.original_amount)
        .bind(payment.discount_amount)
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert payment", e))?;

        if result.rows_affected() == 0 {
            return Ok(SaveResult::AlreadyExists);
        }
        Ok(SaveResult::Inserted)
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin payment update", e))?;

        let result = sqlx::query("UPDATE payments SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(payment.id.as_uuid())
            .bind(payment.status.as_str())
            .bind(payment.updated_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("update payment", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {}", payment.id),
            ));
        }

        for refund in &payment.refunds {
            sqlx::query(
                r#"
                INSERT INTO payment_refunds (payment_id, external_refund_id, amount, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (payment_id, external_refund_id) DO NOTHING
                "#,
            )
            .bind(payment.id.as_uuid())
            .bind(&refund.external_refund_id)
            .bind(refund.amount)
            .bind(refund.created_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("record refund", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit payment update", e))
    }

    async fn find_by_external_charge_id(
        &self,
        external_charge_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        self.find_one("external_charge_id", external_charge_id).await
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        self.find_one("payment_intent_id", payment_intent_id).await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Payment>, DomainError> {
        let sql = format!("{} WHERE user_id = $1 ORDER BY created_at DESC", SELECT_PAYMENT);
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list payments", e))?;
        self.hydrate(rows).await
    }
}
