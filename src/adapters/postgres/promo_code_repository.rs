//! PostgreSQL implementation of PromoCodeRepository.
//!
//! The ledger lives in `promo_code_redemptions`, keyed by
//! `(promo_code_id, user_id)`. `redeem` locks the code row, applies the
//! domain rules, then writes the ledger entry and the counter in the same
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, PromoCodeId, Timestamp, UserId};
use crate::domain::promo::{
    ApplicablePlans, DiscountType, PromoCode, PromoCodeError, PromoCodeName, PromoCodeType,
    Redemption,
};
use crate::ports::PromoCodeRepository;

use super::{db_error, is_unique_violation, parse_column};

const SELECT_CODE: &str = r#"
    SELECT id, code, code_type, discount_type, discount_value, final_price, max_uses,
           current_uses, valid_from, valid_until, applicable_plans, is_active, description,
           created_at, updated_at
    FROM promo_codes
"#;

pub struct PostgresPromoCodeRepository {
    pool: PgPool,
}

impl PostgresPromoCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_ledger(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<RedemptionRow>, DomainError> {
        sqlx::query_as::<_, RedemptionRow>(
            r#"
            SELECT promo_code_id, user_id, used_at, original_amount, discount_amount, final_amount
            FROM promo_code_redemptions
            WHERE promo_code_id = ANY($1)
            ORDER BY used_at
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load promo ledger", e))
    }

    async fn hydrate(&self, rows: Vec<PromoCodeRow>) -> Result<Vec<PromoCode>, DomainError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let ledger = self.load_ledger(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let entries = ledger
                    .iter()
                    .filter(|r| r.promo_code_id == row.id)
                    .cloned()
                    .collect();
                row.into_promo_code(entries)
            })
            .collect()
    }

    async fn find_one(&self, clause: &str, bind: QueryKey<'_>) -> Result<Option<PromoCode>, DomainError> {
        let sql = format!("{} WHERE {}", SELECT_CODE, clause);
        let query = sqlx::query_as::<_, PromoCodeRow>(&sql);
        let query = match bind {
            QueryKey::Id(id) => query.bind(id),
            QueryKey::Code(code) => query.bind(code),
        };
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find promo code", e))?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

enum QueryKey<'a> {
    Id(Uuid),
    Code(&'a str),
}

/// Database row representation of a promo code.
#[derive(Debug, sqlx::FromRow)]
struct PromoCodeRow {
    id: Uuid,
    code: String,
    code_type: String,
    discount_type: String,
    discount_value: i64,
    final_price: Option<i64>,
    max_uses: i32,
    current_uses: i32,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    applicable_plans: String,
    is_active: bool,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct RedemptionRow {
    promo_code_id: Uuid,
    user_id: Uuid,
    used_at: DateTime<Utc>,
    original_amount: i64,
    discount_amount: i64,
    final_amount: i64,
}

fn to_u32(column: &str, value: i32) -> Result<u32, DomainError> {
    u32::try_from(value).map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Negative {} value: {}", column, value),
        )
    })
}

fn to_i32(column: &str, value: u32) -> Result<i32, DomainError> {
    i32::try_from(value).map_err(|_| {
        DomainError::validation(column, format!("{} does not fit the column", value))
    })
}

impl PromoCodeRow {
    fn into_promo_code(self, ledger: Vec<RedemptionRow>) -> Result<PromoCode, DomainError> {
        let code = PromoCodeName::try_new(&self.code).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid stored code {}: {}", self.code, e),
            )
        })?;

        Ok(PromoCode {
            id: PromoCodeId::from_uuid(self.id),
            code,
            code_type: parse_column("code_type", &self.code_type, PromoCodeType::parse)?,
            discount_type: parse_column("discount_type", &self.discount_type, DiscountType::parse)?,
            discount_value: self.discount_value,
            final_price: self.final_price,
            max_uses: to_u32("max_uses", self.max_uses)?,
            current_uses: to_u32("current_uses", self.current_uses)?,
            valid_from: Timestamp::from_datetime(self.valid_from),
            valid_until: self.valid_until.map(Timestamp::from_datetime),
            applicable_plans: parse_column(
                "applicable_plans",
                &self.applicable_plans,
                ApplicablePlans::parse,
            )?,
            is_active: self.is_active,
            description: self.description,
            used_by: ledger
                .into_iter()
                .map(|r| Redemption {
                    user_id: UserId::from_uuid(r.user_id),
                    used_at: Timestamp::from_datetime(r.used_at),
                    original_amount: r.original_amount,
                    discount_amount: r.discount_amount,
                    final_amount: r.final_amount,
                })
                .collect(),
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}

fn infra(operation: &str, err: sqlx::Error) -> PromoCodeError {
    PromoCodeError::Infrastructure(format!("Failed to {}: {}", operation, err))
}

async fn lock_code(
    tx: &mut Transaction<'_, Postgres>,
    id: &PromoCodeId,
) -> Result<Option<PromoCode>, PromoCodeError> {
    let sql = format!("{} WHERE id = $1 FOR UPDATE", SELECT_CODE);
    let Some(row) = sqlx::query_as::<_, PromoCodeRow>(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| infra("lock promo code", e))?
    else {
        return Ok(None);
    };

    let ledger = sqlx::query_as::<_, RedemptionRow>(
        r#"
        SELECT promo_code_id, user_id, used_at, original_amount, discount_amount, final_amount
        FROM promo_code_redemptions
        WHERE promo_code_id = $1
        ORDER BY used_at
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| infra("load promo ledger", e))?;

    Ok(Some(row.into_promo_code(ledger)?))
}

#[async_trait]
impl PromoCodeRepository for PostgresPromoCodeRepository {
    async fn insert(&self, code: &PromoCode) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO promo_codes (
                id, code, code_type, discount_type, discount_value, final_price, max_uses,
                current_uses, valid_from, valid_until, applicable_plans, is_active, description,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(code.id.as_uuid())
        .bind(code.code.as_str())
        .bind(code.code_type.as_str())
        .bind(code.discount_type.as_str())
        .bind(code.discount_value)
        .bind(code.final_price)
        .bind(to_i32("max_uses", code.max_uses)?)
        .bind(code.valid_from.as_datetime())
        .bind(code.valid_until.map(|t| *t.as_datetime()))
        .bind(code.applicable_plans.as_str())
        .bind(code.is_active)
        .bind(&code.description)
        .bind(code.created_at.as_datetime())
        .bind(code.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "promo_codes_code_key") {
                return DomainError::already_exists(format!("Promo code {} already exists", code.code))
                    .with_detail("code", code.code.to_string());
            }
            db_error("insert promo code", e)
        })?;

        Ok(())
    }

    async fn update_details(&self, code: &PromoCode) -> Result<(), DomainError> {
        // Cap check and write in one statement; current_uses is never written here.
        let result = sqlx::query(
            r#"
            UPDATE promo_codes SET
                max_uses = $2,
                valid_until = $3,
                is_active = $4,
                description = $5,
                updated_at = $6
            WHERE id = $1 AND current_uses <= $2
            "#,
        )
        .bind(code.id.as_uuid())
        .bind(to_i32("max_uses", code.max_uses)?)
        .bind(code.valid_until.map(|t| *t.as_datetime()))
        .bind(code.is_active)
        .bind(&code.description)
        .bind(code.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update promo code", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.find_by_id(&code.id).await? {
            None => Err(DomainError::new(
                ErrorCode::PromoCodeNotFound,
                format!("Promo code not found: {}", code.id),
            )),
            Some(stored) => Err(DomainError::new(
                ErrorCode::InvariantViolation,
                format!(
                    "cannot lower max_uses of {} to {} below current_uses {}",
                    stored.code, code.max_uses, stored.current_uses
                ),
            )),
        }
    }

    async fn find_by_id(&self, id: &PromoCodeId) -> Result<Option<PromoCode>, DomainError> {
        self.find_one("id = $1", QueryKey::Id(*id.as_uuid())).await
    }

    async fn find_by_code(&self, code: &PromoCodeName) -> Result<Option<PromoCode>, DomainError> {
        self.find_one("code = $1", QueryKey::Code(code.as_str())).await
    }

    async fn redeem(
        &self,
        id: &PromoCodeId,
        redemption: Redemption,
    ) -> Result<PromoCode, PromoCodeError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| infra("begin redeem", e))?;

        // 1. Lock the code row; concurrent redeems of the same code queue here
        let mut code = lock_code(&mut tx, id)
            .await?
            .ok_or_else(|| PromoCodeError::not_found(id.to_string()))?;

        // 2. Apply the ledger rules; an error drops the transaction
        code.redeem(redemption.clone())?;

        // 3. Write the ledger entry and the counter; both statements are
        //    conditional, so zero affected rows means the row lock was bypassed
        let inserted = sqlx::query(
            r#"
            INSERT INTO promo_code_redemptions (
                promo_code_id, user_id, used_at, original_amount, discount_amount, final_amount
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (promo_code_id, user_id) DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(redemption.user_id.as_uuid())
        .bind(redemption.used_at.as_datetime())
        .bind(redemption.original_amount)
        .bind(redemption.discount_amount)
        .bind(redemption.final_amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| infra("record redemption", e))?;
        if inserted.rows_affected() == 0 {
            return Err(PromoCodeError::AlreadyUsedByUser {
                code: code.code.to_string(),
                user_id: redemption.user_id,
            });
        }

        let incremented = sqlx::query(
            r#"
            UPDATE promo_codes SET current_uses = current_uses + 1, updated_at = $2
            WHERE id = $1 AND current_uses < max_uses
            "#,
        )
        .bind(id.as_uuid())
        .bind(code.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| infra("increment promo uses", e))?;
        if incremented.rows_affected() == 0 {
            return Err(PromoCodeError::Exhausted {
                code: code.code.to_string(),
            });
        }

        tx.commit().await.map_err(|e| infra("commit redeem", e))?;

        tracing::debug!(code = %code.code, uses = code.current_uses, "Promo code redeemed");
        Ok(code)
    }

    async fn list(&self) -> Result<Vec<PromoCode>, DomainError> {
        let sql = format!("{} ORDER BY created_at", SELECT_CODE);
        let rows = sqlx::query_as::<_, PromoCodeRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list promo codes", e))?;
        self.hydrate(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PromoCodeRow {
        let now = Utc::now();
        PromoCodeRow {
            id: Uuid::new_v4(),
            code: "FRIENDSFAMILY".to_string(),
            code_type: "preset".to_string(),
            discount_type: "fixed_amount".to_string(),
            discount_value: 2400,
            final_price: Some(1500),
            max_uses: 10,
            current_uses: 1,
            valid_from: now,
            valid_until: None,
            applicable_plans: "both".to_string(),
            is_active: true,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ledger_entry(promo_code_id: Uuid) -> RedemptionRow {
        RedemptionRow {
            promo_code_id,
            user_id: Uuid::new_v4(),
            used_at: Utc::now(),
            original_amount: 3900,
            discount_amount: 2400,
            final_amount: 1500,
        }
    }

    #[test]
    fn row_converts_with_ledger() {
        let row = row();
        let entry = ledger_entry(row.id);

        let code = row.into_promo_code(vec![entry]).unwrap();
        assert_eq!(code.code.as_str(), "FRIENDSFAMILY");
        assert_eq!(code.used_by.len(), 1);
        assert!(code.check_ledger().is_ok());
    }

    #[test]
    fn unknown_discount_type_is_a_database_error() {
        let mut row = row();
        row.discount_type = "bogus".to_string();

        let err = row.into_promo_code(vec![]).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn negative_counter_is_rejected() {
        let mut row = row();
        row.current_uses = -1;
        assert!(row.into_promo_code(vec![]).is_err());
    }
}
