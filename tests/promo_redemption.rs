//! Integration tests for promo pricing and redemption under contention.
//!
//! Redemptions race through `tokio::spawn` against one scarce code; the
//! store must admit exactly `max_uses` of them and keep the ledger
//! consistent.

mod common;

use std::sync::Arc;

use entitlement_engine::application::{
    CreatePromoCodeCommand, CreatePromoCodeHandler, PricePlanQuery, RedeemPromoCodeCommand,
};
use entitlement_engine::domain::foundation::UserId;
use entitlement_engine::domain::promo::{
    ApplicablePlans, DiscountType, PromoCodeError, PromoCodeName, PromoCodeType,
};
use entitlement_engine::domain::subscription::Plan;
use entitlement_engine::ports::PromoCodeRepository;

use common::Engine;

async fn create_code(engine: &Engine, code: &str, max_uses: u32) {
    CreatePromoCodeHandler::new(engine.promo_codes.clone())
        .handle(CreatePromoCodeCommand {
            code: code.to_string(),
            code_type: PromoCodeType::Custom,
            discount_type: DiscountType::Percentage,
            discount_value: 50,
            final_price: None,
            max_uses,
            valid_from: None,
            valid_until: None,
            applicable_plans: ApplicablePlans::Both,
            description: "launch week".to_string(),
        })
        .await
        .unwrap();
}

// =============================================================================
// Pricing
// =============================================================================

#[tokio::test]
async fn friends_family_prices_monthly_at_preset_final() {
    let engine = Engine::with_presets().await;

    let quote = engine
        .price_plan()
        .handle(PricePlanQuery {
            plan: Plan::Monthly,
            promo_code: Some("friendsfamily".to_string()),
            user_id: None,
        })
        .await
        .unwrap();

    assert_eq!(
        (quote.original_price, quote.discount_amount, quote.final_price),
        (3900, 2400, 1500)
    );
    assert_eq!(
        quote.promo_code.map(|r| r.code.to_string()),
        Some("FRIENDSFAMILY".to_string())
    );
}

#[tokio::test]
async fn friends_family_does_not_apply_to_annual() {
    let engine = Engine::with_presets().await;

    let err = engine
        .price_plan()
        .handle(PricePlanQuery {
            plan: Plan::Annual,
            promo_code: Some("FRIENDSFAMILY".to_string()),
            user_id: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PromoCodeError::PlanNotApplicable { .. }));
}

// =============================================================================
// Redemption
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_respect_the_cap() {
    const ATTEMPTS: usize = 24;
    const MAX_USES: u32 = 5;

    let engine = Engine::new();
    create_code(&engine, "SCARCE", MAX_USES).await;
    let quote = engine
        .price_plan()
        .handle(PricePlanQuery {
            plan: Plan::Monthly,
            promo_code: Some("SCARCE".to_string()),
            user_id: None,
        })
        .await
        .unwrap();
    let reference = quote.promo_code.clone().unwrap();
    let (original, discount, fin) = (quote.original_price, quote.discount_amount, quote.final_price);
    let redeem = Arc::new(engine.redeem());

    let mut tasks = Vec::with_capacity(ATTEMPTS);
    for _ in 0..ATTEMPTS {
        let redeem = redeem.clone();
        let reference = reference.clone();
        tasks.push(tokio::spawn(async move {
            redeem
                .handle(RedeemPromoCodeCommand {
                    promo_code: reference,
                    user_id: UserId::new(),
                    original_amount: original,
                    discount_amount: discount,
                    final_amount: fin,
                })
                .await
        }));
    }

    let mut succeeded = 0;
    let mut exhausted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(PromoCodeError::Exhausted { .. }) => exhausted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, MAX_USES as usize);
    assert_eq!(exhausted, ATTEMPTS - MAX_USES as usize);

    let stored = engine
        .promo_codes
        .find_by_code(&PromoCodeName::try_new("SCARCE").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_uses, MAX_USES);
    assert_eq!(stored.used_by.len(), MAX_USES as usize);
    assert!(stored.check_ledger().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_user_cannot_redeem_twice_concurrently() {
    let engine = Engine::new();
    create_code(&engine, "ONCEEACH", 100).await;
    let quote = engine
        .price_plan()
        .handle(PricePlanQuery {
            plan: Plan::Annual,
            promo_code: Some("ONCEEACH".to_string()),
            user_id: None,
        })
        .await
        .unwrap();
    let reference = quote.promo_code.clone().unwrap();
    let (original, discount, fin) = (quote.original_price, quote.discount_amount, quote.final_price);
    let user_id = UserId::new();
    let redeem = Arc::new(engine.redeem());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let redeem = redeem.clone();
            let reference = reference.clone();
            tokio::spawn(async move {
                redeem
                    .handle(RedeemPromoCodeCommand {
                        promo_code: reference,
                        user_id,
                        original_amount: original,
                        discount_amount: discount,
                        final_amount: fin,
                    })
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(err, PromoCodeError::AlreadyUsedByUser { .. })),
        }
    }

    assert_eq!(succeeded, 1);
}

#[tokio::test]
async fn priced_amounts_always_redeem_cleanly() {
    let engine = Engine::with_presets().await;
    create_code(&engine, "HALFOFF", 10).await;

    for (plan, code) in [
        (Plan::Monthly, "FRIENDSFAMILY"),
        (Plan::Monthly, "HALFOFF"),
        (Plan::Annual, "HALFOFF"),
    ] {
        let quote = engine
            .price_plan()
            .handle(PricePlanQuery {
                plan,
                promo_code: Some(code.to_string()),
                user_id: None,
            })
            .await
            .unwrap();

        let result = engine
            .redeem()
            .handle(RedeemPromoCodeCommand {
                promo_code: quote.promo_code.clone().unwrap(),
                user_id: UserId::new(),
                original_amount: quote.original_price,
                discount_amount: quote.discount_amount,
                final_amount: quote.final_price,
            })
            .await;

        assert!(result.is_ok(), "{code} on {plan}: {result:?}");
    }
}
