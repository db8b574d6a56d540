//! Steps shared by every handler that changes a subscription.
//!
//! Subscriptions are written with a version compare-and-swap. A handler
//! describes its change as a closure; `mutate_subscription` reapplies it to
//! a fresh copy whenever another writer got there first.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::subscription::Subscription;
use crate::domain::user::User;
use crate::ports::{PaymentError, SubscriptionRepository, UserRepository};

/// Reload-and-reapply rounds before giving up with `ConcurrentModification`.
pub(crate) const MAX_CAS_ATTEMPTS: usize = 5;

/// What a change closure decided to do with the subscription it was given.
pub(crate) enum Mutation<T> {
    /// Persist the changed subscription.
    Write(T),
    /// Leave the stored subscription as it is.
    Skip(T),
}

pub(crate) struct Mutated<T> {
    /// State before the change; `None` when the subscription was created.
    pub before: Option<Subscription>,
    /// Stored state after the change.
    pub subscription: Subscription,
    pub value: T,
    pub written: bool,
}

/// Applies `apply` to `current` and writes the result, retrying on version
/// conflicts against a reloaded copy.
pub(crate) async fn mutate_subscription<T, E, F>(
    repo: &dyn SubscriptionRepository,
    current: Subscription,
    mut apply: F,
) -> Result<Mutated<T>, E>
where
    E: From<DomainError>,
    F: FnMut(&mut Subscription) -> Result<Mutation<T>, E>,
{
    let mut current = current;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut next = current.clone();
        let value = match apply(&mut next)? {
            Mutation::Skip(value) => {
                return Ok(Mutated {
                    before: Some(current.clone()),
                    subscription: current,
                    value,
                    written: false,
                });
            }
            Mutation::Write(value) => value,
        };

        match repo.update(&next).await {
            Ok(stored) => {
                return Ok(Mutated {
                    before: Some(current),
                    subscription: stored,
                    value,
                    written: true,
                });
            }
            Err(err)
                if err.code == ErrorCode::ConcurrentModification && attempt < MAX_CAS_ATTEMPTS =>
            {
                debug!(
                    subscription_id = %current.id,
                    attempt,
                    "subscription changed concurrently, reapplying"
                );
                current = repo.find_by_id(&current.id).await?.ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::SubscriptionNotFound,
                        format!("Subscription not found: {}", current.id),
                    )
                })?;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Like [`mutate_subscription`], creating the user's subscription first if
/// they have none.
pub(crate) async fn upsert_subscription<T, E, F>(
    repo: &dyn SubscriptionRepository,
    user_id: UserId,
    now: Timestamp,
    mut apply: F,
) -> Result<Mutated<T>, E>
where
    E: From<DomainError>,
    F: FnMut(&mut Subscription) -> Result<Mutation<T>, E>,
{
    if let Some(existing) = repo.find_by_user_id(&user_id).await? {
        return mutate_subscription(repo, existing, apply).await;
    }

    let mut fresh = Subscription::new_inactive(user_id, now);
    let value = match apply(&mut fresh)? {
        Mutation::Skip(value) => {
            return Ok(Mutated {
                before: None,
                subscription: fresh,
                value,
                written: false,
            });
        }
        Mutation::Write(value) => value,
    };

    match repo.insert(&fresh).await {
        Ok(()) => Ok(Mutated {
            before: None,
            subscription: fresh,
            value,
            written: true,
        }),
        Err(err) if err.code == ErrorCode::AlreadyExists => {
            debug!(user_id = %user_id, "subscription created concurrently, updating it instead");
            let existing = repo.find_by_user_id(&user_id).await?.ok_or(err)?;
            mutate_subscription(repo, existing, apply).await
        }
        Err(err) => Err(err.into()),
    }
}

/// Loads the user, applies `apply` and writes the result if it reports a
/// change, reloading and reapplying on version conflicts.
///
/// Returns the user as stored afterwards, or `None` if the user is gone.
pub(crate) async fn mutate_user<F>(
    users: &dyn UserRepository,
    user_id: &UserId,
    mut apply: F,
) -> Result<Option<User>, DomainError>
where
    F: FnMut(&mut User) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(mut user) = users.find_by_id(user_id).await? else {
            return Ok(None);
        };
        if !apply(&mut user) {
            return Ok(Some(user));
        }

        match users.update(&user).await {
            Ok(stored) => return Ok(Some(stored)),
            Err(err)
                if err.code == ErrorCode::ConcurrentModification && attempt < MAX_CAS_ATTEMPTS =>
            {
                debug!(user_id = %user_id, attempt, "user changed concurrently, reapplying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Recomputes the user's cached entitlement fields from their stored
/// subscription. Called at the end of every subscription-changing operation.
///
/// Returns the user as stored afterwards, or `None` if the user is gone.
pub(crate) async fn sync_user_entitlement(
    users: &dyn UserRepository,
    subscriptions: &dyn SubscriptionRepository,
    user_id: &UserId,
    now: Timestamp,
) -> Result<Option<User>, DomainError> {
    let subscription = subscriptions.find_by_user_id(user_id).await?;
    let mut changed = false;
    let user = mutate_user(users, user_id, |user| {
        changed = user.apply_entitlement(subscription.as_ref(), now);
        changed
    })
    .await?;

    match &user {
        None => warn!(user_id = %user_id, "entitlement sync skipped, user not found"),
        Some(user) if changed => debug!(
            user_id = %user_id,
            status = user.subscription_status.as_str(),
            tier = user.subscription_tier.as_str(),
            "entitlement cache updated"
        ),
        Some(_) => {}
    }
    Ok(user)
}

/// Runs a payment provider call with an upper bound on its duration.
pub(crate) async fn call_provider<T, F>(
    limit: Duration,
    operation: &str,
    call: F,
) -> Result<T, PaymentError>
where
    F: Future<Output = Result<T, PaymentError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PaymentError::timeout(operation)),
    }
}
