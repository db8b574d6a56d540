//! Subscription lifecycle handlers - admin overrides, each audited.

mod cancel_subscription;
mod change_plan;
mod extend_subscription;
mod grant_admin_access;
mod grant_free_access;
mod lifecycle;
mod reactivate_subscription;

pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler};
pub use change_plan::{ChangePlanCommand, ChangePlanHandler};
pub use extend_subscription::{ExtendSubscriptionCommand, ExtendSubscriptionHandler};
pub use grant_admin_access::{GrantAdminAccessCommand, GrantAdminAccessHandler};
pub use grant_free_access::{GrantFreeAccessCommand, GrantFreeAccessHandler};
pub use lifecycle::LifecycleResult;
pub use reactivate_subscription::{ReactivateSubscriptionCommand, ReactivateSubscriptionHandler};
