//! Reporting handlers - read-only queries run by scheduled jobs.

mod get_inactive_users;
mod get_user_metrics;

pub use get_inactive_users::{GetInactiveUsersHandler, GetInactiveUsersQuery, InactiveUser};
pub use get_user_metrics::{GetUserMetricsHandler, UserMetrics};
