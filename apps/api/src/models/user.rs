use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Billing state mirrored from the payment provider's webhooks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSubscriptionRow {
    pub user_id: String,
    pub stripe_customer_id: String,
    pub stripe_subscription_id: String,
    pub stripe_price_id: String,
    pub stripe_current_period_end: DateTime<Utc>,
    pub stripe_cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
