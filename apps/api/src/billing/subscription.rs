//! Subscription level lookup, backed by the billing state the payment
//! webhooks keep in `user_subscriptions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

use crate::errors::SaveError;
use crate::models::user::UserSubscriptionRow;
use crate::resume::entitlement::SubscriptionLevel;

/// Resolves a user's current subscription level.
///
/// Implementations must not cache: entitlement can change between two calls.
#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    async fn resolve(&self, user_id: &str) -> Result<SubscriptionLevel, SaveError>;
}

/// Price identifiers that map billing rows to levels.
#[derive(Debug, Clone)]
pub struct PriceIds {
    pub pro_monthly: String,
    pub pro_plus_monthly: String,
}

pub struct PgSubscriptionLookup {
    pool: PgPool,
    prices: PriceIds,
}

impl PgSubscriptionLookup {
    pub fn new(pool: PgPool, prices: PriceIds) -> Self {
        Self { pool, prices }
    }
}

#[async_trait]
impl SubscriptionLookup for PgSubscriptionLookup {
    async fn resolve(&self, user_id: &str) -> Result<SubscriptionLevel, SaveError> {
        let row = sqlx::query_as::<_, UserSubscriptionRow>(
            "SELECT * FROM user_subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        level_for(row.as_ref(), &self.prices, Utc::now())
    }
}

/// Maps a billing row to a level. No row or a lapsed period means free.
pub fn level_for(
    row: Option<&UserSubscriptionRow>,
    prices: &PriceIds,
    now: DateTime<Utc>,
) -> Result<SubscriptionLevel, SaveError> {
    let Some(row) = row else {
        return Ok(SubscriptionLevel::Free);
    };
    if row.stripe_current_period_end < now {
        return Ok(SubscriptionLevel::Free);
    }
    if row.stripe_price_id == prices.pro_monthly {
        Ok(SubscriptionLevel::Pro)
    } else if row.stripe_price_id == prices.pro_plus_monthly {
        Ok(SubscriptionLevel::ProPlus)
    } else {
        warn!(
            "User {} has unknown price id {}",
            row.user_id, row.stripe_price_id
        );
        Err(SaveError::Upstream(format!(
            "unknown subscription price id '{}'",
            row.stripe_price_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn prices() -> PriceIds {
        PriceIds {
            pro_monthly: "price_pro".into(),
            pro_plus_monthly: "price_pro_plus".into(),
        }
    }

    fn row(price: &str, period_end: DateTime<Utc>) -> UserSubscriptionRow {
        UserSubscriptionRow {
            user_id: "user_1".into(),
            stripe_customer_id: "cus_1".into(),
            stripe_subscription_id: "sub_1".into(),
            stripe_price_id: price.into(),
            stripe_current_period_end: period_end,
            stripe_cancel_at_period_end: false,
            created_at: period_end - Duration::days(30),
            updated_at: period_end - Duration::days(30),
        }
    }

    #[test]
    fn test_no_subscription_is_free() {
        assert_eq!(
            level_for(None, &prices(), Utc::now()).unwrap(),
            SubscriptionLevel::Free
        );
    }

    #[test]
    fn test_active_subscriptions_map_by_price() {
        let now = Utc::now();
        let later = now + Duration::days(3);
        assert_eq!(
            level_for(Some(&row("price_pro", later)), &prices(), now).unwrap(),
            SubscriptionLevel::Pro
        );
        assert_eq!(
            level_for(Some(&row("price_pro_plus", later)), &prices(), now).unwrap(),
            SubscriptionLevel::ProPlus
        );
    }

    #[test]
    fn test_lapsed_subscription_is_free() {
        let now = Utc::now();
        let earlier = now - Duration::hours(1);
        assert_eq!(
            level_for(Some(&row("price_pro_plus", earlier)), &prices(), now).unwrap(),
            SubscriptionLevel::Free
        );
    }

    #[test]
    fn test_unknown_price_is_upstream_failure() {
        let now = Utc::now();
        let err = level_for(Some(&row("price_legacy", now + Duration::days(1))), &prices(), now)
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
