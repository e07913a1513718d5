//! Entitlements granted by each subscription level.
//!
//! Pure functions of their inputs. Callers resolve the level fresh for every
//! gated action; a payment webhook may land between two requests.

use serde::{Deserialize, Serialize};

/// Resumes a free account may hold.
pub const FREE_RESUME_QUOTA: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionLevel {
    Free,
    Pro,
    ProPlus,
}

impl SubscriptionLevel {
    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionLevel::Free)
    }

    pub fn has_unlimited_resumes(&self) -> bool {
        self.is_paid()
    }
}

pub fn can_create_resume(level: SubscriptionLevel, existing_count: i64) -> bool {
    level.has_unlimited_resumes() || existing_count < FREE_RESUME_QUOTA
}

pub fn can_use_customizations(level: SubscriptionLevel) -> bool {
    level.is_paid()
}

pub fn can_use_ai_tools(level: SubscriptionLevel) -> bool {
    level.is_paid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_quota_boundary() {
        assert!(can_create_resume(SubscriptionLevel::Free, 0));
        assert!(can_create_resume(SubscriptionLevel::Free, FREE_RESUME_QUOTA - 1));
        assert!(!can_create_resume(SubscriptionLevel::Free, FREE_RESUME_QUOTA));
        assert!(!can_create_resume(SubscriptionLevel::Free, FREE_RESUME_QUOTA + 4));
    }

    #[test]
    fn test_paid_levels_are_unlimited() {
        for level in [SubscriptionLevel::Pro, SubscriptionLevel::ProPlus] {
            assert!(can_create_resume(level, FREE_RESUME_QUOTA));
            assert!(can_create_resume(level, 10_000));
        }
    }

    #[test]
    fn test_customizations_and_ai_need_paid_level() {
        assert!(!can_use_customizations(SubscriptionLevel::Free));
        assert!(!can_use_ai_tools(SubscriptionLevel::Free));
        assert!(can_use_customizations(SubscriptionLevel::Pro));
        assert!(can_use_ai_tools(SubscriptionLevel::ProPlus));
    }
}
