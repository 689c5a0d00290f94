//! API request/response models for sales metrics and the leaderboard.

use crate::db::models::sales_metrics::SalesMetricsDBResponse;
use crate::types::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Largest value accepted for a single monthly counter
pub const MAX_COUNTER: i64 = 1_000_000_000;

/// Counters for the current month. Missing values count as 0; negatives and values above
/// [`MAX_COUNTER`] are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SalesMetricsSubmit {
    #[serde(default)]
    pub rn_auto: i64,
    #[serde(default)]
    pub fire: i64,
    #[serde(default)]
    pub life: i64,
    #[serde(default)]
    pub health: i64,
    #[serde(default)]
    pub life_premium: i64,
    #[serde(default)]
    pub health_premium: i64,
}

impl SalesMetricsSubmit {
    pub fn is_out_of_range(&self) -> bool {
        [
            self.rn_auto,
            self.fire,
            self.life,
            self.health,
            self.life_premium,
            self.health_premium,
        ]
        .iter()
        .any(|v| !(0..=MAX_COUNTER).contains(v))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SalesMetricsResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    /// First day of the month these counters cover
    pub metric_month: NaiveDate,
    pub rn_auto: i64,
    pub fire: i64,
    pub life: i64,
    pub health: i64,
    pub life_premium: i64,
    pub health_premium: i64,
    /// rn_auto + fire + life + health
    pub total_sales: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SalesMetricsDBResponse> for SalesMetricsResponse {
    fn from(db: SalesMetricsDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            metric_month: db.metric_month,
            rn_auto: db.rn_auto,
            fire: db.fire,
            life: db.life,
            health: db.health,
            life_premium: db.life_premium,
            health_premium: db.health_premium,
            total_sales: db.total_sales,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// One leaderboard line: a user's counters summed over the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub name: String,
    pub total_sales: i64,
    pub rn_auto: i64,
    pub fire: i64,
    pub life: i64,
    pub health: i64,
    pub life_premium: i64,
    pub health_premium: i64,
}
