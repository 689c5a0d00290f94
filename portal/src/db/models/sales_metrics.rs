//! Database models for monthly sales metrics.

use crate::types::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Counters submitted for one month. Missing counters are stored as 0.
#[derive(Debug, Clone, Default)]
pub struct SalesMetricsUpsertDBRequest {
    pub user_id: UserId,
    pub metric_month: NaiveDate,
    pub rn_auto: i64,
    pub fire: i64,
    pub life: i64,
    pub health: i64,
    pub life_premium: i64,
    pub health_premium: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SalesMetricsDBResponse {
    pub id: Uuid,
    pub user_id: UserId,
    pub metric_month: NaiveDate,
    pub rn_auto: i64,
    pub fire: i64,
    pub life: i64,
    pub health: i64,
    pub life_premium: i64,
    pub health_premium: i64,
    pub total_sales: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A metrics row joined with the owner's name, as fed to the leaderboard
#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRow {
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub rn_auto: i64,
    pub fire: i64,
    pub life: i64,
    pub health: i64,
    pub life_premium: i64,
    pub health_premium: i64,
    pub total_sales: i64,
}
