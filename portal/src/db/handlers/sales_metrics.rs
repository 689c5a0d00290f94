//! Database repository for monthly sales metrics.

use crate::db::{
    errors::Result,
    models::sales_metrics::{LeaderboardRow, SalesMetricsDBResponse, SalesMetricsUpsertDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Months of history returned to a user
pub const HISTORY_MONTHS: i64 = 12;

pub struct SalesMetrics<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SalesMetrics<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert or overwrite the row for `(user, month)`
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), month = %request.metric_month), err)]
    pub async fn upsert(&mut self, request: &SalesMetricsUpsertDBRequest) -> Result<SalesMetricsDBResponse> {
        let row = sqlx::query_as::<_, SalesMetricsDBResponse>(
            r#"
            INSERT INTO sales_metrics (id, user_id, metric_month, rn_auto, fire, life, health, life_premium, health_premium)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ON CONSTRAINT sales_metrics_user_month_unique DO UPDATE SET
                rn_auto = EXCLUDED.rn_auto,
                fire = EXCLUDED.fire,
                life = EXCLUDED.life,
                health = EXCLUDED.health,
                life_premium = EXCLUDED.life_premium,
                health_premium = EXCLUDED.health_premium,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.metric_month)
        .bind(request.rn_auto)
        .bind(request.fire)
        .bind(request.life)
        .bind(request.health)
        .bind(request.life_premium)
        .bind(request.health_premium)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row)
    }

    /// The user's most recent months, newest first
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn history(&mut self, user_id: UserId) -> Result<Vec<SalesMetricsDBResponse>> {
        let rows = sqlx::query_as::<_, SalesMetricsDBResponse>(
            "SELECT * FROM sales_metrics WHERE user_id = $1 ORDER BY metric_month DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(HISTORY_MONTHS)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    /// Every row since `since`, joined with the owner's name
    #[instrument(skip(self), err)]
    pub async fn leaderboard_rows(&mut self, since: NaiveDate) -> Result<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT s.user_id, p.first_name, p.last_name,
                   s.rn_auto, s.fire, s.life, s.health, s.life_premium, s.health_premium, s.total_sales
            FROM sales_metrics s
            JOIN profiles p ON p.id = s.user_id
            WHERE s.metric_month >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }
}
