use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    api::models::sales::{LeaderboardEntry, SalesMetricsResponse, SalesMetricsSubmit},
    auth::permissions::{RequiresPermission, operation, resource},
    db::{handlers::SalesMetrics, models::sales_metrics::SalesMetricsUpsertDBRequest},
    errors::{Error, Result},
    leaderboard,
};

/// The caller's last twelve months, newest first
#[utoipa::path(
    get,
    path = "/sales-metrics",
    tag = "sales",
    summary = "My sales history",
    responses(
        (status = 200, description = "Monthly metrics", body = Vec<SalesMetricsResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn my_history(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::SalesMetrics, operation::ReadOwn>,
) -> Result<Json<Vec<SalesMetricsResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rows = SalesMetrics::new(&mut conn).history(current_user.id).await?;

    Ok(Json(rows.into_iter().map(SalesMetricsResponse::from).collect()))
}

/// Record the caller's counters for the current month, overwriting an earlier submission
#[utoipa::path(
    put,
    path = "/sales-metrics/current",
    tag = "sales",
    summary = "Submit this month's sales",
    request_body = SalesMetricsSubmit,
    responses(
        (status = 200, description = "Stored metrics", body = SalesMetricsResponse),
        (status = 400, description = "Please enter valid positive numbers"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn submit_current_month(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::SalesMetrics, operation::UpdateOwn>,
    Json(submit): Json<SalesMetricsSubmit>,
) -> Result<Json<SalesMetricsResponse>> {
    if submit.is_out_of_range() {
        return Err(Error::BadRequest {
            message: "Please enter valid positive numbers".to_string(),
        });
    }

    let request = SalesMetricsUpsertDBRequest {
        user_id: current_user.id,
        metric_month: leaderboard::month_start(Utc::now().date_naive()),
        rn_auto: submit.rn_auto,
        fire: submit.fire,
        life: submit.life,
        health: submit.health,
        life_premium: submit.life_premium,
        health_premium: submit.health_premium,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let row = SalesMetrics::new(&mut conn).upsert(&request).await?;

    Ok(Json(SalesMetricsResponse::from(row)))
}

/// Top sellers over the last three months
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "sales",
    summary = "Sales leaderboard",
    responses(
        (status = 200, description = "Top entries by total sales", body = Vec<LeaderboardEntry>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Leaderboard, operation::ReadAll>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let since = leaderboard::window_start(Utc::now().date_naive());

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rows = SalesMetrics::new(&mut conn).leaderboard_rows(since).await?;

    Ok(Json(leaderboard::aggregate(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_submit_upserts_current_month(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&user);

        let response = app
            .put("/admin/api/v1/sales-metrics/current")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"rn_auto": 3, "fire": 2}))
            .await;
        response.assert_status_ok();
        let first: SalesMetricsResponse = response.json();
        assert_eq!(first.life, 0);
        assert_eq!(first.total_sales, 5);
        assert_eq!(first.metric_month, leaderboard::month_start(Utc::now().date_naive()));

        let response = app
            .put("/admin/api/v1/sales-metrics/current")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"rn_auto": 4, "life": 1, "life_premium": 1200}))
            .await;
        let second: SalesMetricsResponse = response.json();
        assert_eq!(second.id, first.id);
        assert_eq!(second.fire, 0);
        assert_eq!(second.total_sales, 5);

        let history: Vec<SalesMetricsResponse> = app
            .get("/admin/api/v1/sales-metrics")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].life_premium, 1200);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_negative_values_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&user);

        let response = app
            .put("/admin/api/v1/sales-metrics/current")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"rn_auto": -1}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Please enter valid positive numbers");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_oversized_values_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::TeamMember).await;
        let auth = add_auth_headers(&user);

        let response = app
            .put("/admin/api/v1/sales-metrics/current")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"rn_auto": i64::MAX / 2, "fire": i64::MAX / 2, "life": 10}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Please enter valid positive numbers");

        let history: Vec<SalesMetricsResponse> = app
            .get("/admin/api/v1/sales-metrics")
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .json();
        assert!(history.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_leaderboard_ranks_by_total(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let low = create_test_user(&pool, Role::TeamMember).await;
        let high = create_test_user(&pool, Role::TeamMember).await;

        for (user, rn_auto) in [(&low, 1), (&high, 9)] {
            let auth = add_auth_headers(user);
            app.put("/admin/api/v1/sales-metrics/current")
                .add_header(&auth[0].0, &auth[0].1)
                .json(&json!({ "rn_auto": rn_auto }))
                .await
                .assert_status_ok();
        }

        let auth = add_auth_headers(&low);
        let response = app.get("/admin/api/v1/leaderboard").add_header(&auth[0].0, &auth[0].1).await;
        response.assert_status_ok();
        let entries: Vec<LeaderboardEntry> = response.json();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, high.id);
        assert_eq!(entries[0].total_sales, 9);
        assert_eq!(entries[1].user_id, low.id);
    }
}
