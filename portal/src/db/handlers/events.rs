//! Database repository for calendar events.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::events::{EventCreateDBRequest, EventDBResponse, EventUpdateDBRequest},
};
use crate::types::{EventId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Which events to list
#[derive(Debug, Clone, Copy)]
pub enum EventFilter {
    /// Events starting at or after the instant, soonest first
    UpcomingFrom(DateTime<Utc>),
    /// Every event, latest first
    All,
}

pub struct Events<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Events<'c> {
    type CreateRequest = EventCreateDBRequest;
    type UpdateRequest = EventUpdateDBRequest;
    type Response = EventDBResponse;
    type Id = EventId;
    type Filter = EventFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let event = sqlx::query_as::<_, EventDBResponse>(
            r#"
            INSERT INTO events (id, title, description, event_date, registration_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.event_date)
        .bind(&request.registration_url)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(event)
    }

    #[instrument(skip(self), fields(event_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let event = sqlx::query_as::<_, EventDBResponse>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(event)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<EventId>) -> Result<HashMap<Self::Id, EventDBResponse>> {
        let events = sqlx::query_as::<_, EventDBResponse>("SELECT * FROM events WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(events.into_iter().map(|e| (e.id, e)).collect())
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let events = match filter {
            EventFilter::UpcomingFrom(now) => {
                sqlx::query_as::<_, EventDBResponse>("SELECT * FROM events WHERE event_date >= $1 ORDER BY event_date ASC")
                    .bind(now)
                    .fetch_all(&mut *self.db)
                    .await?
            }
            EventFilter::All => {
                sqlx::query_as::<_, EventDBResponse>("SELECT * FROM events ORDER BY event_date DESC")
                    .fetch_all(&mut *self.db)
                    .await?
            }
        };
        Ok(events)
    }

    #[instrument(skip(self), fields(event_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(event_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let (set_link, link) = match &request.registration_url {
            Some(link) => (true, link.clone()),
            None => (false, None),
        };

        let event = sqlx::query_as::<_, EventDBResponse>(
            r#"
            UPDATE events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                event_date = COALESCE($4, event_date),
                registration_url = CASE WHEN $5::boolean THEN $6::text ELSE registration_url END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.event_date)
        .bind(set_link)
        .bind(link)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(event)
    }
}

impl<'c> Events<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::PgPool;

    fn event(title: &str, event_date: DateTime<Utc>) -> EventCreateDBRequest {
        EventCreateDBRequest {
            title: title.to_string(),
            description: None,
            event_date,
            registration_url: Some("https://example.com/register".to_string()),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upcoming_excludes_past_events(pool: PgPool) {
        let now = Utc::now();
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Events::new(&mut conn);

        repo.create(&event("Last week", now - Duration::days(7))).await.unwrap();
        repo.create(&event("Next month", now + Duration::days(30))).await.unwrap();
        repo.create(&event("Tomorrow", now + Duration::days(1))).await.unwrap();

        let upcoming = repo.list(&EventFilter::UpcomingFrom(now)).await.unwrap();
        assert_eq!(
            upcoming.iter().map(|e| e.title.as_str()).collect::<Vec<_>>(),
            vec!["Tomorrow", "Next month"]
        );

        let all = repo.list(&EventFilter::All).await.unwrap();
        assert_eq!(
            all.iter().map(|e| e.title.as_str()).collect::<Vec<_>>(),
            vec!["Next month", "Tomorrow", "Last week"]
        );
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_can_clear_registration_link(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Events::new(&mut conn);
        let created = repo.create(&event("Kickoff", Utc::now())).await.unwrap();

        let renamed = repo
            .update(
                created.id,
                &EventUpdateDBRequest {
                    title: Some("Kickoff call".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.title, "Kickoff call");
        assert!(renamed.registration_url.is_some());

        let cleared = repo
            .update(
                created.id,
                &EventUpdateDBRequest {
                    registration_url: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.registration_url.is_none());

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
