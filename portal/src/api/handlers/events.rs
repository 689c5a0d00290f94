use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::{
        handlers::{optional_title, required_title},
        models::events::{EventCreate, EventResponse, EventUpdate},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{Events, Repository, events::EventFilter},
        models::events::{EventCreateDBRequest, EventUpdateDBRequest},
    },
    errors::{Error, Result},
    types::EventId,
};

fn event_not_found(id: EventId) -> Error {
    Error::NotFound {
        resource: "Event".to_string(),
        id: id.to_string(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Upcoming events, soonest first
#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    summary = "List upcoming events",
    responses(
        (status = 200, description = "Events starting now or later", body = Vec<EventResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_events(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Events, operation::ReadAll>,
) -> Result<Json<Vec<EventResponse>>> {
    let now = Utc::now();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let events = Events::new(&mut conn).list(&EventFilter::UpcomingFrom(now)).await?;

    Ok(Json(events.into_iter().map(|e| EventResponse::from_db(e, now)).collect()))
}

/// Every event for the admin table, latest first
#[utoipa::path(
    get,
    path = "/events/all",
    tag = "events",
    summary = "List all events",
    responses(
        (status = 200, description = "All events by date descending", body = Vec<EventResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_all_events(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Events, operation::UpdateAll>,
) -> Result<Json<Vec<EventResponse>>> {
    let now = Utc::now();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let events = Events::new(&mut conn).list(&EventFilter::All).await?;

    Ok(Json(events.into_iter().map(|e| EventResponse::from_db(e, now)).collect()))
}

#[utoipa::path(
    post,
    path = "/events",
    tag = "events",
    summary = "Create event",
    request_body = EventCreate,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Title is required"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_event(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Events, operation::CreateAll>,
    Json(create): Json<EventCreate>,
) -> Result<(StatusCode, Json<EventResponse>)> {
    let request = EventCreateDBRequest {
        title: required_title(&create.title)?,
        description: create.description,
        event_date: create.event_date,
        registration_url: non_blank(create.registration_url),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let event = Events::new(&mut conn).create(&request).await?;

    Ok((StatusCode::CREATED, Json(EventResponse::from_db(event, Utc::now()))))
}

#[utoipa::path(
    patch,
    path = "/events/{event_id}",
    tag = "events",
    summary = "Update event",
    request_body = EventUpdate,
    params(("event_id" = uuid::Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Updated event", body = EventResponse),
        (status = 400, description = "Title cannot be blank"),
        (status = 404, description = "Event not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    _: RequiresPermission<resource::Events, operation::UpdateAll>,
    Json(update): Json<EventUpdate>,
) -> Result<Json<EventResponse>> {
    let request = EventUpdateDBRequest {
        title: optional_title(update.title)?,
        description: update.description,
        event_date: update.event_date,
        registration_url: update.registration_url.map(|url| non_blank(Some(url))),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Events::new(&mut conn).update(event_id, &request).await {
        Ok(event) => Ok(Json(EventResponse::from_db(event, Utc::now()))),
        Err(DbError::NotFound) => Err(event_not_found(event_id)),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/events/{event_id}",
    tag = "events",
    summary = "Delete event",
    params(("event_id" = uuid::Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    _: RequiresPermission<resource::Events, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Events::new(&mut conn).delete(event_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(event_not_found(event_id))
    }
}
