use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_helpers::errors::responses::{
    BadRequestArgumentResponse, BadRequestUploadResponse, BadRequestValidationResponse,
    InternalServerErrorResponse, NotFoundResponse,
};
use std::sync::Arc;
use tracing::instrument;
use utoipa::OpenApi;

use crate::error::{EventError, Result};
use crate::form::{EventForm, EventUpload};
use crate::models::{DeleteResponse, Event, EventStatus, EventType, SearchQuery};
use crate::repository::EventRepository;
use crate::service::EventService;

/// Room left in a request body for the text fields next to the image
const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

/// OpenAPI documentation for the Events API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_events,
        search_events,
        get_event,
        create_event,
        update_event,
        delete_event,
    ),
    components(
        schemas(Event, EventType, EventStatus, EventUpload, DeleteResponse),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUploadResponse,
            BadRequestArgumentResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Events", description = "College event management (MongoDB)")
    )
)]
pub struct ApiDoc;

/// Create the events router with all HTTP endpoints
pub fn router<R: EventRepository + 'static>(service: EventService<R>) -> Router {
    let body_limit = service.max_image_bytes() + FORM_FIELDS_ALLOWANCE;
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/search", get(search_events))
        .route("/{id}", get(get_event).put(update_event).delete(delete_event))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(shared_service)
}

async fn read_form(multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<EventForm> {
    let multipart = multipart.map_err(|e| {
        EventError::InvalidArgument(format!("Expected multipart/form-data: {}", e.body_text()))
    })?;
    EventForm::from_multipart(multipart).await
}

/// List all events by date
#[utoipa::path(
    get,
    path = "",
    tag = "Events",
    responses(
        (status = 200, description = "Events, earliest date first", body = Vec<Event>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_events<R: EventRepository>(
    State(service): State<Arc<EventService<R>>>,
) -> Result<Json<Vec<Event>>> {
    let events = service.list().await?;
    Ok(Json(events))
}

/// Full-text search over title, description and venue
#[utoipa::path(
    get,
    path = "/search",
    tag = "Events",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching events, most relevant first", body = Vec<Event>),
        (status = 400, response = BadRequestArgumentResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
#[instrument(skip(service))]
async fn search_events<R: EventRepository>(
    State(service): State<Arc<EventService<R>>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<Event>>> {
    let events = service.search(params.query.as_deref()).await?;
    Ok(Json(events))
}

/// Get an event by id
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id (24 hex characters)")),
    responses(
        (status = 200, description = "Event found", body = Event),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_event<R: EventRepository>(
    State(service): State<Arc<EventService<R>>>,
    Path(id): Path<String>,
) -> Result<Json<Event>> {
    let event = service.get(&id).await?;
    Ok(Json(event))
}

/// Create an event, optionally with an image
#[utoipa::path(
    post,
    path = "",
    tag = "Events",
    request_body(content = EventUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_event<R: EventRepository>(
    State(service): State<Arc<EventService<R>>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let form = read_form(multipart).await?;
    let event = service.create(form.fields, form.image).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Update some fields of an event; a new image replaces the old one
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id (24 hex characters)")),
    request_body(content = EventUpload, content_type = "multipart/form-data",
        description = "Any subset of the event fields"),
    responses(
        (status = 200, description = "Event updated", body = Event),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_event<R: EventRepository>(
    State(service): State<Arc<EventService<R>>>,
    Path(id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Event>> {
    let form = read_form(multipart).await?;
    let event = service.update(&id, form.fields, form.image).await?;
    Ok(Json(event))
}

/// Delete an event and its image
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event id (24 hex characters)")),
    responses(
        (status = 200, description = "Event deleted", body = DeleteResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_event<R: EventRepository>(
    State(service): State<Arc<EventService<R>>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let response = service.delete(&id).await?;
    Ok(Json(response))
}
