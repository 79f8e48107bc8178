use axum::{
    extract::{
        multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    cars::{
        dto::{CarForm, MessageResponse, SearchQuery},
        repo_types::Car,
        services,
    },
    error::AppError,
    state::AppState,
};

const MAX_FORM_BYTES: usize = 32 * 1024 * 1024;

pub fn car_routes() -> Router<AppState> {
    Router::new()
        .route("/cars", get(list_cars).post(create_car))
        .route("/cars/search", get(search_cars))
        .route(
            "/cars/:id",
            get(get_car).put(update_car).delete(delete_car),
        )
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}

/// Ids that do not parse are reported the same way as ids that do not exist.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Car not found".into()))
}

#[instrument(skip(state, principal, mp), fields(user_id = %principal.id))]
pub async fn create_car(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Car>), AppError> {
    let form = CarForm::from_multipart(mp?).await?;
    let car = services::create_car(&state, &principal, form).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/cars/{}", car.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(car)))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn list_cars(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<Car>>, AppError> {
    Ok(Json(services::list_cars(&state, &principal).await?))
}

#[instrument(skip(state, principal, q), fields(user_id = %principal.id))]
pub async fn search_cars(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<Car>>, AppError> {
    let cars = services::search_cars(&state, &principal, q.keyword.as_deref()).await?;
    Ok(Json(cars))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn get_car(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Car>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(services::get_car(&state, &principal, id).await?))
}

#[instrument(skip(state, principal, mp), fields(user_id = %principal.id))]
pub async fn update_car(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<Car>, AppError> {
    let id = parse_id(&id)?;
    let form = CarForm::from_multipart(mp?).await?;
    Ok(Json(services::update_car(&state, &principal, id, form).await?))
}

#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn delete_car(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    services::delete_car(&state, &principal, id).await?;
    Ok(Json(MessageResponse {
        message: "Car deleted successfully".into(),
    }))
}
