use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::Principal,
    cars::{
        dto::{parse_tags, CarForm},
        repo_types::{Car, CarChanges, NewCar},
    },
    error::AppError,
    images::services::resolve_images,
    state::AppState,
};

fn not_found() -> AppError {
    AppError::NotFound("Car not found".into())
}

/// Loads a car and checks it belongs to `principal`. Existence is checked first.
async fn owned_car(st: &AppState, principal: &Principal, id: Uuid) -> Result<Car, AppError> {
    let car = st
        .cars
        .find(id)
        .await
        .map_err(AppError::upstream("Failed to fetch car"))?
        .ok_or_else(not_found)?;
    if car.user_id != principal.id {
        warn!(user_id = %principal.id, car_id = %id, owner = %car.user_id, "car access denied");
        return Err(AppError::Forbidden);
    }
    Ok(car)
}

pub async fn create_car(st: &AppState, principal: &Principal, form: CarForm) -> Result<Car, AppError> {
    let title = form
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Title is required".into()))?;
    let tags = form.tags.as_deref().map(parse_tags).unwrap_or_default();
    let images = resolve_images(st, principal.id, form.images).await?;

    let car = st
        .cars
        .insert(NewCar {
            id: Uuid::new_v4(),
            user_id: principal.id,
            title,
            description: form.description,
            tags,
            images,
        })
        .await
        .map_err(AppError::upstream("Failed to create car"))?;

    info!(user_id = %principal.id, car_id = %car.id, "car created");
    Ok(car)
}

pub async fn list_cars(st: &AppState, principal: &Principal) -> Result<Vec<Car>, AppError> {
    st.cars
        .list_by_user(principal.id)
        .await
        .map_err(AppError::upstream("Failed to fetch cars"))
}

pub async fn get_car(st: &AppState, principal: &Principal, id: Uuid) -> Result<Car, AppError> {
    owned_car(st, principal, id).await
}

pub async fn update_car(
    st: &AppState,
    principal: &Principal,
    id: Uuid,
    form: CarForm,
) -> Result<Car, AppError> {
    owned_car(st, principal, id).await?;

    let append_images = resolve_images(st, principal.id, form.images).await?;
    let stored_images = append_images.clone();
    let changes = CarChanges {
        title: form.title.filter(|t| !t.trim().is_empty()),
        description: form.description.filter(|d| !d.trim().is_empty()),
        tags: form
            .tags
            .as_deref()
            .map(parse_tags)
            .filter(|tags| !tags.is_empty()),
        append_images,
    };

    let car = match st.cars.update(id, changes).await {
        Ok(Some(car)) => car,
        outcome => {
            if !stored_images.is_empty() {
                warn!(car_id = %id, images = ?stored_images, "car update failed, stored images are orphaned");
            }
            return Err(match outcome {
                Err(e) => AppError::upstream("Failed to update car")(e),
                _ => not_found(),
            });
        }
    };

    info!(user_id = %principal.id, car_id = %id, "car updated");
    Ok(car)
}

pub async fn delete_car(st: &AppState, principal: &Principal, id: Uuid) -> Result<(), AppError> {
    owned_car(st, principal, id).await?;

    let deleted = st
        .cars
        .soft_delete(id)
        .await
        .map_err(AppError::upstream("Failed to delete car"))?;
    if !deleted {
        return Err(not_found());
    }

    info!(user_id = %principal.id, car_id = %id, "car deleted");
    Ok(())
}

pub async fn search_cars(
    st: &AppState,
    principal: &Principal,
    keyword: Option<&str>,
) -> Result<Vec<Car>, AppError> {
    let keyword = keyword
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Keyword query parameter is required".into()))?;

    st.cars
        .search(principal.id, keyword)
        .await
        .map_err(AppError::upstream("Failed to search cars"))
}
