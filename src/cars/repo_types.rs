use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A car listing as stored and as returned to clients.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Car {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    #[serde(skip_serializing)]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewCar {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
}

/// Partial update. `None` keeps the stored value; `append_images` is added
/// after the existing images.
#[derive(Debug, Clone, Default)]
pub struct CarChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub append_images: Vec<String>,
}
