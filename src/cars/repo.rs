use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::cars::repo_types::{Car, CarChanges, NewCar};

/// Persistence for car listings. Soft-deleted cars are invisible to every
/// method. Ownership is not checked here.
#[async_trait]
pub trait CarStore: Send + Sync {
    async fn insert(&self, car: NewCar) -> anyhow::Result<Car>;
    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Car>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Car>>;
    /// Applies `changes` atomically; `None` if the car no longer exists.
    async fn update(&self, id: Uuid, changes: CarChanges) -> anyhow::Result<Option<Car>>;
    /// Returns false if there was nothing to delete.
    async fn soft_delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Title/description contain `keyword` case-insensitively, or a tag equals it.
    async fn search(&self, user_id: Uuid, keyword: &str) -> anyhow::Result<Vec<Car>>;
}

#[derive(Clone)]
pub struct PgCarStore {
    db: PgPool,
}

impl PgCarStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Escapes LIKE metacharacters so the keyword matches literally.
pub(crate) fn like_pattern(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len() + 2);
    out.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[async_trait]
impl CarStore for PgCarStore {
    async fn insert(&self, car: NewCar) -> anyhow::Result<Car> {
        let row = sqlx::query_as::<_, Car>(
            r#"
            INSERT INTO cars (id, user_id, title, description, tags, images)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, title, description, tags, images, created_at, updated_at
            "#,
        )
        .bind(car.id)
        .bind(car.user_id)
        .bind(&car.title)
        .bind(&car.description)
        .bind(&car.tags)
        .bind(&car.images)
        .fetch_one(&self.db)
        .await
        .context("insert car")?;
        Ok(row)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Car>> {
        let rows = sqlx::query_as::<_, Car>(
            r#"
            SELECT id, user_id, title, description, tags, images, created_at, updated_at
            FROM cars
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list cars by user")?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Car>> {
        let row = sqlx::query_as::<_, Car>(
            r#"
            SELECT id, user_id, title, description, tags, images, created_at, updated_at
            FROM cars
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find car")?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: CarChanges) -> anyhow::Result<Option<Car>> {
        let row = sqlx::query_as::<_, Car>(
            r#"
            UPDATE cars
               SET title       = COALESCE($2, title),
                   description = COALESCE($3, description),
                   tags        = COALESCE($4, tags),
                   images      = images || $5::text[],
                   updated_at  = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, user_id, title, description, tags, images, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.tags)
        .bind(&changes.append_images)
        .fetch_optional(&self.db)
        .await
        .context("update car")?;
        Ok(row)
    }

    async fn soft_delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE cars
               SET deleted_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .context("soft delete car")?;
        Ok(res.rows_affected() > 0)
    }

    async fn search(&self, user_id: Uuid, keyword: &str) -> anyhow::Result<Vec<Car>> {
        let rows = sqlx::query_as::<_, Car>(
            r#"
            SELECT id, user_id, title, description, tags, images, created_at, updated_at
            FROM cars
            WHERE user_id = $1
              AND deleted_at IS NULL
              AND (title ILIKE $2 ESCAPE '\'
                   OR description ILIKE $2 ESCAPE '\'
                   OR $3 = ANY(tags))
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(like_pattern(keyword))
        .bind(keyword)
        .fetch_all(&self.db)
        .await
        .context("search cars")?;
        Ok(rows)
    }
}
