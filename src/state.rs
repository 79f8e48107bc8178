use crate::auth::{
    jwt::JwtKeys,
    password::Passwords,
    repo::{PgUserStore, UserStore},
};
use crate::cars::repo::{CarStore, PgCarStore};
use crate::config::AppConfig;
use crate::storage::{MediaUploader, S3Uploader};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub cars: Arc<dyn CarStore>,
    pub media: Arc<dyn MediaUploader>,
    pub media_folder: Arc<str>,
    pub jwt: JwtKeys,
    pub passwords: Passwords,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let db = crate::db::connect(config).await?;
        let media = Arc::new(S3Uploader::new(&config.media).await?) as Arc<dyn MediaUploader>;

        Ok(Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            cars: Arc::new(PgCarStore::new(db)),
            media,
            media_folder: config.media.folder.as_str().into(),
            jwt: JwtKeys::new(&config.jwt),
            passwords: Passwords::new(&config.password)?,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_uploader(Arc::new(crate::testing::FakeUploader::default()))
    }

    #[cfg(test)]
    pub fn fake_with_failing_uploads() -> Self {
        Self::fake_with_uploader(Arc::new(crate::testing::FakeUploader::failing()))
    }

    #[cfg(test)]
    pub fn fake_with_uploader(media: Arc<crate::testing::FakeUploader>) -> Self {
        use crate::config::{JwtConfig, PasswordConfig};
        use crate::testing::{MemoryCarStore, MemoryUserStore};

        let jwt = JwtKeys::new(&JwtConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_days: 30,
        });
        let passwords = Passwords::new(&PasswordConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .expect("cheap argon2 params are valid");

        Self {
            users: Arc::new(MemoryUserStore::default()),
            cars: Arc::new(MemoryCarStore::default()),
            media,
            media_folder: "car_management".into(),
            jwt,
            passwords,
        }
    }
}
