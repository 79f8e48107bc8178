//! In-memory stand-ins for the database and object store, used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        extractors::Principal,
        repo::{DuplicateUser, UserStore},
        repo_types::{NewUser, User},
    },
    cars::{
        repo::CarStore,
        repo_types::{Car, CarChanges, NewCar},
    },
    storage::MediaUploader,
};

pub fn principal(username: &str) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        username: username.into(),
        email: format!("{username}@example.com"),
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(DuplicateUser.into());
        }
        let created = User {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
        };
        users.push(created.clone());
        Ok(created)
    }
}

struct StoredCar {
    car: Car,
    deleted: bool,
}

#[derive(Default)]
pub struct MemoryCarStore {
    cars: Mutex<Vec<StoredCar>>,
}

impl MemoryCarStore {
    fn live(&self) -> Vec<Car> {
        let cars = self.cars.lock().unwrap();
        cars.iter()
            .rev()
            .filter(|c| !c.deleted)
            .map(|c| c.car.clone())
            .collect()
    }
}

fn matches_keyword(car: &Car, keyword: &str) -> bool {
    let needle = keyword.to_lowercase();
    car.title.to_lowercase().contains(&needle)
        || car
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
        || car.tags.iter().any(|t| t == keyword)
}

#[async_trait]
impl CarStore for MemoryCarStore {
    async fn insert(&self, car: NewCar) -> anyhow::Result<Car> {
        let now = OffsetDateTime::now_utc();
        let car = Car {
            id: car.id,
            user_id: car.user_id,
            title: car.title,
            description: car.description,
            tags: car.tags,
            images: car.images,
            created_at: now,
            updated_at: now,
        };
        self.cars.lock().unwrap().push(StoredCar {
            car: car.clone(),
            deleted: false,
        });
        Ok(car)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Car>> {
        Ok(self
            .live()
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Car>> {
        Ok(self.live().into_iter().find(|c| c.id == id))
    }

    async fn update(&self, id: Uuid, changes: CarChanges) -> anyhow::Result<Option<Car>> {
        let mut cars = self.cars.lock().unwrap();
        let Some(stored) = cars.iter_mut().find(|c| c.car.id == id && !c.deleted) else {
            return Ok(None);
        };
        let car = &mut stored.car;
        if let Some(title) = changes.title {
            car.title = title;
        }
        if let Some(description) = changes.description {
            car.description = Some(description);
        }
        if let Some(tags) = changes.tags {
            car.tags = tags;
        }
        car.images.extend(changes.append_images);
        car.updated_at = OffsetDateTime::now_utc();
        Ok(Some(car.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut cars = self.cars.lock().unwrap();
        match cars.iter_mut().find(|c| c.car.id == id && !c.deleted) {
            Some(stored) => {
                stored.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search(&self, user_id: Uuid, keyword: &str) -> anyhow::Result<Vec<Car>> {
        Ok(self
            .live()
            .into_iter()
            .filter(|c| c.user_id == user_id && matches_keyword(c, keyword))
            .collect())
    }
}

/// Records uploads and hands back `https://media.test/<key>`.
#[derive(Default)]
pub struct FakeUploader {
    fail: bool,
    keys: Mutex<Vec<String>>,
}

impl FakeUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            keys: Mutex::default(),
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaUploader for FakeUploader {
    async fn upload(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("object store unavailable");
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("https://media.test/{key}"))
    }
}
