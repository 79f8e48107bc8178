use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /users/signup`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for `POST /users/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by signup and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
}
