use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, SignupRequest},
        repo::DuplicateUser,
        repo_types::{NewUser, User},
    },
    error::AppError,
    state::AppState,
};

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn auth_response(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let token = state
        .jwt
        .sign(user.id)
        .map_err(|e| AppError::upstream("Failed to generate token")(e.into()))?;
    Ok(AuthResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        token,
    })
}

pub async fn register(state: &AppState, payload: SignupRequest) -> Result<AuthResponse, AppError> {
    let username = payload.username.trim().to_string();
    let email = normalize_email(&payload.email);

    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let email_taken = state
        .users
        .find_by_email(&email)
        .await
        .map_err(AppError::upstream("Failed to create user"))?
        .is_some();
    let username_taken = state
        .users
        .find_by_username(&username)
        .await
        .map_err(AppError::upstream("Failed to create user"))?
        .is_some();
    if email_taken || username_taken {
        warn!(%email, %username, "user already exists");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = state
        .passwords
        .hash(&payload.password)
        .map_err(AppError::upstream("Failed to hash password"))?;

    let user = state
        .users
        .create(NewUser {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
        })
        .await
        .map_err(|e| {
            if e.is::<DuplicateUser>() {
                AppError::Conflict("User already exists".into())
            } else {
                AppError::upstream("Failed to create user")(e)
            }
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    auth_response(state, user)
}

pub async fn login(state: &AppState, payload: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }

    let invalid = || AppError::Unauthenticated("Invalid email or password".into());

    let user = match state
        .users
        .find_by_email(&email)
        .await
        .map_err(AppError::upstream("Failed to log in"))?
    {
        Some(u) => u,
        None => {
            warn!(%email, "login unknown email");
            return Err(invalid());
        }
    };

    let ok = state
        .passwords
        .verify(&payload.password, &user.password_hash)
        .map_err(AppError::upstream("Failed to log in"))?;
    if !ok {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    auth_response(state, user)
}
