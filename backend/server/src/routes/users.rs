use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use census::{Profile, PublicUser, Role, StoreError, User, utils::sanitize_key};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::password::hash_password,
    error::AppError,
    state::State as AppState,
    utils::{message, require, validate_email},
};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Every field optional, absent fields are left alone.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: Profile,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/", get(list_handler))
        .route(
            "/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    register_user(&state, request).await?;

    Ok(message(StatusCode::CREATED, "User registered successfully"))
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let users: Vec<PublicUser> = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();

    Ok(Json(users).into_response())
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = state
        .store
        .find_user_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(user.public()).into_response())
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(update) = payload?;
    let user = update_user(&state, &id, update).await?;

    Ok(Json(user.public()).into_response())
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = state
        .store
        .delete_user(&id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    info!("Deleted user {}", user.username);
    Ok(message(StatusCode::OK, "User deleted successfully"))
}

fn parse_role(role: &str) -> Result<Role, AppError> {
    role.parse()
        .map_err(|_| AppError::bad_request("Invalid user role"))
}

fn require_password(password: Option<&str>) -> Result<&str, AppError> {
    password
        .filter(|password| !password.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("password is required"))
}

/// Username or email already taken reads as a client error, not a store failure.
fn user_conflict(error: StoreError) -> AppError {
    match error {
        StoreError::Duplicate(_) => AppError::bad_request("User already exists"),
        other => AppError::Store(other),
    }
}

pub async fn register_user(state: &AppState, request: RegisterRequest) -> Result<User, AppError> {
    let role = parse_role(request.role.as_deref().unwrap_or_default())?;
    let username = require(request.username.as_deref(), "username")?;
    let email = require(request.email.as_deref(), "email")?;
    let password = require_password(request.password.as_deref())?;
    validate_email(email)?;

    let store = &state.store;
    if store.find_user_by_username(&sanitize_key(username)).await?.is_some()
        || store.find_user_by_email(&sanitize_key(email)).await?.is_some()
    {
        return Err(AppError::bad_request("User already exists"));
    }

    let hash = hash_password(password, state.config.bcrypt_cost).await?;
    let user = User::new(username, email, hash, role, request.profile);
    store.insert_user(&user).await.map_err(user_conflict)?;

    info!("Registered {} as {}", user.username, user.role);
    Ok(user)
}

pub async fn update_user(state: &AppState, id: &str, update: UserUpdate) -> Result<User, AppError> {
    let role = update.role.as_deref().map(parse_role).transpose()?;

    let mut user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if let Some(role) = role {
        user.role = role;
    }
    if let Some(username) = update.username.as_deref() {
        user.username = sanitize_key(require(Some(username), "username")?);
    }
    if let Some(email) = update.email.as_deref() {
        validate_email(email)?;
        user.email = sanitize_key(email);
    }
    if update.password.is_some() {
        let password = require_password(update.password.as_deref())?;
        user.password = hash_password(password, state.config.bcrypt_cost).await?;
    }

    user.profile.merge(update.profile);
    user.updated_at = Utc::now();

    if !state.store.replace_user(&user).await.map_err(user_conflict)? {
        return Err(AppError::not_found("User not found"));
    }

    Ok(user)
}
