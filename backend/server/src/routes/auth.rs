use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use census::{Role, User, utils::sanitize_key};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::users::{UserUpdate, register_handler, update_user};
use crate::{
    auth::{
        AuthUser, otp,
        password::{hash_password, verify_password},
    },
    error::AppError,
    mail::Mail,
    state::State as AppState,
    utils::{message, require, validate_email},
};

#[derive(Deserialize, Debug)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OtpQuery {
    pub username: Option<String>,
    pub code: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MailRequest {
    pub username: Option<String>,
    pub user_email: Option<String>,
    pub text: Option<String>,
    pub subject: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
    pub role: Role,
    pub token: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/authenticate", post(authenticate_handler))
        .route("/user/{username}", get(user_handler))
        .route("/generateOTP", get(generate_otp_handler))
        .route("/verifyOTP", get(verify_otp_handler))
        .route("/createResetSession", get(reset_session_handler))
        .route("/resetPassword", put(reset_password_handler))
        .route("/updateuser", put(update_self_handler))
        .route("/registerMail", post(register_mail_handler))
}

/// Looks a user up by the username as typed, 404 when missing.
async fn existing_user(state: &AppState, username: &str, missing: &str) -> Result<User, AppError> {
    state
        .store
        .find_user_by_username(&sanitize_key(username))
        .await?
        .ok_or_else(|| AppError::not_found(missing))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(credentials) = payload?;
    let username = require(credentials.username.as_deref(), "username")?;
    let password = credentials.password.unwrap_or_default();

    let user = existing_user(&state, username, "Username not Found").await?;

    if !verify_password(&password, &user.password).await? {
        return Err(AppError::bad_request("Password does not Match"));
    }

    let token = state.tokens.issue(&user)?;
    info!("{} logged in", user.username);

    Ok(Json(LoginResponse {
        message: "Login Successful...!".to_string(),
        username: user.username,
        role: user.role,
        token,
    })
    .into_response())
}

async fn authenticate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UsernameQuery>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(query) = payload?;
    let username = require(query.username.as_deref(), "username")?;

    existing_user(&state, username, "Can't find User!").await?;

    Ok(message(StatusCode::OK, "User exists"))
}

async fn user_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let user = existing_user(&state, &username, "User not found").await?;

    Ok(Json(user.public()).into_response())
}

async fn generate_otp_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let username = require(query.username.as_deref(), "username")?;
    let user = existing_user(&state, username, "Can't find User!").await?;

    let entry = otp::issue(&*state.store, &state.config, &user.username, Utc::now()).await?;

    state
        .mailer
        .send(&Mail {
            to: user.email.clone(),
            subject: "Password Recovery OTP".to_string(),
            text: format!(
                "Your Password Recovery OTP is {}. Verify and recover your password.",
                entry.code
            ),
        })
        .await?;

    Ok(message(StatusCode::CREATED, "OTP Generated Successfully"))
}

async fn verify_otp_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OtpQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let username = require(query.username.as_deref(), "username")?;
    let code = require(query.code.as_deref(), "code")?;
    let user = existing_user(&state, username, "Can't find User!").await?;

    otp::verify(
        &*state.store,
        &state.config,
        &user.username,
        code,
        Utc::now(),
    )
    .await?;

    Ok(message(StatusCode::CREATED, "Verify Successfully!"))
}

async fn reset_session_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let username = sanitize_key(require(query.username.as_deref(), "username")?);

    if !otp::session_open(&*state.store, &username, Utc::now()).await? {
        return Err(AppError::SessionExpired);
    }

    Ok((StatusCode::CREATED, Json(json!({ "flag": true }))).into_response())
}

async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(credentials) = payload?;
    let username = sanitize_key(require(credentials.username.as_deref(), "username")?);
    let password = credentials
        .password
        .filter(|password| !password.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("password is required"))?;

    let mut user = existing_user(&state, &username, "Username not Found").await?;
    let hash = hash_password(&password, state.config.bcrypt_cost).await?;

    // a rejected request must leave the session open for a retry
    otp::take_session(&*state.store, &username, Utc::now()).await?;

    user.password = hash;
    user.updated_at = Utc::now();
    if !state.store.replace_user(&user).await? {
        return Err(AppError::not_found("Username not Found"));
    }

    info!("Password reset for {username}");
    Ok(message(StatusCode::CREATED, "Record Updated...!"))
}

async fn update_self_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(update) = payload?;

    if update.role.is_some() || update.password.is_some() {
        return Err(AppError::bad_request(
            "Role and password cannot be changed here",
        ));
    }

    update_user(&state, &claims.user_id, update).await?;

    Ok(message(StatusCode::CREATED, "Record Updated...!"))
}

async fn register_mail_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MailRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let username = require(request.username.as_deref(), "username")?;
    let to = require(request.user_email.as_deref(), "userEmail")?;
    validate_email(to)?;

    let text = request
        .text
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| format!("Welcome {username}! Your account is ready."));

    state
        .mailer
        .send(&Mail {
            to: to.to_string(),
            subject: request
                .subject
                .unwrap_or_else(|| "Signup Successful".to_string()),
            text,
        })
        .await?;

    Ok(message(StatusCode::OK, "You should receive an email from us."))
}
