use census::{OtpEntry, Store};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, warn};

use crate::{config::Config, error::AppError};

pub fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}

/// Replaces any pending code for `username`.
pub async fn issue(
    store: &dyn Store,
    config: &Config,
    username: &str,
    now: DateTime<Utc>,
) -> Result<OtpEntry, AppError> {
    let entry = OtpEntry {
        code: generate_code(),
        attempts: 0,
        expires_at: now + Duration::seconds(config.otp_ttl_secs),
        created_at: now,
    };

    store.put_otp(username, &entry).await?;
    debug!("Issued OTP for {username}");

    Ok(entry)
}

/// A correct code is consumed and opens a reset session.
pub async fn verify(
    store: &dyn Store,
    config: &Config,
    username: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let Some(mut entry) = store.get_otp(username).await? else {
        return Err(AppError::bad_request("Invalid OTP"));
    };

    if entry.is_expired(now) {
        store.clear_otp(username).await?;
        return Err(AppError::bad_request("OTP expired"));
    }

    if entry.code != code.trim() {
        entry.attempts += 1;

        if entry.attempts >= config.otp_max_attempts {
            warn!("Too many OTP attempts for {username}, discarding code");
            store.clear_otp(username).await?;
        } else {
            store.put_otp(username, &entry).await?;
        }

        return Err(AppError::bad_request("Invalid OTP"));
    }

    store.clear_otp(username).await?;
    store
        .put_reset_session(
            username,
            now + Duration::seconds(config.reset_session_ttl_secs),
        )
        .await?;

    Ok(())
}

/// True while a reset session opened by [`verify`] is still live. Does not consume it.
pub async fn session_open(
    store: &dyn Store,
    username: &str,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let expires_at = store.peek_reset_session(username).await?;

    Ok(expires_at.is_some_and(|at| at > now))
}

/// Consumes the reset session. Fails with [`AppError::SessionExpired`] when none is live.
pub async fn take_session(
    store: &dyn Store,
    username: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    match store.take_reset_session(username).await? {
        Some(at) if at > now => Ok(()),
        _ => Err(AppError::SessionExpired),
    }
}
