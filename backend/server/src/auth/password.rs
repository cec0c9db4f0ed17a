use tokio::task::spawn_blocking;

use crate::error::AppError;

/// Runs on the blocking pool.
pub async fn hash_password(plain: &str, cost: u32) -> Result<String, AppError> {
    let plain = plain.to_string();

    spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let (plain, hash) = (plain.to_string(), hash.to_string());

    let matched = spawn_blocking(move || bcrypt::verify(plain, &hash).unwrap_or(false))
        .await
        .map_err(AppError::internal)?;

    Ok(matched)
}
