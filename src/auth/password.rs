use actix_web::web;
use bcrypt::{hash, verify};

use crate::error::AppError;

/// bcrypt with a configurable cost. Each hash gets a fresh random salt.
///
/// Hashing is deliberately slow, so both operations run on actix's blocking
/// thread pool instead of an async worker.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.cost;
        web::block(move || hash(password, cost))
            .await?
            .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
    }

    /// `Ok(false)` on a mismatch; `Err` only when the stored hash is unusable.
    pub async fn verify(&self, password: &str, hashed_password: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let hashed_password = hashed_password.to_owned();
        web::block(move || verify(password, &hashed_password))
            .await?
            .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
    }

    /// Verification for an account that does not exist. Does one hash at the
    /// configured cost, like `verify`, and always answers `false`.
    pub async fn verify_absent(&self, password: &str) -> Result<bool, AppError> {
        self.hash(password).await?;
        Ok(false)
    }
}
