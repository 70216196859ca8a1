pub mod cookie;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::PublicUser;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::{Session, SessionMiddleware};
pub use password::PasswordHasher;
pub use token::{Claims, Identity, TokenCodec};

/// Represents the payload for a user login request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Represents the payload for a new account.
///
/// Missing fields deserialize as empty strings so they are reported by the
/// validators, field by field, rather than as an unreadable body.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default, rename = "confirmPassword")]
    #[validate(
        length(min = 6, message = "Password must be at least 6 characters"),
        must_match(other = "password", message = "Passwords do not match")
    )]
    pub confirm_password: String,
}

/// Body of every successful signup, login and `me` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: PublicUser,
}
