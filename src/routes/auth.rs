use crate::{
    auth::{
        cookie, AuthResponse, AuthenticatedUser, Identity, LoginRequest, PasswordHasher,
        SignupRequest, TokenCodec,
    },
    error::AppError,
    models::{NewUser, PublicUser, User},
    routes::json::JsonBody,
    store::Store,
};
use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use validator::Validate;

/// Same message for an unknown email and a wrong password.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Issues a session for `user`: cookie on the response, public fields in the body.
fn session_response(tokens: &TokenCodec, user: &User) -> Result<HttpResponse, AppError> {
    let token = tokens.issue(&Identity {
        user_id: user.id,
        email: user.email.clone(),
    })?;

    let mut response = HttpResponse::Ok();
    cookie::attach(&mut response, &token, tokens.ttl());
    Ok(response.json(AuthResponse {
        user: PublicUser::from(user),
    }))
}

/// Register a new user
///
/// Validates the payload, refuses taken emails/usernames, stores a bcrypt
/// hash of the password and starts a session.
///
/// ## Responses:
/// - `200 OK`: `{"user": {id, email, username}}` plus the session cookie.
/// - `400 Bad Request`: validation failure (field map) or taken email/username.
#[post("/signup")]
pub async fn signup(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenCodec>,
    passwords: web::Data<PasswordHasher>,
    payload: JsonBody<SignupRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    payload.validate()?;

    let existing = store
        .find_user_by_email_or_username(&payload.email, &payload.username)
        .await?;
    if existing.is_some() {
        log::warn!("signup rejected: email or username already registered");
        return Err(AppError::Conflict(
            "User with this email or username already exists".into(),
        ));
    }

    let password_hash = passwords.hash(&payload.password).await?;
    let user = store
        .insert_user(NewUser {
            email: payload.email,
            username: payload.username,
            password_hash,
        })
        .await?;

    log::info!("user {} signed up", user.id);
    session_response(&tokens, &user)
}

/// Login user
///
/// ## Responses:
/// - `200 OK`: `{"user": {...}}` plus the session cookie.
/// - `400 Bad Request`: malformed email or short password.
/// - `401 Unauthorized`: unknown email or wrong password, indistinguishably.
#[post("/login")]
pub async fn login(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenCodec>,
    passwords: web::Data<PasswordHasher>,
    payload: JsonBody<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    payload.validate()?;

    let user = match store.find_user_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            // Same bcrypt work as a wrong password, so timing does not reveal the email.
            passwords.verify_absent(&payload.password).await?;
            log::warn!("login failed: unknown email");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    if !passwords.verify(&payload.password, &user.password_hash).await? {
        log::warn!("login failed: wrong password for user {}", user.id);
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    log::info!("user {} logged in", user.id);
    session_response(&tokens, &user)
}

/// Ends the session by expiring the cookie. Always succeeds.
#[post("/logout")]
pub async fn logout() -> HttpResponse {
    let mut response = HttpResponse::Ok();
    cookie::clear(&mut response);
    response.json(json!({ "success": true }))
}

/// Current user
///
/// ## Responses:
/// - `200 OK`: `{"user": {...}}`.
/// - `401 Unauthorized`: no or invalid session.
/// - `404 Not Found`: the session names a user that no longer exists.
#[get("/me")]
pub async fn me(
    user: AuthenticatedUser,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    match store.find_user_by_id(user.0.user_id).await? {
        Some(found) => Ok(HttpResponse::Ok().json(AuthResponse {
            user: PublicUser::from(found),
        })),
        None => {
            log::warn!("session for unknown user {}", user.0.user_id);
            Err(AppError::NotFound("User not found".into()))
        }
    }
}
