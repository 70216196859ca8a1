#![allow(dead_code)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{test, App};
use serde_json::{json, Value};
use tasklist::auth::cookie::SESSION_COOKIE;
use tasklist::auth::{PasswordHasher, TokenCodec};
use tasklist::models::PublicUser;
use tasklist::routes;
use tasklist::store::MemoryStore;
use tasklist::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";

/// App state over an empty in-memory store, with the cheapest bcrypt cost.
pub fn test_state() -> AppState {
    test_state_with_cost(4)
}

pub fn test_state_with_cost(bcrypt_cost: u32) -> AppState {
    AppState::new(
        Arc::new(MemoryStore::new()),
        TokenCodec::new(TEST_SECRET),
        PasswordHasher::new(bcrypt_cost),
    )
}

pub async fn init_app(
    state: AppState,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
            .configure(routes::config),
    )
    .await
}

/// A signed-up user and the session token the server set for them.
pub struct TestUser {
    pub user: PublicUser,
    pub token: String,
}

impl TestUser {
    pub fn cookie(&self) -> Cookie<'static> {
        Cookie::new(SESSION_COOKIE, self.token.clone())
    }
}

pub fn session_token<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

pub async fn signup(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    email: &str,
    username: &str,
) -> Result<TestUser, String> {
    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({
            "email": email,
            "username": username,
            "password": "secret123",
            "confirmPassword": "secret123"
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let token = session_token(&resp);
    let body = test::read_body(resp).await;

    if !status.is_success() {
        return Err(format!(
            "signup failed. Status: {}. Body: {}",
            status,
            String::from_utf8_lossy(&body)
        ));
    }

    let parsed: Value = serde_json::from_slice(&body)
        .map_err(|e| format!("failed to parse signup response: {}", e))?;
    let user: PublicUser = serde_json::from_value(parsed["user"].clone())
        .map_err(|e| format!("signup response has no user: {}", e))?;

    Ok(TestUser {
        user,
        token: token.ok_or("signup did not set a session cookie")?,
    })
}
