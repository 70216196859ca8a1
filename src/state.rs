use std::sync::Arc;

use actix_web::web;

use crate::auth::{PasswordHasher, TokenCodec};
use crate::config::Config;
use crate::error::AppError;
use crate::store::Store;

/// Everything the handlers share, registered as `web::Data` on the app.
///
/// All of it is read-only for the lifetime of the process; mutable state
/// lives in the store.
#[derive(Clone)]
pub struct AppState {
    pub store: web::Data<dyn Store>,
    pub tokens: web::Data<TokenCodec>,
    pub passwords: web::Data<PasswordHasher>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, tokens: TokenCodec, passwords: PasswordHasher) -> Self {
        Self {
            store: web::Data::from(store),
            tokens: web::Data::new(tokens),
            passwords: web::Data::new(passwords),
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Self {
        Self::new(
            store,
            TokenCodec::new(&config.jwt_secret),
            PasswordHasher::new(config.bcrypt_cost),
        )
    }

    /// Registers shared data and the extractor configs on an app or scope.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.store.clone())
            .app_data(self.tokens.clone())
            .app_data(self.passwords.clone())
            .app_data(
                // Parser positions stay in the log, not in the response.
                web::JsonConfig::default().error_handler(|err, req| {
                    log::debug!("unreadable JSON body on {}: {}", req.path(), err);
                    AppError::BadRequest("Invalid request body: malformed JSON".into()).into()
                }),
            )
            // Path params are resource ids; an unparsable id names nothing.
            .app_data(
                web::PathConfig::default()
                    .error_handler(|_err, _req| AppError::NotFound("Not found".into()).into()),
            );
    }
}
