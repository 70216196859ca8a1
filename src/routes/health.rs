use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::store::Store;

/// Liveness and readiness check. Lives outside `/api` and needs no session.
///
/// Answers `503` with `"status": "degraded"` while the store is unreachable.
#[get("/health")]
pub async fn health(store: web::Data<dyn Store>) -> HttpResponse {
    let (mut response, status, store_state) = match store.ping().await {
        Ok(()) => (HttpResponse::Ok(), "ok", "up"),
        Err(e) => {
            log::error!("health check: store unreachable: {}", e);
            (HttpResponse::ServiceUnavailable(), "degraded", "down")
        }
    };

    response.json(json!({
        "status": status,
        "store": store_state,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now()
    }))
}
