pub mod auth;
pub mod health;
pub mod json;
pub mod tasks;

use actix_web::web;

use crate::auth::SessionMiddleware;

/// Registers every route. Shared data comes from `AppState::configure`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health).service(
        web::scope("/api")
            .wrap(SessionMiddleware)
            .service(
                web::scope("/auth")
                    .service(auth::signup)
                    .service(auth::login)
                    .service(auth::logout)
                    .service(auth::me),
            )
            .service(
                web::scope("/tasks")
                    .service(tasks::list_tasks)
                    .service(tasks::create_task)
                    .service(tasks::update_task)
                    .service(tasks::delete_task),
            ),
    );
}
