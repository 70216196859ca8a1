use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{CreateTaskRequest, UpdateTaskRequest},
    routes::json::JsonBody,
    store::Store,
};
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

const TASK_NOT_FOUND: &str = "Task not found";

/// Builds the not-found error for an ownership-scoped operation that matched
/// nothing. The client always gets the same answer; the log says which case it was.
async fn task_not_found(store: &dyn Store, id: Uuid, owner: Uuid) -> AppError {
    match store.task_exists(id).await {
        Ok(true) => log::warn!("user {} addressed task {} owned by another user", owner, id),
        Ok(false) => log::debug!("user {} addressed missing task {}", owner, id),
        Err(e) => log::error!("could not check whether task {} exists: {}", id, e),
    }
    AppError::NotFound(TASK_NOT_FOUND.into())
}

/// Retrieves the authenticated user's tasks, newest first.
///
/// ## Responses:
/// - `200 OK`: JSON array of `Task` objects.
/// - `401 Unauthorized`: no or invalid session.
#[get("")]
pub async fn list_tasks(
    user: AuthenticatedUser,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let tasks = store.list_tasks(user.0.user_id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task owned by the authenticated user.
///
/// ## Request Body:
/// - `title`: required, non-empty.
/// - `description` (optional).
/// - `dueDate` (optional): `YYYY-MM-DD`; empty means none.
/// - `completed` (optional): defaults to `false`.
///
/// ## Responses:
/// - `200 OK`: the created `Task`.
/// - `400 Bad Request`: validation failure.
/// - `401 Unauthorized`: no or invalid session.
#[post("")]
pub async fn create_task(
    user: AuthenticatedUser,
    store: web::Data<dyn Store>,
    payload: JsonBody<CreateTaskRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    payload.validate()?;

    let task = store
        .insert_task(user.0.user_id, payload.into_new_task())
        .await?;
    log::info!("user {} created task {}", user.0.user_id, task.id);
    Ok(HttpResponse::Ok().json(task))
}

/// Partially updates a task the authenticated user owns.
///
/// The update is one conditional statement on `(id, owner)`. A task that does
/// not exist and a task owned by someone else both answer `404`.
///
/// ## Responses:
/// - `200 OK`: the updated `Task`, re-read after the write.
/// - `400 Bad Request`: validation failure, including an empty payload.
/// - `401 Unauthorized`: no or invalid session.
/// - `404 Not Found`: no such task for this user.
#[put("/{id}")]
pub async fn update_task(
    user: AuthenticatedUser,
    store: web::Data<dyn Store>,
    task_id: web::Path<Uuid>,
    payload: JsonBody<UpdateTaskRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    payload.validate()?;

    let id = task_id.into_inner();
    let owner = user.0.user_id;

    let updated = store.update_task(id, owner, &payload.into_changes()).await?;
    if updated == 0 {
        return Err(task_not_found(&**store, id, owner).await);
    }

    // A concurrent delete can remove the row between the two statements.
    match store.find_task(id, owner).await? {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(AppError::NotFound(TASK_NOT_FOUND.into())),
    }
}

/// Deletes a task the authenticated user owns.
///
/// ## Responses:
/// - `200 OK`: `{"success": true}`.
/// - `401 Unauthorized`: no or invalid session.
/// - `404 Not Found`: no such task for this user, including a repeated delete.
#[delete("/{id}")]
pub async fn delete_task(
    user: AuthenticatedUser,
    store: web::Data<dyn Store>,
    task_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = task_id.into_inner();
    let owner = user.0.user_id;

    if store.delete_task(id, owner).await? == 0 {
        return Err(task_not_found(&**store, id, owner).await);
    }

    log::info!("user {} deleted task {}", owner, id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
