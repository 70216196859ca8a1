//! Persistence for users and tasks.
//!
//! Handlers only see the [`Store`] trait. [`PgStore`] is the production
//! implementation; [`MemoryStore`] keeps everything in process and backs the
//! test-suite.
//!
//! Task mutations take both the task id and the owner id and report how many
//! rows they touched. Zero means "no task with that id belongs to that owner";
//! callers must not try to tell the two causes apart for the client.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewTask, NewUser, Task, TaskChanges, User};

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Any user holding either the email or the username.
    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, AppError>;

    /// Fails with `AppError::Conflict` when email or username is already taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;

    /// Tasks of `owner`, newest first.
    async fn list_tasks(&self, owner: Uuid) -> Result<Vec<Task>, AppError>;

    async fn insert_task(&self, owner: Uuid, task: NewTask) -> Result<Task, AppError>;

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError>;

    /// Conditional update on `(id, owner)`; returns the number of rows changed.
    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &TaskChanges,
    ) -> Result<u64, AppError>;

    /// Conditional delete on `(id, owner)`; returns the number of rows removed.
    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<u64, AppError>;

    /// Whether a task with this id exists for anyone. Only used for server-side
    /// diagnostics after an ownership-scoped operation matched nothing.
    async fn task_exists(&self, id: Uuid) -> Result<bool, AppError>;

    /// Cheap round trip used by the health check.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
