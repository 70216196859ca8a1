//! Client side of the task API: an HTTP transport and the task store a UI
//! renders from.

pub mod api;
pub mod store;

pub use api::{ApiError, HttpTaskApi, NewTaskPayload, TaskApi, TaskItem, TaskPatch};
pub use store::{ActionError, ActionResult, Filter, Navigator, TaskStore, LOGIN_PATH};
