use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

lazy_static! {
    // Strict date-only form; the calendar check happens in `parse_due_date`.
    static ref DUE_DATE_REGEX: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

const DUE_DATE_MESSAGE: &str = "Date must be in YYYY-MM-DD format";

/// Represents a task as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// The user who owns the task. Every read and write is scoped by it.
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Calendar date, serialized as `YYYY-MM-DD`.
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated task ready to be inserted for some owner.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
}

/// A partial update. `None` leaves a column alone; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
}

/// Payload of `POST /api/tasks`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Missing titles deserialize as empty so they surface as a field error.
    #[serde(default)]
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    pub description: Option<String>,

    /// `YYYY-MM-DD`; an empty string means "no due date".
    #[serde(rename = "dueDate")]
    #[validate(custom = "validate_due_date")]
    pub due_date: Option<String>,

    pub completed: Option<bool>,
}

/// Payload of `PUT /api/tasks/{id}`. At least one field must be present.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "require_any_field"))]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,

    pub description: Option<String>,

    #[serde(rename = "dueDate")]
    #[validate(custom = "validate_due_date")]
    pub due_date: Option<String>,

    pub completed: Option<bool>,
}

/// Parses a strict `YYYY-MM-DD` string into a real calendar date.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    if !DUE_DATE_REGEX.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn validate_due_date(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || parse_due_date(value).is_some() {
        return Ok(());
    }
    let mut error = ValidationError::new("due_date");
    error.message = Some(Cow::Borrowed(DUE_DATE_MESSAGE));
    Err(error)
}

fn require_any_field(request: &UpdateTaskRequest) -> Result<(), ValidationError> {
    if request.title.is_some()
        || request.description.is_some()
        || request.due_date.is_some()
        || request.completed.is_some()
    {
        return Ok(());
    }
    let mut error = ValidationError::new("at_least_one_field");
    error.message = Some(Cow::Borrowed(
        "At least one field must be provided for updates",
    ));
    Err(error)
}

/// Empty strings are treated as "no value".
fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl CreateTaskRequest {
    /// Converts a payload that already passed `validate()`.
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title,
            description: self.description.and_then(non_empty),
            due_date: self.due_date.as_deref().and_then(parse_due_date),
            completed: self.completed.unwrap_or(false),
        }
    }
}

impl UpdateTaskRequest {
    /// Converts a payload that already passed `validate()`.
    pub fn into_changes(self) -> TaskChanges {
        TaskChanges {
            title: self.title,
            description: self.description.map(non_empty),
            due_date: self.due_date.map(|value| parse_due_date(&value)),
            completed: self.completed,
        }
    }
}

impl Task {
    /// Builds a fresh, not yet persisted task for `user_id`.
    pub fn new(input: NewTask, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: input.title,
            description: input.description,
            due_date: input.due_date,
            completed: input.completed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update in place, bumping `updated_at`.
    pub fn apply(&mut self, changes: &TaskChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = due_date;
        }
        if let Some(completed) = changes.completed {
            self.completed = completed;
        }
        self.updated_at = Utc::now();
    }
}
