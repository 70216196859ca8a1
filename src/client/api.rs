use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use actix_web::cookie::Cookie;
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::cookie::SESSION_COOKIE;
use crate::auth::AuthResponse;
use crate::models::PublicUser;

/// A task as the client sees it. Ids are strings so that optimistic
/// placeholders (`tmp-…`) can sit next to server records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskPayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Fields to change on a task; absent fields are left alone by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Transport-level outcome of a failed API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered 401: the session is gone.
    Unauthorized,
    /// Any other non-success status.
    Status(u16),
    /// The response body was not what the endpoint promises.
    Decode(String),
    /// The request never got an answer.
    Network(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::Status(status) => write!(f, "unexpected status {}", status),
            ApiError::Decode(msg) => write!(f, "invalid response: {}", msg),
            ApiError::Network(msg) => write!(f, "network error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// The task endpoints, as the client task store needs them.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list(&self) -> Result<Vec<TaskItem>, ApiError>;
    async fn create(&self, task: &NewTaskPayload) -> Result<TaskItem, ApiError>;
    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskItem, ApiError>;
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: TaskApi + ?Sized> TaskApi for Arc<T> {
    async fn list(&self) -> Result<Vec<TaskItem>, ApiError> {
        (**self).list().await
    }

    async fn create(&self, task: &NewTaskPayload) -> Result<TaskItem, ApiError> {
        (**self).create(task).await
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskItem, ApiError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        (**self).delete(id).await
    }
}

/// `TaskApi` over HTTP.
///
/// Holds the session token the server hands out in its `Set-Cookie` header
/// and sends it back as a `Cookie` header, the way a browser would.
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
    session: RwLock<Option<String>>,
}

impl HttpTaskApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: RwLock::new(None),
        }
    }

    pub fn session_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<PublicUser, ApiError> {
        let body = json!({
            "email": email,
            "username": username,
            "password": password,
            "confirmPassword": confirm_password,
        });
        let response = self
            .send(self.request(Method::POST, "/api/auth/signup").json(&body))
            .await?;
        Ok(decode::<AuthResponse>(response).await?.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, ApiError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .send(self.request(Method::POST, "/api/auth/login").json(&body))
            .await?;
        Ok(decode::<AuthResponse>(response).await?.user)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send(self.request(Method::POST, "/api/auth/logout"))
            .await?;
        Ok(())
    }

    pub async fn me(&self) -> Result<PublicUser, ApiError> {
        let response = self.send(self.request(Method::GET, "/api/auth/me")).await?;
        Ok(decode::<AuthResponse>(response).await?.user)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match self.session_token() {
            Some(token) => builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        self.remember_session(&response);

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            status if !status.is_success() => Err(ApiError::Status(status.as_u16())),
            _ => Ok(response),
        }
    }

    /// Mirrors what a browser does with our session cookie: store it, or
    /// forget it when the server expires it.
    fn remember_session(&self, response: &Response) {
        let session_cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_owned()).ok())
            .find(|cookie| cookie.name() == SESSION_COOKIE);

        if let Some(cookie) = session_cookie {
            let expired = cookie.value().is_empty()
                || cookie.max_age().map_or(false, |age| age.is_zero());
            let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
            *session = if expired {
                None
            } else {
                Some(cookie.value().to_owned())
            };
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list(&self) -> Result<Vec<TaskItem>, ApiError> {
        let response = self.send(self.request(Method::GET, "/api/tasks")).await?;
        decode(response).await
    }

    async fn create(&self, task: &NewTaskPayload) -> Result<TaskItem, ApiError> {
        let response = self
            .send(self.request(Method::POST, "/api/tasks").json(task))
            .await?;
        decode(response).await
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskItem, ApiError> {
        let response = self
            .send(
                self.request(Method::PUT, &format!("/api/tasks/{}", id))
                    .json(patch),
            )
            .await?;
        decode(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("/api/tasks/{}", id)))
            .await?;
        Ok(())
    }
}
