//! Boundary to the remote task service.
//!
//! Each operation maps to exactly one REST call. Nothing here retries or keeps
//! state between calls.

use std::future::Future;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use crate::model::{Task, TaskFields, TaskId, User};

mod http;
#[cfg(test)]
pub mod stub;

pub use http::HttpGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("could not reach the server: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server responded with {status}")]
    Http { status: StatusCode },
    #[error("task {id} not found (server responded with {status})")]
    NotFound { id: TaskId, status: StatusCode },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl GatewayError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Http { status } | GatewayError::NotFound { status, .. } => Some(*status),
            GatewayError::Transport(error) => error.status(),
            GatewayError::Decode(_) | GatewayError::Client(_) => None,
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Result of a best-effort read: on failure `items` is empty and the cause is
/// kept for reporting.
#[derive(Debug)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub failure: Option<GatewayError>,
}

impl<T> Listing<T> {
    pub fn best_effort(resource: &'static str, result: GatewayResult<Vec<T>>) -> Self {
        match result {
            Ok(items) => Listing {
                items,
                failure: None,
            },
            Err(error) => {
                warn!(resource, %error, "listing failed, falling back to an empty list");
                Listing {
                    items: vec![],
                    failure: Some(error),
                }
            }
        }
    }
}

pub trait Gateway: Send + Sync {
    /// `GET /api/users`
    fn fetch_users(&self) -> impl Future<Output = GatewayResult<Vec<User>>> + Send;

    /// `GET /api/tasks`, every user's tasks.
    fn fetch_tasks(&self) -> impl Future<Output = GatewayResult<Vec<Task>>> + Send;

    /// `GET /api/tasks/{id}`. Any non-2xx is reported as `NotFound`.
    fn get_task(&self, id: TaskId) -> impl Future<Output = GatewayResult<Task>> + Send;

    /// `POST /api/tasks`
    fn create_task(&self, fields: &TaskFields)
        -> impl Future<Output = GatewayResult<Task>> + Send;

    /// `PUT /api/tasks/{id}`
    fn update_task(
        &self,
        id: TaskId,
        fields: &TaskFields,
    ) -> impl Future<Output = GatewayResult<Task>> + Send;

    /// `DELETE /api/tasks/{id}`. Only 200 and 204 count as success.
    fn delete_task(&self, id: TaskId) -> impl Future<Output = GatewayResult<()>> + Send;

    fn list_users(&self) -> impl Future<Output = Listing<User>> + Send {
        async move { Listing::best_effort("users", self.fetch_users().await) }
    }

    fn list_tasks(&self) -> impl Future<Output = Listing<Task>> + Send {
        async move { Listing::best_effort("tasks", self.fetch_tasks().await) }
    }
}
