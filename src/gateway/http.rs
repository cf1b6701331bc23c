use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Gateway, GatewayError, GatewayResult};
use crate::model::{Task, TaskFields, TaskId, User};

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// `base_url` is the service root; `/api/...` is appended per call.
    /// Without a timeout a hung request never completes.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> GatewayResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(GatewayError::Client)?;
        Ok(HttpGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = request.send().await.map_err(GatewayError::Transport)?;
        debug!(url = %response.url(), status = %response.status(), "response");
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let body = response.bytes().await.map_err(GatewayError::Transport)?;
    Ok(serde_json::from_slice(&body)?)
}

async fn decode_success<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::Http { status });
    }
    decode(response).await
}

impl Gateway for HttpGateway {
    async fn fetch_users(&self) -> GatewayResult<Vec<User>> {
        let response = self.send(self.client.get(self.url("users"))).await?;
        decode_success(response).await
    }

    async fn fetch_tasks(&self) -> GatewayResult<Vec<Task>> {
        let response = self.send(self.client.get(self.url("tasks"))).await?;
        decode_success(response).await
    }

    async fn get_task(&self, id: TaskId) -> GatewayResult<Task> {
        let response = self
            .send(self.client.get(self.url(&format!("tasks/{id}"))))
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::NotFound { id, status });
        }
        decode(response).await
    }

    async fn create_task(&self, fields: &TaskFields) -> GatewayResult<Task> {
        let response = self
            .send(self.client.post(self.url("tasks")).json(fields))
            .await?;
        decode_success(response).await
    }

    async fn update_task(&self, id: TaskId, fields: &TaskFields) -> GatewayResult<Task> {
        let response = self
            .send(self.client.put(self.url(&format!("tasks/{id}"))).json(fields))
            .await?;
        decode_success(response).await
    }

    async fn delete_task(&self, id: TaskId) -> GatewayResult<()> {
        let response = self
            .send(self.client.delete(self.url(&format!("tasks/{id}"))))
            .await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(GatewayError::Http { status }),
        }
    }
}
