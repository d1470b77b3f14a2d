//! A [`RuntimeClient`] for container runtime daemons that expose a REST API.
//!
//! Endpoints used:
//! - `POST /image/create?imageName=<ref>`
//! - `GET /list?item=<kind>&pod=<name>&auxiliary=<all>` returning `{ "podData": [...] }`
//! - `GET /pod/info?podName=<id>`
//! - `DELETE /pod?podId=<id>`
//! - `POST /pod/create`
//! - `POST /exec`, upgraded to a raw stream

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{CONNECTION, UPGRADE},
    Client, Response, StatusCode, Url,
};
use serde::{Deserialize, Serialize};

use crate::{TermboxError, TermboxResult};

use super::{ExecRequest, ExecStream, ListFilter, PodInfo, PodSpec, RuntimeClient};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Runtime client speaking to a runtime daemon over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRuntimeClient {
    base_url: Url,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(rename = "podData", default)]
    pod_data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePodResponse {
    #[serde(rename = "ID", alias = "id")]
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecBody<'a> {
    pod_id: &'a str,
    command: &'a [String],
    tty: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl HttpRuntimeClient {
    /// Creates a client for the runtime daemon at `base_url`.
    pub fn new(base_url: &str) -> TermboxResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TermboxError::Runtime(format!("invalid runtime url {}: {}", base_url, e))
        })?;

        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self { base_url, client })
    }

    fn url(&self, path: &str) -> TermboxResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| TermboxError::Runtime(format!("invalid runtime path {}: {}", path, e)))
    }

    /// Maps non-success responses to errors. `pod` turns a 404 into [`TermboxError::PodNotFound`].
    async fn check(
        operation: &str,
        response: Response,
        pod: Option<&str>,
    ) -> TermboxResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let (StatusCode::NOT_FOUND, Some(id)) = (status, pod) {
            return Err(TermboxError::PodNotFound(id.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(TermboxError::Runtime(format!(
            "{} returned {}: {}",
            operation,
            status,
            body.trim()
        )))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl RuntimeClient for HttpRuntimeClient {
    async fn pull_image(&self, reference: &str) -> TermboxResult<()> {
        let response = self
            .client
            .post(self.url("image/create")?)
            .query(&[("imageName", reference)])
            .send()
            .await?;

        Self::check("pull image", response, None).await?;
        Ok(())
    }

    async fn list_pods(&self, filter: &ListFilter) -> TermboxResult<Vec<String>> {
        let all = filter.all.to_string();
        let response = self
            .client
            .get(self.url("list")?)
            .query(&[
                ("item", filter.kind.as_str()),
                ("pod", filter.name.as_deref().unwrap_or_default()),
                ("auxiliary", all.as_str()),
            ])
            .send()
            .await?;

        let listing: ListResponse = Self::check("list", response, None).await?.json().await?;
        Ok(listing.pod_data)
    }

    async fn get_pod_info(&self, id: &str) -> TermboxResult<PodInfo> {
        let response = self
            .client
            .get(self.url("pod/info")?)
            .query(&[("podName", id)])
            .send()
            .await?;

        let mut info: PodInfo = Self::check("pod info", response, Some(id))
            .await?
            .json()
            .await?;
        if info.id.is_empty() {
            info.id = id.to_string();
        }

        Ok(info)
    }

    async fn delete_pod(&self, id: &str) -> TermboxResult<()> {
        let response = self
            .client
            .delete(self.url("pod")?)
            .query(&[("podId", id)])
            .send()
            .await?;

        Self::check("delete pod", response, Some(id)).await?;
        Ok(())
    }

    async fn create_pod(&self, spec: &PodSpec) -> TermboxResult<String> {
        let response = self
            .client
            .post(self.url("pod/create")?)
            .json(spec)
            .send()
            .await?;

        let created: CreatePodResponse = Self::check("create pod", response, None)
            .await?
            .json()
            .await?;

        Ok(created.id)
    }

    async fn exec(&self, id: &str, request: &ExecRequest) -> TermboxResult<Box<dyn ExecStream>> {
        let response = self
            .client
            .post(self.url("exec")?)
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "tcp")
            .json(&ExecBody {
                pod_id: id,
                command: &request.command,
                tty: request.tty,
            })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::SWITCHING_PROTOCOLS {
            Self::check("exec", response, Some(id)).await?;
            return Err(TermboxError::Runtime(format!(
                "exec into {} was not upgraded: {}",
                id, status
            )));
        }

        let stream = response.upgrade().await?;
        Ok(Box::new(stream))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
