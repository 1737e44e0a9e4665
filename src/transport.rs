//! Network transport used by the request actions.
//!
//! The engine only builds [`HttpRequest`] values and reads [`HttpResponse`]
//! values back; how they travel is up to the [`Transport`] implementation.
//! [`HttpTransport`] sends them with `reqwest` on a Tokio runtime of its
//! own, so the engine's `LocalPool` only awaits the finished response.

use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Builder, Runtime};

use crate::error::{HyperionsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Method for an action prefix (`get`, `post`, ...)
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    None,
    /// Serialized JSON document
    Json(String),
    /// Text fields of a `multipart/form-data` body
    Multipart(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL, query included
    pub url: String,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Sends requests built by the network actions.
///
/// The engine is single threaded, implementations are not required to be `Send`.
#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Runtime owned by a transport, shut down without blocking when dropped
#[derive(Debug)]
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// `reqwest` backed transport.
///
/// Requests run on a single worker Tokio runtime built on first use and
/// shared by clones, the calling executor needs no runtime context.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: Arc<OnceLock<OwnedRuntime>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            runtime: Arc::default(),
        }
    }

    fn runtime(&self) -> Result<&Runtime> {
        if self.runtime.get().is_none() {
            let runtime = Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("hyperions-http")
                .enable_all()
                .build()
                .map_err(|e| HyperionsError::Transport(format!("cannot start runtime: {}", e)))?;
            let _ = self.runtime.set(OwnedRuntime(Some(runtime)));
        }
        self.runtime
            .get()
            .and_then(|owned| owned.0.as_ref())
            .ok_or_else(|| HyperionsError::Transport("runtime unavailable".to_string()))
    }
}

fn transport_error(error: reqwest::Error) -> HyperionsError {
    HyperionsError::Transport(error.to_string())
}

async fn exchange(client: reqwest::Client, request: HttpRequest) -> reqwest::Result<HttpResponse> {
    let method = match request.method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
    };

    let builder = client.request(method, &request.url);
    let builder = match request.body {
        RequestBody::None => builder,
        RequestBody::Json(json) => builder
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(json),
        RequestBody::Multipart(fields) => {
            let form = fields
                .into_iter()
                .fold(reqwest::multipart::Form::new(), |form, (key, value)| {
                    form.text(key, value)
                });
            builder.multipart(form)
        }
    };

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(HttpResponse { status, body })
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let task = self.runtime()?.spawn(exchange(self.client.clone(), request));
        task.await
            .map_err(|e| HyperionsError::Transport(format!("request task failed: {}", e)))?
            .map_err(transport_error)
    }
}
