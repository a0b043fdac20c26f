//! reqwest-backed [`RemoteStore`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};

use bucketfs_kernel::vfs::path;
use bucketfs_kernel::{
    FsConfig, RemoteConfig, RemoteError, RemoteFileInfo, RemoteResult, RemoteStore,
};

use crate::constants::{BUCKET_ID_PARAM, BUCKET_TOKEN_PARAM, FILES_SEGMENT, USER_AGENT};

/// Remote store talking to the bucket HTTP API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
}

impl HttpStore {
    /// Create a store whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &FsConfig) -> RemoteResult<Self> {
        Self::new(config.request_timeout())
    }

    fn request(
        &self,
        method: Method,
        remote: &RemoteConfig,
        file_path: Option<&str>,
    ) -> RemoteResult<RequestBuilder> {
        let url = files_url(remote, file_path)?;
        Ok(self.client.request(method, url))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> RemoteResult<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::debug!(target_path = %what, error = %e, "request failed");
            transport_error(e)
        })?;

        let status = response.status();
        tracing::trace!(target_path = %what, status = status.as_u16(), "response");
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(status_error(status, what, message.trim().to_string()))
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn list(&self, remote: &RemoteConfig) -> RemoteResult<Vec<RemoteFileInfo>> {
        let request = self.request(Method::GET, remote, None)?;
        let body = self
            .send(request, "/")
            .await?
            .bytes()
            .await
            .map_err(transport_error)?;
        let files = decode_listing(&body)?;
        tracing::debug!(store_id = %remote.store_id, files = files.len(), "listed bucket");
        Ok(files)
    }

    async fn get(&self, remote: &RemoteConfig, file_path: &str) -> RemoteResult<Bytes> {
        let request = self.request(Method::GET, remote, Some(file_path))?;
        self.send(request, file_path)
            .await?
            .bytes()
            .await
            .map_err(transport_error)
    }

    async fn put(
        &self,
        remote: &RemoteConfig,
        file_path: &str,
        content: Bytes,
        content_type: &str,
    ) -> RemoteResult<()> {
        let request = self
            .request(Method::PUT, remote, Some(file_path))?
            .header(CONTENT_TYPE, content_type)
            .body(content);
        self.send(request, file_path).await?;
        tracing::debug!(path = %file_path, "uploaded");
        Ok(())
    }

    async fn delete(&self, remote: &RemoteConfig, file_path: &str) -> RemoteResult<()> {
        let request = self.request(Method::DELETE, remote, Some(file_path))?;
        self.send(request, file_path).await?;
        tracing::debug!(path = %file_path, "deleted");
        Ok(())
    }
}

/// Build `{endpoint}/files[/{path}]?<credentials>`.
///
/// The endpoint's own path is replaced, not extended.
fn files_url(remote: &RemoteConfig, file_path: Option<&str>) -> RemoteResult<Url> {
    let mut url = Url::parse(&remote.endpoint)
        .map_err(|e| RemoteError::transport(format!("invalid endpoint {}: {e}", remote.endpoint)))?;
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            RemoteError::transport(format!("endpoint is not a base URL: {}", remote.endpoint))
        })?;
        segments.clear().push(FILES_SEGMENT);
        if let Some(file_path) = file_path {
            let normalized = path::normalize(file_path);
            segments.extend(path::segments(&normalized));
        }
    }
    url.query_pairs_mut()
        .clear()
        .append_pair(BUCKET_ID_PARAM, &remote.store_id)
        .append_pair(BUCKET_TOKEN_PARAM, &remote.auth_token);
    Ok(url)
}

fn status_error(status: StatusCode, what: &str, message: String) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::not_found(what),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        _ => RemoteError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::transport(format!("request timed out: {e}"))
    } else {
        RemoteError::transport(e.to_string())
    }
}

/// The server encodes an empty bucket as `null`.
fn decode_listing(body: &[u8]) -> RemoteResult<Vec<RemoteFileInfo>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice::<Option<Vec<RemoteFileInfo>>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| RemoteError::decode(format!("invalid file listing: {e}")))
}
