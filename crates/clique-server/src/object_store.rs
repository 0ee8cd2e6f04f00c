//! HTTP client for the external object store.
//!
//! Uploaded images and generated previews live outside the database, in a
//! bucket served over plain HTTP. Objects are addressed as
//! `{endpoint}/{bucket}/{namespace}/{key}` where the namespace groups
//! everything belonging to one group. The store exposes no listing; the
//! database row is the source of truth for which objects exist.

use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::error::ApiError;

pub struct ObjectStore {
    base: Url,
    bucket: String,
    http: reqwest::Client,
}

impl ObjectStore {
    pub fn new(endpoint: &str, bucket: &str) -> Result<Self, ApiError> {
        let base = Url::parse(endpoint)
            .map_err(|e| ApiError::Internal(format!("invalid object store URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Internal(format!(
                "object store URL cannot carry a path: {endpoint}"
            )));
        }
        Ok(Self {
            base,
            bucket: bucket.to_string(),
            http: reqwest::Client::new(),
        })
    }

    /// Store `bytes` under `namespace/key` and return the public URL the
    /// object is served from.
    pub async fn upload(
        &self,
        namespace: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ApiError> {
        let url = self.object_url(namespace, key)?;
        let size = bytes.len();

        let response = self
            .http
            .put(url.clone())
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("object store unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "object store rejected upload: {}",
                response.status()
            )));
        }

        debug!(%url, size, "object uploaded");
        Ok(url.to_string())
    }

    /// Delete `namespace/key`. A missing object is treated as success so
    /// the call can be retried after a partial failure.
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<(), ApiError> {
        let url = self.object_url(namespace, key)?;

        let response = self
            .http
            .delete(url.clone())
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("object store unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::Upstream(format!(
                "object store rejected delete: {status}"
            )));
        }

        debug!(%url, "object deleted");
        Ok(())
    }

    /// Address of one object. Path segments are percent-encoded, so group
    /// names with spaces or slashes stay within their own namespace.
    fn object_url(&self, namespace: &str, key: &str) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Internal("object store URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(&self.bucket)
            .push(namespace)
            .push(key);
        Ok(url)
    }
}
