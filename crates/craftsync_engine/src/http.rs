//! HTTP implementation of the remote service.
//!
//! The actual HTTP client is abstracted behind a trait so hosts can plug in
//! whatever stack they already carry (reqwest, ureq, a platform bridge)
//! without this crate taking the dependency.

use craftsync_protocol::{CreateAck, ProjectRecord, RecordId, UpdateAck};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::identity::Identity;
use crate::remote::RemoteService;

/// HTTP methods used by the remote contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// PUT request.
    Put,
    /// DELETE request.
    Delete,
}

impl HttpMethod {
    /// The method name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this to provide the actual transport. An `Err` from `request`
/// means the remote never answered and is treated as a retryable
/// connectivity failure; service-level failures travel as non-2xx statuses
/// inside [`HttpResponse`].
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    ///
    /// `bearer` carries the identity token; implementations send it as an
    /// `Authorization: Bearer` header.
    fn request(
        &self,
        method: HttpMethod,
        url: &str,
        bearer: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, String>;
}

/// A [`RemoteService`] speaking JSON over HTTP.
///
/// Routes:
/// - `POST   {base}/projects` creates a record
/// - `PUT    {base}/projects/{id}` updates a record
/// - `DELETE {base}/projects/{id}` deletes a record
/// - `GET    {base}/projects` lists all records
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a request and maps the status line to the error taxonomy.
    ///
    /// `target` names the record a 404 should be attributed to.
    fn send_raw(
        &self,
        method: HttpMethod,
        path: &str,
        identity: &Identity,
        body: Option<Vec<u8>>,
        target: Option<RecordId>,
    ) -> SyncResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        trace!(method = method.as_str(), url = %url, "remote request");
        let response = self
            .client
            .request(method, &url, &identity.token, body)
            .map_err(SyncError::transport_retryable)?;
        match response.status {
            200..=299 => Ok(response.body),
            401 | 403 => Err(SyncError::Unauthorized),
            404 => match target {
                Some(id) => Err(SyncError::NotFound(id)),
                None => Err(SyncError::RemoteStatus {
                    status: 404,
                    message: String::from_utf8_lossy(&response.body).into_owned(),
                }),
            },
            status => Err(SyncError::RemoteStatus {
                status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            }),
        }
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SyncResult<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| SyncError::protocol(format!("invalid response body: {e}")))
    }

    fn encode(record: &ProjectRecord) -> SyncResult<Vec<u8>> {
        serde_json::to_vec(record)
            .map_err(|e| SyncError::protocol(format!("unencodable record: {e}")))
    }
}

impl<C: HttpClient> RemoteService for HttpRemote<C> {
    fn create(&self, identity: &Identity, record: &ProjectRecord) -> SyncResult<CreateAck> {
        let body = Self::encode(record)?;
        let bytes = self.send_raw(
            HttpMethod::Post,
            "/projects",
            identity,
            Some(body),
            Some(record.id),
        )?;
        Self::decode(&bytes)
    }

    fn update(
        &self,
        identity: &Identity,
        id: &RecordId,
        record: &ProjectRecord,
    ) -> SyncResult<UpdateAck> {
        let body = Self::encode(record)?;
        let path = format!("/projects/{id}");
        let bytes = self.send_raw(HttpMethod::Put, &path, identity, Some(body), Some(*id))?;
        Self::decode(&bytes)
    }

    fn delete(&self, identity: &Identity, id: &RecordId) -> SyncResult<()> {
        let path = format!("/projects/{id}");
        self.send_raw(HttpMethod::Delete, &path, identity, None, Some(*id))?;
        Ok(())
    }

    fn list(&self, identity: &Identity) -> SyncResult<Vec<ProjectRecord>> {
        let bytes = self.send_raw(HttpMethod::Get, "/projects", identity, None, None)?;
        Self::decode(&bytes)
    }
}
