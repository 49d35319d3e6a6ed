//! LXD client talking to the daemon over its Unix domain socket.
//!
//! Uses `hyper` for HTTP/1.1 over the socket, one connection per request.
//! Nothing is retried and no timeout is applied; errors are logged and
//! handed back to the caller.

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::{Level, debug, error, trace};

use super::error::{DaemonError, LxdError};
use super::identifier::InstanceIdentifier;
use super::types::*;
use crate::build_info;

/// Base every request URI is resolved against, for logs and errors.
pub const BASE_URL: &str = "http://lxd";

/// Client for the LXD REST API on a Unix socket.
#[derive(Debug, Clone)]
pub struct LxdClient {
    socket_path: PathBuf,
}

impl LxdClient {
    /// Create a client for the socket at `socket_path`.
    ///
    /// Fails if the path does not exist or is not a Unix socket. No
    /// connection is opened until the first request.
    pub fn connect(socket_path: impl Into<PathBuf>) -> Result<Self, LxdError> {
        let socket_path = socket_path.into();
        let metadata = std::fs::metadata(&socket_path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LxdError::SocketNotFound(socket_path.clone())
            } else {
                LxdError::Connect {
                    path: socket_path.clone(),
                    source,
                }
            }
        })?;

        if !metadata.file_type().is_socket() {
            return Err(LxdError::NotASocket(socket_path));
        }

        Ok(Self { socket_path })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the daemon socket still exists.
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    // ── Typed API methods ──────────────────────────────────────────────

    /// List instances: `GET /1.0/instances`, then one `GET` per instance.
    pub async fn list_instances(&self, options: &ListOptions) -> Result<Vec<Instance>, LxdError> {
        self.list_resources(ResourceKind::Instances, options).await
    }

    /// List images: `GET /1.0/images`, then one `GET` per image.
    pub async fn list_images(&self, options: &ListOptions) -> Result<Vec<Image>, LxdError> {
        self.list_resources(ResourceKind::Images, options).await
    }

    /// List networks: `GET /1.0/networks`, then one `GET` per network.
    pub async fn list_networks(&self, options: &ListOptions) -> Result<Vec<Network>, LxdError> {
        self.list_resources(ResourceKind::Networks, options).await
    }

    /// List storage pools: `GET /1.0/storage-pools`, then one `GET` per pool.
    pub async fn list_storage_pools(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<StoragePool>, LxdError> {
        self.list_resources(ResourceKind::StoragePools, options).await
    }

    /// Instance identifiers straight from the URI list, without fetching
    /// each instance.
    pub async fn list_instance_identifiers(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<InstanceIdentifier>, LxdError> {
        let uris = self.list_uris(ResourceKind::Instances, options).await?;
        uris.iter()
            .map(|uri| InstanceIdentifier::from_resource_uri(uri))
            .collect()
    }

    // ── Plumbing ───────────────────────────────────────────────────────

    /// Two-phase listing. All per-resource requests are issued at once and
    /// the first failure fails the whole listing.
    async fn list_resources<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        options: &ListOptions,
    ) -> Result<Vec<T>, LxdError> {
        let uris = self.list_uris(kind, options).await?;
        try_join_all(uris.iter().map(|uri| self.get_metadata::<T>(uri))).await
    }

    async fn list_uris(
        &self,
        kind: ResourceKind,
        options: &ListOptions,
    ) -> Result<Vec<String>, LxdError> {
        let path = options.apply_to(&kind.collection_path());
        self.get_metadata(&path).await
    }

    async fn get_metadata<T: DeserializeOwned>(&self, path: &str) -> Result<T, LxdError> {
        let response = self.request(Method::GET, path).await?;
        response.decode_metadata(&resolve_uri(path))
    }

    /// Send one request, log it, and unwrap the envelope.
    async fn request(&self, method: Method, path: &str) -> Result<LxdResponse, LxdError> {
        let request_uri = resolve_uri(path);

        let (status, body) = match self.send(&method, path, &request_uri).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(method = %method, uri = %request_uri, error = %e, "LXD request failed");
                return Err(e);
            }
        };

        let status_line = format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""));

        let response: LxdResponse = match serde_json::from_slice(&body) {
            Ok(response) => response,
            Err(source) => {
                let err = if status.is_success() {
                    LxdError::Decode {
                        uri: request_uri.clone(),
                        source,
                    }
                } else {
                    LxdError::Transport {
                        uri: request_uri.clone(),
                        message: format!("unexpected status: {status}"),
                    }
                };
                error!(method = %method, uri = %request_uri, status = %status_line, error = %err, "LXD request failed");
                return Err(err);
            }
        };

        // Only pay for pretty-printing when someone listens at TRACE.
        if tracing::enabled!(Level::TRACE) {
            let pretty = serde_json::to_string_pretty(&response).unwrap_or_default();
            trace!(method = %method, uri = %request_uri, status = %status_line, body = %pretty, "LXD response body");
        }

        if response.is_error() {
            let err = DaemonError {
                message: response.error.clone().unwrap_or_default(),
                code: response.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                request_uri: request_uri.clone(),
                metadata: response.metadata.clone(),
            };
            error!(
                method = %method,
                uri = %request_uri,
                status = %status_line,
                code = err.code,
                error = %err.message,
                metadata = %err.metadata,
                "LXD daemon returned an error response"
            );
            return Err(LxdError::Daemon(Box::new(err)));
        }

        debug!(method = %method, uri = %request_uri, status = %status_line, "LXD request");
        Ok(response)
    }

    /// Raw HTTP exchange over a fresh socket connection.
    async fn send(
        &self,
        method: &Method,
        path: &str,
        request_uri: &str,
    ) -> Result<(StatusCode, Bytes), LxdError> {
        if !self.daemon_available() {
            return Err(LxdError::SocketNotFound(self.socket_path.clone()));
        }

        let transport = |message: String| LxdError::Transport {
            uri: request_uri.to_string(),
            message,
        };

        let stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|source| LxdError::Connect {
                    path: self.socket_path.clone(),
                    source,
                })?;

        let io = TokioIo::new(stream);

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, http_body_util::Empty<Bytes>>(io)
                .await
                .map_err(|e| transport(format!("HTTP handshake failed: {e}")))?;

        // Drive the connection in the background
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(error = %e, "LXD connection error");
            }
        });

        let req = hyper::Request::builder()
            .method(method.clone())
            .uri(path)
            .header("host", "lxd")
            .header("user-agent", build_info::user_agent())
            .header("accept", "application/json")
            .body(http_body_util::Empty::<Bytes>::new())
            .map_err(|e| transport(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| transport(e.to_string()))?;

        let status = resp.status();

        let body = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| transport(format!("failed to read response body: {e}")))?
            .to_bytes();

        Ok((status, body))
    }
}

fn resolve_uri(path: &str) -> String {
    format!("{BASE_URL}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lxdview_test_utils::fake_lxd::FakeLxd;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connect_missing_socket() {
        let result = LxdClient::connect("/tmp/nonexistent-lxdview-test.socket");
        assert!(matches!(result, Err(LxdError::SocketNotFound(_))));
    }

    #[test]
    fn test_connect_rejects_regular_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = LxdClient::connect(file.path());
        assert!(matches!(result, Err(LxdError::NotASocket(_))));
    }

    #[test]
    fn test_resolve_uri() {
        assert_eq!(
            resolve_uri("/1.0/instances?project=x"),
            "http://lxd/1.0/instances?project=x"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_list_instances_fans_out() {
        let fake = FakeLxd::start().await;
        fake.add_instance("web", "Running");
        fake.add_instance("db", "Stopped");

        let client = LxdClient::connect(fake.socket_path()).unwrap();
        let instances = client.list_instances(&ListOptions::default()).await.unwrap();

        assert_eq!(
            instances,
            vec![
                Instance {
                    name: "web".to_string(),
                    status: "Running".to_string()
                },
                Instance {
                    name: "db".to_string(),
                    status: "Stopped".to_string()
                },
            ]
        );
        // The list request comes first; the fan-out order is not fixed.
        let mut requests = fake.requests();
        assert_eq!(requests.remove(0), "/1.0/instances");
        requests.sort();
        assert_eq!(requests, vec!["/1.0/instances/db", "/1.0/instances/web"]);
    }

    #[tokio::test]
    async fn test_socket_removed_after_connect() {
        let fake = FakeLxd::start().await;
        let client = LxdClient::connect(fake.socket_path()).unwrap();
        fake.shutdown().await;

        let result = client.list_networks(&ListOptions::default()).await;
        assert!(result.unwrap_err().is_connection());
    }
}
