//! A fake LXD daemon for tests.
//!
//! [`FakeLxd`] serves the read-only subset of the LXD REST API that lxdview
//! uses (`/1.0/{instances,images,networks,storage-pools}` and their
//! resources) on a Unix socket inside a temporary directory. Tests seed the
//! resources, inject failures and delays, and inspect the request log.
//!
//! ```ignore
//! let fake = FakeLxd::start().await;
//! fake.add_instance("web", "Running");
//! let client = LxdClient::connect(fake.socket_path())?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Socket file name inside the fake's temp directory.
pub const FAKE_SOCKET_NAME: &str = "unix.socket";

const INSTANCES: &str = "/1.0/instances";
const IMAGES: &str = "/1.0/images";
const NETWORKS: &str = "/1.0/networks";
const STORAGE_POOLS: &str = "/1.0/storage-pools";

/// One request as seen by the fake.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Path plus query string, e.g. `/1.0/instances?project=dev`.
    pub path: String,
    pub at: Instant,
}

#[derive(Debug, Clone)]
enum Failure {
    /// An LXD error envelope with the given code.
    Daemon { code: u16, message: String },
    /// A 200 response whose body is not JSON.
    Garbage,
}

#[derive(Debug, Clone)]
struct StoredResource {
    /// Resource URI as listed by the collection endpoint.
    uri: String,
    /// Project the resource lives in. Only used for instances.
    project: Option<String>,
    metadata: Value,
}

#[derive(Default)]
struct Resources {
    by_collection: HashMap<&'static str, Vec<StoredResource>>,
    failures: HashMap<String, Failure>,
    delay: Duration,
    requests: Vec<RecordedRequest>,
}

#[derive(Default)]
struct FakeState {
    resources: Mutex<Resources>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeState {
    fn lock(&self) -> MutexGuard<'_, Resources> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A running fake daemon. Dropping it stops the server.
pub struct FakeLxd {
    state: Arc<FakeState>,
    socket_path: PathBuf,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
    dir: TempDir,
}

impl FakeLxd {
    /// Bind a fresh socket in a temp directory and start serving.
    pub async fn start() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = dir.path().join(FAKE_SOCKET_NAME);
        let listener = UnixListener::bind(&socket_path).expect("failed to bind fake LXD socket");
        let state = Arc::new(FakeState::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = router(Arc::clone(&state));

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            state,
            socket_path,
            shutdown_tx: Some(shutdown_tx),
            server: Some(server),
            dir,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Directory holding the socket, usable as `$LXD_DIR`.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    // ── Seeding ────────────────────────────────────────────────────────

    pub fn add_instance(&self, name: &str, status: &str) {
        self.insert(
            INSTANCES,
            StoredResource {
                uri: format!("{INSTANCES}/{name}"),
                project: None,
                metadata: json!({
                    "name": name,
                    "status": status,
                    "type": "container",
                    "project": "default",
                }),
            },
        );
    }

    /// Add an instance outside the default project. Its URI carries the
    /// project as a query parameter, like the real daemon does.
    pub fn add_instance_in_project(&self, name: &str, status: &str, project: &str) {
        self.insert(
            INSTANCES,
            StoredResource {
                uri: format!("{INSTANCES}/{name}?project={project}"),
                project: Some(project.to_string()),
                metadata: json!({
                    "name": name,
                    "status": status,
                    "type": "container",
                    "project": project,
                }),
            },
        );
    }

    pub fn remove_instance(&self, name: &str) {
        let mut resources = self.state.lock();
        if let Some(items) = resources.by_collection.get_mut(INSTANCES) {
            items.retain(|r| r.metadata["name"] != name);
        }
    }

    pub fn add_image(&self, fingerprint: &str) {
        self.insert(
            IMAGES,
            StoredResource {
                uri: format!("{IMAGES}/{fingerprint}"),
                project: None,
                metadata: json!({ "fingerprint": fingerprint, "public": false }),
            },
        );
    }

    pub fn add_network(&self, name: &str) {
        self.insert(
            NETWORKS,
            StoredResource {
                uri: format!("{NETWORKS}/{name}"),
                project: None,
                metadata: json!({ "name": name, "managed": true, "type": "bridge" }),
            },
        );
    }

    pub fn add_storage_pool(&self, name: &str) {
        self.insert(
            STORAGE_POOLS,
            StoredResource {
                uri: format!("{STORAGE_POOLS}/{name}"),
                project: None,
                metadata: json!({ "name": name, "driver": "dir" }),
            },
        );
    }

    /// List a raw URI under `collection` without a matching resource, so
    /// fetching it yields a 404 error envelope.
    pub fn add_dangling_uri(&self, collection: &'static str, uri: &str) {
        self.insert(
            collection,
            StoredResource {
                uri: uri.to_string(),
                project: None,
                metadata: Value::Null,
            },
        );
    }

    fn insert(&self, collection: &'static str, resource: StoredResource) {
        self.state
            .lock()
            .by_collection
            .entry(collection)
            .or_default()
            .push(resource);
    }

    // ── Fault injection ────────────────────────────────────────────────

    /// Answer requests for `path` (query ignored) with an LXD error envelope.
    pub fn fail_path(&self, path: &str, code: u16, message: &str) {
        self.state.lock().failures.insert(
            path.to_string(),
            Failure::Daemon {
                code,
                message: message.to_string(),
            },
        );
    }

    /// Answer requests for `path` with a 200 response that is not JSON.
    pub fn garble_path(&self, path: &str) {
        self.state
            .lock()
            .failures
            .insert(path.to_string(), Failure::Garbage);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    // ── Inspection ─────────────────────────────────────────────────────

    /// Paths (with query) of every request received, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }

    pub fn request_log(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Highest number of requests that were being handled at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Stop serving and remove the socket file.
    pub async fn shutdown(mut self) {
        self.stop().await;
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            let abort = server.abort_handle();
            if tokio::time::timeout(Duration::from_secs(5), server)
                .await
                .is_err()
            {
                abort.abort();
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl Drop for FakeLxd {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Every path goes through one fallback handler that dispatches on the URI,
/// since resource names are data, not routes.
fn router(state: Arc<FakeState>) -> axum::Router {
    axum::Router::new().fallback(handle).with_state(state)
}

struct InFlight<'a>(&'a FakeState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a FakeState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn handle(State(state): State<Arc<FakeState>>, uri: Uri) -> Response {
    let _in_flight = InFlight::enter(&state);
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let delay = {
        let mut resources = state.lock();
        resources.requests.push(RecordedRequest {
            path: path_and_query.clone(),
            at: Instant::now(),
        });
        resources.delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let resources = state.lock();
    let path = uri.path();
    let query: HashMap<String, String> = url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .into_owned()
        .collect();

    if let Some(failure) = resources.failures.get(path) {
        return match failure {
            Failure::Daemon { code, message } => error_response(*code, message),
            Failure::Garbage => (StatusCode::OK, "this is not json").into_response(),
        };
    }

    if let Some((collection, items)) = resources
        .by_collection
        .iter()
        .find(|(collection, _)| **collection == path)
    {
        let uris: Vec<&str> = items
            .iter()
            .filter(|r| *collection != INSTANCES || in_project(r, &query))
            .map(|r| r.uri.as_str())
            .collect();
        return sync_response(json!(uris));
    }
    if [INSTANCES, IMAGES, NETWORKS, STORAGE_POOLS].contains(&path) {
        return sync_response(json!([]));
    }

    let found = resources
        .by_collection
        .values()
        .flatten()
        .find(|r| r.uri.split('?').next() == Some(path) && !r.metadata.is_null());
    match found {
        Some(resource) => sync_response(resource.metadata.clone()),
        None => error_response(404, "Not Found"),
    }
}

fn in_project(resource: &StoredResource, query: &HashMap<String, String>) -> bool {
    if query.get("all-projects").map(String::as_str) == Some("true") {
        return true;
    }
    let wanted = query.get("project").map(String::as_str).unwrap_or("default");
    resource.project.as_deref().unwrap_or("default") == wanted
}

fn sync_response(metadata: Value) -> Response {
    json_response(
        StatusCode::OK,
        json!({
            "type": "sync",
            "status": "Success",
            "status_code": 200,
            "operation": "",
            "error_code": 0,
            "error": "",
            "metadata": metadata,
        }),
    )
}

fn error_response(code: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(
        status,
        json!({
            "type": "error",
            "error": message,
            "error_code": code,
            "metadata": null,
        }),
    )
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn get(state: &Arc<FakeState>, uri: &str) -> (StatusCode, Value) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let resp = router(Arc::clone(state)).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_empty_collection_lists_nothing() {
        let state = Arc::new(FakeState::default());
        let (status, body) = get(&state, "/1.0/networks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "sync");
        assert_eq!(body["metadata"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_resource_is_error_envelope() {
        let state = Arc::new(FakeState::default());
        let (status, body) = get(&state, "/1.0/instances/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "error");
        assert_eq!(body["error_code"], 404);
        assert_eq!(state.lock().requests.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_filters_instances_by_project() {
        let fake = FakeLxd::start().await;
        fake.add_instance("web", "Running");
        fake.add_instance_in_project("ci", "Stopped", "dev");

        let (_, default) = get(&fake.state, "/1.0/instances").await;
        assert_eq!(default["metadata"], json!(["/1.0/instances/web"]));

        let (_, dev) = get(&fake.state, "/1.0/instances?project=dev").await;
        assert_eq!(dev["metadata"], json!(["/1.0/instances/ci?project=dev"]));

        let (_, all) = get(&fake.state, "/1.0/instances?all-projects=true").await;
        assert_eq!(all["metadata"].as_array().map(Vec::len), Some(2));

        let (_, ci) = get(&fake.state, "/1.0/instances/ci?project=dev").await;
        assert_eq!(ci["metadata"]["status"], "Stopped");
        fake.shutdown().await;
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let fake = FakeLxd::start().await;
        fake.fail_path("/1.0/images", 403, "not authorized");
        fake.garble_path("/1.0/networks");

        let (status, body) = get(&fake.state, "/1.0/images?project=x").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "not authorized");

        let (status, body) = get(&fake.state, "/1.0/networks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);

        fake.clear_failures();
        let (status, _) = get(&fake.state, "/1.0/images").await;
        assert_eq!(status, StatusCode::OK);
        fake.shutdown().await;
    }

    #[test]
    fn test_in_project_filter() {
        let resource = StoredResource {
            uri: "/1.0/instances/web?project=dev".to_string(),
            project: Some("dev".to_string()),
            metadata: Value::Null,
        };
        let mut query = HashMap::new();
        assert!(!in_project(&resource, &query));

        query.insert("project".to_string(), "dev".to_string());
        assert!(in_project(&resource, &query));

        query.clear();
        query.insert("all-projects".to_string(), "true".to_string());
        assert!(in_project(&resource, &query));
    }

    #[tokio::test]
    async fn test_shutdown_removes_socket() {
        let fake = FakeLxd::start().await;
        let path = fake.socket_path().to_path_buf();
        assert!(path.exists());
        fake.shutdown().await;
        assert!(!path.exists());
    }

    #[test]
    fn test_error_response_status() {
        assert_eq!(error_response(404, "Not Found").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            error_response(999, "odd").status(),
            StatusCode::from_u16(999).unwrap()
        );
    }
}
