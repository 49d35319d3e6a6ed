//! Polling state service.
//!
//! [`StateService`] owns the LXD client and the four resource collections.
//! Every refresh replaces a collection wholesale and fires that kind's change
//! event with the new snapshot. Discovery problems are published as
//! [`Notice`]s and never stop the service: without a client every refresh
//! publishes an empty collection.
//!
//! ```text
//!   run() ──► refresh() ──┬─► refresh_instances ─────┐
//!     ▲                   ├─► refresh_images ────────┤  join
//!     │                   ├─► refresh_networks ──────┤
//!     │                   └─► refresh_storage_pools ─┘
//!     └──── sleep(refresh_interval) ◄─────────────────┘
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use lxdview_config::{AppConfig, LxdConfig};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::discovery::{Discovery, SocketDiscovery};
use crate::dispose::{DisposableStack, Dispose, DisposeError};
use crate::event::{Event, EventEmitter};
use crate::lxd::{
    Image, Instance, ListOptions, LxdClient, LxdError, Network, ResourceKind, StoragePool,
};
use crate::notice::Notice;

/// Errors returned from the refresh entry points.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to refresh {kind}: {source}")]
    Refresh {
        kind: ResourceKind,
        #[source]
        source: LxdError,
    },

    #[error("{} of 4 resource kinds failed to refresh", .0.len())]
    Cycle(Vec<ServiceError>),
}

impl ServiceError {
    /// The underlying client error of a single failed refresh.
    pub fn lxd(&self) -> Option<&LxdError> {
        match self {
            ServiceError::Refresh { source, .. } => Some(source),
            ServiceError::Cycle(_) => None,
        }
    }
}

/// Snapshot of one resource kind.
///
/// `stale` is set when the last refresh failed; `items` then still holds the
/// last successfully fetched data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceCollection<T> {
    pub items: Vec<T>,
    pub stale: bool,
}

impl<T> ResourceCollection<T> {
    pub fn fresh(items: Vec<T>) -> Self {
        Self {
            items,
            stale: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for ResourceCollection<T> {
    fn default() -> Self {
        Self::fresh(Vec::new())
    }
}

/// Resolves once shutdown is signalled or the sender is gone. The borrowed
/// value is released before returning so callers stay `Send`.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Current collection plus change event for one resource kind.
struct ResourceSlot<T> {
    kind: ResourceKind,
    current: RwLock<ResourceCollection<T>>,
    /// Held across replace + fire so listeners see publishes in order.
    publish: Mutex<()>,
    emitter: EventEmitter<ResourceCollection<T>>,
}

impl<T> ResourceSlot<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            current: RwLock::new(ResourceCollection::default()),
            publish: Mutex::new(()),
            emitter: EventEmitter::new(),
        }
    }

    fn snapshot(&self) -> ResourceCollection<T> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, collection: ResourceCollection<T>) {
        self.publish_if(collection, || true);
    }

    /// Replace and fire unless `is_current` reports the result as outdated.
    /// `is_current` runs under the publish lock, so a result that loses a
    /// race against a newer client is never published after it.
    fn publish_if(&self, collection: ResourceCollection<T>, is_current: impl Fn() -> bool) -> bool {
        let _guard = lock(&self.publish);
        if !is_current() {
            return false;
        }
        match serde_json::to_string_pretty(&collection.items) {
            Ok(json) => info!(kind = %self.kind, count = collection.len(), "{} updated: {json}", self.kind),
            Err(e) => info!(kind = %self.kind, count = collection.len(), error = %e, "{} updated", self.kind),
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = collection.clone();
        self.emitter.fire(&collection);
        true
    }

    fn mark_stale_if(&self, is_current: impl Fn() -> bool) -> bool {
        let _guard = lock(&self.publish);
        if !is_current() {
            return false;
        }
        let snapshot = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.stale = true;
            current.clone()
        };
        warn!(kind = %self.kind, count = snapshot.len(), "Keeping last known {} as stale", self.kind);
        self.emitter.fire(&snapshot);
        true
    }
}

struct ClientState {
    client: Option<Arc<LxdClient>>,
    /// Bumped whenever the client is replaced.
    generation: u64,
}

/// Keeps the four LXD resource collections current.
///
/// Construct with [`StateService::new`], then either drive it with
/// [`start`](Self::start) / [`run`](Self::run) or call the refresh methods
/// directly. Dispose it to stop polling and detach every listener.
pub struct StateService {
    config: Mutex<LxdConfig>,
    discovery: SocketDiscovery,
    client: Mutex<ClientState>,

    instances: ResourceSlot<Instance>,
    images: ResourceSlot<Image>,
    networks: ResourceSlot<Network>,
    storage_pools: ResourceSlot<StoragePool>,

    notice_emitter: EventEmitter<Notice>,
    notices: Mutex<Vec<Notice>>,
    unsupported_warned: AtomicBool,

    disposed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    resources: DisposableStack,
}

impl StateService {
    /// Resolve the socket and build the service. Never fails: discovery
    /// problems end up in [`notices`](Self::notices).
    pub fn new(config: LxdConfig, discovery: SocketDiscovery) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let service = Arc::new(Self {
            config: Mutex::new(config.clone()),
            discovery,
            client: Mutex::new(ClientState {
                client: None,
                generation: 0,
            }),
            instances: ResourceSlot::new(ResourceKind::Instances),
            images: ResourceSlot::new(ResourceKind::Images),
            networks: ResourceSlot::new(ResourceKind::Networks),
            storage_pools: ResourceSlot::new(ResourceKind::StoragePools),
            notice_emitter: EventEmitter::new(),
            notices: Mutex::new(Vec::new()),
            unsupported_warned: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            shutdown_tx,
            resources: DisposableStack::new(),
        });
        service.register_resources();
        service.initialize_client(&config);
        service
    }

    /// Build the service against the real host.
    pub fn from_env(config: LxdConfig) -> Arc<Self> {
        Self::new(config, SocketDiscovery::from_env())
    }

    fn register_resources(&self) {
        let shutdown_tx = self.shutdown_tx.clone();
        let registered = [
            self.resources.defer("polling loop", move || {
                shutdown_tx.send_replace(true);
                Ok(())
            }),
            self.resources.register(self.instances.emitter.clone()),
            self.resources.register(self.images.emitter.clone()),
            self.resources.register(self.networks.emitter.clone()),
            self.resources.register(self.storage_pools.emitter.clone()),
            self.resources.register(self.notice_emitter.clone()),
        ];
        for result in registered {
            if let Err(e) = result {
                warn!(error = %e, "Failed to register service resource");
            }
        }
    }

    // ── Client lifecycle ───────────────────────────────────────────────

    fn initialize_client(&self, config: &LxdConfig) {
        let client = match self.discovery.resolve(config) {
            Discovery::Unsupported { reason } => {
                error!(reason = %reason, "Unsupported environment");
                if !config.suppress_unsupported_environment_warning
                    && !self.unsupported_warned.swap(true, Ordering::SeqCst)
                {
                    self.publish_notice(Notice::unsupported_environment(&reason));
                }
                None
            }
            Discovery::ConfiguredMissing(path) => {
                error!(path = %path.display(), "The configured LXD unix-socket path does not exist");
                self.publish_notice(Notice::configured_socket_missing(&path));
                None
            }
            Discovery::NotFound { tried } => {
                error!(tried = ?tried, "Could not find LXD unix-socket");
                self.publish_notice(Notice::socket_not_found());
                None
            }
            Discovery::Found { path, source } => match LxdClient::connect(&path) {
                Ok(client) => {
                    info!(path = %path.display(), source = %source, "Using LXD unix-socket");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Cannot use LXD unix-socket");
                    self.publish_notice(Notice::connect_failed(&path, &e.to_string()));
                    None
                }
            },
        };

        let mut state = lock(&self.client);
        state.client = client;
        state.generation += 1;
    }

    fn current_client(&self) -> (Option<Arc<LxdClient>>, u64) {
        let state = lock(&self.client);
        (state.client.clone(), state.generation)
    }

    fn generation(&self) -> u64 {
        lock(&self.client).generation
    }

    pub fn has_client(&self) -> bool {
        lock(&self.client).client.is_some()
    }

    /// Socket the current client talks to.
    pub fn socket_path(&self) -> Option<PathBuf> {
        lock(&self.client)
            .client
            .as_ref()
            .map(|c| c.socket_path().to_path_buf())
    }

    /// Apply a changed `[lxd]` section.
    ///
    /// The client is rebuilt only when the socket path changed; refreshes
    /// already in flight against the old client are then discarded. Returns
    /// whether the client was rebuilt.
    pub fn reconfigure(&self, config: &LxdConfig) -> bool {
        if self.is_disposed() {
            return false;
        }
        let previous = std::mem::replace(&mut *lock(&self.config), config.clone());
        if previous.socket_override() == config.socket_override() {
            debug!("LXD configuration changed, socket unchanged");
            return false;
        }
        info!(
            from = %previous.socket_path,
            to = %config.socket_path,
            "LXD socket path changed, re-initializing client"
        );
        self.initialize_client(config);
        true
    }

    /// Follow configuration updates until the channel closes or the service
    /// is disposed. A rebuilt client triggers an immediate refresh.
    pub fn watch_config(self: &Arc<Self>, mut updates: watch::Receiver<AppConfig>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            debug!("Config channel closed");
                            break;
                        }
                        let lxd = updates.borrow_and_update().lxd.clone();
                        if service.reconfigure(&lxd) {
                            if let Err(e) = service.refresh().await {
                                debug!(error = %e, "Refresh after reconfiguration finished with errors");
                            }
                        }
                    }
                    _ = stopped(&mut shutdown) => break,
                }
            }
        })
    }

    fn list_options(&self, kind: ResourceKind) -> ListOptions {
        if kind == ResourceKind::StoragePools {
            return ListOptions::default();
        }
        let config = lock(&self.config);
        let project = config.project.trim();
        if config.all_projects {
            ListOptions::all_projects()
        } else if !project.is_empty() {
            ListOptions::default().with_project(project)
        } else {
            ListOptions::default()
        }
    }

    // ── Refresh ────────────────────────────────────────────────────────

    pub async fn refresh_instances(&self) -> Result<(), ServiceError> {
        self.refresh_slot(&self.instances, |client, options| async move {
            client.list_instances(&options).await
        })
        .await
    }

    pub async fn refresh_images(&self) -> Result<(), ServiceError> {
        self.refresh_slot(&self.images, |client, options| async move {
            client.list_images(&options).await
        })
        .await
    }

    pub async fn refresh_networks(&self) -> Result<(), ServiceError> {
        self.refresh_slot(&self.networks, |client, options| async move {
            client.list_networks(&options).await
        })
        .await
    }

    pub async fn refresh_storage_pools(&self) -> Result<(), ServiceError> {
        self.refresh_slot(&self.storage_pools, |client, options| async move {
            client.list_storage_pools(&options).await
        })
        .await
    }

    pub async fn refresh_kind(&self, kind: ResourceKind) -> Result<(), ServiceError> {
        match kind {
            ResourceKind::Instances => self.refresh_instances().await,
            ResourceKind::Images => self.refresh_images().await,
            ResourceKind::Networks => self.refresh_networks().await,
            ResourceKind::StoragePools => self.refresh_storage_pools().await,
        }
    }

    /// Refresh all four kinds concurrently and wait for every one of them.
    pub async fn refresh(&self) -> Result<(), ServiceError> {
        if self.is_disposed() {
            return Ok(());
        }
        let (instances, images, networks, storage_pools) = tokio::join!(
            self.refresh_instances(),
            self.refresh_images(),
            self.refresh_networks(),
            self.refresh_storage_pools(),
        );
        let failures: Vec<ServiceError> = [instances, images, networks, storage_pools]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Cycle(failures))
        }
    }

    async fn refresh_slot<T, F, Fut>(&self, slot: &ResourceSlot<T>, fetch: F) -> Result<(), ServiceError>
    where
        T: Clone + Serialize + Send + Sync + 'static,
        F: FnOnce(Arc<LxdClient>, ListOptions) -> Fut,
        Fut: Future<Output = Result<Vec<T>, LxdError>>,
    {
        if self.is_disposed() {
            return Ok(());
        }

        let (client, generation) = self.current_client();
        let Some(client) = client else {
            slot.publish(ResourceCollection::default());
            return Ok(());
        };

        let result = fetch(client, self.list_options(slot.kind)).await;

        if self.is_disposed() {
            debug!(kind = %slot.kind, "Service disposed during refresh, dropping result");
            return Ok(());
        }
        let is_current = || !self.is_disposed() && self.generation() == generation;
        let outdated = || {
            debug!(kind = %slot.kind, generation, "Client replaced during refresh, dropping result");
            Ok(())
        };

        match result {
            Ok(items) => {
                if !slot.publish_if(ResourceCollection::fresh(items), is_current) {
                    return outdated();
                }
                Ok(())
            }
            Err(source) => {
                if !slot.mark_stale_if(is_current) {
                    return outdated();
                }
                error!(kind = %slot.kind, error = %source, "Failed to refresh {}", slot.kind);
                Err(ServiceError::Refresh {
                    kind: slot.kind,
                    source,
                })
            }
        }
    }

    // ── Polling ────────────────────────────────────────────────────────

    /// Poll until disposed: refresh everything, sleep for the configured
    /// interval, repeat. A cycle never starts before the previous one ended.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        info!("Polling LXD state");
        loop {
            if self.is_disposed() {
                break;
            }
            if let Err(e) = self.refresh().await {
                debug!(error = %e, "Refresh cycle finished with errors");
            }
            let interval = lock(&self.config).refresh_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }
        info!("Stopped polling LXD state");
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }

    // ── Snapshots and events ───────────────────────────────────────────

    pub fn instances(&self) -> ResourceCollection<Instance> {
        self.instances.snapshot()
    }

    pub fn images(&self) -> ResourceCollection<Image> {
        self.images.snapshot()
    }

    pub fn networks(&self) -> ResourceCollection<Network> {
        self.networks.snapshot()
    }

    pub fn storage_pools(&self) -> ResourceCollection<StoragePool> {
        self.storage_pools.snapshot()
    }

    pub fn on_did_change_instances(&self) -> Event<ResourceCollection<Instance>> {
        self.instances.emitter.event()
    }

    pub fn on_did_change_images(&self) -> Event<ResourceCollection<Image>> {
        self.images.emitter.event()
    }

    pub fn on_did_change_networks(&self) -> Event<ResourceCollection<Network>> {
        self.networks.emitter.event()
    }

    pub fn on_did_change_storage_pools(&self) -> Event<ResourceCollection<StoragePool>> {
        self.storage_pools.emitter.event()
    }

    /// User-facing notices, fired as they are published.
    pub fn on_notice(&self) -> Event<Notice> {
        self.notice_emitter.event()
    }

    /// Every notice published so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    fn publish_notice(&self, notice: Notice) {
        lock(&self.notices).push(notice.clone());
        self.notice_emitter.fire(&notice);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Dispose for StateService {
    /// Stop polling and detach every listener. Collections keep their last
    /// value but are never updated again.
    fn dispose(&self) -> Result<(), DisposeError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("Disposing state service");
        self.resources.dispose()
    }
}
