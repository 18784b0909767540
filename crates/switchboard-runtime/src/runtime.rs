//! Runtime orchestration.
//!
//! [`ToggleRuntime`] wires providers from a [`SwitchboardConfig`]:
//!
//! ```text
//!                       ┌────────────────────────┐
//!  local  ─────────────▶│ InMemoryProvider       │ defaults table
//!    │                  └────────────────────────┘
//!    │  override        ┌────────────────────────┐
//!    ├─────────────────▶│ PersistentProvider     │ JSON file or memory
//!    │                  └────────────────────────┘
//!  remote ─────────────▶│ DocumentProvider       │ file or HTTP source
//!                       └────────────────────────┘
//! ```
//!
//! Both the local and the remote provider share one override store, so an
//! override set through the debug surface applies regardless of where the
//! base value comes from.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use switchboard_runtime::ToggleRuntime;
//!
//! let runtime = ToggleRuntime::builder()
//!     .config_file("switchboard.toml")
//!     .build()?;
//! runtime.start().await;
//!
//! let beta = runtime.toggle("checkout.v2", false);
//! println!("checkout v2: {}", beta.value_or_default());
//!
//! runtime.shutdown().await;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use switchboard_core::{
    DebugRegistry, DebugToggle, DocumentProvider, Group, InMemoryProvider, MemoryStorage,
    OverridableProvider, PersistentProvider, StorageBackend, Toggle, ToggleGroup,
    ToggleOverriding, ToggleProvider, ToggleValue, Value,
};

use crate::config::{ConfigLoader, RemoteConfig, SwitchboardConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::remote::source_from_config;
use crate::storage::JsonFileStorage;

/// The override provider type used by the runtime.
pub type OverrideStore = PersistentProvider<Arc<dyn StorageBackend>>;

struct Remote {
    config: RemoteConfig,
    documents: Arc<DocumentProvider>,
    provider: Arc<OverridableProvider>,
}

/// Owns the providers of an application and their background work.
pub struct ToggleRuntime {
    config: SwitchboardConfig,
    overrides: Arc<OverrideStore>,
    local: Arc<OverridableProvider>,
    remote: Option<Remote>,
    registry: DebugRegistry,
    shutdown: watch::Sender<bool>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl ToggleRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration.
    ///
    /// Initializes logging, loads stored overrides and builds the local and
    /// remote providers. Nothing is fetched until [`start`](Self::start).
    pub fn from_config(config: &SwitchboardConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let storage: Arc<dyn StorageBackend> = match &config.storage.path {
            Some(path) => {
                info!(
                    path = %path.display(),
                    key = %config.storage.key,
                    "Using file override storage"
                );
                Arc::new(JsonFileStorage::new(path, &config.storage.key))
            }
            None => {
                debug!("Using in-memory override storage");
                Arc::new(MemoryStorage::new())
            }
        };
        let overrides = Arc::new(PersistentProvider::new("overrides", storage)?);
        let overriding: Arc<dyn ToggleOverriding> = overrides.clone();

        let defaults = InMemoryProvider::new("defaults", Value::from(config.defaults.clone()));
        let local = Arc::new(OverridableProvider::new(
            "local",
            Arc::new(defaults),
            Arc::clone(&overriding),
        ));

        let remote = match &config.remote {
            Some(remote_config) => {
                let source = source_from_config(remote_config)?;
                let mut documents = DocumentProvider::new(&remote_config.name, source);
                if let Some(root) = &remote_config.root {
                    documents = documents.with_root(root.as_str());
                }
                let documents = Arc::new(documents);
                let provider = Arc::new(OverridableProvider::new(
                    remote_config.name.clone(),
                    documents.clone(),
                    Arc::clone(&overriding),
                ));
                info!(
                    name = %remote_config.name,
                    source = %remote_config.source,
                    "Configured remote provider"
                );
                Some(Remote {
                    config: remote_config.clone(),
                    documents,
                    provider,
                })
            }
            None => None,
        };

        info!(
            log_level = %config.logging.level,
            remote = remote.is_some(),
            "Runtime initialized from configuration"
        );

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config: config.clone(),
            overrides,
            local,
            remote,
            registry: DebugRegistry::new(),
            shutdown,
            refresh_task: Mutex::new(None),
        })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &SwitchboardConfig {
        &self.config
    }

    /// The provider over the configured defaults.
    pub fn local(&self) -> Arc<dyn ToggleProvider> {
        self.local.clone()
    }

    /// The provider over the remote document, if one is configured.
    pub fn remote(&self) -> Option<Arc<dyn ToggleProvider>> {
        self.remote
            .as_ref()
            .map(|remote| remote.provider.clone() as Arc<dyn ToggleProvider>)
    }

    /// Returns `true` once the remote provider has received a document.
    pub fn remote_loaded(&self) -> bool {
        self.remote
            .as_ref()
            .is_some_and(|remote| remote.documents.is_loaded())
    }

    /// The shared override store.
    pub fn overrides(&self) -> &Arc<OverrideStore> {
        &self.overrides
    }

    /// The registry of toggles exposed to debug tooling.
    pub fn registry(&self) -> &DebugRegistry {
        &self.registry
    }

    // -------------------------------------------------------------------------
    // Toggle Definition
    // -------------------------------------------------------------------------

    /// Defines and registers a toggle on the local provider.
    pub fn toggle<T: ToggleValue>(&self, key: &str, default: T) -> Toggle<T> {
        self.register(Toggle::new(key, default, self.local()))
    }

    /// Defines and registers a toggle on the remote provider.
    pub fn remote_toggle<T: ToggleValue>(&self, key: &str, default: T) -> RuntimeResult<Toggle<T>> {
        let provider = self.remote().ok_or(RuntimeError::NoRemote)?;
        Ok(self.register(Toggle::new(key, default, provider)))
    }

    /// Defines and registers a group on the local provider.
    pub fn group<G: ToggleGroup>(&self, key: &str) -> Group<G> {
        self.register(Group::new(key, self.local()))
    }

    /// Adds a toggle to the debug registry and returns it.
    pub fn register<D: DebugToggle + Clone + 'static>(&self, toggle: D) -> D {
        self.registry.register(Arc::new(toggle.clone()));
        toggle
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Sets up the remote provider and starts the refresh loop.
    ///
    /// A remote source that fails to deliver its first document is logged;
    /// toggles on it resolve to their defaults until a refresh succeeds.
    pub async fn start(&self) {
        let Some(remote) = &self.remote else {
            debug!("No remote provider configured");
            return;
        };

        match remote.provider.set_up().await {
            Ok(()) => info!(name = %remote.config.name, "Remote provider ready"),
            Err(e) => error!(name = %remote.config.name, error = %e, "Remote provider failed to set up"),
        }

        let mut task = self.refresh_task.lock();
        if task.is_some() {
            warn!("Refresh loop is already running");
            return;
        }
        *task = Some(Self::spawn_refresh_loop(
            remote.provider.clone(),
            remote.config.clone(),
            self.shutdown.subscribe(),
        ));
    }

    fn spawn_refresh_loop(
        provider: Arc<OverridableProvider>,
        config: RemoteConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval(config.refresh_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                tokio::select! {
                    // The borrowed `Ref` must not outlive the branch future.
                    _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
                    _ = interval.tick() => {
                        if let Err(e) = provider.refresh().await {
                            warn!(name = %config.name, error = %e, "Remote refresh failed");
                        }
                    }
                }
            }
            debug!(name = %config.name, "Refresh loop stopped");
        })
    }

    /// Refreshes the remote provider once.
    pub async fn refresh(&self) -> RuntimeResult<()> {
        let remote = self.remote.as_ref().ok_or(RuntimeError::NoRemote)?;
        remote.provider.refresh().await?;
        Ok(())
    }

    /// Stops the refresh loop and tears the providers down.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let task = self.refresh_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "Refresh loop panicked");
        }

        if let Some(remote) = &self.remote {
            remote.provider.tear_down();
        }
        self.local.tear_down();
        info!("Runtime stopped");
    }

    /// Starts the runtime and runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) {
        self.run_until(wait_for_signal()).await;
    }

    /// Starts the runtime and runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await;
        shutdown.await;
        self.shutdown().await;
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`ToggleRuntime`] with custom configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder searching the current directory.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: SwitchboardConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<ToggleRuntime> {
        let config = self.config_loader.load()?;
        ToggleRuntime::from_config(&config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
