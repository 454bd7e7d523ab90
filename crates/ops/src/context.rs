//! Operations context for dependency injection

use kiln_config::Config;
use kiln_errors::{ConfigError, Error};
use kiln_events::{EventEmitter, EventSender};
use kiln_install::{InstalledManifest, ManifestStore};
use kiln_net::{NetClient, NetConfig, RetryConfig, SchemeTransport, Transport};
use kiln_platform::{HostInfo, Platform};
use kiln_recipe::{DirectoryCatalog, LayeredCatalog, Recipe, RecipeCatalog};
use kiln_resolver::{
    CapabilityQuery, CompositeCapabilities, InstalledPackage, ManifestCapabilities,
    PathCapabilities, Resolver, StaticCapabilities,
};
use kiln_types::parse_version;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Operations context providing access to all system components
pub struct OpsCtx {
    /// System configuration
    pub config: Config,
    /// Event sender for progress reporting
    pub tx: Option<EventSender>,
    /// Source transport used by the fetcher
    pub transport: Arc<dyn Transport>,
    /// What the host provides, excluding installed manifests
    pub capabilities: Arc<dyn CapabilityQuery>,
    /// Where dependency recipes are looked up
    pub catalog: Arc<dyn RecipeCatalog>,
    pub platform: Arc<Platform>,
    /// Committed manifests
    pub store: ManifestStore,
    pub retry: RetryConfig,
    pub host: HostInfo,
}

impl std::fmt::Debug for OpsCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsCtx")
            .field("install_root", &self.install_root())
            .field("store", &self.store)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl OpsCtx {
    // No public constructor - use OpsContextBuilder instead

    #[must_use]
    pub fn install_root(&self) -> PathBuf {
        self.config.install_root()
    }

    /// Committed manifest of `name` for this context's install root
    ///
    /// A manifest recorded against another root (a state directory shared
    /// between roots) is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read.
    pub async fn manifest_in_root(&self, name: &str) -> Result<Option<InstalledManifest>, Error> {
        let root = self.install_root();
        Ok(self
            .store
            .load(name)
            .await?
            .filter(|m| m.is_in_root(&root)))
    }

    /// Resolver for `root` whose capability query also counts committed
    /// manifests
    ///
    /// Dependency recipes are looked up next to the root recipe's file
    /// first, then in the configured catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest store cannot be read.
    pub async fn resolver(&self, root: &Recipe) -> Result<Resolver, Error> {
        let install_root = self.install_root();
        let installed = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|m| m.is_in_root(&install_root))
            .map(|m| {
                let version = parse_version(&m.version).ok();
                InstalledPackage::new(m.name, version)
            })
            .collect();

        let capabilities = CompositeCapabilities::new()
            .with(self.capabilities.clone())
            .with(Arc::new(ManifestCapabilities::new(installed)));

        let catalog: Arc<dyn RecipeCatalog> = match root.origin().and_then(Path::parent) {
            Some(dir) => Arc::new(
                LayeredCatalog::new()
                    .with(Arc::new(DirectoryCatalog::new(vec![dir.to_path_buf()])))
                    .with(self.catalog.clone()),
            ),
            None => self.catalog.clone(),
        };

        let resolver = Resolver::new(Arc::new(capabilities), catalog);
        Ok(match &self.tx {
            Some(tx) => resolver.with_event_sender(tx.clone()),
            None => resolver,
        })
    }
}

/// Builder for operations context
#[derive(Default)]
pub struct OpsContextBuilder {
    config: Option<Config>,
    tx: Option<EventSender>,
    transport: Option<Arc<dyn Transport>>,
    capabilities: Option<Arc<dyn CapabilityQuery>>,
    catalog: Option<Arc<dyn RecipeCatalog>>,
    platform: Option<Arc<Platform>>,
    store: Option<ManifestStore>,
    retry: Option<RetryConfig>,
    host: Option<HostInfo>,
}

impl OpsContextBuilder {
    /// Create a new context builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Arc<dyn CapabilityQuery>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn RecipeCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Arc<Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: ManifestStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = Some(host);
        self
    }

    /// Build the context
    ///
    /// Components left unset are derived from the configuration: an HTTP and
    /// filesystem transport, `[host] provides` plus `PATH` as capabilities,
    /// `recipe_dirs` as the catalog (searched after the root recipe's own
    /// directory) and `<state_dir>/manifests` as the store.
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration was supplied, if `[host]
    /// provides` holds an invalid entry, or if the HTTP client cannot be
    /// created.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let config = self.config.ok_or_else(|| ConfigError::Invalid {
            message: "operations context requires a configuration".to_string(),
        })?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let client = NetClient::new(&NetConfig::from(&config.network))?;
                Arc::new(SchemeTransport::new(client))
            }
        };

        let capabilities = match self.capabilities {
            Some(capabilities) => capabilities,
            None => {
                let provided = StaticCapabilities::from_provides(&config.host.provides)?;
                Arc::new(
                    CompositeCapabilities::new()
                        .with(Arc::new(provided))
                        .with(Arc::new(PathCapabilities::new())),
                )
            }
        };

        let catalog = self.catalog.unwrap_or_else(|| {
            Arc::new(DirectoryCatalog::new(config.paths.recipe_dirs.clone()))
        });
        let store = self
            .store
            .unwrap_or_else(|| ManifestStore::new(config.manifests_dir()));
        let retry = self
            .retry
            .unwrap_or_else(|| RetryConfig::from(&config.network));

        Ok(OpsCtx {
            tx: self.tx,
            transport,
            capabilities,
            catalog,
            platform: self
                .platform
                .unwrap_or_else(|| Arc::new(Platform::current())),
            store,
            retry,
            host: self.host.unwrap_or_else(HostInfo::detect),
            config,
        })
    }
}
