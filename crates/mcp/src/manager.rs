//! Remote tool source manager.
//!
//! Holds the live connection table and keeps the shared [`ToolRegistry`] in
//! step with what each source exposes. Every source's tools live under the
//! `<source>__` prefix, so dropping a source is a bulk prefix removal.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use loopwright_config::{ToolSourceConfig, TransportConfig};
use loopwright_core::error::SourceError;
use loopwright_core::namespace;
use loopwright_core::tool::ToolRegistry;

use crate::client::SourceClient;
use crate::http::HttpTransport;
use crate::remote_tool::RemoteTool;
use crate::transport::{SourceTransport, spawn_stdio};

/// Outcome of synchronizing one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub source_id: String,
    /// Dispatch names registered after the sync, sorted
    pub tools: Vec<String>,
}

pub struct RemoteSourceManager {
    registry: Arc<ToolRegistry>,
    sources: RwLock<HashMap<String, Arc<SourceClient>>>,
}

impl std::fmt::Debug for RemoteSourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSourceManager")
            .field("sources", &self.source_ids())
            .finish_non_exhaustive()
    }
}

impl RemoteSourceManager {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            sources: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<SourceClient>>> {
        match self.sources.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<SourceClient>>> {
        match self.sources.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn client(&self, source_id: &str) -> Option<Arc<SourceClient>> {
        self.read().get(&namespace::normalize_source(source_id)).cloned()
    }

    /// Open a transport for a configured source, handshake, and sync its tools.
    pub async fn connect(&self, config: &ToolSourceConfig) -> Result<SyncReport, SourceError> {
        let transport: Arc<dyn SourceTransport> = match &config.transport {
            TransportConfig::Stdio { command, args, env } => {
                Arc::new(spawn_stdio(&config.id, command, args, env)?)
            }
            TransportConfig::Http { url, headers } => {
                Arc::new(HttpTransport::new(&config.id, url, headers.clone()))
            }
        };
        self.attach(&config.id, transport).await
    }

    /// Connect every enabled source, isolating failures per source.
    pub async fn connect_all<'a>(
        &self,
        configs: impl IntoIterator<Item = &'a ToolSourceConfig>,
    ) -> BTreeMap<String, Result<SyncReport, SourceError>> {
        let futures = configs
            .into_iter()
            .filter(|c| c.enabled)
            .map(|c| async move { (c.id.clone(), self.connect(c).await) });
        let results: BTreeMap<_, _> = futures::future::join_all(futures).await.into_iter().collect();
        for (id, result) in &results {
            if let Err(e) = result {
                tracing::warn!(source = %id, error = %e, "Failed to connect tool source");
            }
        }
        results
    }

    /// Register a source over an already-open transport.
    pub async fn attach(
        &self,
        source_id: &str,
        transport: Arc<dyn SourceTransport>,
    ) -> Result<SyncReport, SourceError> {
        let key = namespace::normalize_source(source_id);
        if key.is_empty() {
            return Err(SourceError::Handshake {
                source_id: source_id.to_string(),
                reason: "source id is empty after normalization".into(),
            });
        }
        if self.read().contains_key(&key) {
            return Err(SourceError::AlreadyRegistered(key));
        }

        let client = Arc::new(SourceClient::new(key.clone(), transport));
        if let Err(e) = client.initialize().await {
            let _ = client.close().await;
            return Err(e);
        }

        let inserted = {
            let mut sources = self.write();
            if sources.contains_key(&key) {
                false
            } else {
                sources.insert(key.clone(), client.clone());
                true
            }
        };
        if !inserted {
            let _ = client.close().await;
            return Err(SourceError::AlreadyRegistered(key));
        }

        self.synchronize(&key).await
    }

    /// Close a source and remove all of its tools.
    pub async fn disconnect(&self, source_id: &str) -> Result<(), SourceError> {
        let key = namespace::normalize_source(source_id);
        let client = self
            .write()
            .remove(&key)
            .ok_or_else(|| SourceError::NotConnected(key.clone()))?;
        let removed = self.registry.unregister_prefix(&namespace::source_prefix(&key));
        tracing::info!(source = %key, removed, "Tool source disconnected");
        client.close().await
    }

    /// Replace a source's registered tools with what it lists right now.
    ///
    /// A listing failure removes the source's tools, since they can no
    /// longer be trusted to be callable.
    pub async fn synchronize(&self, source_id: &str) -> Result<SyncReport, SourceError> {
        let client = self
            .client(source_id)
            .ok_or_else(|| SourceError::NotConnected(source_id.to_string()))?;
        let prefix = namespace::source_prefix(client.source_id());

        let listed = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                let removed = self.registry.unregister_prefix(&prefix);
                tracing::warn!(source = %client.source_id(), error = %e, removed, "Tool source sync failed");
                return Err(e);
            }
        };

        self.registry.unregister_prefix(&prefix);
        for info in &listed {
            self.registry
                .register(Arc::new(RemoteTool::new(client.clone(), info)));
        }

        let tools = self.registry.names_with_prefix(&prefix);
        tracing::debug!(source = %client.source_id(), count = tools.len(), "Tool source synchronized");
        Ok(SyncReport {
            source_id: client.source_id().to_string(),
            tools,
        })
    }

    /// Synchronize every known source. One source failing never stops the others.
    pub async fn synchronize_all(&self) -> BTreeMap<String, Result<SyncReport, SourceError>> {
        let ids = self.source_ids();
        let futures = ids.into_iter().map(|id| async move {
            let result = self.synchronize(&id).await;
            (id, result)
        });
        futures::future::join_all(futures).await.into_iter().collect()
    }

    /// Live and initialized.
    pub fn is_connected(&self, source_id: &str) -> bool {
        self.client(source_id)
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }

    /// Ping a source; failure marks it disconnected.
    pub async fn health_check(&self, source_id: &str) -> bool {
        match self.client(source_id) {
            Some(client) => client.ping().await,
            None => false,
        }
    }

    /// Every registered source id, sorted.
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registered source ids whose connection is live, sorted.
    pub fn connected_sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, c)| c.is_connected())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Close every source.
    pub async fn shutdown(&self) {
        for id in self.source_ids() {
            if let Err(e) = self.disconnect(&id).await {
                tracing::warn!(source = %id, error = %e, "Error while closing tool source");
            }
        }
    }
}
