//! Ledger connection lifecycle.
//!
//! [`ContractService`] owns the ledger handle. It is created unconnected,
//! connects on [`start`](ContractService::start) and releases the handle on
//! [`shutdown`](ContractService::shutdown). Components are handed out bound
//! to whatever handle is live at the time of the call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::config::{LedgerEndpoint, ServiceConfig};
use crate::disclosure::DisclosureBuilder;
use crate::error::{LedgerError, ResolverError, Result};
use crate::ledger::LedgerClient;
use crate::provision::GetOrCreate;
use crate::resolver::ActiveContractResolver;

/// Opens ledger sessions.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self, endpoint: &LedgerEndpoint) -> std::result::Result<Arc<dyn LedgerClient>, LedgerError>;
}

/// Connector that always hands out the same client.
pub struct StaticConnector {
    client: Arc<dyn LedgerClient>,
    connects: AtomicUsize,
}

impl StaticConnector {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client,
            connects: AtomicUsize::new(0),
        }
    }

    /// Number of successful `connect` calls.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerConnector for StaticConnector {
    async fn connect(&self, _endpoint: &LedgerEndpoint) -> std::result::Result<Arc<dyn LedgerClient>, LedgerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.client))
    }
}

/// Owns the ledger connection and builds resolution components on top of it.
pub struct ContractService {
    config: ServiceConfig,
    connector: Arc<dyn LedgerConnector>,
    /// Serializes `start` and `shutdown`; never held by readers of the handle.
    lifecycle: Mutex<()>,
    handle: RwLock<Option<Arc<dyn LedgerClient>>>,
}

impl ContractService {
    pub fn new(config: ServiceConfig, connector: Arc<dyn LedgerConnector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            lifecycle: Mutex::new(()),
            handle: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Connect if not already connected. Concurrent callers share one handle.
    ///
    /// Readers of the handle are not blocked while the connection is being
    /// established.
    #[instrument(skip_all, fields(url = %self.config.ledger.url))]
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.handle.read().await.is_some() {
            return Ok(());
        }

        let endpoint = &self.config.ledger;
        let timeout = endpoint.request_timeout();
        let client = match tokio::time::timeout(timeout, self.connector.connect(endpoint)).await {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                warn!(error = %e, "Ledger connection failed");
                return Err(ResolverError::LedgerUnavailable(e));
            }
            Err(_) => {
                warn!(timeout_ms = endpoint.request_timeout_ms, "Ledger connection timed out");
                return Err(ResolverError::LedgerUnavailable(LedgerError::Timeout(timeout)));
            }
        };

        *self.handle.write().await = Some(client);
        info!(user_id = ?endpoint.user_id, "Ledger connection established");
        Ok(())
    }

    /// Close and drop the handle. A no-op when not connected.
    pub async fn shutdown(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(client) = self.handle.write().await.take() else {
            return Ok(());
        };
        client.close().await.map_err(ResolverError::LedgerUnavailable)?;
        info!(url = %self.config.ledger.url, "Ledger connection closed");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.handle.read().await.is_some()
    }

    /// The live ledger handle.
    pub async fn client(&self) -> Result<Arc<dyn LedgerClient>> {
        self.handle
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(ResolverError::NotConnected)
    }

    pub async fn resolver(&self) -> Result<ActiveContractResolver> {
        Ok(ActiveContractResolver::new(
            self.client().await?,
            self.config.resolver.clone(),
        ))
    }

    pub async fn disclosures(&self) -> Result<DisclosureBuilder> {
        Ok(DisclosureBuilder::new(self.resolver().await?))
    }

    pub async fn provisioner(&self) -> Result<GetOrCreate> {
        Ok(GetOrCreate::new(self.resolver().await?))
    }
}
