//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use acs_resolver::{ActiveContractResolver, InMemoryLedger, LedgerClient, LedgerError};
use acs_types::{
    ActiveContractEntry, ActiveContractsQuery, CommandBatch, Offset, PartyId, SubmissionOutcome,
    TemplateId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Install a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn alice() -> PartyId {
    PartyId::new("alice::1220a1")
}

pub fn bob() -> PartyId {
    PartyId::new("bob::1220b2")
}

pub fn instrument_template() -> TemplateId {
    TemplateId::new("#token-standard:Splice.Api.Token.HoldingV1:Holding")
}

pub fn factory_template() -> TemplateId {
    TemplateId::new("#token-standard:Splice.Api.Token.TransferInstructionV1:TransferFactory")
}

/// Business key of an instrument holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentKey {
    pub issuer: String,
    pub instrument_id: String,
}

impl InstrumentKey {
    pub fn new(issuer: &str, instrument_id: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            instrument_id: instrument_id.to_string(),
        }
    }

    pub fn payload(&self) -> Value {
        json!({"issuer": self.issuer, "instrumentId": self.instrument_id})
    }
}

pub fn ledger_and_resolver() -> (Arc<InMemoryLedger>, ActiveContractResolver) {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let resolver = ActiveContractResolver::with_defaults(ledger.clone());
    (ledger, resolver)
}

/// Ledger that yields to the scheduler after every active-contract query, so
/// callers joined on one task interleave between resolution and create.
pub struct YieldingLedger {
    pub inner: Arc<InMemoryLedger>,
}

#[async_trait]
impl LedgerClient for YieldingLedger {
    async fn current_offset(&self) -> Result<Offset, LedgerError> {
        self.inner.current_offset().await
    }

    async fn active_contracts(
        &self,
        query: &ActiveContractsQuery,
    ) -> Result<Vec<ActiveContractEntry>, LedgerError> {
        let entries = self.inner.active_contracts(query).await;
        tokio::task::yield_now().await;
        entries
    }

    async fn submit(&self, batch: CommandBatch) -> Result<SubmissionOutcome, LedgerError> {
        self.inner.submit(batch).await
    }
}
