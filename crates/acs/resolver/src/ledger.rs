//! Ledger client boundary.
//!
//! The engine only needs three capabilities from a ledger: its current end
//! offset, an active-contract query and command submission. Everything else
//! (transport, authentication, signing) belongs to the implementation.

use async_trait::async_trait;

use acs_types::{ActiveContractEntry, ActiveContractsQuery, CommandBatch, Offset, SubmissionOutcome};

use crate::error::LedgerError;

/// Capability set the engine consumes from a ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current ledger end.
    async fn current_offset(&self) -> Result<Offset, LedgerError>;

    /// Active contracts matching `query`, in ledger-insertion order.
    async fn active_contracts(
        &self,
        query: &ActiveContractsQuery,
    ) -> Result<Vec<ActiveContractEntry>, LedgerError>;

    /// Submit a batch of commands and wait for the outcome.
    async fn submit(&self, batch: CommandBatch) -> Result<SubmissionOutcome, LedgerError>;

    /// Release any session resources.
    async fn close(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
