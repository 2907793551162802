//! Active-contract set types.
//!
//! Shared vocabulary between ledger clients and the resolution engine:
//!
//! - **Identifiers**: parties, templates, contracts, synchronizers, offsets
//! - **Snapshots**: the active contracts of one template visible to one party
//!   as of one offset, in ledger order
//! - **Created events**: the full create-event view of an active contract
//! - **Disclosures**: the payload a counterparty attaches to a command to use
//!   a contract it cannot see
//! - **Commands**: the submission model used by create actions

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod command;
pub mod contract;
pub mod disclosure;
pub mod ids;

pub use command::{CommandBatch, LedgerCommand, SubmissionOutcome};
pub use contract::{ActiveContractEntry, ContractReference, ContractSnapshot, CreatedEvent};
pub use disclosure::DisclosedContract;
pub use ids::{CommandId, ContractId, Offset, PartyId, SynchronizerId, TemplateId};

/// Parameters of an active-contract query.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActiveContractsQuery {
    /// Snapshot offset; the ledger answers "as of" this position.
    pub offset: Offset,
    pub party: PartyId,
    pub template_ids: Vec<TemplateId>,
}

impl ActiveContractsQuery {
    pub fn new(offset: Offset, party: PartyId, template_id: TemplateId) -> Self {
        Self {
            offset,
            party,
            template_ids: vec![template_id],
        }
    }

    pub fn matches_template(&self, template_id: &TemplateId) -> bool {
        self.template_ids.is_empty() || self.template_ids.contains(template_id)
    }
}
