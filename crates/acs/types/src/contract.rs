//! Contract references, created events and active-contract snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ContractId, Offset, PartyId, SynchronizerId, TemplateId};

/// Identifies one contract instance together with the schema it was created from.
///
/// A reference is immutable but may go stale at any time: the contract can be
/// archived right after the query that produced the reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractReference {
    pub contract_id: ContractId,
    pub template_id: TemplateId,
}

impl ContractReference {
    pub fn new(contract_id: impl Into<ContractId>, template_id: impl Into<TemplateId>) -> Self {
        Self {
            contract_id: contract_id.into(),
            template_id: template_id.into(),
        }
    }
}

impl std::fmt::Display for ContractReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.contract_id, self.template_id)
    }
}

/// Create-event view of an active contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub contract_id: ContractId,
    pub template_id: TemplateId,

    /// Create arguments, in the ledger's JSON encoding.
    pub payload: Value,

    /// Opaque blob proving the create event, used for explicit disclosure.
    pub created_event_blob: String,

    pub synchronizer_id: SynchronizerId,

    #[serde(default)]
    pub signatories: Vec<PartyId>,

    #[serde(default)]
    pub observers: Vec<PartyId>,

    /// Offset of the transaction that created the contract.
    pub offset: Offset,

    pub created_at: DateTime<Utc>,
}

impl CreatedEvent {
    pub fn reference(&self) -> ContractReference {
        ContractReference {
            contract_id: self.contract_id.clone(),
            template_id: self.template_id.clone(),
        }
    }

    /// Whether `party` is a signatory or observer of this contract.
    pub fn is_stakeholder(&self, party: &PartyId) -> bool {
        self.signatories.contains(party) || self.observers.contains(party)
    }
}

/// One element of an active-contract query response.
///
/// Ledgers may return entries that carry no usable active-contract view
/// (incomplete unassignments, divested or filtered-out entries). Those
/// have `view == None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveContractEntry {
    pub template_id: TemplateId,
    pub view: Option<CreatedEvent>,
}

impl ActiveContractEntry {
    pub fn active(event: CreatedEvent) -> Self {
        Self {
            template_id: event.template_id.clone(),
            view: Some(event),
        }
    }

    pub fn without_view(template_id: impl Into<TemplateId>) -> Self {
        Self {
            template_id: template_id.into(),
            view: None,
        }
    }

    pub fn is_active_view(&self) -> bool {
        self.view.is_some()
    }

    pub fn reference(&self) -> Option<ContractReference> {
        self.view.as_ref().map(CreatedEvent::reference)
    }
}

/// Active contracts of one template visible to one party as of one offset.
///
/// Entries are kept in the order the ledger returned them (oldest first).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub party: PartyId,
    pub template_id: TemplateId,
    pub offset: Offset,
    pub entries: Vec<ActiveContractEntry>,
}

impl ContractSnapshot {
    pub fn new(
        party: PartyId,
        template_id: TemplateId,
        offset: Offset,
        entries: Vec<ActiveContractEntry>,
    ) -> Self {
        Self {
            party,
            template_id,
            offset,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries carrying an active view, in snapshot order.
    pub fn active_views(&self) -> impl Iterator<Item = &CreatedEvent> {
        self.entries.iter().filter_map(|entry| entry.view.as_ref())
    }

    /// Find the view of a specific contract id.
    pub fn find(&self, contract_id: &ContractId) -> Option<&CreatedEvent> {
        self.active_views()
            .find(|event| &event.contract_id == contract_id)
    }
}
