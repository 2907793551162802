//! Explicit disclosure payloads.

use serde::{Deserialize, Serialize};

use crate::contract::{ContractReference, CreatedEvent};
use crate::ids::{ContractId, SynchronizerId, TemplateId};

/// Lets a party without visibility into a contract reference it in a command.
///
/// Field names follow the ledger's JSON API so the value can be forwarded
/// verbatim as a `disclosedContracts` element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosedContract {
    pub contract_id: ContractId,
    pub template_id: TemplateId,
    pub created_event_blob: String,
    pub synchronizer_id: SynchronizerId,
}

impl DisclosedContract {
    pub fn reference(&self) -> ContractReference {
        ContractReference {
            contract_id: self.contract_id.clone(),
            template_id: self.template_id.clone(),
        }
    }

    /// Name of the first blank field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.contract_id.is_blank() {
            Some("contract_id")
        } else if self.template_id.is_blank() {
            Some("template_id")
        } else if self.created_event_blob.trim().is_empty() {
            Some("created_event_blob")
        } else if self.synchronizer_id.is_blank() {
            Some("synchronizer_id")
        } else {
            None
        }
    }
}

impl From<&CreatedEvent> for DisclosedContract {
    fn from(event: &CreatedEvent) -> Self {
        Self {
            contract_id: event.contract_id.clone(),
            template_id: event.template_id.clone(),
            created_event_blob: event.created_event_blob.clone(),
            synchronizer_id: event.synchronizer_id.clone(),
        }
    }
}
