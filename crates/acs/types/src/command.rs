//! Command submission model.
//!
//! Only injected create actions submit commands; the resolver itself never
//! writes to the ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::ContractReference;
use crate::disclosure::DisclosedContract;
use crate::ids::{CommandId, ContractId, Offset, PartyId, TemplateId};

/// A single ledger command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerCommand {
    Create {
        template_id: TemplateId,
        arguments: Value,
    },
    Exercise {
        template_id: TemplateId,
        contract_id: ContractId,
        choice: String,
        argument: Value,
        /// Consuming choices archive the target contract.
        consuming: bool,
    },
}

impl LedgerCommand {
    pub fn create(template_id: impl Into<TemplateId>, arguments: Value) -> Self {
        Self::Create {
            template_id: template_id.into(),
            arguments,
        }
    }

    /// The built-in consuming `Archive` choice.
    pub fn archive(reference: &ContractReference) -> Self {
        Self::Exercise {
            template_id: reference.template_id.clone(),
            contract_id: reference.contract_id.clone(),
            choice: "Archive".to_string(),
            argument: Value::Object(Default::default()),
            consuming: true,
        }
    }

    pub fn template_id(&self) -> &TemplateId {
        match self {
            Self::Create { template_id, .. } | Self::Exercise { template_id, .. } => template_id,
        }
    }
}

/// Commands submitted atomically under one authority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandBatch {
    pub command_id: CommandId,
    pub act_as: Vec<PartyId>,
    #[serde(default)]
    pub read_as: Vec<PartyId>,
    pub commands: Vec<LedgerCommand>,
    #[serde(default)]
    pub disclosed_contracts: Vec<DisclosedContract>,
}

impl CommandBatch {
    pub fn new(act_as: PartyId, commands: Vec<LedgerCommand>) -> Self {
        Self {
            command_id: CommandId::generate(),
            act_as: vec![act_as],
            read_as: Vec::new(),
            commands,
            disclosed_contracts: Vec::new(),
        }
    }

    pub fn with_disclosures(mut self, disclosed: Vec<DisclosedContract>) -> Self {
        self.disclosed_contracts = disclosed;
        self
    }
}

/// Effects of an accepted submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub command_id: CommandId,
    /// Ledger offset at which the transaction was committed.
    pub offset: Offset,
    pub created: Vec<ContractReference>,
    pub archived: Vec<ContractId>,
}
