//! Error types for ledger clients and the resolution engine.

use std::time::Duration;

use acs_types::{ContractId, PartyId, TemplateId};
use thiserror::Error;

/// Errors raised by a [`LedgerClient`](crate::ledger::LedgerClient).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger request timed out after {0:?}")]
    Timeout(Duration),

    #[error("ledger request cancelled")]
    Cancelled,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("command rejected{}: {message}", code_suffix(.code))]
    Rejected {
        code: Option<String>,
        message: String,
    },
}

impl LedgerError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Failures of the transport or session rather than of the request itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::Cancelled | Self::Unauthorized(_)
        )
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default()
}

/// Errors returned by resolver, disclosure, provisioning and service operations.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// An offset query, active-contract query or create submission could not
    /// reach the ledger.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),

    /// A specifically referenced contract is not in the party's active set.
    #[error("contract {contract_id} ({template_id}) not found in active set of {party}")]
    ContractNotFound {
        party: PartyId,
        template_id: TemplateId,
        contract_id: ContractId,
    },

    /// The create step ran but the contract is still not visible.
    #[error("contract of {template_id} not visible to {party} after create")]
    CreateRaceOrVisibility {
        party: PartyId,
        template_id: TemplateId,
    },

    /// The ledger rejected the create for a reason other than a duplicate.
    ///
    /// Transport failures of the create (timeout, cancellation, outage)
    /// surface as [`ResolverError::LedgerUnavailable`] instead.
    #[error("create action failed: {0}")]
    CreateFailed(#[source] LedgerError),

    #[error("{count} active contracts of {template_id} match the key; expected at most one")]
    AmbiguousMatch {
        template_id: TemplateId,
        count: usize,
    },

    #[error("contract {contract_id} cannot be disclosed: {field} is empty")]
    IncompleteDisclosure {
        contract_id: ContractId,
        field: &'static str,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger connection not started")]
    NotConnected,

    #[error("configuration error: {0}")]
    Config(String),
}

impl ResolverError {
    /// Whether a caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LedgerUnavailable(_) | Self::CreateRaceOrVisibility { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ContractNotFound { .. })
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(e: serde_json::Error) -> Self {
        ResolverError::Serialization(e.to_string())
    }
}

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ResolverError>;
