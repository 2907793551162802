//! Identifier newtypes for ledger parties, templates, contracts and synchronizers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the identifier is empty or whitespace only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Ledger party identity, e.g. `alice::1220ab...`.
    PartyId
);

string_id!(
    /// Template or interface identifier naming a contract schema,
    /// e.g. `#token-standard:Splice.Api.Token.HoldingV1:Holding`.
    TemplateId
);

string_id!(
    /// Opaque identifier of one contract instance on the ledger.
    ContractId
);

string_id!(
    /// Synchronizer (domain) a contract is assigned to.
    SynchronizerId
);

string_id!(
    /// Client-chosen identifier deduplicating a command submission.
    CommandId
);

impl CommandId {
    /// Generate a fresh command id.
    pub fn generate() -> Self {
        Self(format!("cmd-{}", Uuid::new_v4()))
    }
}

/// Position in the ledger's transaction stream.
///
/// Snapshots are always taken "as of" an offset; a larger offset observes
/// every transaction a smaller one does.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(pub u64);

impl Offset {
    /// Offset before the first transaction.
    pub const BEGIN: Offset = Offset(0);

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Offset {
        Offset(self.0 + 1)
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
