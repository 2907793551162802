//! Selection among several contracts matching the same business key.
//!
//! Ledgers return active contracts in insertion order, and a new version of
//! a keyed contract is created after its predecessor. Picking the last match
//! therefore approximates "most recent". That only holds while the ledger
//! preserves creation order and at most one version is live at a time, so
//! the choice is explicit and configurable.

use acs_types::TemplateId;
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};

/// Policy choosing one match out of an ordered list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Last match in snapshot order.
    #[default]
    Last,

    /// First match in snapshot order.
    First,

    /// Fail when more than one contract matches.
    Unique,
}

impl TieBreak {
    /// Take one element of `matches`, which must be in snapshot order.
    pub fn pick<T>(&self, template_id: &TemplateId, mut matches: Vec<T>) -> Result<Option<T>> {
        match self {
            TieBreak::Last => Ok(matches.pop()),
            TieBreak::First => Ok(matches.into_iter().next()),
            TieBreak::Unique => {
                if matches.len() > 1 {
                    return Err(ResolverError::AmbiguousMatch {
                        template_id: template_id.clone(),
                        count: matches.len(),
                    });
                }
                Ok(matches.pop())
            }
        }
    }
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TieBreak::Last => write!(f, "last"),
            TieBreak::First => write!(f, "first"),
            TieBreak::Unique => write!(f, "unique"),
        }
    }
}
