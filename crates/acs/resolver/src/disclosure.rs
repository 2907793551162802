//! Disclosed-contract payloads for cross-party command submission.
//!
//! A party that is not a stakeholder of a contract can still use it in a
//! transaction if the submitter attaches the contract's created-event blob.
//! The builder fetches that blob fresh from the owner's active set on every
//! call; nothing is cached.

use acs_types::{ContractId, ContractReference, DisclosedContract, PartyId, TemplateId};
use tracing::{debug, instrument};

use crate::error::{ResolverError, Result};
use crate::resolver::ActiveContractResolver;

/// Builds [`DisclosedContract`] payloads from a party's active set.
#[derive(Clone)]
pub struct DisclosureBuilder {
    resolver: ActiveContractResolver,
}

impl DisclosureBuilder {
    pub fn new(resolver: ActiveContractResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ActiveContractResolver {
        &self.resolver
    }

    /// Disclosure of `contract_id` as seen by `party`.
    ///
    /// Fails with [`ResolverError::ContractNotFound`] when the contract is not
    /// in `party`'s active set, and with [`ResolverError::IncompleteDisclosure`]
    /// when the ledger returned an empty blob or synchronizer id.
    #[instrument(skip_all, fields(party = %party, contract_id = %contract_id))]
    pub async fn build_disclosure(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
        contract_id: &ContractId,
    ) -> Result<DisclosedContract> {
        let event = self
            .resolver
            .find_by_reference(party, contract_id, template_id)
            .await?;

        let disclosed = DisclosedContract::from(&event);
        if let Some(field) = disclosed.missing_field() {
            return Err(ResolverError::IncompleteDisclosure {
                contract_id: contract_id.clone(),
                field,
            });
        }

        debug!(
            template_id = %disclosed.template_id,
            synchronizer_id = %disclosed.synchronizer_id,
            "Built disclosure"
        );
        Ok(disclosed)
    }

    /// One disclosure per reference, in order. Stops at the first failure.
    pub async fn build_disclosures(
        &self,
        party: &PartyId,
        references: &[ContractReference],
    ) -> Result<Vec<DisclosedContract>> {
        let mut disclosed = Vec::with_capacity(references.len());
        for reference in references {
            disclosed.push(
                self.build_disclosure(party, &reference.template_id, &reference.contract_id)
                    .await?,
            );
        }
        Ok(disclosed)
    }
}
