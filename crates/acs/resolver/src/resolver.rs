//! Active-contract resolution.
//!
//! Every lookup follows the same pipeline over a single snapshot:
//!
//! 1. read the ledger end offset
//! 2. query the party's active contracts of one template as of that offset
//! 3. drop entries without an active view or whose payload does not decode
//! 4. keep entries whose payload equals the target under the key predicate
//! 5. pick one according to the configured [`TieBreak`]
//!
//! The snapshot is fetched once per call and never re-queried mid-resolution.

use std::sync::Arc;

use acs_types::{
    ActiveContractsQuery, ContractId, ContractReference, ContractSnapshot, CreatedEvent, PartyId,
    TemplateId,
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::ledger::LedgerClient;
use crate::selection::TieBreak;

/// An active contract together with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContract<T> {
    pub event: CreatedEvent,
    pub payload: T,
}

impl<T> ResolvedContract<T> {
    pub fn reference(&self) -> ContractReference {
        self.event.reference()
    }

    pub fn contract_id(&self) -> &ContractId {
        &self.event.contract_id
    }
}

/// Resolves contracts out of a party's active-contract set.
#[derive(Clone)]
pub struct ActiveContractResolver {
    ledger: Arc<dyn LedgerClient>,
    config: ResolverConfig,
}

impl ActiveContractResolver {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: ResolverConfig) -> Self {
        Self { ledger, config }
    }

    pub fn with_defaults(ledger: Arc<dyn LedgerClient>) -> Self {
        Self::new(ledger, ResolverConfig::default())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn ledger(&self) -> Arc<dyn LedgerClient> {
        Arc::clone(&self.ledger)
    }

    /// Fetch the active contracts of `template_id` visible to `party` at ledger end.
    #[instrument(skip_all, fields(party = %party, template_id = %template_id))]
    pub async fn snapshot(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
    ) -> Result<ContractSnapshot> {
        self.check_inputs(party, template_id)?;

        let offset = self
            .ledger
            .current_offset()
            .await
            .map_err(ResolverError::LedgerUnavailable)?;

        let query = ActiveContractsQuery::new(offset, party.clone(), template_id.clone());
        let entries = self
            .ledger
            .active_contracts(&query)
            .await
            .map_err(ResolverError::LedgerUnavailable)?;

        debug!(offset = %offset, entries = entries.len(), "Fetched active-contract snapshot");

        Ok(ContractSnapshot::new(
            party.clone(),
            template_id.clone(),
            offset,
            entries,
        ))
    }

    /// Reference of the latest active contract whose payload matches `target`.
    ///
    /// Zero matches is `Ok(None)`, not an error.
    pub async fn find_latest_matching<T, F>(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
        target: &T,
        equals: F,
    ) -> Result<Option<ContractReference>>
    where
        T: DeserializeOwned,
        F: Fn(&T, &T) -> bool,
    {
        Ok(self
            .find_latest_matching_contract(party, template_id, target, equals)
            .await?
            .map(|resolved| resolved.reference()))
    }

    /// Like [`find_latest_matching`](Self::find_latest_matching) but keeps the
    /// created event and decoded payload.
    pub async fn find_latest_matching_contract<T, F>(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
        target: &T,
        equals: F,
    ) -> Result<Option<ResolvedContract<T>>>
    where
        T: DeserializeOwned,
        F: Fn(&T, &T) -> bool,
    {
        let snapshot = self.snapshot(party, template_id).await?;
        let selected = select_latest(&snapshot, target, &equals, self.config.tie_break)?;

        match &selected {
            Some(resolved) => debug!(
                party = %party,
                template_id = %template_id,
                contract_id = %resolved.event.contract_id,
                tie_break = %self.config.tie_break,
                "Resolved latest matching contract"
            ),
            None => debug!(
                party = %party,
                template_id = %template_id,
                "No active contract matches the key"
            ),
        }

        Ok(selected)
    }

    /// Every active contract matching `target`, in snapshot order.
    pub async fn find_all_matching<T, F>(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
        target: &T,
        equals: F,
    ) -> Result<Vec<ResolvedContract<T>>>
    where
        T: DeserializeOwned,
        F: Fn(&T, &T) -> bool,
    {
        let snapshot = self.snapshot(party, template_id).await?;
        Ok(matching_contracts(&snapshot, target, &equals))
    }

    /// Every decodable active contract of `template_id`, in snapshot order.
    pub async fn list_active<T>(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
    ) -> Result<Vec<ResolvedContract<T>>>
    where
        T: DeserializeOwned,
    {
        let snapshot = self.snapshot(party, template_id).await?;
        Ok(decoded_views(&snapshot).collect())
    }

    /// Created event of a specific contract in the party's active set.
    ///
    /// Fails with [`ResolverError::ContractNotFound`] when the contract is
    /// archived, not visible to `party`, or never existed.
    pub async fn find_by_reference(
        &self,
        party: &PartyId,
        contract_id: &ContractId,
        template_id: &TemplateId,
    ) -> Result<CreatedEvent> {
        if self.config.validate_inputs && contract_id.is_blank() {
            return Err(ResolverError::InvalidInput(
                "contract id must not be empty".into(),
            ));
        }

        let snapshot = self.snapshot(party, template_id).await?;
        snapshot
            .find(contract_id)
            .cloned()
            .ok_or_else(|| ResolverError::ContractNotFound {
                party: party.clone(),
                template_id: template_id.clone(),
                contract_id: contract_id.clone(),
            })
    }

    /// [`find_by_reference`](Self::find_by_reference) with the payload decoded.
    pub async fn find_by_reference_as<T>(
        &self,
        party: &PartyId,
        contract_id: &ContractId,
        template_id: &TemplateId,
    ) -> Result<ResolvedContract<T>>
    where
        T: DeserializeOwned,
    {
        let event = self
            .find_by_reference(party, contract_id, template_id)
            .await?;
        let payload = serde_json::from_value(event.payload.clone())?;
        Ok(ResolvedContract { event, payload })
    }

    fn check_inputs(&self, party: &PartyId, template_id: &TemplateId) -> Result<()> {
        if !self.config.validate_inputs {
            return Ok(());
        }
        if party.is_blank() {
            return Err(ResolverError::InvalidInput("party must not be empty".into()));
        }
        if template_id.is_blank() {
            return Err(ResolverError::InvalidInput(
                "template id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Active views of `snapshot` whose payload decodes as `T`, in order.
fn decoded_views<T>(snapshot: &ContractSnapshot) -> impl Iterator<Item = ResolvedContract<T>> + '_
where
    T: DeserializeOwned,
{
    let skipped_views = snapshot.len() - snapshot.active_views().count();
    if skipped_views > 0 {
        trace!(skipped = skipped_views, "Skipping entries without an active view");
    }

    snapshot.active_views().filter_map(|event| {
        match serde_json::from_value::<T>(event.payload.clone()) {
            Ok(payload) => Some(ResolvedContract {
                event: event.clone(),
                payload,
            }),
            Err(e) => {
                trace!(contract_id = %event.contract_id, error = %e, "Skipping undecodable payload");
                None
            }
        }
    })
}

/// Contracts of `snapshot` whose payload equals `target`, in snapshot order.
pub fn matching_contracts<T, F>(
    snapshot: &ContractSnapshot,
    target: &T,
    equals: &F,
) -> Vec<ResolvedContract<T>>
where
    T: DeserializeOwned,
    F: Fn(&T, &T) -> bool,
{
    decoded_views(snapshot)
        .filter(|resolved| equals(&resolved.payload, target))
        .collect()
}

/// Filter, match and tie-break over one snapshot.
pub fn select_latest<T, F>(
    snapshot: &ContractSnapshot,
    target: &T,
    equals: &F,
    tie_break: TieBreak,
) -> Result<Option<ResolvedContract<T>>>
where
    T: DeserializeOwned,
    F: Fn(&T, &T) -> bool,
{
    let matches = matching_contracts(snapshot, target, equals);
    if matches.len() > 1 {
        debug!(
            template_id = %snapshot.template_id,
            matches = matches.len(),
            "Several active contracts share the key"
        );
    }
    tie_break.pick(&snapshot.template_id, matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedger;
    use crate::predicate::structural;
    use acs_types::{ActiveContractEntry, Offset, SynchronizerId};
    use chrono::Utc;
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct InstrumentKey {
        issuer: String,
        instrument_id: String,
    }

    fn event(id: &str, payload: Value) -> CreatedEvent {
        CreatedEvent {
            contract_id: ContractId::new(id),
            template_id: TemplateId::new("pkg:Token:Instrument"),
            payload,
            created_event_blob: format!("blob-{id}"),
            synchronizer_id: SynchronizerId::new("global::1220"),
            signatories: vec![PartyId::new("alice")],
            observers: vec![],
            offset: Offset(1),
            created_at: Utc::now(),
        }
    }

    fn snapshot(entries: Vec<ActiveContractEntry>) -> ContractSnapshot {
        ContractSnapshot::new(
            PartyId::new("alice"),
            TemplateId::new("pkg:Token:Instrument"),
            Offset(10),
            entries,
        )
    }

    fn key(issuer: &str, id: &str) -> Value {
        json!({"issuer": issuer, "instrumentId": id})
    }

    #[test]
    fn last_match_wins_over_non_matching_tail() {
        let snap = snapshot(vec![
            ActiveContractEntry::active(event("c1", key("alice", "X"))),
            ActiveContractEntry::active(event("c2", key("alice", "X"))),
            ActiveContractEntry::active(event("c3", key("alice", "Y"))),
        ]);

        let picked = select_latest(&snap, &key("alice", "X"), &structural, TieBreak::Last)
            .unwrap()
            .unwrap();
        assert_eq!(picked.contract_id().as_str(), "c2");
    }

    #[test]
    fn entries_without_view_and_bad_payloads_are_skipped() {
        let snap = snapshot(vec![
            ActiveContractEntry::active(event("c1", key("alice", "X"))),
            ActiveContractEntry::without_view("pkg:Token:Instrument"),
            ActiveContractEntry::active(event("c2", json!({"unexpected": true}))),
        ]);

        let target = InstrumentKey {
            issuer: "alice".into(),
            instrument_id: "X".into(),
        };
        let matches = matching_contracts(&snap, &target, &structural);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].contract_id().as_str(), "c1");
    }

    #[test]
    fn empty_snapshot_selects_nothing() {
        let snap = snapshot(vec![]);
        for policy in [TieBreak::Last, TieBreak::First, TieBreak::Unique] {
            let picked = select_latest(&snap, &key("alice", "X"), &structural, policy).unwrap();
            assert!(picked.is_none());
        }
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected_before_querying() {
        let ledger = Arc::new(InMemoryLedger::new());
        let resolver = ActiveContractResolver::with_defaults(ledger.clone());

        let err = resolver
            .snapshot(&PartyId::new(""), &TemplateId::new("pkg:Token:Instrument"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidInput(_)));

        let err = resolver
            .find_by_reference(
                &PartyId::new("alice"),
                &ContractId::new(" "),
                &TemplateId::new("pkg:Token:Instrument"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidInput(_)));
        assert_eq!(ledger.snapshot_queries(), 0);
    }

    #[tokio::test]
    async fn find_by_reference_as_decodes_payload() {
        let ledger = Arc::new(InMemoryLedger::new());
        let alice = PartyId::new("alice");
        let template = TemplateId::new("pkg:Token:Instrument");
        let created = ledger.insert_active(&template, key("alice", "X"), &[alice.clone()], &[]);

        let resolver = ActiveContractResolver::with_defaults(ledger);
        let resolved: ResolvedContract<InstrumentKey> = resolver
            .find_by_reference_as(&alice, &created.contract_id, &template)
            .await
            .unwrap();
        assert_eq!(resolved.payload.instrument_id, "X");
        assert_eq!(resolved.reference(), created);
    }

    #[tokio::test]
    async fn list_active_returns_every_decodable_view() {
        let ledger = Arc::new(InMemoryLedger::new());
        let alice = PartyId::new("alice");
        let template = TemplateId::new("pkg:Token:Instrument");
        ledger.insert_active(&template, key("alice", "X"), &[alice.clone()], &[]);
        ledger.insert_malformed(&template, &[alice.clone()]);
        ledger.insert_active(&template, key("alice", "Y"), &[alice.clone()], &[]);

        let resolver = ActiveContractResolver::with_defaults(ledger);
        let all: Vec<ResolvedContract<InstrumentKey>> =
            resolver.list_active(&alice, &template).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.payload.instrument_id.as_str()).collect();
        assert_eq!(ids, vec!["X", "Y"]);
    }
}
