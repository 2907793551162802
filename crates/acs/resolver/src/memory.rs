//! In-memory ledger implementation.
//!
//! Deterministic and test-friendly. Contracts are kept in creation order and
//! snapshots are answered "as of" the requested offset, so a reader observes
//! the same state a real participant would at that position.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use acs_types::{
    ActiveContractEntry, ActiveContractsQuery, CommandBatch, ContractId, ContractReference,
    CreatedEvent, LedgerCommand, Offset, PartyId, SubmissionOutcome, SynchronizerId, TemplateId,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::LedgerClient;

/// Extracts a contract key from create arguments.
pub type KeyFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// In-memory ledger for tests, demos, and embedding.
pub struct InMemoryLedger {
    synchronizer_id: SynchronizerId,
    inner: RwLock<LedgerState>,
    snapshot_queries: AtomicUsize,
    submissions: AtomicUsize,
}

#[derive(Default)]
struct LedgerState {
    end: Offset,
    contracts: Vec<StoredContract>,
    keys: HashMap<TemplateId, KeyFn>,
    failing_reads: u32,
    lagging: bool,
}

struct StoredContract {
    template_id: TemplateId,
    stakeholders: Vec<PartyId>,
    /// `None` for entries the ledger cannot render as an active view.
    event: Option<CreatedEvent>,
    key: Option<Value>,
    created_at: Offset,
    archived_at: Option<Offset>,
    hidden: bool,
}

impl StoredContract {
    fn is_active_at(&self, offset: Offset) -> bool {
        self.created_at <= offset && self.archived_at.map_or(true, |at| at > offset)
    }

    fn is_live(&self) -> bool {
        self.archived_at.is_none()
    }

    fn contract_id(&self) -> Option<&ContractId> {
        self.event.as_ref().map(|e| &e.contract_id)
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_synchronizer(SynchronizerId::new("global-synchronizer::memory"))
    }

    pub fn with_synchronizer(synchronizer_id: SynchronizerId) -> Self {
        Self {
            synchronizer_id,
            inner: RwLock::new(LedgerState::default()),
            snapshot_queries: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }

    /// Enforce uniqueness of `key` among live contracts of `template_id`.
    pub fn with_contract_key<F>(self, template_id: impl Into<TemplateId>, key: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.write_state()
            .keys
            .insert(template_id.into(), Arc::new(key));
        self
    }

    pub fn synchronizer_id(&self) -> &SynchronizerId {
        &self.synchronizer_id
    }

    /// Create a contract directly, bypassing command submission.
    pub fn insert_active(
        &self,
        template_id: &TemplateId,
        payload: Value,
        signatories: &[PartyId],
        observers: &[PartyId],
    ) -> ContractReference {
        let mut state = self.write_state();
        let offset = state.end.next();
        state.end = offset;
        let key = state.keys.get(template_id).and_then(|f| f(&payload));
        let event = self.new_event(template_id, payload, signatories, observers, offset);
        let reference = event.reference();
        state.contracts.push(StoredContract {
            template_id: template_id.clone(),
            stakeholders: signatories.iter().chain(observers).cloned().collect(),
            event: Some(event),
            key,
            created_at: offset,
            archived_at: None,
            hidden: false,
        });
        reference
    }

    /// Add an entry that the ledger returns without an active view.
    pub fn insert_malformed(&self, template_id: &TemplateId, stakeholders: &[PartyId]) {
        let mut state = self.write_state();
        let offset = state.end.next();
        state.end = offset;
        state.contracts.push(StoredContract {
            template_id: template_id.clone(),
            stakeholders: stakeholders.to_vec(),
            event: None,
            key: None,
            created_at: offset,
            archived_at: None,
            hidden: false,
        });
    }

    /// Archive a contract directly. Returns false when it is not live.
    pub fn archive(&self, contract_id: &ContractId) -> bool {
        let mut state = self.write_state();
        let offset = state.end.next();
        let Some(contract) = state
            .contracts
            .iter_mut()
            .find(|c| c.is_live() && c.contract_id() == Some(contract_id))
        else {
            return false;
        };
        contract.archived_at = Some(offset);
        state.end = offset;
        true
    }

    /// Make the next `count` reads fail with [`LedgerError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.write_state().failing_reads = count;
    }

    /// While lagging, accepted creates stay invisible until [`flush_lag`](Self::flush_lag).
    pub fn set_lag(&self, lagging: bool) {
        self.write_state().lagging = lagging;
    }

    pub fn flush_lag(&self) {
        for contract in self.write_state().contracts.iter_mut() {
            contract.hidden = false;
        }
    }

    /// Number of active-contract queries served.
    pub fn snapshot_queries(&self) -> usize {
        self.snapshot_queries.load(Ordering::SeqCst)
    }

    /// Number of accepted submissions.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Count of live contracts of `template_id`, hidden ones included.
    pub fn live_count(&self, template_id: &TemplateId) -> usize {
        self.read_state()
            .contracts
            .iter()
            .filter(|c| c.is_live() && &c.template_id == template_id)
            .count()
    }

    fn new_event(
        &self,
        template_id: &TemplateId,
        payload: Value,
        signatories: &[PartyId],
        observers: &[PartyId],
        offset: Offset,
    ) -> CreatedEvent {
        let contract_id = ContractId::new(format!("00{}", Uuid::new_v4().simple()));
        let blob = created_event_blob(template_id, &contract_id, &payload);
        CreatedEvent {
            contract_id,
            template_id: template_id.clone(),
            payload,
            created_event_blob: blob,
            synchronizer_id: self.synchronizer_id.clone(),
            signatories: signatories.to_vec(),
            observers: observers.to_vec(),
            offset,
            created_at: Utc::now(),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn take_read_failure(&self) -> Result<(), LedgerError> {
        let mut state = self.write_state();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(LedgerError::Unavailable(
                "simulated ledger outage".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Content-derived stand-in for the ledger's opaque created-event blob.
fn created_event_blob(template_id: &TemplateId, contract_id: &ContractId, payload: &Value) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(template_id.as_str().as_bytes());
    hasher.update(b"\x00");
    hasher.update(contract_id.as_str().as_bytes());
    hasher.update(b"\x00");
    hasher.update(payload.to_string().as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn current_offset(&self) -> Result<Offset, LedgerError> {
        self.take_read_failure()?;
        Ok(self.read_state().end)
    }

    async fn active_contracts(
        &self,
        query: &ActiveContractsQuery,
    ) -> Result<Vec<ActiveContractEntry>, LedgerError> {
        self.take_read_failure()?;
        self.snapshot_queries.fetch_add(1, Ordering::SeqCst);

        let state = self.read_state();
        if query.offset > state.end {
            return Err(LedgerError::Rejected {
                code: Some("OFFSET_AFTER_LEDGER_END".to_string()),
                message: format!(
                    "offset {} is after ledger end {}",
                    query.offset, state.end
                ),
            });
        }

        Ok(state
            .contracts
            .iter()
            .filter(|c| !c.hidden)
            .filter(|c| c.is_active_at(query.offset))
            .filter(|c| query.matches_template(&c.template_id))
            .filter(|c| c.stakeholders.contains(&query.party))
            .map(|c| match &c.event {
                Some(event) => ActiveContractEntry::active(event.clone()),
                None => ActiveContractEntry::without_view(c.template_id.clone()),
            })
            .collect())
    }

    async fn submit(&self, batch: CommandBatch) -> Result<SubmissionOutcome, LedgerError> {
        if batch.act_as.is_empty() {
            return Err(LedgerError::Unauthorized(
                "submission requires at least one acting party".to_string(),
            ));
        }

        let mut guard = self.write_state();
        let state = &mut *guard;

        // Validate the whole batch before applying anything.
        let mut batch_keys: Vec<(TemplateId, Value)> = Vec::new();
        for command in &batch.commands {
            match command {
                LedgerCommand::Create {
                    template_id,
                    arguments,
                } => {
                    let Some(key) = state.keys.get(template_id).and_then(|f| f(arguments)) else {
                        continue;
                    };
                    let taken = state.contracts.iter().any(|c| {
                        c.is_live() && &c.template_id == template_id && c.key.as_ref() == Some(&key)
                    }) || batch_keys
                        .iter()
                        .any(|(t, k)| t == template_id && k == &key);
                    if taken {
                        return Err(LedgerError::rejected(
                            "DUPLICATE_CONTRACT_KEY",
                            format!("a live contract of {} already exists for key {}", template_id, key),
                        ));
                    }
                    batch_keys.push((template_id.clone(), key));
                }
                LedgerCommand::Exercise {
                    contract_id,
                    template_id,
                    ..
                } => {
                    let Some(target) = state
                        .contracts
                        .iter()
                        .find(|c| c.is_live() && c.contract_id() == Some(contract_id))
                    else {
                        return Err(LedgerError::rejected(
                            "CONTRACT_NOT_FOUND",
                            format!("contract {} is not active", contract_id),
                        ));
                    };
                    if &target.template_id != template_id {
                        return Err(LedgerError::rejected(
                            "WRONGLY_TYPED_CONTRACT",
                            format!("contract {} is not a {}", contract_id, template_id),
                        ));
                    }
                    let visible = batch
                        .act_as
                        .iter()
                        .chain(&batch.read_as)
                        .any(|p| target.stakeholders.contains(p));
                    let disclosed = batch.disclosed_contracts.iter().any(|d| {
                        &d.contract_id == contract_id
                            && target.event.as_ref().map(|e| &e.created_event_blob)
                                == Some(&d.created_event_blob)
                    });
                    if !visible && !disclosed {
                        return Err(LedgerError::rejected(
                            "CONTRACT_NOT_FOUND",
                            format!("contract {} is not visible to the submitting parties", contract_id),
                        ));
                    }
                }
            }
        }

        let offset = state.end.next();
        let signatories = batch.act_as.clone();
        let mut created = Vec::new();
        let mut archived = Vec::new();

        for command in batch.commands {
            match command {
                LedgerCommand::Create {
                    template_id,
                    arguments,
                } => {
                    let key = state.keys.get(&template_id).and_then(|f| f(&arguments));
                    let event = self.new_event(&template_id, arguments, &signatories, &[], offset);
                    created.push(event.reference());
                    state.contracts.push(StoredContract {
                        template_id,
                        stakeholders: signatories.clone(),
                        event: Some(event),
                        key,
                        created_at: offset,
                        archived_at: None,
                        hidden: state.lagging,
                    });
                }
                LedgerCommand::Exercise {
                    contract_id,
                    consuming: true,
                    ..
                } => {
                    if let Some(contract) = state
                        .contracts
                        .iter_mut()
                        .find(|c| c.is_live() && c.contract_id() == Some(&contract_id))
                    {
                        contract.archived_at = Some(offset);
                        archived.push(contract_id);
                    }
                }
                LedgerCommand::Exercise { .. } => {}
            }
        }

        state.end = offset;
        self.submissions.fetch_add(1, Ordering::SeqCst);

        debug!(
            command_id = %batch.command_id,
            offset = %offset,
            created = created.len(),
            archived = archived.len(),
            "Applied submission"
        );

        Ok(SubmissionOutcome {
            command_id: batch.command_id,
            offset,
            created,
            archived,
        })
    }
}
