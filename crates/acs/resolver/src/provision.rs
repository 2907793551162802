//! Get-or-create provisioning of keyed contracts.
//!
//! Resolve first. Only when nothing matches, run the caller's create action
//! and resolve again. Two callers racing through the empty case may both
//! create; the loser's "already exists" rejection is absorbed and it picks up
//! the winner's contract on re-resolution.

use std::future::Future;

use acs_types::{CommandBatch, ContractReference, LedgerCommand, PartyId, TemplateId};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{LedgerError, ResolverError, Result};
use crate::ledger::LedgerClient;
use crate::resolver::ActiveContractResolver;

/// How a provisioned contract came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOrigin {
    /// Already active; the create action did not run.
    Existing,

    /// Created by this call.
    Created,

    /// Another submitter created it first.
    CreatedConcurrently,
}

impl std::fmt::Display for ProvisionOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionOrigin::Existing => write!(f, "existing"),
            ProvisionOrigin::Created => write!(f, "created"),
            ProvisionOrigin::CreatedConcurrently => write!(f, "created_concurrently"),
        }
    }
}

/// Get-or-create orchestrator over an [`ActiveContractResolver`].
#[derive(Clone)]
pub struct GetOrCreate {
    resolver: ActiveContractResolver,
}

impl GetOrCreate {
    pub fn new(resolver: ActiveContractResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ActiveContractResolver {
        &self.resolver
    }

    /// Reference of the contract matching `target`, creating it if absent.
    pub async fn get_or_create<T, F, C, Fut>(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
        target: &T,
        equals: F,
        create: C,
    ) -> Result<ContractReference>
    where
        T: DeserializeOwned,
        F: Fn(&T, &T) -> bool,
        C: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(), LedgerError>>,
    {
        let (reference, _) = self
            .ensure(party, template_id, target, equals, create)
            .await?;
        Ok(reference)
    }

    /// [`get_or_create`](Self::get_or_create) that also reports the origin.
    #[instrument(skip_all, fields(party = %party, template_id = %template_id))]
    pub async fn ensure<T, F, C, Fut>(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
        target: &T,
        equals: F,
        create: C,
    ) -> Result<(ContractReference, ProvisionOrigin)>
    where
        T: DeserializeOwned,
        F: Fn(&T, &T) -> bool,
        C: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(), LedgerError>>,
    {
        if let Some(existing) = self
            .resolver
            .find_latest_matching(party, template_id, target, &equals)
            .await?
        {
            debug!(contract_id = %existing.contract_id, origin = %ProvisionOrigin::Existing, "Contract already provisioned");
            return Ok((existing, ProvisionOrigin::Existing));
        }

        let duplicates = &self.resolver.config().duplicate_detection;
        let origin = match create().await {
            Ok(()) => ProvisionOrigin::Created,
            Err(e) if duplicates.is_duplicate(&e) => {
                warn!(error = %e, "Create lost a race; absorbing duplicate");
                ProvisionOrigin::CreatedConcurrently
            }
            Err(e) if e.is_transport() => {
                warn!(error = %e, "Create did not reach the ledger");
                return Err(ResolverError::LedgerUnavailable(e));
            }
            Err(e) => return Err(ResolverError::CreateFailed(e)),
        };

        match self
            .resolver
            .find_latest_matching(party, template_id, target, &equals)
            .await?
        {
            Some(reference) => {
                info!(contract_id = %reference.contract_id, origin = %origin, "Contract provisioned");
                Ok((reference, origin))
            }
            None => {
                warn!(origin = %origin, "Contract not visible after create");
                Err(ResolverError::CreateRaceOrVisibility {
                    party: party.clone(),
                    template_id: template_id.clone(),
                })
            }
        }
    }

    /// Rerun [`ensure`](Self::ensure) with backoff while it fails with a
    /// retryable error: the created contract is not yet visible, or the
    /// ledger could not be reached. Other failures are returned at once.
    pub async fn get_or_create_with_retry<T, F, C, Fut>(
        &self,
        party: &PartyId,
        template_id: &TemplateId,
        target: &T,
        equals: F,
        mut create: C,
    ) -> Result<ContractReference>
    where
        T: DeserializeOwned,
        F: Fn(&T, &T) -> bool,
        C: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<(), LedgerError>>,
    {
        let retry = &self.resolver.config().retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self
                .ensure(party, template_id, target, &equals, || create())
                .await
            {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        party = %party,
                        template_id = %template_id,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying get-or-create"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other.map(|(reference, _)| reference),
            }
        }
    }
}

/// Create action submitting one `Create` command with `party` as sole actor.
pub async fn submit_create(
    client: &dyn LedgerClient,
    party: &PartyId,
    template_id: &TemplateId,
    arguments: Value,
) -> std::result::Result<(), LedgerError> {
    let batch = CommandBatch::new(
        party.clone(),
        vec![LedgerCommand::create(template_id.clone(), arguments)],
    );
    let command_id = batch.command_id.clone();
    let outcome = client.submit(batch).await?;
    info!(
        command_id = %command_id,
        template_id = %template_id,
        offset = %outcome.offset,
        "Submitted create"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedger;
    use crate::predicate::structural;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn preapproval() -> TemplateId {
        TemplateId::new("pkg:Wallet:Preapproval")
    }

    fn setup() -> (Arc<InMemoryLedger>, GetOrCreate) {
        let ledger = Arc::new(
            InMemoryLedger::new().with_contract_key(preapproval(), |v| v.get("receiver").cloned()),
        );
        let provisioner = GetOrCreate::new(ActiveContractResolver::with_defaults(ledger.clone()));
        (ledger, provisioner)
    }

    #[tokio::test]
    async fn creates_once_then_reuses() {
        let (ledger, provisioner) = setup();
        let (alice, template) = (PartyId::new("alice"), preapproval());
        let target = json!({"receiver": "alice"});

        let (first, origin) = provisioner
            .ensure(&alice, &template, &target, structural, || {
                submit_create(ledger.as_ref(), &alice, &template, target.clone())
            })
            .await
            .unwrap();
        assert_eq!(origin, ProvisionOrigin::Created);

        let (second, origin) = provisioner
            .ensure(&alice, &template, &target, structural, || async {
                Err::<(), _>(LedgerError::Cancelled)
            })
            .await
            .unwrap();
        assert_eq!(origin, ProvisionOrigin::Existing);
        assert_eq!(first, second);
        assert_eq!(ledger.submissions(), 1);
    }

    #[tokio::test]
    async fn duplicate_rejection_is_absorbed() {
        let (ledger, provisioner) = setup();
        let (alice, template) = (PartyId::new("alice"), preapproval());
        let target = json!({"receiver": "alice"});

        // A concurrent submitter wins between the first resolution and our create.
        let (reference, origin) = provisioner
            .ensure(&alice, &template, &target, structural, || {
                let winner = ledger.insert_active(&template, target.clone(), &[alice.clone()], &[]);
                async move {
                    Err::<(), _>(LedgerError::rejected(
                        "DUPLICATE_CONTRACT_KEY",
                        format!("{} already exists", winner),
                    ))
                }
            })
            .await
            .unwrap();

        assert_eq!(origin, ProvisionOrigin::CreatedConcurrently);
        assert_eq!(reference.template_id, template);
        assert_eq!(ledger.live_count(&template), 1);
        assert_eq!(ledger.submissions(), 0);
    }

    #[tokio::test]
    async fn other_create_errors_surface() {
        let (_ledger, provisioner) = setup();
        let err = provisioner
            .get_or_create(
                &PartyId::new("alice"),
                &preapproval(),
                &json!({"receiver": "alice"}),
                structural,
                || async { Err::<(), _>(LedgerError::rejected("INVALID_ARGUMENT", "missing field receiver")) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::CreateFailed(LedgerError::Rejected { .. })));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn create_timeout_is_unavailable_and_retryable() {
        let (_ledger, provisioner) = setup();
        let err = provisioner
            .get_or_create(
                &PartyId::new("alice"),
                &preapproval(),
                &json!({"receiver": "alice"}),
                structural,
                || async { Err::<(), _>(LedgerError::Timeout(Duration::from_secs(30))) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::LedgerUnavailable(LedgerError::Timeout(_))));
        assert!(err.is_retryable());

        let err = provisioner
            .get_or_create(
                &PartyId::new("alice"),
                &preapproval(),
                &json!({"receiver": "alice"}),
                structural,
                || async { Err::<(), _>(LedgerError::Cancelled) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::LedgerUnavailable(LedgerError::Cancelled)));
    }

    #[tokio::test]
    async fn invisible_create_is_a_race_error() {
        let (ledger, provisioner) = setup();
        let (alice, template) = (PartyId::new("alice"), preapproval());
        let target = json!({"receiver": "alice"});
        ledger.set_lag(true);

        let err = provisioner
            .get_or_create(&alice, &template, &target, structural, || {
                submit_create(ledger.as_ref(), &alice, &template, target.clone())
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, ResolverError::CreateRaceOrVisibility { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_picks_up_late_visibility() {
        let (ledger, provisioner) = setup();
        let (alice, template) = (PartyId::new("alice"), preapproval());
        let target = json!({"receiver": "alice"});
        let creates = AtomicUsize::new(0);
        ledger.set_lag(true);

        let reference = provisioner
            .get_or_create_with_retry(&alice, &template, &target, structural, || {
                creates.fetch_add(1, Ordering::SeqCst);
                let ledger = ledger.clone();
                let (alice, template, target) = (alice.clone(), template.clone(), target.clone());
                async move {
                    let result = submit_create(ledger.as_ref(), &alice, &template, target).await;
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        ledger.set_lag(false);
                        ledger.flush_lag();
                    });
                    result
                }
            })
            .await
            .unwrap();

        assert_eq!(creates.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.live_count(&template), 1);
        assert_eq!(reference.template_id, template);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_from_create_timeout() {
        let (ledger, provisioner) = setup();
        let (alice, template) = (PartyId::new("alice"), preapproval());
        let target = json!({"receiver": "alice"});
        let creates = AtomicUsize::new(0);

        let reference = provisioner
            .get_or_create_with_retry(&alice, &template, &target, structural, || {
                let attempt = creates.fetch_add(1, Ordering::SeqCst);
                let ledger = ledger.clone();
                let (alice, template, target) = (alice.clone(), template.clone(), target.clone());
                async move {
                    if attempt == 0 {
                        return Err(LedgerError::Timeout(Duration::from_secs(30)));
                    }
                    submit_create(ledger.as_ref(), &alice, &template, target).await
                }
            })
            .await
            .unwrap();

        assert_eq!(creates.load(Ordering::SeqCst), 2);
        assert_eq!(ledger.submissions(), 1);
        assert_eq!(reference.template_id, template);
    }

    #[tokio::test]
    async fn retry_does_not_repeat_rejections() {
        let (_ledger, provisioner) = setup();
        let creates = AtomicUsize::new(0);

        let err = provisioner
            .get_or_create_with_retry(
                &PartyId::new("alice"),
                &preapproval(),
                &json!({"receiver": "alice"}),
                structural,
                || {
                    creates.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(LedgerError::rejected("INVALID_ARGUMENT", "bad receiver")) }
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::CreateFailed(_)));
        assert_eq!(creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_max_attempts() {
        let (ledger, provisioner) = setup();
        let (alice, template) = (PartyId::new("alice"), preapproval());
        let target = json!({"receiver": "alice"});
        let creates = AtomicUsize::new(0);
        ledger.set_lag(true);

        let err = provisioner
            .get_or_create_with_retry(&alice, &template, &target, structural, || {
                creates.fetch_add(1, Ordering::SeqCst);
                submit_create(ledger.as_ref(), &alice, &template, target.clone())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::CreateRaceOrVisibility { .. }));
        assert_eq!(creates.load(Ordering::SeqCst), 3);
        // Later attempts hit the key of the hidden contract and are absorbed.
        assert_eq!(ledger.submissions(), 1);
    }
}
