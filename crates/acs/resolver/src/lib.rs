//! Active-contract resolution over a ledger client.
//!
//! Three operations built on one snapshot pipeline:
//!
//! - [`ActiveContractResolver`]: find the latest active contract whose payload
//!   matches a business key, or look up a known contract by id
//! - [`DisclosureBuilder`]: package a contract's created-event blob so a
//!   non-stakeholder can use it in a command
//! - [`GetOrCreate`]: resolve, create when absent, resolve again
//!
//! [`ContractService`] owns the ledger connection with an explicit
//! start/shutdown lifecycle and hands out those components. The
//! [`InMemoryLedger`] is a complete [`LedgerClient`] for tests and demos.
//!
//! ```
//! use std::sync::Arc;
//! use acs_resolver::{predicate::structural, ActiveContractResolver, InMemoryLedger};
//! use acs_types::{PartyId, TemplateId};
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let ledger = Arc::new(InMemoryLedger::new());
//! let alice = PartyId::new("alice");
//! let holding = TemplateId::new("pkg:Token:Holding");
//! ledger.insert_active(&holding, json!({"owner": "alice", "id": "X"}), &[alice.clone()], &[]);
//! let latest = ledger.insert_active(&holding, json!({"owner": "alice", "id": "X"}), &[alice.clone()], &[]);
//!
//! let resolver = ActiveContractResolver::with_defaults(ledger);
//! let found = resolver
//!     .find_latest_matching(&alice, &holding, &json!({"owner": "alice", "id": "X"}), structural)
//!     .await
//!     .unwrap();
//! assert_eq!(found, Some(latest));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod disclosure;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod predicate;
pub mod provision;
pub mod resolver;
pub mod selection;
pub mod service;

pub use config::{DuplicateDetection, LedgerEndpoint, ResolverConfig, RetryConfig, ServiceConfig};
pub use disclosure::DisclosureBuilder;
pub use error::{LedgerError, ResolverError, Result};
pub use ledger::LedgerClient;
pub use memory::InMemoryLedger;
pub use provision::{submit_create, GetOrCreate, ProvisionOrigin};
pub use resolver::{select_latest, ActiveContractResolver, ResolvedContract};
pub use selection::TieBreak;
pub use service::{ContractService, LedgerConnector, StaticConnector};
