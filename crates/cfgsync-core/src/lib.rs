//! Configuration synchronization engine
//!
//! This crate mirrors the configuration objects of a remote multi-tenant
//! service into a local workspace and back, implementing:
//!
//! - **Object model and local store**: typed objects, reference fields, and
//!   reproducible on-disk JSON
//! - **Baselines**: last committed version from git, else the sync ledger
//! - **Diff engine**: three-way change classification and field-level diffs
//! - **SyncEngine**: pull, diff, and push against one tenant
//! - **CopyEngine**: graph replication into another tenant with reference
//!   rewriting through a persisted ID mapping
//! - **Comparator** and **DeployEngine**: compare two pulled workspaces and
//!   deploy a reviewed graph into a target tenant
//!
//! # Architecture
//!
//! `cfgsync-core` sits above the Layer 0 crates and below the CLI:
//!
//! ```text
//!                 cfgsync-cli
//!                      |
//!                cfgsync-core
//!                      |
//!          +-----------+-----------+
//!          |                       |
//!     cfgsync-fs              cfgsync-git
//! ```
//!
//! All remote I/O goes through the [`RemoteClient`] trait; a
//! [`TenantContext`] value names the tenant every call is made against.
//!
//! # Example
//!
//! ```no_run
//! use cfgsync_core::{PullOptions, PullScope, SyncEngine, TenantContext};
//! use cfgsync_core::remote::HttpRemote;
//! use cfgsync_fs::NormalizedPath;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tenant = TenantContext::new("prod", "https://prod.example.com/api/v1").with_token("secret");
//! let remote = HttpRemote::new(tenant)?;
//! let engine = SyncEngine::new(NormalizedPath::new("."));
//! let report = engine.pull(&remote, PullScope::Workspace(111), PullOptions::default()).await?;
//! println!("{} objects written", report.written.len());
//! # Ok(())
//! # }
//! ```

pub mod baseline;
pub mod compare;
pub mod config;
pub mod copy;
pub mod deploy;
pub mod diff;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod mapping;
pub mod model;
pub mod reference;
pub mod remote;
pub mod report;
pub mod store;
pub mod sync;
pub mod target_ledger;

pub use baseline::{Baseline, BaselineSnapshot, BaselineSource};
pub use compare::{Comparator, ComparisonReport, ObjectComparison};
pub use config::{ConfigResolver, Manifest, ResolvedConfig, TenantContext};
pub use copy::{CopyEngine, CopyReport};
pub use deploy::{DeployAction, DeployEngine, DeployOptions, DeployReport, PlannedDeploy};
pub use diff::{ChangeState, DiffRecord, DiffReport, DiffSummary, FieldChange, StructuralDiff};
pub use error::{Error, Result};
pub use graph::TypeGraph;
pub use ledger::{Ledger, LedgerEntry};
pub use mapping::IdMapping;
pub use model::{ConfigObject, ObjectRef, ObjectType};
pub use remote::{FailureKind, RemoteClient, RemoteError, RetryPolicy};
pub use report::{CreatedItem, ItemFailure, ItemRef, SkippedItem};
pub use store::{CorruptFile, LocalRecord, LocalStore};
pub use sync::{PullOptions, PullReport, PullScope, PushOptions, PushReport, PushStatus, SyncEngine};
pub use target_ledger::TargetLedger;
