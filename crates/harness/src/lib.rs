#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! Bring up docker-compose topologies of a clustered service, wait for them
//! to provision, and assert that the cluster converges on the expected state.

pub mod assert;
pub mod client;
mod error;
pub mod extract;
mod fixtures;
pub mod lifecycle;
pub mod logging;
mod project;
pub mod readiness;

pub use assert::{
    AssertionError, AssertionReport, CrossNodeSearch, Diagnostic, InventoryCheck, Member,
    MembershipCheck, ReplicationCheck, ReplicationFactors, SearchOutcome,
};
pub use client::{HttpError, Method, RequestOptions, Response, RetryingClient};
pub use error::{ErrorKind, HarnessError, Result};
pub use extract::{Absence, ExtractError, StateExtractor};
pub use fixtures::{CertificatePaths, Fixtures};
pub use lifecycle::{
    MANAGEMENT_PORT, PreparedTopology, RunningTopology, TeardownReport, Topology, TopologyManager,
};
pub use logging::init_test_logging;
pub use project::ProjectId;
pub use readiness::{PollAttempt, PollOutcome, PollState, ReadinessPoller, ReadinessProbe};

pub use convoy_config::{HarnessConfig, Role, TopologyDef};
