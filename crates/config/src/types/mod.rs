mod harness;
mod instance;
mod manifest;
mod topology;

pub use harness::{
    Credentials, HarnessConfig, HttpConfig, ReadinessConfig, RetryBudget, TlsVerify,
};
pub use instance::{Health, Instance, InstanceId, InstanceState, Role};
pub use manifest::{RawInstanceDef, RawTopology};
pub use topology::{InstanceDef, TopologyDef};
