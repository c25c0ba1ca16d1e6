// Test support crate: unwrap/panic are appropriate in test harness code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::new_without_default)]

pub mod api;
pub mod runtime;

pub use api::{MockApi, RecordedRequest};
pub use runtime::{Call, ServiceScript, TestRuntime};
