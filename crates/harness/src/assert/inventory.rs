use convoy_config::{InstanceId, RetryBudget};
use serde_json::Value;

use super::{AssertionReport, Diagnostic, converge};
use crate::error::{HarnessError, Result};
use crate::extract::{Absence, StateExtractor};

/// Where provisioning leaves its inventory inside an instance.
pub const DEFAULT_INVENTORY_PATH: &str = "/opt/container_artifact/ansible_inventory.json";

/// Reads the provisioning inventory from an instance and checks values at
/// JSON pointers.
#[derive(Debug, Clone)]
pub struct InventoryCheck {
    pub path: String,
    pub expectations: Vec<(String, Value)>,
}

impl Default for InventoryCheck {
    fn default() -> Self {
        Self::new(DEFAULT_INVENTORY_PATH)
    }
}

impl InventoryCheck {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), expectations: Vec::new() }
    }

    pub fn expect(mut self, pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expectations.push((pointer.into(), value.into()));
        self
    }

    pub fn evaluate(&self, doc: &Value) -> std::result::Result<(), Diagnostic> {
        let mismatches: Vec<String> = self
            .expectations
            .iter()
            .filter_map(|(pointer, expected)| match doc.pointer(pointer) {
                Some(actual) if actual == expected => None,
                Some(actual) => Some(format!("{pointer}: expected {expected}, found {actual}")),
                None => Some(format!("{pointer}: expected {expected}, found nothing")),
            })
            .collect();
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(Diagnostic::new(mismatches.join("; ")).with_json(doc.clone()))
        }
    }

    /// The artifact is required; its absence after the extractor's budget is
    /// an error. Values are compared once the document is read.
    pub async fn run(
        &self,
        extractor: &StateExtractor,
        id: &InstanceId,
    ) -> Result<AssertionReport<Value>> {
        let doc = extractor.extract_file(id, &self.path, Absence::Require).await?;
        let doc = doc.unwrap_or(Value::Null);
        let doc = &doc;
        let report = converge("inventory", RetryBudget::once(), move || async move {
            self.evaluate(doc).map(|()| doc.clone())
        })
        .await
        .map_err(HarnessError::from)?;
        Ok(report)
    }
}
