use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw HCL-deserialized topology manifest. Strings for roles/durations — not yet validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawTopology {
    #[serde(default)]
    pub compose: String,
    #[serde(default)]
    pub readiness_timeout: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub instance: HashMap<String, RawInstanceDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawInstanceDef {
    pub role: String,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}
