//! Administrative operations sent to the embedded server.
//!
//! Requests use the management model's JSON shape: the operation name, an
//! address as a list of single-pair objects, and parameters as top-level
//! keys. Attachments are passed as absolute file paths.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Attribute naming the server product version.
pub const PRODUCT_VERSION: &str = "product-version";
/// Attribute naming the cumulative patch currently applied.
pub const CUMULATIVE_PATCH_ID: &str = "cumulative-patch-id";
/// Cumulative patch id of an installation with no patches.
pub const BASE_PATCH_ID: &str = "base";

/// An immutable management request.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    address: Vec<(String, String)>,
    parameters: Vec<(String, Value)>,
    attachments: Vec<PathBuf>,
}

impl Operation {
    /// A complete request in one step.
    pub fn new(
        name: &str,
        address: &[(&str, &str)],
        parameters: Vec<(&str, Value)>,
        attachments: Vec<PathBuf>,
    ) -> Self {
        Operation {
            name: name.to_string(),
            address: address
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            parameters: parameters
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            attachments,
        }
    }

    /// `read-attribute(name=<attribute>)` at the root address.
    pub fn read_product_version() -> Self {
        Self::new(
            "read-attribute",
            &[],
            vec![("name", Value::from(PRODUCT_VERSION))],
            Vec::new(),
        )
    }

    /// `read-attribute(name=cumulative-patch-id)` on the patching service.
    pub fn read_cumulative_patch_id() -> Self {
        Self::new(
            "read-attribute",
            &[("core-service", "patching")],
            vec![("name", Value::from(CUMULATIVE_PATCH_ID))],
            Vec::new(),
        )
    }

    /// Apply the patch at `patch_path` without overriding any modules.
    pub fn patch(patch_path: &Path) -> Self {
        Self::new(
            "patch",
            &[("core-service", "patching")],
            vec![
                ("override-modules", Value::from(false)),
                ("override-all", Value::from(false)),
                ("input-stream-index", Value::from(0)),
            ],
            vec![patch_path.to_path_buf()],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &[(String, String)] {
        &self.address
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// Wire form of the request.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("operation".to_string(), Value::String(self.name.clone()));
        let address: Vec<Value> = self
            .address
            .iter()
            .map(|(k, v)| {
                let mut element = Map::new();
                element.insert(k.clone(), Value::String(v.clone()));
                Value::Object(element)
            })
            .collect();
        obj.insert("address".to_string(), Value::Array(address));
        for (key, value) in &self.parameters {
            obj.insert(key.clone(), value.clone());
        }
        if !self.attachments.is_empty() {
            let paths: Vec<Value> = self
                .attachments
                .iter()
                .map(|p| Value::String(p.display().to_string()))
                .collect();
            obj.insert("attachments".to_string(), Value::Array(paths));
        }
        Value::Object(obj)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let address: Vec<String> = self
            .address
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "/{}:{}({})", address.join("/"), self.name, params.join(","))
    }
}

/// Outcome reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Response to one [`Operation`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    pub outcome: Outcome,
    #[serde(default)]
    pub result: Value,
    #[serde(rename = "failure-description", default)]
    pub failure_description: Option<Value>,
}

impl Response {
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            outcome: Outcome::Success,
            result: result.into(),
            failure_description: None,
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            result: Value::Null,
            failure_description: Some(Value::String(description.into())),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Failure description as text; strings are returned without quotes.
    pub fn failure_text(&self) -> String {
        match &self.failure_description {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "no failure description".to_string(),
        }
    }

    /// Result as text; strings are returned without quotes.
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
