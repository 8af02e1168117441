//! Terraform state snapshot used to decide whether a directive has taken effect.
//!
//! Parses tfstate v4 files and indexes every resource instance by address.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Read-only view over applied infrastructure.
///
/// `lookup` returns `Value::Null` when nothing lives at the address.
pub trait StateView {
    fn list(&self) -> Result<Vec<String>>;
    fn lookup(&self, address: &str) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct RawState {
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(rename = "type")]
    type_: String,
    name: String,
    #[serde(default)]
    instances: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    #[serde(default)]
    index_key: Option<Value>,
    #[serde(default)]
    attributes: Value,
}

#[derive(Debug, Clone)]
struct Instance {
    address: String,
    resource: String,
    attributes: Value,
}

#[derive(Debug, Clone, Default)]
pub struct TfState {
    instances: Vec<Instance>,
}

impl TfState {
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawState = serde_json::from_slice(data)?;

        if let Some(version) = raw.version.filter(|v| *v != 4) {
            tracing::warn!(version, "unexpected tfstate format version");
        }

        let mut instances = Vec::new();
        for resource in raw.resources {
            let mut prefix = String::new();
            if let Some(module) = resource.module.as_deref().filter(|m| !m.is_empty()) {
                prefix.push_str(module);
                prefix.push('.');
            }
            if resource.mode.as_deref() == Some("data") {
                prefix.push_str("data.");
            }
            let resource_address = format!("{}{}.{}", prefix, resource.type_, resource.name);

            for instance in resource.instances {
                let address = match &instance.index_key {
                    Some(Value::String(key)) => format!("{}[\"{}\"]", resource_address, key),
                    Some(Value::Number(index)) => format!("{}[{}]", resource_address, index),
                    _ => resource_address.clone(),
                };
                instances.push(Instance {
                    address,
                    resource: resource_address.clone(),
                    attributes: instance.attributes,
                });
            }
        }

        Ok(Self { instances })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl StateView for TfState {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.instances.iter().map(|i| i.address.clone()).collect())
    }

    fn lookup(&self, address: &str) -> Result<Value> {
        if let Some(instance) = self.instances.iter().find(|i| i.address == address) {
            return Ok(instance.attributes.clone());
        }

        let matches: Vec<Value> = self
            .instances
            .iter()
            .filter(|i| i.resource == address)
            .map(|i| i.attributes.clone())
            .collect();

        if matches.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(Value::Array(matches))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = r#"{
        "version": 4,
        "terraform_version": "1.9.0",
        "resources": [
            {
                "mode": "managed",
                "type": "aws_instance",
                "name": "web",
                "instances": [
                    {"index_key": 0, "attributes": {"id": "i-0"}},
                    {"index_key": 1, "attributes": {"id": "i-1"}}
                ]
            },
            {
                "module": "module.foo[\"piyo\"]",
                "mode": "managed",
                "type": "null_resource",
                "name": "this",
                "instances": [{"attributes": {"id": "42"}}]
            },
            {
                "mode": "data",
                "type": "aws_caller_identity",
                "name": "current",
                "instances": [{"attributes": {"account_id": "123"}}]
            }
        ]
    }"#;

    fn state() -> TfState {
        TfState::from_slice(STATE.as_bytes()).unwrap()
    }

    #[test]
    fn test_list_builds_instance_addresses() {
        let names = state().list().unwrap();
        assert_eq!(
            names,
            vec![
                "aws_instance.web[0]",
                "aws_instance.web[1]",
                r#"module.foo["piyo"].null_resource.this"#,
                "data.aws_caller_identity.current",
            ]
        );
    }

    #[test]
    fn test_lookup_exact_instance() {
        let attrs = state().lookup("aws_instance.web[1]").unwrap();
        assert_eq!(attrs["id"], "i-1");
    }

    #[test]
    fn test_lookup_module_resource() {
        let attrs = state()
            .lookup(r#"module.foo["piyo"].null_resource.this"#)
            .unwrap();
        assert_eq!(attrs["id"], "42");
    }

    #[test]
    fn test_lookup_resource_without_index_returns_all_instances() {
        let attrs = state().lookup("aws_instance.web").unwrap();
        assert_eq!(attrs.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_lookup_missing_is_null() {
        assert_eq!(state().lookup("aws_instance.db").unwrap(), Value::Null);
        assert_eq!(state().lookup("module.foo").unwrap(), Value::Null);
    }

    #[test]
    fn test_empty_state() {
        let state = TfState::from_slice(br#"{"version": 4, "resources": []}"#).unwrap();
        assert!(state.is_empty());
        assert!(state.list().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(TfState::from_slice(b"not json").is_err());
    }
}
