use std::collections::HashMap;

/// Forward-compatible bag for wire fields this crate does not model yet.
///
/// Every wire struct in `dialect::*::wire` flattens one of these into its
/// serde representation so that round-tripping a request/response through
/// this crate never silently drops fields a provider added after this crate
/// was written.
#[derive(Default, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnknownFields(HashMap<String, serde_json::Value>);

impl UnknownFields {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }
}
