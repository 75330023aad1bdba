use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::BootstrapError;

/// Previously saved settings, stored as `~/.kdk/<name>/config.yaml`.
///
/// The schema is open: collaborators pick the keys they own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedConfig {
    entries: BTreeMap<String, Value>,
}

impl PersistedConfig {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Walk nested mappings with a dotted key such as `app.image`.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let first = self.entries.get(parts.next()?)?;
        parts.try_fold(first, |value, part| value.as_mapping()?.get(part))
    }

    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }
}

/// Strict parse: anything but an empty document or a mapping is an error.
pub(crate) fn parse_yaml_str(content: &str) -> Result<PersistedConfig, String> {
    if content.trim().is_empty() {
        return Ok(PersistedConfig::default());
    }

    let document: Value = serde_yaml::from_str(content).map_err(|err| err.to_string())?;
    match document {
        Value::Null => Ok(PersistedConfig::default()),
        Value::Mapping(mapping) => {
            let mut entries = BTreeMap::new();
            for (key, value) in mapping {
                entries.insert(key_to_string(&key)?, value);
            }
            Ok(PersistedConfig { entries })
        }
        other => Err(format!(
            "expected a mapping at the top level, found {}",
            kind_of(&other)
        )),
    }
}

fn key_to_string(key: &Value) -> Result<String, String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(format!("unsupported {} used as a key", kind_of(other))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Result of the lenient read done while registering the file layer.
#[derive(Debug)]
pub enum FileSource {
    Loaded(PersistedConfig),
    Absent,
    Unusable(String),
}

/// Read the config file for the settings layer. Never fails; problems are
/// reported back so the caller can warn and carry on.
pub fn read_file_source(path: &Path) -> FileSource {
    match fs::read_to_string(path) {
        Ok(content) => match parse_yaml_str(&content) {
            Ok(config) => FileSource::Loaded(config),
            Err(reason) => FileSource::Unusable(reason),
        },
        Err(err) if err.kind() == ErrorKind::NotFound => FileSource::Absent,
        Err(err) => FileSource::Unusable(err.to_string()),
    }
}

/// Load the persisted config. A missing file yields the empty config; a file
/// that is present but unreadable or unparsable is fatal.
pub fn load_persisted_config(path: &Path) -> Result<PersistedConfig, BootstrapError> {
    if !path.exists() {
        return Ok(PersistedConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| BootstrapError::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    parse_yaml_str(&content).map_err(|reason| BootstrapError::ConfigCorrupt {
        path: path.to_path_buf(),
        reason,
    })
}
