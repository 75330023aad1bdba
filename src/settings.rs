use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::config::PersistedConfig;
use crate::utils::env::Environment;

/// Prefix for environment overrides, matched case-insensitively.
pub const ENV_PREFIX: &str = "KDK_";

/// Where a layer's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Flags,
    Environment,
    File,
    Defaults,
}

#[derive(Debug, Clone)]
struct Layer {
    source: Source,
    values: BTreeMap<String, Value>,
}

impl Layer {
    fn lookup(&self, key: &str) -> Option<&Value> {
        match self.source {
            // Env keys are flat: `app.image` is KDK_APP_IMAGE.
            Source::Environment => self.values.get(&key.replace('.', "_")),
            _ => {
                let mut parts = key.split('.');
                let first = self.values.get(parts.next()?)?;
                parts.try_fold(first, |value, part| value.as_mapping()?.get(part))
            }
        }
    }
}

/// Layered configuration, queried in fixed precedence order:
/// flags, then environment, then the config file, then built-in defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    layers: Vec<Layer>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Settings holding only the built-in defaults.
    pub fn new() -> Self {
        let defaults = [
            ("json".to_string(), Value::Bool(false)),
            ("verbose".to_string(), Value::Bool(false)),
        ];
        let mut settings = Self { layers: Vec::new() };
        settings.set_layer(Source::Defaults, defaults.into_iter().collect());
        settings
    }

    /// Replace the layer for `source`, keeping the precedence order intact.
    fn set_layer(&mut self, source: Source, values: BTreeMap<String, Value>) {
        self.layers.retain(|layer| layer.source != source);
        let position = self
            .layers
            .iter()
            .position(|layer| rank(layer.source) > rank(source))
            .unwrap_or(self.layers.len());
        self.layers.insert(position, Layer { source, values });
    }

    pub fn with_flags(mut self, flags: BTreeMap<String, Value>) -> Self {
        self.set_layer(Source::Flags, flags);
        self
    }

    pub fn with_environment(mut self, env: &dyn Environment) -> Self {
        self.set_layer(Source::Environment, env_layer(env));
        self
    }

    pub fn with_file(mut self, config: &PersistedConfig) -> Self {
        self.set_layer(Source::File, config.entries().clone());
        self
    }

    /// First value found for `key`, and the layer it came from.
    pub fn get_with_source(&self, key: &str) -> Option<(&Value, Source)> {
        self.layers
            .iter()
            .find_map(|layer| layer.lookup(key).map(|value| (value, layer.source)))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.get_with_source(key).map(|(value, _)| value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Boolean view of `key`; unset or unparsable values read as false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(value) => coerce_bool(value).unwrap_or_else(|| {
                tracing::debug!(key, value = ?value, "setting is not a boolean, treating as false");
                false
            }),
            None => false,
        }
    }

    #[cfg(test)]
    fn sources(&self) -> Vec<Source> {
        self.layers.iter().map(|layer| layer.source).collect()
    }
}

fn rank(source: Source) -> u8 {
    match source {
        Source::Flags => 0,
        Source::Environment => 1,
        Source::File => 2,
        Source::Defaults => 3,
    }
}

fn env_layer(env: &dyn Environment) -> BTreeMap<String, Value> {
    // key -> (value, whether it came from an all-uppercase name)
    let mut found: BTreeMap<String, (Value, bool)> = BTreeMap::new();
    for (name, value) in env.vars() {
        let Some(prefix) = name.get(..ENV_PREFIX.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(ENV_PREFIX) {
            continue;
        }
        let key = name[ENV_PREFIX.len()..].to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        let canonical = name == name.to_ascii_uppercase();
        // Only the all-uppercase spelling may displace another casing.
        if let Some((_, existing_canonical)) = found.get(&key) {
            if *existing_canonical || !canonical {
                continue;
            }
        }
        found.insert(key, (Value::String(value), canonical));
    }
    found
        .into_iter()
        .map(|(key, (value, _))| (key, value))
        .collect()
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i != 0)
            .or_else(|| n.as_f64().map(|f| f != 0.0)),
        Value::String(s) => parse_bool(s),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
