//! Extension URL rewriting.

use serde_json::{Map, Value};

/// Ordered source URL to target URL table for extensions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionUrlMap {
    entries: Vec<(String, String)>,
}

impl ExtensionUrlMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_static(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(source, target)| (source.to_string(), target.to_string()))
                .collect(),
        }
    }

    /// Append a mapping. Earlier entries take precedence on duplicate sources.
    pub fn with(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries.push((source.into(), target.into()));
        self
    }

    pub fn push(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.entries.push((source.into(), target.into()));
    }

    pub fn lookup(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(source, _)| source == url)
            .map(|(_, target)| target.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rewrite the `url` of every mapped extension, keeping order and every other
/// key. An absent list stays absent.
pub fn rewrite_extensions(extensions: Option<&Value>, urls: &ExtensionUrlMap) -> Option<Vec<Value>> {
    let extensions = extensions?.as_array()?;

    Some(
        extensions
            .iter()
            .map(|extension| {
                let mut extension = extension.clone();
                if let Some(map) = extension.as_object_mut() {
                    let target = map
                        .get("url")
                        .and_then(Value::as_str)
                        .and_then(|url| urls.lookup(url))
                        .map(str::to_string);
                    if let Some(target) = target {
                        tracing::debug!(url = %target, "rewrote extension url");
                        map.insert("url".to_string(), Value::String(target));
                    }
                }
                extension
            })
            .collect(),
    )
}

/// First extension in `extensions` with exactly the given url
pub fn find_extension<'a>(extensions: Option<&'a Value>, url: &str) -> Option<&'a Map<String, Value>> {
    extensions?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .find(|extension| extension.get("url").and_then(Value::as_str) == Some(url))
}

/// The `value[x]` of an extension, whatever its type suffix
pub fn extension_value(extension: &Map<String, Value>) -> Option<&Value> {
    extension
        .iter()
        .find(|(key, _)| key.starts_with("value"))
        .map(|(_, value)| value)
}

/// Build `{url, value<kind>: value}`
pub fn extension(url: &str, kind: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert("url".to_string(), Value::String(url.to_string()));
    map.insert(format!("value{kind}"), value);
    Value::Object(map)
}

/// Build a complex extension wrapping sub-extensions
pub fn complex_extension(url: &str, children: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert("url".to_string(), Value::String(url.to_string()));
    map.insert("extension".to_string(), Value::Array(children));
    Value::Object(map)
}
