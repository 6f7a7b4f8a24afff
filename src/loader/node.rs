//! Parsed YAML tree with source locations on every mapping

use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a mapping node started in its source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Ordered string-keyed mapping that remembers where it was declared.
///
/// Mappings synthesized by the resolver (for example the single role
/// reference built for a role entry point) have no location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: IndexMap<String, Node>,
    location: Option<SourceLocation>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn located(location: SourceLocation) -> Self {
        Self {
            entries: IndexMap::new(),
            location: Some(location),
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    pub fn line(&self) -> Option<usize> {
        self.location.as_ref().map(|l| l.line)
    }

    pub fn set_location(&mut self, location: Option<SourceLocation>) {
        self.location = location;
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Node::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces a value, keeping the original key position on
    /// replacement.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        self.entries.insert(key.into(), value)
    }

    /// Removes a key while preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.entries.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> IndexMap<String, Node> {
        self.entries
    }

    pub fn entries(&self) -> &IndexMap<String, Node> {
        &self.entries
    }
}

impl FromIterator<(String, Node)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (String, Node)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            location: None,
        }
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Node);
    type IntoIter = indexmap::map::IntoIter<String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A single YAML value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Node>),
    Mapping(Mapping),
}

impl Node {
    /// Key under which a mapping's line number is exposed when serialized.
    pub const LINE_KEY: &'static str = "__line__";
    /// Key under which a mapping's origin file is exposed when serialized.
    pub const FILE_KEY: &'static str = "__file__";

    pub fn string(value: impl Into<String>) -> Self {
        Node::String(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Renders a scalar the way it would appear in a `key=value` string.
    /// Collections have no scalar form.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Node::Null => Some(String::new()),
            Node::Bool(b) => Some(b.to_string()),
            Node::Int(i) => Some(i.to_string()),
            Node::Float(f) => Some(f.to_string()),
            Node::String(s) => Some(s.clone()),
            Node::Sequence(_) | Node::Mapping(_) => None,
        }
    }

    /// Returns the origin file of the nearest located mapping, if any.
    pub fn origin(&self) -> Option<&Path> {
        match self {
            Node::Mapping(m) => m.location().map(|l| l.file.as_path()),
            Node::Sequence(items) => items.iter().find_map(Node::origin),
            _ => None,
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::String(value)
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Node::Mapping(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::Sequence(value)
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = if self.location.is_some() { 2 } else { 0 };
        let mut map = serializer.serialize_map(Some(self.entries.len() + extra))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        if let Some(location) = &self.location {
            map.serialize_entry(Node::LINE_KEY, &location.line)?;
            map.serialize_entry(Node::FILE_KEY, &location.file)?;
        }
        map.end()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Int(i) => serializer.serialize_i64(*i),
            Node::Float(f) => serializer.serialize_f64(*f),
            Node::String(s) => serializer.serialize_str(s),
            Node::Sequence(items) => items.serialize(serializer),
            Node::Mapping(m) => m.serialize(serializer),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Sequence(_) | Node::Mapping(_) => match serde_json::to_string(self) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str("<unprintable>"),
            },
            scalar => f.write_str(&scalar.scalar_text().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_preserves_order() {
        let mut mapping: Mapping = vec![
            ("a".to_string(), Node::Int(1)),
            ("b".to_string(), Node::Int(2)),
            ("c".to_string(), Node::Int(3)),
        ]
        .into_iter()
        .collect();

        mapping.remove("b");
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_serialize_exposes_location_keys() {
        let mut mapping = Mapping::located(SourceLocation::new("site.yml", 3));
        mapping.insert("name", Node::from("web"));

        let json = serde_json::to_value(Node::Mapping(mapping)).unwrap();
        assert_eq!(json["name"], "web");
        assert_eq!(json[Node::LINE_KEY], 3);
        assert_eq!(json[Node::FILE_KEY], "site.yml");
    }
}
