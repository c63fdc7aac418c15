//! Entity types and definition records
//!
//! An entity document looks like:
//!
//! ```json
//! {
//!   "name": "natural_language_processing",
//!   "caption": "Natural Language Processing",
//!   "extends": "base_skill",
//!   "category": "nlp",
//!   "attributes": { "name": { "requirement": "required" } }
//! }
//! ```
//!
//! `extends` may also be a list of parent names, and `attributes` may be a
//! list of single-key objects. Both shapes are normalized here so nothing
//! downstream branches on the original encoding.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CheckError, Result};

/// Independent inheritance domains. No entity inherits across types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Object,
    Skill,
    Domain,
    Module,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Object,
        EntityType::Skill,
        EntityType::Domain,
        EntityType::Module,
    ];

    /// Directory holding this type's documents, relative to the corpus root
    pub fn dir_name(&self) -> &'static str {
        match self {
            EntityType::Object => "objects",
            EntityType::Skill => "skills",
            EntityType::Domain => "domains",
            EntityType::Module => "modules",
        }
    }

    /// Companion document whose attribute keys are the allowed categories
    pub fn category_file(&self) -> Option<&'static str> {
        match self {
            EntityType::Object => None,
            EntityType::Skill => Some("skill_categories.json"),
            EntityType::Domain => Some("domain_categories.json"),
            EntityType::Module => Some("module_categories.json"),
        }
    }

    /// Meta-schema constraining documents of this type
    pub fn metaschema_file(&self) -> &'static str {
        match self {
            EntityType::Object => "object.schema.json",
            EntityType::Skill | EntityType::Domain | EntityType::Module => "class.schema.json",
        }
    }

    /// Built-in name that terminates inheritance chains
    pub fn default_sentinel_root(&self) -> Option<&'static str> {
        match self {
            EntityType::Object => None,
            EntityType::Skill => Some("base_skill"),
            EntityType::Domain => Some("base_domain"),
            EntityType::Module => Some("base_module"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Object => "object",
            EntityType::Skill => "skill",
            EntityType::Domain => "domain",
            EntityType::Module => "module",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CheckError;

    /// Accepts both the singular type name and the directory name
    fn from_str(s: &str) -> Result<Self> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.dir_name() == s)
            .ok_or_else(|| CheckError::UnknownEntityType(s.to_string()))
    }
}

/// One attribute declaration on an entity
///
/// Every field is optional: a child entity may restate only the fields it
/// overrides (typically `requirement`) and inherit the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
    /// Canonical dictionary key this attribute aliases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Any other keys (type, enum, ...), kept in document order
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl AttributeSpec {
    /// Dictionary key for an attribute declared locally as `local_key`
    pub fn canonical_key<'a>(&'a self, local_key: &'a str) -> &'a str {
        match self.reference.as_deref() {
            Some(r) if !r.is_empty() => r,
            _ => local_key,
        }
    }

    /// Overlay `other` on top of `self`; fields present in `other` win
    pub fn overlay(&mut self, other: &AttributeSpec) {
        if other.caption.is_some() {
            self.caption = other.caption.clone();
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.requirement.is_some() {
            self.requirement = other.requirement.clone();
        }
        if other.reference.is_some() {
            self.reference = other.reference.clone();
        }
        for (k, v) in &other.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }
}

/// Ordered attribute-name to spec mapping
pub type AttributeMap = IndexMap<String, AttributeSpec>;

/// A decoded entity document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: EntityType,
    /// `None` when the document has no usable name; such records are skipped
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parent names in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    /// Raw category value; validity is checked by the category validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    pub attributes: AttributeMap,
    /// Path relative to the corpus root
    pub source_path: PathBuf,
}

impl EntityRecord {
    /// Decode one entity document
    pub fn from_document(entity_type: EntityType, source_path: &Path, doc: &Value) -> Result<Self> {
        let obj = doc
            .as_object()
            .ok_or_else(|| CheckError::malformed(source_path, "document is not a JSON object"))?;

        let name = match obj.get("name") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(CheckError::malformed(
                    source_path,
                    format!("'name' must be a string, found {}", json_kind(other)),
                ))
            }
        };

        let extends = match obj.get("extends") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => {
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s.clone()]
                }
            }
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Some(other) => {
                return Err(CheckError::malformed(
                    source_path,
                    format!("'extends' must be a string or a list of strings, found {}", json_kind(other)),
                ))
            }
        };

        let attributes = match obj.get("attributes") {
            None | Some(Value::Null) => AttributeMap::new(),
            Some(v) => normalize_attributes(v)
                .map_err(|reason| CheckError::malformed(source_path, reason))?,
        };

        Ok(Self {
            entity_type,
            name,
            caption: string_field(obj, "caption"),
            description: string_field(obj, "description"),
            extends,
            category: obj.get("category").filter(|v| !v.is_null()).cloned(),
            attributes,
            source_path: source_path.to_path_buf(),
        })
    }

    /// Name for diagnostics, falling back to the file path
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.source_path.display().to_string())
    }
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

/// Normalize either `{name: spec, ...}` or `[{name: spec}, ...]` into one
/// ordered map. Later duplicates overlay earlier ones.
pub fn normalize_attributes(value: &Value) -> std::result::Result<AttributeMap, String> {
    let mut out = AttributeMap::new();
    match value {
        Value::Object(map) => {
            for (key, spec) in map {
                insert_attribute(&mut out, key, spec)?;
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let entry = item
                    .as_object()
                    .filter(|m| m.len() == 1)
                    .ok_or_else(|| format!("attributes[{}] must be an object with exactly one key", i))?;
                for (key, spec) in entry {
                    insert_attribute(&mut out, key, spec)?;
                }
            }
        }
        other => {
            return Err(format!(
                "'attributes' must be an object or a list, found {}",
                json_kind(other)
            ))
        }
    }
    Ok(out)
}

fn insert_attribute(out: &mut AttributeMap, key: &str, spec: &Value) -> std::result::Result<(), String> {
    let parsed: AttributeSpec = match spec {
        Value::Null => AttributeSpec::default(),
        Value::Object(_) => serde_json::from_value(spec.clone())
            .map_err(|e| format!("attribute '{}': {}", key, e))?,
        other => {
            return Err(format!(
                "attribute '{}' must be an object, found {}",
                key,
                json_kind(other)
            ))
        }
    };
    match out.get_mut(key) {
        Some(existing) => existing.overlay(&parsed),
        None => {
            out.insert(key.to_string(), parsed);
        }
    }
    Ok(())
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(doc: Value) -> Result<EntityRecord> {
        EntityRecord::from_document(EntityType::Skill, Path::new("skills/x.json"), &doc)
    }

    #[test]
    fn test_entity_type_from_str() {
        assert_eq!("skill".parse::<EntityType>().unwrap(), EntityType::Skill);
        assert_eq!("objects".parse::<EntityType>().unwrap(), EntityType::Object);
        assert!("profile".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_keyed_and_listed_attributes_normalize_alike() {
        let keyed = parse(json!({
            "name": "a",
            "attributes": {
                "x": { "caption": "X", "requirement": "required" },
                "y": { "caption": "Y" }
            }
        }))
        .unwrap();
        let listed = parse(json!({
            "name": "a",
            "attributes": [
                { "x": { "caption": "X", "requirement": "required" } },
                { "y": { "caption": "Y" } }
            ]
        }))
        .unwrap();

        assert_eq!(keyed.attributes, listed.attributes);
        assert_eq!(keyed.attributes.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_extends_string_or_list() {
        let single = parse(json!({ "name": "a", "extends": "base_skill" })).unwrap();
        assert_eq!(single.extends, vec!["base_skill"]);

        let multi = parse(json!({ "name": "a", "extends": ["p", "", "q"] })).unwrap();
        assert_eq!(multi.extends, vec!["p", "q"]);

        let empty = parse(json!({ "name": "a", "extends": "" })).unwrap();
        assert!(empty.extends.is_empty());
    }

    #[test]
    fn test_missing_name_is_not_fatal() {
        let record = parse(json!({ "caption": "Nameless" })).unwrap();
        assert!(record.name.is_none());
        assert_eq!(record.display_name(), "skills/x.json");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse(json!([1, 2])).is_err());
        assert!(parse(json!({ "name": 7 })).is_err());
        assert!(parse(json!({ "name": "a", "extends": 3 })).is_err());
        assert!(parse(json!({ "name": "a", "attributes": "x" })).is_err());
        assert!(parse(json!({ "name": "a", "attributes": [{ "x": {}, "y": {} }] })).is_err());
    }

    #[test]
    fn test_reference_and_extra_fields() {
        let record = parse(json!({
            "name": "a",
            "attributes": {
                "skill_id": { "reference": "id", "type": "integer_t" }
            }
        }))
        .unwrap();
        let spec = &record.attributes["skill_id"];
        assert_eq!(spec.canonical_key("skill_id"), "id");
        assert_eq!(spec.extra["type"], json!("integer_t"));
    }

    #[test]
    fn test_overlay_is_field_wise() {
        let mut base = AttributeSpec {
            caption: Some("Name".into()),
            description: Some("The name".into()),
            requirement: Some("optional".into()),
            ..Default::default()
        };
        let child = AttributeSpec {
            requirement: Some("required".into()),
            ..Default::default()
        };
        base.overlay(&child);
        assert_eq!(base.caption.as_deref(), Some("Name"));
        assert_eq!(base.requirement.as_deref(), Some("required"));
    }
}
