//! Dictionary Cross-Checker
//!
//! Reconciles attribute usage across every entity type against the single
//! shared attribute dictionary. Keys are compared after alias resolution:
//! an attribute carrying `reference` counts as a use of the referenced entry.

use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::entity::{json_kind, EntityRecord};
use crate::error::{CheckError, Result};
use crate::report::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::suggest;

/// Canonical attribute definitions
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: IndexMap<String, Value>,
    source_path: PathBuf,
}

impl Dictionary {
    /// Decode `{ "attributes": { name: definition, ... } }`
    pub fn from_document(source_path: &Path, doc: &Value) -> Result<Self> {
        let attributes = doc
            .get("attributes")
            .ok_or_else(|| CheckError::malformed(source_path, "'attributes' object not found"))?;
        let map = attributes.as_object().ok_or_else(|| {
            CheckError::malformed(
                source_path,
                format!("'attributes' must be an object, found {}", json_kind(attributes)),
            )
        })?;

        Ok(Self {
            entries: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            source_path: source_path.to_path_buf(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

/// Canonical key → files using it, in first-use order
pub fn attribute_usage<'a>(records: impl IntoIterator<Item = &'a EntityRecord>) -> IndexMap<String, Vec<PathBuf>> {
    let mut usage: IndexMap<String, Vec<PathBuf>> = IndexMap::new();
    for record in records {
        for (key, spec) in &record.attributes {
            let files = usage.entry(spec.canonical_key(key).to_string()).or_default();
            if !files.contains(&record.source_path) {
                files.push(record.source_path.clone());
            }
        }
    }
    usage
}

/// Cross-check own (pre-merge) attribute keys of `records` against `dictionary`
pub fn check_dictionary<'a>(
    records: impl IntoIterator<Item = &'a EntityRecord>,
    dictionary: &Dictionary,
) -> Diagnostics {
    let usage = attribute_usage(records);
    let dict_name = dictionary.source_path.display().to_string();
    let mut diags = Diagnostics::new();

    for key in dictionary.keys() {
        if !usage.contains_key(key) {
            diags.report(
                dict_name.clone(),
                DiagnosticCode::UnusedDictionaryEntry,
                format!("Attribute '{}' in {} is not used in any file", key, dict_name),
            );
        }
    }

    for (key, files) in &usage {
        if dictionary.contains(key) {
            continue;
        }
        let listed: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        let mut item = DiagnosticItem::new(
            key.clone(),
            DiagnosticCode::UndocumentedAttribute,
            format!(
                "Attribute '{}' used in files but not found in {}. Used in: [{}]",
                key,
                dict_name,
                listed.join(", ")
            ),
        );
        if let Some(hint) = suggest::hint(key, dictionary.keys()) {
            item = item.with_context(hint);
        }
        diags.push(item);
    }

    info!(
        "Dictionary check: {} keys in use, {} entries, {} undocumented",
        usage.len(),
        dictionary.len(),
        diags.error_count()
    );
    diags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use serde_json::json;

    fn dictionary(keys: &[&str]) -> Dictionary {
        let attrs: serde_json::Map<String, Value> =
            keys.iter().map(|k| (k.to_string(), json!({ "caption": k }))).collect();
        Dictionary::from_document(Path::new("dictionary.json"), &json!({ "attributes": attrs })).unwrap()
    }

    fn record(entity_type: EntityType, path: &str, attributes: Value) -> EntityRecord {
        EntityRecord::from_document(entity_type, Path::new(path), &json!({ "name": "n", "attributes": attributes }))
            .unwrap()
    }

    #[test]
    fn test_undocumented_attribute_names_file_and_key() {
        let records = vec![record(EntityType::Object, "objects/record.json", json!({ "name": {}, "z": {} }))];
        let diags = check_dictionary(&records, &dictionary(&["name"]));

        assert!(diags.has_errors());
        let errors: Vec<_> = diags.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'z'"));
        assert!(errors[0].message.contains("objects/record.json"));
    }

    #[test]
    fn test_unused_entry_is_a_warning() {
        let records = vec![record(EntityType::Skill, "skills/a.json", json!({ "name": {} }))];
        let diags = check_dictionary(&records, &dictionary(&["name", "version"]));

        assert!(!diags.has_errors());
        let warnings: Vec<_> = diags.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("'version'"));
    }

    #[test]
    fn test_reference_resolves_to_canonical_key() {
        let records = vec![record(
            EntityType::Skill,
            "skills/a.json",
            json!({ "skill_id": { "reference": "id" } }),
        )];
        let diags = check_dictionary(&records, &dictionary(&["id"]));
        assert!(diags.is_empty());

        // the local key alone does not count as a use
        let diags = check_dictionary(&records, &dictionary(&["id", "skill_id"]));
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.warnings().next().unwrap().message.contains("'skill_id'"));
    }

    #[test]
    fn test_usage_spans_entity_types() {
        let records = vec![
            record(EntityType::Skill, "skills/a.json", json!({ "shared": {} })),
            record(EntityType::Module, "modules/m.json", json!({ "shared": {} })),
        ];
        let usage = attribute_usage(&records);
        assert_eq!(
            usage["shared"],
            vec![PathBuf::from("skills/a.json"), PathBuf::from("modules/m.json")]
        );
    }

    #[test]
    fn test_suggestion_for_typo() {
        let records = vec![record(EntityType::Object, "objects/o.json", json!({ "descriptin": {} }))];
        let diags = check_dictionary(&records, &dictionary(&["description", "name"]));
        let error = diags.errors().next().unwrap();
        assert_eq!(error.context, vec!["did you mean 'description'?"]);
    }

    #[test]
    fn test_missing_attributes_object_is_structural() {
        let err = Dictionary::from_document(Path::new("dictionary.json"), &json!({ "types": {} })).unwrap_err();
        assert!(matches!(err, CheckError::MalformedDocument { .. }));
    }
}
