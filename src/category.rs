//! Category Validator

use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::entity::{json_kind, normalize_attributes, EntityRecord, EntityType};
use crate::error::{CheckError, Result};
use crate::report::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::suggest;

/// Always accepted, whatever the companion document lists
pub const OTHER_CATEGORY: &str = "other";

/// Allowed `category` values for one entity type
#[derive(Debug, Clone)]
pub struct CategoryEnumeration {
    pub entity_type: EntityType,
    allowed: BTreeSet<String>,
    source_path: PathBuf,
}

impl CategoryEnumeration {
    /// The attribute keys of a companion document, plus `other`
    pub fn from_document(entity_type: EntityType, source_path: &Path, doc: &Value) -> Result<Self> {
        let mut allowed = BTreeSet::new();
        allowed.insert(OTHER_CATEGORY.to_string());

        match doc.get("attributes") {
            None | Some(Value::Null) => {}
            Some(attrs) => {
                let attrs =
                    normalize_attributes(attrs).map_err(|reason| CheckError::malformed(source_path, reason))?;
                allowed.extend(attrs.into_keys());
            }
        }

        Ok(Self {
            entity_type,
            allowed,
            source_path: source_path.to_path_buf(),
        })
    }

    pub fn contains(&self, category: &str) -> bool {
        self.allowed.contains(category)
    }

    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

/// Check each record's optional `category` against `enumeration`
pub fn check_categories<'a>(
    records: impl IntoIterator<Item = &'a EntityRecord>,
    enumeration: &CategoryEnumeration,
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let mut checked = 0usize;

    for record in records {
        let Some(category) = &record.category else { continue };
        checked += 1;
        let file = record.source_path.display().to_string();

        let Some(value) = category.as_str() else {
            diags.report(
                file.clone(),
                DiagnosticCode::NonStringCategory,
                format!(
                    "'category' field in {} is not a string (found {})",
                    file,
                    json_kind(category)
                ),
            );
            continue;
        };

        if enumeration.contains(value) {
            continue;
        }
        let mut item = DiagnosticItem::new(
            file.clone(),
            DiagnosticCode::UnknownCategory,
            format!(
                "'category' value '{}' in file {} is not allowed by {}",
                value,
                file,
                enumeration.source_path.display()
            ),
        );
        if let Some(hint) = suggest::hint(value, enumeration.allowed()) {
            item = item.with_context(hint);
        }
        diags.push(item);
    }

    debug!(
        "Checked {} {} categories, {} invalid",
        checked,
        enumeration.entity_type,
        diags.len()
    );
    diags
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enumeration() -> CategoryEnumeration {
        CategoryEnumeration::from_document(
            EntityType::Skill,
            Path::new("skill_categories.json"),
            &json!({ "attributes": { "nlp": { "caption": "NLP" }, "vision": {} } }),
        )
        .unwrap()
    }

    fn record(path: &str, category: Value) -> EntityRecord {
        EntityRecord::from_document(
            EntityType::Skill,
            Path::new(path),
            &json!({ "name": path, "category": category }),
        )
        .unwrap()
    }

    #[test]
    fn test_enumeration_includes_other() {
        let cats = enumeration();
        assert_eq!(cats.allowed().collect::<Vec<_>>(), vec!["nlp", "other", "vision"]);
    }

    #[test]
    fn test_valid_and_absent_categories_pass() {
        let records = vec![
            record("skills/a.json", json!("nlp")),
            record("skills/b.json", json!("other")),
            record("skills/c.json", Value::Null),
        ];
        assert!(check_categories(&records, &enumeration()).is_empty());
    }

    #[test]
    fn test_non_string_category_reports_once() {
        let records = vec![record("skills/a.json", json!(3))];
        let diags = check_categories(&records, &enumeration());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.all()[0].code, DiagnosticCode::NonStringCategory);
    }

    #[test]
    fn test_unknown_category() {
        let records = vec![record("skills/a.json", json!("visoin"))];
        let diags = check_categories(&records, &enumeration());
        assert_eq!(diags.error_count(), 1);
        let item = &diags.all()[0];
        assert_eq!(item.code, DiagnosticCode::UnknownCategory);
        assert!(item.message.contains("skill_categories.json"));
    }
}
