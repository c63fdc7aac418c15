//! Meta-schema validation
//!
//! Every corpus document is validated against the JSON Schema for its class.
//! The validator itself sits behind [`StructuralValidator`] so the checker
//! only sees "document in, violation messages out".

use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::LayoutConfig;
use crate::corpus::Corpus;
use crate::entity::EntityType;
use crate::error::{CheckError, Result};
use crate::report::{DiagnosticCode, DiagnosticItem, Diagnostics};

pub const DICTIONARY_SCHEMA: &str = "dictionary.schema.json";
pub const PROFILE_SCHEMA: &str = "profile.schema.json";
pub const EXTENSION_SCHEMA: &str = "extension.schema.json";

/// Base URI jsonschema assigns to schemas without an `$id`
const DEFAULT_BASE: &str = "json-schema:///";

/// Validate a document against a named schema
pub trait StructuralValidator {
    /// Violation messages; empty means the document passes
    fn validate(&self, schema: &str, document: &Value) -> Result<Vec<String>>;

    fn has_schema(&self, schema: &str) -> bool;
}

/// [`StructuralValidator`] backed by compiled `jsonschema` validators
pub struct JsonSchemaValidator {
    /// File name → compiled schema
    compiled: BTreeMap<String, JSONSchema>,
    schema_dir: PathBuf,
}

impl JsonSchemaValidator {
    /// Compile every `*.schema.json` document under `schema_dir` in the corpus
    pub fn from_corpus(corpus: &Corpus, schema_dir: &Path) -> Result<Self> {
        let documents = corpus
            .files_in(schema_dir)
            .filter(|f| f.relative_path.to_string_lossy().ends_with(".schema.json"))
            .filter_map(|f| {
                f.relative_path
                    .file_name()
                    .map(|n| (n.to_string_lossy().into_owned(), f.document.clone()))
            });
        Self::from_documents(schema_dir, documents)
    }

    /// Compile `(file name, schema)` pairs
    ///
    /// All schemas are registered with each other under their `$id` and
    /// under their file name, so cross-schema `$ref`s resolve without any
    /// filesystem or network access.
    pub fn from_documents<I>(schema_dir: &Path, documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let documents: Vec<(String, Value)> = documents.into_iter().collect();
        let mut compiled = BTreeMap::new();

        for (name, schema) in &documents {
            let mut options = JSONSchema::options();
            for (other_name, other) in &documents {
                options.with_document(format!("{}{}", DEFAULT_BASE, other_name), other.clone());
                if let Some(id) = other.get("$id").and_then(Value::as_str) {
                    options.with_document(id.to_string(), other.clone());
                }
            }
            let validator = options.compile(schema).map_err(|e| CheckError::MetaSchema {
                path: schema_dir.join(name),
                reason: e.to_string(),
            })?;
            debug!("Compiled meta-schema {}", name);
            compiled.insert(name.clone(), validator);
        }

        info!("Compiled {} meta-schemas from {}", compiled.len(), schema_dir.display());
        Ok(Self {
            compiled,
            schema_dir: schema_dir.to_path_buf(),
        })
    }

    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.compiled.keys().map(String::as_str)
    }
}

impl StructuralValidator for JsonSchemaValidator {
    fn validate(&self, schema: &str, document: &Value) -> Result<Vec<String>> {
        let validator = self
            .compiled
            .get(schema)
            .ok_or_else(|| CheckError::MissingFile(self.schema_dir.join(schema)))?;

        // Errors borrow the instance; render them right away
        let messages = match validator.validate(document) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect(),
        };
        Ok(messages)
    }

    fn has_schema(&self, schema: &str) -> bool {
        self.compiled.contains_key(schema)
    }
}

/// Validate the dictionary, every entity directory, profiles and extensions
pub fn check_metaschemas(
    corpus: &Corpus,
    layout: &LayoutConfig,
    validator: &dyn StructuralValidator,
) -> Result<Diagnostics> {
    let mut diags = Diagnostics::new();

    let dictionary = corpus
        .get(&layout.dictionary)
        .ok_or_else(|| CheckError::MissingFile(corpus.root().join(&layout.dictionary)))?;
    validate_file(validator, DICTIONARY_SCHEMA, &dictionary.relative_path, &dictionary.document, &mut diags)?;

    let mut targets: Vec<(PathBuf, &str)> = EntityType::ALL
        .iter()
        .map(|t| (PathBuf::from(t.dir_name()), t.metaschema_file()))
        .collect();
    targets.push((layout.profiles_dir.clone(), PROFILE_SCHEMA));
    targets.push((layout.extensions_dir.clone(), EXTENSION_SCHEMA));

    for (dir, schema) in &targets {
        if !corpus.has_dir(dir) {
            warn!("{} directory does not exist", dir.display());
            diags.report(
                dir.display().to_string(),
                DiagnosticCode::MissingTargetDir,
                format!("{} directory does not exist", dir.display()),
            );
            continue;
        }
        let mut count = 0usize;
        for file in corpus.files_in(dir) {
            validate_file(validator, schema, &file.relative_path, &file.document, &mut diags)?;
            count += 1;
        }
        debug!("Validated {} files in {} against {}", count, dir.display(), schema);
    }

    info!("Meta-schema check: {} violation(s)", diags.error_count());
    Ok(diags)
}

fn validate_file(
    validator: &dyn StructuralValidator,
    schema: &str,
    path: &Path,
    document: &Value,
    diags: &mut Diagnostics,
) -> Result<()> {
    let violations = validator.validate(schema, document)?;
    if violations.is_empty() {
        return Ok(());
    }
    let mut item = DiagnosticItem::new(
        path.display().to_string(),
        DiagnosticCode::SchemaViolation,
        format!("File {} failed validation against {}", path.display(), schema),
    );
    for violation in violations {
        item = item.with_context(violation);
    }
    diags.push(item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn class_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "$id": "https://schema.example.org/metaschema/class.schema.json",
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string" },
                "attributes": { "$ref": "attributes.schema.json" }
            }
        })
    }

    fn attributes_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "$id": "https://schema.example.org/metaschema/attributes.schema.json",
            "type": "object",
            "additionalProperties": { "type": "object" }
        })
    }

    fn validator() -> JsonSchemaValidator {
        JsonSchemaValidator::from_documents(
            Path::new("metaschema"),
            vec![
                ("class.schema.json".to_string(), class_schema()),
                ("attributes.schema.json".to_string(), attributes_schema()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_document_passes() {
        let v = validator();
        let messages = v
            .validate("class.schema.json", &json!({ "name": "a", "attributes": { "x": {} } }))
            .unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn test_violations_are_reported() {
        let v = validator();
        let messages = v.validate("class.schema.json", &json!({ "caption": "no name" })).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("name"));
    }

    #[test]
    fn test_cross_schema_ref_resolves() {
        let v = validator();
        let messages = v
            .validate("class.schema.json", &json!({ "name": "a", "attributes": { "x": 1 } }))
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("/attributes/x"));
    }

    #[test]
    fn test_unknown_schema_is_structural() {
        let v = validator();
        assert!(!v.has_schema("object.schema.json"));
        assert!(matches!(
            v.validate("object.schema.json", &json!({})),
            Err(CheckError::MissingFile(_))
        ));
    }

    #[test]
    fn test_missing_directories_warn() {
        let corpus = Corpus::from_documents(
            "/schema",
            vec![
                ("dictionary.json", json!({ "attributes": {} })),
                ("metaschema/dictionary.schema.json", json!({ "type": "object" })),
                ("metaschema/class.schema.json", class_schema()),
                ("metaschema/attributes.schema.json", attributes_schema()),
                ("skills/a.json", json!({ "name": "a" })),
                ("skills/b.json", json!({ "caption": "B" })),
            ],
        );
        let layout = LayoutConfig::default();
        let v = JsonSchemaValidator::from_corpus(&corpus, &layout.metaschema_dir).unwrap();
        let diags = check_metaschemas(&corpus, &layout, &v).unwrap();

        let errors: Vec<_> = diags.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].subject, "skills/b.json");
        // objects, domains, modules, profiles, extensions
        assert_eq!(diags.warning_count(), 5);
    }
}
