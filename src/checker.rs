//! Run orchestration
//!
//! Loads the corpus once, resolves every entity type, then runs each check
//! over the cached data and collects the results in a [`RunReport`].

use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, info};

use crate::category::{check_categories, CategoryEnumeration};
use crate::compare::check_protocol_targets;
use crate::config::CheckConfig;
use crate::corpus::Corpus;
use crate::dictionary::{check_dictionary, Dictionary};
use crate::entity::{EntityRecord, EntityType};
use crate::error::{CheckError, Result};
use crate::metaschema::{check_metaschemas, JsonSchemaValidator, StructuralValidator};
use crate::proto::{MessageSource, ProtoFileSource};
use crate::report::{CheckKind, Diagnostics, RunReport};
use crate::resolve::{InheritanceGraph, ResolvedEntity, ResolvedSet, Resolver};

/// Loaded corpus plus everything derived from it
pub struct SchemaChecker {
    config: CheckConfig,
    corpus: Corpus,
    records: IndexMap<EntityType, Vec<EntityRecord>>,
    resolved: IndexMap<EntityType, ResolvedSet>,
}

impl SchemaChecker {
    /// Load the corpus named by `config` and resolve it
    pub fn open(config: CheckConfig) -> Result<Self> {
        let corpus = Corpus::load(&config.corpus_root(), &config.corpus)?;
        Self::from_corpus(config, corpus)
    }

    pub fn from_corpus(config: CheckConfig, corpus: Corpus) -> Result<Self> {
        let mut records = IndexMap::new();
        let mut resolved = IndexMap::new();

        for entity_type in EntityType::ALL {
            let type_records = corpus.records(entity_type)?;
            let resolver = Resolver::new(entity_type)
                .with_sentinel_root(config.sentinel_root(entity_type))
                .require_extends(config.require_extends(entity_type));
            resolved.insert(entity_type, resolver.resolve(&type_records));
            records.insert(entity_type, type_records);
        }

        Ok(Self {
            config,
            corpus,
            records,
            resolved,
        })
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn records(&self, entity_type: EntityType) -> &[EntityRecord] {
        self.records.get(&entity_type).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn resolved(&self, entity_type: EntityType) -> Option<&ResolvedSet> {
        self.resolved.get(&entity_type)
    }

    fn is_defined(&self, entity_type: EntityType, name: &str) -> bool {
        self.records(entity_type)
            .iter()
            .any(|r| r.name.as_deref() == Some(name))
    }

    /// One merged entity, or why it is unavailable
    pub fn resolve_entity(&self, entity_type: EntityType, name: &str) -> Result<&ResolvedEntity> {
        if let Some(entity) = self.resolved(entity_type).and_then(|set| set.get(name)) {
            return Ok(entity);
        }
        if !self.is_defined(entity_type, name) {
            return Err(CheckError::EntityNotFound {
                entity_type: entity_type.to_string(),
                name: name.to_string(),
            });
        }

        let reasons: Vec<String> = self
            .resolved(entity_type)
            .map(|set| {
                let own: Vec<String> = set
                    .failures()
                    .iter()
                    .filter(|f| f.entity_name() == Some(name))
                    .map(|f| f.to_diagnostic(entity_type).message)
                    .collect();
                if own.is_empty() && set.aborted() {
                    vec![format!("inheritance cycle among {} records", entity_type)]
                } else {
                    own
                }
            })
            .unwrap_or_default();

        Err(CheckError::Unresolved {
            entity_type: entity_type.to_string(),
            name: name.to_string(),
            reason: reasons.join("; "),
        })
    }

    /// Inheritance graph for one entity type
    pub fn graph(&self, entity_type: EntityType) -> InheritanceGraph {
        InheritanceGraph::build(
            entity_type,
            self.records(entity_type),
            self.config.sentinel_root(entity_type),
        )
    }

    /// Run every check with the built-in validator and proto reader
    pub fn run(&self) -> Result<RunReport> {
        let validator = JsonSchemaValidator::from_corpus(&self.corpus, &self.config.layout.metaschema_dir)?;
        let source = ProtoFileSource::new()?;
        self.run_with(&validator, &source)
    }

    pub fn run_with(&self, validator: &dyn StructuralValidator, source: &dyn MessageSource) -> Result<RunReport> {
        let mut report = RunReport::new(self.corpus.hash(), self.corpus.file_count());

        report.record(
            CheckKind::Metaschema,
            check_metaschemas(&self.corpus, &self.config.layout, validator)?,
        );
        report.record(CheckKind::References, self.check_references());
        report.record(CheckKind::Dictionary, self.check_dictionary()?);
        report.record(CheckKind::Categories, self.check_categories()?);
        report.record(
            CheckKind::Protocol,
            check_protocol_targets(
                &self.config.protocol,
                &self.resolved,
                |t, name| self.is_defined(t, name),
                source,
            )?,
        );

        info!(
            "Run finished: {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
        Ok(report)
    }

    pub fn check_references(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for set in self.resolved.values() {
            diags.merge(set.diagnostics());
        }
        diags
    }

    pub fn check_dictionary(&self) -> Result<Diagnostics> {
        let path = &self.config.layout.dictionary;
        let file = self
            .corpus
            .get(path)
            .ok_or_else(|| CheckError::MissingFile(self.corpus.root().join(path)))?;
        let dictionary = Dictionary::from_document(&file.relative_path, &file.document)?;
        Ok(check_dictionary(self.records.values().flatten(), &dictionary))
    }

    pub fn check_categories(&self) -> Result<Diagnostics> {
        let mut diags = Diagnostics::new();
        for entity_type in EntityType::ALL {
            let Some(category_file) = entity_type.category_file() else { continue };
            let Some(file) = self.corpus.get(Path::new(category_file)) else {
                debug!("No {} for {}; skipping category check", category_file, entity_type);
                continue;
            };
            let enumeration = CategoryEnumeration::from_document(entity_type, &file.relative_path, &file.document)?;
            diags.merge(check_categories(self.records(entity_type), &enumeration));
        }
        Ok(diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::ProtoMessage;
    use serde_json::json;

    struct NoViolations;

    impl StructuralValidator for NoViolations {
        fn validate(&self, _schema: &str, _document: &serde_json::Value) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn has_schema(&self, _schema: &str) -> bool {
            true
        }
    }

    struct NoMessages;

    impl MessageSource for NoMessages {
        fn message(&self, path: &Path) -> Result<ProtoMessage> {
            Err(CheckError::MissingFile(path.to_path_buf()))
        }
    }

    fn checker(documents: Vec<(&str, serde_json::Value)>) -> SchemaChecker {
        let corpus = Corpus::from_documents("/schema", documents);
        SchemaChecker::from_corpus(CheckConfig::default(), corpus).unwrap()
    }

    #[test]
    fn test_types_are_resolved_independently() {
        let checker = checker(vec![
            ("dictionary.json", json!({ "attributes": {} })),
            ("skills/a.json", json!({ "name": "a", "extends": "b" })),
            ("skills/b.json", json!({ "name": "b", "extends": "a" })),
            ("domains/d.json", json!({ "name": "d", "attributes": { "x": {} } })),
        ]);
        assert!(checker.resolved(EntityType::Skill).unwrap().aborted());
        assert!(checker.resolve_entity(EntityType::Domain, "d").is_ok());

        match checker.resolve_entity(EntityType::Skill, "a") {
            Err(CheckError::Unresolved { reason, .. }) => assert!(reason.to_lowercase().contains("cycle")),
            other => panic!("Expected Unresolved, got {:?}", other.map(|e| e.name().to_string())),
        }
        assert!(matches!(
            checker.resolve_entity(EntityType::Skill, "zzz"),
            Err(CheckError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn test_undocumented_attribute_fails_run() {
        let checker = checker(vec![
            ("dictionary.json", json!({ "attributes": { "name": {} } })),
            ("objects/record.json", json!({ "name": "record", "attributes": { "name": {}, "z": {} } })),
        ]);
        let report = checker.run_with(&NoViolations, &NoMessages).unwrap();
        assert!(!report.passed());
        let dictionary = report.check(CheckKind::Dictionary).unwrap();
        assert_eq!(dictionary.error_count(), 1);
        assert!(dictionary.all()[0].message.contains("objects/record.json"));
    }

    #[test]
    fn test_category_files_are_optional() {
        let checker = checker(vec![
            ("dictionary.json", json!({ "attributes": {} })),
            ("skills/a.json", json!({ "name": "a", "category": "anything" })),
            ("domain_categories.json", json!({ "attributes": { "tech": {} } })),
            ("domains/d.json", json!({ "name": "d", "category": "bogus" })),
        ]);
        let diags = checker.check_categories().unwrap();
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.all()[0].subject, "domains/d.json");
    }

    #[test]
    fn test_missing_dictionary_is_structural() {
        let checker = checker(vec![("skills/a.json", json!({ "name": "a" }))]);
        assert!(matches!(checker.check_dictionary(), Err(CheckError::MissingFile(_))));
    }
}
