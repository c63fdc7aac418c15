//! Cross-representation comparison
//!
//! A resolved entity is authoritative for required fields; the wire message
//! may carry extra transport-only fields. So a missing field is an error and
//! an extra one only a warning.

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::config::ProtocolTarget;
use crate::entity::EntityType;
use crate::error::{CheckError, Result};
use crate::proto::{MessageSource, ProtoMessage};
use crate::report::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::resolve::{ResolvedEntity, ResolvedSet};

/// Upper-case the first letter of every word and lower-case the rest
///
/// Words are broken at whitespace and punctuation, so `agent-to-agent`
/// becomes `Agent-To-Agent`. An apostrophe inside a word does not break it.
pub fn title_case(caption: &str) -> String {
    let mut out = String::with_capacity(caption.len());
    let mut at_word_start = true;
    for c in caption.chars() {
        if !c.is_alphanumeric() && !(c == '\'' && !at_word_start) {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Compare one resolved entity with one message descriptor
pub fn compare(entity: &ResolvedEntity, message: &ProtoMessage) -> Diagnostics {
    let subject = entity.record.source_path.display().to_string();
    let mut diags = Diagnostics::new();

    let expected = title_case(entity.caption());
    if message.name != expected {
        diags.report(
            subject.clone(),
            DiagnosticCode::MessageNameMismatch,
            format!(
                "Message name mismatch: JSON '{}' vs Proto '{}'. Expected Proto to be '{}'.",
                entity.caption(),
                message.name,
                expected
            ),
        );
    }

    for attr in entity.attributes.keys() {
        if !message.has_field(attr) {
            diags.report(
                subject.clone(),
                DiagnosticCode::MissingMessageField,
                format!("JSON attribute '{}' is missing in Proto message '{}'.", attr, message.name),
            );
        }
    }

    for field in message.fields.keys() {
        if !entity.attributes.contains_key(field) {
            diags.push(
                DiagnosticItem::new(
                    subject.clone(),
                    DiagnosticCode::ExtraMessageField,
                    format!(
                        "Proto field '{}' exists in Proto but is missing in JSON schema. Consider if this is intended.",
                        field
                    ),
                )
                .with_context(format!("message {}", message.name)),
            );
        }
    }

    diags
}

/// Run every configured sync target
///
/// A target naming an entity that does not exist at all is a configuration
/// error. A target whose entity exists but failed to resolve is skipped; the
/// failure is already in the references check.
pub fn check_protocol_targets(
    targets: &[ProtocolTarget],
    resolved: &IndexMap<EntityType, ResolvedSet>,
    defined: impl Fn(EntityType, &str) -> bool,
    source: &dyn MessageSource,
) -> Result<Diagnostics> {
    let mut diags = Diagnostics::new();

    for target in targets {
        let entity = resolved
            .get(&target.entity_type)
            .and_then(|set| set.get(&target.name));
        let Some(entity) = entity else {
            if defined(target.entity_type, &target.name) {
                warn!(
                    "Skipping proto sync for unresolved {} '{}'",
                    target.entity_type, target.name
                );
                continue;
            }
            return Err(CheckError::EntityNotFound {
                entity_type: target.entity_type.to_string(),
                name: target.name.clone(),
            });
        };

        let message = source.message(&target.proto)?;
        let found = compare(entity, &message);
        info!(
            "Compared {} '{}' with {}: {} error(s), {} warning(s)",
            target.entity_type,
            target.name,
            target.proto.display(),
            found.error_count(),
            found.warning_count()
        );
        diags.merge(found);
    }

    Ok(diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRecord;
    use crate::resolve::Resolver;
    use serde_json::json;
    use std::path::{Path, PathBuf};

    fn record_entity() -> ResolvedEntity {
        let records = vec![EntityRecord::from_document(
            EntityType::Object,
            Path::new("objects/record.json"),
            &json!({
                "name": "record",
                "caption": "record",
                "attributes": { "name": {}, "version": {} }
            }),
        )
        .unwrap()];
        Resolver::new(EntityType::Object)
            .resolve(&records)
            .get("record")
            .unwrap()
            .clone()
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("record"), "Record");
        assert_eq!(title_case("base SKILL  class"), "Base Skill  Class");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_title_case_breaks_words_at_punctuation() {
        assert_eq!(title_case("agent-to-agent"), "Agent-To-Agent");
        assert_eq!(title_case("text/image generation"), "Text/Image Generation");
        assert_eq!(title_case("agent's record"), "Agent's Record");
        assert_eq!(title_case("3d model"), "3d Model");
    }

    #[test]
    fn test_extra_field_is_only_a_warning() {
        let message = ProtoMessage::from_field_names("Record", ["name", "version", "extra_field"]);
        let diags = compare(&record_entity(), &message);
        assert_eq!(diags.error_count(), 0);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.all()[0].message.contains("'extra_field'"));
    }

    #[test]
    fn test_missing_field_and_name_mismatch() {
        let message = ProtoMessage::from_field_names("AgentRecord", ["name"]);
        let diags = compare(&record_entity(), &message);
        let codes: Vec<_> = diags.all().iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![DiagnosticCode::MessageNameMismatch, DiagnosticCode::MissingMessageField]
        );
    }

    struct Fixed(ProtoMessage);

    impl MessageSource for Fixed {
        fn message(&self, _path: &Path) -> Result<ProtoMessage> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_unknown_target_is_fatal() {
        let mut resolved = IndexMap::new();
        let records: Vec<EntityRecord> = Vec::new();
        resolved.insert(EntityType::Object, Resolver::new(EntityType::Object).resolve(&records));
        let targets = vec![ProtocolTarget {
            entity_type: EntityType::Object,
            name: "ghost".into(),
            proto: PathBuf::from("ghost.proto"),
        }];
        let source = Fixed(ProtoMessage::from_field_names("Ghost", Vec::<String>::new()));
        let err = check_protocol_targets(&targets, &resolved, |_, _| false, &source).unwrap_err();
        assert!(matches!(err, CheckError::EntityNotFound { .. }));

        // defined but unresolved: skipped
        let diags = check_protocol_targets(&targets, &resolved, |_, _| true, &source).unwrap();
        assert!(diags.is_empty());
    }
}
