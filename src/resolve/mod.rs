//! Inheritance Resolution
//!
//! Turns the records of one entity type into fully merged entities.
//!
//! Passes, in order:
//! 1. index names (missing and duplicate names)
//! 2. check every `extends` target exists (dangling references)
//! 3. cycle detection ([`cycles`]), which aborts the merge for this type
//! 4. memoized bottom-up merge
//!
//! Merge order: parents left to right, then the record's own attributes.
//! Later sources win field by field, so a child restating only
//! `requirement` keeps the inherited caption and description.

pub mod cycles;
pub mod disjoint_set;
pub mod graph;

pub use cycles::{detect_cycles, Cycle};
pub use disjoint_set::DisjointSet;
pub use graph::InheritanceGraph;

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::entity::{AttributeMap, EntityRecord, EntityType};
use crate::report::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::suggest;

/// An entity after its ancestor chain has been merged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntity {
    pub record: EntityRecord,
    /// Inherited and own attributes, in first-seen order
    pub attributes: AttributeMap,
}

impl ResolvedEntity {
    pub fn name(&self) -> &str {
        self.record.name.as_deref().unwrap_or_default()
    }

    pub fn caption(&self) -> &str {
        self.record.caption.as_deref().unwrap_or_default()
    }

    /// The entity rendered back into document form, with merged attributes
    pub fn to_document(&self) -> serde_json::Value {
        let mut doc = serde_json::Map::new();
        doc.insert("name".into(), self.name().into());
        if let Some(caption) = &self.record.caption {
            doc.insert("caption".into(), caption.clone().into());
        }
        if let Some(description) = &self.record.description {
            doc.insert("description".into(), description.clone().into());
        }
        match self.record.extends.as_slice() {
            [] => {}
            [single] => {
                doc.insert("extends".into(), single.clone().into());
            }
            many => {
                doc.insert("extends".into(), many.to_vec().into());
            }
        }
        if let Some(category) = &self.record.category {
            doc.insert("category".into(), category.clone());
        }
        doc.insert(
            "attributes".into(),
            serde_json::to_value(&self.attributes).unwrap_or_default(),
        );
        serde_json::Value::Object(doc)
    }
}

/// Why a record did not produce a [`ResolvedEntity`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionFailure {
    MissingName {
        file: PathBuf,
    },
    DuplicateName {
        name: String,
        files: Vec<PathBuf>,
    },
    DanglingExtends {
        name: String,
        target: String,
        file: PathBuf,
        suggestion: Option<String>,
    },
    MissingExtends {
        name: String,
        file: PathBuf,
    },
    Cycle(Cycle),
    UnresolvedAncestor {
        name: String,
        ancestor: String,
        file: PathBuf,
    },
}

impl ResolutionFailure {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::MissingName { .. } => DiagnosticCode::MissingName,
            Self::DuplicateName { .. } => DiagnosticCode::DuplicateName,
            Self::DanglingExtends { .. } => DiagnosticCode::DanglingExtends,
            Self::MissingExtends { .. } => DiagnosticCode::MissingExtends,
            Self::Cycle(_) => DiagnosticCode::InheritanceCycle,
            Self::UnresolvedAncestor { .. } => DiagnosticCode::UnresolvedAncestor,
        }
    }

    /// Entity the failure is about, if it has a name
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            Self::MissingName { .. } => None,
            Self::DuplicateName { name, .. }
            | Self::DanglingExtends { name, .. }
            | Self::MissingExtends { name, .. }
            | Self::UnresolvedAncestor { name, .. } => Some(name),
            Self::Cycle(Cycle::SelfLoop { name, .. }) => Some(name),
            Self::Cycle(Cycle::Edge { child, .. }) => Some(child),
        }
    }

    pub fn to_diagnostic(&self, entity_type: EntityType) -> DiagnosticItem {
        let dir = entity_type.dir_name();
        match self {
            Self::MissingName { file } => DiagnosticItem::new(
                file.display().to_string(),
                self.code(),
                format!("Missing name in {}", file.display()),
            ),
            Self::DuplicateName { name, files } => {
                let listed: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
                DiagnosticItem::new(
                    name.clone(),
                    self.code(),
                    format!("Duplicate name '{}' found in {}: [{}]", name, dir, listed.join(", ")),
                )
            }
            Self::DanglingExtends {
                target,
                file,
                suggestion,
                ..
            } => {
                let item = DiagnosticItem::new(
                    file.display().to_string(),
                    self.code(),
                    format!(
                        "extends value '{}' in file {} does not match any defined name in {}",
                        target,
                        file.display(),
                        dir
                    ),
                );
                match suggestion {
                    Some(s) => item.with_context(s.clone()),
                    None => item,
                }
            }
            Self::MissingExtends { file, .. } => DiagnosticItem::new(
                file.display().to_string(),
                self.code(),
                format!("Missing extends: {}", file.display()),
            ),
            Self::Cycle(cycle) => {
                DiagnosticItem::new(cycle.file().display().to_string(), self.code(), cycle.message())
            }
            Self::UnresolvedAncestor { name, ancestor, file } => DiagnosticItem::new(
                file.display().to_string(),
                self.code(),
                format!(
                    "{} '{}' cannot be resolved: ancestor '{}' failed to resolve",
                    entity_type, name, ancestor
                ),
            ),
        }
    }
}

/// All resolution results for one entity type
#[derive(Debug, Clone)]
pub struct ResolvedSet {
    pub entity_type: EntityType,
    entities: IndexMap<String, ResolvedEntity>,
    failures: Vec<ResolutionFailure>,
    /// Set when a cycle stopped the merge
    aborted: bool,
}

impl ResolvedSet {
    pub fn get(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &ResolvedEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn failures(&self) -> &[ResolutionFailure] {
        &self.failures
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for failure in &self.failures {
            diags.push(failure.to_diagnostic(self.entity_type));
        }
        diags
    }
}

enum MergeState {
    InProgress,
    Done(AttributeMap),
    Failed,
}

/// Resolver for one entity type
#[derive(Debug, Clone)]
pub struct Resolver {
    entity_type: EntityType,
    sentinel_root: Option<String>,
    require_extends: bool,
}

impl Resolver {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            sentinel_root: entity_type.default_sentinel_root().map(String::from),
            require_extends: false,
        }
    }

    pub fn with_sentinel_root(mut self, root: Option<impl Into<String>>) -> Self {
        self.sentinel_root = root.map(Into::into);
        self
    }

    pub fn require_extends(mut self, required: bool) -> Self {
        self.require_extends = required;
        self
    }

    fn is_root(&self, name: &str) -> bool {
        self.sentinel_root.as_deref() == Some(name)
    }

    /// Resolve every record of this type
    ///
    /// `records` should come from one entity type in a stable order.
    pub fn resolve(&self, records: &[EntityRecord]) -> ResolvedSet {
        let mut failures = Vec::new();

        // 1. names
        let mut index: HashMap<&str, &EntityRecord> = HashMap::new();
        let mut files_by_name: IndexMap<&str, Vec<PathBuf>> = IndexMap::new();
        for record in records {
            match record.name.as_deref() {
                None => {
                    warn!("Skipping nameless {} record {}", self.entity_type, record.source_path.display());
                    failures.push(ResolutionFailure::MissingName {
                        file: record.source_path.clone(),
                    });
                }
                Some(name) => {
                    index.entry(name).or_insert(record);
                    files_by_name.entry(name).or_default().push(record.source_path.clone());
                }
            }
        }
        for (name, files) in &files_by_name {
            if files.len() > 1 {
                failures.push(ResolutionFailure::DuplicateName {
                    name: name.to_string(),
                    files: files.clone(),
                });
            }
        }

        // 2. references
        for record in records {
            let Some(name) = record.name.as_deref() else { continue };
            if record.extends.is_empty() && self.require_extends && !self.is_root(name) {
                failures.push(ResolutionFailure::MissingExtends {
                    name: name.to_string(),
                    file: record.source_path.clone(),
                });
            }
            for target in &record.extends {
                if self.is_root(target) || index.contains_key(target.as_str()) {
                    continue;
                }
                failures.push(ResolutionFailure::DanglingExtends {
                    name: name.to_string(),
                    target: target.clone(),
                    file: record.source_path.clone(),
                    suggestion: suggest::hint(target, index.keys().copied()),
                });
            }
        }

        // 3. cycles
        let graph = InheritanceGraph::build(self.entity_type, records, self.sentinel_root.as_deref());
        let cycles = detect_cycles(records, &graph, self.sentinel_root.as_deref());
        if !cycles.is_empty() {
            warn!(
                "{} inheritance cycle(s) among {} records; skipping merge",
                cycles.len(),
                self.entity_type
            );
            failures.extend(cycles.into_iter().map(ResolutionFailure::Cycle));
            return ResolvedSet {
                entity_type: self.entity_type,
                entities: IndexMap::new(),
                failures,
                aborted: true,
            };
        }

        // 4. merge
        let mut memo: HashMap<String, MergeState> = HashMap::new();
        let mut entities = IndexMap::new();
        for (name, record) in files_by_name.keys().filter_map(|n| index.get(n).map(|r| (*n, *r))) {
            match self.merge(name, &index, &mut memo) {
                Ok(attributes) => {
                    entities.insert(
                        name.to_string(),
                        ResolvedEntity {
                            record: record.clone(),
                            attributes,
                        },
                    );
                }
                Err(ancestor) => {
                    // dangling parents are already reported for the record itself
                    if ancestor != name && !record.extends.iter().any(|p| *p == ancestor && !index.contains_key(p.as_str())) {
                        failures.push(ResolutionFailure::UnresolvedAncestor {
                            name: name.to_string(),
                            ancestor,
                            file: record.source_path.clone(),
                        });
                    }
                }
            }
        }

        info!(
            "Resolved {}/{} {} records",
            entities.len(),
            files_by_name.len(),
            self.entity_type
        );

        ResolvedSet {
            entity_type: self.entity_type,
            entities,
            failures,
            aborted: false,
        }
    }

    /// Merged attributes of `name`, or the name of the ancestor that failed
    fn merge(
        &self,
        name: &str,
        index: &HashMap<&str, &EntityRecord>,
        memo: &mut HashMap<String, MergeState>,
    ) -> Result<AttributeMap, String> {
        match memo.get(name) {
            Some(MergeState::Done(attrs)) => return Ok(attrs.clone()),
            Some(MergeState::Failed) => return Err(name.to_string()),
            // only reachable if the cycle pass was bypassed
            Some(MergeState::InProgress) => return Err(name.to_string()),
            None => {}
        }

        let Some(record) = index.get(name) else {
            return Err(name.to_string());
        };
        memo.insert(name.to_string(), MergeState::InProgress);

        let mut merged = AttributeMap::new();
        for parent in &record.extends {
            if self.is_root(parent) {
                // the root terminates the chain: take its own attributes only.
                // The root listing itself adds nothing beyond its own.
                if parent != name {
                    if let Some(root) = index.get(parent.as_str()) {
                        overlay(&mut merged, &root.attributes);
                    }
                }
                continue;
            }
            match self.merge(parent, index, memo) {
                Ok(parent_attrs) => overlay(&mut merged, &parent_attrs),
                Err(ancestor) => {
                    debug!("{} '{}' blocked by '{}'", self.entity_type, name, ancestor);
                    memo.insert(name.to_string(), MergeState::Failed);
                    return Err(ancestor);
                }
            }
        }
        overlay(&mut merged, &record.attributes);

        memo.insert(name.to_string(), MergeState::Done(merged.clone()));
        Ok(merged)
    }
}

/// Overlay `source` onto `target` attribute by attribute, field by field
pub fn overlay(target: &mut AttributeMap, source: &AttributeMap) {
    for (key, spec) in source {
        match target.get_mut(key) {
            Some(existing) => existing.overlay(spec),
            None => {
                target.insert(key.clone(), spec.clone());
            }
        }
    }
}
