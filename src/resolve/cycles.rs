//! Inheritance cycle detection
//!
//! Runs independently of the merge so a cycle gets its own diagnostic instead
//! of surfacing as a resolution failure. Each non-root `extends` edge is fed
//! into a [`DisjointSet`]; an edge whose endpoints are already joined closes
//! an undirected cycle. That is only a candidate: a multi-parent diamond also
//! closes one. The candidate is a real cycle iff the parent can reach the
//! child along directed edges. Edges closing the same strongly connected
//! set of names are reported once.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::debug;

use super::disjoint_set::DisjointSet;
use super::graph::InheritanceGraph;
use crate::entity::EntityRecord;

/// A confirmed inheritance cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// `name` lists itself in `extends`
    SelfLoop { name: String, file: PathBuf },
    /// The edge `child -> parent` closes a longer cycle
    Edge {
        child: String,
        parent: String,
        /// File declaring the edge
        file: PathBuf,
        /// File defining the parent, when known
        parent_file: Option<PathBuf>,
    },
}

impl Cycle {
    pub fn message(&self) -> String {
        match self {
            Cycle::SelfLoop { name, file } => {
                format!("Self-cycle: {} extends itself ({})", name, file.display())
            }
            Cycle::Edge {
                child,
                parent,
                file,
                parent_file,
            } => match parent_file {
                Some(pf) => format!(
                    "Cycle edge detected: {} -- {} (from file {}, closing back through {})",
                    child,
                    parent,
                    file.display(),
                    pf.display()
                ),
                None => format!(
                    "Cycle edge detected: {} -- {} (from file {})",
                    child,
                    parent,
                    file.display()
                ),
            },
        }
    }

    pub fn file(&self) -> &PathBuf {
        match self {
            Cycle::SelfLoop { file, .. } | Cycle::Edge { file, .. } => file,
        }
    }
}

/// Find every edge that closes a directed cycle
///
/// `records` must be in a stable order (the corpus yields them by path) so
/// the reported edge is deterministic.
pub fn detect_cycles(records: &[EntityRecord], graph: &InheritanceGraph, sentinel_root: Option<&str>) -> Vec<Cycle> {
    let files: HashMap<&str, &PathBuf> = records
        .iter()
        .filter_map(|r| r.name.as_deref().map(|n| (n, &r.source_path)))
        .collect();

    let mut set: DisjointSet<&str> = DisjointSet::new();
    let mut cycles = Vec::new();
    let mut reported: Vec<BTreeSet<String>> = Vec::new();

    for record in records {
        let Some(child) = record.name.as_deref() else { continue };
        for parent in &record.extends {
            let parent = parent.as_str();
            if Some(parent) == sentinel_root {
                continue;
            }
            if parent == child {
                cycles.push(Cycle::SelfLoop {
                    name: child.to_string(),
                    file: record.source_path.clone(),
                });
                continue;
            }
            if set.union(&child, &parent) {
                continue;
            }
            if graph.reaches(parent, child) {
                let members = graph.cycle_members(child);
                if reported.contains(&members) {
                    debug!("{} -> {} closes an already reported cycle", child, parent);
                    continue;
                }
                reported.push(members);
                cycles.push(Cycle::Edge {
                    child: child.to_string(),
                    parent: parent.to_string(),
                    file: record.source_path.clone(),
                    parent_file: files.get(parent).map(|p| (*p).clone()),
                });
            } else {
                debug!("{} -> {} joins already-connected ancestors (diamond), not a cycle", child, parent);
            }
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use serde_json::json;
    use std::path::Path;

    fn record(name: &str, extends: serde_json::Value) -> EntityRecord {
        EntityRecord::from_document(
            EntityType::Skill,
            Path::new(&format!("skills/{}.json", name)),
            &json!({ "name": name, "extends": extends }),
        )
        .unwrap()
    }

    fn cycles_of(records: &[EntityRecord]) -> Vec<Cycle> {
        let graph = InheritanceGraph::build(EntityType::Skill, records, Some("base_skill"));
        detect_cycles(records, &graph, Some("base_skill"))
    }

    #[test]
    fn test_self_loop() {
        let cycles = cycles_of(&[record("a", json!("a"))]);
        assert_eq!(
            cycles,
            vec![Cycle::SelfLoop {
                name: "a".into(),
                file: PathBuf::from("skills/a.json")
            }]
        );
    }

    #[test]
    fn test_mutual_cycle_reported_once_with_both_files() {
        let cycles = cycles_of(&[record("a", json!("b")), record("b", json!("a"))]);
        assert_eq!(cycles.len(), 1);
        let message = cycles[0].message();
        assert!(message.contains("skills/a.json"));
        assert!(message.contains("skills/b.json"));
    }

    #[test]
    fn test_cycle_joined_from_outside_reported_once() {
        let cycles = cycles_of(&[
            record("child", json!(["a", "b"])),
            record("a", json!("b")),
            record("b", json!("a")),
        ]);
        assert_eq!(cycles.len(), 1);
        assert!(matches!(&cycles[0], Cycle::Edge { child, parent, .. } if child == "a" && parent == "b"));
    }

    #[test]
    fn test_separate_cycles_each_reported() {
        let cycles = cycles_of(&[
            record("a", json!("b")),
            record("b", json!("a")),
            record("c", json!("d")),
            record("d", json!("c")),
        ]);
        assert_eq!(cycles.len(), 2);
    }

    #[test]
    fn test_long_cycle() {
        let records: Vec<_> = (0..10)
            .map(|i| record(&format!("n{}", i), json!(format!("n{}", (i + 1) % 10))))
            .collect();
        assert_eq!(cycles_of(&records).len(), 1);
    }

    #[test]
    fn test_root_edges_are_terminal() {
        let records = vec![
            record("base_skill", json!("base_skill")),
            record("a", json!("base_skill")),
            record("b", json!(["base_skill", "a"])),
        ];
        assert!(cycles_of(&records).is_empty());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let records = vec![
            record("top", json!(null)),
            record("left", json!("top")),
            record("right", json!("top")),
            record("bottom", json!(["left", "right"])),
        ];
        assert!(cycles_of(&records).is_empty());
    }
}
