//! Inheritance graph for one entity type
//!
//! Nodes are entity names, edges point child → parent. Edges into the
//! sentinel root are kept for rendering but flagged, since they terminate
//! resolution rather than participate in it.

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};

use crate::entity::{EntityRecord, EntityType};

/// Edge payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendsEdge {
    /// Position of the parent in the child's `extends` list
    pub position: usize,
    /// Edge points at the sentinel root
    pub to_root: bool,
}

#[derive(Debug, Clone)]
pub struct InheritanceGraph {
    entity_type: EntityType,
    graph: DiGraph<String, ExtendsEdge>,
    nodes: HashMap<String, NodeIndex>,
    /// Names with a backing record (others are dangling targets)
    defined: HashMap<String, bool>,
}

impl InheritanceGraph {
    pub fn build<'a>(
        entity_type: EntityType,
        records: impl IntoIterator<Item = &'a EntityRecord>,
        sentinel_root: Option<&str>,
    ) -> Self {
        let mut this = Self {
            entity_type,
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            defined: HashMap::new(),
        };

        for record in records {
            let Some(name) = record.name.as_deref() else { continue };
            let child = this.node(name);
            this.defined.insert(name.to_string(), true);
            for (position, parent) in record.extends.iter().enumerate() {
                let to = this.node(parent);
                let to_root = Some(parent.as_str()) == sentinel_root;
                this.graph.add_edge(child, to, ExtendsEdge { position, to_root });
            }
        }

        this
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        self.defined.entry(name.to_string()).or_insert(false);
        idx
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `from` reaches `to` following non-root extends edges
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let (Some(&a), Some(&b)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return false;
        };
        let filtered = petgraph::visit::EdgeFiltered::from_fn(&self.graph, |e| !e.weight().to_root);
        has_path_connecting(&filtered, a, b, None)
    }

    /// Names on a directed cycle through `name`, including `name` itself
    pub fn cycle_members(&self, name: &str) -> BTreeSet<String> {
        self.nodes
            .keys()
            .filter(|n| n.as_str() == name || (self.reaches(name, n) && self.reaches(n, name)))
            .cloned()
            .collect()
    }

    /// Direct parents of `name`, in declaration order
    pub fn parents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.sort_by_key(|e| e.weight().position);
        edges
            .into_iter()
            .map(|e| self.graph[e.target()].as_str())
            .collect()
    }

    /// Graphviz rendering; dangling targets are drawn dashed red
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("digraph {}Inheritance {{\n", capitalize(self.entity_type.as_str())));
        output.push_str("  rankdir=BT;\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10, fillcolor=\"#E3F2FD\"];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n");
        output.push('\n');

        let mut names: Vec<&String> = self.nodes.keys().collect();
        names.sort();
        for name in names {
            if self.defined.get(name.as_str()).copied().unwrap_or(false) {
                output.push_str(&format!("  \"{}\";\n", name));
            } else {
                output.push_str(&format!(
                    "  \"{}\" [style=\"dashed\", color=\"#F44336\", fillcolor=\"white\"];\n",
                    name
                ));
            }
        }

        output.push('\n');

        let mut edges: Vec<(String, String, ExtendsEdge)> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()].clone(), self.graph[e.target()].clone(), *e.weight()))
            .collect();
        edges.sort_by(|a, b| (&a.0, a.2.position).cmp(&(&b.0, b.2.position)));
        for (from, to, weight) in edges {
            if weight.to_root {
                output.push_str(&format!("  \"{}\" -> \"{}\" [style=\"dotted\"];\n", from, to));
            } else {
                output.push_str(&format!("  \"{}\" -> \"{}\";\n", from, to));
            }
        }

        output.push_str("}\n");
        output
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_reaches_skips_root_edges() {
        let records = vec![
            record("base_skill", json!(null)),
            record("a", json!("base_skill")),
            record("b", json!("a")),
        ];
        let graph = InheritanceGraph::build(EntityType::Skill, &records, Some("base_skill"));
        assert!(graph.reaches("b", "a"));
        assert!(!graph.reaches("b", "base_skill"));
        assert!(!graph.reaches("a", "b"));
    }

    #[test]
    fn test_parents_keep_declaration_order() {
        let records = vec![record("c", json!(["b", "a"]))];
        let graph = InheritanceGraph::build(EntityType::Skill, &records, None);
        assert_eq!(graph.parents("c"), vec!["b", "a"]);
    }

    #[test]
    fn test_dot_marks_dangling_targets() {
        let records = vec![record("a", json!("ghost"))];
        let graph = InheritanceGraph::build(EntityType::Skill, &records, None);
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph SkillInheritance {"));
        assert!(dot.contains("\"ghost\" [style=\"dashed\""));
        assert!(dot.contains("\"a\" -> \"ghost\";"));
    }
}
