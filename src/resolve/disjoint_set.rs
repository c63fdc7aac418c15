//! Disjoint set (union-find) over arbitrary hashable keys
//!
//! Path compression in `find`, union by rank in `union`. Elements are added
//! lazily the first time they are seen.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct DisjointSet<T> {
    index: HashMap<T, usize>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl<T> Default for DisjointSet<T> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            parent: Vec::new(),
            rank: Vec::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> DisjointSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct elements seen so far
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    fn slot(&mut self, item: &T) -> usize {
        if let Some(&i) = self.index.get(item) {
            return i;
        }
        let i = self.parent.len();
        self.index.insert(item.clone(), i);
        self.parent.push(i);
        self.rank.push(0);
        i
    }

    fn find_slot(&mut self, mut i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // second walk compresses the path
        while self.parent[i] != root {
            let next = self.parent[i];
            self.parent[i] = root;
            i = next;
        }
        root
    }

    /// Representative slot of `item`'s set
    pub fn find(&mut self, item: &T) -> usize {
        let i = self.slot(item);
        self.find_slot(i)
    }

    /// Whether `a` and `b` are already in the same set
    pub fn connected(&mut self, a: &T, b: &T) -> bool {
        self.find(a) == self.find(b)
    }

    /// Merge the sets of `a` and `b`. Returns `false` if they were already
    /// joined, which means the edge a–b closes an (undirected) cycle.
    pub fn union(&mut self, a: &T, b: &T) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_find() {
        let mut ds = DisjointSet::new();
        assert!(ds.union(&"a", &"b"));
        assert!(ds.union(&"c", &"d"));
        assert!(!ds.connected(&"a", &"c"));
        assert!(ds.union(&"b", &"c"));
        assert!(ds.connected(&"a", &"d"));
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn test_union_reports_existing_connection() {
        let mut ds = DisjointSet::new();
        assert!(ds.union(&"a", &"b"));
        assert!(ds.union(&"b", &"c"));
        assert!(!ds.union(&"c", &"a"));
    }

    #[test]
    fn test_long_chain_compresses() {
        let mut ds = DisjointSet::new();
        for i in 0..1000u32 {
            ds.union(&i, &(i + 1));
        }
        let root = ds.find(&1000);
        assert_eq!(ds.find(&0), root);
        assert!(!ds.union(&0, &1000));
    }
}
