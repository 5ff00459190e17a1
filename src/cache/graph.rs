//! Association Graph Module
//!
//! Undirected adjacency between model names, used to cascade invalidation
//! from a written model to every model related to it.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

// == Model Name ==
/// Name of a model, used as a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelName(String);

impl ModelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModelName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ModelName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// == Association Graph ==
/// Symmetric, append-only association graph.
#[derive(Debug, Default)]
pub struct AssociationGraph {
    /// Neighbours of each node in discovery order
    adjacency: HashMap<ModelName, Vec<ModelName>>,
}

impl AssociationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // == Add Edge ==
    /// Records `a <-> b`. Adding an existing edge is a no-op.
    ///
    /// Returns true if the edge is new.
    pub fn add_edge(&mut self, a: impl Into<ModelName>, b: impl Into<ModelName>) -> bool {
        let a = a.into();
        let b = b.into();
        let added = Self::link(&mut self.adjacency, &a, &b);
        if a != b {
            Self::link(&mut self.adjacency, &b, &a);
        }
        added
    }

    fn link(
        adjacency: &mut HashMap<ModelName, Vec<ModelName>>,
        from: &ModelName,
        to: &ModelName,
    ) -> bool {
        let neighbours = adjacency.entry(from.clone()).or_default();
        if neighbours.contains(to) {
            false
        } else {
            neighbours.push(to.clone());
            true
        }
    }

    /// Neighbours of `name` in discovery order.
    pub fn neighbours(&self, name: &str) -> &[ModelName] {
        self.adjacency
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        let directed: usize = self.adjacency.values().map(Vec::len).sum();
        let loops = self
            .adjacency
            .iter()
            .filter(|(node, neighbours)| neighbours.contains(node))
            .count();
        (directed - loops) / 2 + loops
    }

    // == Closure ==
    /// Every node reachable from `roots`, roots included, in breadth-first
    /// order. Each node appears once; cycles terminate.
    pub fn closure<I, S>(&self, roots: I) -> Vec<ModelName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut visited: HashSet<ModelName> = HashSet::new();
        let mut queue: VecDeque<ModelName> = VecDeque::new();
        let mut reached = Vec::new();

        for root in roots {
            let root = ModelName::new(root.as_ref());
            if visited.insert(root.clone()) {
                queue.push_back(root);
            }
        }

        while let Some(node) = queue.pop_front() {
            for next in self.neighbours(node.as_str()) {
                if visited.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
            reached.push(node);
        }

        reached
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn names(nodes: &[ModelName]) -> Vec<&str> {
        nodes.iter().map(ModelName::as_str).collect()
    }

    #[test]
    fn test_add_edge_is_symmetric() {
        let mut graph = AssociationGraph::new();

        assert!(graph.add_edge("User", "Post"));

        assert_eq!(graph.neighbours("User"), [ModelName::from("Post")]);
        assert_eq!(graph.neighbours("Post"), [ModelName::from("User")]);
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut graph = AssociationGraph::new();

        graph.add_edge("User", "Post");
        assert!(!graph.add_edge("User", "Post"));
        assert!(!graph.add_edge("Post", "User"));

        assert_eq!(graph.neighbours("User").len(), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_closure_of_isolated_node_is_itself() {
        let graph = AssociationGraph::new();
        assert_eq!(names(&graph.closure(["User"])), ["User"]);
    }

    #[test]
    fn test_closure_is_transitive() {
        let mut graph = AssociationGraph::new();
        graph.add_edge("User", "Post");
        graph.add_edge("Post", "Comment");
        graph.add_edge("Tag", "Label");

        let reached = graph.closure(["User"]);

        assert_eq!(names(&reached), ["User", "Post", "Comment"]);
    }

    #[test]
    fn test_closure_terminates_on_cycle() {
        let mut graph = AssociationGraph::new();
        graph.add_edge("A", "B");
        graph.add_edge("B", "C");
        graph.add_edge("C", "A");

        for root in ["A", "B", "C"] {
            let mut reached = names(&graph.closure([root]))
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>();
            reached.sort();
            assert_eq!(reached, ["A", "B", "C"]);
        }
    }

    #[test]
    fn test_closure_multiple_roots_deduplicated() {
        let mut graph = AssociationGraph::new();
        graph.add_edge("A", "B");

        let reached = graph.closure(["A", "B", "A"]);
        assert_eq!(names(&reached), ["A", "B"]);
    }

    #[test]
    fn test_self_association() {
        let mut graph = AssociationGraph::new();
        graph.add_edge("Node", "Node");

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(names(&graph.closure(["Node"])), ["Node"]);
    }
}
