//! Blocking graph for issues
//!
//! Tracks blocked-by edges across the live issue set with cycle prevention.
//! Uses petgraph for graph operations. Edges run blockee -> blocker, the
//! same direction as each issue's `blocks` list.

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use super::id::IssueId;
use super::issue::Issue;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(IssueId, IssueId),

    #[error("Issue not found in graph: {0}")]
    IssueNotFound(IssueId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(IssueId),
}

/// A blocking graph over issue IDs
#[derive(Debug, Default)]
pub struct BlockGraph {
    graph: DiGraph<IssueId, ()>,
    node_map: HashMap<IssueId, NodeIndex>,
}

impl BlockGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds a graph from a collection of issues and their `blocks` lists.
    ///
    /// Edges to IDs missing from the collection are skipped: the store may
    /// hold dangling references after a delete, and queries must still work.
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut graph = Self::new();

        let issues: Vec<_> = issues.into_iter().collect();
        for issue in &issues {
            graph.add_node(issue.id.clone());
        }

        for issue in &issues {
            for blocker in &issue.blocks {
                if graph.contains(blocker) {
                    // Existing store state is trusted; no cycle re-check here
                    graph.add_raw_edge(&issue.id, blocker);
                }
            }
        }

        graph
    }

    /// Adds a node to the graph
    pub fn add_node(&mut self, id: IssueId) {
        if !self.node_map.contains_key(&id) {
            let idx = self.graph.add_node(id.clone());
            self.node_map.insert(id, idx);
        }
    }

    fn add_raw_edge(&mut self, blockee: &IssueId, blocker: &IssueId) {
        if let (Some(&a), Some(&b)) = (self.node_map.get(blockee), self.node_map.get(blocker)) {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Adds a blocked-by edge: `blockee` waits on `blocker`.
    ///
    /// The reachability check runs before any mutation, so a rejected edge
    /// leaves the graph untouched.
    pub fn add_edge(&mut self, blockee: &IssueId, blocker: &IssueId) -> Result<(), GraphError> {
        if blockee == blocker {
            return Err(GraphError::SelfDependency(blockee.clone()));
        }

        let blockee_idx = *self
            .node_map
            .get(blockee)
            .ok_or_else(|| GraphError::IssueNotFound(blockee.clone()))?;

        let blocker_idx = *self
            .node_map
            .get(blocker)
            .ok_or_else(|| GraphError::IssueNotFound(blocker.clone()))?;

        // blockee already reachable from blocker means the new edge would
        // close a cycle
        if has_path_connecting(&self.graph, blocker_idx, blockee_idx, None) {
            return Err(GraphError::CycleDetected(
                blockee.clone(),
                blocker.clone(),
            ));
        }

        self.graph.add_edge(blockee_idx, blocker_idx, ());
        Ok(())
    }

    /// Removes a blocked-by edge; returns true if it existed
    pub fn remove_edge(&mut self, blockee: &IssueId, blocker: &IssueId) -> bool {
        let (blockee_idx, blocker_idx) =
            match (self.node_map.get(blockee), self.node_map.get(blocker)) {
                (Some(&a), Some(&b)) => (a, b),
                _ => return false,
            };

        if let Some(edge) = self.graph.find_edge(blockee_idx, blocker_idx) {
            self.graph.remove_edge(edge);
            true
        } else {
            false
        }
    }

    /// Returns the direct blockers of an issue
    pub fn blockers(&self, id: &IssueId) -> Vec<IssueId> {
        let idx = match self.node_map.get(id) {
            Some(idx) => *idx,
            None => return vec![],
        };

        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Returns the issues directly waiting on this one
    pub fn dependents(&self, id: &IssueId) -> Vec<IssueId> {
        let idx = match self.node_map.get(id) {
            Some(idx) => *idx,
            None => return vec![],
        };

        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Returns true if the graph contains the issue
    pub fn contains(&self, id: &IssueId) -> bool {
        self.node_map.contains_key(id)
    }

    /// Returns the number of issues in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::Level;
    use crate::domain::issue::Kind;

    fn make_id(seq: u32) -> IssueId {
        IssueId::new_scoped(Level::Task, seq, &format!("task {}", seq))
    }

    #[test]
    fn empty_graph() {
        let graph = BlockGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn add_edge_and_query() {
        let mut graph = BlockGraph::new();
        let a = make_id(1);
        let b = make_id(2);

        graph.add_node(a.clone());
        graph.add_node(b.clone());

        // b waits on a
        graph.add_edge(&b, &a).unwrap();

        assert_eq!(graph.blockers(&b), vec![a.clone()]);
        assert_eq!(graph.dependents(&a), vec![b.clone()]);
    }

    #[test]
    fn direct_cycle_rejected() {
        let mut graph = BlockGraph::new();
        let a = make_id(1);
        let b = make_id(2);

        graph.add_node(a.clone());
        graph.add_node(b.clone());

        graph.add_edge(&b, &a).unwrap();
        let result = graph.add_edge(&a, &b);

        assert!(matches!(result, Err(GraphError::CycleDetected(_, _))));
        // the rejected edge left nothing behind
        assert!(graph.blockers(&a).is_empty());
    }

    #[test]
    fn transitive_cycle_rejected() {
        let mut graph = BlockGraph::new();
        let a = make_id(1);
        let b = make_id(2);
        let c = make_id(3);

        graph.add_node(a.clone());
        graph.add_node(b.clone());
        graph.add_node(c.clone());

        graph.add_edge(&b, &a).unwrap();
        graph.add_edge(&c, &b).unwrap();

        // a waiting on c would close a -> c -> b -> a
        let result = graph.add_edge(&a, &c);
        assert!(matches!(result, Err(GraphError::CycleDetected(_, _))));
        assert!(graph.blockers(&a).is_empty());
    }

    #[test]
    fn self_dependency_rejected() {
        let mut graph = BlockGraph::new();
        let a = make_id(1);
        graph.add_node(a.clone());

        let result = graph.add_edge(&a, &a);
        assert!(matches!(result, Err(GraphError::SelfDependency(_))));
    }

    #[test]
    fn unknown_issue_rejected() {
        let mut graph = BlockGraph::new();
        let a = make_id(1);
        let b = make_id(2);
        graph.add_node(a.clone());

        let result = graph.add_edge(&a, &b);
        assert!(matches!(result, Err(GraphError::IssueNotFound(_))));
    }

    #[test]
    fn remove_edge() {
        let mut graph = BlockGraph::new();
        let a = make_id(1);
        let b = make_id(2);

        graph.add_node(a.clone());
        graph.add_node(b.clone());
        graph.add_edge(&b, &a).unwrap();

        assert!(graph.remove_edge(&b, &a));
        assert!(!graph.remove_edge(&b, &a));
        assert!(graph.blockers(&b).is_empty());
    }

    #[test]
    fn from_issues_builds_edges() {
        let a = Issue::new(make_id(1), Kind::Task, "Task 1");
        let mut b = Issue::new(make_id(2), Kind::Task, "Task 2");
        b.add_blocker(a.id.clone());

        let graph = BlockGraph::from_issues([&a, &b]);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.blockers(&b.id), vec![a.id]);
    }

    #[test]
    fn from_issues_skips_dangling_blockers() {
        let mut a = Issue::new(make_id(1), Kind::Task, "Task 1");
        a.add_blocker(make_id(99));

        let graph = BlockGraph::from_issues([&a]);

        assert_eq!(graph.len(), 1);
        assert!(graph.blockers(&a.id).is_empty());
    }

    #[test]
    fn long_chain_reachability() {
        let mut graph = BlockGraph::new();
        let ids: Vec<_> = (1..=100).map(make_id).collect();

        for id in &ids {
            graph.add_node(id.clone());
        }
        for pair in ids.windows(2) {
            graph.add_edge(&pair[1], &pair[0]).unwrap();
        }

        // closing the whole chain back on itself is still detected
        let result = graph.add_edge(&ids[0], &ids[99]);
        assert!(matches!(result, Err(GraphError::CycleDetected(_, _))));
    }
}
