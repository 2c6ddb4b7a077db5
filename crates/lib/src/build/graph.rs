//! Target dependency graph.
//!
//! The graph holds every target reachable from the requested one. Edges point
//! from a dependent to its dependencies, so a depth-first post-order walk from
//! the root yields dependencies before dependents.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

use super::target::Target;
use super::types::BuildError;

pub struct TargetGraph {
  graph: DiGraph<String, ()>,
  root: NodeIndex,
}

impl TargetGraph {
  /// Build the graph reachable from `root`.
  ///
  /// # Errors
  ///
  /// - `UnknownTarget` if `root` or any dependency is not in `targets`
  /// - `Cycle` if a target is reachable from itself; the error lists the
  ///   cycle starting and ending with the repeated target
  pub fn resolve(targets: &HashMap<String, Target>, root: &str) -> Result<Self, BuildError> {
    let mut builder = GraphBuilder {
      targets,
      graph: DiGraph::new(),
      nodes: HashMap::new(),
      path: Vec::new(),
    };
    let root = builder.visit(root)?;

    Ok(Self {
      graph: builder.graph,
      root,
    })
  }

  /// Targets in the order they must run: every dependency before its dependents,
  /// each target once.
  pub fn execution_order(&self) -> Vec<String> {
    let mut order = Vec::with_capacity(self.graph.node_count());
    let mut dfs = DfsPostOrder::new(&self.graph, self.root);
    while let Some(idx) = dfs.next(&self.graph) {
      order.push(self.graph[idx].clone());
    }
    order
  }

  /// Number of targets reachable from the root, including the root.
  pub fn target_count(&self) -> usize {
    self.graph.node_count()
  }
}

struct GraphBuilder<'a> {
  targets: &'a HashMap<String, Target>,
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
  /// Targets on the active depth-first path.
  path: Vec<String>,
}

impl GraphBuilder<'_> {
  fn visit(&mut self, name: &str) -> Result<NodeIndex, BuildError> {
    if let Some(start) = self.path.iter().position(|active| active == name) {
      let mut cycle = self.path[start..].to_vec();
      cycle.push(name.to_string());
      return Err(BuildError::Cycle { cycle });
    }

    // Off the active path, a known node is fully explored.
    if let Some(&idx) = self.nodes.get(name) {
      return Ok(idx);
    }

    let target = self
      .targets
      .get(name)
      .ok_or_else(|| BuildError::UnknownTarget(name.to_string()))?;

    let idx = self.graph.add_node(name.to_string());
    self.nodes.insert(name.to_string(), idx);

    self.path.push(name.to_string());
    let mut deps = Vec::with_capacity(target.dependencies().len());
    for dep in target.dependencies() {
      deps.push(self.visit(dep)?);
    }
    self.path.pop();

    // DfsPostOrder stacks neighbors, which petgraph yields newest first, so
    // edges added in declaration order are walked in declaration order.
    for dep in deps {
      self.graph.add_edge(idx, dep, ());
    }

    Ok(idx)
  }
}
