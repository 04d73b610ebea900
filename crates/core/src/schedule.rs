//! Dependency graph construction and scheduling
//!
//! Named commands form a directed graph with an edge from each dependency to
//! its dependent. [`schedule`] validates the graph and produces a linear
//! order with Kahn's algorithm: every command follows all of its
//! dependencies, and among commands that are ready at the same time the one
//! declared first goes first. Unnamed commands are appended in file order.

use std::collections::{HashMap, VecDeque};

use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;

use crate::configs::stepfile::StepfileConfig;
use crate::results::CommandId;
use crate::types::{StepfileError, StepfileResult};

/// A dependency that does not name any command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub dependency: String,
    /// Label of the command that requires it
    pub command: String,
}

/// Graph over named commands, nodes indexed in declaration order
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    missing: Vec<MissingDependency>,
}

impl DependencyGraph {
    /// Build the graph, recording unknown dependencies instead of failing
    pub fn from_config(config: &StepfileConfig) -> Self {
        let mut graph = DiGraph::<String, ()>::new();
        let mut nodes = HashMap::new();

        for command in config.named_commands() {
            let name = command.label().to_string();
            let node_index = graph.add_node(name.clone());
            nodes.insert(name, node_index);
        }

        let mut missing = Vec::new();
        for command in config.named_commands() {
            let to_node = nodes[command.label()];
            for dep in &command.depends_on {
                match nodes.get(dep) {
                    // Edge: dependency -> dependent (dependency comes first)
                    Some(&from_node) => {
                        graph.add_edge(from_node, to_node, ());
                    }
                    None => missing.push(MissingDependency {
                        dependency: dep.clone(),
                        command: command.label().to_string(),
                    }),
                }
            }
        }

        for command in config.unnamed_commands() {
            for dep in &command.depends_on {
                if !nodes.contains_key(dep) {
                    missing.push(MissingDependency {
                        dependency: dep.clone(),
                        command: command.label().to_string(),
                    });
                }
            }
        }

        Self {
            graph,
            nodes,
            missing,
        }
    }

    /// Dependencies that do not resolve, in declaration order
    pub fn missing(&self) -> &[MissingDependency] {
        &self.missing
    }

    /// Fail on the first unknown dependency
    pub fn validate(&self) -> StepfileResult<()> {
        match self.missing.first() {
            Some(missing) => Err(StepfileError::UnknownDependency {
                dependency: missing.dependency.clone(),
                command: missing.command.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Strongly connected components that form cycles, including
    /// self-dependencies
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let graph = &self.graph;
        let mut cycles: Vec<Vec<String>> = kosaraju_scc(graph)
            .into_iter()
            .filter_map(|component| {
                if component.len() > 1 {
                    let mut cycle = component
                        .iter()
                        .map(|node| graph[*node].clone())
                        .collect::<Vec<_>>();
                    cycle.sort();
                    Some(cycle)
                } else {
                    let node = component[0];
                    if graph.contains_edge(node, node) {
                        Some(vec![graph[node].clone()])
                    } else {
                        None
                    }
                }
            })
            .collect();

        cycles.sort();
        cycles
    }

    /// Kahn's algorithm over the named commands
    pub fn topological_order(&self) -> StepfileResult<Vec<String>> {
        let graph = &self.graph;
        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|node| graph.neighbors_directed(node, Incoming).count())
            .collect();

        // Node indices follow declaration order, which is the tie-break
        let mut queue: VecDeque<NodeIndex> = graph
            .node_indices()
            .filter(|node| in_degree[node.index()] == 0)
            .collect();

        let mut sorted = Vec::with_capacity(graph.node_count());
        let mut emitted = vec![false; graph.node_count()];

        while let Some(node) = queue.pop_front() {
            sorted.push(graph[node].clone());
            emitted[node.index()] = true;

            // One decrement per edge, so repeated dependencies stay balanced
            let mut ready = Vec::new();
            for dependent in graph.neighbors_directed(node, Outgoing) {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(dependent);
                }
            }
            ready.sort();
            queue.extend(ready);
        }

        if sorted.len() != graph.node_count() {
            let remaining = graph
                .node_indices()
                .filter(|node| !emitted[node.index()])
                .map(|node| graph[node].clone())
                .collect();
            return Err(StepfileError::CircularDependency {
                remaining,
                cycles: self.cycles(),
            });
        }

        Ok(sorted)
    }
}

/// Render cycles as closed paths, `a -> b -> a; c -> c`
pub fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut path = cycle.clone();
            if let Some(first) = path.first().cloned() {
                path.push(first);
            }
            path.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Linear execution order for a Stepfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    order: Vec<CommandId>,
}

impl ExecutionPlan {
    #[cfg(test)]
    pub(crate) fn from_order(order: Vec<CommandId>) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &[CommandId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names of the named commands, in order
    pub fn named(&self) -> impl Iterator<Item = &str> {
        self.order.iter().filter_map(CommandId::name)
    }
}

/// Validate dependencies and compute the execution order.
///
/// Group dependencies must already be expanded. Unknown dependencies and
/// cycles are reported before anything runs.
pub fn schedule(config: &StepfileConfig) -> StepfileResult<ExecutionPlan> {
    let graph = DependencyGraph::from_config(config);
    graph.validate()?;

    let mut order: Vec<CommandId> = graph
        .topological_order()?
        .into_iter()
        .map(CommandId::Named)
        .collect();
    order.extend((0..config.unnamed_commands().len()).map(CommandId::Unnamed));

    Ok(ExecutionPlan { order })
}
