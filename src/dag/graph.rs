// src/dag/graph.rs

use std::collections::HashMap;

use crate::engine::TaskName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Prerequisites in declaration order, without duplicates.
    deps: Vec<TaskName>,
    /// Tasks that list this one as a prerequisite.
    dependents: Vec<TaskName>,
}

/// Read-only dependency map keyed by human-readable task name.
///
/// Acyclicity is checked in `config::validate`; here we only keep adjacency
/// information for dependency checks and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<TaskName, DagNode>,
}

impl DagGraph {
    /// Build from `(task, prerequisites)` pairs. Later pairs for the same
    /// task replace earlier ones; repeated prerequisites are collapsed.
    pub fn from_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = (TaskName, Vec<TaskName>)>,
    {
        let mut nodes: HashMap<TaskName, DagNode> = HashMap::new();

        for (name, prereqs) in definitions {
            let mut deps: Vec<TaskName> = Vec::with_capacity(prereqs.len());
            for dep in prereqs {
                let dep = dep.trim().to_string();
                if !dep.is_empty() && !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            nodes.entry(name).or_default().deps = deps;
        }

        // Second pass: populate dependents based on deps.
        let edges: Vec<(TaskName, TaskName)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |d| (d.clone(), name.clone())))
            .collect();

        for (dep, dependent) in edges {
            nodes.entry(dep).or_default().dependents.push(dependent);
        }

        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return all task names.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate prerequisites of a task. Unknown tasks have none.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks that list `name` as a prerequisite.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_keep_order_and_drop_duplicates() {
        let graph = DagGraph::from_definitions(vec![
            ("C".to_string(), vec!["B".into(), "A".into(), "B".into()]),
            ("A".to_string(), vec![]),
        ]);

        assert_eq!(graph.dependencies_of("C"), ["B".to_string(), "A".to_string()]);
        assert_eq!(graph.dependents_of("A"), ["C".to_string()]);
        assert!(graph.dependencies_of("missing").is_empty());
    }
}
