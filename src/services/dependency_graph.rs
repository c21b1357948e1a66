use std::collections::{HashMap, HashSet};

use crate::error::{AppError, AppResult};
use crate::models::dependency::TaskDependency;

/// Groups dependency edges by source task: task_id -> ids the task waits on.
pub fn dependency_map(edges: &[TaskDependency]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for edge in edges {
        map.entry(edge.task_id.clone())
            .or_default()
            .push(edge.dependency_id.clone());
    }
    map
}

/// Fails with `DependencyCycle` if the edge set contains a cycle. Runs
/// before model construction; scheduling never starts on a cyclic graph.
pub fn ensure_acyclic(edges: &[TaskDependency]) -> AppResult<()> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        adjacency
            .entry(edge.task_id.as_str())
            .or_default()
            .push(edge.dependency_id.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();

    let mut nodes: Vec<&str> = adjacency.keys().copied().collect();
    nodes.sort_unstable();
    for node in nodes {
        if !visited.contains(node) {
            if let Some(cycle) = visit(node, &adjacency, &mut visited, &mut stack, &mut path) {
                return Err(AppError::dependency_cycle(
                    cycle.into_iter().map(String::from).collect(),
                ));
            }
        }
    }

    Ok(())
}

fn visit<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<&'a str>> {
    visited.insert(node);
    stack.insert(node);
    path.push(node);

    if let Some(neighbours) = adjacency.get(node) {
        for next in neighbours {
            if stack.contains(next) {
                // Close the loop: the cycle runs from the first occurrence
                // of `next` in the current path back to `node`.
                let from = path.iter().position(|n| n == next).unwrap_or(0);
                let mut cycle: Vec<&str> = path[from..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            if !visited.contains(next) {
                if let Some(cycle) = visit(next, adjacency, visited, stack, path) {
                    return Some(cycle);
                }
            }
        }
    }

    stack.remove(node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(task: &str, dependency: &str) -> TaskDependency {
        TaskDependency::new(task, dependency)
    }

    #[test]
    fn acyclic_chain_passes() {
        let edges = vec![edge("c", "b"), edge("b", "a")];
        assert!(ensure_acyclic(&edges).is_ok());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let edges = vec![
            edge("d", "b"),
            edge("d", "c"),
            edge("b", "a"),
            edge("c", "a"),
        ];
        assert!(ensure_acyclic(&edges).is_ok());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let edges = vec![edge("a", "a")];
        let error = ensure_acyclic(&edges).unwrap_err();
        assert!(matches!(error, AppError::DependencyCycle { .. }));
    }

    #[test]
    fn cycle_reports_its_path() {
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        match ensure_acyclic(&edges) {
            Err(AppError::DependencyCycle { path }) => {
                assert!(path.len() >= 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected a dependency cycle, got {other:?}"),
        }
    }

    #[test]
    fn dependency_map_groups_by_source() {
        let edges = vec![edge("a", "b"), edge("a", "c"), edge("b", "c")];
        let map = dependency_map(&edges);
        assert_eq!(map["a"], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(map["b"], vec!["c".to_string()]);
        assert!(!map.contains_key("c"));
    }
}
