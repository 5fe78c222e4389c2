//! Dependency-graph algorithms over unit `dependsOn` edges: a deterministic
//! topological order for apply/teardown and a worst-case cumulative wait
//! estimate. Both are built fresh per call from an adjacency walk with
//! explicit visited marking, so cyclic graphs terminate instead of recursing
//! forever.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::model::Kustomization;

/// Topological order for applying units: every unit appears after all of its
/// declared dependencies. Traversal follows declared unit and dependency
/// order, so identical input yields an identical order. Cycles are tolerated
/// via visited marking; every unit appears exactly once. Dependencies naming
/// no declared unit are ignored.
pub fn apply_order(units: &[Kustomization]) -> Vec<String> {
    let nodes = node_map(units);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut order: Vec<String> = Vec::with_capacity(units.len());
    for unit in units {
        visit(unit, &nodes, &mut visited, &mut order);
    }
    order
}

/// Teardown order: the apply order reversed, so every unit appears before
/// everything it depends on.
pub fn teardown_order(units: &[Kustomization]) -> Vec<String> {
    let mut order = apply_order(units);
    order.reverse();
    order
}

fn visit<'a>(
    unit: &'a Kustomization,
    nodes: &HashMap<&'a str, &'a Kustomization>,
    visited: &mut HashSet<&'a str>,
    order: &mut Vec<String>,
) {
    if !visited.insert(unit.name.as_str()) {
        return;
    }
    for dep in &unit.depends_on {
        if let Some(dependency) = nodes.get(dep.as_str()) {
            visit(dependency, nodes, visited, order);
        }
    }
    order.push(unit.name.clone());
}

/// Worst-case cumulative wait across the graph: the longest dependency chain
/// measured in effective per-unit timeouts.
///
/// The walk starts from every root (a unit nothing depends on); when the
/// graph has no root (a cycle spans it) every unit is a start. A node
/// re-encountered on the current path contributes its timeout exactly once
/// more and the walk stops descending there, bounding cycles. The on-path
/// flag is cleared on backtrack so shared dependencies count on every branch.
pub fn max_wait(units: &[Kustomization]) -> Duration {
    let nodes = node_map(units);

    let mut depended_on: HashSet<&str> = HashSet::new();
    for unit in units {
        for dep in &unit.depends_on {
            depended_on.insert(dep.as_str());
        }
    }

    let roots: Vec<&Kustomization> = units
        .iter()
        .filter(|u| !depended_on.contains(u.name.as_str()))
        .collect();
    let starts = if roots.is_empty() {
        units.iter().collect()
    } else {
        roots
    };

    let mut max = Duration::ZERO;
    for start in starts {
        let mut on_path: HashSet<&str> = HashSet::new();
        descend(start, &nodes, &mut on_path, Duration::ZERO, &mut max);
    }
    max
}

fn descend<'a>(
    unit: &'a Kustomization,
    nodes: &HashMap<&'a str, &'a Kustomization>,
    on_path: &mut HashSet<&'a str>,
    total_so_far: Duration,
    max: &mut Duration,
) {
    let total = total_so_far + unit.effective_timeout();
    if total > *max {
        *max = total;
    }
    on_path.insert(unit.name.as_str());
    for dep in &unit.depends_on {
        if let Some(dependency) = nodes.get(dep.as_str()) {
            if on_path.contains(dep.as_str()) {
                let bounded = total + dependency.effective_timeout();
                if bounded > *max {
                    *max = bounded;
                }
            } else {
                descend(dependency, nodes, on_path, total, max);
            }
        }
    }
    on_path.remove(unit.name.as_str());
}

fn node_map(units: &[Kustomization]) -> HashMap<&str, &Kustomization> {
    units.iter().map(|u| (u.name.as_str(), u)).collect()
}
