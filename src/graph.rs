// src/graph.rs

//! Migration graph and planner
//!
//! Versions are vertices, script directories are directed edges: an
//! install directory for V is the edge `0 -> V`, a transition directory
//! `V1-V2` is the edge `V1 -> V2`. A plan is the shortest edge chain from
//! the current version to the target. Upgrade-then-downgrade layouts form
//! cycles; the search carries a visited set, so cycles are legal.

use crate::error::{Error, Result};
use crate::version::Version;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::debug;

/// One directed migration step, labelled with the directory that holds
/// its scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: Version,
    pub to: Version,
    /// Name of the script directory, e.g. `0.01` or `0.01-0.02`.
    #[serde(rename = "directory")]
    pub dir_name: String,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// The directed graph of version transitions for one schema and driver.
#[derive(Debug)]
pub struct MigrationGraph {
    vertices: BTreeSet<Version>,
    adjacency: BTreeMap<Version, Vec<Edge>>,
}

impl MigrationGraph {
    pub fn new(edges: Vec<Edge>) -> Self {
        let mut vertices = BTreeSet::new();
        vertices.insert(Version::zero());
        let mut adjacency: BTreeMap<Version, Vec<Edge>> = BTreeMap::new();
        for edge in edges {
            vertices.insert(edge.from.clone());
            vertices.insert(edge.to.clone());
            adjacency.entry(edge.from.clone()).or_default().push(edge);
        }
        MigrationGraph { vertices, adjacency }
    }

    /// Whether `version` appears in the graph. The zero sentinel always
    /// does.
    pub fn contains(&self, version: &Version) -> bool {
        self.vertices.contains(version)
    }

    /// Compute the shortest plan (by edge count) from `from` to `to`.
    ///
    /// Ties between equally short paths are broken deterministically:
    /// breadth-first expansion visits a vertex's out-edges ordered by
    /// target version - ascending when the overall move is upward,
    /// descending when downward - then by directory name. `from == to`
    /// yields the empty plan.
    pub fn plan(&self, from: &Version, to: &Version) -> Result<Vec<Edge>> {
        if from == to {
            return Ok(Vec::new());
        }

        let upward = to > from;
        let mut visited: HashSet<Version> = HashSet::new();
        let mut parent: HashMap<Version, Edge> = HashMap::new();
        let mut queue: VecDeque<Version> = VecDeque::new();

        visited.insert(from.clone());
        queue.push_back(from.clone());

        while let Some(vertex) = queue.pop_front() {
            let mut out: Vec<&Edge> = self
                .adjacency
                .get(&vertex)
                .map(|edges| edges.iter().collect())
                .unwrap_or_default();
            out.sort_by(|a, b| {
                let by_target = if upward {
                    a.to.cmp(&b.to)
                } else {
                    b.to.cmp(&a.to)
                };
                match by_target {
                    Ordering::Equal => a.dir_name.cmp(&b.dir_name),
                    unequal => unequal,
                }
            });

            for edge in out {
                if !visited.insert(edge.to.clone()) {
                    continue;
                }
                parent.insert(edge.to.clone(), edge.clone());
                if &edge.to == to {
                    let plan = reconstruct(&parent, from, to);
                    debug!("planned {} step(s) from {} to {}", plan.len(), from, to);
                    return Ok(plan);
                }
                queue.push_back(edge.to.clone());
            }
        }

        Err(Error::NoMigrationPath {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// The highest version reachable from `from`, or `from` itself when
    /// nothing else is. Fails with [`Error::UnknownCurrentVersion`] when
    /// `from` does not appear in the graph at all.
    pub fn auto_target(&self, from: &Version) -> Result<Version> {
        if !self.contains(from) {
            return Err(Error::UnknownCurrentVersion(from.to_string()));
        }

        let mut visited: HashSet<Version> = HashSet::new();
        let mut queue: VecDeque<Version> = VecDeque::new();
        visited.insert(from.clone());
        queue.push_back(from.clone());

        let mut best = from.clone();
        while let Some(vertex) = queue.pop_front() {
            if vertex > best {
                best = vertex.clone();
            }
            if let Some(edges) = self.adjacency.get(&vertex) {
                for edge in edges {
                    if visited.insert(edge.to.clone()) {
                        queue.push_back(edge.to.clone());
                    }
                }
            }
        }
        Ok(best)
    }
}

fn reconstruct(parent: &HashMap<Version, Edge>, from: &Version, to: &Version) -> Vec<Edge> {
    let mut plan = Vec::new();
    let mut cursor = to.clone();
    while &cursor != from {
        // Every visited vertex except the origin has a parent edge.
        let edge = parent[&cursor].clone();
        cursor = edge.from.clone();
        plan.push(edge);
    }
    plan.reverse();
    plan
}
