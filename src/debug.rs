//! Debug utilities: structural consistency checks and dumps.
//!
//! [`Manager::debug_check`] walks the whole unique table and reports every
//! broken invariant it finds, instead of stopping at the first one. It is
//! meant for tests and for hunting bugs in client code that misuses
//! reference counts.

use std::collections::HashMap;
use std::fmt::{self, Write};

use log::warn;

use crate::manager::Manager;
use crate::node::Node;
use crate::reference::Ref;
use crate::types::{NodeId, Var};

/// Outcome of [`Manager::debug_check`] and [`Manager::check_keys`].
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// One line per violated invariant.
    pub errors: Vec<String>,
    /// Internal nodes visited.
    pub nodes: usize,
    /// Dead nodes found, constants included.
    pub dead: usize,
    /// Live internal nodes holding more references than they have live
    /// parents: roots held by the client or by the manager.
    pub externally_referenced: usize,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} nodes, {} dead, {} externally referenced, {} errors",
            self.nodes,
            self.dead,
            self.externally_referenced,
            self.errors.len()
        )?;
        for e in &self.errors {
            writeln!(f, "  {}", e)?;
        }
        Ok(())
    }
}

/// Detailed information about a single node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub node_ref: Ref,
    /// Variable at this node (None for constants)
    pub variable: Option<Var>,
    /// Level of the variable in the current order (None for constants)
    pub level: Option<usize>,
    pub high: Option<Ref>,
    pub low: Option<Ref>,
    /// Value of a constant node
    pub value: Option<f64>,
    pub refs: u32,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.variable, self.level, self.high, self.low) {
            (Some(var), Some(level), Some(high), Some(low)) => write!(
                f,
                "{}(var={}, level={}, high={}, low={}, refs={})",
                self.node_ref, var, level, high, low, self.refs
            ),
            _ => write!(f, "{}(value={:?}, refs={})", self.node_ref, self.value, self.refs),
        }
    }
}

impl Manager {
    /// Checks every structural invariant of the unique table.
    ///
    /// - each node sits in the subtable of its variable's level,
    /// - children sit on strictly lower levels,
    /// - then-edges are regular and the two children differ,
    /// - chains are sorted and no pair appears twice,
    /// - per-level and global key and dead counts match the nodes found,
    /// - every reference count covers the edges from live parents.
    pub fn debug_check(&self) -> CheckReport {
        let mut report = CheckReport::default();
        let nodes = self.nodes.as_slice();
        let mut in_edges: HashMap<NodeId, u64> = HashMap::new();
        let mut live = Vec::new();

        for (level, sub) in self.subtables.iter().enumerate() {
            let index = self.invperm[level];
            let mut pairs = HashMap::new();
            for id in sub.iter(nodes) {
                let node = &nodes[id.index()];
                if node.index as usize != index {
                    report
                        .errors
                        .push(format!("node {} of level {} tests x{} instead of x{}", id, level, node.index, index));
                    continue;
                }
                if node.refs > 0 {
                    live.push(id);
                }
                if node.high.is_negated() {
                    report.errors.push(format!("node {} has a complemented then-edge", id));
                }
                if node.high == node.low {
                    report.errors.push(format!("node {} has equal children", id));
                }
                for child in [node.high, node.low] {
                    if self.nodes.is_free(child.id()) {
                        report.errors.push(format!("node {} points to freed slot {}", id, child.id()));
                    } else if self.level_of_ref(child) <= level {
                        report.errors.push(format!("node {} has child {} at or above its level", id, child));
                    } else if node.refs > 0 {
                        *in_edges.entry(child.id()).or_default() += 1;
                    }
                }
                if let Some(other) = pairs.insert((node.high, node.low), id) {
                    report.errors.push(format!("nodes {} and {} of level {} are duplicates", other, id, level));
                }
            }
            if !sub.chains_sorted(nodes) {
                report.errors.push(format!("chains of level {} are not sorted", level));
            }
        }

        for id in live {
            let refs = nodes[id.index()].refs;
            let edges = in_edges.get(&id).copied().unwrap_or(0);
            if refs == Node::MAX_REF {
                continue;
            }
            if (refs as u64) < edges {
                report
                    .errors
                    .push(format!("node {} has {} references but {} live parents", id, refs, edges));
            } else if refs as u64 > edges {
                report.externally_referenced += 1;
            }
        }

        // Linear transforms re-express projection nodes too.
        let plain = self.linear.as_ref().map_or(true, |linear| linear.is_identity());
        for (index, v) in self.vars.iter().enumerate() {
            let node = &nodes[v.id().index()];
            let shaped = node.high == self.one && node.low == -self.one;
            if node.index as usize != index || (plain && !shaped) {
                report.errors.push(format!("projection of x{} is malformed", index));
            }
        }

        self.count_keys(&mut report);
        if !report.is_ok() {
            warn!("Consistency check found {} errors", report.errors.len());
        }
        report
    }

    /// Only checks that the key and dead counters agree with the tables.
    pub fn check_keys(&self) -> CheckReport {
        let mut report = CheckReport::default();
        self.count_keys(&mut report);
        if !report.is_ok() {
            warn!("Key check found {} errors", report.errors.len());
        }
        report
    }

    fn count_keys(&self, report: &mut CheckReport) {
        let nodes = self.nodes.as_slice();
        let mut total_keys = 0;
        let mut total_dead = 0;

        for (level, sub) in self.subtables.iter().enumerate() {
            let mut keys = 0;
            let mut dead = 0;
            for id in sub.iter(nodes) {
                keys += 1;
                if nodes[id.index()].refs == 0 {
                    dead += 1;
                }
            }
            if keys != sub.keys {
                report
                    .errors
                    .push(format!("level {} holds {} nodes but counts {}", level, keys, sub.keys));
            }
            if dead != sub.dead {
                report
                    .errors
                    .push(format!("level {} holds {} dead nodes but counts {}", level, dead, sub.dead));
            }
            total_keys += keys;
            total_dead += dead;
        }
        report.nodes = total_keys;

        let mut const_keys = 0;
        let mut const_dead = 0;
        for id in self.consts.iter(nodes) {
            const_keys += 1;
            if nodes[id.index()].refs == 0 {
                const_dead += 1;
            }
        }
        if const_keys != self.consts.keys || const_dead != self.consts.dead {
            report.errors.push(format!(
                "constant table holds {} nodes ({} dead) but counts {} ({} dead)",
                const_keys, const_dead, self.consts.keys, self.consts.dead
            ));
        }
        total_keys += const_keys;
        total_dead += const_dead;
        report.dead = total_dead;

        if total_keys != self.keys {
            report
                .errors
                .push(format!("manager counts {} keys, found {}", self.keys, total_keys));
        }
        if total_dead != self.dead {
            report
                .errors
                .push(format!("manager counts {} dead nodes, found {}", self.dead, total_dead));
        }
    }

    /// Information about the top node of `f`.
    pub fn node_info(&self, f: Ref) -> NodeInfo {
        let node = &self.nodes[f.id()];
        if node.is_terminal() {
            return NodeInfo {
                node_ref: f,
                variable: None,
                level: None,
                high: None,
                low: None,
                value: self.constant_value(f),
                refs: node.refs,
            };
        }
        NodeInfo {
            node_ref: f,
            variable: Some(Var::new(node.index)),
            level: Some(self.perm[node.index as usize]),
            high: Some(self.high(f)),
            low: Some(self.low(f)),
            value: None,
            refs: node.refs,
        }
    }

    /// Every node reachable from `root`, top level first.
    pub fn debug_string(&self, root: Ref) -> String {
        let mut infos = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![root.regular()];
        while let Some(r) = stack.pop() {
            if !seen.insert(r.id()) {
                continue;
            }
            let info = self.node_info(r);
            if let (Some(high), Some(low)) = (info.high, info.low) {
                stack.push(high.regular());
                stack.push(low.regular());
            }
            infos.push(info);
        }
        infos.sort_by_key(|info| info.level.unwrap_or(usize::MAX));

        let mut result = String::new();
        let _ = writeln!(result, "{} ({} nodes):", root, infos.len());
        for info in &infos {
            let _ = writeln!(result, "  {}", info);
        }
        result
    }

    /// The order and the number of nodes on each level.
    pub fn dump_state(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(
            result,
            "{} nodes ({} dead), {} variables",
            self.keys,
            self.dead,
            self.vars.len()
        );
        for (level, sub) in self.subtables.iter().enumerate() {
            let _ = writeln!(
                result,
                "  L{} x{}: {} nodes ({} dead), {} slots",
                level,
                self.invperm[level],
                sub.keys,
                sub.dead,
                sub.slots()
            );
        }
        let _ = writeln!(result, "  constants: {} nodes ({} dead)", self.consts.keys, self.consts.dead);
        result
    }
}
