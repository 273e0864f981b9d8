//! Classification trees and registry snapshots.
//!
//! A classification space is a rooted tree of class ids (taxonomy or a
//! functional scheme). The engine consumes trees read-only: parent and
//! depth lookups, LCA queries, and an immutable known/disabled id snapshot
//! taken before streaming begins.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use crate::constants::ROOT_ID;
use crate::error::{ReclassError, Result};
use crate::types::ClassId;

/// Taxonomic rank, ordered from shallowest to deepest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Domain,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    /// Parse a rank name as found in tree files. Unknown or "no rank"
    /// strings yield `None`.
    pub fn parse(s: &str) -> Option<Rank> {
        match s.to_ascii_lowercase().as_str() {
            "domain" | "superkingdom" | "kingdom" => Some(Rank::Domain),
            "phylum" => Some(Rank::Phylum),
            "class" => Some(Rank::Class),
            "order" => Some(Rank::Order),
            "family" => Some(Rank::Family),
            "genus" => Some(Rank::Genus),
            "species" => Some(Rank::Species),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: ClassId,
    depth: u32,
    rank: Option<Rank>,
    name: String,
}

/// A rooted classification tree with O(depth) LCA.
///
/// Nodes are keyed by class id; the root is id 1 and is its own parent.
/// Depths are precomputed at construction.
#[derive(Debug, Clone)]
pub struct ClassificationTree {
    name: String,
    nodes: HashMap<ClassId, Node>,
}

impl ClassificationTree {
    /// Build a tree from `(id, parent, rank, name)` tuples.
    ///
    /// The root (id 1) is implied and need not be listed. Every listed
    /// parent must itself be listed or be the root; cycles are rejected.
    pub fn from_nodes(
        name: &str,
        nodes: &[(ClassId, ClassId, Option<Rank>, &str)],
    ) -> Result<Self> {
        let mut tree = ClassificationTree {
            name: name.to_string(),
            nodes: HashMap::with_capacity(nodes.len() + 1),
        };
        tree.nodes.insert(
            ROOT_ID,
            Node {
                parent: ROOT_ID,
                depth: 0,
                rank: None,
                name: "root".to_string(),
            },
        );
        for &(id, parent, rank, node_name) in nodes {
            if id <= 0 {
                return Err(ReclassError::validation(format!(
                    "class id must be positive (got {})",
                    id
                )));
            }
            if id == ROOT_ID {
                continue;
            }
            tree.nodes.insert(
                id,
                Node {
                    parent,
                    depth: 0,
                    rank,
                    name: node_name.to_string(),
                },
            );
        }
        tree.compute_depths()?;
        Ok(tree)
    }

    /// Parse a tree from tab-separated lines `id  parent  name  rank`.
    ///
    /// `source` is only used for error messages. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn from_tsv(name: &str, reader: impl BufRead, source: &Path) -> Result<Self> {
        let mut nodes: Vec<(ClassId, ClassId, Option<Rank>, String)> = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx as u64 + 1;
            let line = line.map_err(|e| ReclassError::io(source, "read", e))?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let id: ClassId = fields
                .next()
                .and_then(|f| f.trim().parse().ok())
                .ok_or_else(|| ReclassError::parse(source, line_no, "invalid class id"))?;
            let parent: ClassId = fields
                .next()
                .and_then(|f| f.trim().parse().ok())
                .ok_or_else(|| ReclassError::parse(source, line_no, "invalid parent id"))?;
            let node_name = fields.next().unwrap_or("").trim().to_string();
            let rank = fields.next().and_then(|f| Rank::parse(f.trim()));
            nodes.push((id, parent, rank, node_name));
        }
        let borrowed: Vec<(ClassId, ClassId, Option<Rank>, &str)> = nodes
            .iter()
            .map(|(id, parent, rank, n)| (*id, *parent, *rank, n.as_str()))
            .collect();
        Self::from_nodes(name, &borrowed)
    }

    fn compute_depths(&mut self) -> Result<()> {
        let ids: Vec<ClassId> = self.nodes.keys().copied().collect();
        let mut depths: HashMap<ClassId, u32> = HashMap::with_capacity(ids.len());
        depths.insert(ROOT_ID, 0);
        for &id in &ids {
            let mut chain = Vec::new();
            let mut cur = id;
            while !depths.contains_key(&cur) {
                let node = self.nodes.get(&cur).ok_or_else(|| {
                    ReclassError::validation(format!(
                        "classification '{}': node {} has unknown parent {}",
                        self.name,
                        chain.last().copied().unwrap_or(id),
                        cur
                    ))
                })?;
                chain.push(cur);
                cur = node.parent;
                if chain.len() > self.nodes.len() {
                    return Err(ReclassError::validation(format!(
                        "classification '{}': cycle detected at id {}",
                        self.name, id
                    )));
                }
            }
            let mut depth = depths[&cur];
            for &link in chain.iter().rev() {
                depth += 1;
                depths.insert(link, depth);
            }
        }
        for (id, node) in self.nodes.iter_mut() {
            node.depth = depths[id];
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ClassId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Parent of `id`; the root is its own parent.
    pub fn parent(&self, id: ClassId) -> Option<ClassId> {
        self.nodes.get(&id).map(|n| n.parent)
    }

    /// Depth of `id` (root = 0).
    pub fn depth(&self, id: ClassId) -> Option<u32> {
        self.nodes.get(&id).map(|n| n.depth)
    }

    pub fn rank(&self, id: ClassId) -> Option<Rank> {
        self.nodes.get(&id).and_then(|n| n.rank)
    }

    pub fn node_name(&self, id: ClassId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.nodes.keys().copied()
    }

    /// All ids ordered by decreasing depth, ties by increasing id.
    /// This is the deterministic bottom-up visit order of the
    /// min-support corrector.
    pub fn ids_by_depth_desc(&self) -> Vec<ClassId> {
        let mut ids: Vec<ClassId> = self.nodes.keys().copied().collect();
        ids.sort_by_key(|id| (std::cmp::Reverse(self.nodes[id].depth), *id));
        ids
    }

    /// Lowest common ancestor of `a` and `b`.
    ///
    /// A non-positive or unknown id acts as the neutral element, so the
    /// result of folding `lca` over a set ignores unassigned members.
    pub fn lca(&self, a: ClassId, b: ClassId) -> ClassId {
        if a <= 0 {
            return b;
        }
        if b <= 0 {
            return a;
        }
        let (mut a, mut b) = (a, b);
        let (mut da, mut db) = match (self.depth(a), self.depth(b)) {
            (Some(da), Some(db)) => (da, db),
            (None, _) => return b,
            (_, None) => return a,
        };
        while da > db {
            a = self.nodes[&a].parent;
            da -= 1;
        }
        while db > da {
            b = self.nodes[&b].parent;
            db -= 1;
        }
        while a != b {
            if a == ROOT_ID || b == ROOT_ID {
                return ROOT_ID;
            }
            a = self.nodes[&a].parent;
            b = self.nodes[&b].parent;
        }
        a
    }

    /// Walk `id` upward until its rank is at or above `ceiling`.
    ///
    /// Nodes without a stated rank stop the walk; the 16S identity clamp
    /// does not ascend past unranked intermediates.
    pub fn ancestor_at_or_above(&self, id: ClassId, ceiling: Rank) -> ClassId {
        let mut cur = id;
        while cur > ROOT_ID {
            match self.rank(cur) {
                Some(rank) if rank > ceiling => {
                    cur = match self.parent(cur) {
                        Some(p) if p != cur => p,
                        _ => break,
                    };
                }
                _ => break,
            }
        }
        cur
    }
}

/// Read-only known/disabled id snapshot for one classification, taken
/// before streaming begins.
#[derive(Debug, Clone)]
pub struct ClassificationView {
    known: HashSet<ClassId>,
    disabled: HashSet<ClassId>,
}

impl ClassificationView {
    /// Snapshot the tree's id set, marking `disabled_ids` as suppressed.
    /// The root is never disabled.
    pub fn snapshot(tree: &ClassificationTree, disabled_ids: &[ClassId]) -> Self {
        let known: HashSet<ClassId> = tree.ids().collect();
        let disabled = disabled_ids
            .iter()
            .copied()
            .filter(|&id| id != ROOT_ID && known.contains(&id))
            .collect();
        ClassificationView { known, disabled }
    }

    pub fn is_known(&self, id: ClassId) -> bool {
        self.known.contains(&id)
    }

    pub fn is_disabled(&self, id: ClassId) -> bool {
        self.disabled.contains(&id)
    }

    pub fn num_disabled(&self) -> usize {
        self.disabled.len()
    }
}
