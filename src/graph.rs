use crate::handle::{reverse_complement, Handle, NodeSide};
use crate::path::PathIndex;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A graph node: a stable positive id and a forward-strand DNA sequence.
/// Empty sequences are allowed and serve as structural null connectors
/// during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: u64,
    pub sequence: Vec<u8>,
    pub name: Option<String>,
}

impl Node {
    pub fn new(id: u64, sequence: Vec<u8>) -> Self {
        Node {
            id,
            sequence,
            name: None,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Get the sequence in the specified orientation
    pub fn oriented_sequence(&self, is_reverse: bool) -> Vec<u8> {
        if is_reverse {
            reverse_complement(&self.sequence)
        } else {
            self.sequence.clone()
        }
    }
}

/// Optional per-graph progress observer, injected rather than global.
pub type ProgressObserver = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// A bidirected sequence graph with embedded paths.
///
/// Edges attach node sides and are held once, addressed by the canonical
/// unordered side pair; the side index lists, for every side, the opposite
/// endpoint of each incident edge. A doubly-reversed edge is therefore the
/// same record as its flipped form and never needs fixing up.
#[derive(Clone, Default)]
pub struct VariationGraph {
    pub nodes: HashMap<u64, Node>,
    edges: BTreeSet<(NodeSide, NodeSide)>,
    side_index: HashMap<NodeSide, Vec<NodeSide>>,
    pub paths: PathIndex,
    max_id: u64,
    progress: Option<ProgressObserver>,
}

impl std::fmt::Debug for VariationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariationGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("paths", &self.paths.path_count())
            .finish()
    }
}

fn canonical(a: NodeSide, b: NodeSide) -> (NodeSide, NodeSide) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl VariationGraph {
    pub fn new() -> Self {
        VariationGraph::default()
    }

    pub fn set_progress_observer(&mut self, observer: Option<ProgressObserver>) {
        self.progress = observer;
    }

    pub(crate) fn report_progress(&self, stage: &str, done: u64, total: u64) {
        if let Some(obs) = &self.progress {
            obs(stage, done, total);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn total_sequence_length(&self) -> usize {
        self.nodes.values().map(|n| n.len()).sum()
    }

    pub fn has_node(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_len(&self, id: u64) -> usize {
        self.nodes.get(&id).map(|n| n.len()).unwrap_or(0)
    }

    pub fn max_node_id(&self) -> u64 {
        self.max_id
    }

    /// Sequence of a traversal: the node's forward sequence or its reverse
    /// complement.
    pub fn sequence(&self, handle: Handle) -> Option<Vec<u8>> {
        self.nodes
            .get(&handle.node_id())
            .map(|n| n.oriented_sequence(handle.is_reverse()))
    }

    /// Add a node record; idempotent by id. Id zero is rejected.
    pub fn add_node(&mut self, node: Node) -> Result<(), String> {
        if node.id == 0 {
            return Err("node id 0 is reserved".to_string());
        }
        if self.nodes.contains_key(&node.id) {
            return Ok(());
        }
        self.max_id = self.max_id.max(node.id);
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Allocate a fresh node with the next free id.
    pub fn create_node(&mut self, sequence: Vec<u8>) -> u64 {
        let id = self.max_id + 1;
        self.max_id = id;
        self.nodes.insert(id, Node::new(id, sequence));
        id
    }

    /// Create a node under a caller-chosen id.
    pub fn create_node_with_id(&mut self, id: u64, sequence: Vec<u8>) -> Result<u64, String> {
        if id == 0 {
            return Err("node id 0 is reserved".to_string());
        }
        if self.nodes.contains_key(&id) {
            return Err(format!("node id {} already in use", id));
        }
        self.max_id = self.max_id.max(id);
        self.nodes.insert(id, Node::new(id, sequence));
        Ok(id)
    }

    /// Remove a node, every incident edge, and every path mapping that
    /// references it.
    pub fn destroy_node(&mut self, id: u64) {
        for side in [NodeSide::start(id), NodeSide::end(id)] {
            for other in self.sides_of(side) {
                self.destroy_edge(side, other);
            }
        }
        self.paths.remove_node_mappings(id);
        self.nodes.remove(&id);
    }

    /// Create an edge between two node sides; idempotent, indexed on both
    /// endpoints, same-side self-loops indexed once.
    pub fn create_edge(&mut self, a: NodeSide, b: NodeSide) {
        let key = canonical(a, b);
        if self.edges.contains(&key) {
            return;
        }
        self.edges.insert(key);
        self.side_index.entry(a).or_default().push(b);
        if a != b {
            self.side_index.entry(b).or_default().push(a);
        }
    }

    /// Connect two traversals: an edge from the right side of `from` to the
    /// left side of `to`.
    pub fn create_edge_between(&mut self, from: Handle, to: Handle) {
        self.create_edge(from.right_side(), to.left_side());
    }

    pub fn has_edge(&self, a: NodeSide, b: NodeSide) -> bool {
        self.edges.contains(&canonical(a, b))
    }

    pub fn has_edge_between(&self, from: Handle, to: Handle) -> bool {
        self.has_edge(from.right_side(), to.left_side())
    }

    /// The stored canonical form of an edge, if present.
    pub fn get_edge(&self, a: NodeSide, b: NodeSide) -> Option<(NodeSide, NodeSide)> {
        let key = canonical(a, b);
        self.edges.get(&key).copied()
    }

    /// Remove an edge; a no-op when absent.
    pub fn destroy_edge(&mut self, a: NodeSide, b: NodeSide) {
        let key = canonical(a, b);
        if !self.edges.remove(&key) {
            return;
        }
        if let Some(list) = self.side_index.get_mut(&a) {
            if let Some(pos) = list.iter().position(|s| *s == b) {
                list.swap_remove(pos);
            }
            if list.is_empty() {
                self.side_index.remove(&a);
            }
        }
        if a != b {
            if let Some(list) = self.side_index.get_mut(&b) {
                if let Some(pos) = list.iter().position(|s| *s == a) {
                    list.swap_remove(pos);
                }
                if list.is_empty() {
                    self.side_index.remove(&b);
                }
            }
        }
    }

    /// The opposite endpoints of every edge incident to a side.
    pub fn sides_of(&self, side: NodeSide) -> Vec<NodeSide> {
        self.side_index.get(&side).cloned().unwrap_or_default()
    }

    pub fn degree(&self, side: NodeSide) -> usize {
        self.side_index.get(&side).map(|v| v.len()).unwrap_or(0)
    }

    /// Traversals reachable by continuing past the right side of `from`.
    pub fn edges_from(&self, from: Handle) -> Vec<Handle> {
        self.sides_of(from.right_side())
            .into_iter()
            .map(|side| side.entering())
            .collect()
    }

    /// Traversals that can precede `to`: those whose right side attaches to
    /// the left side of `to`.
    pub fn edges_to(&self, to: Handle) -> Vec<Handle> {
        self.sides_of(to.left_side())
            .into_iter()
            .map(|side| side.leaving())
            .collect()
    }

    /// Every edge as a canonical side pair, in deterministic order.
    pub fn edge_pairs(&self) -> Vec<(NodeSide, NodeSide)> {
        self.edges.iter().copied().collect()
    }

    /// Every edge incident to either side of a node.
    pub fn edges_of(&self, id: u64) -> Vec<(NodeSide, NodeSide)> {
        let mut out = Vec::new();
        for side in [NodeSide::start(id), NodeSide::end(id)] {
            for other in self.sides_of(side) {
                out.push(canonical(side, other));
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// True when the edge flips strand: it joins two starts or two ends.
    pub fn is_reversing_edge(a: NodeSide, b: NodeSide) -> bool {
        a.is_end == b.is_end
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Nodes with no edges on their left (start) side.
    pub fn head_nodes(&self) -> Vec<u64> {
        self.node_ids()
            .into_iter()
            .filter(|&id| self.degree(NodeSide::start(id)) == 0)
            .collect()
    }

    /// Nodes with no edges on their right (end) side.
    pub fn tail_nodes(&self) -> Vec<u64> {
        self.node_ids()
            .into_iter()
            .filter(|&id| self.degree(NodeSide::end(id)) == 0)
            .collect()
    }

    /// Re-key a node, preserving all topology and paths.
    pub fn swap_node_id(&mut self, old: u64, new: u64) -> Result<(), String> {
        if new == 0 {
            return Err("node id 0 is reserved".to_string());
        }
        if old == new {
            return Ok(());
        }
        if self.nodes.contains_key(&new) {
            return Err(format!("node id {} already in use", new));
        }
        if !self.nodes.contains_key(&old) {
            return Err(format!("no node with id {}", old));
        }
        let mut map = HashMap::new();
        map.insert(old, new);
        self.apply_id_mapping(&map);
        Ok(())
    }

    /// Renumber node ids to 1..N in ascending id order, rewriting every edge
    /// and path mapping.
    pub fn compact_ids(&mut self) {
        let ids = self.node_ids();
        let mut map = HashMap::new();
        for (i, id) in ids.into_iter().enumerate() {
            map.insert(id, (i + 1) as u64);
        }
        self.apply_id_mapping(&map);
    }

    /// Apply a node id remapping to nodes, edges, the side index, and paths.
    pub fn apply_id_mapping(&mut self, map: &HashMap<u64, u64>) {
        let mut new_nodes = HashMap::with_capacity(self.nodes.len());
        let mut max_id = 0;
        for (old_id, mut node) in self.nodes.drain() {
            let new_id = map.get(&old_id).copied().unwrap_or(old_id);
            node.id = new_id;
            max_id = max_id.max(new_id);
            new_nodes.insert(new_id, node);
        }
        self.nodes = new_nodes;
        self.max_id = max_id;

        let remap_side = |side: NodeSide| NodeSide {
            node: map.get(&side.node).copied().unwrap_or(side.node),
            is_end: side.is_end,
        };

        let mut new_edges = BTreeSet::new();
        for (a, b) in std::mem::take(&mut self.edges) {
            new_edges.insert(canonical(remap_side(a), remap_side(b)));
        }
        self.edges = new_edges;

        let mut new_index = HashMap::with_capacity(self.side_index.len());
        for (side, neighbours) in std::mem::take(&mut self.side_index) {
            let list: Vec<NodeSide> = neighbours.into_iter().map(remap_side).collect();
            new_index.insert(remap_side(side), list);
        }
        self.side_index = new_index;

        self.paths.swap_node_ids(map);
    }

    /// Spell out the sequence of an embedded path by applying each mapping's
    /// edits to the node sequence it maps to.
    pub fn path_sequence(&self, name: &str) -> Result<Vec<u8>, String> {
        let path = self
            .paths
            .path(name)
            .ok_or_else(|| format!("no path named {}", name))?;
        let mut out = Vec::new();
        for mapping in &path.mappings {
            let node = self
                .nodes
                .get(&mapping.position.node_id)
                .ok_or_else(|| format!("path {} maps to missing node {}", name, mapping.position.node_id))?;
            let oriented = node.oriented_sequence(mapping.position.is_reverse);
            let mut offset = mapping.position.offset;
            for edit in &mapping.edits {
                if offset + edit.from_len > oriented.len() {
                    return Err(format!(
                        "path {} mapping overruns node {}",
                        name, mapping.position.node_id
                    ));
                }
                if edit.is_match() {
                    out.extend_from_slice(&oriented[offset..offset + edit.from_len]);
                } else {
                    out.extend_from_slice(&edit.sequence);
                }
                offset += edit.from_len;
            }
        }
        Ok(out)
    }

    /// Replace an embedded path with its reverse complement.
    pub fn reverse_complement_path(&mut self, name: &str) -> Result<(), String> {
        let path = self
            .paths
            .path(name)
            .ok_or_else(|| format!("no path named {}", name))?;
        let lens: HashMap<u64, usize> = path
            .mappings
            .iter()
            .map(|m| (m.position.node_id, self.node_len(m.position.node_id)))
            .collect();
        let rc = path.reverse_complement(|id| lens.get(&id).copied().unwrap_or(0));
        self.paths.remove_path(name);
        self.paths.extend_with(&rc);
        Ok(())
    }

    /// SHA-256 digest of a path's spelled sequence, for cheap before/after
    /// integrity checks around mutation passes.
    pub fn path_digest(&self, name: &str) -> Result<String, String> {
        let seq = self.path_sequence(name)?;
        let mut hasher = Sha256::new();
        hasher.update(&seq);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn all_path_digests(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        let names: Vec<String> = self.paths.path_names().map(|s| s.to_string()).collect();
        for name in names {
            if let Ok(digest) = self.path_digest(&name) {
                out.insert(name, digest);
            }
        }
        out
    }

    /// Full structural audit. Returns false and reports on stderr rather
    /// than aborting; mutators only validate the edit they make.
    pub fn is_valid(&self, check_nodes: bool, check_edges: bool, check_paths: bool) -> bool {
        let mut errors: Vec<String> = Vec::new();

        if check_nodes {
            for (id, node) in &self.nodes {
                if *id == 0 {
                    errors.push("node id 0 present".to_string());
                }
                if node.id != *id {
                    errors.push(format!("node {} stored under key {}", node.id, id));
                }
            }
        }

        if check_edges {
            for (a, b) in &self.edges {
                for side in [a, b] {
                    if !self.nodes.contains_key(&side.node) {
                        errors.push(format!("edge {}--{} references missing node {}", a, b, side.node));
                    }
                }
                let indexed = self
                    .side_index
                    .get(a)
                    .map(|list| list.iter().filter(|s| **s == *b).count())
                    .unwrap_or(0);
                if indexed != 1 {
                    errors.push(format!("edge {}--{} indexed {} times on {}", a, b, indexed, a));
                }
                if a != b {
                    let back = self
                        .side_index
                        .get(b)
                        .map(|list| list.iter().filter(|s| **s == *a).count())
                        .unwrap_or(0);
                    if back != 1 {
                        errors.push(format!("edge {}--{} indexed {} times on {}", a, b, back, b));
                    }
                }
            }
            for (side, neighbours) in &self.side_index {
                for other in neighbours {
                    if !self.edges.contains(&canonical(*side, *other)) {
                        errors.push(format!(
                            "side index lists {}--{} but the edge store does not",
                            side, other
                        ));
                    }
                }
            }
        }

        if check_paths {
            if !self.paths.index_consistent() {
                errors.push("path inverse index out of sync".to_string());
            }
            let names: Vec<String> = self.paths.path_names().map(|s| s.to_string()).collect();
            for name in names {
                if let Some(path) = self.paths.path(&name) {
                    for m in &path.mappings {
                        match self.nodes.get(&m.position.node_id) {
                            None => errors.push(format!(
                                "path {} maps to missing node {}",
                                name, m.position.node_id
                            )),
                            Some(node) => {
                                if m.position.offset + m.from_length() > node.len() {
                                    errors.push(format!(
                                        "path {} mapping overruns node {}",
                                        name, m.position.node_id
                                    ));
                                }
                            }
                        }
                    }
                    let mut pairs: Vec<(&crate::path::Mapping, &crate::path::Mapping)> =
                        path.mappings.windows(2).map(|w| (&w[0], &w[1])).collect();
                    if path.is_circular && path.mappings.len() > 1 {
                        if let (Some(last), Some(first)) =
                            (path.mappings.last(), path.mappings.first())
                        {
                            pairs.push((last, first));
                        }
                    }
                    for (a, b) in pairs {
                        let a_len = self.node_len(a.position.node_id);
                        let complete = a.position.offset + a.from_length() == a_len
                            && b.position.offset == 0;
                        if complete && !self.has_edge_between(a.position.handle(), b.position.handle())
                        {
                            errors.push(format!(
                                "path {} misses edge {} -> {}",
                                name,
                                a.position.handle(),
                                b.position.handle()
                            ));
                        }
                    }
                }
            }
        }

        if !errors.is_empty() {
            eprintln!("[validate] graph audit failed:");
            for e in errors.iter().take(10) {
                eprintln!("  {}", e);
            }
            if errors.len() > 10 {
                eprintln!("  ... and {} more", errors.len() - 10);
            }
            return false;
        }
        true
    }

    /// Dump the graph for post-mortem inspection and abort. Used when a
    /// mutator detects a broken structural invariant it cannot repair.
    pub fn fatal(&self, message: &str) -> ! {
        let dump = "vargraph-crash.gfa";
        if let Ok(mut file) = std::fs::File::create(dump) {
            let _ = crate::gfa::write_gfa(self, &mut file);
            eprintln!("[fatal] graph dumped to {}", dump);
        }
        panic!("[fatal] {}", message);
    }

    /// Read-only parallel iteration over nodes; the closure must not mutate
    /// graph structure.
    pub fn for_each_node_parallel<F>(&self, f: F)
    where
        F: Fn(&Node) + Send + Sync,
    {
        self.nodes.par_iter().for_each(|(_, node)| f(node));
    }

    /// Read-only parallel iteration over edges.
    pub fn for_each_edge_parallel<F>(&self, f: F)
    where
        F: Fn(NodeSide, NodeSide) + Send + Sync,
    {
        let pairs = self.edge_pairs();
        pairs.par_iter().for_each(|(a, b)| f(*a, *b));
    }
}
