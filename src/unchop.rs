use crate::graph::VariationGraph;
use crate::handle::{Handle, NodeSide};
use crate::path::Mapping;
use crate::pos::Position;
use std::collections::HashSet;

impl VariationGraph {
    /// Can the walk continue from `from` into `to` with no alternative, on
    /// both strands and in every embedded path?
    fn perfect_path_neighbours(&self, from: Handle, to: Handle) -> bool {
        for (node, this, other, forward) in [
            (from.node_id(), from, to, true),
            (to.node_id(), to, from, false),
        ] {
            let len = self.node_len(node);
            for mid in self.paths.of_node(node) {
                let Some(m) = self.paths.get(mid) else {
                    continue;
                };
                // only complete mappings can be fused
                if m.position.offset != 0 || m.from_length() != len {
                    return false;
                }
                let trav = m.position.handle();
                let (neighbour, expected) = if trav == this {
                    if forward {
                        (self.paths.next_cyclic(mid), other)
                    } else {
                        (self.paths.prev_cyclic(mid), other)
                    }
                } else if trav == this.flip() {
                    if forward {
                        (self.paths.prev_cyclic(mid), other.flip())
                    } else {
                        (self.paths.next_cyclic(mid), other.flip())
                    }
                } else {
                    continue;
                };
                match neighbour {
                    Some(n) => {
                        let ok = self
                            .paths
                            .get(n)
                            .map(|nm| nm.position.handle() == expected)
                            .unwrap_or(false);
                        if !ok {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }

    fn linkable(&self, from: Handle, to: Handle) -> bool {
        from.node_id() != to.node_id()
            && self.degree(from.right_side()) == 1
            && self.degree(to.left_side()) == 1
            && self.perfect_path_neighbours(from, to)
    }

    fn chain_successor(&self, h: Handle) -> Option<Handle> {
        if self.degree(h.right_side()) != 1 {
            return None;
        }
        let next = self.edges_from(h).into_iter().next()?;
        if self.linkable(h, next) {
            Some(next)
        } else {
            None
        }
    }

    fn chain_predecessor(&self, h: Handle) -> Option<Handle> {
        if self.degree(h.left_side()) != 1 {
            return None;
        }
        let prev = self.edges_to(h).into_iter().next()?;
        if self.linkable(prev, h) {
            Some(prev)
        } else {
            None
        }
    }

    /// Maximal simple components: chains of nodes joined left-to-right with
    /// no branching and identical path traversal on every member. Each
    /// component is reported once, in one orientation, and components do
    /// not share nodes.
    pub fn simple_components(&self, min_size: usize) -> Vec<Vec<Handle>> {
        let mut components = Vec::new();
        let mut used: HashSet<u64> = HashSet::new();

        for id in self.node_ids() {
            if used.contains(&id) {
                continue;
            }
            let seed = Handle::forward(id);
            let mut members: HashSet<u64> = HashSet::new();
            members.insert(id);

            // walk left to the chain start, guarding against cycles
            let mut start = seed;
            while let Some(prev) = self.chain_predecessor(start) {
                if members.contains(&prev.node_id()) || used.contains(&prev.node_id()) {
                    break;
                }
                members.insert(prev.node_id());
                start = prev;
            }

            let mut chain = vec![start];
            let mut current = start;
            while let Some(next) = self.chain_successor(current) {
                if chain.iter().any(|h| h.node_id() == next.node_id())
                    || used.contains(&next.node_id())
                {
                    break;
                }
                chain.push(next);
                current = next;
            }

            for h in &chain {
                used.insert(h.node_id());
            }
            if chain.len() >= min_size {
                components.push(chain);
            }
        }
        components
    }

    /// Concatenate a simple component into a single node. The new node
    /// spells the chain's oriented sequence; edges are inherited from the
    /// chain ends, and each path's run of mappings over the chain is fused
    /// into one mapping.
    pub fn concat_nodes(&mut self, chain: &[Handle]) -> Result<Handle, String> {
        if chain.len() < 2 {
            return Err("concat requires at least two nodes".to_string());
        }
        let mut new_seq = Vec::new();
        for h in chain {
            let seq = self
                .sequence(*h)
                .ok_or_else(|| format!("no node with id {}", h.node_id()))?;
            new_seq.extend(seq);
        }
        let first = chain[0];
        let last = *chain.last().expect("chain is non-empty");
        let new_id = self.create_node(new_seq);
        let new_handle = Handle::forward(new_id);

        // Inherit edges from the chain's outer sides; a cycle-closing edge
        // becomes a self-loop on the new node.
        let map_side = |s: NodeSide| -> NodeSide {
            if s == first.left_side() {
                NodeSide::start(new_id)
            } else if s == last.right_side() {
                NodeSide::end(new_id)
            } else {
                s
            }
        };
        for t in self.sides_of(first.left_side()) {
            self.create_edge(NodeSide::start(new_id), map_side(t));
        }
        for t in self.sides_of(last.right_side()) {
            self.create_edge(NodeSide::end(new_id), map_side(t));
        }

        // Fuse path runs. Forward runs take the right-most rank, reverse
        // runs the lower one; both are the rank of the mapping on the
        // chain's last member.
        let rev_chain: Vec<Handle> = chain.iter().rev().map(|h| h.flip()).collect();
        let mut path_names: Vec<String> = Vec::new();
        for (name, _) in self.paths.node_path_traversals(first.node_id()) {
            if !path_names.contains(&name) {
                path_names.push(name);
            }
        }
        for name in path_names {
            let mut ids = self.paths.mapping_ids_of_path(&name);
            let mut i = 0;
            while i < ids.len() {
                let Some(m) = self.paths.get(ids[i]) else {
                    i += 1;
                    continue;
                };
                let trav = m.position.handle();
                let (pattern, reverse) = if trav == chain[0] {
                    (chain, false)
                } else if trav == rev_chain[0] {
                    (rev_chain.as_slice(), true)
                } else {
                    i += 1;
                    continue;
                };
                if i + pattern.len() > ids.len() {
                    return Err(format!(
                        "path {} enters component at {} but does not finish it",
                        name, trav
                    ));
                }
                for (j, want) in pattern.iter().enumerate() {
                    let got = self
                        .paths
                        .get(ids[i + j])
                        .map(|mm| mm.position.handle());
                    if got != Some(*want) {
                        return Err(format!("path {} breaks component at step {}", name, j));
                    }
                }
                // build the fused mapping
                let run: Vec<Mapping> = (0..pattern.len())
                    .filter_map(|j| self.paths.get(ids[i + j]).cloned())
                    .collect();
                let rank = if reverse {
                    run.first().map(|m| m.rank).unwrap_or(0)
                } else {
                    run.last().map(|m| m.rank).unwrap_or(0)
                };
                let mut fused = Mapping::new(Position::new(new_id, reverse, 0), rank);
                for m in &run {
                    fused.edits.extend(m.edits.iter().cloned());
                }
                // splice: remove the run, insert the fused mapping in place
                let mut cursor = None;
                for j in 0..pattern.len() {
                    let removed = self.paths.remove_mapping(ids[i + j]);
                    if j == 0 {
                        cursor = removed.map(|(_, c)| c);
                    }
                }
                let fused_id = match cursor {
                    Some(c) => self.paths.insert_at(&c, fused),
                    None => self.paths.append_mapping(&name, fused),
                };
                ids.splice(i..i + pattern.len(), [fused_id]);
                i += 1;
            }
        }

        for h in chain {
            if !self.paths.of_node(h.node_id()).is_empty() {
                self.fatal(&format!(
                    "concat left mappings behind on node {}",
                    h.node_id()
                ));
            }
            self.destroy_node(h.node_id());
        }
        Ok(new_handle)
    }

    /// Concatenate every simple component of two or more nodes. Returns the
    /// number of nodes eliminated.
    pub fn unchop(&mut self, verbose: bool) -> usize {
        let mut merged = 0;
        loop {
            let components = self.simple_components(2);
            if components.is_empty() {
                break;
            }
            let mut progressed = false;
            for chain in components {
                match self.concat_nodes(&chain) {
                    Ok(_) => {
                        merged += chain.len() - 1;
                        progressed = true;
                    }
                    Err(e) => {
                        if verbose {
                            eprintln!("[unchop] skipping component: {}", e);
                        }
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        if verbose {
            eprintln!("[unchop] eliminated {} nodes", merged);
        }
        merged
    }

    /// Whole-graph normalization: repeat unchop and sibling simplification
    /// until a fixpoint or the iteration bound. Doubly-reversed edges do
    /// not need a flipping pass here: the side-pair edge store admits only
    /// the canonical form.
    pub fn normalize(&mut self, max_iter: usize, verbose: bool) -> usize {
        let mut iterations = 0;
        for i in 0..max_iter.max(1) {
            let before = (
                self.node_count(),
                self.edge_count(),
                self.total_sequence_length(),
            );
            self.unchop(verbose);
            self.simplify_siblings(verbose);
            self.paths.compact_ranks();
            self.unchop(verbose);
            self.paths.compact_ranks();
            iterations = i + 1;
            let after = (
                self.node_count(),
                self.edge_count(),
                self.total_sequence_length(),
            );
            if before == after {
                break;
            }
        }
        if verbose {
            eprintln!("[normalize] fixpoint after {} iterations", iterations);
        }
        iterations
    }
}
