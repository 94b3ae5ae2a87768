use crate::graph::VariationGraph;
use crate::handle::{Handle, NodeSide};
use std::collections::HashMap;

fn common_prefix_len(seqs: &[Vec<u8>]) -> usize {
    let Some(first) = seqs.first() else {
        return 0;
    };
    let mut l = first.len();
    for seq in &seqs[1..] {
        l = l.min(seq.len());
        let mut i = 0;
        while i < l && seq[i] == first[i] {
            i += 1;
        }
        l = i;
    }
    l
}

impl VariationGraph {
    /// Factor shared sequence out of sibling nodes.
    ///
    /// Traversals sharing the exact same set of incoming sides are
    /// to-siblings; a common prefix of their oriented sequences is split
    /// off into a single new node wired between the common parents and the
    /// shortened siblings. Running over both orientations makes the same
    /// pass handle from-siblings (shared suffixes). A sibling set is only
    /// used when none of its members belongs to another set, and all
    /// members must share an orientation.
    pub fn simplify_siblings(&mut self, verbose: bool) -> bool {
        let mut groups: HashMap<(Vec<NodeSide>, bool), Vec<Handle>> = HashMap::new();
        for id in self.node_ids() {
            for h in [Handle::forward(id), Handle::reverse(id)] {
                let mut key = self.sides_of(h.left_side());
                if key.is_empty() {
                    continue;
                }
                key.sort();
                groups.entry((key, h.is_reverse())).or_default().push(h);
            }
        }

        // only sets that actually share sequence count as sibling sets
        let candidates: Vec<Vec<Handle>> = groups
            .into_values()
            .filter(|members| members.len() >= 2)
            .filter(|members| {
                let seqs: Vec<Vec<u8>> = members
                    .iter()
                    .filter_map(|h| self.sequence(*h))
                    .collect();
                seqs.len() == members.len() && common_prefix_len(&seqs) > 0
            })
            .collect();

        // transitive filter: drop every set containing a node that shows up
        // in another set
        let mut node_uses: HashMap<u64, usize> = HashMap::new();
        for group in &candidates {
            for h in group {
                *node_uses.entry(h.node_id()).or_insert(0) += 1;
            }
        }
        let mut changed = false;
        'group: for mut group in candidates {
            group.sort();
            if group.iter().any(|h| node_uses[&h.node_id()] != 1) {
                continue;
            }
            // stale-state guard: membership and keys must still hold
            if !group.iter().all(|h| self.has_node(h.node_id())) {
                continue;
            }
            let mut keys = Vec::with_capacity(group.len());
            for h in &group {
                let mut key = self.sides_of(h.left_side());
                key.sort();
                if key.is_empty() {
                    continue 'group;
                }
                // a parent that is itself a member would be invalidated
                // mid-group by the divisions below
                if key
                    .iter()
                    .any(|s| group.iter().any(|g| g.node_id() == s.node))
                {
                    continue 'group;
                }
                keys.push(key);
            }
            if !keys.windows(2).all(|w| w[0] == w[1]) {
                continue;
            }

            let seqs: Vec<Vec<u8>> = group
                .iter()
                .filter_map(|h| self.sequence(*h))
                .collect();
            if seqs.len() != group.len() {
                continue;
            }
            let l = common_prefix_len(&seqs);
            if l == 0 {
                continue;
            }

            // split the prefix off every longer sibling, then fold the
            // identical prefix pieces into one node
            let mut prefix_handles = Vec::with_capacity(group.len());
            let mut ok = true;
            for (h, seq) in group.iter().zip(&seqs) {
                if seq.len() == l {
                    prefix_handles.push(*h);
                    continue;
                }
                let result = if h.is_reverse() {
                    // oriented prefix is the forward-strand suffix
                    self.divide_node(h.node_id(), &[seq.len() - l])
                        .map(|pieces| Handle::reverse(pieces[1]))
                } else {
                    self.divide_node(h.node_id(), &[l])
                        .map(|pieces| Handle::forward(pieces[0]))
                };
                match result {
                    Ok(prefix) => prefix_handles.push(prefix),
                    Err(e) => {
                        if verbose {
                            eprintln!("[simplify] split failed: {}", e);
                        }
                        ok = false;
                        break;
                    }
                }
            }
            if !ok || prefix_handles.len() < 2 {
                continue;
            }
            if let Err(e) = self.merge_nodes(prefix_handles[0], &prefix_handles[1..]) {
                self.fatal(&format!("sibling merge failed: {}", e));
            }
            changed = true;
            if verbose {
                eprintln!(
                    "[simplify] factored {} shared bases out of {} siblings",
                    l,
                    prefix_handles.len()
                );
            }
        }
        changed
    }

    /// Remove empty-sequence connector nodes, bridging their left and right
    /// neighbourhoods with direct edges. Mappings on the removed nodes go
    /// with them.
    pub fn remove_null_nodes_forwarding_paths(&mut self, verbose: bool) -> usize {
        let nulls: Vec<u64> = self
            .node_ids()
            .into_iter()
            .filter(|id| self.node_len(*id) == 0)
            .collect();
        for &id in &nulls {
            let lefts = self.sides_of(NodeSide::start(id));
            let rights = self.sides_of(NodeSide::end(id));
            for l in &lefts {
                if l.node == id {
                    continue;
                }
                for r in &rights {
                    if r.node == id {
                        continue;
                    }
                    self.create_edge(*l, *r);
                }
            }
            self.destroy_node(id);
        }
        if verbose && !nulls.is_empty() {
            eprintln!("[simplify] forwarded {} null nodes", nulls.len());
        }
        nulls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Mapping;
    use crate::pos::Position;

    #[test]
    fn test_common_prefix_len() {
        assert_eq!(
            common_prefix_len(&[b"GATTACA".to_vec(), b"GATTTT".to_vec()]),
            4
        );
        assert_eq!(common_prefix_len(&[b"AAA".to_vec(), b"AAA".to_vec()]), 3);
        assert_eq!(common_prefix_len(&[b"C".to_vec(), b"G".to_vec()]), 0);
    }

    #[test]
    fn test_to_sibling_prefix_factoring() {
        let mut g = VariationGraph::new();
        let p = g.create_node(b"AC".to_vec());
        let x = g.create_node(b"GATTACA".to_vec());
        let y = g.create_node(b"GATTTT".to_vec());
        let q = g.create_node(b"CC".to_vec());
        g.create_edge_between(Handle::forward(p), Handle::forward(x));
        g.create_edge_between(Handle::forward(p), Handle::forward(y));
        g.create_edge_between(Handle::forward(x), Handle::forward(q));
        g.create_edge_between(Handle::forward(y), Handle::forward(q));
        g.paths
            .append_mapping("a", Mapping::perfect(Position::forward(p, 0), 2, 1));
        g.paths
            .append_mapping("a", Mapping::perfect(Position::forward(x, 0), 7, 2));
        g.paths
            .append_mapping("a", Mapping::perfect(Position::forward(q, 0), 2, 3));
        let a_before = g.path_sequence("a").unwrap();

        assert!(g.simplify_siblings(false));
        // one shared GATT node now sits between p and the shortened siblings
        let shared: Vec<u64> = g
            .node_ids()
            .into_iter()
            .filter(|&id| g.nodes[&id].sequence == b"GATT".to_vec())
            .collect();
        assert_eq!(shared.len(), 1);
        let shared = shared[0];
        assert!(g.has_edge_between(Handle::forward(p), Handle::forward(shared)));
        let mut tails: Vec<Vec<u8>> = g
            .edges_from(Handle::forward(shared))
            .iter()
            .filter_map(|h| g.sequence(*h))
            .collect();
        tails.sort();
        assert_eq!(tails, vec![b"ACA".to_vec(), b"TT".to_vec()]);
        assert_eq!(g.path_sequence("a").unwrap(), a_before);
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_from_sibling_suffix_factoring() {
        let mut g = VariationGraph::new();
        let x = g.create_node(b"ACAGATT".to_vec());
        let y = g.create_node(b"TTGATT".to_vec());
        let q = g.create_node(b"CC".to_vec());
        g.create_edge_between(Handle::forward(x), Handle::forward(q));
        g.create_edge_between(Handle::forward(y), Handle::forward(q));
        // reverse traversals of x and y share incoming side start(q), so the
        // forward-strand suffix GATT is factored
        assert!(g.simplify_siblings(false));
        let shared: Vec<u64> = g
            .node_ids()
            .into_iter()
            .filter(|&id| g.nodes[&id].sequence == b"GATT".to_vec())
            .collect();
        assert_eq!(shared.len(), 1);
        assert!(g.has_edge_between(Handle::forward(shared[0]), Handle::forward(q)));
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_null_node_forwarding() {
        let mut g = VariationGraph::new();
        let a = g.create_node(b"AC".to_vec());
        let b = g.create_node(b"GT".to_vec());
        let null = g.create_node(Vec::new());
        let c = g.create_node(b"TT".to_vec());
        g.create_edge_between(Handle::forward(a), Handle::forward(null));
        g.create_edge_between(Handle::forward(b), Handle::forward(null));
        g.create_edge_between(Handle::forward(null), Handle::forward(c));
        assert_eq!(g.remove_null_nodes_forwarding_paths(false), 1);
        assert!(!g.has_node(null));
        assert!(g.has_edge_between(Handle::forward(a), Handle::forward(c)));
        assert!(g.has_edge_between(Handle::forward(b), Handle::forward(c)));
        assert!(g.is_valid(true, true, true));
    }
}
