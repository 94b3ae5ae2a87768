use crate::graph::VariationGraph;
use crate::handle::{reverse_complement, Handle, NodeSide};
use crate::path::{Mapping, Path};
use crate::pos::Position;
use crate::translation::Translation;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A strongly connected component folded down to node ids. A component is
/// cyclic when it has more than one member or a self-looping singleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scc {
    pub nodes: BTreeSet<u64>,
    pub cyclic: bool,
}

fn canonical(a: NodeSide, b: NodeSide) -> (NodeSide, NodeSide) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl VariationGraph {
    /// Strongly connected components of the bidirected graph, computed by
    /// iterative Tarjan over (node, orientation) vertices and folded back
    /// to node sets. Components are ordered by their smallest node id.
    pub fn strongly_connected_components(&self) -> Vec<Scc> {
        let mut vertices: Vec<Handle> = Vec::with_capacity(self.node_count() * 2);
        for id in self.node_ids() {
            vertices.push(Handle::forward(id));
            vertices.push(Handle::reverse(id));
        }

        let mut index: HashMap<Handle, usize> = HashMap::new();
        let mut low: HashMap<Handle, usize> = HashMap::new();
        let mut on_stack: HashSet<Handle> = HashSet::new();
        let mut stack: Vec<Handle> = Vec::new();
        let mut counter = 0usize;
        let mut handle_comps: Vec<Vec<Handle>> = Vec::new();

        for &root in &vertices {
            if index.contains_key(&root) {
                continue;
            }
            // explicit DFS frames: (vertex, successors, next successor)
            let mut frames: Vec<(Handle, Vec<Handle>, usize)> = Vec::new();
            index.insert(root, counter);
            low.insert(root, counter);
            counter += 1;
            stack.push(root);
            on_stack.insert(root);
            frames.push((root, self.edges_from(root), 0));

            while let Some(frame) = frames.last_mut() {
                let v = frame.0;
                if frame.2 < frame.1.len() {
                    let w = frame.1[frame.2];
                    frame.2 += 1;
                    if !index.contains_key(&w) {
                        index.insert(w, counter);
                        low.insert(w, counter);
                        counter += 1;
                        stack.push(w);
                        on_stack.insert(w);
                        frames.push((w, self.edges_from(w), 0));
                    } else if on_stack.contains(&w) {
                        let iw = index[&w];
                        let lv = low.get_mut(&v).expect("indexed vertex");
                        *lv = (*lv).min(iw);
                    }
                } else {
                    frames.pop();
                    if let Some(parent) = frames.last() {
                        let lv = low[&v];
                        let lp = low.get_mut(&parent.0).expect("indexed vertex");
                        *lp = (*lp).min(lv);
                    }
                    if low[&v] == index[&v] {
                        let mut comp = Vec::new();
                        loop {
                            let w = stack.pop().expect("component member on stack");
                            on_stack.remove(&w);
                            comp.push(w);
                            if w == v {
                                break;
                            }
                        }
                        handle_comps.push(comp);
                    }
                }
            }
        }

        // fold the two orientations of every node into one component
        let mut comp_of: HashMap<u64, usize> = HashMap::new();
        let mut parent: Vec<usize> = (0..handle_comps.len()).collect();
        fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        let mut cyclic: Vec<bool> = handle_comps
            .iter()
            .map(|comp| {
                comp.len() > 1
                    || comp
                        .first()
                        .map(|h| self.edges_from(*h).contains(h))
                        .unwrap_or(false)
            })
            .collect();
        for (ci, comp) in handle_comps.iter().enumerate() {
            for h in comp {
                match comp_of.get(&h.node_id()) {
                    None => {
                        comp_of.insert(h.node_id(), ci);
                    }
                    Some(&other) => {
                        let (a, b) = (find(&mut parent, other), find(&mut parent, ci));
                        if a != b {
                            parent[b] = a;
                            let merged_cyclic = cyclic[a] || cyclic[b];
                            cyclic[a] = merged_cyclic;
                        }
                    }
                }
            }
        }

        let mut folded: HashMap<usize, Scc> = HashMap::new();
        for (ci, comp) in handle_comps.iter().enumerate() {
            let root = find(&mut parent, ci);
            let entry = folded.entry(root).or_insert_with(|| Scc {
                nodes: BTreeSet::new(),
                cyclic: cyclic[root],
            });
            entry.cyclic |= cyclic[root];
            for h in comp {
                entry.nodes.insert(h.node_id());
            }
        }
        let mut out: Vec<Scc> = folded.into_values().collect();
        out.sort_by_key(|scc| scc.nodes.iter().next().copied());
        out
    }

    /// Remove strand-crossing edges by cloning the reverse-reachable region
    /// as forward nodes carrying reverse-complement sequence, up to
    /// `max_length` bases deep. Returns clone id -> (original id, reversed).
    pub fn unfold(&mut self, max_length: usize, verbose: bool) -> HashMap<u64, (u64, bool)> {
        let reversing: Vec<(NodeSide, NodeSide)> = self
            .edge_pairs()
            .into_iter()
            .filter(|(a, b)| Self::is_reversing_edge(*a, *b))
            .collect();
        if reversing.is_empty() {
            return HashMap::new();
        }

        // entries: the reverse traversal reached by crossing each edge in
        // its stored direction
        let mut queue: Vec<(Handle, usize)> = Vec::new();
        for (a, b) in &reversing {
            let entry = if a.is_end { b.entering() } else { a.leaving() };
            if entry.is_reverse() {
                queue.push((entry, 0));
            }
        }

        // bounded search over reverse traversals
        let mut depth: HashMap<Handle, usize> = HashMap::new();
        while let Some((h, dist)) = queue.pop() {
            if dist > max_length {
                continue;
            }
            match depth.get(&h) {
                Some(&d) if d <= dist => continue,
                _ => {}
            }
            depth.insert(h, dist);
            let cost = dist + self.node_len(h.node_id());
            for next in self.edges_from(h) {
                if next.is_reverse() {
                    queue.push((next, cost));
                }
            }
        }

        // clone every reached reverse traversal as a fresh forward node
        let mut clones: HashMap<u64, u64> = HashMap::new();
        let mut translation: HashMap<u64, (u64, bool)> = HashMap::new();
        let mut reached: Vec<Handle> = depth.keys().copied().collect();
        reached.sort();
        for h in &reached {
            let seq = self
                .sequence(*h)
                .unwrap_or_default();
            let clone = self.create_node(seq);
            clones.insert(h.node_id(), clone);
            translation.insert(clone, (h.node_id(), true));
        }

        // wire the clones following every directed reading of every edge
        for (a, b) in self.edge_pairs() {
            for (u, v) in [(a.leaving(), b.entering()), (b.leaving(), a.entering())] {
                match (u.is_reverse(), v.is_reverse()) {
                    (false, false) => {}
                    (false, true) => {
                        if let Some(&cv) = clones.get(&v.node_id()) {
                            self.create_edge_between(u, Handle::forward(cv));
                        }
                    }
                    (true, true) => {
                        if let (Some(&cu), Some(&cv)) =
                            (clones.get(&u.node_id()), clones.get(&v.node_id()))
                        {
                            self.create_edge_between(
                                Handle::forward(cu),
                                Handle::forward(cv),
                            );
                        }
                    }
                    (true, false) => {
                        if let Some(&cu) = clones.get(&u.node_id()) {
                            self.create_edge_between(Handle::forward(cu), v);
                        }
                    }
                }
            }
        }

        for (a, b) in reversing {
            self.destroy_edge(a, b);
        }

        // move reverse path visits onto the forward clones
        let cloned_nodes: Vec<u64> = clones.keys().copied().collect();
        let mut stranded = 0usize;
        for node in cloned_nodes {
            for mid in self.paths.of_node(node) {
                let Some(mut mapping) = self.paths.get(mid).cloned() else {
                    continue;
                };
                if !mapping.position.is_reverse {
                    continue;
                }
                mapping.position.node_id = clones[&node];
                mapping.position.is_reverse = false;
                self.paths.set_mapping(mid, mapping);
            }
        }
        for id in self.node_ids() {
            if translation.contains_key(&id) {
                continue;
            }
            for mid in self.paths.of_node(id) {
                if self
                    .paths
                    .get(mid)
                    .map(|m| m.position.is_reverse)
                    .unwrap_or(false)
                {
                    stranded += 1;
                }
            }
        }
        if stranded > 0 {
            eprintln!(
                "[unfold] {} reverse path visits fell outside the unfold bound",
                stranded
            );
        }
        if verbose {
            eprintln!("[unfold] cloned {} reverse traversals", translation.len());
        }
        translation
    }

    /// Shortest cycle length (in bases) passing through the component, on
    /// node-level forward adjacency.
    fn min_cycle_length(&self, comp: &BTreeSet<u64>) -> usize {
        let mut adj: HashMap<u64, Vec<u64>> = HashMap::new();
        for (a, b) in self.edge_pairs() {
            if !comp.contains(&a.node) || !comp.contains(&b.node) {
                continue;
            }
            if a.is_end && !b.is_end {
                adj.entry(a.node).or_default().push(b.node);
            } else if b.is_end && !a.is_end {
                adj.entry(b.node).or_default().push(a.node);
            }
        }
        let mut best = usize::MAX;
        for &s in comp {
            // dist(v): least bases spelled strictly between s and v
            let mut dist: HashMap<u64, usize> = HashMap::new();
            let mut queue: Vec<u64> = Vec::new();
            for &w in adj.get(&s).map(|v| v.as_slice()).unwrap_or_default() {
                if w == s {
                    best = best.min(self.node_len(s));
                } else if dist.insert(w, 0).is_none() {
                    queue.push(w);
                }
            }
            while let Some(v) = queue.pop() {
                let d = dist[&v];
                for &w in adj.get(&v).map(|v| v.as_slice()).unwrap_or_default() {
                    if w == s {
                        best = best.min(self.node_len(s) + d + self.node_len(v));
                        continue;
                    }
                    let nd = d + self.node_len(v);
                    if dist.get(&w).map(|&x| nd < x).unwrap_or(true) {
                        dist.insert(w, nd);
                        queue.push(w);
                    }
                }
            }
        }
        if best == usize::MAX {
            self.total_sequence_length().max(1)
        } else {
            best.max(1)
        }
    }

    /// Unroll every cyclic strongly connected component so that walks up to
    /// `target_len` bases are represented in an acyclic graph. Back-edges
    /// within a component lead to the next copy; the last copy's are
    /// dropped. `component_cap` bounds the sequence added per component.
    /// Returns the acyclic graph (without paths) plus new id -> (old id,
    /// false) for lift-over.
    pub fn dagify(
        &self,
        target_len: usize,
        component_cap: Option<usize>,
    ) -> (VariationGraph, HashMap<u64, (u64, bool)>) {
        let sccs = self.strongly_connected_components();
        let mut dag = VariationGraph::new();
        let mut translation: HashMap<u64, (u64, bool)> = HashMap::new();

        // copy 0 of every node keeps its id
        for id in self.node_ids() {
            let node = &self.nodes[&id];
            dag.create_node_with_id(id, node.sequence.clone())
                .expect("fresh graph accepts original ids");
            translation.insert(id, (id, false));
        }

        // decide copy counts and materialize the extra copies
        let mut comp_of: HashMap<u64, usize> = HashMap::new();
        let mut copies_of: Vec<usize> = Vec::with_capacity(sccs.len());
        let mut copy_ids: HashMap<(u64, usize), u64> = HashMap::new();
        for (ci, scc) in sccs.iter().enumerate() {
            for &n in &scc.nodes {
                comp_of.insert(n, ci);
                copy_ids.insert((n, 0), n);
            }
            let copies = if scc.cyclic {
                let shortest = self.min_cycle_length(&scc.nodes);
                let mut copies = target_len.div_ceil(shortest) + 1;
                if let Some(cap) = component_cap {
                    let total: usize = scc.nodes.iter().map(|&n| self.node_len(n)).sum();
                    while copies > 1 && copies * total > cap {
                        copies -= 1;
                    }
                }
                copies.max(2)
            } else {
                1
            };
            copies_of.push(copies);
            for i in 1..copies {
                for &n in &scc.nodes {
                    let clone = dag.create_node(self.nodes[&n].sequence.clone());
                    copy_ids.insert((n, i), clone);
                    translation.insert(clone, (n, false));
                }
            }
        }

        let side_on_copy = |side: NodeSide, i: usize| -> Option<NodeSide> {
            copy_ids.get(&(side.node, i)).map(|&node| NodeSide {
                node,
                is_end: side.is_end,
            })
        };

        // rank within a component orders its members so that back-edges
        // are exactly the non-increasing ones
        let rank: HashMap<u64, usize> = sccs
            .iter()
            .flat_map(|scc| scc.nodes.iter().enumerate().map(|(i, &n)| (n, i)))
            .collect();

        for (a, b) in self.edge_pairs() {
            let ca = comp_of[&a.node];
            let cb = comp_of[&b.node];
            if ca == cb && sccs[ca].cyclic {
                let copies = copies_of[ca];
                // forward intra-component edges run end -> start toward a
                // higher rank; everything else wraps to the next copy
                let (src, dst) = if a.is_end && !b.is_end {
                    (a, b)
                } else if b.is_end && !a.is_end {
                    (b, a)
                } else {
                    (a, b)
                };
                let forward = src.is_end && !dst.is_end && rank[&dst.node] > rank[&src.node];
                for i in 0..copies {
                    let j = if forward { i } else { i + 1 };
                    if j >= copies {
                        continue;
                    }
                    if let (Some(s), Some(d)) = (side_on_copy(src, i), side_on_copy(dst, j)) {
                        dag.create_edge(s, d);
                    }
                }
            } else {
                // between components: exits from every copy of the source,
                // entry into copy 0 of the target
                let (src, dst) = if a.is_end && !b.is_end {
                    (a, b)
                } else if b.is_end && !a.is_end {
                    (b, a)
                } else {
                    // non-forward inter-component edge: keep the base copy
                    dag.create_edge(a, b);
                    continue;
                };
                let src_copies = copies_of[comp_of[&src.node]];
                for i in 0..src_copies {
                    if let (Some(s), Some(d)) = (side_on_copy(src, i), side_on_copy(dst, 0)) {
                        dag.create_edge(s, d);
                    }
                }
            }
        }

        (dag, translation)
    }

    /// Bidirected Kahn topological sort. Heads seed the candidate set;
    /// when it runs dry a recorded seed (or the lowest-id unvisited node,
    /// forward first) breaks the next cycle. Every edge must be consumed
    /// by the traversal or the graph state is inconsistent.
    pub fn topological_order(&self, verbose: bool) -> Vec<Handle> {
        let mut order: Vec<Handle> = Vec::with_capacity(self.node_count());
        if self.nodes.is_empty() {
            return order;
        }
        let mut s: BTreeSet<Handle> = BTreeSet::new();
        let mut visited: HashSet<u64> = HashSet::new();
        let mut unvisited: HashSet<Handle> = HashSet::new();
        for id in self.node_ids() {
            unvisited.insert(Handle::forward(id));
            unvisited.insert(Handle::reverse(id));
        }
        let mut seeds: Vec<Handle> = Vec::new();
        let mut masked: HashSet<(NodeSide, NodeSide)> = HashSet::new();

        for (i, id) in self.head_nodes().into_iter().enumerate() {
            let h = Handle::forward(id);
            if i == 0 {
                s.insert(h);
                unvisited.remove(&h);
                unvisited.remove(&h.flip());
            } else {
                seeds.push(h);
            }
        }

        while !unvisited.is_empty() || !s.is_empty() {
            if s.is_empty() {
                let mut promoted = false;
                while !seeds.is_empty() {
                    let seed = seeds.remove(0);
                    if unvisited.contains(&seed) {
                        s.insert(seed);
                        unvisited.remove(&seed);
                        unvisited.remove(&seed.flip());
                        promoted = true;
                        break;
                    }
                }
                if !promoted {
                    let next = unvisited
                        .iter()
                        .min_by_key(|h| (h.node_id(), h.is_reverse()))
                        .copied();
                    match next {
                        Some(h) => {
                            s.insert(h);
                            unvisited.remove(&h);
                            unvisited.remove(&h.flip());
                        }
                        None => break,
                    }
                }
            }

            while let Some(&h) = s.iter().next() {
                s.remove(&h);
                if visited.insert(h.node_id()) {
                    order.push(h);
                    if verbose {
                        eprintln!("[sort] emitting {}", h);
                    }
                }

                // cycle-breaking: consume left-side edges back into the
                // visited region
                let left = h.left_side();
                for other in self.sides_of(left) {
                    if visited.contains(&other.node) {
                        masked.insert(canonical(left, other));
                    }
                }

                let right = h.right_side();
                let mut outgoing = self.sides_of(right);
                outgoing.sort();
                for other in outgoing {
                    let key = canonical(right, other);
                    if masked.contains(&key) {
                        continue;
                    }
                    masked.insert(key);
                    let next = other.entering();
                    if !unvisited.contains(&next) {
                        continue;
                    }
                    let next_left = next.left_side();
                    let blocked = self
                        .sides_of(next_left)
                        .into_iter()
                        .any(|nb| !masked.contains(&canonical(next_left, nb)));
                    if !blocked {
                        s.insert(next);
                        unvisited.remove(&next);
                        unvisited.remove(&next.flip());
                    } else if !seeds.contains(&next) {
                        seeds.push(next);
                    }
                }
            }
        }

        for pair in self.edge_pairs() {
            if !masked.contains(&pair) {
                self.fatal(&format!(
                    "topological sort left edge {}--{} unconsumed",
                    pair.0, pair.1
                ));
            }
        }
        order
    }

    /// Flip a node in place: reverse-complement its sequence, swap its
    /// sides on every incident edge, and toggle the strand of every path
    /// mapping on it.
    pub fn flip_node_orientation(&mut self, id: u64) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.sequence = reverse_complement(&node.sequence);

        let mut incident: Vec<(NodeSide, NodeSide)> = Vec::new();
        for side in [NodeSide::start(id), NodeSide::end(id)] {
            for other in self.sides_of(side) {
                incident.push(canonical(side, other));
            }
        }
        incident.sort();
        incident.dedup();
        let remap = |s: NodeSide| if s.node == id { s.flip() } else { s };
        for (a, b) in &incident {
            self.destroy_edge(*a, *b);
        }
        for (a, b) in incident {
            self.create_edge(remap(a), remap(b));
        }

        for mid in self.paths.of_node(id) {
            if let Some(mut mapping) = self.paths.get(mid).cloned() {
                mapping.position.is_reverse = !mapping.position.is_reverse;
                self.paths.set_mapping(mid, mapping);
            }
        }
    }

    /// Make every traversal in the order forward by flipping the nodes
    /// visited in reverse. Returns how many were flipped.
    pub fn apply_orientations(&mut self, order: &[Handle]) -> usize {
        let mut flipped = 0;
        for h in order {
            if h.is_reverse() {
                self.flip_node_orientation(h.node_id());
                flipped += 1;
            }
        }
        flipped
    }

    /// Renumber node ids 1..N following the given order.
    pub fn apply_ordering(&mut self, order: &[Handle]) -> Result<(), String> {
        if order.len() != self.node_count() {
            return Err(format!(
                "ordering covers {} of {} nodes",
                order.len(),
                self.node_count()
            ));
        }
        let map: HashMap<u64, u64> = order
            .iter()
            .enumerate()
            .map(|(i, h)| (h.node_id(), (i + 1) as u64))
            .collect();
        self.apply_id_mapping(&map);
        Ok(())
    }

    /// Topologically sort, orient every node forward, and renumber ids so
    /// node order equals topological order.
    pub fn sort_topologically(&mut self, verbose: bool) -> Result<(), String> {
        let order = self.topological_order(verbose);
        self.apply_orientations(&order);
        let forward: Vec<Handle> = order.iter().map(|h| Handle::forward(h.node_id())).collect();
        self.apply_ordering(&forward)
    }

    /// Drop edges a forward DAG cannot represent: strand-crossing edges
    /// and self-loops. Returns how many were destroyed.
    pub fn prune_non_dag_edges(&mut self) -> usize {
        let doomed: Vec<(NodeSide, NodeSide)> = self
            .edge_pairs()
            .into_iter()
            .filter(|(a, b)| Self::is_reversing_edge(*a, *b) || a.node == b.node)
            .collect();
        for (a, b) in &doomed {
            self.destroy_edge(*a, *b);
        }
        doomed.len()
    }
}

/// Express a clone map as C9 translations over the given graphs.
pub fn clone_translations(
    new_graph: &VariationGraph,
    old_graph: &VariationGraph,
    map: &HashMap<u64, (u64, bool)>,
) -> Vec<Translation> {
    let mut out = Vec::new();
    let mut ids: Vec<u64> = map.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let (old, reversed) = map[&id];
        let len = new_graph.node_len(id).max(old_graph.node_len(old));
        let mut from = Path::new("");
        from.mappings
            .push(Mapping::perfect(Position::new(old, reversed, 0), len, 1));
        let mut to = Path::new("");
        to.mappings
            .push(Mapping::perfect(Position::forward(id, 0), len, 1));
        out.push(Translation::new(from, to));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scc_singleton_self_loop() {
        let mut g = VariationGraph::new();
        let n = g.create_node(b"ACGT".to_vec());
        g.create_edge(NodeSide::end(n), NodeSide::start(n));
        let sccs = g.strongly_connected_components();
        assert_eq!(sccs.len(), 1);
        assert!(sccs[0].cyclic);
        assert_eq!(sccs[0].nodes.iter().copied().collect::<Vec<_>>(), vec![n]);
    }

    #[test]
    fn test_scc_three_cycle() {
        let mut g = VariationGraph::new();
        let x = g.create_node(b"AA".to_vec());
        let y = g.create_node(b"CC".to_vec());
        let z = g.create_node(b"GG".to_vec());
        let w = g.create_node(b"TT".to_vec());
        g.create_edge_between(Handle::forward(x), Handle::forward(y));
        g.create_edge_between(Handle::forward(y), Handle::forward(z));
        g.create_edge_between(Handle::forward(z), Handle::forward(x));
        g.create_edge_between(Handle::forward(z), Handle::forward(w));
        let sccs = g.strongly_connected_components();
        assert_eq!(sccs.len(), 2);
        assert!(sccs[0].cyclic);
        assert_eq!(
            sccs[0].nodes.iter().copied().collect::<Vec<_>>(),
            vec![x, y, z]
        );
        assert!(!sccs[1].cyclic);
    }

    #[test]
    fn test_unfold_inversion() {
        let mut g = VariationGraph::new();
        let a = g.create_node(b"AAAA".to_vec());
        let b = g.create_node(b"CCCC".to_vec());
        g.create_edge(NodeSide::end(a), NodeSide::end(b));
        let translation = g.unfold(8, false);

        assert_eq!(translation.len(), 1);
        let (&clone, &(orig, reversed)) = translation.iter().next().expect("one clone");
        assert_eq!(orig, b);
        assert!(reversed);
        assert_eq!(g.nodes[&clone].sequence, b"GGGG".to_vec());
        assert!(g.has_edge_between(Handle::forward(a), Handle::forward(clone)));
        assert!(!g.has_edge(NodeSide::end(a), NodeSide::end(b)));
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_unfold_chain_beyond_crossing() {
        // A+ -> B- -> C- (the reverse region spans two nodes)
        let mut g = VariationGraph::new();
        let a = g.create_node(b"AA".to_vec());
        let b = g.create_node(b"CCCC".to_vec());
        let c = g.create_node(b"GG".to_vec());
        g.create_edge(NodeSide::end(a), NodeSide::end(b));
        g.create_edge_between(Handle::forward(c), Handle::forward(b));
        let translation = g.unfold(16, false);
        // both B and C are reached in reverse
        assert_eq!(translation.len(), 2);
        let by_orig: HashMap<u64, u64> =
            translation.iter().map(|(&k, &(o, _))| (o, k)).collect();
        let b_clone = by_orig[&b];
        let c_clone = by_orig[&c];
        assert_eq!(g.nodes[&b_clone].sequence, b"GGGG".to_vec());
        assert_eq!(g.nodes[&c_clone].sequence, b"CC".to_vec());
        assert!(g.has_edge_between(Handle::forward(a), Handle::forward(b_clone)));
        assert!(g.has_edge_between(Handle::forward(b_clone), Handle::forward(c_clone)));
    }

    #[test]
    fn test_dagify_three_cycle_unrolls() {
        let mut g = VariationGraph::new();
        let x = g.create_node(b"AA".to_vec());
        let y = g.create_node(b"CC".to_vec());
        let z = g.create_node(b"GG".to_vec());
        g.create_edge_between(Handle::forward(x), Handle::forward(y));
        g.create_edge_between(Handle::forward(y), Handle::forward(z));
        g.create_edge_between(Handle::forward(z), Handle::forward(x));
        let (dag, translation) = g.dagify(6, None);

        // two copies of the cycle, wired as a chain
        assert_eq!(dag.node_count(), 6);
        let sccs = dag.strongly_connected_components();
        assert!(sccs.iter().all(|s| !s.cyclic));
        // copy 0 keeps ids; the back edge z -> x lands on x's copy 1
        let x1 = translation
            .iter()
            .filter(|(&new, &(old, _))| old == x && new != x)
            .map(|(&new, _)| new)
            .next()
            .expect("second copy of x");
        assert!(dag.has_edge_between(Handle::forward(z), Handle::forward(x1)));
        assert!(dag.has_edge_between(Handle::forward(x), Handle::forward(y)));
        // no edge closes the cycle back into copy 0
        assert!(!dag.has_edge_between(Handle::forward(z), Handle::forward(x)));
        let z1 = translation
            .iter()
            .filter(|(&new, &(old, _))| old == z && new != z)
            .map(|(&new, _)| new)
            .next()
            .expect("second copy of z");
        assert_eq!(dag.edges_from(Handle::forward(z1)).len(), 0);
    }

    #[test]
    fn test_dagify_self_loop_singleton() {
        let mut g = VariationGraph::new();
        let n = g.create_node(b"ACGT".to_vec());
        g.create_edge(NodeSide::end(n), NodeSide::start(n));
        let (dag, translation) = g.dagify(1, None);
        assert_eq!(dag.node_count(), 2);
        let copy = translation
            .iter()
            .filter(|(&new, _)| new != n)
            .map(|(&new, _)| new)
            .next()
            .expect("one copy");
        assert!(dag.has_edge_between(Handle::forward(n), Handle::forward(copy)));
        assert_eq!(dag.edges_from(Handle::forward(copy)).len(), 0);
        assert_eq!(dag.edge_count(), 1);
    }

    #[test]
    fn test_topological_sort_linear() {
        let mut g = VariationGraph::new();
        let a = g.create_node(b"A".to_vec());
        let b = g.create_node(b"C".to_vec());
        let c = g.create_node(b"G".to_vec());
        g.create_edge_between(Handle::forward(b), Handle::forward(c));
        g.create_edge_between(Handle::forward(a), Handle::forward(b));
        let order = g.topological_order(false);
        assert_eq!(order, vec![Handle::forward(a), Handle::forward(b), Handle::forward(c)]);
    }

    #[test]
    fn test_sort_topologically_renumbers_in_order() {
        let mut g = VariationGraph::new();
        // build a diamond out of id order
        let d = g.create_node(b"TT".to_vec());
        let a = g.create_node(b"AA".to_vec());
        let b = g.create_node(b"CC".to_vec());
        let c = g.create_node(b"GG".to_vec());
        g.create_edge_between(Handle::forward(a), Handle::forward(b));
        g.create_edge_between(Handle::forward(a), Handle::forward(c));
        g.create_edge_between(Handle::forward(b), Handle::forward(d));
        g.create_edge_between(Handle::forward(c), Handle::forward(d));
        g.sort_topologically(false).unwrap();
        // ids 1..4 and every edge goes low -> high
        assert_eq!(g.node_ids(), vec![1, 2, 3, 4]);
        for (x, y) in g.edge_pairs() {
            let (src, dst) = if x.is_end { (x.node, y.node) } else { (y.node, x.node) };
            assert!(src < dst, "edge {} -> {} violates the order", src, dst);
        }
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_sort_flips_reverse_oriented_nodes() {
        let mut g = VariationGraph::new();
        let a = g.create_node(b"ACG".to_vec());
        let b = g.create_node(b"AAT".to_vec());
        // a+ -> b-: b is only ever visited in reverse
        g.create_edge_between(Handle::forward(a), Handle::reverse(b));
        g.paths
            .append_mapping("p", Mapping::perfect(Position::forward(a, 0), 3, 1));
        g.paths
            .append_mapping("p", Mapping::perfect(Position::new(b, true, 0), 3, 2));
        let spelled = g.path_sequence("p").unwrap();
        g.sort_topologically(false).unwrap();
        // after orientation, no reversing edges remain
        assert!(g
            .edge_pairs()
            .iter()
            .all(|(x, y)| !VariationGraph::is_reversing_edge(*x, *y)));
        assert_eq!(g.path_sequence("p").unwrap(), spelled);
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_prune_non_dag_edges() {
        let mut g = VariationGraph::new();
        let a = g.create_node(b"AA".to_vec());
        let b = g.create_node(b"CC".to_vec());
        g.create_edge_between(Handle::forward(a), Handle::forward(b));
        g.create_edge(NodeSide::end(a), NodeSide::end(b));
        g.create_edge(NodeSide::end(b), NodeSide::start(b));
        assert_eq!(g.prune_non_dag_edges(), 2);
        assert_eq!(g.edge_count(), 1);
    }
}
