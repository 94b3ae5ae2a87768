use crate::graph::VariationGraph;
use crate::handle::{reverse_complement, Handle};
use crate::path::{Edit, Mapping, Path};
use crate::pos::Position;
use crate::translation::{sort_translations, Translation};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Convert an oriented [off, off+len) range into forward-strand boundaries.
fn forward_range(off: usize, len: usize, node_len: usize, is_reverse: bool) -> (usize, usize) {
    if is_reverse {
        (node_len - off - len, node_len - off)
    } else {
        (off, off + len)
    }
}

impl VariationGraph {
    /// Apply a set of alignment paths, expressed against the current graph,
    /// as graph edits: nodes are divided at edit boundaries, novel sequence
    /// gets new nodes, edges are wired along each path, and the paths are
    /// embedded. Returns translations mapping the edited graph back onto
    /// the pre-edit graph, with the reverse-complement of every entry
    /// appended so lift-over works on both strands.
    pub fn edit(&mut self, mut paths: Vec<Path>) -> Result<Vec<Translation>, String> {
        for p in &paths {
            if self.paths.has_path(&p.name) {
                return Err(format!("path {} already exists in the graph", p.name));
            }
        }
        for p in &mut paths {
            p.simplify();
        }

        // lengths of every referenced node before any division
        let mut old_len: HashMap<u64, usize> = HashMap::new();
        for p in &paths {
            for m in &p.mappings {
                let id = m.position.node_id;
                if !self.has_node(id) {
                    return Err(format!("path {} maps to missing node {}", p.name, id));
                }
                old_len.insert(id, self.node_len(id));
            }
        }

        let breakpoints = self.find_breakpoints(&paths, &old_len)?;
        let (node_map, orig_of) = self.ensure_breakpoints(&breakpoints)?;
        let added = self.add_paths_to_graph(&paths, &old_len, &node_map)?;
        Ok(self.make_translations(&orig_of, &added, &old_len))
    }

    /// Forward-strand offsets at which each node must be divided before the
    /// paths can be attached: at every mapping start inside a node and on
    /// both sides of every non-match edit.
    fn find_breakpoints(
        &self,
        paths: &[Path],
        old_len: &HashMap<u64, usize>,
    ) -> Result<HashMap<u64, BTreeSet<usize>>, String> {
        let mut breakpoints: HashMap<u64, BTreeSet<usize>> = HashMap::new();
        for p in paths {
            for m in &p.mappings {
                let node = m.position.node_id;
                let len = old_len[&node];
                let reverse = m.position.is_reverse;
                let cuts = breakpoints.entry(node).or_default();
                let mut record = |oriented: usize| {
                    let fwd = if reverse { len - oriented } else { oriented };
                    if fwd > 0 && fwd < len {
                        cuts.insert(fwd);
                    }
                };
                let mut off = m.position.offset;
                if off + m.from_length() > len {
                    return Err(format!(
                        "path {} mapping overruns node {}",
                        p.name, node
                    ));
                }
                record(off);
                let last = m.edits.len().saturating_sub(1);
                for (i, edit) in m.edits.iter().enumerate() {
                    if !edit.is_match() {
                        record(off);
                        record(off + edit.from_len);
                    } else if i == last {
                        record(off + edit.from_len);
                    }
                    off += edit.from_len;
                }
            }
        }
        Ok(breakpoints)
    }

    /// Divide nodes at the recorded offsets. Returns, per original node,
    /// the forward-offset -> piece map, plus the inverse piece -> origin
    /// map used for translations.
    #[allow(clippy::type_complexity)]
    fn ensure_breakpoints(
        &mut self,
        breakpoints: &HashMap<u64, BTreeSet<usize>>,
    ) -> Result<(HashMap<u64, BTreeMap<usize, u64>>, HashMap<u64, (u64, usize)>), String> {
        let mut node_map: HashMap<u64, BTreeMap<usize, u64>> = HashMap::new();
        let mut orig_of: HashMap<u64, (u64, usize)> = HashMap::new();
        let mut nodes: Vec<u64> = breakpoints.keys().copied().collect();
        nodes.sort_unstable();
        for node in nodes {
            let len = self.node_len(node);
            let cuts: Vec<usize> = breakpoints[&node]
                .iter()
                .copied()
                .filter(|&c| c > 0 && c < len)
                .collect();
            let mut map = BTreeMap::new();
            if cuts.is_empty() {
                map.insert(0, node);
            } else {
                let pieces = self.divide_node(node, &cuts)?;
                let mut start = 0;
                for piece in pieces {
                    map.insert(start, piece);
                    orig_of.insert(piece, (node, start));
                    start += self.node_len(piece);
                }
            }
            node_map.insert(node, map);
        }
        Ok((node_map, orig_of))
    }

    /// Walk each path edit by edit, tracking the dangling side reached so
    /// far; wire matches through the divided pieces, create deduplicated
    /// nodes for novel sequence, and embed the path. Returns the synthetic
    /// from-paths describing where each added node was inserted.
    fn add_paths_to_graph(
        &mut self,
        paths: &[Path],
        old_len: &HashMap<u64, usize>,
        node_map: &HashMap<u64, BTreeMap<usize, u64>>,
    ) -> Result<HashMap<u64, Path>, String> {
        let mut added: HashMap<u64, Path> = HashMap::new();
        let mut dedup: HashMap<(Position, Vec<u8>), u64> = HashMap::new();

        for path in paths {
            let mut dangling: Option<Handle> = None;
            let mut embedded = Path::new(&path.name);
            embedded.is_circular = path.is_circular;
            let mut rank = 0u64;

            for mapping in &path.mappings {
                let node = mapping.position.node_id;
                let len = old_len[&node];
                let reverse = mapping.position.is_reverse;
                let mut off = mapping.position.offset;

                for edit in &mapping.edits {
                    if edit.is_match() {
                        let (a, b) = forward_range(off, edit.from_len, len, reverse);
                        let map = node_map
                            .get(&node)
                            .ok_or_else(|| format!("node {} missing from division map", node))?;
                        let mut run: Vec<u64> =
                            map.range(a..b).map(|(_, &piece)| piece).collect();
                        if run.is_empty() {
                            return Err(format!(
                                "no pieces cover node {} range {}..{}",
                                node, a, b
                            ));
                        }
                        if reverse {
                            run.reverse();
                        }
                        for (i, piece) in run.iter().enumerate() {
                            let h = Handle::new(*piece, reverse);
                            if i == 0 {
                                if let Some(d) = dangling {
                                    self.create_edge_between(d, h);
                                }
                            }
                            rank += 1;
                            embedded.mappings.push(Mapping::perfect(
                                Position::new(*piece, reverse, 0),
                                self.node_len(*piece),
                                rank,
                            ));
                            dangling = Some(h);
                        }
                        off += edit.from_len;
                    } else if edit.to_len > 0 {
                        // insertion or substitution: novel sequence node,
                        // stored forward-strand and deduplicated by
                        // (canonical start position, forward sequence)
                        let fwd_seq = if reverse {
                            reverse_complement(&edit.sequence)
                        } else {
                            edit.sequence.clone()
                        };
                        let fwd_boundary = if reverse { len - off } else { off };
                        let key_pos = Position::forward(node, fwd_boundary);
                        let key = (key_pos, fwd_seq.clone());
                        let new_id = match dedup.get(&key) {
                            Some(&id) => id,
                            None => {
                                let id = self.create_node(fwd_seq.clone());
                                dedup.insert(key, id);
                                let mut from = Path::new("");
                                let mut from_mapping = Mapping::new(key_pos, 1);
                                from_mapping.edits.push(Edit {
                                    from_len: edit.from_len,
                                    to_len: edit.to_len,
                                    sequence: fwd_seq,
                                });
                                from.mappings.push(from_mapping);
                                added.insert(id, from);
                                id
                            }
                        };
                        let h = Handle::new(new_id, reverse);
                        if let Some(d) = dangling {
                            self.create_edge_between(d, h);
                        }
                        rank += 1;
                        embedded.mappings.push(Mapping::perfect(
                            Position::new(new_id, reverse, 0),
                            edit.to_len,
                            rank,
                        ));
                        dangling = Some(h);
                        off += edit.from_len;
                    } else {
                        // deletion: consume node sequence, leave the
                        // dangling side for the next match to bridge
                        off += edit.from_len;
                    }
                }
            }
            self.paths.extend_with(&embedded);
        }
        Ok(added)
    }

    /// One translation per present node: pieces point back at their origin
    /// range, novel nodes carry their synthetic from-path, untouched nodes
    /// are identities. The reverse-complement of every entry is appended.
    fn make_translations(
        &self,
        orig_of: &HashMap<u64, (u64, usize)>,
        added: &HashMap<u64, Path>,
        old_len: &HashMap<u64, usize>,
    ) -> Vec<Translation> {
        let mut translations = Vec::new();
        for id in self.node_ids() {
            let len = self.node_len(id);
            let mut to = Path::new("");
            to.mappings
                .push(Mapping::perfect(Position::forward(id, 0), len, 1));
            let from = if let Some(&(orig, start)) = orig_of.get(&id) {
                let mut from = Path::new("");
                from.mappings
                    .push(Mapping::perfect(Position::forward(orig, start), len, 1));
                from
            } else if let Some(synthetic) = added.get(&id) {
                synthetic.clone()
            } else {
                to.clone()
            };
            translations.push(Translation::new(from, to));
        }

        let node_len = |id: u64| -> usize {
            if self.has_node(id) {
                self.node_len(id)
            } else {
                old_len.get(&id).copied().unwrap_or(0)
            }
        };
        let mut flipped: Vec<Translation> = translations
            .iter()
            .map(|t| t.reverse_complement(node_len))
            .collect();
        translations.append(&mut flipped);
        sort_translations(&mut translations);
        translations
    }
}
