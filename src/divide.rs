use crate::graph::VariationGraph;
use crate::handle::{Handle, NodeSide};
use crate::pos::Position;

impl VariationGraph {
    /// Divide a node at the given forward-strand offsets, producing pieces
    /// whose concatenation spells the original sequence.
    ///
    /// Edges on the start of the node move to the start of the first piece,
    /// edges on the end to the end of the last; consecutive pieces are
    /// joined by forward edges. Self-loops are rewritten symmetrically.
    /// Every path mapping on the node is cut at the same offsets (measured
    /// from the far end for reverse mappings) and reassigned to the pieces
    /// it covers. Offsets of 0 and node length are identity cuts.
    pub fn divide_node(&mut self, id: u64, offsets: &[usize]) -> Result<Vec<u64>, String> {
        let node = self
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("no node with id {}", id))?;
        let len = node.len();

        let mut cuts: Vec<usize> = Vec::with_capacity(offsets.len());
        for &o in offsets {
            if o > len {
                return Err(format!(
                    "divide offset {} outside node {} of length {}",
                    o, id, len
                ));
            }
            if o == 0 || o == len {
                continue;
            }
            if cuts.last().is_some_and(|&last| o <= last) {
                return Err("divide offsets must be sorted and strictly increasing".to_string());
            }
            cuts.push(o);
        }
        if cuts.is_empty() {
            return Ok(vec![id]);
        }

        let mut bounds = Vec::with_capacity(cuts.len() + 2);
        bounds.push(0);
        bounds.extend_from_slice(&cuts);
        bounds.push(len);

        let mut pieces = Vec::with_capacity(bounds.len() - 1);
        for w in bounds.windows(2) {
            pieces.push(self.create_node(node.sequence[w[0]..w[1]].to_vec()));
        }
        let first = pieces[0];
        let last = *pieces.last().expect("at least two pieces");

        // Route edges off the old node, rewriting self-referential endpoints.
        let map_side = |s: NodeSide| -> NodeSide {
            if s.node == id {
                if s.is_end {
                    NodeSide::end(last)
                } else {
                    NodeSide::start(first)
                }
            } else {
                s
            }
        };
        for other in self.sides_of(NodeSide::start(id)) {
            self.create_edge(NodeSide::start(first), map_side(other));
        }
        for other in self.sides_of(NodeSide::end(id)) {
            self.create_edge(NodeSide::end(last), map_side(other));
        }
        for w in pieces.windows(2) {
            self.create_edge(NodeSide::end(w[0]), NodeSide::start(w[1]));
        }

        // Cut every mapping on the node and hand the sub-mappings to the
        // pieces they cover.
        let mut touched_paths: Vec<String> = Vec::new();
        for mid in self.paths.of_node(id) {
            let Some(mapping) = self.paths.get(mid).cloned() else {
                continue;
            };
            if let Some(name) = self.paths.path_of(mid) {
                let name = name.to_string();
                if !touched_paths.contains(&name) {
                    touched_paths.push(name);
                }
            }
            let flen = mapping.from_length();
            let reverse = mapping.position.is_reverse;
            // Forward-strand range this mapping covers
            let (range_start, range_end) = if reverse {
                (len - mapping.position.offset - flen, len - mapping.position.offset)
            } else {
                (mapping.position.offset, mapping.position.offset + flen)
            };
            // Cuts inside the range, converted to mapping-relative from-length
            // offsets in reading order.
            let mut rel: Vec<usize> = cuts
                .iter()
                .filter(|&&c| c > range_start && c < range_end)
                .map(|&c| {
                    if reverse {
                        (len - c) - mapping.position.offset
                    } else {
                        c - mapping.position.offset
                    }
                })
                .collect();
            rel.sort_unstable();

            let mut sub_ids = vec![mid];
            let mut current = mid;
            let mut consumed = 0;
            for &r in &rel {
                let (_, right) = self.paths.divide_mapping(current, r - consumed)?;
                sub_ids.push(right);
                current = right;
                consumed = r;
            }

            for sub in sub_ids {
                let Some(sub_mapping) = self.paths.get(sub).cloned() else {
                    continue;
                };
                let sub_flen = sub_mapping.from_length();
                let (a, b) = if reverse {
                    (
                        len - sub_mapping.position.offset - sub_flen,
                        len - sub_mapping.position.offset,
                    )
                } else {
                    (sub_mapping.position.offset, sub_mapping.position.offset + sub_flen)
                };
                // Piece whose range contains [a, b)
                let mut piece_idx = match bounds.binary_search(&a) {
                    Ok(i) => i,
                    Err(i) => i - 1,
                };
                piece_idx = piece_idx.min(pieces.len() - 1);
                debug_assert!(b <= bounds[piece_idx + 1]);
                let mut updated = sub_mapping;
                updated.position = Position::new(
                    pieces[piece_idx],
                    reverse,
                    if reverse {
                        bounds[piece_idx + 1] - b
                    } else {
                        a - bounds[piece_idx]
                    },
                );
                self.paths.set_mapping(sub, updated);
            }
        }

        self.destroy_node(id);
        for name in touched_paths {
            self.paths.compact_path_ranks(&name);
        }
        Ok(pieces)
    }

    /// Divide a node at a single offset.
    pub fn divide_node_at(&mut self, id: u64, offset: usize) -> Result<(u64, u64), String> {
        let pieces = self.divide_node(id, &[offset])?;
        match pieces.as_slice() {
            [only] => Ok((*only, *only)),
            [left, right] => Ok((*left, *right)),
            _ => unreachable!("single cut yields at most two pieces"),
        }
    }

    /// Fold duplicate nodes into one. All handles must spell the same
    /// oriented sequence; edges and path mappings of the others are moved
    /// onto `keep` with orientations adjusted, then the others are
    /// destroyed.
    pub fn merge_nodes(&mut self, keep: Handle, others: &[Handle]) -> Result<(), String> {
        let keep_seq = self
            .sequence(keep)
            .ok_or_else(|| format!("no node with id {}", keep.node_id()))?;
        for &other in others {
            if other.node_id() == keep.node_id() {
                continue;
            }
            let other_seq = self
                .sequence(other)
                .ok_or_else(|| format!("no node with id {}", other.node_id()))?;
            if other_seq != keep_seq {
                return Err(format!(
                    "cannot merge {} into {}: sequences differ",
                    other, keep
                ));
            }

            // left side of `other` corresponds to left side of `keep`
            let side_pairs = [
                (other.left_side(), keep.left_side()),
                (other.right_side(), keep.right_side()),
            ];
            let map_side = |s: NodeSide| -> NodeSide {
                for (from, to) in side_pairs {
                    if s == from {
                        return to;
                    }
                }
                s
            };
            for (from, to) in side_pairs {
                for neighbour in self.sides_of(from) {
                    self.create_edge(to, map_side(neighbour));
                }
            }

            for mid in self.paths.of_node(other.node_id()) {
                let Some(mut mapping) = self.paths.get(mid).cloned() else {
                    continue;
                };
                let flip = mapping.position.is_reverse != other.is_reverse();
                mapping.position.node_id = keep.node_id();
                mapping.position.is_reverse = keep.is_reverse() != flip;
                self.paths.set_mapping(mid, mapping);
            }

            self.destroy_node(other.node_id());
        }
        Ok(())
    }
}
