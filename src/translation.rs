use crate::path::{Mapping, Path};
use std::collections::HashMap;

/// A piecewise correspondence between two graphs: `to` covers a node (or
/// segment) of the new graph, `from` says where it came from in the old
/// one. Novel material gets a synthetic from-path carrying the inserted
/// literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub from: Path,
    pub to: Path,
}

impl Translation {
    pub fn new(from: Path, to: Path) -> Self {
        Translation { from, to }
    }

    /// True when nothing moved: the two sides describe the same walk.
    pub fn is_identity(&self) -> bool {
        self.from.mappings == self.to.mappings
    }

    /// Swap the direction of the correspondence.
    pub fn invert(&self) -> Translation {
        Translation {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    /// The same correspondence read on the opposite strand. Node lengths
    /// for both graphs are supplied by the caller.
    pub fn reverse_complement<F>(&self, node_len: F) -> Translation
    where
        F: Fn(u64) -> usize + Copy,
    {
        Translation {
            from: self.from.reverse_complement(node_len),
            to: self.to.reverse_complement(node_len),
        }
    }
}

/// Order translations by the first position of their from-path.
pub fn sort_translations(translations: &mut [Translation]) {
    translations.sort_by_key(|t| t.from.first_position());
}

/// Compose two translation sets: `over` maps the top graph into the middle
/// one, `under` maps the middle into the bottom. A node mentioned by
/// `over`'s from-side that `under` knows is rewritten to the bottom node,
/// with the orientation flags XOR-ed and offsets rebased. Nodes `under`
/// does not know pass through unchanged.
pub fn overlay(over: &[Translation], under: &[Translation]) -> Vec<Translation> {
    // node in the middle graph -> (bottom node, flips orientation, offset)
    let mut base: HashMap<u64, (u64, bool, usize)> = HashMap::new();
    for t in under {
        let (Some(to_m), Some(from_m)) = (t.to.mappings.first(), t.from.mappings.first()) else {
            continue;
        };
        // the reverse-complement twin of each entry carries the same fact;
        // index the forward reading only
        if to_m.position.is_reverse {
            continue;
        }
        base.insert(
            to_m.position.node_id,
            (
                from_m.position.node_id,
                from_m.position.is_reverse,
                from_m.position.offset,
            ),
        );
    }

    let rewrite = |m: &Mapping| -> Mapping {
        let mut out = m.clone();
        if let Some(&(node, flips, offset)) = base.get(&m.position.node_id) {
            out.position.node_id = node;
            out.position.is_reverse ^= flips;
            out.position.offset += offset;
        }
        out
    };

    let mut composed = Vec::with_capacity(over.len());
    for t in over {
        let mut from = Path::new(&t.from.name);
        from.is_circular = t.from.is_circular;
        from.mappings = t.from.mappings.iter().map(rewrite).collect();
        composed.push(Translation {
            from,
            to: t.to.clone(),
        });
    }
    sort_translations(&mut composed);
    composed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::Position;

    fn simple(from_node: u64, from_rev: bool, to_node: u64, len: usize) -> Translation {
        let mut from = Path::new("");
        from.mappings
            .push(Mapping::perfect(Position::new(from_node, from_rev, 0), len, 1));
        let mut to = Path::new("");
        to.mappings
            .push(Mapping::perfect(Position::forward(to_node, 0), len, 1));
        Translation { from, to }
    }

    #[test]
    fn test_identity_and_invert() {
        let t = simple(1, false, 1, 4);
        assert!(t.is_identity());
        let t2 = simple(2, true, 5, 4);
        assert!(!t2.is_identity());
        assert_eq!(t2.invert().from, t2.to);
    }

    #[test]
    fn test_overlay_xor_orientation() {
        // top node 9 came from middle node 5 reversed; middle node 5 came
        // from bottom node 2 reversed: the flips cancel.
        let over = vec![simple(5, true, 9, 4)];
        let under = vec![simple(2, true, 5, 4)];
        let composed = overlay(&over, &under);
        assert_eq!(composed.len(), 1);
        let m = &composed[0].from.mappings[0];
        assert_eq!(m.position.node_id, 2);
        assert!(!m.position.is_reverse);
    }

    #[test]
    fn test_overlay_associative() {
        let a = vec![simple(5, false, 9, 4)];
        let b = vec![simple(2, true, 5, 4)];
        let c = vec![simple(1, true, 2, 4)];
        let left = overlay(&overlay(&a, &b), &c);
        let right = overlay(&a, &overlay(&b, &c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_overlay_unknown_node_passes_through() {
        let over = vec![simple(7, false, 9, 3)];
        let under = vec![simple(2, false, 5, 3)];
        let composed = overlay(&over, &under);
        assert_eq!(composed[0].from.mappings[0].position.node_id, 7);
    }
}
