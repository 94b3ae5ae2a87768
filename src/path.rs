use crate::handle::reverse_complement;
use crate::pos::Position;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Stable identifier for a mapping inside a `PathIndex`. Ids are allocated
/// from a counter and never reused, so a stale id can only miss, not alias.
pub type MappingId = u64;

/// One unit of correspondence between a path and the node it maps to.
///
/// Conventions: `from_len == to_len` with no sequence is a match,
/// `from_len == to_len == sequence.len()` is a substitution, `from_len == 0`
/// is an insertion and `to_len == 0` a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub from_len: usize,
    pub to_len: usize,
    pub sequence: Vec<u8>,
}

impl Edit {
    pub fn match_len(len: usize) -> Self {
        Edit {
            from_len: len,
            to_len: len,
            sequence: Vec::new(),
        }
    }

    pub fn substitution(sequence: Vec<u8>) -> Self {
        let len = sequence.len();
        Edit {
            from_len: len,
            to_len: len,
            sequence,
        }
    }

    pub fn insertion(sequence: Vec<u8>) -> Self {
        Edit {
            from_len: 0,
            to_len: sequence.len(),
            sequence,
        }
    }

    pub fn deletion(len: usize) -> Self {
        Edit {
            from_len: len,
            to_len: 0,
            sequence: Vec::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.from_len == self.to_len && self.sequence.is_empty()
    }

    pub fn is_substitution(&self) -> bool {
        self.from_len == self.to_len && !self.sequence.is_empty()
    }

    pub fn is_insertion(&self) -> bool {
        self.from_len == 0 && self.to_len > 0
    }

    pub fn is_deletion(&self) -> bool {
        self.to_len == 0 && self.from_len > 0
    }

    /// Split this edit at a from-length offset strictly inside it.
    /// Substitution sequences are split at the same point.
    pub fn split_from(&self, cut: usize) -> (Edit, Edit) {
        debug_assert!(cut > 0 && cut < self.from_len);
        if self.is_match() {
            (Edit::match_len(cut), Edit::match_len(self.from_len - cut))
        } else if self.is_deletion() {
            (Edit::deletion(cut), Edit::deletion(self.from_len - cut))
        } else {
            // substitution: from == to == sequence length
            let left = self.sequence[..cut].to_vec();
            let right = self.sequence[cut..].to_vec();
            (Edit::substitution(left), Edit::substitution(right))
        }
    }

    /// The same edit as seen from the opposite strand.
    pub fn reverse_complement(&self) -> Edit {
        Edit {
            from_len: self.from_len,
            to_len: self.to_len,
            sequence: reverse_complement(&self.sequence),
        }
    }
}

/// A path element: an oriented node position, a rank, and a list of edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub position: Position,
    pub rank: u64,
    pub edits: Vec<Edit>,
}

impl Mapping {
    pub fn new(position: Position, rank: u64) -> Self {
        Mapping {
            position,
            rank,
            edits: Vec::new(),
        }
    }

    /// A mapping that perfectly matches `len` bases starting at `position`.
    pub fn perfect(position: Position, len: usize, rank: u64) -> Self {
        Mapping {
            position,
            rank,
            edits: vec![Edit::match_len(len)],
        }
    }

    /// Total node sequence consumed by this mapping
    pub fn from_length(&self) -> usize {
        self.edits.iter().map(|e| e.from_len).sum()
    }

    /// Total path sequence produced by this mapping
    pub fn to_length(&self) -> usize {
        self.edits.iter().map(|e| e.to_len).sum()
    }

    /// True when the mapping is a single match over its whole node range
    pub fn is_perfect_match(&self) -> bool {
        self.edits.iter().all(|e| e.is_match())
    }

    /// Merge runs of adjacent match edits into one.
    pub fn simplify(&mut self) {
        let mut merged: Vec<Edit> = Vec::with_capacity(self.edits.len());
        for edit in self.edits.drain(..) {
            if edit.from_len == 0 && edit.to_len == 0 {
                continue;
            }
            if let Some(last) = merged.last_mut() {
                if last.is_match() && edit.is_match() {
                    last.from_len += edit.from_len;
                    last.to_len += edit.to_len;
                    continue;
                }
            }
            merged.push(edit);
        }
        self.edits = merged;
    }

    /// Split at a from-length offset; the left part keeps the rank, the
    /// right part gets rank 0 (to be renumbered by `compact_ranks`).
    /// Zero-from edits sitting exactly at the cut stay on the left.
    pub fn split_at_from(&self, cut: usize) -> (Mapping, Mapping) {
        debug_assert!(cut > 0 && cut < self.from_length());
        let mut left = Mapping::new(self.position, self.rank);
        let mut right_pos = self.position;
        right_pos.offset += cut;
        let mut right = Mapping::new(right_pos, 0);

        let mut consumed = 0;
        for edit in &self.edits {
            if consumed + edit.from_len <= cut {
                left.edits.push(edit.clone());
                consumed += edit.from_len;
            } else if consumed >= cut {
                right.edits.push(edit.clone());
                consumed += edit.from_len;
            } else {
                let (l, r) = edit.split_from(cut - consumed);
                left.edits.push(l);
                right.edits.push(r);
                consumed += edit.from_len;
            }
        }
        (left, right)
    }

    /// The same walk as read from the opposite strand of a node of length
    /// `node_len`.
    pub fn reverse_complement(&self, node_len: usize) -> Mapping {
        let pos = Position::new(
            self.position.node_id,
            !self.position.is_reverse,
            node_len - self.position.offset - self.from_length(),
        );
        Mapping {
            position: pos,
            rank: self.rank,
            edits: self
                .edits
                .iter()
                .rev()
                .map(|e| e.reverse_complement())
                .collect(),
        }
    }
}

/// An ordered list of mappings, possibly circular. This standalone form is
/// used for edit-engine inputs and translations; embedded paths live in the
/// `PathIndex`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    pub name: String,
    pub is_circular: bool,
    pub mappings: Vec<Mapping>,
}

impl Path {
    pub fn new(name: &str) -> Self {
        Path {
            name: name.to_string(),
            is_circular: false,
            mappings: Vec::new(),
        }
    }

    pub fn from_length(&self) -> usize {
        self.mappings.iter().map(|m| m.from_length()).sum()
    }

    pub fn to_length(&self) -> usize {
        self.mappings.iter().map(|m| m.to_length()).sum()
    }

    /// Merge adjacent match edits inside every mapping.
    pub fn simplify(&mut self) {
        for m in &mut self.mappings {
            m.simplify();
        }
    }

    /// Reverse the walk; node lengths are supplied by the caller.
    pub fn reverse_complement<F>(&self, node_len: F) -> Path
    where
        F: Fn(u64) -> usize,
    {
        let mut rc = Path::new(&self.name);
        rc.is_circular = self.is_circular;
        for (i, m) in self.mappings.iter().rev().enumerate() {
            let mut flipped = m.reverse_complement(node_len(m.position.node_id));
            flipped.rank = (i + 1) as u64;
            rc.mappings.push(flipped);
        }
        rc
    }

    /// First position of the path, if any
    pub fn first_position(&self) -> Option<Position> {
        self.mappings.first().map(|m| m.position)
    }
}

#[derive(Debug, Clone)]
struct MappingRecord {
    mapping: Mapping,
    path: String,
    prev: Option<MappingId>,
    next: Option<MappingId>,
}

#[derive(Debug, Clone, Default)]
struct PathEntry {
    head: Option<MappingId>,
    tail: Option<MappingId>,
    circular: bool,
    count: usize,
}

/// A cursor returned by `remove_mapping`, good for re-inserting a mapping at
/// the same place even after unrelated insertions elsewhere in the path.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub path: String,
    pub prev: Option<MappingId>,
    pub next: Option<MappingId>,
}

/// The embedded-path store: per-path doubly linked mapping order plus an
/// inverse index from node id to the mappings that reference it.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    records: HashMap<MappingId, MappingRecord>,
    paths: BTreeMap<String, PathEntry>,
    node_index: HashMap<u64, BTreeSet<MappingId>>,
    next_id: MappingId,
}

impl PathIndex {
    pub fn new() -> Self {
        PathIndex::default()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.records.len()
    }

    pub fn has_path(&self, name: &str) -> bool {
        self.paths.contains_key(name)
    }

    pub fn path_names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(|s| s.as_str())
    }

    pub fn create_path(&mut self, name: &str, circular: bool) -> Result<(), String> {
        if self.paths.contains_key(name) {
            return Err(format!("path {} already exists", name));
        }
        self.paths.insert(
            name.to_string(),
            PathEntry {
                circular,
                ..PathEntry::default()
            },
        );
        Ok(())
    }

    pub fn is_circular(&self, name: &str) -> bool {
        self.paths.get(name).map(|p| p.circular).unwrap_or(false)
    }

    pub fn set_circular(&mut self, name: &str, circular: bool) {
        if let Some(entry) = self.paths.get_mut(name) {
            entry.circular = circular;
        }
    }

    pub fn path_len(&self, name: &str) -> usize {
        self.paths.get(name).map(|p| p.count).unwrap_or(0)
    }

    fn alloc(&mut self, mapping: Mapping, path: &str) -> MappingId {
        let id = self.next_id;
        self.next_id += 1;
        self.node_index
            .entry(mapping.position.node_id)
            .or_default()
            .insert(id);
        self.records.insert(
            id,
            MappingRecord {
                mapping,
                path: path.to_string(),
                prev: None,
                next: None,
            },
        );
        id
    }

    /// Append a mapping to a path, creating the path if needed.
    pub fn append_mapping(&mut self, name: &str, mapping: Mapping) -> MappingId {
        let id = self.alloc(mapping, name);
        let entry = self.paths.entry(name.to_string()).or_default();
        match entry.tail {
            None => {
                entry.head = Some(id);
                entry.tail = Some(id);
            }
            Some(tail) => {
                if let Some(rec) = self.records.get_mut(&tail) {
                    rec.next = Some(id);
                }
                if let Some(rec) = self.records.get_mut(&id) {
                    rec.prev = Some(tail);
                }
                entry.tail = Some(id);
            }
        }
        entry.count += 1;
        id
    }

    pub fn prepend_mapping(&mut self, name: &str, mapping: Mapping) -> MappingId {
        let id = self.alloc(mapping, name);
        let entry = self.paths.entry(name.to_string()).or_default();
        match entry.head {
            None => {
                entry.head = Some(id);
                entry.tail = Some(id);
            }
            Some(head) => {
                if let Some(rec) = self.records.get_mut(&head) {
                    rec.prev = Some(id);
                }
                if let Some(rec) = self.records.get_mut(&id) {
                    rec.next = Some(head);
                }
                entry.head = Some(id);
            }
        }
        entry.count += 1;
        id
    }

    /// Insert a mapping immediately after the given one.
    pub fn insert_after(&mut self, after: MappingId, mapping: Mapping) -> Result<MappingId, String> {
        let (path, next) = match self.records.get(&after) {
            Some(rec) => (rec.path.clone(), rec.next),
            None => return Err(format!("no mapping with id {}", after)),
        };
        let id = self.alloc(mapping, &path);
        if let Some(rec) = self.records.get_mut(&id) {
            rec.prev = Some(after);
            rec.next = next;
        }
        if let Some(rec) = self.records.get_mut(&after) {
            rec.next = Some(id);
        }
        match next {
            Some(n) => {
                if let Some(rec) = self.records.get_mut(&n) {
                    rec.prev = Some(id);
                }
            }
            None => {
                if let Some(entry) = self.paths.get_mut(&path) {
                    entry.tail = Some(id);
                }
            }
        }
        if let Some(entry) = self.paths.get_mut(&path) {
            entry.count += 1;
        }
        Ok(id)
    }

    /// Insert a mapping immediately before the given one.
    pub fn insert_before(
        &mut self,
        before: MappingId,
        mapping: Mapping,
    ) -> Result<MappingId, String> {
        let (path, prev) = match self.records.get(&before) {
            Some(rec) => (rec.path.clone(), rec.prev),
            None => return Err(format!("no mapping with id {}", before)),
        };
        match prev {
            Some(p) => self.insert_after(p, mapping),
            None => {
                let id = self.prepend_mapping(&path, mapping);
                Ok(id)
            }
        }
    }

    /// Re-insert a mapping at a cursor obtained from `remove_mapping`.
    pub fn insert_at(&mut self, cursor: &Cursor, mapping: Mapping) -> MappingId {
        if let Some(prev) = cursor.prev {
            if self.records.contains_key(&prev) {
                if let Ok(id) = self.insert_after(prev, mapping) {
                    return id;
                }
                unreachable!("insert_after on a live record cannot fail");
            }
        }
        if let Some(next) = cursor.next {
            if self.records.contains_key(&next) {
                if let Ok(id) = self.insert_before(next, mapping.clone()) {
                    return id;
                }
            }
        }
        self.append_mapping(&cursor.path, mapping)
    }

    pub fn get(&self, id: MappingId) -> Option<&Mapping> {
        self.records.get(&id).map(|r| &r.mapping)
    }

    pub fn path_of(&self, id: MappingId) -> Option<&str> {
        self.records.get(&id).map(|r| r.path.as_str())
    }

    pub fn next_in_path(&self, id: MappingId) -> Option<MappingId> {
        self.records.get(&id).and_then(|r| r.next)
    }

    pub fn prev_in_path(&self, id: MappingId) -> Option<MappingId> {
        self.records.get(&id).and_then(|r| r.prev)
    }

    /// Successor in path order, wrapping around on circular paths.
    pub fn next_cyclic(&self, id: MappingId) -> Option<MappingId> {
        let rec = self.records.get(&id)?;
        match rec.next {
            Some(n) => Some(n),
            None => {
                let entry = self.paths.get(&rec.path)?;
                if entry.circular && entry.count > 1 {
                    entry.head
                } else {
                    None
                }
            }
        }
    }

    /// Predecessor in path order, wrapping around on circular paths.
    pub fn prev_cyclic(&self, id: MappingId) -> Option<MappingId> {
        let rec = self.records.get(&id)?;
        match rec.prev {
            Some(p) => Some(p),
            None => {
                let entry = self.paths.get(&rec.path)?;
                if entry.circular && entry.count > 1 {
                    entry.tail
                } else {
                    None
                }
            }
        }
    }

    /// Replace a mapping's content, keeping its place in the path.
    pub fn set_mapping(&mut self, id: MappingId, mapping: Mapping) {
        if let Some(rec) = self.records.get_mut(&id) {
            let old_node = rec.mapping.position.node_id;
            let new_node = mapping.position.node_id;
            rec.mapping = mapping;
            if old_node != new_node {
                if let Some(set) = self.node_index.get_mut(&old_node) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.node_index.remove(&old_node);
                    }
                }
                self.node_index.entry(new_node).or_default().insert(id);
            }
        }
    }

    /// Point a mapping at a different node, keeping orientation and offset.
    pub fn reassign_node(&mut self, id: MappingId, new_node: u64) {
        if let Some(rec) = self.records.get(&id) {
            let mut mapping = rec.mapping.clone();
            mapping.position.node_id = new_node;
            self.set_mapping(id, mapping);
        }
    }

    /// Unhook a mapping from both indexes; the cursor allows re-insertion.
    pub fn remove_mapping(&mut self, id: MappingId) -> Option<(Mapping, Cursor)> {
        let rec = self.records.remove(&id)?;
        if let Some(set) = self.node_index.get_mut(&rec.mapping.position.node_id) {
            set.remove(&id);
            if set.is_empty() {
                self.node_index.remove(&rec.mapping.position.node_id);
            }
        }
        match rec.prev {
            Some(p) => {
                if let Some(prev_rec) = self.records.get_mut(&p) {
                    prev_rec.next = rec.next;
                }
            }
            None => {
                if let Some(entry) = self.paths.get_mut(&rec.path) {
                    entry.head = rec.next;
                }
            }
        }
        match rec.next {
            Some(n) => {
                if let Some(next_rec) = self.records.get_mut(&n) {
                    next_rec.prev = rec.prev;
                }
            }
            None => {
                if let Some(entry) = self.paths.get_mut(&rec.path) {
                    entry.tail = rec.prev;
                }
            }
        }
        if let Some(entry) = self.paths.get_mut(&rec.path) {
            entry.count -= 1;
        }
        Some((
            rec.mapping,
            Cursor {
                path: rec.path,
                prev: rec.prev,
                next: rec.next,
            },
        ))
    }

    /// Divide a mapping at a from-length offset, producing two mappings in
    /// place of one. The left keeps the rank; the right gets rank 0.
    pub fn divide_mapping(
        &mut self,
        id: MappingId,
        from_cut: usize,
    ) -> Result<(MappingId, MappingId), String> {
        let mapping = self
            .get(id)
            .cloned()
            .ok_or_else(|| format!("no mapping with id {}", id))?;
        let from_len = mapping.from_length();
        if from_cut == 0 || from_cut >= from_len {
            return Err(format!(
                "divide offset {} outside mapping of from-length {}",
                from_cut, from_len
            ));
        }
        let (left, right) = mapping.split_at_from(from_cut);
        self.set_mapping(id, left);
        let right_id = self.insert_after(id, right)?;
        Ok((id, right_id))
    }

    /// Bulk node-id rewrite, used by `compact_ids` and merge rebasing.
    pub fn swap_node_ids(&mut self, map: &HashMap<u64, u64>) {
        let mut new_index: HashMap<u64, BTreeSet<MappingId>> = HashMap::new();
        for (&id, rec) in self.records.iter_mut() {
            let node = rec.mapping.position.node_id;
            let node = map.get(&node).copied().unwrap_or(node);
            rec.mapping.position.node_id = node;
            new_index.entry(node).or_default().insert(id);
        }
        self.node_index = new_index;
    }

    /// Renumber ranks 1..n in path order, for every path.
    pub fn compact_ranks(&mut self) {
        let names: Vec<String> = self.paths.keys().cloned().collect();
        for name in names {
            self.compact_path_ranks(&name);
        }
    }

    pub fn compact_path_ranks(&mut self, name: &str) {
        let ids = self.mapping_ids_of_path(name);
        for (i, id) in ids.into_iter().enumerate() {
            if let Some(rec) = self.records.get_mut(&id) {
                rec.mapping.rank = (i + 1) as u64;
            }
        }
    }

    /// Mapping ids of a path, in path order.
    pub fn mapping_ids_of_path(&self, name: &str) -> Vec<MappingId> {
        let mut out = Vec::new();
        let Some(entry) = self.paths.get(name) else {
            return out;
        };
        let mut cur = entry.head;
        while let Some(id) = cur {
            out.push(id);
            cur = self.records.get(&id).and_then(|r| r.next);
        }
        out
    }

    pub fn for_each<F>(&self, name: &str, mut f: F)
    where
        F: FnMut(MappingId, &Mapping),
    {
        for id in self.mapping_ids_of_path(name) {
            if let Some(rec) = self.records.get(&id) {
                f(id, &rec.mapping);
            }
        }
    }

    /// All mappings referencing a node, in id order.
    pub fn of_node(&self, node: u64) -> Vec<MappingId> {
        self.node_index
            .get(&node)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Which (path, orientation) pairs visit a node.
    pub fn node_path_traversals(&self, node: u64) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        for id in self.of_node(node) {
            if let Some(rec) = self.records.get(&id) {
                out.push((rec.path.clone(), rec.mapping.position.is_reverse));
            }
        }
        out
    }

    /// Drop every mapping that references a node.
    pub fn remove_node_mappings(&mut self, node: u64) {
        for id in self.of_node(node) {
            self.remove_mapping(id);
        }
    }

    /// Delete a path by name, returning its materialized form.
    pub fn remove_path(&mut self, name: &str) -> Option<Path> {
        let path = self.path(name)?;
        for id in self.mapping_ids_of_path(name) {
            self.remove_mapping(id);
        }
        self.paths.remove(name);
        Some(path)
    }

    /// Materialize a path.
    pub fn path(&self, name: &str) -> Option<Path> {
        let entry = self.paths.get(name)?;
        let mut path = Path::new(name);
        path.is_circular = entry.circular;
        for id in self.mapping_ids_of_path(name) {
            if let Some(rec) = self.records.get(&id) {
                path.mappings.push(rec.mapping.clone());
            }
        }
        Some(path)
    }

    /// Materialize every path, in name order.
    pub fn to_paths(&self) -> Vec<Path> {
        self.paths
            .keys()
            .filter_map(|name| self.path(name))
            .collect()
    }

    /// Embed a standalone path, appending its mappings in order.
    pub fn extend_with(&mut self, path: &Path) {
        if !self.has_path(&path.name) {
            let _ = self.create_path(&path.name, path.is_circular);
        }
        for m in &path.mappings {
            self.append_mapping(&path.name, m.clone());
        }
    }

    /// Internal audit: the two indexes must agree.
    pub fn index_consistent(&self) -> bool {
        for (node, set) in &self.node_index {
            for id in set {
                match self.records.get(id) {
                    Some(rec) if rec.mapping.position.node_id == *node => {}
                    _ => return false,
                }
            }
        }
        for (id, rec) in &self.records {
            let ok = self
                .node_index
                .get(&rec.mapping.position.node_id)
                .map(|set| set.contains(id))
                .unwrap_or(false);
            if !ok {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect(node: u64, len: usize, rank: u64) -> Mapping {
        Mapping::perfect(Position::forward(node, 0), len, rank)
    }

    #[test]
    fn test_append_and_order() {
        let mut index = PathIndex::new();
        index.append_mapping("x", perfect(1, 3, 1));
        index.append_mapping("x", perfect(2, 2, 2));
        index.prepend_mapping("x", perfect(3, 1, 0));
        let ids = index.mapping_ids_of_path("x");
        assert_eq!(ids.len(), 3);
        let nodes: Vec<u64> = ids
            .iter()
            .map(|&id| index.get(id).unwrap().position.node_id)
            .collect();
        assert_eq!(nodes, vec![3, 1, 2]);
    }

    #[test]
    fn test_remove_and_reinsert_at_cursor() {
        let mut index = PathIndex::new();
        let a = index.append_mapping("x", perfect(1, 3, 1));
        let b = index.append_mapping("x", perfect(2, 2, 2));
        index.append_mapping("x", perfect(3, 1, 3));
        let (mapping, cursor) = index.remove_mapping(b).unwrap();
        assert_eq!(index.path_len("x"), 2);
        // Unrelated insertion before the cursor position
        let _ = index.insert_after(a, perfect(9, 1, 0)).unwrap();
        let b2 = index.insert_at(&cursor, mapping);
        let nodes: Vec<u64> = index
            .mapping_ids_of_path("x")
            .iter()
            .map(|&id| index.get(id).unwrap().position.node_id)
            .collect();
        assert_eq!(nodes, vec![1, 9, 2, 3]);
        assert!(index.get(b2).is_some());
        assert!(index.index_consistent());
    }

    #[test]
    fn test_divide_mapping_edit_level() {
        let mut index = PathIndex::new();
        let mut m = Mapping::new(Position::forward(1, 0), 1);
        m.edits.push(Edit::match_len(3));
        m.edits.push(Edit::substitution(b"TT".to_vec()));
        let id = index.append_mapping("x", m);
        let (l, r) = index.divide_mapping(id, 4).unwrap();
        let left = index.get(l).unwrap().clone();
        let right = index.get(r).unwrap().clone();
        assert_eq!(left.from_length(), 4);
        assert_eq!(right.from_length(), 1);
        assert_eq!(left.edits[1], Edit::substitution(b"T".to_vec()));
        assert_eq!(right.position.offset, 4);
        assert_eq!(left.rank, 1);
        assert_eq!(right.rank, 0);
    }

    #[test]
    fn test_divide_mapping_out_of_range() {
        let mut index = PathIndex::new();
        let id = index.append_mapping("x", perfect(1, 3, 1));
        assert!(index.divide_mapping(id, 0).is_err());
        assert!(index.divide_mapping(id, 3).is_err());
    }

    #[test]
    fn test_compact_ranks() {
        let mut index = PathIndex::new();
        index.append_mapping("x", perfect(1, 3, 7));
        index.append_mapping("x", perfect(2, 2, 0));
        index.append_mapping("x", perfect(3, 1, 99));
        index.compact_ranks();
        let ranks: Vec<u64> = index
            .mapping_ids_of_path("x")
            .iter()
            .map(|&id| index.get(id).unwrap().rank)
            .collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_node_inverse_index() {
        let mut index = PathIndex::new();
        index.append_mapping("x", perfect(1, 3, 1));
        index.append_mapping("y", perfect(1, 3, 1));
        index.append_mapping("y", perfect(2, 2, 2));
        assert_eq!(index.of_node(1).len(), 2);
        let mut traversals = index.node_path_traversals(1);
        traversals.sort();
        assert_eq!(
            traversals,
            vec![("x".to_string(), false), ("y".to_string(), false)]
        );
        index.remove_node_mappings(1);
        assert!(index.of_node(1).is_empty());
        assert_eq!(index.path_len("y"), 1);
        assert!(index.index_consistent());
    }

    #[test]
    fn test_mapping_reverse_complement() {
        let mut m = Mapping::new(Position::forward(1, 1), 1);
        m.edits.push(Edit::match_len(2));
        m.edits.push(Edit::substitution(b"AC".to_vec()));
        // node length 6: covers forward range [1, 5)
        let rc = m.reverse_complement(6);
        assert_eq!(rc.position, Position::new(1, true, 1));
        assert_eq!(rc.edits[0], Edit::substitution(b"GT".to_vec()));
        assert_eq!(rc.edits[1], Edit::match_len(2));
        let back = rc.reverse_complement(6);
        assert_eq!(back, m);
    }
}
