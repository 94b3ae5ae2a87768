use crate::graph::VariationGraph;
use crate::handle::Handle;
use crate::pos::Position;
use lru::LruCache;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Cache capacity per worker for k-mer deduplication.
const KMER_CACHE_SIZE: usize = 100_000;

/// A walk of spelled length >= k centred on a designated traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kpath {
    pub handles: Vec<Handle>,
    /// index of the centre traversal within `handles`
    pub center: usize,
}

/// One emitted k-mer with its graph context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerPosition {
    pub kmer: String,
    /// first base of the k-mer, canonicalized to the forward strand
    pub start: Position,
    /// last base of the k-mer, as traversed
    pub end: Position,
    /// last characters of every traversal one base left of the k-mer;
    /// empty means the k-mer starts at a graph head
    pub prev_chars: BTreeSet<u8>,
    /// first characters one base right of the k-mer; empty at a tail
    pub next_chars: BTreeSet<u8>,
    /// positions reached by advancing one base past the k-mer's end
    pub next_positions: Vec<Position>,
}

type KmerCacheKey = (String, Position, u64, usize, Position);

impl VariationGraph {
    /// Is the edge from `from` to `to` co-traversed by at least one
    /// embedded path?
    pub fn path_supports(&self, from: Handle, to: Handle) -> bool {
        for mid in self.paths.of_node(from.node_id()) {
            let Some(m) = self.paths.get(mid) else {
                continue;
            };
            let trav = m.position.handle();
            if trav == from {
                if let Some(next) = self.paths.next_cyclic(mid) {
                    if self.paths.get(next).map(|nm| nm.position.handle()) == Some(to) {
                        return true;
                    }
                }
            } else if trav == from.flip() {
                if let Some(prev) = self.paths.prev_cyclic(mid) {
                    if self.paths.get(prev).map(|pm| pm.position.handle()) == Some(to.flip()) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn prev_walks(
        &self,
        h: Handle,
        needed: usize,
        edge_max: Option<usize>,
        path_only: bool,
    ) -> Vec<Vec<Handle>> {
        if needed == 0 {
            return vec![Vec::new()];
        }
        let mut preds: Vec<Handle> = self
            .edges_to(h)
            .into_iter()
            .filter(|p| !path_only || self.path_supports(*p, h))
            .collect();
        preds.sort();
        if preds.is_empty() {
            // graph head: the short walk still counts
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for p in preds {
            // a junction on the predecessor's outgoing side costs one edge
            let junction = self.degree(p.right_side()) > 1;
            let budget = match edge_max {
                Some(0) if junction => continue,
                Some(b) if junction => Some(b - 1),
                other => other,
            };
            let plen = self.node_len(p.node_id());
            if plen >= needed {
                out.push(vec![p]);
            } else {
                for mut walk in self.prev_walks(p, needed - plen, budget, path_only) {
                    walk.push(p);
                    out.push(walk);
                }
            }
        }
        if out.is_empty() {
            // every extension was blocked by the edge budget
            out.push(Vec::new());
        }
        out
    }

    fn next_walks(
        &self,
        h: Handle,
        needed: usize,
        edge_max: Option<usize>,
        path_only: bool,
    ) -> Vec<Vec<Handle>> {
        if needed == 0 {
            return vec![Vec::new()];
        }
        let mut succs: Vec<Handle> = self
            .edges_from(h)
            .into_iter()
            .filter(|n| !path_only || self.path_supports(h, *n))
            .collect();
        succs.sort();
        if succs.is_empty() {
            return vec![Vec::new()];
        }
        let junction = self.degree(h.right_side()) > 1;
        let mut out = Vec::new();
        for n in succs {
            let budget = match edge_max {
                Some(0) if junction => continue,
                Some(b) if junction => Some(b - 1),
                other => other,
            };
            let nlen = self.node_len(n.node_id());
            if nlen >= needed {
                out.push(vec![n]);
            } else {
                for walk in self.next_walks(n, needed - nlen, budget, path_only) {
                    let mut full = vec![n];
                    full.extend(walk);
                    out.push(full);
                }
            }
        }
        if out.is_empty() {
            out.push(Vec::new());
        }
        out
    }

    /// All walks of spelled length >= k through a traversal: the Cartesian
    /// product of leftward and rightward extensions joined at the centre.
    pub fn kpaths_of_handle(
        &self,
        h: Handle,
        k: usize,
        edge_max: Option<usize>,
        path_only: bool,
    ) -> Vec<Kpath> {
        let needed = k.saturating_sub(1);
        let prevs = self.prev_walks(h, needed, edge_max, path_only);
        let nexts = self.next_walks(h, needed, edge_max, path_only);
        let mut out = Vec::with_capacity(prevs.len() * nexts.len());
        for prev in &prevs {
            for next in &nexts {
                let mut handles = prev.clone();
                let center = handles.len();
                handles.push(h);
                handles.extend(next.iter().copied());
                out.push(Kpath { handles, center });
            }
        }
        out
    }

    /// Walks through both orientations of a node.
    pub fn kpaths_of_node(
        &self,
        id: u64,
        k: usize,
        edge_max: Option<usize>,
        path_only: bool,
    ) -> Vec<Kpath> {
        let mut out = self.kpaths_of_handle(Handle::forward(id), k, edge_max, path_only);
        out.extend(self.kpaths_of_handle(Handle::reverse(id), k, edge_max, path_only));
        out
    }

    /// Visit every k-path of every node. The break predicate is checked at
    /// each node begin; returning true stops the traversal.
    pub fn for_each_kpath<F, B>(
        &self,
        k: usize,
        edge_max: Option<usize>,
        path_only: bool,
        mut stop: B,
        mut f: F,
    ) where
        F: FnMut(&Kpath),
        B: FnMut(u64) -> bool,
    {
        for id in self.node_ids() {
            if stop(id) {
                return;
            }
            for kpath in self.kpaths_of_node(id, k, edge_max, path_only) {
                f(&kpath);
            }
        }
    }

    /// Parallel k-path traversal; the closure must not mutate the graph.
    /// A shared progress counter is maintained under a critical section.
    pub fn for_each_kpath_parallel<F>(&self, k: usize, edge_max: Option<usize>, path_only: bool, f: F)
    where
        F: Fn(&Kpath) + Send + Sync,
    {
        let progress = Mutex::new(0u64);
        let total = self.node_count() as u64;
        let ids = self.node_ids();
        ids.par_iter().for_each(|&id| {
            for kpath in self.kpaths_of_node(id, k, edge_max, path_only) {
                f(&kpath);
            }
            let mut done = progress.lock().expect("progress counter poisoned");
            *done += 1;
            self.report_progress("kpaths", *done, total);
        });
    }

    /// Spell a walk and record where each traversal's sequence begins.
    fn spell_walk(&self, handles: &[Handle]) -> (Vec<u8>, Vec<usize>) {
        let mut seq = Vec::new();
        let mut starts = Vec::with_capacity(handles.len());
        for h in handles {
            starts.push(seq.len());
            if let Some(s) = self.sequence(*h) {
                seq.extend(s);
            }
        }
        (seq, starts)
    }

    /// Emit the k-mers of one traversal's k-paths, deduplicated through
    /// the supplied cache.
    #[allow(clippy::too_many_arguments)]
    fn kmers_of_handle(
        &self,
        h: Handle,
        k: usize,
        edge_max: Option<usize>,
        path_only: bool,
        forward_only: bool,
        allow_dups: bool,
        cache: &mut LruCache<KmerCacheKey, ()>,
        out: &mut Vec<KmerPosition>,
    ) {
        let node_id = h.node_id();
        let center_len = self.node_len(node_id);
        for kpath in self.kpaths_of_handle(h, k, edge_max, path_only) {
            let (seq, starts) = self.spell_walk(&kpath.handles);
            let c0 = starts[kpath.center];
            let c1 = c0 + center_len;
            for i in c0..c1 {
                if i + k > seq.len() {
                    break;
                }
                let kmer = String::from_utf8_lossy(&seq[i..i + k]).to_string();

                let start_off = i - c0;
                let start = Position::new(node_id, h.is_reverse(), start_off).forwarded(center_len);

                // locate the traversal holding the k-mer's last base
                let last = i + k - 1;
                let end_idx = match starts.binary_search(&last) {
                    Ok(j) => j,
                    Err(j) => j - 1,
                };
                let end_handle = kpath.handles[end_idx];
                let end_off = last - starts[end_idx];
                let end_len = self.node_len(end_handle.node_id());
                let end = Position::new(end_handle.node_id(), end_handle.is_reverse(), end_off);

                if forward_only {
                    // edge-crossing kmers come from the lower-id endpoint;
                    // within one node only the forward strand emits
                    let crossing = end_handle.node_id() != node_id;
                    if crossing {
                        if node_id > end_handle.node_id() {
                            continue;
                        }
                    } else if h.is_reverse() {
                        continue;
                    }
                }

                let key: KmerCacheKey = if allow_dups {
                    (kmer.clone(), start, node_id, start_off, end)
                } else {
                    (
                        kmer.clone(),
                        start,
                        0,
                        0,
                        Position::forward(0, 0),
                    )
                };
                if cache.put(key, ()).is_some() {
                    continue;
                }

                // previous characters: inside the node it is one base; at
                // the node boundary, every incoming traversal contributes
                let mut prev_chars = BTreeSet::new();
                if start_off > 0 {
                    if let Some(s) = self.sequence(h) {
                        prev_chars.insert(s[start_off - 1]);
                    }
                } else {
                    for p in self.edges_to(h) {
                        if let Some(s) = self.sequence(p) {
                            if let Some(&c) = s.last() {
                                prev_chars.insert(c);
                            }
                        }
                    }
                }

                let mut next_chars = BTreeSet::new();
                let mut next_positions = Vec::new();
                if end_off + 1 < end_len {
                    if let Some(s) = self.sequence(end_handle) {
                        next_chars.insert(s[end_off + 1]);
                    }
                    next_positions.push(Position::new(
                        end_handle.node_id(),
                        end_handle.is_reverse(),
                        end_off + 1,
                    ));
                } else {
                    let mut succs = self.edges_from(end_handle);
                    succs.sort();
                    for n in succs {
                        if let Some(s) = self.sequence(n) {
                            if let Some(&c) = s.first() {
                                next_chars.insert(c);
                            }
                        }
                        next_positions.push(Position::new(n.node_id(), n.is_reverse(), 0));
                    }
                }
                next_positions.sort();
                next_positions.dedup();

                out.push(KmerPosition {
                    kmer,
                    start,
                    end,
                    prev_chars,
                    next_chars,
                    next_positions,
                });
            }
        }
    }

    /// Enumerate context-annotated k-mers over the whole graph.
    pub fn for_each_kmer<F>(
        &self,
        k: usize,
        edge_max: Option<usize>,
        path_only: bool,
        forward_only: bool,
        allow_dups: bool,
        mut f: F,
    ) where
        F: FnMut(&KmerPosition),
    {
        let mut cache = LruCache::new(
            NonZeroUsize::new(KMER_CACHE_SIZE).expect("cache capacity is non-zero"),
        );
        let mut buffer = Vec::new();
        for id in self.node_ids() {
            for h in [Handle::forward(id), Handle::reverse(id)] {
                self.kmers_of_handle(
                    h,
                    k,
                    edge_max,
                    path_only,
                    forward_only,
                    allow_dups,
                    &mut cache,
                    &mut buffer,
                );
            }
            for kmer in buffer.drain(..) {
                f(&kmer);
            }
        }
    }

    /// Parallel k-mer enumeration with a per-worker LRU cache; emission
    /// happens per node under a single critical section.
    pub fn for_each_kmer_parallel<F>(
        &self,
        k: usize,
        edge_max: Option<usize>,
        path_only: bool,
        forward_only: bool,
        allow_dups: bool,
        f: F,
    ) where
        F: Fn(&KmerPosition) + Send + Sync,
    {
        let sink = Mutex::new(f);
        let progress = Mutex::new(0u64);
        let total = self.node_count() as u64;
        let ids = self.node_ids();
        ids.par_iter().for_each_init(
            || {
                LruCache::new(
                    NonZeroUsize::new(KMER_CACHE_SIZE).expect("cache capacity is non-zero"),
                )
            },
            |cache, &id| {
                let mut buffer = Vec::new();
                for h in [Handle::forward(id), Handle::reverse(id)] {
                    self.kmers_of_handle(
                        h,
                        k,
                        edge_max,
                        path_only,
                        forward_only,
                        allow_dups,
                        cache,
                        &mut buffer,
                    );
                }
                let emit = sink.lock().expect("kmer sink poisoned");
                for kmer in &buffer {
                    (*emit)(kmer);
                }
                drop(emit);
                let mut done = progress.lock().expect("progress counter poisoned");
                *done += 1;
                self.report_progress("kmers", *done, total);
            },
        );
    }

    /// Write k-mer records for the external succinct-index builder. The
    /// graph is temporarily wrapped with head (`#`) and tail (`$`) markers
    /// of length k so every real k-mer has well-defined context; the
    /// markers are removed afterwards.
    pub fn write_gcsa_kmers<W: Write>(
        &mut self,
        k: usize,
        edge_max: Option<usize>,
        out: &mut W,
    ) -> std::io::Result<()> {
        let heads = self.head_nodes();
        let tails = self.tail_nodes();
        let head_marker = self.create_node(vec![b'#'; k]);
        let tail_marker = self.create_node(vec![b'$'; k]);
        for h in heads {
            self.create_edge_between(Handle::forward(head_marker), Handle::forward(h));
        }
        for t in tails {
            self.create_edge_between(Handle::forward(t), Handle::forward(tail_marker));
        }

        let mut records = Vec::new();
        self.for_each_kmer(k, edge_max, false, true, false, |kmer| {
            if kmer.start.node_id != head_marker && kmer.start.node_id != tail_marker {
                records.push(kmer.clone());
            }
        });
        let result = (|| {
            for r in &records {
                writeln!(out, "{}", format_gcsa_record(r))?;
            }
            Ok(())
        })();

        self.destroy_node(head_marker);
        self.destroy_node(tail_marker);
        result
    }
}

/// The per-kmer output record: kmer, start position, comma-joined previous
/// characters (`$` when empty), comma-joined next characters (`#` when
/// empty), and the next positions.
pub fn format_gcsa_record(kmer: &KmerPosition) -> String {
    let prev = if kmer.prev_chars.is_empty() {
        "$".to_string()
    } else {
        kmer.prev_chars
            .iter()
            .map(|&c| (c as char).to_string())
            .collect::<Vec<_>>()
            .join(",")
    };
    let next = if kmer.next_chars.is_empty() {
        "#".to_string()
    } else {
        kmer.next_chars
            .iter()
            .map(|&c| (c as char).to_string())
            .collect::<Vec<_>>()
            .join(",")
    };
    let next_positions = kmer
        .next_positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{}\t{}\t{}\t{}\t{}",
        kmer.kmer, kmer.start, prev, next, next_positions
    )
}
