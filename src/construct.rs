use crate::graph::VariationGraph;
use crate::handle::{is_dna, Handle};
use crate::path::Mapping;
use crate::pos::Position;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// One decomposed variant site: a reference span and its alternative
/// alleles, with optional per-sample phased genotypes (allele index per
/// haplotype, 0 = reference).
#[derive(Debug, Clone)]
pub struct VariantBubble {
    /// 0-based offset on the reference interval
    pub offset: usize,
    pub ref_allele: Vec<u8>,
    pub alt_alleles: Vec<Vec<u8>>,
    pub genotypes: Vec<Vec<usize>>,
}

#[derive(Debug, Clone)]
pub struct ConstructOptions {
    /// embed one `_alt_*` path per alternative allele
    pub alt_paths: bool,
    /// embed `_phase_<sample>_<haplotype>` paths from the genotypes
    pub phase_paths: bool,
    /// target reference bases per parallel construction chunk
    pub chunk_size: usize,
    pub verbose: bool,
}

impl Default for ConstructOptions {
    fn default() -> Self {
        ConstructOptions {
            alt_paths: false,
            phase_paths: false,
            chunk_size: 10_000,
            verbose: false,
        }
    }
}

fn phase_path_name(sample: usize, haplotype: usize) -> String {
    format!("_phase_{}_{}", sample, haplotype)
}

fn alt_path_name(position: usize, allele: usize) -> String {
    format!("_alt_{}_{}", position, allele)
}

fn append_step(
    g: &mut VariationGraph,
    ranks: &mut HashMap<String, u64>,
    path: &str,
    h: Handle,
    len: usize,
) {
    let rank = ranks.entry(path.to_string()).or_insert(0);
    *rank += 1;
    g.paths.append_mapping(
        path,
        Mapping::perfect(Position::new(h.node_id(), h.is_reverse(), 0), len, *rank),
    );
}

/// Build a graph from one reference interval plus its variant bubbles.
/// `region_offset` is where the interval sits on the full contig; it only
/// affects alt-path naming. Bubbles must be sorted by offset; overlapping
/// or malformed records are skipped with a diagnostic.
pub fn construct_region(
    ref_name: &str,
    reference: &[u8],
    region_offset: usize,
    bubbles: &[VariantBubble],
    opts: &ConstructOptions,
) -> Result<VariationGraph, String> {
    let mut g = VariationGraph::new();
    let mut cursor = 0usize;
    let mut prev_tails: Vec<Handle> = Vec::new();

    // phase paths exist for every (sample, haplotype) seen in any genotype
    let mut phase_keys: Vec<(usize, usize)> = Vec::new();
    if opts.phase_paths {
        for b in bubbles {
            for (sample, haps) in b.genotypes.iter().enumerate() {
                for hap in 0..haps.len() {
                    if !phase_keys.contains(&(sample, hap)) {
                        phase_keys.push((sample, hap));
                    }
                }
            }
        }
        phase_keys.sort_unstable();
    }

    let mut ranks: HashMap<String, u64> = HashMap::new();

    // emit a shared reference segment [cursor, until)
    fn emit_segment(
        g: &mut VariationGraph,
        ranks: &mut HashMap<String, u64>,
        phase_keys: &[(usize, usize)],
        ref_name: &str,
        reference: &[u8],
        prev_tails: &mut Vec<Handle>,
        cursor: usize,
        until: usize,
    ) {
        if until <= cursor {
            return;
        }
        let id = g.create_node(reference[cursor..until].to_vec());
        let h = Handle::forward(id);
        for tail in prev_tails.iter() {
            g.create_edge_between(*tail, h);
        }
        append_step(g, ranks, ref_name, h, until - cursor);
        for (s, p) in phase_keys.iter() {
            append_step(g, ranks, &phase_path_name(*s, *p), h, until - cursor);
        }
        prev_tails.clear();
        prev_tails.push(h);
    }

    for bubble in bubbles {
        if bubble.offset < cursor {
            eprintln!(
                "[construct] skipping overlapping variant at {}",
                region_offset + bubble.offset
            );
            continue;
        }
        let ref_end = bubble.offset + bubble.ref_allele.len();
        if ref_end > reference.len() {
            eprintln!(
                "[construct] skipping variant at {} running past the reference",
                region_offset + bubble.offset
            );
            continue;
        }
        if reference[bubble.offset..ref_end] != bubble.ref_allele[..] {
            eprintln!(
                "[construct] skipping variant at {}: ref allele disagrees with reference",
                region_offset + bubble.offset
            );
            continue;
        }
        if bubble.alt_alleles.iter().any(|a| !is_dna(a)) {
            eprintln!(
                "[construct] skipping variant at {}: non-DNA allele",
                region_offset + bubble.offset
            );
            continue;
        }

        emit_segment(
            &mut g,
            &mut ranks,
            &phase_keys,
            ref_name,
            reference,
            &mut prev_tails,
            cursor,
            bubble.offset,
        );
        let junction = prev_tails.clone();

        // allele 0 is the reference allele; None marks an empty allele,
        // expressed as a direct edge across the bubble
        let mut allele_handles: Vec<Option<Handle>> = Vec::new();
        for (i, allele) in std::iter::once(&bubble.ref_allele)
            .chain(bubble.alt_alleles.iter())
            .enumerate()
        {
            if allele.is_empty() {
                allele_handles.push(None);
                continue;
            }
            let id = g.create_node(allele.clone());
            let h = Handle::forward(id);
            for tail in &junction {
                g.create_edge_between(*tail, h);
            }
            if opts.alt_paths && i > 0 {
                append_step(
                    &mut g,
                    &mut ranks,
                    &alt_path_name(region_offset + bubble.offset, i),
                    h,
                    allele.len(),
                );
            }
            allele_handles.push(Some(h));
        }

        // the primary path walks the reference allele
        if let Some(Some(ref_handle)) = allele_handles.first() {
            append_step(&mut g, &mut ranks, ref_name, *ref_handle, bubble.ref_allele.len());
        }
        for (s, p) in phase_keys.iter() {
            let allele = bubble
                .genotypes
                .get(*s)
                .and_then(|haps| haps.get(*p))
                .copied()
                .unwrap_or(0);
            if let Some(Some(h)) = allele_handles.get(allele) {
                let len = g.node_len(h.node_id());
                append_step(&mut g, &mut ranks, &phase_path_name(*s, *p), *h, len);
            }
        }

        let had_empty_allele = allele_handles.iter().any(|h| h.is_none());
        let mut next_tails: Vec<Handle> = allele_handles.into_iter().flatten().collect();
        if had_empty_allele {
            // the old junction reaches past the bubble directly
            next_tails.extend(junction);
        }
        prev_tails = next_tails;
        cursor = ref_end;
    }

    emit_segment(
        &mut g,
        &mut ranks,
        &phase_keys,
        ref_name,
        reference,
        &mut prev_tails,
        cursor,
        reference.len(),
    );
    g.paths.compact_ranks();
    Ok(g)
}

/// Glue two adjacent sub-graphs: the right one is rebased past the left
/// id space, its paths are appended fragment-wise, and the left tails are
/// wired into the right heads.
fn merge_adjacent(mut left: VariationGraph, mut right: VariationGraph) -> VariationGraph {
    let base = left.max_node_id();
    let map: HashMap<u64, u64> = right.node_ids().iter().map(|&id| (id, id + base)).collect();
    right.apply_id_mapping(&map);

    let left_tails = left.tail_nodes();
    let right_heads = right.head_nodes();

    for node in right.nodes.values() {
        if left.has_node(node.id) {
            eprintln!("[construct] duplicate node {} on merge, skipping", node.id);
            continue;
        }
        let _ = left.add_node(node.clone());
    }
    for (a, b) in right.edge_pairs() {
        if left.has_edge(a, b) {
            eprintln!("[construct] duplicate edge {}--{} on merge, skipping", a, b);
            continue;
        }
        left.create_edge(a, b);
    }
    for path in right.paths.to_paths() {
        left.paths.extend_with(&path);
    }
    for &tail in &left_tails {
        for &head in &right_heads {
            left.create_edge_between(Handle::forward(tail), Handle::forward(head));
        }
    }
    left
}

/// Build a graph from a reference plus variant bubbles, constructing
/// variant-free chunks in parallel. Completed adjacent sub-graphs are
/// merged pairwise by whichever worker finds them; a sleep-poll drains the
/// tail.
pub fn construct(
    ref_name: &str,
    reference: &[u8],
    bubbles: &[VariantBubble],
    opts: &ConstructOptions,
) -> Result<VariationGraph, String> {
    if !is_dna(reference) {
        return Err("reference contains non-DNA characters".to_string());
    }

    // chunk boundaries sit in variant-free reference, one base before the
    // variant that crosses the size target, so every chunk after the first
    // opens with reference sequence and merge wiring stays head-to-tail
    let mut chunks: Vec<(usize, usize, Vec<VariantBubble>)> = Vec::new();
    let mut start = 0usize;
    let mut pending: Vec<VariantBubble> = Vec::new();
    let mut covered = 0usize;
    for bubble in bubbles {
        // the boundary needs reference on both sides: the left chunk keeps
        // a trailing segment and the right chunk opens with one
        if bubble.offset.saturating_sub(start) >= opts.chunk_size.max(1)
            && bubble.offset > covered + 1
            && !pending.is_empty()
        {
            let end = bubble.offset - 1;
            if end > start {
                chunks.push((start, end, std::mem::take(&mut pending)));
                start = end;
            }
        }
        covered = covered.max(bubble.offset + bubble.ref_allele.len());
        let mut rebased = bubble.clone();
        rebased.offset -= start;
        pending.push(rebased);
    }
    chunks.push((start, reference.len(), pending));

    if chunks.len() == 1 {
        let (s, e, bubbles) = &chunks[0];
        return construct_region(ref_name, &reference[*s..*e], *s, bubbles, opts);
    }
    if opts.verbose {
        eprintln!("[construct] building {} chunks in parallel", chunks.len());
    }

    // cooperative reducer: slot i holds chunk i's graph once built; any
    // worker that finds two adjacent completed slots merges them
    let slots: Mutex<Vec<Option<(usize, usize, VariationGraph)>>> =
        Mutex::new((0..chunks.len()).map(|_| None).collect());
    let errors: Mutex<Vec<String>> = Mutex::new(Vec::new());

    chunks
        .par_iter()
        .enumerate()
        .for_each(|(i, (s, e, chunk_bubbles))| {
            match construct_region(ref_name, &reference[*s..*e], *s, chunk_bubbles, opts) {
                Ok(graph) => {
                    let mut guard = slots.lock().expect("construction queue poisoned");
                    guard[i] = Some((i, i, graph));
                    drop(guard);
                    // opportunistic pairwise merge of adjacent completed slots
                    loop {
                        let mut guard = slots.lock().expect("construction queue poisoned");
                        let mut pair = None;
                        for j in 0..guard.len().saturating_sub(1) {
                            let adjacent = match (&guard[j], &guard[j + 1]) {
                                (Some(a), Some(b)) => a.1 + 1 == b.0,
                                _ => false,
                            };
                            if adjacent {
                                pair = Some(j);
                                break;
                            }
                        }
                        let Some(j) = pair else {
                            break;
                        };
                        let (lo, _, left) = guard[j].take().expect("slot checked above");
                        let (_, hi, right) = guard[j + 1].take().expect("slot checked above");
                        drop(guard);
                        let merged = merge_adjacent(left, right);
                        let mut guard = slots.lock().expect("construction queue poisoned");
                        guard[j] = Some((lo, hi, merged));
                    }
                }
                Err(e) => {
                    errors
                        .lock()
                        .expect("construction queue poisoned")
                        .push(e);
                }
            }
        });

    let errors = errors.into_inner().expect("construction queue poisoned");
    if let Some(e) = errors.into_iter().next() {
        return Err(e);
    }

    // the tail of the merge: poll until a single graph spans every chunk
    let total = chunks.len();
    loop {
        let mut guard = slots.lock().expect("construction queue poisoned");
        let remaining: Vec<usize> = (0..guard.len()).filter(|&j| guard[j].is_some()).collect();
        if remaining.len() == 1 {
            let (lo, hi, graph) = guard[remaining[0]].take().expect("slot checked above");
            if lo == 0 && hi + 1 == total {
                let mut graph = graph;
                drop(guard);
                // chunk seams split reference segments the single-pass
                // build keeps whole; fuse them back
                graph.unchop(opts.verbose);
                graph.compact_ids();
                graph.paths.compact_ranks();
                return Ok(graph);
            }
            return Err("construction chunks failed to merge".to_string());
        }
        let mut pair = None;
        for j in 0..guard.len().saturating_sub(1) {
            let adjacent = match (&guard[j], &guard[j + 1]) {
                (Some(a), Some(b)) => a.1 + 1 == b.0,
                _ => false,
            };
            if adjacent {
                pair = Some(j);
                break;
            }
        }
        match pair {
            Some(j) => {
                let (lo, _, left) = guard[j].take().expect("slot checked above");
                let (_, hi, right) = guard[j + 1].take().expect("slot checked above");
                drop(guard);
                let merged = merge_adjacent(left, right);
                let mut guard = slots.lock().expect("construction queue poisoned");
                guard[j] = Some((lo, hi, merged));
            }
            None => {
                drop(guard);
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snp_bubble() {
        let bubbles = vec![VariantBubble {
            offset: 2,
            ref_allele: b"G".to_vec(),
            alt_alleles: vec![b"A".to_vec()],
            genotypes: Vec::new(),
        }];
        let g = construct_region("ref", b"ACGT", 0, &bubbles, &ConstructOptions::default())
            .unwrap();
        assert_eq!(g.node_count(), 4);
        let mut by_seq: HashMap<Vec<u8>, u64> = HashMap::new();
        for id in g.node_ids() {
            by_seq.insert(g.nodes[&id].sequence.clone(), id);
        }
        let ac = by_seq[&b"AC".to_vec()];
        let gn = by_seq[&b"G".to_vec()];
        let a = by_seq[&b"A".to_vec()];
        let t = by_seq[&b"T".to_vec()];
        assert!(g.has_edge_between(Handle::forward(ac), Handle::forward(gn)));
        assert!(g.has_edge_between(Handle::forward(ac), Handle::forward(a)));
        assert!(g.has_edge_between(Handle::forward(gn), Handle::forward(t)));
        assert!(g.has_edge_between(Handle::forward(a), Handle::forward(t)));
        assert_eq!(g.edge_count(), 4);
        // primary path visits AC, G, T
        let visited: Vec<u64> = g
            .paths
            .mapping_ids_of_path("ref")
            .iter()
            .map(|&id| g.paths.get(id).unwrap().position.node_id)
            .collect();
        assert_eq!(visited, vec![ac, gn, t]);
        assert_eq!(g.path_sequence("ref").unwrap(), b"ACGT".to_vec());
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_deletion_bubble() {
        let bubbles = vec![VariantBubble {
            offset: 1,
            ref_allele: b"CG".to_vec(),
            alt_alleles: vec![Vec::new()],
            genotypes: Vec::new(),
        }];
        let g = construct_region("ref", b"ACGT", 0, &bubbles, &ConstructOptions::default())
            .unwrap();
        let mut by_seq: HashMap<Vec<u8>, u64> = HashMap::new();
        for id in g.node_ids() {
            by_seq.insert(g.nodes[&id].sequence.clone(), id);
        }
        // deletion allele is a direct A -> T edge
        assert!(g.has_edge_between(
            Handle::forward(by_seq[&b"A".to_vec()]),
            Handle::forward(by_seq[&b"T".to_vec()])
        ));
        assert_eq!(g.path_sequence("ref").unwrap(), b"ACGT".to_vec());
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_insertion_bubble() {
        let bubbles = vec![VariantBubble {
            offset: 2,
            ref_allele: Vec::new(),
            alt_alleles: vec![b"TTT".to_vec()],
            genotypes: Vec::new(),
        }];
        let g = construct_region("ref", b"ACGT", 0, &bubbles, &ConstructOptions::default())
            .unwrap();
        let mut by_seq: HashMap<Vec<u8>, u64> = HashMap::new();
        for id in g.node_ids() {
            by_seq.insert(g.nodes[&id].sequence.clone(), id);
        }
        let ac = by_seq[&b"AC".to_vec()];
        let ins = by_seq[&b"TTT".to_vec()];
        let gt = by_seq[&b"GT".to_vec()];
        assert!(g.has_edge_between(Handle::forward(ac), Handle::forward(ins)));
        assert!(g.has_edge_between(Handle::forward(ins), Handle::forward(gt)));
        // the empty reference allele keeps the direct edge
        assert!(g.has_edge_between(Handle::forward(ac), Handle::forward(gt)));
        assert_eq!(g.path_sequence("ref").unwrap(), b"ACGT".to_vec());
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_phase_and_alt_paths() {
        let bubbles = vec![VariantBubble {
            offset: 2,
            ref_allele: b"G".to_vec(),
            alt_alleles: vec![b"A".to_vec()],
            genotypes: vec![vec![0, 1]],
        }];
        let opts = ConstructOptions {
            alt_paths: true,
            phase_paths: true,
            ..ConstructOptions::default()
        };
        let g = construct_region("ref", b"ACGT", 0, &bubbles, &opts).unwrap();
        assert!(g.paths.has_path("_alt_2_1"));
        assert_eq!(g.path_sequence("_phase_0_0").unwrap(), b"ACGT".to_vec());
        assert_eq!(g.path_sequence("_phase_0_1").unwrap(), b"ACAT".to_vec());
        assert!(g.is_valid(true, true, true));
    }

    #[test]
    fn test_skips_bad_records() {
        let bubbles = vec![
            VariantBubble {
                offset: 1,
                ref_allele: b"X".to_vec(),
                alt_alleles: vec![b"A".to_vec()],
                genotypes: Vec::new(),
            },
            VariantBubble {
                offset: 2,
                ref_allele: b"G".to_vec(),
                alt_alleles: vec![b"QQ".to_vec()],
                genotypes: Vec::new(),
            },
        ];
        let g = construct_region("ref", b"ACGT", 0, &bubbles, &ConstructOptions::default())
            .unwrap();
        // both records rejected: the graph is the linear reference
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.path_sequence("ref").unwrap(), b"ACGT".to_vec());
    }

    #[test]
    fn test_parallel_chunked_matches_single() {
        // reference long enough to split, with a SNP in each chunk
        let mut reference = Vec::new();
        for _ in 0..40 {
            reference.extend_from_slice(b"ACGTACGTAC");
        }
        let bubbles: Vec<VariantBubble> = (0..8)
            .map(|i| VariantBubble {
                offset: i * 50 + 3,
                ref_allele: vec![reference[i * 50 + 3]],
                alt_alleles: vec![if reference[i * 50 + 3] == b'A' {
                    b"C".to_vec()
                } else {
                    b"A".to_vec()
                }],
                genotypes: Vec::new(),
            })
            .collect();
        let opts = ConstructOptions {
            chunk_size: 100,
            ..ConstructOptions::default()
        };
        let chunked = construct("ref", &reference, &bubbles, &opts).unwrap();
        let single = construct_region("ref", &reference, 0, &bubbles, &opts).unwrap();
        assert_eq!(chunked.node_count(), single.node_count());
        assert_eq!(chunked.edge_count(), single.edge_count());
        assert_eq!(
            chunked.path_sequence("ref").unwrap(),
            single.path_sequence("ref").unwrap()
        );
        assert_eq!(chunked.path_sequence("ref").unwrap(), reference);
        assert!(chunked.is_valid(true, true, true));
    }
}
