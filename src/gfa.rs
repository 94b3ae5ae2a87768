use crate::graph::{Node, VariationGraph};
use crate::handle::Handle;
use crate::path::Mapping;
use crate::pos::Position;
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// Write the graph as GFA 1.0: sorted segments, one link per edge in its
/// stored direction, and path lines with `*` overlaps.
pub fn write_gfa<W: Write>(graph: &VariationGraph, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "H\tVN:Z:1.0")?;

    for id in graph.node_ids() {
        let seq = &graph.nodes[&id].sequence;
        if seq.is_empty() {
            writeln!(writer, "S\t{}\t*", id)?;
        } else {
            writeln!(writer, "S\t{}\t{}", id, String::from_utf8_lossy(seq))?;
        }
    }

    for (a, b) in graph.edge_pairs() {
        let from = a.leaving();
        let to = b.entering();
        writeln!(
            writer,
            "L\t{}\t{}\t{}\t{}\t0M",
            from.node_id(),
            from.orientation_char(),
            to.node_id(),
            to.orientation_char()
        )?;
    }

    let names: Vec<String> = graph.paths.path_names().map(|s| s.to_string()).collect();
    for name in names {
        let mut steps = Vec::new();
        graph.paths.for_each(&name, |_, m| {
            steps.push(format!(
                "{}{}",
                m.position.node_id,
                if m.position.is_reverse { '-' } else { '+' }
            ));
        });
        writeln!(writer, "P\t{}\t{}\t*", name, steps.join(","))?;
    }
    Ok(())
}

fn parse_orient(s: &str) -> Option<bool> {
    match s {
        "+" => Some(false),
        "-" => Some(true),
        _ => None,
    }
}

/// A link held back for bluntification.
struct OverlapLink {
    from: Handle,
    to: Handle,
    overlap: usize,
}

/// Read a GFA 1.0 stream. Malformed records are skipped with a diagnostic;
/// duplicate segments and links are skipped with a warning; path ranks are
/// compacted after the load. Links with non-zero overlaps go through a
/// bluntification pass.
pub fn read_gfa<R: BufRead>(reader: R) -> Result<VariationGraph, String> {
    let mut graph = VariationGraph::new();
    let mut overlaps: Vec<OverlapLink> = Vec::new();
    let mut pending_rank: HashMap<String, u64> = HashMap::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("read error at line {}: {}", lineno + 1, e))?;
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.first().copied() {
            Some("S") => {
                if fields.len() < 3 {
                    eprintln!("[gfa] line {}: short S record, skipped", lineno + 1);
                    continue;
                }
                let Ok(id) = fields[1].parse::<u64>() else {
                    eprintln!(
                        "[gfa] line {}: non-numeric segment name {}, skipped",
                        lineno + 1,
                        fields[1]
                    );
                    continue;
                };
                if graph.has_node(id) {
                    eprintln!("[gfa] line {}: duplicate segment {}, skipped", lineno + 1, id);
                    continue;
                }
                let seq = if fields[2] == "*" {
                    Vec::new()
                } else {
                    fields[2].as_bytes().to_vec()
                };
                if let Err(e) = graph.add_node(Node::new(id, seq)) {
                    eprintln!("[gfa] line {}: {}", lineno + 1, e);
                }
            }
            Some("L") => {
                if fields.len() < 6 {
                    eprintln!("[gfa] line {}: short L record, skipped", lineno + 1);
                    continue;
                }
                let parsed = (
                    fields[1].parse::<u64>(),
                    parse_orient(fields[2]),
                    fields[3].parse::<u64>(),
                    parse_orient(fields[4]),
                );
                let (Ok(from_id), Some(from_rev), Ok(to_id), Some(to_rev)) = parsed else {
                    eprintln!("[gfa] line {}: unparseable L record, skipped", lineno + 1);
                    continue;
                };
                let from = Handle::new(from_id, from_rev);
                let to = Handle::new(to_id, to_rev);
                let overlap = match fields[5] {
                    "*" | "0M" => 0,
                    cigar => match cigar.strip_suffix('M').and_then(|n| n.parse::<usize>().ok()) {
                        Some(n) => n,
                        None => {
                            eprintln!(
                                "[gfa] line {}: unsupported overlap {}, treated as 0M",
                                lineno + 1,
                                cigar
                            );
                            0
                        }
                    },
                };
                if overlap > 0 {
                    overlaps.push(OverlapLink { from, to, overlap });
                } else {
                    if graph.has_edge_between(from, to) {
                        eprintln!(
                            "[gfa] line {}: duplicate link {} -> {}, skipped",
                            lineno + 1,
                            from,
                            to
                        );
                        continue;
                    }
                    graph.create_edge_between(from, to);
                }
            }
            Some("P") => {
                if fields.len() < 3 {
                    eprintln!("[gfa] line {}: short P record, skipped", lineno + 1);
                    continue;
                }
                let name = fields[1].to_string();
                for step in fields[2].split(',') {
                    if step.len() < 2 {
                        eprintln!("[gfa] line {}: bad path step {}, skipped", lineno + 1, step);
                        continue;
                    }
                    let (id_part, orient_part) = step.split_at(step.len() - 1);
                    let (Ok(id), Some(rev)) = (id_part.parse::<u64>(), parse_orient(orient_part))
                    else {
                        eprintln!("[gfa] line {}: bad path step {}, skipped", lineno + 1, step);
                        continue;
                    };
                    let len = graph.node_len(id);
                    let rank = pending_rank.entry(name.clone()).or_insert(0);
                    *rank += 1;
                    graph.paths.append_mapping(
                        &name,
                        Mapping::perfect(Position::new(id, rev, 0), len, *rank),
                    );
                }
            }
            Some("H") | None => {}
            Some(other) => {
                if !other.is_empty() {
                    eprintln!("[gfa] line {}: unknown record {}, skipped", lineno + 1, other);
                }
            }
        }
    }

    bluntify(&mut graph, overlaps);
    graph.paths.compact_ranks();
    Ok(graph)
}

/// Resolve overlapped links: cut both segment ends at the overlap
/// boundary, fold the two identical overlap pieces into one shared node,
/// and rewire. A link whose two ends disagree on the overlapped sequence
/// is downgraded to a blunt link with a warning.
fn bluntify(graph: &mut VariationGraph, links: Vec<OverlapLink>) {
    // nodes divided earlier in the pass are chased through this map:
    // old id -> (piece at its start, piece at its end)
    let mut renamed: HashMap<u64, (u64, u64)> = HashMap::new();
    let resolve_right = |renamed: &HashMap<u64, (u64, u64)>, mut h: Handle| -> Handle {
        while let Some(&(head, tail)) = renamed.get(&h.node_id()) {
            h = Handle::new(if h.is_reverse() { head } else { tail }, h.is_reverse());
        }
        h
    };
    let resolve_left = |renamed: &HashMap<u64, (u64, u64)>, mut h: Handle| -> Handle {
        while let Some(&(head, tail)) = renamed.get(&h.node_id()) {
            h = Handle::new(if h.is_reverse() { tail } else { head }, h.is_reverse());
        }
        h
    };

    for link in links {
        let from = resolve_right(&renamed, link.from);
        let to = resolve_left(&renamed, link.to);
        let o = link.overlap;
        let (Some(from_seq), Some(to_seq)) = (graph.sequence(from), graph.sequence(to)) else {
            eprintln!("[gfa] overlap link references missing node, skipped");
            continue;
        };
        if o > from_seq.len() || o > to_seq.len() || from_seq[from_seq.len() - o..] != to_seq[..o]
        {
            eprintln!(
                "[gfa] overlap of {} between {} and {} disagrees, dropping the annotation",
                o, from, to
            );
            graph.create_edge_between(from, to);
            continue;
        }

        // split the overlap off both ends
        let from_overlap = if o == from_seq.len() {
            from
        } else {
            let node = from.node_id();
            let cut = if from.is_reverse() { o } else { from_seq.len() - o };
            match graph.divide_node(node, &[cut]) {
                Ok(pieces) => {
                    renamed.insert(node, (pieces[0], pieces[1]));
                    Handle::new(
                        if from.is_reverse() { pieces[0] } else { pieces[1] },
                        from.is_reverse(),
                    )
                }
                Err(e) => {
                    eprintln!("[gfa] bluntify split failed: {}", e);
                    continue;
                }
            }
        };
        let to_overlap = if o == to_seq.len() {
            to
        } else {
            let node = to.node_id();
            let cut = if to.is_reverse() { to_seq.len() - o } else { o };
            match graph.divide_node(node, &[cut]) {
                Ok(pieces) => {
                    renamed.insert(node, (pieces[0], pieces[1]));
                    Handle::new(
                        if to.is_reverse() { pieces[1] } else { pieces[0] },
                        to.is_reverse(),
                    )
                }
                Err(e) => {
                    eprintln!("[gfa] bluntify split failed: {}", e);
                    continue;
                }
            }
        };

        if from_overlap.node_id() != to_overlap.node_id() {
            renamed.insert(
                to_overlap.node_id(),
                (from_overlap.node_id(), from_overlap.node_id()),
            );
            if let Err(e) = graph.merge_nodes(from_overlap, &[to_overlap]) {
                eprintln!("[gfa] bluntify merge failed: {}", e);
            }
        }
    }
}
