use std::collections::HashMap;
use vargraph::{overlay, Edit, Handle, Mapping, Path, Position, VariationGraph};

#[test]
fn insertion_edit_end_to_end() {
    // graph: one node ACGT with a forward path covering it
    let mut g = VariationGraph::new();
    let n = g.create_node(b"ACGT".to_vec());
    g.paths
        .append_mapping("ref", Mapping::perfect(Position::forward(n, 0), 4, 1));

    // alignment: match ACG, insert TT, match T
    let mut aln = Path::new("read");
    let mut m = Mapping::new(Position::forward(n, 0), 1);
    m.edits.push(Edit::match_len(3));
    m.edits.push(Edit::insertion(b"TT".to_vec()));
    m.edits.push(Edit::match_len(1));
    aln.mappings.push(m);

    let translations = g.edit(vec![aln]).unwrap();

    let by_seq: HashMap<Vec<u8>, u64> = g
        .node_ids()
        .into_iter()
        .map(|id| (g.nodes[&id].sequence.clone(), id))
        .collect();
    let acg = by_seq[&b"ACG".to_vec()];
    let t = by_seq[&b"T".to_vec()];
    let tt = by_seq[&b"TT".to_vec()];
    assert!(g.has_edge_between(Handle::forward(acg), Handle::forward(tt)));
    assert!(g.has_edge_between(Handle::forward(tt), Handle::forward(t)));
    assert!(g.has_edge_between(Handle::forward(acg), Handle::forward(t)));

    // the translation for TT records a synthetic from-path at the insertion
    // point on the original node
    let novel = translations
        .iter()
        .find(|tr| {
            tr.to.mappings.first().map(|m| m.position) == Some(Position::forward(tt, 0))
        })
        .expect("translation for the novel node");
    assert_eq!(novel.from.mappings[0].position, Position::forward(n, 3));
    assert_eq!(novel.from.mappings[0].edits[0], Edit::insertion(b"TT".to_vec()));

    assert_eq!(g.path_sequence("read").unwrap(), b"ACGTTT".to_vec());
    assert_eq!(g.path_sequence("ref").unwrap(), b"ACGT".to_vec());
    assert!(g.is_valid(true, true, true));
}

#[test]
fn edit_then_lift_over_composes() {
    let mut g = VariationGraph::new();
    let n = g.create_node(b"ACGTACGT".to_vec());
    g.paths
        .append_mapping("ref", Mapping::perfect(Position::forward(n, 0), 8, 1));

    // first edit: substitution at offset 4
    let mut first = Path::new("a");
    let mut m = Mapping::new(Position::forward(n, 0), 1);
    m.edits.push(Edit::match_len(4));
    m.edits.push(Edit::substitution(b"T".to_vec()));
    m.edits.push(Edit::match_len(3));
    first.mappings.push(m);
    let t1 = g.edit(vec![first]).unwrap();

    // second edit against the edited graph: insert at the very start of
    // the leading piece
    let lead = g
        .node_ids()
        .into_iter()
        .find(|&id| g.nodes[&id].sequence == b"ACGT".to_vec())
        .expect("leading piece");
    let mut second = Path::new("b");
    let mut m = Mapping::new(Position::forward(lead, 0), 1);
    m.edits.push(Edit::match_len(2));
    m.edits.push(Edit::insertion(b"GG".to_vec()));
    m.edits.push(Edit::match_len(2));
    second.mappings.push(m);
    let t2 = g.edit(vec![second]).unwrap();

    // composing the two translations maps final nodes back to the original
    let composed = overlay(&t2, &t1);
    assert!(!composed.is_empty());
    let back_on_original = composed
        .iter()
        .filter(|tr| {
            tr.from
                .mappings
                .first()
                .map(|m| m.position.node_id == n)
                .unwrap_or(false)
        })
        .count();
    assert!(back_on_original > 0);
    assert!(g.is_valid(true, true, true));
}

#[test]
fn multi_node_alignment_path() {
    let mut g = VariationGraph::new();
    let a = g.create_node(b"ACG".to_vec());
    let b = g.create_node(b"TTA".to_vec());
    g.create_edge_between(Handle::forward(a), Handle::forward(b));
    g.paths
        .append_mapping("ref", Mapping::perfect(Position::forward(a, 0), 3, 1));
    g.paths
        .append_mapping("ref", Mapping::perfect(Position::forward(b, 0), 3, 2));

    // a read matching across the junction with a substitution in node b
    let mut aln = Path::new("read");
    aln.mappings
        .push(Mapping::perfect(Position::forward(a, 0), 3, 1));
    let mut m = Mapping::new(Position::forward(b, 0), 2);
    m.edits.push(Edit::substitution(b"C".to_vec()));
    m.edits.push(Edit::match_len(2));
    aln.mappings.push(m);

    g.edit(vec![aln]).unwrap();
    assert_eq!(g.path_sequence("read").unwrap(), b"ACGCTA".to_vec());
    assert_eq!(g.path_sequence("ref").unwrap(), b"ACGTTA".to_vec());
    assert!(g.is_valid(true, true, true));
}

#[test]
fn translations_sorted_and_double_stranded() {
    let mut g = VariationGraph::new();
    let n = g.create_node(b"ACGT".to_vec());
    let mut aln = Path::new("read");
    let mut m = Mapping::new(Position::forward(n, 0), 1);
    m.edits.push(Edit::match_len(2));
    m.edits.push(Edit::deletion(1));
    m.edits.push(Edit::match_len(1));
    aln.mappings.push(m);
    let translations = g.edit(vec![aln]).unwrap();
    assert_eq!(translations.len(), 2 * g.node_count());
    let firsts: Vec<Option<Position>> = translations
        .iter()
        .map(|t| t.from.first_position())
        .collect();
    let mut sorted = firsts.clone();
    sorted.sort();
    assert_eq!(firsts, sorted);
}
