use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use vargraph::{
    construct_region, read_gfa, write_gfa, ConstructOptions, VariantBubble,
};

#[test]
fn constructed_graph_survives_gfa_round_trip() {
    let bubbles = vec![
        VariantBubble {
            offset: 2,
            ref_allele: b"G".to_vec(),
            alt_alleles: vec![b"A".to_vec()],
            genotypes: Vec::new(),
        },
        VariantBubble {
            offset: 6,
            ref_allele: b"CG".to_vec(),
            alt_alleles: vec![Vec::new()],
            genotypes: Vec::new(),
        },
    ];
    let g = construct_region(
        "ref",
        b"ACGTACCGTA",
        0,
        &bubbles,
        &ConstructOptions::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.gfa");
    {
        let mut writer = BufWriter::new(File::create(&path).unwrap());
        write_gfa(&g, &mut writer).unwrap();
        writer.flush().unwrap();
    }
    let g2 = read_gfa(BufReader::new(File::open(&path).unwrap())).unwrap();

    assert_eq!(g2.node_count(), g.node_count());
    assert_eq!(g2.edge_count(), g.edge_count());
    assert_eq!(
        g2.path_sequence("ref").unwrap(),
        g.path_sequence("ref").unwrap()
    );
    assert!(g2.is_valid(true, true, true));
}

#[test]
fn sorted_graph_round_trips_in_topological_order() {
    let bubbles = vec![VariantBubble {
        offset: 3,
        ref_allele: b"T".to_vec(),
        alt_alleles: vec![b"C".to_vec()],
        genotypes: Vec::new(),
    }];
    let mut g = construct_region(
        "ref",
        b"ACGTACGT",
        0,
        &bubbles,
        &ConstructOptions::default(),
    )
    .unwrap();
    g.normalize(5, false);
    g.sort_topologically(false).unwrap();

    let mut out = Vec::new();
    write_gfa(&g, &mut out).unwrap();
    let g2 = read_gfa(BufReader::new(&out[..])).unwrap();

    let ids = g2.node_ids();
    assert_eq!(ids, (1..=ids.len() as u64).collect::<Vec<_>>());
    for (a, b) in g2.edge_pairs() {
        let (src, dst) = if a.is_end { (a.node, b.node) } else { (b.node, a.node) };
        assert!(src < dst, "edge {} -> {} out of order", src, dst);
    }
    assert_eq!(g2.path_sequence("ref").unwrap(), b"ACGTACGT".to_vec());
}
