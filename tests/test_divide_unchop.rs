use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use vargraph::{Handle, Mapping, Position, VariationGraph};

#[test]
fn divide_then_read() {
    // one node ACGTACGT covered by a single forward path of rank 1
    let mut g = VariationGraph::new();
    let n = g.create_node(b"ACGTACGT".to_vec());
    g.paths
        .append_mapping("ref", Mapping::perfect(Position::forward(n, 0), 8, 1));

    let pieces = g.divide_node(n, &[3, 5]).unwrap();

    let seqs: Vec<Vec<u8>> = pieces.iter().map(|p| g.nodes[p].sequence.clone()).collect();
    assert_eq!(seqs, vec![b"ACG".to_vec(), b"TA".to_vec(), b"CGT".to_vec()]);
    assert!(g.has_edge_between(Handle::forward(pieces[0]), Handle::forward(pieces[1])));
    assert!(g.has_edge_between(Handle::forward(pieces[1]), Handle::forward(pieces[2])));
    assert_eq!(g.edge_count(), 2);

    let ids = g.paths.mapping_ids_of_path("ref");
    assert_eq!(ids.len(), 3);
    let ranks: Vec<u64> = ids.iter().map(|&id| g.paths.get(id).unwrap().rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(g.path_sequence("ref").unwrap(), b"ACGTACGT".to_vec());
    assert!(g.is_valid(true, true, true));
}

#[test]
fn divide_then_concat_reconstitutes() {
    let mut g = VariationGraph::new();
    let n = g.create_node(b"GATTACAGATTACA".to_vec());
    g.paths
        .append_mapping("p", Mapping::perfect(Position::forward(n, 0), 14, 1));
    let digest = g.path_digest("p").unwrap();

    g.divide_node(n, &[2, 5, 9]).unwrap();
    assert_eq!(g.node_count(), 4);
    g.unchop(false);

    assert_eq!(g.node_count(), 1);
    let id = g.node_ids()[0];
    assert_eq!(g.nodes[&id].sequence, b"GATTACAGATTACA".to_vec());
    assert_eq!(g.paths.path_len("p"), 1);
    assert_eq!(g.path_digest("p").unwrap(), digest);
    assert!(g.is_valid(true, true, true));
}

#[test]
fn length_one_node_boundary_cuts() {
    let mut g = VariationGraph::new();
    let n = g.create_node(b"A".to_vec());
    assert_eq!(g.divide_node(n, &[0]).unwrap(), vec![n]);
    assert_eq!(g.divide_node(n, &[1]).unwrap(), vec![n]);
    assert!(g.has_node(n));
    assert!(g.divide_node(n, &[2]).is_err());
}

#[test]
fn mapping_count_grows_by_cuts_inside() {
    let mut g = VariationGraph::new();
    let n = g.create_node(b"ACGTACGT".to_vec());
    // mapping covering [2, 6): two of the three cuts fall inside it
    g.paths
        .append_mapping("p", Mapping::perfect(Position::forward(n, 2), 4, 1));
    g.divide_node(n, &[3, 5, 7]).unwrap();
    assert_eq!(g.paths.path_len("p"), 3);
    assert_eq!(g.path_sequence("p").unwrap(), b"GTAC".to_vec());
}

#[test]
fn compact_ids_dense_after_churn() {
    let mut g = VariationGraph::new();
    let a = g.create_node(b"ACGT".to_vec());
    let b = g.create_node(b"TTTT".to_vec());
    let c = g.create_node(b"GGGG".to_vec());
    g.create_edge_between(Handle::forward(a), Handle::forward(b));
    g.create_edge_between(Handle::forward(b), Handle::forward(c));
    g.destroy_node(b);
    g.divide_node(c, &[2]).unwrap();
    g.compact_ids();
    let ids = g.node_ids();
    assert_eq!(ids, (1..=ids.len() as u64).collect::<Vec<_>>());
    assert!(g.is_valid(true, true, true));
}

#[test]
fn random_division_churn_stays_valid() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xda6);
    let bases = [b'A', b'C', b'G', b'T'];
    for round in 0..10 {
        let mut g = VariationGraph::new();
        let len = 24 + (round % 5) * 7;
        let seq: Vec<u8> = (0..len).map(|_| bases[rng.gen_range(0..4)]).collect();
        let n = g.create_node(seq.clone());
        g.paths
            .append_mapping("walk", Mapping::perfect(Position::forward(n, 0), len, 1));
        let digest = g.path_digest("walk").unwrap();

        // a few random rounds of divide on arbitrary nodes
        for _ in 0..6 {
            let ids = g.node_ids();
            let target = ids[rng.gen_range(0..ids.len())];
            let tlen = g.node_len(target);
            if tlen < 2 {
                continue;
            }
            let cut = rng.gen_range(1..tlen);
            g.divide_node(target, &[cut]).unwrap();
            assert!(g.is_valid(true, true, true));
        }
        assert_eq!(g.path_digest("walk").unwrap(), digest);

        // and unchop brings the whole thing back
        g.unchop(false);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.nodes[&g.node_ids()[0]].sequence, seq);
        assert_eq!(g.path_digest("walk").unwrap(), digest);
    }
}
