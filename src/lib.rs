//! In-memory variation-graph engine: a bidirected sequence graph with
//! embedded reference paths, as used by short-read aligners and indexers
//! in pangenomics.
//!
//! The [`VariationGraph`] owns sequence nodes, side-attached bidirected
//! edges, and a [`PathIndex`] of named paths whose mappings walk oriented
//! nodes. On top of the store sit the structural edit algebra (node
//! division, concatenation, sibling simplification, null-node forwarding,
//! editing by alignment), VCF-driven construction, the DAGification
//! pipeline (unfold, SCC unrolling, bidirected topological sort), and the
//! k-mer enumerator that feeds succinct-index construction.

pub mod construct;
pub mod dagify;
pub mod divide;
pub mod edit;
pub mod fasta;
pub mod gfa;
pub mod graph;
pub mod handle;
pub mod kmer;
pub mod path;
pub mod pos;
pub mod simplify;
pub mod translation;
pub mod unchop;

pub use construct::{construct, construct_region, ConstructOptions, VariantBubble};
pub use dagify::{clone_translations, Scc};
pub use fasta::{load_fasta, read_fasta, FastaSequence};
pub use gfa::{read_gfa, write_gfa};
pub use graph::{Node, ProgressObserver, VariationGraph};
pub use handle::{complement, is_dna, reverse_complement, Handle, NodeSide};
pub use kmer::{format_gcsa_record, KmerPosition, Kpath};
pub use path::{Cursor, Edit, Mapping, MappingId, Path, PathIndex};
pub use pos::Position;
pub use translation::{overlay, sort_translations, Translation};
