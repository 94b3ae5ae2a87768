/// Standalone GFA sorting tool: load, normalize, topologically sort, write.
use clap::Parser;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::process;
use vargraph::{read_gfa, write_gfa};

#[derive(Parser)]
#[command(name = "sort_gfa")]
#[command(about = "Normalize a GFA graph and sort its nodes topologically")]
struct Args {
    /// Input GFA file
    #[arg(short = 'i', long)]
    input: String,

    /// Output GFA file
    #[arg(short = 'o', long)]
    output: String,

    /// Skip the normalization pass (unchop + sibling simplification)
    #[arg(long)]
    no_normalize: bool,

    /// Normalization iteration bound
    #[arg(long, default_value = "10")]
    max_iterations: usize,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        eprintln!("[sort_gfa] reading {}", args.input);
    }
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[sort_gfa] error opening {}: {}", args.input, e);
            process::exit(1);
        }
    };
    let mut graph = match read_gfa(BufReader::new(file)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("[sort_gfa] error parsing GFA: {}", e);
            process::exit(1);
        }
    };
    if args.verbose {
        eprintln!(
            "[sort_gfa] loaded {} nodes, {} edges, {} paths",
            graph.node_count(),
            graph.edge_count(),
            graph.paths.path_count()
        );
    }

    if !args.no_normalize {
        graph.normalize(args.max_iterations, args.verbose);
    }
    if let Err(e) = graph.sort_topologically(args.verbose) {
        eprintln!("[sort_gfa] sort failed: {}", e);
        process::exit(1);
    }
    if !graph.is_valid(true, true, true) {
        eprintln!("[sort_gfa] sorted graph failed validation");
        process::exit(1);
    }

    let out = match File::create(&args.output) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[sort_gfa] error creating {}: {}", args.output, e);
            process::exit(1);
        }
    };
    let mut writer = BufWriter::new(out);
    if let Err(e) = write_gfa(&graph, &mut writer) {
        eprintln!("[sort_gfa] error writing GFA: {}", e);
        process::exit(1);
    }
    if args.verbose {
        eprintln!(
            "[sort_gfa] wrote {} nodes in topological order to {}",
            graph.node_count(),
            args.output
        );
    }
}
