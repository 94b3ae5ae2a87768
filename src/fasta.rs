use std::fs::File;
use std::io::{self, BufRead, BufReader};

/// A named sequence loaded from FASTA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaSequence {
    pub id: String,
    pub data: Vec<u8>,
}

impl FastaSequence {
    /// Random-access retrieval of a contig substring, clamped to bounds.
    pub fn subsequence(&self, start: usize, end: usize) -> &[u8] {
        let end = end.min(self.data.len());
        let start = start.min(end);
        &self.data[start..end]
    }
}

/// Parse FASTA from any reader. Header lines start records; sequence lines
/// are concatenated with whitespace trimmed.
pub fn read_fasta<R: BufRead>(reader: R) -> io::Result<Vec<FastaSequence>> {
    let mut sequences = Vec::new();
    let mut id: Option<String> = None;
    let mut data: Vec<u8> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(header) = line.strip_prefix('>') {
            if let Some(id_val) = id.take() {
                sequences.push(FastaSequence {
                    id: id_val,
                    data: std::mem::take(&mut data),
                });
            }
            // the id is the first whitespace-delimited token
            id = Some(
                header
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            );
        } else if id.is_some() {
            data.extend(line.trim().as_bytes());
        }
    }
    if let Some(id_val) = id {
        sequences.push(FastaSequence { id: id_val, data });
    }
    Ok(sequences)
}

/// Load sequences from a FASTA file on disk.
pub fn load_fasta(path: &str) -> io::Result<Vec<FastaSequence>> {
    let file = File::open(path)?;
    read_fasta(BufReader::new(file))
}
