//! ASCII edge list to fixed-width binary records.
//!
//! Input: one edge per line, `src dst` (plus a third weight column for
//! weighted output), whitespace separated; lines starting with `#` are
//! comments. Output: host-endian records ready for the preprocessor.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{EdgeType, Weight};

/// What the conversion found out about the graph.
pub struct ConvertReport {
    pub edges: u64,
    /// Largest vertex id seen; `max + 1` is the vertex count to preprocess
    /// with.
    pub max_vertex: Option<u32>,
}

/// Translate `input` into binary edge records at `output`.
pub fn run(input: &Path, output: &Path, edge_type: EdgeType) -> Result<ConvertReport> {
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("failed to create {}", output.display()))?,
    );

    let mut edges = 0u64;
    let mut max_vertex: Option<u32> = None;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read error in {}", input.display()))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let src: u32 = parse_field(fields.next(), "source", input, line_no)?;
        let dst: u32 = parse_field(fields.next(), "destination", input, line_no)?;
        writer.write_all(&src.to_ne_bytes())?;
        writer.write_all(&dst.to_ne_bytes())?;
        if edge_type == EdgeType::Weighted {
            let weight: Weight = parse_field(fields.next(), "weight", input, line_no)?;
            writer.write_all(&weight.to_ne_bytes())?;
        }

        edges += 1;
        let line_max = src.max(dst);
        max_vertex = Some(max_vertex.map_or(line_max, |m| m.max(line_max)));
    }
    writer.flush()?;

    Ok(ConvertReport { edges, max_vertex })
}

fn parse_field<T: std::str::FromStr>(
    field: Option<&str>,
    what: &str,
    input: &Path,
    line_no: usize,
) -> Result<T> {
    let field = field.with_context(|| {
        format!("{}:{}: missing {} column", input.display(), line_no + 1, what)
    })?;
    field.parse().ok().with_context(|| {
        format!(
            "{}:{}: malformed {} value {:?}",
            input.display(),
            line_no + 1,
            what,
            field
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn converts_unweighted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edges.txt");
        let output = dir.path().join("edges.bin");
        fs::write(&input, "# a comment\n0 1\n2 0\n\n1 2\n").unwrap();

        let report = run(&input, &output, EdgeType::Unweighted).unwrap();
        assert_eq!(report.edges, 3);
        assert_eq!(report.max_vertex, Some(2));

        let bytes = fs::read(&output).unwrap();
        assert_eq!(bytes.len(), 24);
        let mut expected = Vec::new();
        for (s, d) in [(0u32, 1u32), (2, 0), (1, 2)] {
            expected.extend_from_slice(&s.to_ne_bytes());
            expected.extend_from_slice(&d.to_ne_bytes());
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn converts_weighted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edges.txt");
        let output = dir.path().join("edges.bin");
        fs::write(&input, "3 4 0.5\n4 3 1.25\n").unwrap();

        let report = run(&input, &output, EdgeType::Weighted).unwrap();
        assert_eq!(report.edges, 2);
        assert_eq!(report.max_vertex, Some(4));

        let bytes = fs::read(&output).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[8..12], 0.5f32.to_ne_bytes());
        assert_eq!(bytes[20..24], 1.25f32.to_ne_bytes());
    }

    #[test]
    fn rejects_missing_weight_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edges.txt");
        fs::write(&input, "0 1\n").unwrap();
        let result = run(&input, &dir.path().join("out"), EdgeType::Weighted);
        assert!(result.is_err());
    }

    #[test]
    fn empty_input_reports_no_vertices() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("edges.txt");
        fs::write(&input, "# only comments\n").unwrap();
        let report = run(&input, &dir.path().join("out"), EdgeType::Unweighted).unwrap();
        assert_eq!(report.edges, 0);
        assert_eq!(report.max_vertex, None);
    }
}
