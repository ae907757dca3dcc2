//! Post-hoc validation of a generated edge grid.
//!
//! Fast-fail checks over the on-disk artifacts:
//! - degree arrays match the metadata and each other
//! - partition maps are monotonic, in range, and balanced
//! - block sizes account for every in-range edge
//! - offset indexes agree with the block sizes and stream lengths
//! - the streams are byte-identical to the blocks they concatenate
//! - every edge sits in the cell its endpoints map to

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::config::VERTEX_BYTES;
use crate::formats::blocks::{self, vertex_at};
use crate::formats::degrees::{self, IN_DEGREE_FILE, OUT_DEGREE_FILE};
use crate::formats::meta::{self, GridMeta};
use crate::formats::offsets::{self, COLUMN_FILE, COLUMN_OFFSET_FILE, ROW_FILE, ROW_OFFSET_FILE};
use crate::partition::degree_balanced_map;

/// Collected check outcomes.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    fn check_passed(&mut self) {
        self.checks_run += 1;
        self.checks_passed += 1;
    }

    fn check_failed(&mut self, msg: String) {
        self.checks_run += 1;
        self.passed = false;
        self.errors.push(msg);
    }

    fn check(&mut self, ok: bool, msg: impl FnOnce() -> String) {
        if ok {
            self.check_passed();
        } else {
            self.check_failed(msg());
        }
    }
}

/// Run every check against the grid in `dir`.
pub fn validate_grid(dir: &Path) -> Result<ValidationResult> {
    println!("Validating grid at {}", dir.display());

    let meta = meta::read(dir)?;
    println!(
        "  ✓ meta: {} vertices, {} edges, {} partitions, {}",
        meta.vertices, meta.edges, meta.partitions, meta.edge_type
    );
    let out_degree = degrees::read(dir.join(OUT_DEGREE_FILE))?;
    let in_degree = degrees::read(dir.join(IN_DEGREE_FILE))?;

    let mut result = ValidationResult::new();

    println!("1. Checking degree arrays...");
    check_degree_arrays(&meta, &out_degree, &in_degree, &mut result);

    let source_map = degree_balanced_map(&out_degree, meta.partitions, meta.edges);
    let target_map = degree_balanced_map(&in_degree, meta.partitions, meta.edges);

    println!("2. Checking partition maps...");
    check_partition_map(&source_map, &out_degree, &meta, "source", &mut result);
    check_partition_map(&target_map, &in_degree, &meta, "target", &mut result);

    println!("3. Checking block completeness...");
    let block_sizes = collect_block_sizes(dir, &meta)?;
    check_completeness(&meta, &out_degree, &block_sizes, &mut result);

    println!("4. Checking offset indexes...");
    check_offsets(dir, &meta, &block_sizes, &mut result)?;

    println!("5. Checking stream round-trips...");
    check_streams(dir, &meta, &mut result)?;

    println!("6. Checking edge routing...");
    check_routing(dir, &meta, &source_map, &target_map, &mut result)?;

    println!(
        "{} {}/{} checks passed",
        if result.passed { "✅" } else { "❌" },
        result.checks_passed,
        result.checks_run
    );
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    for error in &result.errors {
        println!("  error: {}", error);
    }
    Ok(result)
}

fn check_degree_arrays(
    meta: &GridMeta,
    out_degree: &[u32],
    in_degree: &[u32],
    result: &mut ValidationResult,
) {
    result.check(out_degree.len() == meta.vertices as usize, || {
        format!(
            "out-degree array has {} entries, meta says {} vertices",
            out_degree.len(),
            meta.vertices
        )
    });
    result.check(in_degree.len() == meta.vertices as usize, || {
        format!(
            "in-degree array has {} entries, meta says {} vertices",
            in_degree.len(),
            meta.vertices
        )
    });

    let out_sum: u64 = out_degree.iter().map(|&d| d as u64).sum();
    let in_sum: u64 = in_degree.iter().map(|&d| d as u64).sum();
    result.check(out_sum == in_sum, || {
        format!("degree sums disagree: out {} vs in {}", out_sum, in_sum)
    });
    result.check(out_sum <= meta.edges, || {
        format!(
            "degree sum {} exceeds meta edge count {}",
            out_sum, meta.edges
        )
    });
    if out_sum < meta.edges {
        result.warn(format!(
            "{} of {} edges had an out-of-range endpoint and were dropped",
            meta.edges - out_sum,
            meta.edges
        ));
    }
}

fn check_partition_map(
    map: &[u32],
    degrees: &[u32],
    meta: &GridMeta,
    which: &str,
    result: &mut ValidationResult,
) {
    result.check(map.windows(2).all(|w| w[0] <= w[1]), || {
        format!("{} partition map is not monotonic", which)
    });
    result.check(
        map.iter().all(|&p| (p as usize) < meta.partitions),
        || format!("{} partition map contains an id >= {}", which, meta.partitions),
    );
    // A graph with no in-range edges never splits, so only demand the last
    // partition when there is degree mass to spread.
    if !map.is_empty() && degrees.iter().any(|&d| d > 0) {
        result.check(
            map[map.len() - 1] as usize == meta.partitions - 1,
            || format!("{} partition map never reaches the last partition", which),
        );
    }

    // Every closed partition may stray from the target by at most one
    // vertex's degree.
    if map.len() == degrees.len() && !map.is_empty() {
        let target = meta.edges / meta.partitions as u64;
        let max_degree = degrees.iter().copied().max().unwrap_or(0) as u64;
        let mut sums = vec![0u64; meta.partitions];
        for (v, &p) in map.iter().enumerate() {
            sums[p as usize] += degrees[v] as u64;
        }
        let balanced = sums[..meta.partitions - 1]
            .iter()
            .all(|&sum| sum.abs_diff(target) <= max_degree);
        result.check(balanced, || {
            format!("{} partition sums stray more than one vertex from target", which)
        });
    }
}

fn collect_block_sizes(dir: &Path, meta: &GridMeta) -> Result<Vec<u64>> {
    let mut sizes = Vec::with_capacity(meta.partitions * meta.partitions);
    for i in 0..meta.partitions {
        for j in 0..meta.partitions {
            sizes.push(blocks::block_len(dir, i, j)?);
        }
    }
    Ok(sizes)
}

fn check_completeness(
    meta: &GridMeta,
    out_degree: &[u32],
    block_sizes: &[u64],
    result: &mut ValidationResult,
) {
    let edge_unit = meta.edge_unit() as u64;
    result.check(
        block_sizes.iter().all(|&size| size % edge_unit == 0),
        || "a block file holds a torn edge record".to_string(),
    );

    // Pass 1 and Pass 2 drop the same out-of-range edges, so the blocks
    // must hold exactly the edges the degree arrays counted.
    let expected: u64 = out_degree.iter().map(|&d| d as u64 * edge_unit).sum();
    let actual: u64 = block_sizes.iter().sum();
    result.check(actual == expected, || {
        format!(
            "blocks hold {} bytes, degree arrays account for {}",
            actual, expected
        )
    });
}

fn check_offsets(
    dir: &Path,
    meta: &GridMeta,
    block_sizes: &[u64],
    result: &mut ValidationResult,
) -> Result<()> {
    for (offsets_name, stream_name, row_major) in [
        (ROW_OFFSET_FILE, ROW_FILE, true),
        (COLUMN_OFFSET_FILE, COLUMN_FILE, false),
    ] {
        let offsets = offsets::read(dir.join(offsets_name))?;
        let cells = meta.partitions * meta.partitions;
        result.check(offsets.len() == cells + 1, || {
            format!(
                "{} has {} entries, expected {}",
                offsets_name,
                offsets.len(),
                cells + 1
            )
        });
        if offsets.len() != cells + 1 {
            continue;
        }

        let mut consistent = true;
        for k in 0..cells {
            let expected = block_size_at(block_sizes, meta.partitions, k, row_major);
            if offsets[k + 1] - offsets[k] != expected as i64 {
                consistent = false;
                break;
            }
        }
        result.check(consistent, || {
            format!("{} deltas disagree with block sizes", offsets_name)
        });

        let stream_len = std::fs::metadata(dir.join(stream_name))
            .with_context(|| format!("failed to stat {}", stream_name))?
            .len();
        result.check(offsets[cells] == stream_len as i64, || {
            format!(
                "{} final offset {} does not match {} length {}",
                offsets_name, offsets[cells], stream_name, stream_len
            )
        });
    }
    Ok(())
}

/// Size of the k-th block in the given iteration order.
fn block_size_at(block_sizes: &[u64], partitions: usize, k: usize, row_major: bool) -> u64 {
    let (outer, inner) = (k / partitions, k % partitions);
    let (i, j) = if row_major { (outer, inner) } else { (inner, outer) };
    block_sizes[i * partitions + j]
}

fn check_streams(dir: &Path, meta: &GridMeta, result: &mut ValidationResult) -> Result<()> {
    for (stream_name, row_major) in [(ROW_FILE, true), (COLUMN_FILE, false)] {
        let mut stream = File::open(dir.join(stream_name))
            .with_context(|| format!("failed to open {}", stream_name))?;
        let mut identical = true;

        'cells: for outer in 0..meta.partitions {
            for inner in 0..meta.partitions {
                let (i, j) = if row_major { (outer, inner) } else { (inner, outer) };
                let mut block = File::open(blocks::block_path(dir, i, j))?;
                if !windows_match(&mut stream, &mut block)? {
                    identical = false;
                    break 'cells;
                }
            }
        }
        // The stream must also end where the last block does.
        let mut tail = [0u8; 1];
        if stream.read(&mut tail)? != 0 {
            identical = false;
        }
        result.check(identical, || {
            format!("{} does not reproduce the blocks byte for byte", stream_name)
        });
    }
    Ok(())
}

/// Compare the next window of `stream` against the whole of `block`.
fn windows_match(stream: &mut File, block: &mut File) -> Result<bool> {
    let mut block_buf = vec![0u8; 64 * 1024];
    let mut stream_buf = vec![0u8; 64 * 1024];
    loop {
        let n = block.read(&mut block_buf)?;
        if n == 0 {
            return Ok(true);
        }
        let mut filled = 0;
        while filled < n {
            let m = stream.read(&mut stream_buf[filled..n])?;
            if m == 0 {
                return Ok(false);
            }
            filled += m;
        }
        if block_buf[..n] != stream_buf[..n] {
            return Ok(false);
        }
    }
}

fn check_routing(
    dir: &Path,
    meta: &GridMeta,
    source_map: &[u32],
    target_map: &[u32],
    result: &mut ValidationResult,
) -> Result<()> {
    let edge_unit = meta.edge_unit();
    let cells: Vec<(usize, usize)> = (0..meta.partitions)
        .flat_map(|i| (0..meta.partitions).map(move |j| (i, j)))
        .collect();

    let misrouted: u64 = cells
        .par_iter()
        .map(|&(i, j)| -> Result<u64> {
            let mut block = File::open(blocks::block_path(dir, i, j))?;
            let mut buf = vec![0u8; edge_unit * 8192];
            let mut bad = 0u64;
            loop {
                let n = read_records(&mut block, &mut buf, edge_unit)?;
                if n == 0 {
                    break;
                }
                for record in buf[..n].chunks_exact(edge_unit) {
                    let src = vertex_at(record, 0) as usize;
                    let dst = vertex_at(record, VERTEX_BYTES) as usize;
                    if src >= source_map.len()
                        || dst >= target_map.len()
                        || source_map[src] as usize != i
                        || target_map[dst] as usize != j
                    {
                        bad += 1;
                    }
                }
            }
            Ok(bad)
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))?;

    result.check(misrouted == 0, || {
        format!("{} edges sit in the wrong grid cell", misrouted)
    });
    Ok(())
}

/// Fill `buf` with whole records; returns the byte count, a multiple of
/// `edge_unit` except possibly at a torn tail (caught by completeness).
fn read_records(file: &mut File, buf: &mut [u8], edge_unit: usize) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled - filled % edge_unit)
}
