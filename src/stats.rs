//! Block distribution report over a generated grid.
//!
//! Quantifies how well the degree-balanced partitioning spread the edges:
//! block occupancy, deviation from the ideal uniform distribution, and the
//! heaviest cell.

use std::path::Path;

use anyhow::Result;

use crate::formats::{blocks, meta};

pub struct BlockStats {
    pub partitions: usize,
    pub total_blocks: usize,
    pub non_empty_blocks: usize,
    /// Edges actually present across all blocks.
    pub grid_edges: u64,
    /// `grid_edges / total_blocks`.
    pub ideal_edges_per_block: f64,
    pub mean_abs_deviation: f64,
    pub max_block_edges: u64,
    pub max_block: (usize, usize),
}

/// Scan every block file of the grid in `dir`.
pub fn collect(dir: &Path) -> Result<BlockStats> {
    let meta = meta::read(dir)?;
    let edge_unit = meta.edge_unit() as u64;
    let total_blocks = meta.partitions * meta.partitions;

    let mut edges_per_block = Vec::with_capacity(total_blocks);
    let mut max_block = (0, 0);
    let mut max_block_edges = 0u64;
    for i in 0..meta.partitions {
        for j in 0..meta.partitions {
            let edges = blocks::block_len(dir, i, j)? / edge_unit;
            if edges > max_block_edges {
                max_block_edges = edges;
                max_block = (i, j);
            }
            edges_per_block.push(edges);
        }
    }

    let grid_edges: u64 = edges_per_block.iter().sum();
    let ideal = grid_edges as f64 / total_blocks as f64;
    let mean_abs_deviation = edges_per_block
        .iter()
        .map(|&edges| (edges as f64 - ideal).abs())
        .sum::<f64>()
        / total_blocks as f64;

    Ok(BlockStats {
        partitions: meta.partitions,
        total_blocks,
        non_empty_blocks: edges_per_block.iter().filter(|&&e| e > 0).count(),
        grid_edges,
        ideal_edges_per_block: ideal,
        mean_abs_deviation,
        max_block_edges,
        max_block,
    })
}

/// Print the report the way `validate` prints its summary.
pub fn print(stats: &BlockStats) {
    println!("Grid: {p} x {p} = {} blocks", stats.total_blocks, p = stats.partitions);
    println!(
        "  non-empty blocks:  {} ({:.1}%)",
        stats.non_empty_blocks,
        100.0 * stats.non_empty_blocks as f64 / stats.total_blocks as f64
    );
    println!("  edges in grid:     {}", stats.grid_edges);
    println!("  ideal edges/block: {:.1}", stats.ideal_edges_per_block);
    println!("  mean |deviation|:  {:.1}", stats.mean_abs_deviation);
    println!(
        "  heaviest block:    block-{}-{} ({} edges)",
        stats.max_block.0, stats.max_block.1, stats.max_block_edges
    );
}
