//! Concatenate the block files into the row-major and column-major streams,
//! write their offset indexes, and emit the metadata record.
//!
//! The block files themselves are left in place next to the aggregates;
//! consumers that want a single cell can still open it directly.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{GridConfig, IO_SIZE};
use crate::formats::meta::{self, GridMeta};
use crate::formats::offsets::{self, COLUMN_FILE, COLUMN_OFFSET_FILE, ROW_FILE, ROW_OFFSET_FILE};
use crate::formats::blocks;

#[derive(Clone, Copy)]
enum Orientation {
    Row,
    Column,
}

/// Build both aggregate streams and the `meta` record.
pub fn run(config: &GridConfig, total_edges: u64) -> Result<()> {
    println!("Concatenating blocks...");

    write_stream(&config.outdir, config.partitions, Orientation::Column)?;
    println!("  ✓ column stream");
    write_stream(&config.outdir, config.partitions, Orientation::Row)?;
    println!("  ✓ row stream");

    meta::write(
        &config.outdir,
        &GridMeta {
            edge_type: config.edge_type,
            vertices: config.vertices,
            edges: total_edges,
            partitions: config.partitions,
        },
    )?;
    println!("  ✓ meta");
    Ok(())
}

/// Append every block to one aggregate stream in the orientation's cell
/// order, recording the running byte offset before each block and the total
/// length at the end.
fn write_stream(dir: &Path, partitions: usize, orientation: Orientation) -> Result<()> {
    let (stream_name, offsets_name) = match orientation {
        Orientation::Row => (ROW_FILE, ROW_OFFSET_FILE),
        Orientation::Column => (COLUMN_FILE, COLUMN_OFFSET_FILE),
    };
    let stream = File::create(dir.join(stream_name))
        .with_context(|| format!("failed to create {}", stream_name))?;
    let mut writer = BufWriter::new(stream);

    let mut offsets = Vec::with_capacity(partitions * partitions + 1);
    let mut offset = 0i64;
    let mut buf = vec![0u8; IO_SIZE];
    for outer in 0..partitions {
        for inner in 0..partitions {
            let (i, j) = match orientation {
                Orientation::Row => (outer, inner),
                Orientation::Column => (inner, outer),
            };
            offsets.push(offset);
            offset += copy_block(dir, i, j, &mut writer, &mut buf)? as i64;
        }
    }
    offsets.push(offset);
    writer.flush()?;

    offsets::write(dir.join(offsets_name), &offsets)
}

fn copy_block(
    dir: &Path,
    i: usize,
    j: usize,
    writer: &mut BufWriter<File>,
    buf: &mut [u8],
) -> Result<u64> {
    let path = blocks::block_path(dir, i, j);
    let mut block = File::open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut copied = 0u64;
    loop {
        let n = block.read(buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}
