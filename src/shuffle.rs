//! Pass 2: shuffle edges into the P×P grid of block files.
//!
//! Each worker turns one input buffer into per-cell runs with a three-step
//! bucket sort: a histogram of bytes per cell, an exclusive prefix scan,
//! and a scatter into a worker-local buffer. The runs are then appended to
//! the cell files under per-cell locks. A run of exactly one record goes
//! through the cell's small coalesce buffer instead of its own `write`,
//! which keeps the syscall count sane for sparse cells.
//!
//! Edges with an endpoint outside the vertex range are dropped here exactly
//! as in Pass 1; they would otherwise index the partition maps out of
//! bounds.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::thread;

use anyhow::{ensure, Context, Result};
use crossbeam::channel::{bounded, Receiver};

use crate::config::{EdgeType, GridConfig, Hardware, GRID_BUFFER_SIZE, IO_SIZE, VERTEX_BYTES};
use crate::formats::blocks::{self, vertex_at};
use crate::progress;
use crate::ring::{run_reader, BufferRing, Task};

/// One grid cell: an append-only block file plus its coalesce buffer.
struct Cell {
    file: File,
    stage: Box<[u8]>,
    used: usize,
}

/// P×P grid of cells, each behind its own lock so writers to different
/// cells never contend.
pub(crate) struct GridCells {
    cells: Vec<Mutex<Cell>>,
    partitions: usize,
}

impl GridCells {
    pub(crate) fn create(outdir: &Path, partitions: usize) -> Result<Self> {
        let mut cells = Vec::with_capacity(partitions * partitions);
        for i in 0..partitions {
            for j in 0..partitions {
                let file = blocks::open_append(outdir, i, j)?;
                cells.push(Mutex::new(Cell {
                    file,
                    stage: vec![0u8; GRID_BUFFER_SIZE].into_boxed_slice(),
                    used: 0,
                }));
            }
        }
        Ok(Self { cells, partitions })
    }

    /// Append one cell's run from a worker's scatter buffer. A run longer
    /// than one record is written straight through; a single record is
    /// staged in the coalesce buffer, which is flushed whenever it fills.
    pub(crate) fn append(&self, cell_index: usize, run: &[u8], edge_unit: usize) -> io::Result<()> {
        let mut guard = self.cells[cell_index].lock().unwrap();
        let cell = &mut *guard;
        if run.len() > edge_unit {
            cell.file.write_all(run)?;
        } else {
            cell.stage[cell.used..cell.used + edge_unit].copy_from_slice(run);
            cell.used += edge_unit;
            if cell.used == cell.stage.len() {
                cell.file.write_all(&cell.stage)?;
                cell.used = 0;
            }
        }
        Ok(())
    }

    /// Flush every non-empty coalesce buffer. Called after the workers have
    /// joined; returns the number of tail bytes written.
    pub(crate) fn flush(&self) -> io::Result<u64> {
        let mut flushed = 0u64;
        for slot in &self.cells {
            let mut guard = slot.lock().unwrap();
            let cell = &mut *guard;
            if cell.used > 0 {
                cell.file.write_all(&cell.stage[..cell.used])?;
                flushed += cell.used as u64;
                cell.used = 0;
            }
        }
        Ok(flushed)
    }

    pub(crate) fn partitions(&self) -> usize {
        self.partitions
    }
}

/// Shuffle the edge file into `partitions × partitions` block files using
/// the partition maps produced by Pass 1.
pub fn run(
    config: &GridConfig,
    hw: &Hardware,
    source_map: &[u32],
    target_map: &[u32],
) -> Result<()> {
    println!("Pass 2/2: shuffling edges into the grid...");

    let mut input = File::open(&config.input)
        .with_context(|| format!("failed to open {}", config.input.display()))?;
    let file_len = input.metadata()?.len();

    let grid = GridCells::create(&config.outdir, config.partitions)?;
    let ring = BufferRing::new(hw.parallelism * 2, IO_SIZE, hw.page_size)?;
    let (tx, rx) = bounded::<Task>(hw.parallelism);
    let bar = progress::bytes_bar(file_len);

    thread::scope(|s| -> Result<()> {
        let mut workers = Vec::with_capacity(hw.parallelism);
        for _ in 0..hw.parallelism {
            let rx = rx.clone();
            let ring = &ring;
            let grid = &grid;
            let edge_type = config.edge_type;
            let vertices = config.vertices;
            workers.push(s.spawn(move || {
                shuffle_worker(ring, rx, grid, edge_type, vertices, source_map, target_map)
            }));
        }
        drop(rx);

        let read_bytes = run_reader(&mut input, &ring, &tx, hw.parallelism, &bar)?;
        drop(tx);
        ensure!(
            read_bytes == file_len,
            "read {} of {} input bytes",
            read_bytes,
            file_len
        );
        for worker in workers {
            worker.join().expect("shuffle worker panicked")?;
        }
        Ok(())
    })?;
    bar.finish_and_clear();

    grid.flush().context("failed to flush coalesce buffers")?;
    let cell_count = grid.partitions() * grid.partitions();
    drop(grid); // close the block files before concatenation reopens them

    println!("  ✓ {} block files written", cell_count);
    Ok(())
}

fn shuffle_worker(
    ring: &BufferRing,
    tasks: Receiver<Task>,
    grid: &GridCells,
    edge_type: EdgeType,
    vertices: u32,
    source_map: &[u32],
    target_map: &[u32],
) -> Result<()> {
    let edge_unit = edge_type.edge_unit();
    let partitions = grid.partitions();
    let cell_count = partitions * partitions;

    let mut scatter = vec![0u8; IO_SIZE];
    let mut counts = vec![0usize; cell_count];
    let mut cursors = vec![0usize; cell_count];

    for task in tasks.iter() {
        let (slot, len) = match task {
            Task::Shutdown => break,
            Task::Fill { slot, len } => (slot, len),
        };
        let view = ring.view(slot, len);

        // Histogram: bytes each cell will receive from this buffer.
        counts.fill(0);
        for record in view.chunks_exact(edge_unit) {
            let src = vertex_at(record, 0);
            let dst = vertex_at(record, VERTEX_BYTES);
            if src < vertices && dst < vertices {
                let cell = cell_index(source_map, target_map, src, dst, partitions);
                counts[cell] += edge_unit;
            }
        }

        // Exclusive prefix scan into the scatter cursors.
        let mut offset = 0usize;
        for cell in 0..cell_count {
            cursors[cell] = offset;
            offset += counts[cell];
        }
        let valid_bytes = offset;

        // Scatter records into contiguous per-cell runs.
        for record in view.chunks_exact(edge_unit) {
            let src = vertex_at(record, 0);
            let dst = vertex_at(record, VERTEX_BYTES);
            if src < vertices && dst < vertices {
                let cell = cell_index(source_map, target_map, src, dst, partitions);
                scatter[cursors[cell]..cursors[cell] + edge_unit].copy_from_slice(record);
                cursors[cell] += edge_unit;
            }
        }

        // Emit each run; after the scatter every cursor sits at the end of
        // its cell's run.
        let mut start = 0usize;
        for cell in 0..cell_count {
            let end = start + counts[cell];
            assert_eq!(cursors[cell], end, "scatter cursor out of step");
            if counts[cell] > 0 {
                grid.append(cell, &scatter[start..end], edge_unit)
                    .context("append to block file failed")?;
            }
            start = end;
        }
        assert_eq!(start, valid_bytes, "emitted bytes out of step");
    }
    Ok(())
}

#[inline]
fn cell_index(source_map: &[u32], target_map: &[u32], src: u32, dst: u32, partitions: usize) -> usize {
    source_map[src as usize] as usize * partitions + target_map[dst as usize] as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single-record appends must stage through the coalesce buffer and
    /// flush exactly when it fills.
    #[test]
    fn coalesce_buffer_flushes_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let grid = GridCells::create(dir.path(), 1).unwrap();
        let edge_unit = 8;
        let record = [7u8; 8];
        let per_buffer = GRID_BUFFER_SIZE / edge_unit;

        for n in 1..per_buffer {
            grid.append(0, &record, edge_unit).unwrap();
            assert_eq!(
                blocks::block_len(dir.path(), 0, 0).unwrap(),
                0,
                "premature flush after {} records",
                n
            );
        }
        grid.append(0, &record, edge_unit).unwrap();
        assert_eq!(
            blocks::block_len(dir.path(), 0, 0).unwrap(),
            GRID_BUFFER_SIZE as u64
        );
    }

    #[test]
    fn final_flush_drains_partial_stage() {
        let dir = tempfile::tempdir().unwrap();
        let grid = GridCells::create(dir.path(), 1).unwrap();
        let record = [1u8; 8];

        grid.append(0, &record, 8).unwrap();
        grid.append(0, &record, 8).unwrap();
        assert_eq!(blocks::block_len(dir.path(), 0, 0).unwrap(), 0);

        let flushed = grid.flush().unwrap();
        assert_eq!(flushed, 16);
        assert_eq!(blocks::block_len(dir.path(), 0, 0).unwrap(), 16);

        // A second flush is a no-op.
        assert_eq!(grid.flush().unwrap(), 0);
    }

    #[test]
    fn long_runs_bypass_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let grid = GridCells::create(dir.path(), 2).unwrap();
        let run = [2u8; 24];

        grid.append(3, &run, 8).unwrap();
        assert_eq!(blocks::block_len(dir.path(), 1, 1).unwrap(), 24);
        assert_eq!(grid.flush().unwrap(), 0);
    }
}
