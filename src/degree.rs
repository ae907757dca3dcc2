//! Pass 1: streaming degree scan.
//!
//! The reader streams the edge file through the buffer ring while a pool of
//! workers parses records and bumps per-vertex atomic counters. Increments
//! use `Relaxed` ordering; the arrays are only read after every worker has
//! joined. Edges with an endpoint at or beyond the vertex count contribute
//! to no counter, and Pass 2 drops the same edges, so the degree sums match
//! the bytes that later reach the grid.

use std::fs::File;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use anyhow::{ensure, Context, Result};
use crossbeam::channel::{bounded, Receiver};

use crate::config::{EdgeType, GridConfig, Hardware, IO_SIZE, VERTEX_BYTES};
use crate::formats::blocks::vertex_at;
use crate::formats::degrees;
use crate::progress;
use crate::ring::{run_reader, BufferRing, Task};

/// Outcome of the degree scan.
pub struct DegreePass {
    pub out_degree: Vec<u32>,
    pub in_degree: Vec<u32>,
    /// `file_size / edge_unit`; counts out-of-range edges too.
    pub total_edges: u64,
}

/// Scan the edge file once, accumulate both degree arrays, and persist them
/// into the output directory.
pub fn run(config: &GridConfig, hw: &Hardware) -> Result<DegreePass> {
    println!("Pass 1/2: scanning degrees...");

    let mut input = File::open(&config.input)
        .with_context(|| format!("failed to open {}", config.input.display()))?;
    let file_len = input.metadata()?.len();
    let edge_unit = config.edge_type.edge_unit();
    ensure!(
        file_len % edge_unit as u64 == 0,
        "input size {} is not a multiple of the {}-byte edge record",
        file_len,
        edge_unit
    );
    let total_edges = file_len / edge_unit as u64;

    let vertices = config.vertices as usize;
    let out_degree: Vec<AtomicU32> = (0..vertices).map(|_| AtomicU32::new(0)).collect();
    let in_degree: Vec<AtomicU32> = (0..vertices).map(|_| AtomicU32::new(0)).collect();

    let ring = BufferRing::new(hw.parallelism * 2, IO_SIZE, hw.page_size)?;
    let (tx, rx) = bounded::<Task>(hw.parallelism);
    let bar = progress::bytes_bar(file_len);

    let read_bytes = thread::scope(|s| -> Result<u64> {
        let mut workers = Vec::with_capacity(hw.parallelism);
        for _ in 0..hw.parallelism {
            let rx = rx.clone();
            let ring = &ring;
            let out_degree = out_degree.as_slice();
            let in_degree = in_degree.as_slice();
            let edge_type = config.edge_type;
            let vertices = config.vertices;
            workers.push(s.spawn(move || {
                scan_worker(ring, rx, edge_type, vertices, out_degree, in_degree)
            }));
        }
        drop(rx);

        let read_bytes = run_reader(&mut input, &ring, &tx, hw.parallelism, &bar)?;
        drop(tx);
        for worker in workers {
            worker.join().expect("degree worker panicked");
        }
        Ok(read_bytes)
    })?;
    bar.finish_and_clear();
    ensure!(
        read_bytes == file_len,
        "read {} of {} input bytes",
        read_bytes,
        file_len
    );

    let out_degree: Vec<u32> = out_degree.into_iter().map(AtomicU32::into_inner).collect();
    let in_degree: Vec<u32> = in_degree.into_iter().map(AtomicU32::into_inner).collect();

    degrees::write(config.outdir.join(degrees::OUT_DEGREE_FILE), &out_degree)?;
    degrees::write(config.outdir.join(degrees::IN_DEGREE_FILE), &in_degree)?;

    println!(
        "  ✓ {} vertices, {} edges, degree files written",
        config.vertices, total_edges
    );

    Ok(DegreePass {
        out_degree,
        in_degree,
        total_edges,
    })
}

fn scan_worker(
    ring: &BufferRing,
    tasks: Receiver<Task>,
    edge_type: EdgeType,
    vertices: u32,
    out_degree: &[AtomicU32],
    in_degree: &[AtomicU32],
) {
    let edge_unit = edge_type.edge_unit();
    for task in tasks.iter() {
        let (slot, len) = match task {
            Task::Shutdown => break,
            Task::Fill { slot, len } => (slot, len),
        };
        let view = ring.view(slot, len);
        for record in view.chunks_exact(edge_unit) {
            let src = vertex_at(record, 0);
            let dst = vertex_at(record, VERTEX_BYTES);
            if src < vertices && dst < vertices {
                out_degree[src as usize].fetch_add(1, Ordering::Relaxed);
                in_degree[dst as usize].fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
