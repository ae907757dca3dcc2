//! Reusable page-aligned I/O buffers shared by one reader and a worker pool.
//!
//! The ring holds `2 * parallelism` fixed-size buffers. The reader fills a
//! free slot, marks it occupied, and hands the slot id to a worker over the
//! bounded task queue; the worker clears the flag once it has parsed the
//! buffer. The reader never touches an occupied slot, so access to any slot
//! is exclusive even though the pool itself is shared by reference. Because
//! buffers outnumber workers two to one, the reader's spin for a free slot
//! is bounded.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::Sender;
use indicatif::ProgressBar;

/// A unit of work handed from the reader to a worker.
pub enum Task {
    /// Parse the first `len` bytes of ring slot `slot`.
    Fill { slot: usize, len: usize },
    /// Drain signal; the reader pushes one per worker at EOF.
    Shutdown,
}

/// One page-aligned allocation of fixed length.
struct AlignedBuf {
    ptr: *mut u8,
    layout: Layout,
}

impl AlignedBuf {
    fn new(len: usize, align: usize) -> Result<Self> {
        let layout = Layout::from_size_align(len, align)
            .with_context(|| format!("invalid buffer layout ({} bytes, {}-aligned)", len, align))?;
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }
        Ok(Self { ptr, layout })
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}

unsafe impl Send for AlignedBuf {}

/// Fixed pool of aligned I/O buffers with per-slot occupancy flags.
pub struct BufferRing {
    buffers: Vec<AlignedBuf>,
    occupied: Vec<AtomicBool>,
    buf_len: usize,
}

// Slot exclusivity is enforced by the occupancy protocol: the reader only
// writes a slot while its flag is clear, and a worker only reads a slot
// while its flag is set.
unsafe impl Sync for BufferRing {}

impl BufferRing {
    pub fn new(slots: usize, buf_len: usize, align: usize) -> Result<Self> {
        let buffers = (0..slots)
            .map(|_| AlignedBuf::new(buf_len, align))
            .collect::<Result<Vec<_>>>()?;
        let occupied = (0..slots).map(|_| AtomicBool::new(false)).collect();
        Ok(Self { buffers, occupied, buf_len })
    }

    pub fn slots(&self) -> usize {
        self.buffers.len()
    }

    /// Exclusive view of a free slot for the reader to fill.
    ///
    /// # Safety
    /// The caller must be the single reader and `slot` must not be occupied.
    unsafe fn fill_slot(&self, slot: usize) -> &mut [u8] {
        debug_assert!(!self.occupied[slot].load(Ordering::Relaxed));
        slice::from_raw_parts_mut(self.buffers[slot].ptr, self.buf_len)
    }

    /// Shared view of the first `len` bytes of an occupied slot. The slot is
    /// released when the view is dropped.
    pub fn view(&self, slot: usize, len: usize) -> SlotView<'_> {
        debug_assert!(self.occupied[slot].load(Ordering::Relaxed));
        debug_assert!(len <= self.buf_len);
        SlotView { ring: self, slot, len }
    }

    fn mark_occupied(&self, slot: usize) {
        self.occupied[slot].store(true, Ordering::Release);
    }

    fn release(&self, slot: usize) {
        self.occupied[slot].store(false, Ordering::Release);
    }

    /// Advance past occupied slots to the next free one, spinning if every
    /// candidate is still being parsed.
    fn next_free(&self, mut cursor: usize) -> usize {
        loop {
            cursor = (cursor + 1) % self.slots();
            if !self.occupied[cursor].load(Ordering::Acquire) {
                return cursor;
            }
            std::hint::spin_loop();
        }
    }
}

/// Borrowed slice of an occupied ring slot; releases the slot on drop.
pub struct SlotView<'a> {
    ring: &'a BufferRing,
    slot: usize,
    len: usize,
}

impl Deref for SlotView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ring.buffers[self.slot].ptr, self.len) }
    }
}

impl Drop for SlotView<'_> {
    fn drop(&mut self) {
        self.ring.release(self.slot);
    }
}

/// Stream `input` through the ring in full-buffer chunks, pushing one task
/// per filled slot and one `Shutdown` per worker at EOF. Runs on the calling
/// thread and returns the total bytes dispatched.
pub fn run_reader(
    input: &mut File,
    ring: &BufferRing,
    tasks: &Sender<Task>,
    workers: usize,
    progress: &ProgressBar,
) -> Result<u64> {
    let mut cursor = 0usize;
    let mut read_bytes = 0u64;
    loop {
        // The slot at `cursor` is free: either fresh, or skipped over below.
        let buf = unsafe { ring.fill_slot(cursor) };
        let filled = read_full(input, buf).context("read from edge file failed")?;
        if filled == 0 {
            break;
        }
        ring.mark_occupied(cursor);
        tasks
            .send(Task::Fill { slot: cursor, len: filled })
            .map_err(|_| anyhow!("all workers exited before end of input"))?;
        read_bytes += filled as u64;
        progress.inc(filled as u64);
        if filled < ring.buf_len {
            // Short fill means EOF.
            break;
        }
        cursor = ring.next_free(cursor);
    }
    for _ in 0..workers {
        tasks
            .send(Task::Shutdown)
            .map_err(|_| anyhow!("worker exited before shutdown signal"))?;
    }
    Ok(read_bytes)
}

/// Read until `buf` is full or the file ends. Guarantees that every chunk
/// except the last is exactly buffer-sized, which keeps chunk boundaries on
/// edge record boundaries.
fn read_full(input: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = input.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use std::io::{Seek, SeekFrom, Write};
    use std::thread;

    #[test]
    fn reader_streams_whole_file_through_small_ring() {
        let mut input = tempfile::tempfile().unwrap();
        let payload: Vec<u8> = (0..100u8).collect();
        input.write_all(&payload).unwrap();
        input.seek(SeekFrom::Start(0)).unwrap();

        let ring = BufferRing::new(4, 16, 16).unwrap();
        let (tx, rx) = bounded::<Task>(2);
        let bar = ProgressBar::hidden();

        let collected = thread::scope(|s| {
            let ring = &ring;
            let consumer = s.spawn(move || {
                let mut bytes = Vec::new();
                for task in rx.iter() {
                    match task {
                        Task::Shutdown => break,
                        Task::Fill { slot, len } => {
                            let view = ring.view(slot, len);
                            bytes.extend_from_slice(&view);
                        }
                    }
                }
                bytes
            });
            let read = run_reader(&mut input, ring, &tx, 1, &bar).unwrap();
            assert_eq!(read, 100);
            consumer.join().unwrap()
        });

        // Single consumer and a FIFO queue: concatenation reproduces the file.
        assert_eq!(collected, payload);
    }

    #[test]
    fn slot_view_releases_on_drop() {
        let ring = BufferRing::new(2, 8, 8).unwrap();
        ring.mark_occupied(0);
        {
            let _view = ring.view(0, 8);
        }
        assert!(!ring.occupied[0].load(Ordering::Acquire));
        assert_eq!(ring.next_free(0), 1);
    }
}
