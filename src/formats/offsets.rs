//! Offset index files - `row_offset` / `column_offset`
//!
//! Format: `P * P + 1` native-width signed 64-bit byte offsets, host-endian.
//! Offset `k` is where the k-th block starts inside the companion stream
//! file; the final entry is the stream's total length, so consecutive
//! entries bound each block's byte range. Consumers mmap these next to the
//! stream files, hence the host byte order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{ensure, Context, Result};

pub const ROW_FILE: &str = "row";
pub const ROW_OFFSET_FILE: &str = "row_offset";
pub const COLUMN_FILE: &str = "column";
pub const COLUMN_OFFSET_FILE: &str = "column_offset";

/// Write a complete offset index.
pub fn write<P: AsRef<Path>>(path: P, offsets: &[i64]) -> Result<()> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("failed to create {}", path.as_ref().display()))?;
    let mut writer = BufWriter::new(file);
    for &offset in offsets {
        writer.write_all(&offset.to_ne_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read an offset index back; the entry count is implied by the length.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<i64>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("failed to open {}", path.as_ref().display()))?;
    let len = file.metadata()?.len();
    ensure!(
        len % 8 == 0,
        "offset file {} has {} bytes, not a multiple of 8",
        path.as_ref().display(),
        len
    );

    let mut reader = BufReader::new(file);
    let mut offsets = Vec::with_capacity((len / 8) as usize);
    let mut bytes = [0u8; 8];
    for _ in 0..len / 8 {
        reader.read_exact(&mut bytes)?;
        offsets.push(i64::from_ne_bytes(bytes));
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ROW_OFFSET_FILE);
        let offsets = vec![0, 8, 8, 8, 16];

        write(&path, &offsets).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 40);
        assert_eq!(read(&path).unwrap(), offsets);
    }
}
