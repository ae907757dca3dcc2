//! Degree array files - `out_degree_preprocess.data` / `in_degree_preprocess.data`
//!
//! Format: raw `V * 4` bytes, one host-endian u32 per vertex id, no header.
//! Downstream engines mmap these directly, which is why the byte order is
//! the host's rather than a fixed one; the files are not portable across
//! endian classes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{ensure, Context, Result};

pub const OUT_DEGREE_FILE: &str = "out_degree_preprocess.data";
pub const IN_DEGREE_FILE: &str = "in_degree_preprocess.data";

/// Write one degree array.
pub fn write<P: AsRef<Path>>(path: P, degrees: &[u32]) -> Result<()> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("failed to create {}", path.as_ref().display()))?;
    let mut writer = BufWriter::new(file);
    for &degree in degrees {
        writer.write_all(&degree.to_ne_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read one degree array; the vertex count is implied by the file length.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("failed to open {}", path.as_ref().display()))?;
    let len = file.metadata()?.len();
    ensure!(
        len % 4 == 0,
        "degree file {} has {} bytes, not a multiple of 4",
        path.as_ref().display(),
        len
    );

    let mut reader = BufReader::new(file);
    let mut degrees = Vec::with_capacity((len / 4) as usize);
    let mut bytes = [0u8; 4];
    for _ in 0..len / 4 {
        reader.read_exact(&mut bytes)?;
        degrees.push(u32::from_ne_bytes(bytes));
    }
    Ok(degrees)
}
