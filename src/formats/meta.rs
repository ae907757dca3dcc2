//! Grid metadata file - `meta`
//!
//! Format: a single ASCII line `"<edge_type> <vertices> <edges> <partitions>"`.
//! The edge count is the raw record count of the input file
//! (`file_size / edge_unit`), including edges whose endpoints were out of
//! range and therefore never reached a block.

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};

use crate::config::EdgeType;

pub const META_FILE: &str = "meta";

/// The four facts a grid consumer needs before touching any other file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMeta {
    pub edge_type: EdgeType,
    pub vertices: u32,
    pub edges: u64,
    pub partitions: usize,
}

impl GridMeta {
    pub fn edge_unit(&self) -> usize {
        self.edge_type.edge_unit()
    }
}

/// Write the metadata line into `dir`.
pub fn write(dir: &Path, meta: &GridMeta) -> Result<()> {
    let path = dir.join(META_FILE);
    let line = format!(
        "{} {} {} {}",
        meta.edge_type.code(),
        meta.vertices,
        meta.edges,
        meta.partitions
    );
    fs::write(&path, line).with_context(|| format!("failed to write {}", path.display()))
}

/// Read and parse the metadata line from `dir`.
pub fn read(dir: &Path) -> Result<GridMeta> {
    let path = dir.join(META_FILE);
    let line = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    ensure!(
        fields.len() == 4,
        "meta file {} has {} fields, expected 4",
        path.display(),
        fields.len()
    );

    let code: u8 = fields[0]
        .parse()
        .with_context(|| format!("bad edge type in {}", path.display()))?;
    let vertices: u32 = fields[1]
        .parse()
        .with_context(|| format!("bad vertex count in {}", path.display()))?;
    let edges: u64 = fields[2]
        .parse()
        .with_context(|| format!("bad edge count in {}", path.display()))?;
    let partitions: usize = fields[3]
        .parse()
        .with_context(|| format!("bad partition count in {}", path.display()))?;
    ensure!(partitions >= 1, "meta file {} has 0 partitions", path.display());

    Ok(GridMeta {
        edge_type: EdgeType::from_code(code)?,
        vertices,
        edges,
        partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let meta = GridMeta {
            edge_type: EdgeType::Weighted,
            vertices: 41_652_230,
            edges: 1_468_365_182,
            partitions: 40,
        };

        write(dir.path(), &meta).unwrap();
        let line = fs::read_to_string(dir.path().join(META_FILE)).unwrap();
        assert_eq!(line, "1 41652230 1468365182 40");
        assert_eq!(read(dir.path()).unwrap(), meta);
    }

    #[test]
    fn rejects_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(META_FILE), "0 4 5").unwrap();
        assert!(read(dir.path()).is_err());
    }
}
