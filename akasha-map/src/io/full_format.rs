//! Full `.ot` format: complete tree structure with log-odds values.
//!
//! Format:
//! - Header (48 bytes, see `header`), magic "AKOT"
//! - Node count: u64 (little-endian)
//! - Nodes in pre-order, 9 bytes each:
//!   - Log-odds: f64 (little-endian)
//!   - Child mask: u8 (bit i set if child i follows)
//!
//! Loading restores the tree exactly, inner values included.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::header::{read_header, write_header};
use crate::error::{MapIoError, Result};
use crate::octree::{OccupancyNode, OccupancyOctree};

/// Magic bytes for .ot format
const MAGIC: &[u8; 4] = b"AKOT";

/// Current format version
const VERSION: u8 = 1;

/// Bytes per serialized node
const NODE_SIZE: usize = 9;

/// Save a tree to .ot format
pub fn save_full(tree: &OccupancyOctree, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_full(tree, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a tree to a writer in .ot format
pub fn write_full<W: Write>(tree: &OccupancyOctree, writer: &mut W) -> Result<()> {
    write_header(writer, MAGIC, VERSION, tree)?;
    writer.write_all(&(tree.size() as u64).to_le_bytes())?;
    if let Some(root) = tree.root() {
        write_node(root, writer)?;
    }
    Ok(())
}

fn write_node<W: Write>(node: &OccupancyNode, writer: &mut W) -> Result<()> {
    let mut buf = [0u8; NODE_SIZE];
    buf[0..8].copy_from_slice(&node.log_odds().to_le_bytes());
    buf[8] = node.children().fold(0u8, |mask, (pos, _)| mask | (1 << pos));
    writer.write_all(&buf)?;
    for (_, child) in node.children() {
        write_node(child, writer)?;
    }
    Ok(())
}

/// Load a tree from .ot format
pub fn load_full(path: &Path) -> Result<OccupancyOctree> {
    let file = std::fs::File::open(path)?;
    read_full(&mut BufReader::new(file))
}

/// Read a tree from a reader in .ot format
pub fn read_full<R: Read>(reader: &mut R) -> Result<OccupancyOctree> {
    let mut tree = read_header(reader, MAGIC, VERSION)?;

    let mut count = [0u8; 8];
    reader.read_exact(&mut count)?;
    let mut remaining = u64::from_le_bytes(count);

    if remaining > 0 {
        let root = read_node(reader, 0, tree.max_depth(), &mut remaining)?;
        tree.set_root(Some(root));
    }
    if remaining != 0 {
        return Err(MapIoError::InvalidFormat(format!(
            "{} nodes declared but not present",
            remaining
        )));
    }
    Ok(tree)
}

fn read_node<R: Read>(
    reader: &mut R,
    depth: u8,
    max_depth: u8,
    remaining: &mut u64,
) -> Result<OccupancyNode> {
    if *remaining == 0 {
        return Err(MapIoError::InvalidFormat(
            "More nodes than declared".to_string(),
        ));
    }
    *remaining -= 1;

    let mut buf = [0u8; NODE_SIZE];
    reader.read_exact(&mut buf)?;
    let mut value = [0u8; 8];
    value.copy_from_slice(&buf[0..8]);
    let log_odds = f64::from_le_bytes(value);
    let mask = buf[8];

    if !log_odds.is_finite() {
        return Err(MapIoError::InvalidFormat(format!(
            "Non-finite node value at depth {}",
            depth
        )));
    }
    if mask != 0 && depth >= max_depth {
        return Err(MapIoError::InvalidFormat(format!(
            "Node at depth {} has children",
            depth
        )));
    }

    let mut node = OccupancyNode::new(log_odds);
    for pos in 0..8 {
        if mask & (1 << pos) != 0 {
            let child = read_node(reader, depth + 1, max_depth, remaining)?;
            node.set_child(pos, child);
        }
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point3;
    use crate::octree::SensorModel;
    use std::io::Cursor;

    fn sample_tree() -> OccupancyOctree {
        let mut tree = OccupancyOctree::new(0.05, 16, SensorModel::default());
        for i in 0..20 {
            let p = Point3::new(i as f64 * 0.07, -0.3, 0.1 * (i % 3) as f64);
            tree.update_coord(p, i % 2 == 0);
        }
        tree
    }

    #[test]
    fn test_round_trip_exact() {
        let tree = sample_tree();
        let mut buffer = Vec::new();
        write_full(&tree, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 48 + 8 + tree.size() * NODE_SIZE);

        let loaded = read_full(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(loaded, tree);
    }

    #[test]
    fn test_empty_tree() {
        let tree = OccupancyOctree::with_resolution(0.1);
        let mut buffer = Vec::new();
        write_full(&tree, &mut buffer).unwrap();
        let loaded = read_full(&mut Cursor::new(buffer)).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.resolution(), 0.1);
    }

    #[test]
    fn test_invalid_magic() {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(b"AKBT");
        let result = read_full(&mut Cursor::new(data));
        assert!(matches!(result, Err(MapIoError::InvalidFormat(_))));
    }

    #[test]
    fn test_version_mismatch() {
        let mut buffer = Vec::new();
        write_full(&sample_tree(), &mut buffer).unwrap();
        buffer[4] = 99;
        let result = read_full(&mut Cursor::new(buffer));
        assert!(matches!(
            result,
            Err(MapIoError::VersionMismatch {
                expected: 1,
                found: 99
            })
        ));
    }

    #[test]
    fn test_truncated_body() {
        let mut buffer = Vec::new();
        write_full(&sample_tree(), &mut buffer).unwrap();
        buffer.truncate(buffer.len() - 3);
        assert!(read_full(&mut Cursor::new(buffer)).is_err());
    }
}
