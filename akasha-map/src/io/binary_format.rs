//! Compact `.bt` format: maximum-likelihood occupancy only.
//!
//! Format:
//! - Header (48 bytes, see `header`), magic "AKBT"
//! - Root flag: u8 (0 = empty, 1 = inner, 2 = occupied leaf, 3 = free leaf)
//! - For every inner node in pre-order: u16 (little-endian) with two bits
//!   per child, child i at bits `2i..2i+2`:
//!
//! ```text
//!   00  absent (unknown)
//!   01  occupied leaf
//!   10  free leaf
//!   11  inner node (its own u16 follows later in pre-order)
//! ```
//!
//! Values are not stored. On load, occupied leaves get the clamp-max
//! log-odds and free leaves the clamp-min log-odds.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::header::{read_header, write_header};
use crate::error::{MapIoError, Result};
use crate::octree::{OccupancyNode, OccupancyOctree};

/// Magic bytes for .bt format
const MAGIC: &[u8; 4] = b"AKBT";

/// Current format version
const VERSION: u8 = 1;

const ROOT_EMPTY: u8 = 0;
const ROOT_INNER: u8 = 1;
const ROOT_OCCUPIED: u8 = 2;
const ROOT_FREE: u8 = 3;

const CHILD_ABSENT: u16 = 0b00;
const CHILD_OCCUPIED: u16 = 0b01;
const CHILD_FREE: u16 = 0b10;
const CHILD_INNER: u16 = 0b11;

/// Save a tree to .bt format
pub fn save_binary(tree: &OccupancyOctree, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_binary(tree, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a tree to a writer in .bt format
pub fn write_binary<W: Write>(tree: &OccupancyOctree, writer: &mut W) -> Result<()> {
    write_header(writer, MAGIC, VERSION, tree)?;
    match tree.root() {
        None => writer.write_all(&[ROOT_EMPTY])?,
        Some(root) if root.is_leaf() => {
            let flag = if root.is_occupied() {
                ROOT_OCCUPIED
            } else {
                ROOT_FREE
            };
            writer.write_all(&[flag])?;
        }
        Some(root) => {
            writer.write_all(&[ROOT_INNER])?;
            write_inner(root, writer)?;
        }
    }
    Ok(())
}

fn child_code(node: &OccupancyNode) -> u16 {
    if node.has_children() {
        CHILD_INNER
    } else if node.is_occupied() {
        CHILD_OCCUPIED
    } else {
        CHILD_FREE
    }
}

fn write_inner<W: Write>(node: &OccupancyNode, writer: &mut W) -> Result<()> {
    let bits = node
        .children()
        .fold(0u16, |bits, (pos, child)| bits | (child_code(child) << (2 * pos)));
    writer.write_all(&bits.to_le_bytes())?;
    for (_, child) in node.children() {
        if child.has_children() {
            write_inner(child, writer)?;
        }
    }
    Ok(())
}

/// Load a tree from .bt format
pub fn load_binary(path: &Path) -> Result<OccupancyOctree> {
    let file = std::fs::File::open(path)?;
    read_binary(&mut BufReader::new(file))
}

/// Read a tree from a reader in .bt format
pub fn read_binary<R: Read>(reader: &mut R) -> Result<OccupancyOctree> {
    let mut tree = read_header(reader, MAGIC, VERSION)?;
    let occupied = tree.sensor_model().clamp_max_log_odds();
    let free = tree.sensor_model().clamp_min_log_odds();

    let mut flag = [0u8; 1];
    reader.read_exact(&mut flag)?;
    let root = match flag[0] {
        ROOT_EMPTY => None,
        ROOT_OCCUPIED => Some(OccupancyNode::new(occupied)),
        ROOT_FREE => Some(OccupancyNode::new(free)),
        ROOT_INNER => {
            let mut root = OccupancyNode::new(0.0);
            read_inner(reader, &mut root, 0, tree.max_depth(), (occupied, free))?;
            Some(root)
        }
        other => {
            return Err(MapIoError::InvalidFormat(format!(
                "Invalid root flag {}",
                other
            )));
        }
    };
    tree.set_root(root);
    tree.update_inner_occupancy();
    Ok(tree)
}

fn read_inner<R: Read>(
    reader: &mut R,
    node: &mut OccupancyNode,
    depth: u8,
    max_depth: u8,
    values: (f64, f64),
) -> Result<()> {
    if depth >= max_depth {
        return Err(MapIoError::InvalidFormat(format!(
            "Inner node at depth {}",
            depth
        )));
    }
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    let bits = u16::from_le_bytes(buf);
    if bits == 0 {
        return Err(MapIoError::InvalidFormat(format!(
            "Inner node without children at depth {}",
            depth
        )));
    }

    let (occupied, free) = values;
    let mut inner = Vec::new();
    for pos in 0..8 {
        match (bits >> (2 * pos)) & 0b11 {
            CHILD_ABSENT => {}
            CHILD_OCCUPIED => node.set_child(pos, OccupancyNode::new(occupied)),
            CHILD_FREE => node.set_child(pos, OccupancyNode::new(free)),
            _ => {
                node.set_child(pos, OccupancyNode::new(0.0));
                inner.push(pos);
            }
        }
    }
    for pos in inner {
        if let Some(child) = node.child_mut(pos) {
            read_inner(reader, child, depth + 1, max_depth, values)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point3;
    use crate::octree::SensorModel;
    use std::io::Cursor;

    #[test]
    fn test_round_trip_preserves_occupancy() {
        let mut tree = OccupancyOctree::new(0.1, 16, SensorModel::default());
        let hits = [Point3::new(0.05, 0.05, 0.05), Point3::new(1.25, -0.35, 0.45)];
        let misses = [Point3::new(0.55, 0.05, 0.05), Point3::new(-2.0, 1.0, 0.0)];
        for p in hits {
            tree.update_coord(p, true);
        }
        for p in misses {
            tree.update_coord(p, false);
        }

        let mut buffer = Vec::new();
        write_binary(&tree, &mut buffer).unwrap();
        let loaded = read_binary(&mut Cursor::new(buffer)).unwrap();

        assert_eq!(loaded.leaf_count(), tree.leaf_count());
        let max = loaded.sensor_model().clamp_max_log_odds();
        let min = loaded.sensor_model().clamp_min_log_odds();
        for p in hits {
            assert_eq!(loaded.search(p).unwrap().log_odds(), max);
        }
        for p in misses {
            assert_eq!(loaded.search(p).unwrap().log_odds(), min);
        }
        assert!(loaded.root().unwrap().is_occupied());
    }

    #[test]
    fn test_single_leaf_root() {
        let mut tree = OccupancyOctree::new(1.0, 2, SensorModel::default());
        tree.set_node_value(Default::default(), -1.0, 0);
        let mut buffer = Vec::new();
        write_binary(&tree, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 49);
        let loaded = read_binary(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(loaded.leaf_count(), 1);
        assert!(!loaded.root().unwrap().is_occupied());
    }

    #[test]
    fn test_invalid_root_flag() {
        let tree = OccupancyOctree::with_resolution(0.1);
        let mut buffer = Vec::new();
        write_binary(&tree, &mut buffer).unwrap();
        buffer[48] = 9;
        assert!(matches!(
            read_binary(&mut Cursor::new(buffer)),
            Err(MapIoError::InvalidFormat(_))
        ));
    }
}
