//! Header shared by the `.ot` and `.bt` formats.
//!
//! Layout (48 bytes, little-endian):
//! - Magic: 4 bytes ("AKOT" or "AKBT")
//! - Version: u8
//! - Max depth: u8
//! - Reserved: 2 bytes
//! - Resolution: f64
//! - Prob hit, prob miss, clamp min, clamp max: 4 x f64

use std::io::{Read, Write};

use crate::error::{MapIoError, Result};
use crate::octree::{MAX_TREE_DEPTH, OccupancyOctree, SensorModel};

/// Header size in bytes
pub(crate) const HEADER_SIZE: usize = 48;

fn f64_at(buf: &[u8], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}

/// Write the header describing `tree`.
pub(crate) fn write_header<W: Write>(
    writer: &mut W,
    magic: &[u8; 4],
    version: u8,
    tree: &OccupancyOctree,
) -> Result<()> {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(magic);
    header[4] = version;
    header[5] = tree.max_depth();
    // 6..8 reserved

    let model = tree.sensor_model();
    header[8..16].copy_from_slice(&tree.resolution().to_le_bytes());
    header[16..24].copy_from_slice(&model.prob_hit.to_le_bytes());
    header[24..32].copy_from_slice(&model.prob_miss.to_le_bytes());
    header[32..40].copy_from_slice(&model.clamp_min.to_le_bytes());
    header[40..48].copy_from_slice(&model.clamp_max.to_le_bytes());

    writer.write_all(&header)?;
    Ok(())
}

/// Read and validate a header, returning an empty tree with its parameters.
pub(crate) fn read_header<R: Read>(
    reader: &mut R,
    magic: &[u8; 4],
    version: u8,
) -> Result<OccupancyOctree> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    if &header[0..4] != magic {
        return Err(MapIoError::InvalidFormat(format!(
            "Invalid magic bytes, expected {:?}",
            String::from_utf8_lossy(magic)
        )));
    }

    if header[4] != version {
        return Err(MapIoError::VersionMismatch {
            expected: version,
            found: header[4],
        });
    }

    let max_depth = header[5];
    if max_depth == 0 || max_depth > MAX_TREE_DEPTH {
        return Err(MapIoError::InvalidFormat(format!(
            "Tree depth {} outside 1..={}",
            max_depth, MAX_TREE_DEPTH
        )));
    }

    let resolution = f64_at(&header, 8);
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(MapIoError::InvalidFormat(format!(
            "Invalid resolution {}",
            resolution
        )));
    }

    let model = SensorModel {
        prob_hit: f64_at(&header, 16),
        prob_miss: f64_at(&header, 24),
        clamp_min: f64_at(&header, 32),
        clamp_max: f64_at(&header, 40),
    };
    if !model.is_valid() {
        return Err(MapIoError::InvalidFormat(format!(
            "Invalid sensor model {:?}",
            model
        )));
    }

    Ok(OccupancyOctree::new(resolution, max_depth, model))
}
