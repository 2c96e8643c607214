//! Binary STL writer and reader.
//!
//! Layout: 80-byte header, `u32` triangle count, then per triangle a facet
//! normal, three vertices (all `f32` triples) and a `u16` attribute word.
//! Everything is little-endian.

use crate::{Error, Result};
use nalgebra::{Point3, Vector3};
use scan_core::TriangleMesh;
use std::io::{self, Write};

const HEADER_LEN: usize = 80;
const RECORD_LEN: usize = 50;

fn facet_normal(tri: &[Point3<f32>; 3]) -> Vector3<f32> {
    (tri[1] - tri[0])
        .cross(&(tri[2] - tri[0]))
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

/// Write `mesh` as binary STL with `header_name` in the header.
pub fn write_stl_binary<W: Write>(
    writer: &mut W,
    mesh: &TriangleMesh,
    header_name: &str,
) -> io::Result<()> {
    let mut header = [0u8; HEADER_LEN];
    let name_bytes = header_name.as_bytes();
    let copy_n = name_bytes.len().min(header.len());
    header[..copy_n].copy_from_slice(&name_bytes[..copy_n]);
    writer.write_all(&header)?;

    let count = u32::try_from(mesh.num_triangles())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many triangles for STL"))?;
    writer.write_all(&count.to_le_bytes())?;

    let mut record = [0u8; RECORD_LEN];
    for tri in mesh.triangle_vertices() {
        let n = facet_normal(&tri);
        let values = [n.x, n.y, n.z]
            .into_iter()
            .chain(tri.iter().flat_map(|p| [p.x, p.y, p.z]));
        for (slot, value) in record.chunks_exact_mut(4).zip(values) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        record[48..].copy_from_slice(&0u16.to_le_bytes());
        writer.write_all(&record)?;
    }

    Ok(())
}

/// Triangles stored in a binary STL buffer.
pub fn read_stl_binary(bytes: &[u8]) -> Result<Vec<[Point3<f32>; 3]>> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(Error::ParseError("STL buffer shorter than its header".to_string()));
    }
    let mut count_bytes = [0u8; 4];
    count_bytes.copy_from_slice(&bytes[HEADER_LEN..HEADER_LEN + 4]);
    let count = u32::from_le_bytes(count_bytes) as usize;

    let body = &bytes[HEADER_LEN + 4..];
    if body.len() != count * RECORD_LEN {
        return Err(Error::ParseError(format!(
            "STL declares {count} triangles but carries {} bytes of records",
            body.len()
        )));
    }

    let read_f32 = |chunk: &[u8]| {
        let mut b = [0u8; 4];
        b.copy_from_slice(chunk);
        f32::from_le_bytes(b)
    };

    Ok(body
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let v: Vec<f32> = record[12..48].chunks_exact(4).map(read_f32).collect();
            [
                Point3::new(v[0], v[1], v[2]),
                Point3::new(v[3], v[4], v[5]),
                Point3::new(v[6], v[7], v[8]),
            ]
        })
        .collect())
}
