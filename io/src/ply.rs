//! ASCII PLY point clouds.
//!
//! Only the `vertex` element is read. Its properties may appear in any order;
//! `x y z` are required, `nx ny nz` and `red green blue` are picked up when
//! all three of a group are present.

use crate::{write_with, Error, Result};
use nalgebra::{Point3, Vector3};
use scan_core::PointCloud;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Column positions of the vertex properties we understand.
struct VertexLayout {
    columns: usize,
    position: [usize; 3],
    normal: Option<[usize; 3]>,
    color: Option<[usize; 3]>,
}

impl VertexLayout {
    fn from_properties(names: &[String]) -> Result<Self> {
        let find = |group: [&str; 3]| -> Option<[usize; 3]> {
            let mut out = [0; 3];
            for (slot, name) in out.iter_mut().zip(group) {
                *slot = names.iter().position(|n| n == name)?;
            }
            Some(out)
        };
        let position = find(["x", "y", "z"]).ok_or_else(|| {
            Error::ParseError("PLY vertex element lacks x/y/z properties".to_string())
        })?;
        Ok(Self {
            columns: names.len(),
            position,
            normal: find(["nx", "ny", "nz"]),
            color: find(["red", "green", "blue"]),
        })
    }
}

fn parse_err(line_no: usize, msg: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("PLY line {line_no}: {msg}"))
}

/// Read an ASCII PLY point cloud. Colors are scaled from `0..=255` to `[0, 1]`.
pub fn read_ply<R: BufRead>(reader: R) -> Result<PointCloud> {
    let mut lines = reader.lines().enumerate();

    let mut vertex_count = None;
    let mut properties = Vec::new();
    let mut in_vertex = false;
    let mut ascii = false;

    loop {
        let (i, line) = lines
            .next()
            .ok_or_else(|| Error::ParseError("PLY header is not terminated".to_string()))?;
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["end_header"] => break,
            ["format", kind, ..] => ascii = *kind == "ascii",
            ["element", "vertex", count] => {
                let count: usize = count
                    .parse()
                    .map_err(|_| parse_err(i + 1, "bad vertex count"))?;
                vertex_count = Some(count);
                in_vertex = true;
            }
            ["element", ..] => in_vertex = false,
            ["property", .., name] if in_vertex => properties.push(name.to_string()),
            _ => {}
        }
    }

    if !ascii {
        return Err(Error::ParseError(
            "only ASCII PLY files are supported".to_string(),
        ));
    }
    let count =
        vertex_count.ok_or_else(|| Error::ParseError("PLY has no vertex element".to_string()))?;
    let layout = VertexLayout::from_properties(&properties)?;

    let mut points = Vec::with_capacity(count);
    let mut normals = layout.normal.map(|_| Vec::with_capacity(count));
    let mut colors = layout.color.map(|_| Vec::with_capacity(count));

    while points.len() < count {
        let (i, line) = lines.next().ok_or_else(|| {
            Error::ParseError(format!(
                "PLY ends after {} of {} vertices",
                points.len(),
                count
            ))
        })?;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|s| {
                s.parse::<f32>()
                    .map_err(|_| parse_err(i + 1, format!("bad number '{s}'")))
            })
            .collect::<Result<Vec<f32>>>()?;
        if values.len() < layout.columns {
            return Err(parse_err(
                i + 1,
                format!("expected {} values, found {}", layout.columns, values.len()),
            ));
        }

        let [x, y, z] = layout.position;
        points.push(Point3::new(values[x], values[y], values[z]));
        if let (Some(out), Some([a, b, c])) = (normals.as_mut(), layout.normal) {
            out.push(Vector3::new(values[a], values[b], values[c]));
        }
        if let (Some(out), Some([r, g, b])) = (colors.as_mut(), layout.color) {
            out.push(Point3::new(values[r], values[g], values[b]) / 255.0);
        }
    }

    Ok(PointCloud {
        points,
        colors,
        normals,
    })
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Write `cloud` as ASCII PLY: positions, then normals, then 8-bit colors.
pub fn write_ply<W: Write>(writer: &mut W, cloud: &PointCloud) -> io::Result<()> {
    write!(
        writer,
        "ply\nformat ascii 1.0\nelement vertex {}\nproperty float x\nproperty float y\nproperty float z\n",
        cloud.len()
    )?;
    if cloud.normals.is_some() {
        writer.write_all(b"property float nx\nproperty float ny\nproperty float nz\n")?;
    }
    if cloud.colors.is_some() {
        writer.write_all(b"property uchar red\nproperty uchar green\nproperty uchar blue\n")?;
    }
    writer.write_all(b"end_header\n")?;

    for point in cloud.iter() {
        let p = point.position;
        write!(writer, "{} {} {}", p.x, p.y, p.z)?;
        if let Some(n) = point.normal {
            write!(writer, " {} {} {}", n.x, n.y, n.z)?;
        }
        if let Some(c) = point.color {
            write!(writer, " {} {} {}", to_byte(c.x), to_byte(c.y), to_byte(c.z))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Export a point cloud as ASCII PLY and return the absolute file location.
pub fn write_ply_ascii(cloud: &PointCloud, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    write_with(path, |w| write_ply(w, cloud))?;
    let location = fs::canonicalize(path).map_err(|e| Error::export_failed(path, e))?;
    info!(path = %location.display(), points = cloud.len(), "point cloud exported");
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_properties_in_any_order() {
        let text = "ply\nformat ascii 1.0\ncomment made elsewhere\n\
                    element vertex 2\nproperty uchar red\nproperty uchar green\n\
                    property uchar blue\nproperty float z\nproperty float y\nproperty float x\n\
                    element face 0\nproperty list uchar int vertex_indices\nend_header\n\
                    255 0 0 3 2 1\n0 0 255 6 5 4\n";
        let cloud = read_ply(Cursor::new(text)).unwrap();
        assert_eq!(
            cloud.points,
            vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)]
        );
        assert_eq!(cloud.colors.unwrap()[1], Point3::new(0.0, 0.0, 1.0));
        assert!(cloud.normals.is_none());
    }

    #[test]
    fn test_rejects_binary_and_short_rows() {
        let binary = "ply\nformat binary_little_endian 1.0\nelement vertex 0\nend_header\n";
        assert!(matches!(read_ply(Cursor::new(binary)), Err(Error::ParseError(_))));

        let short = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n\
                     property float y\nproperty float z\nend_header\n1 2\n";
        assert!(matches!(read_ply(Cursor::new(short)), Err(Error::ParseError(_))));
    }
}
