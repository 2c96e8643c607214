//! OBJ (Wavefront Object) I/O
//!
//! Meshes are written as a three-line comment header followed by all `v`
//! lines, all `vn` lines, and one `f a//a b//b c//c` line per triangle with
//! 1-based indices.

use crate::{Error, Result};
use nalgebra::{Point3, Vector3};
use scan_3d::compute_vertex_normals;
use scan_core::TriangleMesh;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Write a triangle mesh with per-vertex normals in OBJ format
pub fn write_obj<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> io::Result<()> {
    writeln!(writer, "# scanmesh mesh export")?;
    writeln!(writer, "# vertices: {}", mesh.num_vertices())?;
    writeln!(writer, "# triangles: {}", mesh.num_triangles())?;

    for v in mesh.vertices() {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for n in mesh.normals() {
        writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for [a, b, c] in mesh.triangles() {
        let (a, b, c) = (a + 1, b + 1, c + 1);
        writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }

    Ok(())
}

/// Read a mesh from an OBJ file on disk.
pub fn read_obj(path: impl AsRef<Path>) -> Result<ObjMesh> {
    let file = File::open(path)?;
    ObjMesh::read(BufReader::new(file))
}

/// One corner of an OBJ face: position index and optional normal index,
/// both 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjCorner {
    pub vertex: usize,
    pub normal: Option<usize>,
}

/// Mesh data structure for OBJ with faces (supports polygons, not just triangles)
#[derive(Debug, Clone, Default)]
pub struct ObjMesh {
    pub vertices: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub faces: Vec<Vec<ObjCorner>>,
}

fn parse_vec3(parts: &[&str], line_no: usize, kind: &str) -> Result<[f32; 3]> {
    if parts.len() < 3 {
        return Err(Error::ParseError(format!(
            "line {line_no}: {kind} needs 3 coordinates"
        )));
    }
    let mut out = [0.0f32; 3];
    for (slot, s) in out.iter_mut().zip(parts) {
        *slot = s.parse().map_err(|_| {
            Error::ParseError(format!("line {line_no}: invalid {kind} coordinate '{s}'"))
        })?;
    }
    Ok(out)
}

fn parse_index(s: &str, count: usize, line_no: usize) -> Result<usize> {
    let idx: usize = s
        .parse()
        .map_err(|_| Error::ParseError(format!("line {line_no}: invalid face index '{s}'")))?;
    if idx == 0 || idx > count {
        return Err(Error::ParseError(format!(
            "line {line_no}: face index {idx} out of range 1..={count}"
        )));
    }
    Ok(idx - 1)
}

impl ObjMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a mesh with faces from OBJ
    ///
    /// Understands `v`, `vn` and `f` records; faces may use the `a`, `a/b`,
    /// `a//c` and `a/b/c` corner forms. Other records are ignored.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut mesh = Self::new();

        for (i, line) in reader.lines().enumerate() {
            let line_no = i + 1;
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let tag = parts.next().unwrap_or_default();
            let rest: Vec<&str> = parts.collect();

            match tag {
                "v" => {
                    let [x, y, z] = parse_vec3(&rest, line_no, "vertex")?;
                    mesh.vertices.push(Point3::new(x, y, z));
                }
                "vn" => {
                    let [x, y, z] = parse_vec3(&rest, line_no, "normal")?;
                    mesh.normals.push(Vector3::new(x, y, z));
                }
                "f" => {
                    if rest.len() < 3 {
                        return Err(Error::ParseError(format!(
                            "line {line_no}: face needs at least 3 corners"
                        )));
                    }
                    let face = rest
                        .iter()
                        .map(|corner| mesh.parse_corner(corner, line_no))
                        .collect::<Result<Vec<_>>>()?;
                    mesh.faces.push(face);
                }
                _ => {}
            }
        }

        Ok(mesh)
    }

    fn parse_corner(&self, corner: &str, line_no: usize) -> Result<ObjCorner> {
        let mut fields = corner.split('/');
        let vertex = parse_index(
            fields.next().unwrap_or_default(),
            self.vertices.len(),
            line_no,
        )?;
        // Texture coordinates are not kept.
        let _texture = fields.next();
        let normal = match fields.next() {
            Some(s) if !s.is_empty() => Some(parse_index(s, self.normals.len(), line_no)?),
            _ => None,
        };
        if fields.next().is_some() {
            return Err(Error::ParseError(format!(
                "line {line_no}: malformed face corner '{corner}'"
            )));
        }
        Ok(ObjCorner { vertex, normal })
    }

    pub fn num_triangles(&self) -> usize {
        self.faces.iter().map(|f| f.len().saturating_sub(2)).sum()
    }

    /// Convert to TriangleMesh (triangulates n-gons using fan triangulation)
    ///
    /// Vertex normals are taken from the file when every vertex has exactly
    /// one, otherwise recomputed from the faces.
    pub fn to_triangle_mesh(&self) -> Result<TriangleMesh> {
        let mut indices: Vec<u32> = Vec::with_capacity(self.num_triangles() * 3);
        for face in &self.faces {
            for i in 1..(face.len() - 1) {
                indices.extend([face[0].vertex, face[i].vertex, face[i + 1].vertex].map(|v| v as u32));
            }
        }

        let normals = if self.normals.len() == self.vertices.len() {
            self.normals.clone()
        } else {
            compute_vertex_normals(&self.vertices, &indices)
        };

        TriangleMesh::new(self.vertices.clone(), normals, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_face_forms() {
        let src = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1 2 3
f 1/1 2/2 3/3
f 1//1 3//1 4//1
f 1/1/1 2/2/1 3/3/1 4/4/1
";
        let mesh = ObjMesh::read(Cursor::new(src)).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces.len(), 4);
        assert_eq!(mesh.faces[0][1], ObjCorner { vertex: 1, normal: None });
        assert_eq!(mesh.faces[2][1], ObjCorner { vertex: 2, normal: Some(0) });
        assert_eq!(mesh.num_triangles(), 5);

        let tri = mesh.to_triangle_mesh().unwrap();
        assert_eq!(tri.num_triangles(), 5);
        assert_eq!(tri.normals().len(), 4);
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        for src in [
            "v 1 2\n",
            "v 1 2 x\n",
            "v 0 0 0\nv 1 0 0\nf 1 2\n",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1//1 2//1 3//1\n",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1/1/1 2 3\n",
        ] {
            let err = ObjMesh::read(Cursor::new(src)).unwrap_err();
            assert!(matches!(err, Error::ParseError(_)), "{src:?}: {err}");
        }
    }
}
