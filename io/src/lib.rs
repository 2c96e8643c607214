//! 3D File I/O Module
//!
//! Writes reconstructed meshes and point clouds to disk:
//! - OBJ (Wavefront Object), text, with per-vertex normals
//! - STL (STereoLithography), little-endian binary
//! - PLY (Polygon File Format), ASCII point clouds

pub mod obj;
pub mod ply;
pub mod stl;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub use obj::{read_obj, write_obj, ObjMesh};
pub use ply::{read_ply, write_ply, write_ply_ascii};
pub use stl::{read_stl_binary, write_stl_binary};

pub use scan_core::{Error, PointCloud, Result, TriangleMesh};

/// On-disk mesh formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    Obj,
    Stl,
}

impl MeshFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("obj") => Ok(MeshFormat::Obj),
            Some("stl") => Ok(MeshFormat::Stl),
            _ => Err(Error::InvalidInput(format!(
                "Cannot infer mesh format from {}",
                path.display()
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MeshFormat::Obj => "obj",
            MeshFormat::Stl => "stl",
        }
    }
}

/// Write `mesh` to `path` and return the absolute location of the file.
///
/// Any filesystem failure is reported as [`Error::ExportFailed`] carrying the
/// requested path and the underlying I/O error.
pub fn export_mesh(
    mesh: &TriangleMesh,
    format: MeshFormat,
    path: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = path.as_ref();
    write_with(path, |w| match format {
        MeshFormat::Obj => write_obj(w, mesh),
        MeshFormat::Stl => write_stl_binary(w, mesh, "scanmesh"),
    })?;

    let location = fs::canonicalize(path).map_err(|e| Error::export_failed(path, e))?;
    info!(
        path = %location.display(),
        format = format.extension(),
        vertices = mesh.num_vertices(),
        triangles = mesh.num_triangles(),
        "mesh exported"
    );
    Ok(location)
}

/// Create `path`, run `body` on a buffered writer and flush it.
pub(crate) fn write_with<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path).map_err(|e| Error::export_failed(path, e))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| Error::export_failed(path, e))
}
