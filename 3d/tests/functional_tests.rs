use nalgebra::{Point3, Vector3};
use scan_3d::*;

fn grid(nx: usize, ny: usize, spacing: f32, z: impl Fn(f32, f32) -> f32) -> PointCloud {
    let points = (0..ny)
        .flat_map(|j| (0..nx).map(move |i| (i as f32 * spacing, j as f32 * spacing)))
        .map(|(x, y)| Point3::new(x, y, z(x, y)))
        .collect();
    PointCloud::new(points)
}

fn assert_mesh_invariants(mesh: &TriangleMesh) {
    assert_eq!(mesh.indices().len() % 3, 0);
    assert!(mesh
        .indices()
        .iter()
        .all(|&i| (i as usize) < mesh.num_vertices()));
    assert_eq!(mesh.normals().len(), mesh.num_vertices());
    for n in mesh.normals() {
        assert!((n.norm() - 1.0).abs() < 1e-4);
    }
}

#[test]
fn test_mesh_normals_and_area() {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let normals = compute_vertex_normals(&vertices, &[0, 1, 2]);
    let mesh = TriangleMesh::new(vertices, normals, vec![0, 1, 2]).unwrap();

    let metrics = analyze(&mesh, ReconstructionMethod::SensorDepth);
    assert!((metrics.surface_area - 0.5).abs() < 1e-9);
    assert!((mesh.normals()[0].z - 1.0).abs() < 1e-6);

    let expected_edge = (1.0 + 1.0 + 2f64.sqrt()) / 3.0;
    assert!((metrics.average_edge_length - expected_edge).abs() < 1e-6);
    assert_eq!(metrics.density, None);
    assert!(matches!(
        metrics.require_density(),
        Err(Error::DegenerateGeometry(_))
    ));
}

#[test]
fn test_delaunay_grid_mesh() {
    let cloud = grid(10, 10, 0.1, |_, _| 2.0);
    let mesh = MeshGenerator::new().with_stride(1).generate(&cloud).unwrap();

    assert_mesh_invariants(&mesh);
    assert_eq!(mesh.num_vertices(), 100);
    // A triangulated 10x10 grid has 2 * 9 * 9 triangles.
    assert_eq!(mesh.num_triangles(), 162);

    let metrics = analyze(&mesh, ReconstructionMethod::Stereo);
    assert!((metrics.surface_area - 0.81).abs() < 1e-4);

    // All faces wind the same way.
    let first = mesh.normals()[0];
    for n in mesh.normals() {
        assert!((n - first).norm() < 1e-4);
    }
}

#[test]
fn test_edge_length_grows_with_stride() {
    // Raster order with 40 columns: stride 4 keeps every 4th column, turning
    // 0.01 x 0.01 cells into 0.04 x 0.01 ones.
    let cloud = grid(40, 40, 0.01, |_, _| 1.0);
    let average_edge = |stride: usize| {
        let mesh = MeshGenerator::new()
            .with_stride(stride)
            .generate(&cloud)
            .unwrap();
        assert_mesh_invariants(&mesh);
        analyze(&mesh, ReconstructionMethod::Stereo).average_edge_length
    };

    let fine = average_edge(1);
    let half = average_edge(2);
    let coarse = average_edge(4);
    assert!((fine - (0.02 + 2f64.sqrt() / 100.0) / 3.0).abs() < 1e-4, "{fine}");
    assert!(fine < half && half < coarse);
    assert!(coarse > 2.0 * fine, "stride 4: {coarse}, stride 1: {fine}");
}

#[test]
fn test_orientation_follows_cloud_normals() {
    let flat = grid(6, 6, 1.0, |_, _| 0.0);
    for target in [Vector3::z(), -Vector3::z()] {
        let cloud = flat
            .clone()
            .with_normals(vec![target; flat.len()])
            .unwrap();
        let mesh = MeshGenerator::new().with_stride(1).generate(&cloud).unwrap();
        for [a, b, c] in mesh.triangle_vertices() {
            let face = (b - a).cross(&(c - a));
            assert!(face.dot(&target) > 0.0);
        }
    }
}

#[test]
fn test_curved_surface_has_volume() {
    let cloud = grid(12, 12, 0.2, |x, y| (x * x + y * y) * 0.1);
    let mesh = MeshGenerator::new().with_stride(2).generate(&cloud).unwrap();
    assert_mesh_invariants(&mesh);
    assert_eq!(mesh.num_vertices(), 72);
    assert!(mesh.num_triangles() > 0);

    let metrics = analyze(&mesh, ReconstructionMethod::Hybrid);
    assert!(metrics.volume > 0.0);
    let density = metrics.require_density().unwrap();
    assert!((density - 72.0 / metrics.volume).abs() < 1e-9);
}

#[test]
fn test_max_edge_length_drops_long_triangles() {
    // Two patches far apart.
    let mut cloud = grid(4, 4, 0.1, |_, _| 1.0);
    cloud.append(PointCloud::new(
        grid(4, 4, 0.1, |_, _| 1.0)
            .points
            .into_iter()
            .map(|p| p + Vector3::new(5.0, 0.0, 0.0))
            .collect(),
    ));

    let bridged = MeshGenerator::new().with_stride(1).generate(&cloud).unwrap();
    let split = MeshGenerator::new()
        .with_stride(1)
        .with_max_edge_length(Some(0.5))
        .generate(&cloud)
        .unwrap();

    assert_eq!(split.num_triangles(), 2 * 18);
    assert!(bridged.num_triangles() > split.num_triangles());
    assert_mesh_invariants(&split);
}

#[test]
fn test_sequential_triangulation_matches_naive_triples() {
    let cloud = grid(20, 1, 1.0, |x, _| x.sin());
    let mesh = MeshGenerator::new()
        .with_stride(5)
        .with_triangulation(Triangulation::Sequential)
        .generate(&cloud)
        .unwrap();

    assert_eq!(mesh.num_vertices(), 4);
    assert_eq!(mesh.indices(), &[0, 1, 2]);
    assert_eq!(mesh.vertices()[1], cloud.points[5]);
    assert_mesh_invariants(&mesh);
}

#[test]
fn test_too_few_points_yield_no_triangles() {
    let cloud = PointCloud::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)]);
    let mesh = MeshGenerator::new().with_stride(1).generate(&cloud).unwrap();
    assert_eq!(mesh.num_triangles(), 0);
    assert!(mesh.normals().iter().all(|n| *n == UP));

    let metrics = analyze(&mesh, ReconstructionMethod::Stereo);
    assert_eq!(metrics.average_edge_length, 0.0);
    assert_eq!(metrics.surface_area, 0.0);

    let empty = MeshGenerator::new().generate(&PointCloud::default()).unwrap();
    assert!(empty.is_empty());
}
