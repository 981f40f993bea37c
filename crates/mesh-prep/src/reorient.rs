//! Rigid reorientation: put a chosen face on the build plate.

use std::f64::consts::PI;
use std::path::Path;

use nalgebra::{Rotation3, Unit, Vector3};
use tracing::info;

use crate::error::{MeshError, MeshResult};
use crate::io::{MeshFormat, load_mesh, overwrite_mesh};
use crate::tracing_ext::{StageTimer, log_mesh_state};
use crate::Mesh;

/// Below this length a normal has no usable direction.
const MIN_NORMAL_LENGTH: f64 = 1e-9;

/// A unit vector perpendicular to `v`.
///
/// Crosses with the coordinate axis least aligned with `v`, which keeps the
/// result well conditioned. Returns +X for a zero vector.
pub fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let abs = v.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    v.cross(&axis).try_normalize(f64::EPSILON).unwrap_or_else(Vector3::x)
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
///
/// Antiparallel inputs get a half turn about an axis perpendicular to
/// `from`; zero-length inputs give the identity.
pub fn align_vectors(from: &Vector3<f64>, to: &Vector3<f64>) -> Rotation3<f64> {
    let (Some(a), Some(b)) = (
        from.try_normalize(f64::EPSILON),
        to.try_normalize(f64::EPSILON),
    ) else {
        return Rotation3::identity();
    };

    if a.dot(&b) < -1.0 + 1e-12 {
        return Rotation3::from_axis_angle(&Unit::new_normalize(any_perpendicular(&a)), PI);
    }
    Rotation3::rotation_between(&a, &b).unwrap_or_else(Rotation3::identity)
}

/// Rotation that sends `normal` to straight down (-Z).
pub fn rotation_to_floor(normal: [f64; 3]) -> MeshResult<Rotation3<f64>> {
    let n = Vector3::from(normal);
    if !n.iter().all(|c| c.is_finite()) || n.norm() < MIN_NORMAL_LENGTH {
        return Err(MeshError::invalid_normal(normal));
    }
    Ok(align_vectors(&n, &-Vector3::z()))
}

/// Rotate `mesh` so `normal` faces down, then re-seat it on the plate.
pub fn reorient_mesh(mesh: &Mesh, normal: [f64; 3]) -> MeshResult<Mesh> {
    let rotation = rotation_to_floor(normal)?;
    Ok(mesh.rotated(&rotation).normalized())
}

/// Reorient the mesh stored at `path` and overwrite it in its own format.
pub fn reorient_file(path: &Path, normal: [f64; 3]) -> MeshResult<Mesh> {
    let _timer = StageTimer::start("reorient");
    let rotation = rotation_to_floor(normal)?;

    if !path.exists() {
        return Err(MeshError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let format = MeshFormat::require(path)?;

    let mesh = load_mesh(path)?;
    let reoriented = mesh.rotated(&rotation).normalized();
    log_mesh_state(&reoriented, "reoriented");

    overwrite_mesh(&reoriented, path, format)?;
    info!(
        path = %path.display(),
        normal = ?normal,
        "Mesh rotated and saved"
    );
    Ok(reoriented)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_maps(from: Vector3<f64>, to: Vector3<f64>) {
        let r = align_vectors(&from, &to);
        let mapped = r * from.normalize();
        assert!((mapped - to.normalize()).norm() < 1e-9, "{mapped:?} != {to:?}");
    }

    #[test]
    fn test_align_vectors_general_parallel_and_antiparallel() {
        assert_maps(Vector3::new(1.0, 2.0, 3.0), Vector3::new(-2.0, 0.5, 1.0));
        assert_maps(Vector3::z(), Vector3::z());
        assert_maps(Vector3::z(), -Vector3::z());
        assert_maps(Vector3::new(1.0, 1.0, 0.0), Vector3::new(-1.0, -1.0, 0.0));
    }

    #[test]
    fn test_any_perpendicular() {
        for v in [Vector3::x(), Vector3::new(0.3, -2.0, 5.0), Vector3::new(1.0, 1.0, 1.0)] {
            let p = any_perpendicular(&v);
            assert!(p.dot(&v).abs() < 1e-12);
            assert!((p.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rotation_to_floor_rejects_bad_normals() {
        assert!(matches!(
            rotation_to_floor([0.0, 0.0, 0.0]),
            Err(MeshError::InvalidNormal { .. })
        ));
        assert!(rotation_to_floor([1e-10, 0.0, 0.0]).is_err());
        assert!(rotation_to_floor([f64::NAN, 0.0, 1.0]).is_err());
        let r = rotation_to_floor([0.0, 3.0, 0.0]).unwrap();
        assert!((r * Vector3::y() - -Vector3::z()).norm() < 1e-9);
    }

    #[test]
    fn test_reorient_mesh_seats_on_plate() {
        // Right-angled tetrahedron; its sloped face points along (1,1,1).
        let mesh = Mesh::from_parts(
            [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        );
        let out = reorient_mesh(&mesh, [1.0, 1.0, 1.0]).unwrap();
        let sloped = out.triangle(3).unwrap().normal().unwrap();
        assert!((sloped - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-9);

        let (min, max) = out.bounds().unwrap();
        assert!(min.z.abs() < 1e-9);
        assert!((min.x + max.x).abs() < 1e-9);
        assert!((min.y + max.y).abs() < 1e-9);
    }

    #[test]
    fn test_reorient_file_checks_normal_before_path() {
        let missing = Path::new("/nonexistent/part.stl");
        assert!(matches!(
            reorient_file(missing, [0.0, 0.0, 0.0]),
            Err(MeshError::InvalidNormal { .. })
        ));
        assert!(matches!(
            reorient_file(missing, [0.0, 0.0, 1.0]),
            Err(MeshError::FileNotFound { .. })
        ));
    }
}
