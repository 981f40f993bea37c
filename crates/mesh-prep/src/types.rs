//! Core mesh data types. All coordinates are millimeters.

use nalgebra::{Point3, Rotation3, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f64>,
}

impl Vertex {
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// An indexed triangle mesh.
///
/// Faces wind counter-clockwise seen from outside. Stages of the analysis
/// never mutate a mesh they were handed; transforms such as
/// [`Mesh::normalized`] and [`Mesh::rotated`] return a new snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Build a mesh from raw positions and faces.
    pub fn from_parts(positions: impl IntoIterator<Item = [f64; 3]>, faces: Vec<[u32; 3]>) -> Self {
        let vertices = positions
            .into_iter()
            .map(|[x, y, z]| Vertex::from_coords(x, y, z))
            .collect();
        Self { vertices, faces }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when there is nothing to analyze: no vertices or no faces.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Axis-aligned bounding box as `(min, max)`, `None` without vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let (first, rest) = self.vertices.split_first()?;
        Some(rest.iter().fold((first.position, first.position), |(lo, hi), v| {
            (lo.inf(&v.position), hi.sup(&v.position))
        }))
    }

    /// Bounding box size per axis; zero for an empty mesh.
    pub fn extents(&self) -> Vector3<f64> {
        self.bounds().map_or_else(Vector3::zeros, |(lo, hi)| hi - lo)
    }

    /// `‖extents‖`, the length every relative tolerance is scaled by.
    pub fn scale_factor(&self) -> f64 {
        self.extents().norm()
    }

    pub fn bounding_box_corners(&self) -> Vec<Point3<f64>> {
        let Some((lo, hi)) = self.bounds() else {
            return Vec::new();
        };
        (0..8)
            .map(|bits| {
                let pick = |bit: u32, a: f64, b: f64| if bits & bit == 0 { a } else { b };
                Point3::new(pick(1, lo.x, hi.x), pick(2, lo.y, hi.y), pick(4, lo.z, hi.z))
            })
            .collect()
    }

    fn corners(&self, [a, b, c]: [u32; 3]) -> Triangle {
        let at = |i: u32| self.vertices[i as usize].position;
        Triangle::new(at(a), at(b), at(c))
    }

    /// Faces with their vertex positions resolved.
    ///
    /// # Panics
    ///
    /// If a face index is out of range; loaders reject such meshes.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&face| self.corners(face))
    }

    pub fn triangle(&self, face: usize) -> Option<Triangle> {
        self.faces.get(face).map(|&f| self.corners(f))
    }

    pub fn face_areas(&self) -> Vec<f64> {
        self.triangles().map(|t| t.area()).collect()
    }

    fn map_positions(&self, f: impl Fn(&Point3<f64>) -> Point3<f64>) -> Mesh {
        Mesh {
            vertices: self.vertices.iter().map(|v| Vertex::new(f(&v.position))).collect(),
            faces: self.faces.clone(),
        }
    }

    pub fn translated(&self, offset: Vector3<f64>) -> Mesh {
        self.map_positions(|p| p + offset)
    }

    /// Rotate about the origin.
    pub fn rotated(&self, rotation: &Rotation3<f64>) -> Mesh {
        self.map_positions(|p| rotation * p)
    }

    /// Copy in the canonical resting frame: bounding box centered on XY,
    /// lowest point on Z = 0.
    pub fn normalized(&self) -> Mesh {
        match self.bounds() {
            Some((lo, hi)) => self.translated(Vector3::new(
                -(lo.x + hi.x) / 2.0,
                -(lo.y + hi.y) / 2.0,
                -lo.z,
            )),
            None => self.clone(),
        }
    }

    /// Sum of the signed tetrahedra spanned by each face and the origin.
    /// Positive for a closed, outward-wound surface.
    pub fn signed_volume(&self) -> f64 {
        self.triangles().map(|t| t.origin_volume()).sum()
    }

    pub fn is_inside_out(&self) -> bool {
        self.signed_volume() < 0.0
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|t| t.area()).sum()
    }

    /// Center of mass of a solid of uniform density.
    ///
    /// When the enclosed volume vanishes (open or flat geometry) the surface
    /// centroid stands in.
    pub fn center_of_mass(&self) -> Point3<f64> {
        let (volume, moment) = self.triangles().fold((0.0, Vector3::zeros()), |(vol, m), t| {
            let v = t.origin_volume();
            // A tetrahedron's centroid is the mean of its corners, one of which is the origin.
            (vol + v, m + (t.v0.coords + t.v1.coords + t.v2.coords) * (v / 4.0))
        });

        let negligible = 1e-12 * self.scale_factor().powi(3).max(f64::MIN_POSITIVE);
        if volume.abs() > negligible {
            Point3::from(moment / volume)
        } else {
            self.area_centroid()
        }
    }

    /// Area-weighted centroid of the surface.
    pub fn area_centroid(&self) -> Point3<f64> {
        let (area, moment) = self
            .triangles()
            .fold((0.0, Vector3::zeros()), |(total, m), t| {
                let a = t.area();
                (total + a, m + t.centroid().coords * a)
            });
        if area > 0.0 {
            return Point3::from(moment / area);
        }
        self.bounds()
            .map_or_else(Point3::origin, |(lo, hi)| nalgebra::center(&lo, &hi))
    }
}

/// A face with concrete corner positions.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Twice-area vector along the right-hand normal.
    #[inline]
    fn cross(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal, `None` for a zero-area triangle.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        self.cross().try_normalize(f64::EPSILON)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.cross().norm() / 2.0
    }

    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Signed volume of the tetrahedron with apex at the origin.
    #[inline]
    fn origin_volume(&self) -> f64 {
        self.v0.coords.dot(&self.v1.coords.cross(&self.v2.coords)) / 6.0
    }
}
