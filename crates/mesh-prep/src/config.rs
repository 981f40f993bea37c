//! Analysis configuration.
//!
//! Every threshold the pipeline uses lives in one immutable [`AnalysisConfig`]
//! value that is handed to each stage. Presets cover the two tuning variants
//! in use ([`AnalysisConfig::default`] and [`AnalysisConfig::fast`]); the
//! `with_*` methods return modified copies for tests and callers that need
//! alternate thresholds.
//!
//! With the `pipeline-config` feature, configurations can be read from TOML
//! or JSON. Missing fields take their default values:
//!
//! ```toml
//! [build_volume]
//! x = 250.0
//! y = 210.0
//! z = 210.0
//!
//! [thickness]
//! min_thickness = 0.4
//! seed = 7
//!
//! [stability]
//! floor_reference = "bounding_box"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Printer build volume in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildVolume {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for BuildVolume {
    fn default() -> Self {
        Self {
            x: 300.0,
            y: 300.0,
            z: 240.0,
        }
    }
}

impl BuildVolume {
    /// Create a build volume from its three extents.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Limits for the body-count and integrity checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Maximum number of connected components.
    pub max_bodies: usize,

    /// Maximum number of naked (single-face) edges tolerated.
    pub naked_edge_threshold: usize,

    /// Minimum number of faces of a closed surface.
    pub min_faces: usize,

    /// Fill small holes and fix winding on a scratch copy before judging
    /// winding consistency and volume.
    pub auto_repair: bool,

    /// Largest hole (in boundary edges) the auto-repair will fill.
    pub max_hole_edges: usize,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            max_bodies: 100,
            naked_edge_threshold: 20,
            min_faces: 4,
            auto_repair: true,
            max_hole_edges: 64,
        }
    }
}

/// Parameters for ray-sampled wall thickness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThicknessConfig {
    /// Walls thinner than this (mm) count as failed samples. Typically the
    /// nozzle diameter.
    pub min_thickness: f64,

    /// Upper bound on the number of sampled faces.
    pub sample_count: usize,

    /// Lower bound on the number of sampled faces (capped by face count).
    pub min_samples: usize,

    /// Above this face count samples are drawn uniformly instead of by area.
    pub uniform_sampling_above: usize,

    /// Fraction of failed samples tolerated before the check fails.
    pub fail_rate_threshold: f64,

    /// Distance the ray origin is pushed inside the surface (mm).
    pub ray_offset: f64,

    /// Seed for the sampler. `None` draws from OS entropy.
    pub seed: Option<u64>,

    /// Wall-clock budget for ray casting, in seconds.
    pub budget_secs: f64,
}

impl Default for ThicknessConfig {
    fn default() -> Self {
        Self {
            min_thickness: 0.6,
            sample_count: 500,
            min_samples: 100,
            uniform_sampling_above: 100_000,
            fail_rate_threshold: 0.05,
            ray_offset: 0.001,
            seed: None,
            budget_secs: 20.0,
        }
    }
}

impl ThicknessConfig {
    /// Ray casting budget as a [`Duration`].
    pub fn budget(&self) -> Duration {
        secs_to_duration(self.budget_secs)
    }

    /// Number of faces to sample for a mesh with `face_count` faces.
    ///
    /// One sample per ten faces up to `sample_count`, but never fewer than
    /// `min_samples` unless the mesh itself has fewer faces.
    pub fn samples_for(&self, face_count: usize) -> usize {
        let samples = self.sample_count.min(face_count / 10);
        if samples < self.min_samples {
            self.min_samples.min(face_count)
        } else {
            samples
        }
    }
}

/// Parameters for vertex-clustering decimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    /// Decimate only when the face count exceeds this ceiling.
    pub target_faces: usize,

    /// Voxel size is the bounding-box diagonal divided by this.
    pub resolution: f64,

    /// Wall-clock budget for clustering, in seconds.
    pub budget_secs: f64,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self {
            target_faces: 50_000,
            resolution: 64.0,
            budget_secs: 30.0,
        }
    }
}

impl DecimationConfig {
    /// Clustering budget as a [`Duration`].
    pub fn budget(&self) -> Duration {
        secs_to_duration(self.budget_secs)
    }
}

/// Parameters for grouping faces into flat facets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetConfig {
    /// Maximum angle between adjacent face normals inside one facet (degrees).
    pub angle_tolerance_deg: f64,

    /// Facets with fewer faces than this are not reported.
    pub min_faces: usize,

    /// Minimum facet area is `(scale * min_area_multiplier)^2`.
    pub min_area_multiplier: f64,
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            angle_tolerance_deg: 0.5,
            min_faces: 2,
            min_area_multiplier: 0.02,
        }
    }
}

/// Geometry used to check that nothing sinks below a resting facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorReference {
    /// Vertices of the convex hull.
    #[default]
    ConvexHull,
    /// The eight corners of the axis-aligned bounding box.
    BoundingBox,
}

/// Tolerances of the three stability filters, as fractions of the mesh scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Maximum facet-centroid distance from the nearest hull plane.
    pub hull_distance_fraction: f64,

    /// Minimum dot product between facet normal and matched hull normal.
    pub min_hull_normal_dot: f64,

    /// Growth of the footprint polygon before the center-of-mass test.
    pub footprint_buffer_fraction: f64,

    /// Allowed penetration below the resting plane.
    pub floor_tolerance_fraction: f64,

    /// Reference geometry for the floor-penetration filter.
    pub floor_reference: FloorReference,

    /// Offset of the bottom marker along the facet normal (mm).
    pub marker_offset: f64,

    /// Shrink factor applied to the isotropic radius of degenerate footprints.
    pub degenerate_radius_scale: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            hull_distance_fraction: 0.015,
            min_hull_normal_dot: -0.1,
            footprint_buffer_fraction: 0.02,
            floor_tolerance_fraction: 0.01,
            floor_reference: FloorReference::ConvexHull,
            marker_offset: 0.5,
            degenerate_radius_scale: 0.9,
        }
    }
}

/// Complete configuration of one analysis run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub build_volume: BuildVolume,
    pub integrity: IntegrityConfig,
    pub thickness: ThicknessConfig,
    pub decimation: DecimationConfig,
    pub facets: FacetConfig,
    pub stability: StabilityConfig,
}

impl AnalysisConfig {
    /// Faster variant: smaller decimation target, coarser facet cutoff and
    /// bounding-box floor check.
    pub fn fast() -> Self {
        Self {
            decimation: DecimationConfig {
                target_faces: 30_000,
                ..Default::default()
            },
            facets: FacetConfig {
                min_area_multiplier: 0.04,
                ..Default::default()
            },
            stability: StabilityConfig {
                floor_reference: FloorReference::BoundingBox,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Copy with a different build volume.
    pub fn with_build_volume(mut self, x: f64, y: f64, z: f64) -> Self {
        self.build_volume = BuildVolume::new(x, y, z);
        self
    }

    /// Copy with a different minimum wall thickness.
    pub fn with_min_thickness(mut self, min_thickness: f64) -> Self {
        self.thickness.min_thickness = min_thickness;
        self
    }

    /// Copy with a fixed sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.thickness.seed = Some(seed);
        self
    }

    /// Copy with a different decimation ceiling.
    pub fn with_decimation_target(mut self, target_faces: usize) -> Self {
        self.decimation.target_faces = target_faces;
        self
    }

    /// Copy with a different floor reference.
    pub fn with_floor_reference(mut self, reference: FloorReference) -> Self {
        self.stability.floor_reference = reference;
        self
    }

    /// Copy with a different body-count limit.
    pub fn with_max_bodies(mut self, max_bodies: usize) -> Self {
        self.integrity.max_bodies = max_bodies;
        self
    }
}

#[cfg(feature = "pipeline-config")]
impl AnalysisConfig {
    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load configuration from a TOML or JSON file, chosen by extension.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(toml::from_str(&contents)?)
        }
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}

/// Error loading a configuration file.
#[cfg(feature = "pipeline-config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = AnalysisConfig::default();
        assert_eq!(config.build_volume, BuildVolume::new(300.0, 300.0, 240.0));
        assert_eq!(config.integrity.max_bodies, 100);
        assert_eq!(config.integrity.naked_edge_threshold, 20);
        assert_eq!(config.thickness.min_thickness, 0.6);
        assert_eq!(config.thickness.fail_rate_threshold, 0.05);
        assert_eq!(config.decimation.target_faces, 50_000);
        assert_eq!(config.facets.min_area_multiplier, 0.02);
        assert_eq!(config.stability.floor_reference, FloorReference::ConvexHull);
    }

    #[test]
    fn test_fast_preset() {
        let config = AnalysisConfig::fast();
        assert_eq!(config.decimation.target_faces, 30_000);
        assert_eq!(config.facets.min_area_multiplier, 0.04);
        assert_eq!(config.stability.floor_reference, FloorReference::BoundingBox);
        // Validation thresholds are shared.
        assert_eq!(config.thickness, ThicknessConfig::default());
    }

    #[test]
    fn test_builders_leave_original_untouched() {
        let base = AnalysisConfig::default();
        let custom = base.clone().with_build_volume(10.0, 10.0, 10.0).with_seed(3);
        assert_eq!(base.build_volume.x, 300.0);
        assert_eq!(custom.build_volume.x, 10.0);
        assert_eq!(custom.thickness.seed, Some(3));
    }

    #[test]
    fn test_sample_count_policy() {
        let t = ThicknessConfig::default();
        // Small meshes are sampled completely.
        assert_eq!(t.samples_for(12), 12);
        assert_eq!(t.samples_for(80), 80);
        // Medium meshes get the floor of 100.
        assert_eq!(t.samples_for(500), 100);
        // One in ten faces up to the cap.
        assert_eq!(t.samples_for(3_000), 300);
        assert_eq!(t.samples_for(1_000_000), 500);
    }

    #[test]
    fn test_budget_conversion() {
        let mut t = ThicknessConfig::default();
        assert_eq!(t.budget(), Duration::from_secs(20));
        t.budget_secs = -1.0;
        assert_eq!(t.budget(), Duration::ZERO);
    }
}

#[cfg(all(test, feature = "pipeline-config"))]
mod config_file_tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            [build_volume]
            x = 250.0

            [stability]
            floor_reference = "bounding_box"
            "#,
        )
        .unwrap();
        assert_eq!(config.build_volume.x, 250.0);
        assert_eq!(config.build_volume.z, 240.0);
        assert_eq!(config.stability.floor_reference, FloorReference::BoundingBox);
        assert_eq!(config.thickness, ThicknessConfig::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AnalysisConfig::fast().with_seed(11);
        let text = config.to_toml().unwrap();
        assert_eq!(AnalysisConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        std::io::Write::write_all(&mut file, br#"{"thickness": {"min_thickness": 0.4}}"#).unwrap();
        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.thickness.min_thickness, 0.4);
        assert_eq!(config.thickness.sample_count, 500);
    }
}
