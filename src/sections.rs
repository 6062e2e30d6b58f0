//! Grouped, read-only settings sections.
//!
//! | Section | Contents |
//! |---------|----------|
//! | [`SensorTopology`] | LiDAR count, topics, reference sensor |
//! | [`CalibrationSettings`] | Extrinsics, time offsets, calibration thresholds |
//! | [`SolverSettings`] | Sliding-window sizes and solver budget |
//! | [`LaserSettings`] | Scan geometry and feature matching thresholds |
//! | [`SegmentationSettings`] | Ground/cluster/line segmentation |
//! | [`FactorSettings`] | Residual term switches and prior weights |
//! | [`MappingSettings`] | Uncertainty matrix and map resolutions |
//! | [`EvaluationSettings`] | Residual evaluation and viewer switches |
//! | [`OutputPaths`] | Output directory and derived result files |

use serde::Serialize;

use crate::sensor::{Extrinsic, ExtrinsicMode, PerSensor, SensorCount};
use crate::uncertainty::UncertaintyMatrix;

/// Which LiDARs the pipeline is configured for
#[derive(Clone, Debug, Serialize)]
pub struct SensorTopology {
    /// Number of LiDARs
    pub count: SensorCount,
    /// Point cloud topic per LiDAR
    pub topics: PerSensor<String>,
    /// Index of the reference LiDAR (`idx_ref`)
    pub reference: usize,
}

/// Extrinsic and temporal calibration state
#[derive(Clone, Debug, Serialize)]
pub struct CalibrationSettings {
    /// How extrinsics are initialized and optimized
    pub mode: ExtrinsicMode,
    /// Sensor-to-body transform per LiDAR
    pub extrinsics: PerSensor<Extrinsic>,
    /// Clock offset per LiDAR (seconds)
    pub time_offsets: PerSensor<f64>,
    /// Estimate time offsets online instead of holding them fixed
    pub estimate_time_offset: bool,
    /// Run the optimal-extrinsic refinement stage
    pub optimal_extrinsic: bool,
    /// Initial eigenvalue threshold for degeneracy checks
    pub eig_initial: f64,
    /// Eigenvalue threshold for declaring calibration converged
    pub eig_thre_calib: f64,
    /// Frames required for calibration
    pub n_calib: usize,
    /// Frames of features accumulated per calibration step
    pub n_cumu_feature: usize,
}

/// Sliding-window optimization budget
#[derive(Clone, Debug, Serialize)]
pub struct SolverSettings {
    /// Run front end and back end on separate threads
    pub multiple_thread: bool,
    /// Maximum solver time per optimization (seconds)
    pub max_solver_time: f64,
    /// Maximum solver iterations per optimization
    pub max_num_iterations: usize,
    /// Frames kept in the sliding window
    pub window_size: usize,
    /// Frames optimized in the sliding window
    pub opt_window_size: usize,
}

/// Scan geometry and feature matching thresholds
#[derive(Clone, Debug, Serialize)]
pub struct LaserSettings {
    /// Scan lines per sweep
    pub n_scans: usize,
    /// Seconds per sweep
    pub scan_period: f64,
    /// Squared distance limit for feature correspondences (m^2)
    pub distance_sq_threshold: f64,
    /// Scan-line window searched for correspondences
    pub nearby_scan: f64,
    /// Maximum stamp difference when pairing clouds from different LiDARs
    pub laser_sync_threshold: f64,
    /// Points closer than this are dropped (meters)
    pub roi_range: f64,
    /// Same cut applied to the mapping stage (meters)
    pub roi_range_mapping: f64,
    /// Constrain motion to the ground plane
    pub planar_movement: bool,
    /// Squared distance limit for map matches (m^2)
    pub min_match_sq_dis: f64,
    /// Point-to-plane distance above which a plane fit is rejected (meters)
    pub min_plane_dis: f64,
}

/// Ground, cluster and line segmentation of incoming clouds
#[derive(Clone, Debug, Serialize)]
pub struct SegmentationSettings {
    /// Segment clouds before feature extraction
    pub enabled: bool,
    /// Columns in the range image
    pub horizon_scan: usize,
    /// Points needed for a cluster to be kept
    pub min_cluster_size: usize,
    /// Points needed for a line segment to be kept
    pub min_line_size: usize,
    /// Minimum points per scan line in a valid segment
    pub valid_point_num: usize,
    /// Minimum scan lines spanned by a valid segment
    pub valid_line_num: usize,
    /// Angular threshold (radians)
    pub theta: f64,
}

/// Residual terms included in the optimization
#[derive(Clone, Debug, Serialize)]
pub struct FactorSettings {
    /// Keep a marginalization prior from dropped frames
    pub marginalization: bool,
    /// Point-to-plane residuals
    pub point_plane: bool,
    /// Point-to-edge residuals
    pub point_edge: bool,
    /// Extrinsic prior residual
    pub prior: bool,
    /// Prior factor weight on position
    pub prior_pos_weight: f64,
    /// Prior factor weight on rotation
    pub prior_rot_weight: f64,
    /// Compare analytic and numeric Jacobians
    pub check_jacobian: bool,
}

/// Mapping uncertainty and resolution
#[derive(Clone, Debug, Serialize)]
pub struct MappingSettings {
    /// Initial calibration uncertainty (XI)
    pub uncertainty: UncertaintyMatrix,
    /// Normal consistency threshold for map features
    pub norm_threshold: f64,
    /// Voxel size for corner points (meters)
    pub corner_resolution: f64,
    /// Voxel size for surface points (meters)
    pub surf_resolution: f64,
}

/// Residual evaluation and debug viewer switches
#[derive(Clone, Debug, Serialize)]
pub struct EvaluationSettings {
    /// Log residuals before and after each optimization
    pub evaluate_residual: bool,
    /// Open the point cloud viewer
    pub pcl_viewer: bool,
    /// Length scale of normals drawn in the viewer
    pub pcl_viewer_normal_ratio: f64,
    /// Use the optimized odometry instead of the raw front end estimate
    pub optimal_odometry: bool,
}

/// Output directory and result files derived from it.
///
/// Derived paths are plain string concatenation of the directory and a
/// suffix. Nothing here touches the filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    /// Write results at all
    pub save_results: bool,
    /// Base output directory, used verbatim as a prefix
    pub base_dir: String,
    /// Odometry trajectory
    pub odometry: String,
    /// Map
    pub map: String,
    /// Ground truth trajectory
    pub ground_truth: String,
    /// Extrinsic calibration result
    pub extrinsic_result: String,
}

impl OutputPaths {
    /// Derive all result paths from `base_dir`
    pub fn derive(
        save_results: bool,
        base_dir: &str,
        odometry: &str,
        map: &str,
        ground_truth: &str,
        extrinsic_result: &str,
    ) -> Self {
        Self {
            save_results,
            base_dir: base_dir.to_string(),
            odometry: format!("{}{}", base_dir, odometry),
            map: format!("{}{}", base_dir, map),
            ground_truth: format!("{}{}", base_dir, ground_truth),
            extrinsic_result: format!("{}{}", base_dir, extrinsic_result),
        }
    }

    /// The four derived paths
    pub fn derived(&self) -> [&str; 4] {
        [
            &self.odometry,
            &self.map,
            &self.ground_truth,
            &self.extrinsic_result,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_concatenate() {
        let paths = OutputPaths::derive(
            true,
            "/data/run1/",
            "odom.csv",
            "map.pcd",
            "gt.csv",
            "extrinsic_parameter.txt",
        );
        assert_eq!(paths.odometry, "/data/run1/odom.csv");
        assert_eq!(paths.map, "/data/run1/map.pcd");
        assert_eq!(paths.ground_truth, "/data/run1/gt.csv");
        assert_eq!(paths.extrinsic_result, "/data/run1/extrinsic_parameter.txt");
        assert!(paths.derived().iter().all(|p| p.starts_with(&paths.base_dir)));
    }

    #[test]
    fn test_paths_do_not_insert_separator() {
        let paths = OutputPaths::derive(false, "/tmp/out", "odom.csv", "", "gt", "ex");
        assert_eq!(paths.odometry, "/tmp/outodom.csv");
        assert_eq!(paths.map, "/tmp/out");
    }
}
