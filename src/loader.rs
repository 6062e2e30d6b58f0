//! Settings loading pipeline.
//!
//! [`ConfigLoader::load`] reads a settings document once, validates it and
//! derives the secondary values the estimator needs:
//!
//! 1. open and read the file (`SourceNotFound` if that fails)
//! 2. parse it as a YAML mapping
//! 3. check `num_of_laser` is 1 or 2
//! 4. initialize extrinsics according to `estimate_extrinsic`
//! 5. read per-LiDAR time offsets
//! 6. build the diagonal uncertainty matrix
//! 7. derive output paths
//! 8. copy through the remaining scalar settings
//! 9. return the finished [`EstimatorConfig`]
//!
//! The first failing step ends the load; nothing after it runs.

use std::path::Path;
use std::sync::Arc;

use crate::document::SettingsDocument;
use crate::error::{ConfigError, Result};
use crate::sections::{
    CalibrationSettings, EvaluationSettings, FactorSettings, LaserSettings, MappingSettings,
    OutputPaths, SegmentationSettings, SensorTopology, SolverSettings,
};
use crate::sensor::{Extrinsic, ExtrinsicMode, PerSensor, SensorCount};
use crate::store::EstimatorConfig;
use crate::uncertainty::UncertaintyMatrix;

/// Setting names as they appear in settings documents.
pub mod keys {
    /// Point cloud topic of each LiDAR, indexed by sensor
    pub const CLOUD_TOPICS: [&str; 2] = ["cloud0_topic", "cloud1_topic"];
    /// Number of LiDARs (1 or 2)
    pub const NUM_OF_LASER: &str = "num_of_laser";
    /// Index of the reference LiDAR
    pub const IDX_REF: &str = "idx_ref";

    /// Toggle: run front end and back end on separate threads
    pub const MULTIPLE_THREAD: &str = "multiple_thread";
    /// Solver time budget per optimization (seconds)
    pub const MAX_SOLVER_TIME: &str = "max_solver_time";
    /// Solver iteration budget per optimization
    pub const MAX_NUM_ITERATIONS: &str = "max_num_iterations";
    /// Frames kept in the sliding window
    pub const WINDOW_SIZE: &str = "window_size";
    /// Frames optimized in the sliding window
    pub const OPT_WINDOW_SIZE: &str = "opt_window_size";

    /// Extrinsic mode: 0 fixed, 1 refine, 2 calibrate from scratch
    pub const ESTIMATE_EXTRINSIC: &str = "estimate_extrinsic";
    /// Toggle: run the optimal-extrinsic refinement stage
    pub const OPTIMAL_EXTRINSIC: &str = "optimal_extrinsic";
    /// Extrinsic prior, one `qx qy qz qw tx ty tz` row per LiDAR
    pub const BODY_T_LASER: &str = "body_T_laser";
    /// Initial clock offset per LiDAR (seconds), a single row
    pub const TD: &str = "td";
    /// Toggle: estimate clock offsets online
    pub const ESTIMATE_TD: &str = "estimate_td";
    /// Initial eigenvalue threshold for degeneracy checks
    pub const EIG_INITIAL: &str = "eig_initial";
    /// Eigenvalue threshold for calibration convergence
    pub const EIG_THRE_CALIB: &str = "eig_thre_calib";
    /// Frames required for calibration
    pub const N_CALIB: &str = "n_calib";
    /// Frames of features accumulated per calibration step
    pub const N_CUMU_FEATURE: &str = "n_cumu_feature";

    /// Scan lines per sweep
    pub const N_SCANS: &str = "n_scans";
    /// Seconds per sweep
    pub const SCAN_PERIOD: &str = "scan_period";
    /// Squared correspondence distance limit
    pub const DISTANCE_SQ_THRESHOLD: &str = "distance_sq_threshold";
    /// Scan-line search window
    pub const NEARBY_SCAN: &str = "nearby_scan";
    /// Maximum stamp difference between paired clouds
    pub const LASER_SYNC_THRESHOLD: &str = "laser_sync_threshold";
    /// Near-range cut for odometry
    pub const ROI_RANGE: &str = "roi_range";
    /// Near-range cut for mapping
    pub const ROI_RANGE_MAPPING: &str = "roi_range_mapping";
    /// Toggle: constrain motion to the ground plane
    pub const PLANAR_MOVEMENT: &str = "planar_movement";
    /// Squared map match distance limit
    pub const MIN_MATCH_SQ_DIS: &str = "min_match_sq_dis";
    /// Plane fit rejection distance
    pub const MIN_PLANE_DIS: &str = "min_plane_dis";

    /// Toggle: segment clouds before feature extraction
    pub const SEGMENT_CLOUD: &str = "segment_cloud";
    /// Range image columns
    pub const HORIZON_SCAN: &str = "horizon_scan";
    /// Minimum points per kept cluster
    pub const MIN_CLUSTER_SIZE: &str = "min_cluster_size";
    /// Minimum points per kept line segment
    pub const MIN_LINE_SIZE: &str = "min_line_size";
    /// Minimum points per scan line in a segment
    pub const SEGMENT_VALID_POINT_NUM: &str = "segment_valid_point_num";
    /// Minimum scan lines spanned by a segment
    pub const SEGMENT_VALID_LINE_NUM: &str = "segment_valid_line_num";
    /// Segmentation angle threshold (radians)
    pub const SEGMENT_THETA: &str = "segment_theta";

    /// Toggle: marginalization prior
    pub const MARGINALIZATION_FACTOR: &str = "marginalization_factor";
    /// Toggle: point-to-plane residuals
    pub const POINT_PLANE_FACTOR: &str = "point_plane_factor";
    /// Toggle: point-to-edge residuals
    pub const POINT_EDGE_FACTOR: &str = "point_edge_factor";
    /// Toggle: extrinsic prior residual
    pub const PRIOR_FACTOR: &str = "prior_factor";
    /// Prior weight on position
    pub const PRIOR_FACTOR_POS: &str = "prior_factor_pos";
    /// Prior weight on rotation
    pub const PRIOR_FACTOR_ROT: &str = "prior_factor_rot";
    /// Toggle: compare analytic and numeric Jacobians
    pub const CHECK_JACOBIAN: &str = "check_jacobian";

    /// Nine diagonal entries of the calibration uncertainty
    pub const UNCERTAINTY_CALIB: &str = "uncertainty_calib";
    /// Normal consistency threshold
    pub const NORM_THRESHOLD: &str = "norm_threshold";
    /// Corner map voxel size (meters)
    pub const MAP_CORNER_RES: &str = "map_corner_res";
    /// Surface map voxel size (meters)
    pub const MAP_SURF_RES: &str = "map_surf_res";

    /// Toggle: log residuals around each optimization
    pub const EVALUATE_RESIDUAL: &str = "evaluate_residual";
    /// Toggle: point cloud viewer
    pub const PCL_VIEWER: &str = "pcl_viewer";
    /// Viewer normal length scale
    pub const PCL_VIEWER_NORMAL_RATIO: &str = "pcl_viewer_normal_ratio";
    /// Toggle: publish optimized odometry
    pub const OPTIMAL_ODOMETRY: &str = "optimal_odometry";

    /// Output directory, prefixed verbatim to every result file
    pub const OUTPUT_PATH: &str = "output_path";
    /// Toggle: write result files
    pub const RESULT_SAVE: &str = "mloam_result_save";
    /// Odometry file name under the output directory
    pub const ODOM_PATH: &str = "mloam_odom_path";
    /// Map file name under the output directory
    pub const MAP_PATH: &str = "mloam_map_path";
    /// Ground truth file name under the output directory
    pub const GT_PATH: &str = "mloam_gt_path";
    /// Optional; defaults to [`super::DEFAULT_EXTRINSIC_RESULT_FILE`]
    pub const EX_CALIB_RESULT_PATH: &str = "ex_calib_result_path";
}

/// Extrinsic result file name used when the document does not name one
pub const DEFAULT_EXTRINSIC_RESULT_FILE: &str = "extrinsic_parameter.txt";

/// Builds an [`EstimatorConfig`] from a settings document.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate the settings file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<EstimatorConfig> {
        let path = path.as_ref();
        log::info!("Loading settings from {}", path.display());
        let document = SettingsDocument::open(path)?;
        Self::from_document(&document)
    }

    /// [`ConfigLoader::load`], wrapped for sharing between threads
    pub fn load_shared(path: impl AsRef<Path>) -> Result<Arc<EstimatorConfig>> {
        Self::load(path).map(Arc::new)
    }

    /// Load from YAML text that did not come from a file
    pub fn from_yaml(yaml: &str) -> Result<EstimatorConfig> {
        Self::from_document(&SettingsDocument::from_yaml(yaml)?)
    }

    /// Validate an already parsed document and derive the configuration
    pub fn from_document(doc: &SettingsDocument) -> Result<EstimatorConfig> {
        let count = SensorCount::try_from(doc.integer(keys::NUM_OF_LASER)?)?;
        log::info!("Laser number {}", count);

        let topology = read_topology(doc, count)?;
        let calibration = read_calibration(doc, count)?;
        let mapping = read_mapping(doc)?;
        let output = read_output(doc)?;

        let config = EstimatorConfig {
            source: doc.source().map(Path::to_path_buf),
            topology,
            calibration,
            solver: read_solver(doc)?,
            laser: read_laser(doc)?,
            segmentation: read_segmentation(doc)?,
            factors: read_factors(doc)?,
            mapping,
            evaluation: read_evaluation(doc)?,
            output,
        };

        assert_eq!(config.topics().len(), count.get());
        assert_eq!(config.extrinsics().len(), count.get());
        assert_eq!(config.time_offsets().len(), count.get());

        log_summary(&config);
        Ok(config)
    }
}

fn read_topology(doc: &SettingsDocument, count: SensorCount) -> Result<SensorTopology> {
    let topics = PerSensor::try_from_fn(count, |i| doc.string(keys::CLOUD_TOPICS[i]))?;

    let reference = doc.count(keys::IDX_REF)?;
    if reference >= count.get() {
        return Err(ConfigError::schema(
            keys::IDX_REF,
            format!("reference LiDAR {} does not exist with {} LiDAR(s)", reference, count),
        ));
    }

    Ok(SensorTopology {
        count,
        topics,
        reference,
    })
}

fn read_calibration(doc: &SettingsDocument, count: SensorCount) -> Result<CalibrationSettings> {
    let mode = ExtrinsicMode::from_setting(
        keys::ESTIMATE_EXTRINSIC,
        doc.integer(keys::ESTIMATE_EXTRINSIC)?,
    )?;
    let extrinsics = read_extrinsics(doc, count, mode)?;
    let time_offsets = read_time_offsets(doc, count)?;

    let estimate_time_offset = doc.flag(keys::ESTIMATE_TD)?;
    if estimate_time_offset {
        log::info!("Unsynchronized sensors, online estimate time offset");
    } else {
        log::info!("Synchronized sensors, fix time offset");
    }

    Ok(CalibrationSettings {
        mode,
        extrinsics,
        time_offsets,
        estimate_time_offset,
        optimal_extrinsic: doc.flag(keys::OPTIMAL_EXTRINSIC)?,
        eig_initial: doc.real(keys::EIG_INITIAL)?,
        eig_thre_calib: doc.real(keys::EIG_THRE_CALIB)?,
        n_calib: doc.count(keys::N_CALIB)?,
        n_cumu_feature: doc.count(keys::N_CUMU_FEATURE)?,
    })
}

/// Initial sensor-to-body transforms.
///
/// In calibrate mode the document carries no usable prior, so
/// `body_T_laser` is never looked at and every LiDAR starts at identity.
fn read_extrinsics(
    doc: &SettingsDocument,
    count: SensorCount,
    mode: ExtrinsicMode,
) -> Result<PerSensor<Extrinsic>> {
    match mode {
        ExtrinsicMode::Calibrate => {
            log::warn!("No prior for extrinsic parameters, calibrating from identity");
            return Ok(PerSensor::from_fn(count, |_| Extrinsic::identity()));
        }
        ExtrinsicMode::Refine => {
            log::warn!("Optimizing extrinsic parameters around the initial guess");
        }
        ExtrinsicMode::Fixed => {
            log::warn!("Extrinsic parameters fixed");
        }
    }

    let prior = doc.matrix(keys::BODY_T_LASER)?;
    prior.require_shape(keys::BODY_T_LASER, count.get(), Extrinsic::TUPLE_LEN)?;
    PerSensor::try_from_fn(count, |i| Extrinsic::from_tuple(keys::BODY_T_LASER, prior.row(i)))
}

fn read_time_offsets(doc: &SettingsDocument, count: SensorCount) -> Result<PerSensor<f64>> {
    let td = doc.matrix(keys::TD)?;
    td.require_shape(keys::TD, 1, count.get())?;
    Ok(PerSensor::from_fn(count, |i| td.data()[i]))
}

fn read_mapping(doc: &SettingsDocument) -> Result<MappingSettings> {
    let xi = doc.matrix(keys::UNCERTAINTY_CALIB)?;
    let uncertainty = UncertaintyMatrix::from_slice(keys::UNCERTAINTY_CALIB, xi.data())?;

    Ok(MappingSettings {
        uncertainty,
        norm_threshold: doc.real(keys::NORM_THRESHOLD)?,
        corner_resolution: doc.magnitude(keys::MAP_CORNER_RES)?,
        surf_resolution: doc.magnitude(keys::MAP_SURF_RES)?,
    })
}

fn read_output(doc: &SettingsDocument) -> Result<OutputPaths> {
    let base_dir = doc.string(keys::OUTPUT_PATH)?;
    let save_results = doc.flag(keys::RESULT_SAVE)?;
    let odometry = doc.string(keys::ODOM_PATH)?;
    let map = doc.string(keys::MAP_PATH)?;
    let ground_truth = doc.string(keys::GT_PATH)?;
    let extrinsic_result = doc
        .optional_string(keys::EX_CALIB_RESULT_PATH)?
        .unwrap_or_else(|| DEFAULT_EXTRINSIC_RESULT_FILE.to_string());

    Ok(OutputPaths::derive(
        save_results,
        &base_dir,
        &odometry,
        &map,
        &ground_truth,
        &extrinsic_result,
    ))
}

fn read_solver(doc: &SettingsDocument) -> Result<SolverSettings> {
    Ok(SolverSettings {
        multiple_thread: doc.flag(keys::MULTIPLE_THREAD)?,
        max_solver_time: doc.magnitude(keys::MAX_SOLVER_TIME)?,
        max_num_iterations: doc.count(keys::MAX_NUM_ITERATIONS)?,
        window_size: doc.count(keys::WINDOW_SIZE)?,
        opt_window_size: doc.count(keys::OPT_WINDOW_SIZE)?,
    })
}

fn read_laser(doc: &SettingsDocument) -> Result<LaserSettings> {
    Ok(LaserSettings {
        n_scans: doc.count(keys::N_SCANS)?,
        scan_period: doc.magnitude(keys::SCAN_PERIOD)?,
        distance_sq_threshold: doc.magnitude(keys::DISTANCE_SQ_THRESHOLD)?,
        nearby_scan: doc.magnitude(keys::NEARBY_SCAN)?,
        laser_sync_threshold: doc.magnitude(keys::LASER_SYNC_THRESHOLD)?,
        roi_range: doc.magnitude(keys::ROI_RANGE)?,
        roi_range_mapping: doc.magnitude(keys::ROI_RANGE_MAPPING)?,
        planar_movement: doc.flag(keys::PLANAR_MOVEMENT)?,
        min_match_sq_dis: doc.magnitude(keys::MIN_MATCH_SQ_DIS)?,
        min_plane_dis: doc.magnitude(keys::MIN_PLANE_DIS)?,
    })
}

fn read_segmentation(doc: &SettingsDocument) -> Result<SegmentationSettings> {
    Ok(SegmentationSettings {
        enabled: doc.flag(keys::SEGMENT_CLOUD)?,
        horizon_scan: doc.count(keys::HORIZON_SCAN)?,
        min_cluster_size: doc.count(keys::MIN_CLUSTER_SIZE)?,
        min_line_size: doc.count(keys::MIN_LINE_SIZE)?,
        valid_point_num: doc.count(keys::SEGMENT_VALID_POINT_NUM)?,
        valid_line_num: doc.count(keys::SEGMENT_VALID_LINE_NUM)?,
        theta: doc.magnitude(keys::SEGMENT_THETA)?,
    })
}

fn read_factors(doc: &SettingsDocument) -> Result<FactorSettings> {
    Ok(FactorSettings {
        marginalization: doc.flag(keys::MARGINALIZATION_FACTOR)?,
        point_plane: doc.flag(keys::POINT_PLANE_FACTOR)?,
        point_edge: doc.flag(keys::POINT_EDGE_FACTOR)?,
        prior: doc.flag(keys::PRIOR_FACTOR)?,
        prior_pos_weight: doc.magnitude(keys::PRIOR_FACTOR_POS)?,
        prior_rot_weight: doc.magnitude(keys::PRIOR_FACTOR_ROT)?,
        check_jacobian: doc.flag(keys::CHECK_JACOBIAN)?,
    })
}

fn read_evaluation(doc: &SettingsDocument) -> Result<EvaluationSettings> {
    Ok(EvaluationSettings {
        evaluate_residual: doc.flag(keys::EVALUATE_RESIDUAL)?,
        pcl_viewer: doc.flag(keys::PCL_VIEWER)?,
        pcl_viewer_normal_ratio: doc.magnitude(keys::PCL_VIEWER_NORMAL_RATIO)?,
        optimal_odometry: doc.flag(keys::OPTIMAL_ODOMETRY)?,
    })
}

fn log_summary(config: &EstimatorConfig) {
    let solver = config.solver();
    let output = config.output();
    let mapping = config.mapping();

    log::info!(
        "window_size: {}, opt_window_size: {}",
        solver.window_size,
        solver.opt_window_size
    );
    log::info!("Extrinsic mode: {}", config.extrinsic_mode());
    for (i, (ext, td)) in config
        .extrinsics()
        .iter()
        .zip(config.time_offsets().iter())
        .enumerate()
    {
        log::info!(
            "  LiDAR {} ({}): t = {:?}, q = {:?}, td = {}",
            i,
            config.topics()[i],
            ext.translation.as_slice(),
            ext.rotation.coords.as_slice(),
            td
        );
    }
    log::info!("gt path: {}", output.ground_truth);
    log::info!("result path: {}, {}", output.odometry, output.map);
    log::info!("extrinsic result path: {}", output.extrinsic_result);
    log::info!(
        "initial covariance XI diagonal: {:?}",
        mapping.uncertainty.diagonal().as_slice()
    );
    log::info!(
        "map corner resolution: {}, surf resolution: {}",
        mapping.corner_resolution,
        mapping.surf_resolution
    );
}
