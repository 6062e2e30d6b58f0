//! The loaded estimator configuration.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ConfigError, Result};
use crate::sections::{
    CalibrationSettings, EvaluationSettings, FactorSettings, LaserSettings, MappingSettings,
    OutputPaths, SegmentationSettings, SensorTopology, SolverSettings,
};
use crate::sensor::{Extrinsic, ExtrinsicMode, PerSensor, SensorCount};
use crate::uncertainty::UncertaintyMatrix;

/// Fully validated estimator configuration.
///
/// Only [`ConfigLoader`](crate::ConfigLoader) can build one, and only after
/// every setting has been read and checked, so holding an `EstimatorConfig`
/// means every field is populated. There are no setters; share it with
/// `Arc` between threads.
#[derive(Clone, Debug, Serialize)]
pub struct EstimatorConfig {
    #[serde(skip)]
    pub(crate) source: Option<PathBuf>,
    pub(crate) topology: SensorTopology,
    pub(crate) calibration: CalibrationSettings,
    pub(crate) solver: SolverSettings,
    pub(crate) laser: LaserSettings,
    pub(crate) segmentation: SegmentationSettings,
    pub(crate) factors: FactorSettings,
    pub(crate) mapping: MappingSettings,
    pub(crate) evaluation: EvaluationSettings,
    pub(crate) output: OutputPaths,
}

impl EstimatorConfig {
    /// Settings file this configuration was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Directory holding the settings file
    pub fn config_dir(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }

    // --- Sections ---

    /// LiDAR count, topics and reference sensor
    pub fn topology(&self) -> &SensorTopology {
        &self.topology
    }

    /// Extrinsic and time offset calibration state
    pub fn calibration(&self) -> &CalibrationSettings {
        &self.calibration
    }

    /// Sliding-window solver budget
    pub fn solver(&self) -> &SolverSettings {
        &self.solver
    }

    /// Scan geometry and matching thresholds
    pub fn laser(&self) -> &LaserSettings {
        &self.laser
    }

    /// Cloud segmentation settings
    pub fn segmentation(&self) -> &SegmentationSettings {
        &self.segmentation
    }

    /// Residual term switches
    pub fn factors(&self) -> &FactorSettings {
        &self.factors
    }

    /// Uncertainty and map resolutions
    pub fn mapping(&self) -> &MappingSettings {
        &self.mapping
    }

    /// Evaluation and viewer switches
    pub fn evaluation(&self) -> &EvaluationSettings {
        &self.evaluation
    }

    /// Output directory and derived result paths
    pub fn output(&self) -> &OutputPaths {
        &self.output
    }

    // --- Shortcuts for the most used fields ---

    /// Number of LiDARs
    pub fn sensor_count(&self) -> SensorCount {
        self.topology.count
    }

    /// Point cloud topic per LiDAR
    pub fn topics(&self) -> &PerSensor<String> {
        &self.topology.topics
    }

    /// Extrinsic estimation mode
    pub fn extrinsic_mode(&self) -> ExtrinsicMode {
        self.calibration.mode
    }

    /// Initial sensor-to-body transform per LiDAR
    pub fn extrinsics(&self) -> &PerSensor<Extrinsic> {
        &self.calibration.extrinsics
    }

    /// Initial clock offset per LiDAR (seconds)
    pub fn time_offsets(&self) -> &PerSensor<f64> {
        &self.calibration.time_offsets
    }

    /// Initial calibration uncertainty
    pub fn uncertainty(&self) -> &UncertaintyMatrix {
        &self.mapping.uncertainty
    }

    /// Serialize the derived configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ConfigError::Serialize)
    }
}
