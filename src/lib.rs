//! Multi-LiDAR Params - settings loader for multi-LiDAR odometry and mapping
//!
//! Turns one settings document into a validated, immutable
//! [`EstimatorConfig`] that the estimator, segmentation and mapping stages
//! read for the rest of the process.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     loader                          │  ← ConfigLoader pipeline
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     store                           │  ← EstimatorConfig
//! │                   (sections)                        │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │         document / sensor / uncertainty             │  ← Foundation
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use multi_lidar_params::ConfigLoader;
//!
//! let config = ConfigLoader::load("configs/two_lidar.yaml")?;
//! for (topic, ext) in config.topics().iter().zip(config.extrinsics().iter()) {
//!     println!("{}: t = {:?}", topic, ext.translation);
//! }
//! # Ok::<(), multi_lidar_params::ConfigError>(())
//! ```
//!
//! Loading either succeeds with every field populated or fails with a
//! [`ConfigError`]; there is no partially filled configuration.

#![warn(missing_docs)]

pub mod document;
pub mod error;
pub mod loader;
pub mod sections;
pub mod sensor;
pub mod store;
pub mod uncertainty;

pub use document::{Matrix, SettingsDocument};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, DEFAULT_EXTRINSIC_RESULT_FILE, keys};
pub use sections::{
    CalibrationSettings, EvaluationSettings, FactorSettings, LaserSettings, MappingSettings,
    OutputPaths, SegmentationSettings, SensorTopology, SolverSettings,
};
pub use sensor::{Extrinsic, ExtrinsicMode, PerSensor, SensorCount};
pub use store::EstimatorConfig;
pub use uncertainty::{Matrix9, UncertaintyMatrix, Vector9};
