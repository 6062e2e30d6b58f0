//! Sensor topology and per-sensor calibration types.
//!
//! Every per-sensor sequence is a [`PerSensor`], which can only be built
//! against a [`SensorCount`], so its length always equals the number of
//! LiDARs the estimator is configured for.

use std::fmt;
use std::ops::{Deref, Index};

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::Serialize;

use crate::error::{ConfigError, Result};

/// Number of LiDARs. Closed set: every per-sensor array is sized by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "usize")]
pub enum SensorCount {
    /// Single LiDAR
    One,
    /// Two LiDARs
    Two,
}

impl SensorCount {
    /// Number of sensors as an integer
    pub fn get(self) -> usize {
        match self {
            SensorCount::One => 1,
            SensorCount::Two => 2,
        }
    }

    /// Sensor indices `0..count`
    pub fn indices(self) -> std::ops::Range<usize> {
        0..self.get()
    }
}

impl TryFrom<i64> for SensorCount {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(SensorCount::One),
            2 => Ok(SensorCount::Two),
            _ => Err(ConfigError::UnsupportedSensorCount { value }),
        }
    }
}

impl From<SensorCount> for usize {
    fn from(count: SensorCount) -> usize {
        count.get()
    }
}

impl fmt::Display for SensorCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// One value per sensor, indexed in sensor order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PerSensor<T> {
    items: Vec<T>,
}

impl<T> PerSensor<T> {
    /// Build by calling `f` once per sensor index.
    pub fn from_fn(count: SensorCount, f: impl FnMut(usize) -> T) -> Self {
        Self {
            items: count.indices().map(f).collect(),
        }
    }

    /// Fallible variant of [`PerSensor::from_fn`]; stops at the first error.
    pub fn try_from_fn<E>(
        count: SensorCount,
        f: impl FnMut(usize) -> std::result::Result<T, E>,
    ) -> std::result::Result<Self, E> {
        let items = count.indices().map(f).collect::<std::result::Result<Vec<_>, E>>()?;
        debug_assert_eq!(items.len(), count.get());
        Ok(Self { items })
    }

    /// Sensor count this sequence was built for
    pub fn count(&self) -> SensorCount {
        match self.items.len() {
            1 => SensorCount::One,
            2 => SensorCount::Two,
            n => unreachable!("per-sensor sequence of length {}", n),
        }
    }

    /// Values as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T> Deref for PerSensor<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> Index<usize> for PerSensor<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        &self.items[i]
    }
}

impl<'a, T> IntoIterator for &'a PerSensor<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// How the sensor-to-body extrinsics are initialized and treated downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrinsicMode {
    /// Prior is trusted and held constant (setting value 0)
    Fixed,
    /// Prior is an initial guess refined online (setting value 1)
    Refine,
    /// No usable prior; calibrate from identity (setting value 2)
    Calibrate,
}

impl ExtrinsicMode {
    /// Decode the integer setting stored under `key`.
    pub fn from_setting(key: &str, value: i64) -> Result<Self> {
        match value {
            0 => Ok(ExtrinsicMode::Fixed),
            1 => Ok(ExtrinsicMode::Refine),
            2 => Ok(ExtrinsicMode::Calibrate),
            _ => Err(ConfigError::schema(
                key,
                format!("expected 0 (fixed), 1 (refine) or 2 (calibrate), found {}", value),
            )),
        }
    }

    /// Integer used for this mode in settings documents
    pub fn setting_value(self) -> i64 {
        match self {
            ExtrinsicMode::Fixed => 0,
            ExtrinsicMode::Refine => 1,
            ExtrinsicMode::Calibrate => 2,
        }
    }

    /// Whether the document's extrinsic prior is read in this mode
    pub fn reads_prior(self) -> bool {
        self != ExtrinsicMode::Calibrate
    }

    /// Whether the estimator optimizes extrinsics in this mode
    pub fn is_estimated(self) -> bool {
        self != ExtrinsicMode::Fixed
    }
}

impl fmt::Display for ExtrinsicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtrinsicMode::Fixed => write!(f, "fixed"),
            ExtrinsicMode::Refine => write!(f, "refine"),
            ExtrinsicMode::Calibrate => write!(f, "calibrate"),
        }
    }
}

/// Rigid transform from a sensor frame to the body frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Extrinsic {
    /// Unit-norm rotation
    pub rotation: UnitQuaternion<f64>,
    /// Translation in meters
    pub translation: Vector3<f64>,
}

impl Extrinsic {
    /// Columns in a prior row: `qx qy qz qw tx ty tz`
    pub const TUPLE_LEN: usize = 7;

    /// Identity rotation and zero translation
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Decode a prior row `(qx, qy, qz, qw, tx, ty, tz)`.
    ///
    /// Quaternion first, then translation, matching the estimator's
    /// existing `body_T_laser` matrices.
    ///
    /// The quaternion is normalized. A row of the wrong length or a
    /// quaternion with zero norm is a schema violation on `key`.
    pub fn from_tuple(key: &str, row: &[f64]) -> Result<Self> {
        let &[qx, qy, qz, qw, tx, ty, tz] = row else {
            return Err(ConfigError::schema(
                key,
                format!(
                    "expected {} values per sensor (qx qy qz qw tx ty tz), found {}",
                    Self::TUPLE_LEN,
                    row.len()
                ),
            ));
        };
        let rotation = UnitQuaternion::try_new(Quaternion::new(qw, qx, qy, qz), f64::EPSILON)
            .ok_or_else(|| ConfigError::schema(key, "extrinsic quaternion has zero norm"))?;

        Ok(Self {
            rotation,
            translation: Vector3::new(tx, ty, tz),
        })
    }

    /// Encode as `(qx, qy, qz, qw, tx, ty, tz)`
    pub fn to_tuple(&self) -> [f64; 7] {
        let q = self.rotation.quaternion();
        let t = &self.translation;
        [q.i, q.j, q.k, q.w, t.x, t.y, t.z]
    }

    /// As an isometry mapping sensor-frame points into the body frame
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }
}

impl Default for Extrinsic {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    #[test]
    fn test_sensor_count_closed_set() {
        assert_eq!(SensorCount::try_from(1).unwrap(), SensorCount::One);
        assert_eq!(SensorCount::try_from(2).unwrap(), SensorCount::Two);
        for bad in [0, 3, -1] {
            assert!(matches!(
                SensorCount::try_from(bad),
                Err(ConfigError::UnsupportedSensorCount { value }) if value == bad
            ));
        }
    }

    #[test]
    fn test_per_sensor_length_follows_count() {
        let one = PerSensor::from_fn(SensorCount::One, |i| i);
        let two = PerSensor::from_fn(SensorCount::Two, |i| i * 10);
        assert_eq!(one.len(), 1);
        assert_eq!(two.as_slice(), &[0, 10]);
        assert_eq!(two.count(), SensorCount::Two);
        assert_eq!(two[1], 10);
    }

    #[test]
    fn test_per_sensor_try_from_fn_stops_on_error() {
        let mut calls = 0;
        let result: std::result::Result<PerSensor<usize>, &str> =
            PerSensor::try_from_fn(SensorCount::Two, |i| {
                calls += 1;
                if i == 0 { Err("first") } else { Ok(i) }
            });
        assert_eq!(result.unwrap_err(), "first");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_extrinsic_mode_decoding() {
        assert_eq!(ExtrinsicMode::from_setting("k", 0).unwrap(), ExtrinsicMode::Fixed);
        assert_eq!(ExtrinsicMode::from_setting("k", 1).unwrap(), ExtrinsicMode::Refine);
        assert_eq!(ExtrinsicMode::from_setting("k", 2).unwrap(), ExtrinsicMode::Calibrate);
        assert_eq!(ExtrinsicMode::from_setting("k", 3).unwrap_err().key(), Some("k"));
        assert!(!ExtrinsicMode::Calibrate.reads_prior());
        assert!(!ExtrinsicMode::Fixed.is_estimated());
        assert_eq!(ExtrinsicMode::Refine.setting_value(), 1);
    }

    #[test]
    fn test_extrinsic_tuple_order() {
        // 90 degrees about z
        let s = FRAC_1_SQRT_2;
        let row = [0.0, 0.0, s, s, 1.0, -2.0, 0.5];
        let ext = Extrinsic::from_tuple("body_T_laser", &row).unwrap();

        assert_eq!(ext.translation, Vector3::new(1.0, -2.0, 0.5));
        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        assert_relative_eq!(ext.rotation, expected, epsilon = 1e-12);

        let p = ext.to_isometry() * nalgebra::Point3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(p.coords, Vector3::new(1.0, -1.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_extrinsic_quaternion_columns_first() {
        // identity rotation, offset along -y and -z
        let ext =
            Extrinsic::from_tuple("body_T_laser", &[0.0, 0.0, 0.0, 1.0, 0.0, -0.477, -0.220])
                .unwrap();
        assert_eq!(ext.rotation, UnitQuaternion::identity());
        assert_eq!(ext.translation, Vector3::new(0.0, -0.477, -0.220));
        assert_eq!(ext.to_tuple(), [0.0, 0.0, 0.0, 1.0, 0.0, -0.477, -0.220]);
    }

    #[test]
    fn test_extrinsic_normalizes_quaternion() {
        let ext = Extrinsic::from_tuple("k", &[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(ext.rotation.quaternion().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(ext.rotation, UnitQuaternion::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_extrinsic_round_trip() {
        let before = Extrinsic {
            rotation: UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
            translation: Vector3::new(0.25, -1.5, 3.0),
        };
        let decoded = Extrinsic::from_tuple("k", &before.to_tuple()).unwrap();
        assert_eq!(decoded.translation, before.translation);
        assert_relative_eq!(decoded.rotation, before.rotation, epsilon = 1e-12);
    }

    #[test]
    fn test_extrinsic_rejects_bad_rows() {
        assert!(Extrinsic::from_tuple("k", &[0.0; 6]).is_err());
        assert!(Extrinsic::from_tuple("k", &[0.0; 8]).is_err());
        assert_eq!(
            Extrinsic::from_tuple("k", &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0])
                .unwrap_err()
                .key(),
            Some("k")
        );
    }
}
