//! Settings document access.
//!
//! A settings document is a YAML mapping from setting name to a scalar,
//! a string, or a small numeric matrix. Every lookup names its key so that
//! a failure can be reported as a [`ConfigError::SchemaViolation`] on that
//! key.
//!
//! Besides plain YAML, the estimator's existing settings files use the
//! OpenCV `FileStorage` dialect:
//!
//! ```yaml
//! %YAML:1.0
//! ---
//! num_of_laser: 2
//! body_T_laser: !!opencv-matrix
//!    rows: 2
//!    cols: 7
//!    dt: d
//!    data: [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
//!           0.0, 0.0, 0.0, 1.0, 0.1, 0.0, 0.0]
//! ```
//!
//! The `%YAML:1.0` line is not valid YAML 1.1 and is dropped before
//! parsing. Matrix values can also be given as nested sequences (one inner
//! sequence per row) or as a flat sequence (a single row).
//!
//! Settings are read through typed accessors rather than a derived
//! `Deserialize` struct: serde reports the first failure without the
//! offending setting name in a usable form, and it cannot see through the
//! `!!opencv-matrix` tags. Each accessor returns a `SchemaViolation`
//! carrying its own key instead.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::{ConfigError, DOCUMENT_KEY, Result};

/// Dense row-major numeric matrix read from a settings document.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix; `None` if `data` does not hold `rows * cols` values.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// All values in row-major order
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Row `i` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Fail with a schema violation on `key` unless the shape is `rows x cols`.
    pub fn require_shape(&self, key: &str, rows: usize, cols: usize) -> Result<()> {
        if self.rows != rows || self.cols != cols {
            return Err(ConfigError::schema(
                key,
                format!(
                    "expected a {}x{} matrix, found {}x{}",
                    rows, cols, self.rows, self.cols
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {:?}", self.rows, self.cols, self.data)
    }
}

/// Parsed settings document.
#[derive(Clone, Debug)]
pub struct SettingsDocument {
    source: Option<PathBuf>,
    root: Mapping,
}

impl SettingsDocument {
    /// Read and parse the settings file at `path`.
    ///
    /// The file is read in one go and closed before parsing starts.
    pub fn open(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::SourceNotFound {
                path: path.to_path_buf(),
                source,
            })?;
        let mut document = Self::from_yaml(&contents)?;
        document.source = Some(path.to_path_buf());
        Ok(document)
    }

    /// Parse a settings document from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(&strip_directives(yaml))?;
        match untag(&value) {
            Value::Mapping(root) => Ok(Self {
                source: None,
                root: root.clone(),
            }),
            Value::Null => Err(ConfigError::schema(DOCUMENT_KEY, "document is empty")),
            _ => Err(ConfigError::schema(
                DOCUMENT_KEY,
                "document root must be a mapping of setting names",
            )),
        }
    }

    /// File this document was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether `key` is present with a non-null value
    pub fn contains(&self, key: &str) -> bool {
        self.root.get(key).is_some_and(|v| !untag(v).is_null())
    }

    fn value(&self, key: &str) -> Result<&Value> {
        match self.root.get(key).map(untag) {
            Some(value) if !value.is_null() => Ok(value),
            _ => {
                log::error!("Failed to load {}", key);
                Err(ConfigError::missing(key))
            }
        }
    }

    /// Required string value
    pub fn string(&self, key: &str) -> Result<String> {
        match self.value(key)? {
            Value::String(s) => {
                log::debug!("Loaded {}: {}", key, s);
                Ok(s.clone())
            }
            other => Err(wrong_shape(key, "a string", other)),
        }
    }

    /// String value that may be absent
    pub fn optional_string(&self, key: &str) -> Result<Option<String>> {
        if self.contains(key) {
            self.string(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Required integer value.
    ///
    /// Floats with no fractional part are accepted since some writers emit
    /// `2.0` for integral settings.
    pub fn integer(&self, key: &str) -> Result<i64> {
        let value = self.value(key)?;
        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        };
        match parsed {
            Some(i) => {
                log::debug!("Loaded {}: {}", key, i);
                Ok(i)
            }
            None => Err(wrong_shape(key, "an integer", value)),
        }
    }

    /// Required non-negative integer
    pub fn count(&self, key: &str) -> Result<usize> {
        let i = self.integer(key)?;
        usize::try_from(i)
            .map_err(|_| ConfigError::schema(key, format!("expected a non-negative count, found {}", i)))
    }

    /// Required finite real value
    pub fn real(&self, key: &str) -> Result<f64> {
        let value = self.value(key)?;
        let x = number(key, value)?;
        log::debug!("Loaded {}: {}", key, x);
        Ok(x)
    }

    /// Required finite real value that is not negative
    pub fn magnitude(&self, key: &str) -> Result<f64> {
        let x = self.real(key)?;
        if x < 0.0 {
            return Err(ConfigError::schema(
                key,
                format!("expected a non-negative value, found {}", x),
            ));
        }
        Ok(x)
    }

    /// Required on/off switch: a YAML boolean or the integers 0 and 1.
    pub fn flag(&self, key: &str) -> Result<bool> {
        let value = self.value(key)?;
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            _ => None,
        };
        match parsed {
            Some(b) => {
                log::debug!("Loaded {}: {}", key, b);
                Ok(b)
            }
            None => Err(wrong_shape(key, "0, 1, true or false", value)),
        }
    }

    /// Required numeric matrix
    pub fn matrix(&self, key: &str) -> Result<Matrix> {
        let matrix = parse_matrix(key, self.value(key)?)?;
        log::debug!("Loaded {}: {}", key, matrix);
        Ok(matrix)
    }
}

/// Drop YAML directive lines (`%YAML:1.0`, `%TAG ...`).
fn strip_directives(yaml: &str) -> String {
    yaml.lines()
        .filter(|line| !line.starts_with('%'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn wrong_shape(key: &str, expected: &str, found: &Value) -> ConfigError {
    ConfigError::schema(key, format!("expected {}, found {}", expected, describe(found)))
}

fn number(key: &str, value: &Value) -> Result<f64> {
    match untag(value) {
        Value::Number(n) => match n.as_f64() {
            Some(x) if x.is_finite() => Ok(x),
            _ => Err(ConfigError::schema(key, "expected a finite number")),
        },
        other => Err(wrong_shape(key, "a number", other)),
    }
}

fn numbers(key: &str, items: &[Value]) -> Result<Vec<f64>> {
    items.iter().map(|v| number(key, v)).collect()
}

fn parse_matrix(key: &str, value: &Value) -> Result<Matrix> {
    let (rows, cols, data) = match value {
        // OpenCV form: { rows, cols, dt, data }
        Value::Mapping(m) => {
            let dim = |name: &str| -> Result<usize> {
                m.get(name)
                    .map(untag)
                    .and_then(Value::as_u64)
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| {
                        ConfigError::schema(key, format!("matrix is missing '{}'", name))
                    })
            };
            let rows = dim("rows")?;
            let cols = dim("cols")?;
            let data = match m.get("data").map(untag) {
                Some(Value::Sequence(items)) => numbers(key, items)?,
                _ => return Err(ConfigError::schema(key, "matrix is missing 'data'")),
            };
            (rows, cols, data)
        }
        Value::Sequence(items) => {
            let nested = items.iter().all(|v| untag(v).is_sequence());
            if nested && !items.is_empty() {
                let mut data = Vec::new();
                let mut cols = None;
                for item in items {
                    let row = untag(item).as_sequence().map(Vec::as_slice).unwrap_or(&[]);
                    if *cols.get_or_insert(row.len()) != row.len() {
                        return Err(ConfigError::schema(key, "matrix rows differ in length"));
                    }
                    data.extend(numbers(key, row)?);
                }
                (items.len(), cols.unwrap_or(0), data)
            } else {
                (1, items.len(), numbers(key, items)?)
            }
        }
        other => return Err(wrong_shape(key, "a matrix", other)),
    };

    if rows == 0 || cols == 0 {
        return Err(ConfigError::schema(key, "matrix is empty"));
    }
    Matrix::new(rows, cols, data).ok_or_else(|| {
        ConfigError::schema(
            key,
            format!("matrix data does not hold {}x{} values", rows, cols),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENCV_DOC: &str = r#"%YAML:1.0
---
num_of_laser: 2
cloud0_topic: "/left/velodyne_points"
td: !!opencv-matrix
   rows: 1
   cols: 2
   dt: d
   data: [0.0, 0.015]
body_T_laser: !!opencv-matrix
   rows: 2
   cols: 7
   dt: d
   data: [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
          0.0, 0.0, 0.0, 1.0, 0.1, 0.2, 0.3]
"#;

    #[test]
    fn test_opencv_dialect() {
        let doc = SettingsDocument::from_yaml(OPENCV_DOC).unwrap();
        assert_eq!(doc.integer("num_of_laser").unwrap(), 2);
        assert_eq!(doc.string("cloud0_topic").unwrap(), "/left/velodyne_points");

        let td = doc.matrix("td").unwrap();
        assert_eq!((td.rows(), td.cols()), (1, 2));
        assert_eq!(td.data(), &[0.0, 0.015]);

        let ext = doc.matrix("body_T_laser").unwrap();
        assert_eq!((ext.rows(), ext.cols()), (2, 7));
        assert_eq!(ext.row(1), &[0.0, 0.0, 0.0, 1.0, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_nested_and_flat_sequences() {
        let doc = SettingsDocument::from_yaml(
            "nested: [[1, 2, 3], [4, 5, 6]]\nflat: [1.5, 2.5]\n",
        )
        .unwrap();

        let nested = doc.matrix("nested").unwrap();
        assert_eq!((nested.rows(), nested.cols()), (2, 3));
        assert_eq!(nested.row(0), &[1.0, 2.0, 3.0]);

        let flat = doc.matrix("flat").unwrap();
        assert_eq!((flat.rows(), flat.cols()), (1, 2));
    }

    #[test]
    fn test_scalar_is_not_a_matrix() {
        let doc = SettingsDocument::from_yaml("td: 0.5\n").unwrap();
        let err = doc.matrix("td").unwrap_err();
        assert_eq!(err.key(), Some("td"));
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let doc = SettingsDocument::from_yaml("m: [[1, 2], [3]]\n").unwrap();
        assert_eq!(doc.matrix("m").unwrap_err().key(), Some("m"));
    }

    #[test]
    fn test_opencv_data_length_mismatch() {
        let doc = SettingsDocument::from_yaml(
            "m: !!opencv-matrix\n  rows: 2\n  cols: 2\n  dt: d\n  data: [1.0, 2.0, 3.0]\n",
        )
        .unwrap();
        assert_eq!(doc.matrix("m").unwrap_err().key(), Some("m"));
    }

    #[test]
    fn test_missing_and_null_keys() {
        let doc = SettingsDocument::from_yaml("present: 1\nempty:\n").unwrap();
        assert!(doc.contains("present"));
        assert!(!doc.contains("empty"));
        assert_eq!(doc.integer("absent").unwrap_err().key(), Some("absent"));
        assert_eq!(doc.integer("empty").unwrap_err().key(), Some("empty"));
    }

    #[test]
    fn test_flags() {
        let doc = SettingsDocument::from_yaml("a: 0\nb: 1\nc: true\nd: 2\ne: \"yes\"\n").unwrap();
        assert!(!doc.flag("a").unwrap());
        assert!(doc.flag("b").unwrap());
        assert!(doc.flag("c").unwrap());
        assert!(doc.flag("d").is_err());
        assert!(doc.flag("e").is_err());
    }

    #[test]
    fn test_integers_and_counts() {
        let doc = SettingsDocument::from_yaml("a: 2.0\nb: 2.5\nc: -1\n").unwrap();
        assert_eq!(doc.integer("a").unwrap(), 2);
        assert!(doc.integer("b").is_err());
        assert_eq!(doc.integer("c").unwrap(), -1);
        assert_eq!(doc.count("c").unwrap_err().key(), Some("c"));
    }

    #[test]
    fn test_reals() {
        let doc = SettingsDocument::from_yaml("a: 3\nb: -0.5\nc: \"x\"\n").unwrap();
        assert_eq!(doc.real("a").unwrap(), 3.0);
        assert_eq!(doc.real("b").unwrap(), -0.5);
        assert!(doc.magnitude("b").is_err());
        assert!(doc.real("c").is_err());
    }

    #[test]
    fn test_root_must_be_mapping() {
        let err = SettingsDocument::from_yaml("- 1\n- 2\n").unwrap_err();
        assert_eq!(err.key(), Some(DOCUMENT_KEY));

        let err = SettingsDocument::from_yaml("").unwrap_err();
        assert_eq!(err.key(), Some(DOCUMENT_KEY));
    }

    #[test]
    fn test_optional_string() {
        let doc = SettingsDocument::from_yaml("name: \"a.txt\"\n").unwrap();
        assert_eq!(doc.optional_string("name").unwrap().as_deref(), Some("a.txt"));
        assert_eq!(doc.optional_string("other").unwrap(), None);
    }
}
