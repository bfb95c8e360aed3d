//! The persistent station archive: an append-only time index, one-dimensional
//! variables aligned to it, scalar location fields and descriptive attributes.
//!
//! An archive lives in a single bincode file. Nothing is written until
//! [`StationArchive::close`], which replaces the file atomically.

use crate::archive::error::ArchiveError;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();
const ARCHIVE_FORMAT: &str = "frost-archive";
const ARCHIVE_VERSION: u32 = 1;

pub const TIME_VARIABLE: &str = "time";
pub const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00 UTC";
/// Marks positions without data (the NetCDF default fill value for 32-bit floats).
pub const FILL_VALUE: f32 = 9.969_209_968_386_869e36;

pub type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

/// Builds an attribute map from `(key, value)` pairs.
pub fn attributes<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A single fixed value, such as the station latitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarVariable {
    pub value: f64,
    pub attributes: Attributes,
}

/// A variable aligned to the time index. Positions without data hold [`FILL_VALUE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesVariable {
    attributes: Attributes,
    data: Vec<f32>,
}

impl SeriesVariable {
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Raw values including fill values.
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// The value at a time position, or `None` when unset.
    pub fn value_at(&self, index: usize) -> Option<f32> {
        self.data.get(index).copied().filter(|v| *v != FILL_VALUE)
    }
}

/// How an archive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start a new archive. An existing file is only replaced when `overwrite` is set.
    Create { overwrite: bool },
    /// Extend an existing archive with a compatible time index.
    Append,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArchiveContents {
    format: String,
    version: u32,
    time: Vec<f64>,
    time_attributes: Option<Attributes>,
    scalars: BTreeMap<String, ScalarVariable>,
    series: BTreeMap<String, SeriesVariable>,
    attributes: Attributes,
}

impl Default for ArchiveContents {
    fn default() -> Self {
        ArchiveContents {
            format: ARCHIVE_FORMAT.to_string(),
            version: ARCHIVE_VERSION,
            time: Vec::new(),
            time_attributes: None,
            scalars: BTreeMap::new(),
            series: BTreeMap::new(),
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug)]
pub struct StationArchive {
    path: PathBuf,
    mode: OpenMode,
    contents: ArchiveContents,
}

impl StationArchive {
    pub fn open_with(path: &Path, mode: OpenMode) -> Result<Self, ArchiveError> {
        match mode {
            OpenMode::Create { overwrite } => Self::create(path, overwrite),
            OpenMode::Append => Self::open_append(path),
        }
    }

    /// Starts an empty archive at `path`.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self, ArchiveError> {
        if !overwrite && path.exists() {
            return Err(ArchiveError::TargetExists(path.to_path_buf()));
        }
        debug!("Creating archive {}", path.display());
        Ok(StationArchive {
            path: path.to_path_buf(),
            mode: OpenMode::Create { overwrite },
            contents: ArchiveContents::default(),
        })
    }

    /// Opens an existing archive for appending; it must carry an epoch-seconds time index.
    pub fn open_append(path: &Path) -> Result<Self, ArchiveError> {
        if !path.exists() {
            return Err(ArchiveError::TargetMissing(path.to_path_buf()));
        }
        let mut archive = Self::open(path)?;
        let units = archive
            .time_attributes()
            .and_then(|attrs| attrs.get("units"))
            .and_then(AttributeValue::as_text);
        if units != Some(TIME_UNITS) {
            return Err(ArchiveError::IncompatibleStore {
                path: path.to_path_buf(),
                reason: format!("time index units are {:?}, expected '{}'", units, TIME_UNITS),
            });
        }
        archive.mode = OpenMode::Append;
        Ok(archive)
    }

    /// Opens an existing archive for reading.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let bytes = std::fs::read(path).map_err(|e| ArchiveError::Read(path.to_path_buf(), e))?;
        let (contents, _) =
            bincode::serde::decode_from_slice::<ArchiveContents, _>(&bytes, BINCODE_CONFIG)
                .map_err(|e| ArchiveError::Decode(path.to_path_buf(), Box::new(e)))?;
        if contents.format != ARCHIVE_FORMAT || contents.version != ARCHIVE_VERSION {
            return Err(ArchiveError::IncompatibleStore {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported format {} version {}",
                    contents.format, contents.version
                ),
            });
        }
        Ok(StationArchive {
            path: path.to_path_buf(),
            mode: OpenMode::Append,
            contents,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Declares the unlimited time index with its CF attributes.
    pub fn create_time_dimension(&mut self) {
        self.contents.time_attributes = Some(attributes([
            ("standard_name", "time"),
            ("long_name", "Time of measurement"),
            ("calendar", "standard"),
            ("units", TIME_UNITS),
            ("axis", "T"),
        ]));
    }

    pub fn has_time_dimension(&self) -> bool {
        self.contents.time_attributes.is_some()
    }

    pub fn time_attributes(&self) -> Option<&Attributes> {
        self.contents.time_attributes.as_ref()
    }

    /// Stored reference times in seconds since the epoch, in position order.
    pub fn times(&self) -> &[f64] {
        &self.contents.time
    }

    /// Appends a time at the next free position and returns that position.
    /// Every series grows by one unset value.
    pub fn append_time(&mut self, seconds: f64) -> usize {
        self.contents.time.push(seconds);
        for variable in self.contents.series.values_mut() {
            variable.data.push(FILL_VALUE);
        }
        self.contents.time.len() - 1
    }

    pub fn set_scalar(&mut self, name: &str, value: f64, attributes: Attributes) {
        self.contents
            .scalars
            .insert(name.to_string(), ScalarVariable { value, attributes });
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarVariable> {
        self.contents.scalars.get(name)
    }

    pub fn series(&self, name: &str) -> Option<&SeriesVariable> {
        self.contents.series.get(name)
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.contents.series.keys().map(String::as_str)
    }

    pub fn contains_series(&self, name: &str) -> bool {
        self.contents.series.contains_key(name)
    }

    /// Adds a series variable filled with [`FILL_VALUE`]. An existing variable is kept as is.
    pub fn create_series(&mut self, name: &str, attributes: Attributes) -> &SeriesVariable {
        let length = self.contents.time.len();
        self.contents
            .series
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Adding variable: {}", name);
                SeriesVariable {
                    attributes,
                    data: vec![FILL_VALUE; length],
                }
            })
    }

    /// Writes a value at a time position, replacing whatever was stored there.
    pub fn write_value(&mut self, name: &str, index: usize, value: f32) -> Result<(), ArchiveError> {
        let variable = self
            .contents
            .series
            .get_mut(name)
            .ok_or_else(|| ArchiveError::MissingVariable(name.to_string()))?;
        let length = variable.data.len();
        let slot = variable
            .data
            .get_mut(index)
            .ok_or_else(|| ArchiveError::IndexOutOfRange {
                variable: name.to_string(),
                index,
                length,
            })?;
        *slot = value;
        Ok(())
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.contents.attributes.insert(key.to_string(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.contents.attributes.get(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.contents.attributes
    }

    /// Encodes the archive and atomically moves it into place. This is the only
    /// point at which anything is written to disk.
    pub fn close(self) -> Result<PathBuf, ArchiveError> {
        let bytes = bincode::serde::encode_to_vec(&self.contents, BINCODE_CONFIG)
            .map_err(|e| ArchiveError::Encode(self.path.clone(), Box::new(e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let write_err = |e| ArchiveError::Write(self.path.clone(), e);
        std::fs::create_dir_all(&dir).map_err(write_err)?;
        let mut temp_file = NamedTempFile::new_in(&dir).map_err(write_err)?;
        temp_file.write_all(&bytes).map_err(write_err)?;
        temp_file.as_file().sync_all().map_err(write_err)?;

        let persisted = match self.mode {
            OpenMode::Create { overwrite: false } => temp_file.persist_noclobber(&self.path),
            _ => temp_file.persist(&self.path),
        };
        persisted.map_err(|e| ArchiveError::Write(self.path.clone(), e.error))?;
        info!(
            "Wrote archive {} ({} bytes, {} times, {} variables)",
            self.path.display(),
            bytes.len(),
            self.contents.time.len(),
            self.contents.series.len()
        );
        Ok(self.path)
    }
}
